use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Domain tag mixed into [`FileKey::digest`] so key digests never collide
/// with blob hashes of the same bytes.
const KEY_DIGEST_DOMAIN: &[u8] = b"vellum-file-key-v1:";

/// Workspace-relative identifier of a document.
///
/// Keys are normalized on construction: backslashes become `/` and a
/// leading `./` is stripped. Absolute paths, empty keys, and `..`
/// components are rejected so a key can never escape the workspace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileKey(String);

impl FileKey {
    /// Validate and normalize a workspace-relative path.
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let raw: String = key.into();
        let mut normalized = raw.replace('\\', "/");
        while let Some(stripped) = normalized.strip_prefix("./") {
            normalized = stripped.to_string();
        }

        let invalid = |reason| TypeError::InvalidFileKey {
            key: raw.clone(),
            reason,
        };

        if normalized.is_empty() {
            return Err(invalid("key is empty"));
        }
        if normalized.starts_with('/') || normalized.chars().nth(1) == Some(':') {
            return Err(invalid("key must be workspace-relative"));
        }
        if normalized.contains('\0') {
            return Err(invalid("key contains a NUL byte"));
        }
        if normalized.split('/').any(|part| part == "..") {
            return Err(invalid("key escapes the workspace"));
        }

        Ok(Self(normalized))
    }

    /// The normalized key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stable, filesystem-safe digest of the key (32 hex characters).
    ///
    /// Used to name per-document history and WAL files. The digest is
    /// one-way; files store the key itself alongside their records.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_DIGEST_DOMAIN);
        hasher.update(self.0.as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey({:?})", self.0)
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FileKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FileKey {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FileKey> for String {
    fn from(key: FileKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_dot_prefix() {
        let key = FileKey::new(".\\notes\\today.md").unwrap();
        assert_eq!(key.as_str(), "notes/today.md");
    }

    #[test]
    fn rejects_empty_and_absolute() {
        assert!(FileKey::new("").is_err());
        assert!(FileKey::new("/etc/passwd").is_err());
        assert!(FileKey::new("C:/docs/a.md").is_err());
    }

    #[test]
    fn rejects_parent_components() {
        let err = FileKey::new("docs/../../secret.md").unwrap_err();
        assert!(matches!(err, TypeError::InvalidFileKey { .. }));
    }

    #[test]
    fn digest_is_stable_and_distinct() {
        let a = FileKey::new("a.md").unwrap();
        let b = FileKey::new("b.md").unwrap();
        assert_eq!(a.digest(), FileKey::new("./a.md").unwrap().digest());
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 32);
    }

    #[test]
    fn serde_validates() {
        let key: FileKey = serde_json::from_str("\"docs/x.md\"").unwrap();
        assert_eq!(key.as_str(), "docs/x.md");
        assert!(serde_json::from_str::<FileKey>("\"../x.md\"").is_err());
    }
}
