use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec;

/// A single edit operation. Lengths are in bytes of UTF-8 text and always
/// fall on character boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeltaOp {
    /// Copy `n` bytes from the base at the cursor.
    Keep(usize),
    /// Emit literal text.
    Insert(String),
    /// Skip `n` bytes of the base without emitting them.
    Delete(usize),
}

/// An ordered edit script turning a base text into a target text.
///
/// Adjacent ops of the same variant are always merged, so two deltas that
/// describe the same edit compare equal. Serializes as the hex string of
/// its [`codec`] encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    ops: Vec<DeltaOp>,
}

impl Delta {
    /// An empty delta (valid only against an empty base).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a delta from raw ops, dropping zero-length ops and merging
    /// neighbours.
    pub fn from_ops(ops: impl IntoIterator<Item = DeltaOp>) -> Self {
        let mut delta = Self::new();
        for op in ops {
            delta.push(op);
        }
        delta
    }

    /// Append an op, merging it into the last op when they share a variant.
    pub fn push(&mut self, op: DeltaOp) {
        let empty = match &op {
            DeltaOp::Keep(n) | DeltaOp::Delete(n) => *n == 0,
            DeltaOp::Insert(s) => s.is_empty(),
        };
        if empty {
            return;
        }

        if let Some(last) = self.ops.last_mut() {
            match (last, &op) {
                (DeltaOp::Keep(n), DeltaOp::Keep(m)) | (DeltaOp::Delete(n), DeltaOp::Delete(m)) => {
                    *n += m;
                    return;
                }
                (DeltaOp::Insert(s), DeltaOp::Insert(t)) => {
                    s.push_str(t);
                    return;
                }
                _ => {}
            }
        }
        self.ops.push(op);
    }

    /// The ops in order.
    pub fn ops(&self) -> &[DeltaOp] {
        &self.ops
    }

    /// Number of ops.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if the delta has no ops.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Bytes inserted plus bytes deleted: how much the edit changes.
    pub fn change_size(&self) -> u64 {
        self.ops
            .iter()
            .map(|op| match op {
                DeltaOp::Keep(_) => 0,
                DeltaOp::Insert(s) => s.len() as u64,
                DeltaOp::Delete(n) => *n as u64,
            })
            .sum()
    }

    /// Bytes of base the delta consumes (`Keep` + `Delete`).
    pub fn base_len(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                DeltaOp::Keep(n) | DeltaOp::Delete(n) => *n,
                DeltaOp::Insert(_) => 0,
            })
            .sum()
    }

    /// Bytes of output the delta produces (`Keep` + `Insert`).
    pub fn target_len(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                DeltaOp::Keep(n) => *n,
                DeltaOp::Insert(s) => s.len(),
                DeltaOp::Delete(_) => 0,
            })
            .sum()
    }
}

impl Serialize for Delta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(codec::encode(self)))
    }
}

impl<'de> Deserialize<'de> for Delta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        codec::decode(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_merges_neighbours() {
        let delta = Delta::from_ops([
            DeltaOp::Keep(2),
            DeltaOp::Keep(3),
            DeltaOp::Insert("ab".into()),
            DeltaOp::Insert("c".into()),
            DeltaOp::Delete(1),
            DeltaOp::Delete(4),
        ]);
        assert_eq!(
            delta.ops(),
            &[
                DeltaOp::Keep(5),
                DeltaOp::Insert("abc".into()),
                DeltaOp::Delete(5)
            ]
        );
    }

    #[test]
    fn push_drops_empty_ops() {
        let delta = Delta::from_ops([
            DeltaOp::Keep(0),
            DeltaOp::Insert(String::new()),
            DeltaOp::Delete(0),
        ]);
        assert!(delta.is_empty());
    }

    #[test]
    fn sizes() {
        let delta = Delta::from_ops([
            DeltaOp::Keep(4),
            DeltaOp::Delete(3),
            DeltaOp::Insert("xyz!".into()),
        ]);
        assert_eq!(delta.change_size(), 7);
        assert_eq!(delta.base_len(), 7);
        assert_eq!(delta.target_len(), 8);
    }

    #[test]
    fn serde_uses_hex_encoding() {
        let delta = Delta::from_ops([DeltaOp::Keep(16), DeltaOp::Insert("two".into())]);
        let json = serde_json::to_string(&delta).unwrap();
        assert!(json.starts_with('"'));
        let back: Delta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, delta);
        assert!(serde_json::from_str::<Delta>("\"zz\"").is_err());
    }
}
