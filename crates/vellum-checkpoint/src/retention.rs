//! Retention planning.
//!
//! Pure: given a document's checkpoints and a policy, decide which auto
//! checkpoints to drop. Never selects a bookmark, one of the newest
//! `keep_recent` autos, or the document's latest checkpoint.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use vellum_types::{CheckpointId, CheckpointKind};

use crate::config::RetentionPolicy;
use crate::record::Checkpoint;

/// Ids of the checkpoints `policy` would prune, oldest first.
pub fn plan_prune(checkpoints: &[Checkpoint], policy: &RetentionPolicy) -> Vec<CheckpointId> {
    let mut ordered: Vec<&Checkpoint> = checkpoints.iter().collect();
    ordered.sort_by_key(|cp| cp.created_at);

    let Some(latest) = ordered.last().map(|cp| &cp.id) else {
        return Vec::new();
    };

    let autos: Vec<&Checkpoint> = ordered
        .iter()
        .copied()
        .filter(|cp| cp.kind == CheckpointKind::Auto)
        .collect();

    let mut protected: HashSet<&CheckpointId> = autos
        .iter()
        .rev()
        .take(policy.keep_recent)
        .map(|cp| &cp.id)
        .collect();
    protected.insert(latest);

    let window = policy.window();
    let mut last_kept: Option<DateTime<Utc>> = None;
    let mut pruned = Vec::new();

    for cp in autos {
        let too_close = last_kept.is_some_and(|t| cp.created_at - t < window);
        if too_close && !protected.contains(&cp.id) {
            pruned.push(cp.id.clone());
        } else {
            last_kept = Some(cp.created_at);
        }
    }
    pruned
}
