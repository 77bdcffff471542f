//! Edit-script computation and replay.
//!
//! [`diff`] trims the common prefix and suffix, then runs Myers (via the
//! `similar` crate) over the differing middle: per character when the middle
//! is small, per line when it is large. Myers is bounded by a deadline; once
//! it passes, the remaining ranges are emitted as plain delete and insert
//! runs. Either way the script is valid, and it is deterministic for
//! identical inputs whenever the diff finishes inside its budget.

use std::time::{Duration, Instant};

use similar::{Algorithm, ChangeTag, TextDiff};

use crate::error::{DeltaError, DeltaResult};
use crate::ops::{Delta, DeltaOp};

/// Above this many bytes on either side of the differing middle, diff by
/// lines instead of characters.
const CHAR_DIFF_LIMIT: usize = 32 * 1024;

/// Time [`diff`] may spend searching for a minimal script.
pub const DIFF_TIME_BUDGET: Duration = Duration::from_millis(200);

/// Compute an edit script such that `apply(base, &diff(base, target)) == target`.
pub fn diff(base: &str, target: &str) -> Delta {
    diff_until(base, target, Instant::now() + DIFF_TIME_BUDGET)
}

/// Like [`diff`], but give up on minimality at `deadline`.
///
/// Callers running several diffs for one operation pass a shared deadline
/// so the whole operation stays within one budget.
pub fn diff_until(base: &str, target: &str, deadline: Instant) -> Delta {
    let prefix = common_prefix(base, target);
    let suffix = common_suffix(&base[prefix..], &target[prefix..]);

    let base_mid = &base[prefix..base.len() - suffix];
    let target_mid = &target[prefix..target.len() - suffix];

    let mut delta = Delta::new();
    delta.push(DeltaOp::Keep(prefix));

    if base_mid.len() <= CHAR_DIFF_LIMIT && target_mid.len() <= CHAR_DIFF_LIMIT {
        let text_diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .deadline(deadline)
            .diff_chars(base_mid, target_mid);
        push_changes(&mut delta, &text_diff);
    } else {
        let text_diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .deadline(deadline)
            .diff_lines(base_mid, target_mid);
        push_changes(&mut delta, &text_diff);
    }

    delta.push(DeltaOp::Keep(suffix));
    delta
}

fn push_changes<'a>(delta: &mut Delta, text_diff: &TextDiff<'a, 'a, 'a, str>) {
    for change in text_diff.iter_all_changes() {
        let value = change.value();
        match change.tag() {
            ChangeTag::Equal => delta.push(DeltaOp::Keep(value.len())),
            ChangeTag::Delete => delta.push(DeltaOp::Delete(value.len())),
            ChangeTag::Insert => delta.push(DeltaOp::Insert(value.to_string())),
        }
    }
}

/// Replay `delta` against `base`.
///
/// Fails with [`DeltaError::Corrupt`] if an op runs past the end of the base,
/// would split a UTF-8 character, or if the delta leaves part of the base
/// unconsumed (the signature of a truncated delta).
pub fn apply(base: &str, delta: &Delta) -> DeltaResult<String> {
    let mut out = String::with_capacity(delta.target_len());
    let mut cursor = 0usize;

    for (op_index, op) in delta.ops().iter().enumerate() {
        match op {
            DeltaOp::Keep(n) => {
                let end = advance(base, cursor, *n, op_index)?;
                out.push_str(&base[cursor..end]);
                cursor = end;
            }
            DeltaOp::Delete(n) => {
                cursor = advance(base, cursor, *n, op_index)?;
            }
            DeltaOp::Insert(text) => out.push_str(text),
        }
    }

    if cursor != base.len() {
        return Err(DeltaError::Corrupt {
            op_index: delta.len(),
            reason: format!(
                "delta consumes {cursor} of {} base bytes",
                base.len()
            ),
        });
    }
    Ok(out)
}

fn advance(base: &str, cursor: usize, n: usize, op_index: usize) -> DeltaResult<usize> {
    let end = cursor
        .checked_add(n)
        .filter(|&end| end <= base.len())
        .ok_or_else(|| DeltaError::Corrupt {
            op_index,
            reason: format!(
                "op of length {n} at offset {cursor} runs past end of {}-byte base",
                base.len()
            ),
        })?;
    if !base.is_char_boundary(end) {
        return Err(DeltaError::Corrupt {
            op_index,
            reason: format!("offset {end} splits a UTF-8 character"),
        });
    }
    Ok(end)
}

/// Length of the longest common prefix, backed off to a character boundary.
fn common_prefix(a: &str, b: &str) -> usize {
    let mut n = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while n > 0 && !(a.is_char_boundary(n) && b.is_char_boundary(n)) {
        n -= 1;
    }
    n
}

/// Length of the longest common suffix, backed off to a character boundary.
fn common_suffix(a: &str, b: &str) -> usize {
    let mut n = a
        .bytes()
        .rev()
        .zip(b.bytes().rev())
        .take_while(|(x, y)| x == y)
        .count();
    while n > 0 && !(a.is_char_boundary(a.len() - n) && b.is_char_boundary(b.len() - n)) {
        n -= 1;
    }
    n
}
