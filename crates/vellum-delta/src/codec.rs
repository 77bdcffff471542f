//! Compact binary encoding of a [`Delta`].
//!
//! On-disk format:
//! ```text
//! [1 byte: format version (0x01)]
//! repeated:
//!   [LEB128 varint: (len << 2) | tag]   tag 0 = Keep, 1 = Delete, 2 = Insert
//!   [len bytes: UTF-8 text]             Insert only
//! ```
//!
//! Keeping the tag in the low bits of the length means a short op costs a
//! single byte, which is what lets a one-word edit to a short paragraph be
//! stored as a delta at all.

use crate::error::{DeltaError, DeltaResult};
use crate::ops::{Delta, DeltaOp};

const FORMAT_VERSION: u8 = 0x01;

const TAG_KEEP: u64 = 0;
const TAG_DELETE: u64 = 1;
const TAG_INSERT: u64 = 2;

/// Encode a delta.
pub fn encode(delta: &Delta) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(delta));
    out.push(FORMAT_VERSION);
    for op in delta.ops() {
        match op {
            DeltaOp::Keep(n) => write_varint(&mut out, header(*n, TAG_KEEP)),
            DeltaOp::Delete(n) => write_varint(&mut out, header(*n, TAG_DELETE)),
            DeltaOp::Insert(s) => {
                write_varint(&mut out, header(s.len(), TAG_INSERT));
                out.extend_from_slice(s.as_bytes());
            }
        }
    }
    out
}

/// Size in bytes of [`encode`]'s output, without allocating it.
pub fn encoded_len(delta: &Delta) -> usize {
    1 + delta
        .ops()
        .iter()
        .map(|op| match op {
            DeltaOp::Keep(n) => varint_len(header(*n, TAG_KEEP)),
            DeltaOp::Delete(n) => varint_len(header(*n, TAG_DELETE)),
            DeltaOp::Insert(s) => varint_len(header(s.len(), TAG_INSERT)) + s.len(),
        })
        .sum::<usize>()
}

/// Decode a delta produced by [`encode`].
pub fn decode(bytes: &[u8]) -> DeltaResult<Delta> {
    let fail = |offset: usize, reason: &str| DeltaError::Decode {
        offset,
        reason: reason.to_string(),
    };

    match bytes.first() {
        Some(&FORMAT_VERSION) => {}
        Some(v) => return Err(fail(0, &format!("unsupported format version {v:#04x}"))),
        None => return Err(fail(0, "empty input")),
    }

    let mut ops = Vec::new();
    let mut pos = 1;
    while pos < bytes.len() {
        let start = pos;
        let word = read_varint(bytes, &mut pos).ok_or_else(|| fail(start, "truncated varint"))?;
        let len = usize::try_from(word >> 2).map_err(|_| fail(start, "length overflow"))?;
        match word & 0b11 {
            TAG_KEEP => ops.push(DeltaOp::Keep(len)),
            TAG_DELETE => ops.push(DeltaOp::Delete(len)),
            TAG_INSERT => {
                let end = pos
                    .checked_add(len)
                    .filter(|&end| end <= bytes.len())
                    .ok_or_else(|| fail(pos, "insert payload runs past end of input"))?;
                let text = std::str::from_utf8(&bytes[pos..end])
                    .map_err(|_| fail(pos, "insert payload is not valid UTF-8"))?;
                ops.push(DeltaOp::Insert(text.to_string()));
                pos = end;
            }
            tag => return Err(fail(start, &format!("unknown op tag {tag}"))),
        }
    }
    Ok(Delta::from_ops(ops))
}

fn header(len: usize, tag: u64) -> u64 {
    ((len as u64) << 2) | tag
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        if shift >= 64 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
    }
}

fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}
