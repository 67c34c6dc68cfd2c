//! Line-based diff/merge engine for song bodies.
//!
//! A [`DiffPayload`] is a serializable description of how to turn one text
//! into another: an ordered list of [`Hunk`]s plus the SHA-256 digests of the
//! base and target texts. Lines keep their `\n` terminators, so applying a
//! payload reproduces the target byte for byte.
//!
//! Payloads are deterministic: the same pair of texts always yields the same
//! payload, and nothing time- or randomness-dependent is stored inside.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing::{is_hash, text_hash};

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// A contiguous replacement: `removed` base lines starting at `base_start`
/// are replaced by `added`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Zero-based index of the first affected line in the base text.
    pub base_start: usize,
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

/// A complete text transformation plus the content hashes it expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPayload {
    pub base_hash: String,
    pub target_hash: String,
    pub hunks: Vec<Hunk>,
}

/// Line counts for a payload, used in listings and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub hunks: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl DiffPayload {
    /// `true` if applying the payload leaves the text unchanged.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            hunks: self.hunks.len(),
            lines_added: self.hunks.iter().map(|h| h.added.len()).sum(),
            lines_removed: self.hunks.iter().map(|h| h.removed.len()).sum(),
        }
    }
}

// ---------------------------------------------------------------------------
// Line edit script
// ---------------------------------------------------------------------------

/// Split text into lines, keeping the trailing `\n` on each line.
fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOp<'a> {
    Keep(&'a str),
    Remove(&'a str),
    Add(&'a str),
}

/// Compute an edit script between two line sequences using LCS.
///
/// Common prefix and suffix are stripped first so the quadratic part only
/// covers the changed region. Memory is two rows of lengths plus one bit per
/// cell of that region.
fn line_script<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<LineOp<'a>> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    let m = old_mid.len();
    let n = new_mid.len();

    // Compare interned ids instead of strings inside the quadratic loop.
    let mut ids: HashMap<&str, u32> = HashMap::new();
    let mut intern = |line: &'a str| {
        let next = ids.len() as u32;
        *ids.entry(line).or_insert(next)
    };
    let a: Vec<u32> = old_mid.iter().map(|l| intern(*l)).collect();
    let b: Vec<u32> = new_mid.iter().map(|l| intern(*l)).collect();

    // Two rows of LCS lengths plus one bit per cell recording whether the
    // backtrack should prefer an addition (left) over a removal (up).
    let mut prefer_add = vec![0u64; (m * n).div_ceil(64)];
    let mut prev = vec![0u32; n + 1];
    let mut cur = vec![0u32; n + 1];
    for i in 1..=m {
        for j in 1..=n {
            if a[i - 1] == b[j - 1] {
                cur[j] = prev[j - 1] + 1;
            } else {
                let (left, up) = (cur[j - 1], prev[j]);
                if left >= up {
                    let bit = (i - 1) * n + (j - 1);
                    prefer_add[bit / 64] |= 1 << (bit % 64);
                }
                cur[j] = left.max(up);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let takes_add = |i: usize, j: usize| {
        let bit = (i - 1) * n + (j - 1);
        prefer_add[bit / 64] & (1 << (bit % 64)) != 0
    };

    // Backtrack from the end; reversed at the end.
    let mut middle = Vec::with_capacity(m + n);
    let mut i = m;
    let mut j = n;
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            middle.push(LineOp::Keep(old_mid[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || takes_add(i, j)) {
            middle.push(LineOp::Add(new_mid[j - 1]));
            j -= 1;
        } else {
            middle.push(LineOp::Remove(old_mid[i - 1]));
            i -= 1;
        }
    }
    middle.reverse();

    let mut script = Vec::with_capacity(prefix + middle.len() + suffix);
    script.extend(old[..prefix].iter().map(|l| LineOp::Keep(*l)));
    script.extend(middle);
    script.extend(old[old.len() - suffix..].iter().map(|l| LineOp::Keep(*l)));
    script
}

// ---------------------------------------------------------------------------
// Engine operations
// ---------------------------------------------------------------------------

/// Compute the payload that turns `old` into `new`.
pub fn compute_diff(old: &str, new: &str) -> DiffPayload {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);

    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;
    let mut base_idx = 0usize;

    for op in line_script(&old_lines, &new_lines) {
        match op {
            LineOp::Keep(_) => {
                if let Some(hunk) = current.take() {
                    hunks.push(hunk);
                }
                base_idx += 1;
            }
            LineOp::Remove(line) => {
                current
                    .get_or_insert_with(|| Hunk {
                        base_start: base_idx,
                        removed: Vec::new(),
                        added: Vec::new(),
                    })
                    .removed
                    .push(line.to_string());
                base_idx += 1;
            }
            LineOp::Add(line) => {
                current
                    .get_or_insert_with(|| Hunk {
                        base_start: base_idx,
                        removed: Vec::new(),
                        added: Vec::new(),
                    })
                    .added
                    .push(line.to_string());
            }
        }
    }
    if let Some(hunk) = current {
        hunks.push(hunk);
    }

    DiffPayload {
        base_hash: text_hash(old),
        target_hash: text_hash(new),
        hunks,
    }
}

/// Apply `diff` to `base`.
///
/// Fails with [`CoreError::Conflict`] when `base` is not the text the diff
/// was computed against (content hash mismatch), or when a hunk is out of
/// range or its removed lines are not found in `base`. A payload that
/// applies cleanly but does not yield its recorded target hash is malformed
/// and fails with [`CoreError::Validation`].
pub fn apply_diff(base: &str, diff: &DiffPayload) -> Result<String, CoreError> {
    let actual = text_hash(base);
    if actual != diff.base_hash {
        return Err(CoreError::Conflict(format!(
            "base text has changed since the diff was computed (expected {}, found {})",
            short_hash(&diff.base_hash),
            short_hash(&actual),
        )));
    }

    let lines = split_lines(base);
    let mut out = String::with_capacity(base.len());
    let mut cursor = 0usize;

    for hunk in &diff.hunks {
        let end = hunk_end(hunk).filter(|&end| hunk.base_start >= cursor && end <= lines.len());
        let Some(end) = end else {
            return Err(CoreError::Conflict(format!(
                "diff hunk at line {} is out of range",
                hunk.base_start
            )));
        };
        for line in &lines[cursor..hunk.base_start] {
            out.push_str(line);
        }
        let matches = hunk
            .removed
            .iter()
            .zip(&lines[hunk.base_start..end])
            .all(|(expected, found)| expected == found);
        if !matches {
            return Err(CoreError::Conflict(format!(
                "diff hunk at line {} does not match its base text",
                hunk.base_start
            )));
        }
        for line in &hunk.added {
            out.push_str(line);
        }
        cursor = end;
    }
    for line in &lines[cursor..] {
        out.push_str(line);
    }

    if text_hash(&out) != diff.target_hash {
        return Err(CoreError::Validation(
            "diff does not produce its recorded target text".into(),
        ));
    }
    Ok(out)
}

/// Produce the inverse transform of `diff`.
///
/// `apply_diff(target, &invert_diff(&compute_diff(base, target)))` yields
/// `base` again.
pub fn invert_diff(diff: &DiffPayload) -> DiffPayload {
    let mut offset: isize = 0;
    let hunks = diff
        .hunks
        .iter()
        .map(|hunk| {
            let base_start = hunk.base_start.saturating_add_signed(offset);
            offset += hunk.added.len() as isize - hunk.removed.len() as isize;
            Hunk {
                base_start,
                removed: hunk.added.clone(),
                added: hunk.removed.clone(),
            }
        })
        .collect();

    DiffPayload {
        base_hash: diff.target_hash.clone(),
        target_hash: diff.base_hash.clone(),
        hunks,
    }
}

/// Structural checks for payloads arriving from outside the engine.
///
/// Hashes must be SHA-256 hex digests, every hunk must change something, and
/// hunks must be ordered without overlap.
pub fn validate_payload(diff: &DiffPayload) -> Result<(), CoreError> {
    if !is_hash(&diff.base_hash) || !is_hash(&diff.target_hash) {
        return Err(CoreError::Validation(
            "diff hashes must be SHA-256 hex digests".into(),
        ));
    }
    let mut next_free = 0usize;
    for hunk in &diff.hunks {
        if hunk.removed.is_empty() && hunk.added.is_empty() {
            return Err(CoreError::Validation(format!(
                "diff hunk at line {} is empty",
                hunk.base_start
            )));
        }
        if hunk.base_start < next_free {
            return Err(CoreError::Validation(format!(
                "diff hunk at line {} overlaps the previous hunk",
                hunk.base_start
            )));
        }
        next_free = hunk_end(hunk).ok_or_else(|| {
            CoreError::Validation(format!(
                "diff hunk at line {} is out of range",
                hunk.base_start
            ))
        })?;
    }
    Ok(())
}

/// One past the last base line a hunk removes, or `None` on overflow.
fn hunk_end(hunk: &Hunk) -> Option<usize> {
    hunk.base_start.checked_add(hunk.removed.len())
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

// ---------------------------------------------------------------------------
// Presentation diff
// ---------------------------------------------------------------------------

/// The type of a line in a presentational diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineType {
    Added,
    Removed,
    Unchanged,
}

impl DiffLineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Unchanged => "unchanged",
        }
    }

    /// Prefix used when rendering unified-style output.
    pub fn marker(&self) -> char {
        match self {
            Self::Added => '+',
            Self::Removed => '-',
            Self::Unchanged => ' ',
        }
    }
}

impl std::fmt::Display for DiffLineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line in a presentational diff, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    pub content: String,
}

/// Line-level comparison for displaying two revisions side by side.
pub fn compute_line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    line_script(&old_lines, &new_lines)
        .into_iter()
        .map(|op| {
            let (line_type, line) = match op {
                LineOp::Keep(l) => (DiffLineType::Unchanged, l),
                LineOp::Remove(l) => (DiffLineType::Removed, l),
                LineOp::Add(l) => (DiffLineType::Added, l),
            };
            DiffLine {
                line_type,
                content: line.trim_end_matches(['\n', '\r']).to_string(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
