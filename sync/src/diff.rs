//! Minimal line diffs via the classic Myers O(ND) algorithm
//!
//! Lines are opaque tokens compared by value equality. The output is an
//! ordered, non-overlapping list of [`Edit`]s; each carries its range in the
//! original numbering (`begin_old..end_old`) and in the new numbering
//! (`begin_new..end_new`), so downstream packetization can address deletions
//! and replacements against the original file while pulling payload lines
//! from the new one.

use sync_net::EditKind;

/// One maximal region where the old and new sequences disagree
///
/// `begin_old == end_old` is a pure insertion (at that original position);
/// `begin_new == end_new` is a pure deletion; otherwise a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub begin_old: usize,
    pub end_old: usize,
    pub begin_new: usize,
    pub end_new: usize,
}

impl Edit {
    pub fn kind(&self) -> EditKind {
        if self.begin_old == self.end_old {
            EditKind::Insert
        } else if self.begin_new == self.end_new {
            EditKind::Delete
        } else {
            EditKind::Replace
        }
    }
}

/// Computes the minimal edit script transforming `old` into `new`.
///
/// Returns an empty list for identical inputs. Edits are ordered by position
/// and never overlap.
pub fn diff<T: PartialEq>(old: &[T], new: &[T]) -> Vec<Edit> {
    let matches = myers_matches(old, new);
    collect_edits(&matches, old.len(), new.len())
}

/// Runs forward Myers and backtracks to the list of matched index pairs,
/// ascending in both sequences.
fn myers_matches<T: PartialEq>(old: &[T], new: &[T]) -> Vec<(usize, usize)> {
    let n = old.len();
    let m = new.len();
    let max = n + m;
    if max == 0 {
        return Vec::new();
    }

    let offset = max as isize;
    let mut v = vec![0usize; 2 * max + 1];
    let mut trace: Vec<Vec<usize>> = Vec::new();
    let mut found_d: isize = 0;

    'outer: for d in 0..=(max as isize) {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            while x < n && y < m && old[x] == new[y] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                found_d = d;
                break 'outer;
            }
            k += 2;
        }
    }

    // Walk back from (n, m), recording every diagonal (match) step.
    let mut matches = Vec::new();
    let mut x = n;
    let mut y = m;
    let mut d = found_d;
    loop {
        if d == 0 {
            while x > 0 && y > 0 {
                x -= 1;
                y -= 1;
                matches.push((x, y));
            }
            break;
        }
        let v = &trace[d as usize];
        let k = x as isize - y as isize;
        let prev_k = if k == -d || (k != d && v[(k - 1 + offset) as usize] < v[(k + 1 + offset) as usize])
        {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = (prev_x as isize - prev_k) as usize;
        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            matches.push((x, y));
        }
        x = prev_x;
        y = prev_y;
        d -= 1;
    }
    matches.reverse();
    matches
}

/// Turns the matched pairs into maximal mismatching regions.
fn collect_edits(matches: &[(usize, usize)], old_len: usize, new_len: usize) -> Vec<Edit> {
    let mut edits = Vec::new();
    let mut next_old = 0;
    let mut next_new = 0;
    for &(match_old, match_new) in matches {
        if next_old < match_old || next_new < match_new {
            edits.push(Edit {
                begin_old: next_old,
                end_old: match_old,
                begin_new: next_new,
                end_new: match_new,
            });
        }
        next_old = match_old + 1;
        next_new = match_new + 1;
    }
    if next_old < old_len || next_new < new_len {
        edits.push(Edit {
            begin_old: next_old,
            end_old: old_len,
            begin_new: next_new,
            end_new: new_len,
        });
    }
    edits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_inputs_yield_no_edits() {
        let a = lines(&["a", "b", "c"]);
        assert!(diff(&a, &a).is_empty());
        assert!(diff::<String>(&[], &[]).is_empty());
    }

    #[test]
    fn single_line_replacement() {
        let a = lines(&["a", "b", "c"]);
        let b = lines(&["a", "x", "c"]);
        let edits = diff(&a, &b);
        assert_eq!(
            edits,
            vec![Edit { begin_old: 1, end_old: 2, begin_new: 1, end_new: 2 }]
        );
        assert_eq!(edits[0].kind(), EditKind::Replace);
    }

    #[test]
    fn insert_into_empty_file() {
        let b = lines(&["l1", "l2", "l3"]);
        let edits = diff(&[], &b);
        assert_eq!(
            edits,
            vec![Edit { begin_old: 0, end_old: 0, begin_new: 0, end_new: 3 }]
        );
        assert_eq!(edits[0].kind(), EditKind::Insert);
    }

    #[test]
    fn pure_deletion() {
        let a = lines(&["a", "b", "c", "d"]);
        let b = lines(&["a", "d"]);
        let edits = diff(&a, &b);
        assert_eq!(
            edits,
            vec![Edit { begin_old: 1, end_old: 3, begin_new: 1, end_new: 1 }]
        );
        assert_eq!(edits[0].kind(), EditKind::Delete);
    }

    #[test]
    fn disjoint_edits_are_ordered_and_non_overlapping() {
        let a = lines(&["a", "b", "c", "d", "e"]);
        let b = lines(&["a", "x", "c", "d", "e", "f"]);
        let edits = diff(&a, &b);
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0], Edit { begin_old: 1, end_old: 2, begin_new: 1, end_new: 2 });
        assert_eq!(edits[1], Edit { begin_old: 5, end_old: 5, begin_new: 5, end_new: 6 });
        for pair in edits.windows(2) {
            assert!(pair[0].end_old <= pair[1].begin_old);
        }
    }

    #[test]
    fn replace_everything() {
        let a = lines(&["a", "b"]);
        let b = lines(&["x", "y", "z"]);
        let edits = diff(&a, &b);
        assert_eq!(
            edits,
            vec![Edit { begin_old: 0, end_old: 2, begin_new: 0, end_new: 3 }]
        );
    }

    #[test]
    fn applying_edits_reproduces_the_new_sequence() {
        let a = lines(&["fn main() {", "    old();", "}", "", "// tail"]);
        let b = lines(&["fn main() {", "    new();", "    extra();", "}", "// tail"]);
        let edits = diff(&a, &b);

        // Replay the script by hand: walk edits in order, copying matched
        // regions and substituting new-range lines.
        let mut rebuilt = Vec::new();
        let mut cursor = 0;
        for edit in &edits {
            rebuilt.extend_from_slice(&a[cursor..edit.begin_old]);
            rebuilt.extend_from_slice(&b[edit.begin_new..edit.end_new]);
            cursor = edit.end_old;
        }
        rebuilt.extend_from_slice(&a[cursor..]);
        assert_eq!(rebuilt, b);
    }
}
