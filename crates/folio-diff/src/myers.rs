//! Shortest edit script between two sequences.
//!
//! Greedy diagonal search: for each edit distance `d` the furthest-reaching
//! `x` on every diagonal `k = x - y` is recorded, matches are followed along
//! the diagonal, and the frontier is snapshotted. The first `d` whose frontier
//! reaches the end of both sequences is the edit distance; the script is
//! rebuilt by walking the snapshots back from `d` to `0`.
//!
//! Runs in O((N+M)·D) time and keeps O(D²) snapshot memory.

use serde::{Deserialize, Serialize};

/// One operation of an edit script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditOp {
    /// The current old and new elements are equal.
    Equal,
    /// The current new element is inserted.
    Insert,
    /// The current old element is deleted.
    Delete,
}

/// Compute the shortest edit script turning `old` into `new`.
///
/// `eq` decides whether an old and a new element are equal. Two empty inputs
/// yield an empty script.
pub fn myers_diff<A, B, F>(old: &[A], new: &[B], mut eq: F) -> Vec<EditOp>
where
    F: FnMut(&A, &B) -> bool,
{
    let n = old.len() as isize;
    let m = new.len() as isize;
    if n == 0 && m == 0 {
        return Vec::new();
    }

    let max = n + m;
    let offset = max + 1;
    let mut v = vec![0isize; (2 * max + 3) as usize];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    for d in 0..=max {
        for k in (-d..=d).step_by(2) {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && eq(&old[x as usize], &new[y as usize]) {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                trace.push(snapshot(&v, d, offset));
                return backtrack(&trace, n, m);
            }
        }
        trace.push(snapshot(&v, d, offset));
    }

    // The loop always terminates by d = n + m.
    Vec::new()
}

/// Frontier values for diagonals `-d..=d`.
fn snapshot(v: &[isize], d: isize, offset: isize) -> Vec<isize> {
    v[(offset - d) as usize..=(offset + d) as usize].to_vec()
}

fn backtrack(trace: &[Vec<isize>], n: isize, m: isize) -> Vec<EditOp> {
    let mut ops = Vec::with_capacity((n + m) as usize);
    let mut x = n;
    let mut y = m;

    for d in (1..trace.len()).rev() {
        let d = d as isize;
        let prev = &trace[(d - 1) as usize];
        let reach = |k: isize| prev[(k + d - 1) as usize];

        let k = x - y;
        let prev_k = if k == -d || (k != d && reach(k - 1) < reach(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = reach(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            ops.push(EditOp::Equal);
            x -= 1;
            y -= 1;
        }
        if x == prev_x {
            ops.push(EditOp::Insert);
            y -= 1;
        } else {
            ops.push(EditOp::Delete);
            x -= 1;
        }
    }

    while x > 0 && y > 0 {
        ops.push(EditOp::Equal);
        x -= 1;
        y -= 1;
    }

    ops.reverse();
    ops
}
