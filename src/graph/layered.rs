// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The internal layered layout, used when Graphviz is not installed.
//!
//! Classic Sugiyama-lite: reverse the cycle-closing edges found by a DFS,
//! assign longest-path ranks, order each rank once by the median position
//! of its predecessors and place ranks along the main axis. The result is
//! deterministic; ties always fall back to declaration order.

use super::Direction;

/// Computes node center positions. `sizes` are (width, height) pairs;
/// `edges` are (from, to) index pairs with no self-edges.
pub fn layout(
    sizes: &[(f64, f64)],
    edges: &[(usize, usize)],
    direction: Direction,
    node_gap: f64,
    rank_gap: f64,
) -> Vec<(f64, f64)> {
    let n = sizes.len();
    if n == 0 {
        return Vec::new();
    }

    let dag = reverse_cycle_edges(n, edges);
    let ranks = assign_ranks(n, &dag);
    let order = order_within_ranks(n, &dag, &ranks);

    place(sizes, &order, direction, node_gap, rank_gap)
}

/// DFS from every node in declaration order; a gray→gray edge closes a
/// cycle and is reversed. The returned edge list is acyclic.
fn reverse_cycle_edges(n: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(u, v) in edges {
        adj[u].push(v);
    }

    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    let mut color = vec![WHITE; n];
    let mut dag = Vec::with_capacity(edges.len());

    for start in 0..n {
        if color[start] != WHITE {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        color[start] = GRAY;

        while let Some(&(u, next)) = stack.last() {
            if next < adj[u].len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let v = adj[u][next];
                match color[v] {
                    WHITE => {
                        dag.push((u, v));
                        color[v] = GRAY;
                        stack.push((v, 0));
                    }
                    GRAY => dag.push((v, u)),
                    _ => dag.push((u, v)),
                }
            } else {
                color[u] = BLACK;
                stack.pop();
            }
        }
    }

    dag
}

/// Longest-path rank from the sources of the DAG.
fn assign_ranks(n: usize, dag: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(u, v) in dag {
        adj[u].push(v);
        indegree[v] += 1;
    }

    let mut remaining = indegree.clone();
    let mut done = vec![false; n];
    let mut rank = vec![0usize; n];

    for _ in 0..n {
        // Smallest-index ready node keeps the order reproducible.
        let u = match (0..n).find(|&u| !done[u] && remaining[u] == 0) {
            Some(u) => u,
            None => break,
        };
        done[u] = true;
        for &v in &adj[u] {
            rank[v] = rank[v].max(rank[u] + 1);
            remaining[v] -= 1;
        }
    }

    rank
}

/// One top-down ordering pass: nodes sort by the median current position of
/// their predecessors, declaration index breaking ties.
fn order_within_ranks(n: usize, dag: &[(usize, usize)], ranks: &[usize]) -> Vec<Vec<usize>> {
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut by_rank: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
    for u in 0..n {
        by_rank[ranks[u]].push(u);
    }

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(u, v) in dag {
        preds[v].push(u);
    }

    let mut pos = vec![0.0f64; n];
    for row in &by_rank {
        for (i, &u) in row.iter().enumerate() {
            pos[u] = i as f64;
        }
    }

    for r in 1..by_rank.len() {
        let mut keyed: Vec<(f64, usize)> = by_rank[r]
            .iter()
            .map(|&u| {
                let mut positions: Vec<f64> = preds[u].iter().map(|&p| pos[p]).collect();
                let key = if positions.is_empty() {
                    pos[u]
                } else {
                    positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                    let mid = positions.len() / 2;
                    if positions.len() % 2 == 1 {
                        positions[mid]
                    } else {
                        (positions[mid - 1] + positions[mid]) / 2.0
                    }
                };
                (key, u)
            })
            .collect();
        keyed.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        by_rank[r] = keyed.into_iter().map(|(_, u)| u).collect();
        for (i, &u) in by_rank[r].iter().enumerate() {
            pos[u] = i as f64;
        }
    }

    by_rank
}

fn place(
    sizes: &[(f64, f64)],
    order: &[Vec<usize>],
    direction: Direction,
    node_gap: f64,
    rank_gap: f64,
) -> Vec<(f64, f64)> {
    let cross_size = |u: usize| match direction {
        Direction::Tb | Direction::Bt => sizes[u].0,
        Direction::Lr | Direction::Rl => sizes[u].1,
    };
    let main_size = |u: usize| match direction {
        Direction::Tb | Direction::Bt => sizes[u].1,
        Direction::Lr | Direction::Rl => sizes[u].0,
    };

    let spans: Vec<f64> = order
        .iter()
        .map(|row| {
            let total: f64 = row.iter().map(|&u| cross_size(u)).sum();
            let gaps = node_gap * row.len().saturating_sub(1) as f64;
            total + gaps
        })
        .collect();
    let max_span = spans.iter().copied().fold(0.0, f64::max);

    let mut centers = vec![(0.0, 0.0); sizes.len()];
    let mut main_origin = 0.0;
    for (row, &span) in order.iter().zip(&spans) {
        let row_main = row.iter().map(|&u| main_size(u)).fold(0.0, f64::max);
        let mut cross_cursor = (max_span - span) / 2.0;
        for &u in row {
            let cross_center = cross_cursor + cross_size(u) / 2.0;
            let main_center = main_origin + row_main / 2.0;
            centers[u] = match direction {
                Direction::Tb => (cross_center, main_center),
                Direction::Bt => (cross_center, -main_center),
                Direction::Lr => (main_center, cross_center),
                Direction::Rl => (-main_center, cross_center),
            };
            cross_cursor += cross_size(u) + node_gap;
        }
        main_origin += row_main + rank_gap;
    }

    centers
}
