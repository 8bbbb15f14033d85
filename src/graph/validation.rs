// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ordering and cycle detection over node adjacency lists.
//!
//! Nodes are plain indices here; `adjacency[i]` lists the nodes that consume
//! an output of node `i` over a non-deferred edge. Both algorithms run in
//! O(V + E).
//!
//! ## Topological order
//! Kahn's algorithm with a min-heap as the ready set, so ties between
//! independent nodes always break toward the node added first. The sync
//! scheduler relies on this for tick-to-tick determinism.
//!
//! ## Cycle detection
//! DFS with a recursion stack (gray set). When a back edge to a gray node
//! is found, the path from that node to the current one is the cycle, which
//! is reported in full for diagnostics, e.g. `[a, b, c, a]`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Topologically sort `adjacency`, or return a cycle if there is one.
pub fn topological_order(adjacency: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let mut in_degree = vec![0usize; adjacency.len()];
    for targets in adjacency {
        for &target in targets {
            in_degree[target] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| Reverse(node))
        .collect();

    let mut order = Vec::with_capacity(adjacency.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &target in &adjacency[node] {
            in_degree[target] -= 1;
            if in_degree[target] == 0 {
                ready.push(Reverse(target));
            }
        }
    }

    if order.len() == adjacency.len() {
        Ok(order)
    } else {
        // Kahn stalled, so a cycle exists; DFS recovers its path.
        Err(find_cycle(adjacency).unwrap_or_default())
    }
}

/// First cycle found by DFS, as a closed path (first node repeated last).
pub fn find_cycle(adjacency: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut visited = vec![false; adjacency.len()];
    let mut on_stack = vec![false; adjacency.len()];
    let mut path = Vec::new();

    for start in 0..adjacency.len() {
        if !visited[start] {
            if let Some(cycle) =
                dfs_cycle(start, adjacency, &mut visited, &mut on_stack, &mut path)
            {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs_cycle(
    node: usize,
    adjacency: &[Vec<usize>],
    visited: &mut [bool],
    on_stack: &mut [bool],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    visited[node] = true;
    on_stack[node] = true;
    path.push(node);

    for &next in &adjacency[node] {
        if !visited[next] {
            if let Some(cycle) = dfs_cycle(next, adjacency, visited, on_stack, path) {
                return Some(cycle);
            }
        } else if on_stack[next] {
            let start = path.iter().position(|&n| n == next).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(next);
            return Some(cycle);
        }
    }

    on_stack[node] = false;
    path.pop();
    None
}
