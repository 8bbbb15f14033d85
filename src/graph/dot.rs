// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::graph::{Edge, EdgeId, Node, NodeId};

/// Render nodes and edges as a Graphviz `digraph`.
///
/// Nodes are labelled `name (kind)`; edges carry `output -> input` and
/// their capacity. Deferred edges are dashed, execution dependencies
/// dotted, and optional ones grey.
pub(crate) fn render(
    nodes: &[Node],
    edges: &BTreeMap<EdgeId, Edge>,
    ordering: &[(NodeId, NodeId)],
) -> String {
    let mut out = String::from("digraph pipeline {\n    rankdir=LR;\n    node [shape=box];\n");

    for node in nodes {
        let _ = writeln!(
            out,
            "    n{} [label=\"{} ({})\"];",
            node.id().0,
            escape(node.name()),
            node.kind()
        );
    }

    for edge in edges.values() {
        let source = edge.source();
        if edge.is_trigger() {
            for target in edge.consumers() {
                let _ = writeln!(
                    out,
                    "    n{} -> n{} [label=\"after [{}]\", style=dotted];",
                    source.node.0,
                    target.node.0,
                    edge.capacity()
                );
            }
            continue;
        }
        for target in edge.consumers() {
            let style = if edge.is_deferred() { ", style=dashed" } else { "" };
            let _ = writeln!(
                out,
                "    n{} -> n{} [label=\"{} -> {} [{}]\"{}];",
                source.node.0,
                target.node.0,
                escape(&source.port),
                escape(&target.port),
                edge.capacity(),
                style
            );
        }
    }

    for (before, after) in ordering {
        let _ = writeln!(
            out,
            "    n{} -> n{} [label=\"after\", style=dotted, color=grey50];",
            before.0, after.0
        );
    }

    out.push_str("}\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
