//! Graph snapshot builder.
//!
//! Pure computation over an immutable index snapshot: no disk I/O, no access
//! to live engine state. Runs on a background worker via the orchestrator.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::{GraphContext, GraphMode, GraphNode, GraphSnapshot, GraphStats, NodeKind};
use crate::filenames::NoteId;

/// Floor applied to `max_nodes`/`max_steps` so a misconfigured caller can't
/// starve the graph into uselessness.
const MIN_MAX_NODES: usize = 50;
const MIN_MAX_STEPS: usize = 30;

pub fn build_snapshot(ctx: &GraphContext) -> GraphSnapshot {
    let t0 = Instant::now();

    let depth = ctx.depth.clamp(1, 2);
    let max_nodes = ctx.max_nodes.max(MIN_MAX_NODES);
    let max_steps = ctx.max_steps.max(MIN_MAX_STEPS);

    // Union existing notes with everything the snapshot mentions; targets
    // without a backing file become virtual nodes.
    let mut id_set: HashSet<NoteId> = ctx.existing_ids.clone();
    let mut edges_all: Vec<(NoteId, NoteId)> = Vec::new();
    let mut seen_edges: HashSet<(NoteId, NoteId)> = HashSet::new();

    for (src, dst_list) in sorted_snapshot(&ctx.outgoing_snapshot) {
        id_set.insert(src.clone());
        for dst in dst_list {
            id_set.insert(dst.clone());
            if *src != *dst {
                let edge = (src.clone(), dst.clone());
                if seen_edges.insert(edge.clone()) {
                    edges_all.push(edge);
                }
            }
        }
    }

    let mut nodes_all: Vec<NoteId> = id_set.iter().cloned().collect();
    nodes_all.sort_by(NoteId::cmp_ignore_case);

    let total_nodes = nodes_all.len();
    let total_edges = edges_all.len();

    // Cap global graphs by degree: layout is O(n^2) per step, so an uncapped
    // vault-wide graph would blow the frame budget. The center note is never
    // evicted from its own graph.
    if ctx.mode == GraphMode::Global && nodes_all.len() > max_nodes {
        let mut degree: HashMap<&NoteId, usize> = nodes_all.iter().map(|n| (n, 0)).collect();
        for (a, b) in &edges_all {
            if let Some(d) = degree.get_mut(a) {
                *d += 1;
            }
            if let Some(d) = degree.get_mut(b) {
                *d += 1;
            }
        }

        let mut ranked = nodes_all.clone();
        ranked.sort_by(|a, b| {
            degree[b]
                .cmp(&degree[a])
                .then_with(|| NoteId::cmp_ignore_case(a, b))
        });
        let mut keep: Vec<NoteId> = ranked.into_iter().take(max_nodes).collect();

        if let Some(center) = &ctx.center {
            if id_set.contains(center) && !keep.contains(center) {
                let last = keep.len() - 1;
                keep[last] = center.clone();
            }
        }

        let keep_set: HashSet<&NoteId> = keep.iter().collect();
        nodes_all.retain(|n| keep_set.contains(n));
        edges_all.retain(|(a, b)| keep_set.contains(a) && keep_set.contains(b));
    }

    let mut nodes = nodes_all;
    let mut edges = edges_all;

    // Local neighborhood: BFS over an undirected view for exactly `depth`
    // hops. Without a usable center we fall back to the global set.
    if ctx.mode == GraphMode::Local {
        if let Some(center) = ctx.center.as_ref().filter(|c| nodes.contains(c)) {
            let mut adj: HashMap<&NoteId, Vec<&NoteId>> =
                nodes.iter().map(|n| (n, Vec::new())).collect();
            for (a, b) in &edges {
                if adj.contains_key(a) && adj.contains_key(b) {
                    adj.get_mut(a).unwrap().push(b);
                    adj.get_mut(b).unwrap().push(a);
                }
            }

            let mut visited: HashSet<&NoteId> = HashSet::from([center]);
            let mut frontier: Vec<&NoteId> = vec![center];
            for _ in 0..depth {
                let mut next: Vec<&NoteId> = Vec::new();
                for v in &frontier {
                    for &n in adj.get(v).into_iter().flatten() {
                        if visited.insert(n) {
                            next.push(n);
                        }
                    }
                }
                frontier = next;
            }

            let visited: HashSet<NoteId> = visited.into_iter().cloned().collect();
            let mut selected: Vec<NoteId> = visited.iter().cloned().collect();
            selected.sort_by(NoteId::cmp_ignore_case);
            nodes = selected;
            edges.retain(|(a, b)| visited.contains(a) && visited.contains(b));
        }
    }

    let layout_steps = suggest_layout_steps(nodes.len(), max_steps);

    let nodes = nodes
        .into_iter()
        .map(|id| {
            let kind = if ctx.existing_ids.contains(&id) {
                NodeKind::Real
            } else {
                NodeKind::Virtual
            };
            GraphNode { id, kind }
        })
        .collect();

    GraphSnapshot {
        nodes,
        edges,
        stats: GraphStats {
            mode: ctx.mode,
            depth,
            nodes_all: total_nodes,
            edges_all: total_edges,
            time_ms: t0.elapsed().as_secs_f64() * 1000.0,
            layout_steps,
        },
    }
}

/// Fewer layout iterations for larger graphs, clamped to [40, max_steps].
fn suggest_layout_steps(node_count: usize, max_steps: usize) -> usize {
    let n = node_count.max(1) as f64;
    let dynamic = (20.0 + 10.0 * n.sqrt()) as usize;
    dynamic.clamp(40, max_steps.max(40))
}

/// Iterate the adjacency snapshot in stable key order so edge first-seen
/// ordering is deterministic across builds of the same snapshot.
fn sorted_snapshot(
    snapshot: &HashMap<NoteId, Vec<NoteId>>,
) -> impl Iterator<Item = (&NoteId, &Vec<NoteId>)> {
    let mut entries: Vec<_> = snapshot.iter().collect();
    entries.sort_by(|(a, _), (b, _)| NoteId::cmp_ignore_case(a, b));
    entries.into_iter()
}
