//! Force-directed 2-D layout.
//!
//! Simple physical model: inverse-square repulsion between every node pair,
//! linear spring attraction along edges, damped velocity integration.
//! Deterministic — positions are a pure function of (nodes, edges, seed,
//! steps), so layouts are reproducible and unit-testable. The O(n^2)
//! repulsion pass is the reason the snapshot builder caps node counts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use super::{GraphSnapshot, LayoutResult};
use crate::filenames::NoteId;

pub const DEFAULT_SEED: u64 = 42;

const K_REP: f64 = 9000.0;
const K_ATT: f64 = 0.020;
const DAMP: f64 = 0.85;
const VEL_SCALE: f64 = 0.0015;
const REP_EPS: f64 = 0.01;
const INIT_SPREAD: f64 = 250.0;

pub fn layout_snapshot(snapshot: &GraphSnapshot, seed: u64) -> LayoutResult {
    let nodes: Vec<&NoteId> = snapshot.nodes.iter().map(|n| &n.id).collect();
    let edges: Vec<(&NoteId, &NoteId)> = snapshot
        .edges
        .iter()
        .map(|(a, b)| (a, b))
        .collect();
    layout(&nodes, &edges, seed, snapshot.stats.layout_steps)
}

pub fn layout(
    nodes: &[&NoteId],
    edges: &[(&NoteId, &NoteId)],
    seed: u64,
    steps: usize,
) -> LayoutResult {
    let n = nodes.len();
    let index: HashMap<&NoteId, usize> = nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    // Edges are simulated on indices; edges pointing outside the node set
    // (shouldn't happen, but snapshots are caller-supplied) are ignored.
    let edge_idx: Vec<(usize, usize)> = edges
        .iter()
        .filter_map(|(a, b)| Some((*index.get(a)?, *index.get(b)?)))
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut pos: Vec<(f64, f64)> = (0..n)
        .map(|_| {
            (
                rng.gen_range(-INIT_SPREAD..INIT_SPREAD),
                rng.gen_range(-INIT_SPREAD..INIT_SPREAD),
            )
        })
        .collect();
    let mut vel: Vec<(f64, f64)> = vec![(0.0, 0.0); n];

    for _ in 0..steps {
        let mut force: Vec<(f64, f64)> = vec![(0.0, 0.0); n];

        // pairwise repulsion, O(n^2)
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = pos[i].0 - pos[j].0;
                let dy = pos[i].1 - pos[j].1;
                let dist2 = dx * dx + dy * dy + REP_EPS;
                let f = K_REP / dist2;
                let fx = f * dx;
                let fy = f * dy;
                force[i].0 += fx;
                force[i].1 += fy;
                force[j].0 -= fx;
                force[j].1 -= fy;
            }
        }

        // linear spring along edges
        for &(a, b) in &edge_idx {
            let dx = pos[b].0 - pos[a].0;
            let dy = pos[b].1 - pos[a].1;
            let fx = K_ATT * dx;
            let fy = K_ATT * dy;
            force[a].0 += fx;
            force[a].1 += fy;
            force[b].0 -= fx;
            force[b].1 -= fy;
        }

        // damped integration
        for i in 0..n {
            vel[i].0 = vel[i].0 * DAMP + force[i].0 * VEL_SCALE;
            vel[i].1 = vel[i].1 * DAMP + force[i].1 * VEL_SCALE;
            pos[i].0 += vel[i].0;
            pos[i].1 += vel[i].1;
        }
    }

    LayoutResult {
        positions: nodes
            .iter()
            .enumerate()
            .map(|(i, id)| ((*id).clone(), pos[i]))
            .collect(),
    }
}
