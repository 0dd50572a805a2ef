//! Graph subsystem: snapshot building, force layout and the background
//! orchestration that keeps both off the interactive thread.

pub mod builder;
pub mod layout;
pub mod orchestrator;

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::filenames::NoteId;

/// Global graph (whole vault) or local neighborhood around a center note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphMode {
    Global,
    Local,
}

/// A node either has a real note file behind it, or exists only because
/// something links to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Real,
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: NoteId,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub mode: GraphMode,
    pub depth: u8,
    /// Node/edge counts before any pruning or locality selection.
    pub nodes_all: usize,
    pub edges_all: usize,
    pub time_ms: f64,
    /// Iteration count the layout engine should run for this snapshot.
    pub layout_steps: usize,
}

/// Immutable result of a graph build.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<(NoteId, NoteId)>,
    pub stats: GraphStats,
}

/// Node positions produced by the layout engine. The renderer animates from
/// its previous positions to these; the engine keeps no layout state.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutResult {
    pub positions: HashMap<NoteId, (f64, f64)>,
}

/// Everything a background build needs, captured at request time. Holds
/// copies only — never a handle to the live index.
#[derive(Debug, Clone)]
pub struct GraphContext {
    pub mode: GraphMode,
    pub depth: u8,
    pub center: Option<NoteId>,
    pub outgoing_snapshot: HashMap<NoteId, Vec<NoteId>>,
    pub existing_ids: HashSet<NoteId>,
    pub max_nodes: usize,
    pub max_steps: usize,
}

impl GraphContext {
    pub const DEFAULT_MAX_NODES: usize = 400;
    pub const DEFAULT_MAX_STEPS: usize = 250;
}
