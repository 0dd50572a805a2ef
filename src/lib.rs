//! notegraph — the note-graph engine behind a local wikilink note app.
//!
//! The engine maintains a bidirectional link index over canonical note ids,
//! builds graph snapshots (global or neighborhood-limited) with a
//! force-directed layout on background workers, and propagates note renames
//! across every file in the vault with backups, atomic writes and
//! cooperative cancellation. Editor, preview and window chrome live
//! elsewhere and talk to the engine through `vault::NoteStore` and the
//! orchestrator/service callbacks.

pub mod error;
pub mod filenames;
pub mod graph;
pub mod link_index;
pub mod rename;
pub mod vault;
pub mod wikilinks;



pub use error::{EngineError, Result};
pub use filenames::{safe_filename, NoteId};
pub use graph::orchestrator::GraphOrchestrator;
pub use graph::{GraphContext, GraphMode, GraphSnapshot, LayoutResult, NodeKind};
pub use link_index::LinkIndex;
pub use rename::{RenameResult, RenameService};
pub use vault::{FsVault, NoteStore};
