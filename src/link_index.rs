//! Bidirectional wikilink index.
//!
//! outgoing[src] = {dst1, dst2, ...}
//! incoming[dst] = {src1, src2, ...}
//!
//! `dst` may be virtual (linked to, but no note file exists yet). The live
//! index is owned by the interactive thread and mutated only there;
//! background workers receive `snapshot()` copies, never the index itself.

use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::filenames::NoteId;
use crate::vault::{collect_note_files, NoteStore};
use crate::wikilinks::extract_targets;

#[derive(Debug, Default)]
pub struct LinkIndex {
    outgoing: HashMap<NoteId, HashSet<NoteId>>,
    incoming: HashMap<NoteId, HashSet<NoteId>>,
}

impl LinkIndex {
    pub fn new() -> LinkIndex {
        LinkIndex::default()
    }

    pub fn clear(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.incoming.is_empty()
    }

    /// Incrementally update the index for a single note.
    ///
    /// Returns true only if the note's outgoing set actually changed. The
    /// false path performs zero mutation, which is what keeps per-keystroke
    /// saves from triggering graph rebuilds.
    pub fn update_note(&mut self, id: &NoteId, text: &str) -> bool {
        let mut new_targets = extract_targets(text);
        // no self-links
        new_targets.remove(id);

        let old_targets = self.outgoing.get(id).cloned().unwrap_or_default();
        if new_targets == old_targets {
            return false;
        }

        // drop obsolete backlinks, pruning empty sets
        for removed in old_targets.difference(&new_targets) {
            if let Some(incoming_set) = self.incoming.get_mut(removed) {
                incoming_set.remove(id);
                if incoming_set.is_empty() {
                    self.incoming.remove(removed);
                }
            }
        }

        // add new backlinks
        for added in new_targets.difference(&old_targets) {
            self.incoming
                .entry(added.clone())
                .or_default()
                .insert(id.clone());
        }

        if new_targets.is_empty() {
            self.outgoing.remove(id);
        } else {
            self.outgoing.insert(id.clone(), new_targets);
        }

        true
    }

    /// Full rebuild from a storage collaborator. Unreadable notes are
    /// skipped (the note just drops out of the index), never fatal.
    pub fn rebuild_from_store<S: NoteStore + ?Sized>(&mut self, store: &S) {
        self.clear();

        let ids = match store.list() {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("Link index rebuild: listing notes failed: {}", e);
                return;
            }
        };

        for id in ids {
            match store.read(&id) {
                Ok(text) => {
                    self.update_note(&id, &text);
                }
                Err(e) => {
                    log::warn!("Link index rebuild: skipping {}: {}", id, e);
                }
            }
        }
    }

    /// Full rebuild straight from a vault directory. File reads run in
    /// parallel; index mutation stays serial (single-writer).
    pub fn rebuild_from_vault(&mut self, vault_dir: &Path) {
        self.clear();

        let files = collect_note_files(vault_dir);
        let notes: Vec<(NoteId, String)> = files
            .par_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_string_lossy().to_string();
                match fs::read_to_string(path) {
                    Ok(text) => Some((NoteId::from_canonical(stem), text)),
                    Err(e) => {
                        log::warn!("Link index rebuild: skipping {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();

        for (id, text) in notes {
            self.update_note(&id, &text);
        }
    }

    /// Notes linking to `id`, case-insensitive lexicographic order.
    pub fn backlinks_for(&self, id: &NoteId) -> Vec<NoteId> {
        let mut refs: Vec<NoteId> = self
            .incoming
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        refs.sort_by(NoteId::cmp_ignore_case);
        refs
    }

    /// Notes `id` links to, case-insensitive lexicographic order.
    pub fn links_from(&self, id: &NoteId) -> Vec<NoteId> {
        let mut refs: Vec<NoteId> = self
            .outgoing
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        refs.sort_by(NoteId::cmp_ignore_case);
        refs
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.outgoing.contains_key(id) || self.incoming.contains_key(id)
    }

    /// Immutable copy of the outgoing adjacency for background graph builds.
    /// Values are sorted so a snapshot of the same index state is always
    /// byte-identical (deterministic builds, deterministic tests).
    pub fn snapshot(&self) -> HashMap<NoteId, Vec<NoteId>> {
        self.outgoing
            .iter()
            .map(|(src, dsts)| {
                let mut dsts: Vec<NoteId> = dsts.iter().cloned().collect();
                dsts.sort_by(NoteId::cmp_ignore_case);
                (src.clone(), dsts)
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn assert_symmetric(&self) {
        for (src, dsts) in &self.outgoing {
            assert!(!dsts.contains(src), "self-loop on {}", src);
            assert!(!dsts.is_empty(), "empty outgoing set kept for {}", src);
            for dst in dsts {
                assert!(
                    self.incoming.get(dst).is_some_and(|s| s.contains(src)),
                    "missing incoming {} <- {}",
                    dst,
                    src
                );
            }
        }
        for (dst, srcs) in &self.incoming {
            assert!(!srcs.is_empty(), "empty incoming set kept for {}", dst);
            for src in srcs {
                assert!(
                    self.outgoing.get(src).is_some_and(|s| s.contains(dst)),
                    "missing outgoing {} -> {}",
                    src,
                    dst
                );
            }
        }
    }
}
