//! Storage collaborator: how the engine touches note files on disk.
//!
//! The editor/UI side of the application is out of scope here; it talks to
//! the engine through `NoteStore` plus plain paths. The only on-disk state
//! the engine itself produces are `.bak` siblings (rename backups) and
//! timestamped recovery copies.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{EngineError, Result};
use crate::filenames::NoteId;

/// Contract between the engine and whatever owns note storage.
pub trait NoteStore: Send + Sync {
    fn list(&self) -> Result<Vec<NoteId>>;
    fn read(&self, id: &NoteId) -> Result<String>;
    fn write_atomic(&self, id: &NoteId, text: &str) -> Result<()>;
    fn exists(&self, id: &NoteId) -> bool;
}

/// Flat-directory vault: one `<id>.md` per note.
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> FsVault {
        FsVault { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn note_path(&self, id: &NoteId) -> PathBuf {
        self.root.join(format!("{}.md", id))
    }

    /// Create a note from a user-supplied title. Empty or uncanonicalizable
    /// titles are rejected synchronously; an already-existing note is left
    /// untouched. Returns the canonical id the note lives under.
    pub fn create_note(&self, title: &str) -> Result<NoteId> {
        let id = NoteId::try_new(title)?;
        self.ensure_note_exists(&id)?;
        Ok(id)
    }

    /// Create the note file with a heading skeleton if it does not exist.
    pub fn ensure_note_exists(&self, id: &NoteId) -> Result<()> {
        let path = self.note_path(id);
        if path.exists() {
            return Ok(());
        }
        atomic_write_text(&path, &format!("# {}\n\n", id))
    }
}

impl NoteStore for FsVault {
    fn list(&self) -> Result<Vec<NoteId>> {
        let ids = collect_note_files(&self.root)
            .into_iter()
            .filter_map(|p| {
                p.file_stem()
                    .map(|s| NoteId::from_canonical(s.to_string_lossy().to_string()))
            })
            .collect();
        Ok(ids)
    }

    fn read(&self, id: &NoteId) -> Result<String> {
        let path = self.note_path(id);
        fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(id.to_string())
            } else {
                EngineError::io(path, e)
            }
        })
    }

    fn write_atomic(&self, id: &NoteId, text: &str) -> Result<()> {
        atomic_write_text(&self.note_path(id), text)
    }

    fn exists(&self, id: &NoteId) -> bool {
        self.note_path(id).exists()
    }
}

/// All note files under `dir`, recursively, sorted by file name
/// (case-insensitive). Hidden directories and non-`.md` files are skipped,
/// which also keeps `.bak` backups and atomic-write temp files out.
pub fn collect_note_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| {
            !e.file_name()
                .to_string_lossy()
                .starts_with('.')
                || e.depth() == 0
        })
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path().extension().and_then(|x| x.to_str()) == Some("md")
        })
        .map(|e| e.into_path())
        .collect();

    files.sort_by_key(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    files
}

/// Atomic file write: write to a unique temp file in the same directory,
/// flush to stable storage, then rename into place. On any failure the temp
/// file is removed and the original is left untouched, so a crash or a sync
/// agent never observes a partially-written note.
pub fn atomic_write_text(path: &Path, text: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| EngineError::io(path, std::io::Error::other("path has no parent")))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }

    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let tmp_path = path.with_file_name(format!(
        ".{}.tmp-{}",
        file_name,
        Uuid::new_v4().simple()
    ));

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp_path).map_err(|e| EngineError::io(&tmp_path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| EngineError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| EngineError::io(&tmp_path, e))?;
        drop(file);
        fs::rename(&tmp_path, path).map_err(|e| EngineError::io(path, e))?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Best-effort emergency save used when a normal note save fails: a
/// timestamped copy under `recovery_dir`, so in-memory editor state is never
/// the only copy. Returns the recovery path.
pub fn write_recovery_copy(recovery_dir: &Path, note_path: &Path, text: &str) -> Result<PathBuf> {
    let stem = note_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let rec_path = recovery_dir.join(format!("{}.recovery.{}.md", stem, ts));
    atomic_write_text(&rec_path, text)?;
    Ok(rec_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_file_and_no_temp_litter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");

        atomic_write_text(&path, "hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");

        // no stray temp files
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        atomic_write_text(&path, "v1").unwrap();
        atomic_write_text(&path, "v2").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
    }

    #[test]
    fn test_collect_skips_hidden_and_non_md() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.md"), "").unwrap();
        fs::write(dir.path().join("A.md"), "").unwrap();
        fs::write(dir.path().join("A.md.bak"), "").unwrap();
        fs::write(dir.path().join("image.png"), "").unwrap();
        fs::create_dir(dir.path().join(".trash")).unwrap();
        fs::write(dir.path().join(".trash").join("c.md"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.md"), "").unwrap();

        let names: Vec<String> = collect_note_files(dir.path())
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["A.md", "b.md", "c.md"]);
    }

    #[test]
    fn test_fs_vault_round_trip() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path());
        let id = NoteId::new("My Note");

        vault.write_atomic(&id, "body").unwrap();
        assert!(vault.exists(&id));
        assert_eq!(vault.read(&id).unwrap(), "body");
        assert_eq!(vault.list().unwrap(), vec![id.clone()]);

        let missing = NoteId::new("nope");
        assert!(matches!(
            vault.read(&missing),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_ensure_note_exists_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path());
        let id = NoteId::new("Fresh");

        vault.ensure_note_exists(&id).unwrap();
        assert_eq!(vault.read(&id).unwrap(), "# Fresh\n\n");

        vault.write_atomic(&id, "edited").unwrap();
        vault.ensure_note_exists(&id).unwrap();
        assert_eq!(vault.read(&id).unwrap(), "edited");
    }

    #[test]
    fn test_create_note_rejects_unusable_titles() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path());

        assert!(matches!(
            vault.create_note(""),
            Err(EngineError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            vault.create_note("   "),
            Err(EngineError::InvalidIdentifier(_))
        ));
        assert!(collect_note_files(dir.path()).is_empty());

        let id = vault.create_note("Draft/1").unwrap();
        assert_eq!(id, NoteId::new("Draft-1"));
        assert_eq!(vault.read(&id).unwrap(), "# Draft-1\n\n");
    }

    #[test]
    fn test_recovery_copy_named_by_stem() {
        let dir = TempDir::new().unwrap();
        let rec = write_recovery_copy(dir.path(), Path::new("/vault/Important.md"), "text").unwrap();
        let name = rec.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Important.recovery."));
        assert!(name.ends_with(".md"));
        assert_eq!(fs::read_to_string(&rec).unwrap(), "text");
    }
}
