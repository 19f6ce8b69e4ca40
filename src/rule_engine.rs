/// The rule engine: one sorting pass over the top-level entries of a directory.
///
/// A pass lists the direct entries of the target directory, makes sure every
/// active rule's destination folder exists, then moves each entry into the
/// folder of the first rule that claims it. Anything already sitting at the
/// destination is removed first. Nothing is undone if the pass fails halfway.
use crate::routing_rule::{EntryKind, RuleSet};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The filesystem step that failed during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOperation {
    CreateFolder,
    ListEntry,
    RemoveConflict,
    Move,
}

impl fmt::Display for FsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FsOperation::CreateFolder => "create folder",
            FsOperation::ListEntry => "read entry in",
            FsOperation::RemoveConflict => "remove existing",
            FsOperation::Move => "move",
        };
        f.write_str(text)
    }
}

/// Errors that abort a pass.
#[derive(Debug, Error)]
pub enum PassError {
    /// The target directory is missing or cannot be listed.
    #[error("Cannot read directory {}: {source}", path.display())]
    InvalidTarget { path: PathBuf, source: io::Error },

    /// A folder creation, conflict removal or move failed.
    #[error("Failed to {operation} {}: {source}", path.display())]
    OperationFailed {
        operation: FsOperation,
        path: PathBuf,
        source: io::Error,
    },
}

impl PassError {
    fn failed(operation: FsOperation, path: &Path, source: io::Error) -> Self {
        PassError::OperationFailed {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for rule engine operations.
pub type PassResult<T> = Result<T, PassError>;

/// Knobs that change how a pass treats its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// When false, top-level folders that are themselves destinations of an
    /// active rule are never classified or moved.
    pub rescan_destinations: bool,
}

/// An entry move decided by the rules, before it is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Position of the winning rule in the rule set.
    pub rule_index: usize,
    pub folder: String,
    pub kind: EntryKind,
}

/// A move that was carried out during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub rule_index: usize,
    pub kind: EntryKind,
    /// True if something already at the destination was deleted first.
    pub replaced_existing: bool,
}

/// Outcome of a successful pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub moves: Vec<MoveRecord>,
    pub folders_created: Vec<PathBuf>,
    /// Entries no active rule claimed.
    pub left_in_place: usize,
    /// Destination folders skipped instead of being classified.
    pub skipped_destinations: usize,
}

impl PassSummary {
    pub fn moved(&self) -> usize {
        self.moves.len()
    }

    pub fn replaced(&self) -> usize {
        self.moves.iter().filter(|m| m.replaced_existing).count()
    }
}

/// A top-level entry as seen at listing time.
#[derive(Debug, Clone)]
struct Entry {
    file_name: OsString,
    name: String,
    path: PathBuf,
    kind: EntryKind,
}

/// Sorts the entries of a directory according to a [`RuleSet`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine {
    options: PassOptions,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: PassOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> PassOptions {
        self.options
    }

    /// Runs one full pass over `target`.
    ///
    /// Entries are listed before any destination folder is created, so a
    /// folder created by this pass is never itself classified by it.
    ///
    /// # Errors
    ///
    /// Returns [`PassError::InvalidTarget`] if `target` cannot be listed and
    /// [`PassError::OperationFailed`] on the first failing filesystem step.
    /// Moves performed before the failure are kept.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use foldersort::routing_rule::{RoutingRule, RuleSet};
    /// use foldersort::rule_engine::RuleEngine;
    /// use std::path::Path;
    ///
    /// let rules = RuleSet::new(vec![RoutingRule::new("PDFs", ".pdf", "")]).unwrap();
    /// match RuleEngine::new().run_pass(Path::new("/home/me/Downloads"), &rules) {
    ///     Ok(summary) => println!("Moved {} entries", summary.moved()),
    ///     Err(e) => eprintln!("Error: {}", e),
    /// }
    /// ```
    pub fn run_pass(&self, target: &Path, rules: &RuleSet) -> PassResult<PassSummary> {
        let mut summary = PassSummary::default();
        let entries = self.list_entries(target, rules, &mut summary.skipped_destinations)?;

        for folder in rules.active_folders() {
            let folder_path = target.join(folder);
            if !folder_path.exists() {
                fs::create_dir_all(&folder_path)
                    .map_err(|e| PassError::failed(FsOperation::CreateFolder, &folder_path, e))?;
                debug!("Created folder {}", folder_path.display());
                summary.folders_created.push(folder_path);
            }
        }

        for entry in &entries {
            let Some(plan) = Self::classify(target, entry, rules) else {
                summary.left_in_place += 1;
                continue;
            };

            if Self::lands_on_itself(&plan) {
                warn!(
                    "{} cannot be moved into itself ({}), leaving it in place",
                    plan.source.display(),
                    plan.destination.display()
                );
                summary.left_in_place += 1;
                continue;
            }

            let replaced_existing = Self::resolve_conflict(&plan.destination, plan.kind)?;
            Self::relocate(&plan.source, &plan.destination, plan.kind)?;
            debug!(
                "Moved {} {} -> {}",
                plan.kind.label(),
                plan.source.display(),
                plan.destination.display()
            );

            summary.moves.push(MoveRecord {
                source: plan.source,
                destination: plan.destination,
                rule_index: plan.rule_index,
                kind: plan.kind,
                replaced_existing,
            });
        }

        info!(
            "Pass over {} complete: {} moved, {} left in place",
            target.display(),
            summary.moved(),
            summary.left_in_place
        );
        Ok(summary)
    }

    /// Computes what a pass would do without touching the filesystem.
    pub fn plan_pass(&self, target: &Path, rules: &RuleSet) -> PassResult<Vec<PlannedMove>> {
        let mut skipped = 0;
        let entries = self.list_entries(target, rules, &mut skipped)?;
        Ok(entries
            .iter()
            .filter_map(|entry| Self::classify(target, entry, rules))
            .collect())
    }

    /// Clears the way for a move by deleting whatever sits at `destination`.
    ///
    /// A directory entry replaces a conflicting directory recursively. A file
    /// entry only ever deletes a single file; a directory in its way makes
    /// the removal fail. Returns true if something was deleted.
    pub fn resolve_conflict(destination: &Path, kind: EntryKind) -> PassResult<bool> {
        let metadata = match fs::symlink_metadata(destination) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(PassError::failed(FsOperation::RemoveConflict, destination, e)),
        };

        let removal = match kind {
            EntryKind::Directory if metadata.is_dir() => fs::remove_dir_all(destination),
            _ => fs::remove_file(destination),
        };
        removal.map_err(|e| PassError::failed(FsOperation::RemoveConflict, destination, e))?;

        warn!("Replaced existing {}", destination.display());
        Ok(true)
    }

    fn list_entries(
        &self,
        target: &Path,
        rules: &RuleSet,
        skipped_destinations: &mut usize,
    ) -> PassResult<Vec<Entry>> {
        let read_dir = fs::read_dir(target).map_err(|e| PassError::InvalidTarget {
            path: target.to_path_buf(),
            source: e,
        })?;

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry =
                dir_entry.map_err(|e| PassError::failed(FsOperation::ListEntry, target, e))?;
            let file_name = dir_entry.file_name();
            let name = file_name.to_string_lossy().to_string();

            if !self.options.rescan_destinations && rules.is_destination(&name) {
                debug!("Skipping destination folder {}", name);
                *skipped_destinations += 1;
                continue;
            }

            let path = dir_entry.path();
            entries.push(Entry {
                kind: EntryKind::of(&path),
                file_name,
                name,
                path,
            });
        }

        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    fn classify(target: &Path, entry: &Entry, rules: &RuleSet) -> Option<PlannedMove> {
        let (rule_index, rule) = rules.first_match(&entry.name, entry.kind)?;
        let folder = rule.destination_folder().to_string();
        Some(PlannedMove {
            source: entry.path.clone(),
            destination: target.join(&folder).join(&entry.file_name),
            rule_index,
            folder,
            kind: entry.kind,
        })
    }

    /// True if the destination is the source itself or lies inside it,
    /// also when a destination folder links back into the target. Clearing
    /// such a destination would delete the entry being moved.
    fn lands_on_itself(plan: &PlannedMove) -> bool {
        if plan.destination.starts_with(&plan.source) {
            return true;
        }
        let (Some(from), Some(to), Some(name)) = (
            plan.source.parent(),
            plan.destination.parent(),
            plan.source.file_name(),
        ) else {
            return false;
        };
        match (fs::canonicalize(from), fs::canonicalize(to)) {
            (Ok(from), Ok(to)) => to == from || to.starts_with(from.join(name)),
            _ => false,
        }
    }

    fn relocate(source: &Path, destination: &Path, kind: EntryKind) -> PassResult<()> {
        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(e) if kind == EntryKind::File && e.kind() == io::ErrorKind::CrossesDevices => {
                debug!("Rename across devices, copying {}", source.display());
                Self::copy_then_remove(source, destination)
            }
            Err(e) => Err(PassError::failed(FsOperation::Move, source, e)),
        }
    }

    /// Moves a file by copying it and deleting the original. The original
    /// is only removed once the copy succeeded.
    fn copy_then_remove(source: &Path, destination: &Path) -> PassResult<()> {
        fs::copy(source, destination)
            .map_err(|e| PassError::failed(FsOperation::Move, source, e))?;
        fs::remove_file(source).map_err(|e| PassError::failed(FsOperation::Move, source, e))
    }
}
