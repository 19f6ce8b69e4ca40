//! Routing rules that decide which destination folder an entry belongs to.
//!
//! A rule names a destination folder and optionally an extension and a keyword.
//! Rules are kept in an ordered [`RuleSet`]; the first matching rule wins.
//!
//! # Examples
//!
//! ```
//! use foldersort::routing_rule::{EntryKind, RoutingRule, RuleSet};
//!
//! let rules = RuleSet::new(vec![
//!     RoutingRule::new("PDFs", ".pdf", ""),
//!     RoutingRule::new("Invoices", "", "invoice"),
//! ])
//! .unwrap();
//!
//! let (index, rule) = rules.first_match("Report.PDF", EntryKind::File).unwrap();
//! assert_eq!(index, 0);
//! assert_eq!(rule.destination_folder(), "PDFs");
//! assert!(rules.first_match("notes.txt", EntryKind::File).is_none());
//! ```

use crate::config::ConfigError;
use std::fmt;
use std::path::{Component, Path};

/// The kind of a top-level entry, which decides how rules are applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular files (and anything that is not a directory).
    File,
    /// Directories, matched by keyword only.
    Directory,
}

impl EntryKind {
    /// Determines the kind of the entry at `path`, following symlinks.
    pub fn of(path: &Path) -> EntryKind {
        if path.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }
}

/// A single routing rule.
///
/// Empty strings are treated as "not set", so values coming straight from a
/// form or a config file can be passed in unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutingRule {
    destination_folder: String,
    extension: Option<String>,
    keyword: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl RoutingRule {
    /// Creates a rule from raw strings, any of which may be empty.
    pub fn new(destination_folder: &str, extension: &str, keyword: &str) -> Self {
        Self {
            destination_folder: destination_folder.to_string(),
            extension: non_empty(extension),
            keyword: non_empty(keyword),
        }
    }

    pub fn destination_folder(&self) -> &str {
        &self.destination_folder
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// A rule is active when it names a destination folder.
    pub fn is_active(&self) -> bool {
        !self.destination_folder.is_empty()
    }

    /// An active rule with neither extension nor keyword. It never matches.
    pub fn is_inert(&self) -> bool {
        self.is_active() && self.extension.is_none() && self.keyword.is_none()
    }

    /// Returns true if this rule claims the entry called `name`.
    ///
    /// Directories are matched on keyword only; files match on a
    /// case-insensitive extension suffix or a case-insensitive keyword
    /// substring.
    pub fn matches(&self, name: &str, kind: EntryKind) -> bool {
        if !self.is_active() {
            return false;
        }

        let name = name.to_lowercase();
        let keyword_hit = self
            .keyword
            .as_ref()
            .is_some_and(|keyword| name.contains(&keyword.to_lowercase()));

        match kind {
            EntryKind::Directory => keyword_hit,
            EntryKind::File => {
                let extension_hit = self
                    .extension
                    .as_ref()
                    .is_some_and(|ext| name.ends_with(&ext.to_lowercase()));
                extension_hit || keyword_hit
            }
        }
    }

    /// Returns true if the destination is a plain relative path, so that
    /// joining it onto the target always lands strictly below the target.
    ///
    /// Absolute paths, `.` and `..` components are all rejected.
    pub fn has_contained_destination(&self) -> bool {
        let mut components = Path::new(&self.destination_folder).components().peekable();
        components.peek().is_some()
            && components.all(|component| matches!(component, Component::Normal(_)))
    }

    /// Name of the top-level directory this rule moves entries into.
    ///
    /// For a nested destination such as `archive/2024` this is `archive`.
    pub fn top_level_folder(&self) -> Option<&str> {
        match Path::new(&self.destination_folder).components().next() {
            Some(Component::Normal(name)) => name.to_str(),
            _ => None,
        }
    }
}

impl fmt::Display for RoutingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/", self.destination_folder)?;
        match (&self.extension, &self.keyword) {
            (Some(ext), Some(keyword)) => write!(f, " <- *{} or *{}*", ext, keyword),
            (Some(ext), None) => write!(f, " <- *{}", ext),
            (None, Some(keyword)) => write!(f, " <- *{}*", keyword),
            (None, None) => write!(f, " (inert)"),
        }
    }
}

/// An ordered set of at most [`RuleSet::MAX_RULES`] rules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleSet {
    rules: Vec<RoutingRule>,
}

impl RuleSet {
    /// Number of rule slots available.
    pub const MAX_RULES: usize = 5;

    /// Builds a rule set, rejecting more than [`RuleSet::MAX_RULES`] rules
    /// and any destination folder that would escape the target directory.
    ///
    /// Empty or inert slots are kept so rule indices stay stable.
    pub fn new(rules: Vec<RoutingRule>) -> Result<Self, ConfigError> {
        if rules.len() > Self::MAX_RULES {
            return Err(ConfigError::TooManyRules {
                count: rules.len(),
                max: Self::MAX_RULES,
            });
        }
        if let Some(rule) = rules
            .iter()
            .find(|rule| rule.is_active() && !rule.has_contained_destination())
        {
            return Err(ConfigError::UnsafeDestination(rule.destination_folder().to_string()));
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn has_active_rule(&self) -> bool {
        self.rules.iter().any(RoutingRule::is_active)
    }

    /// Destination folders of all active rules, in rule order.
    pub fn active_folders(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|rule| rule.is_active())
            .map(RoutingRule::destination_folder)
    }

    /// Returns true if `name` is the top-level folder of any active rule.
    pub fn is_destination(&self, name: &str) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.is_active())
            .filter_map(RoutingRule::top_level_folder)
            .any(|folder| folder == name)
    }

    /// Finds the first rule, in order, that claims the entry.
    ///
    /// Inactive and inert rules are skipped and never stop the search.
    pub fn first_match(&self, name: &str, kind: EntryKind) -> Option<(usize, &RoutingRule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(name, kind))
    }
}
