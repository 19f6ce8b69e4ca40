//! foldersort - periodic rule-based directory sorting
//!
//! This library moves the top-level entries of a directory into destination
//! folders chosen by ordered extension/keyword rules, either once or on a
//! repeating cycle that can be stopped at any time.

pub mod cli;
pub mod config;
pub mod cycle;
pub mod output;
pub mod routing_rule;
pub mod rule_engine;
pub mod signal;

pub use config::{ConfigError, SorterConfig};
pub use cycle::{CountdownMessage, CycleController, CycleObserver, CycleState, StatusMessage};
pub use routing_rule::{EntryKind, RoutingRule, RuleSet};
pub use rule_engine::{PassError, PassSummary, RuleEngine};

pub use cli::{SortCommand, run_command};
