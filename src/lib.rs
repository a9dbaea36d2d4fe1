//! Test discovery and result correlation for Tarantool's luatest.
//!
//! The crate builds a stable tree of files → groups → parametrized test
//! cases out of a Lua workspace, composes runner invocations for a
//! selection of tree nodes, and maps the runner's JSON output back onto
//! the tree as pass/fail/skip states with source-line decorations for
//! failures. Test execution itself is delegated to the external
//! `luatest` executable; this crate only predicts and reconciles what
//! that runner reports.

pub mod command;
pub mod config;
pub mod debug;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod patterns;
pub mod plugins;
pub mod process;
pub mod run;
pub mod tree;

pub use config::{Config, ScanStrategy};
pub use errors::{ConfigError, DiscoveryError, PluginError, RunError};
pub use events::{Decoration, EventSink, SuiteState, TestEvent, TestState};
pub use tree::{DiscoverySession, TreeNode};
