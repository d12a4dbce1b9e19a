//! Usage search for Kotlin and Java classes.
//!
//! Given a target class, this crate finds where the class, or selected
//! methods and fields of it, are used across a source tree. Each file is
//! scanned on its own by a [`UsageProducer`] (a line-based heuristic engine,
//! or a tree-sitter adapter for Java), and its raw hits are filtered against
//! the file's imports and package.
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use nobifinder_usages::{Config, run_usage_search};
//! use nobifinder_core::SearchMode;
//! use std::io::{BufWriter, Write};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut cfg = Config::new("src/main/kotlin/com/example/User.kt");
//! cfg.mode = SearchMode::Method;
//! cfg.member = Some("save,load".to_string());
//!
//! let result = run_usage_search(cfg)?;
//!
//! let mut stdout = BufWriter::new(std::io::stdout());
//! nobifinder_usages::print_usage_table(&mut stdout, &result, true, None)?;
//! stdout.flush()?;
//! # Ok(())
//! # }
//! ```

mod bindings;
mod checker;
mod config;
mod engine;
mod filter;
mod imports;
mod producer;
mod reporter;
mod syntax;
mod types;

// Re-export public API
pub use checker::{SourceScan, build_query, run_usage_search, scan_source};
pub use config::{Config, EngineChoice};
pub use engine::{HeuristicEngine, collect_evidence, scan};
pub use filter::{FilterPolicy, apply as apply_filter};
pub use producer::{Query, UsageProducer};
pub use reporter::{print_json, print_no_usage_message, print_summary, print_usage_table};
pub use syntax::{JavaSyntaxAdapter, scan_tree};
pub use types::{Anchor, FileEvidence, RawHit, ScanStats, SearchResult, SourceText};
