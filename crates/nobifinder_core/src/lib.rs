//! Core utilities for nobifinder tools.
//!
//! This crate provides the language-aware building blocks shared by the usage
//! search, including:
//! - Scrubbing comments and string literals from Kotlin/Java source
//! - Resolving the target class (package, name, declared members) from its file
//! - Compiling member selectors (`all`, name lists, `/regex/`)
//! - Collecting source files from a project, honouring `.gitignore`
//! - Configuration utilities (git root finding, extension lists)

mod collector;
mod config;
mod constants;
mod dialect;
mod error;
mod members;
mod resolver;
mod scrub;
mod types;

// Re-export public API
pub use collector::{CollectorConfig, collect_source_files};
pub use config::{find_git_root, normalize_extensions, resolve_root};
pub use constants::{
    ALWAYS_IGNORED_DIRS, DEFAULT_SOURCE_EXTENSIONS, JAVA_EXTENSIONS, KOTLIN_EXTENSIONS,
    SCRUB_FILLER,
};
pub use dialect::{Dialect, DialectRules, OverrideMarker, TripleQuote};
pub use error::{FinderError, ParseError};
pub use members::MemberSpec;
pub use resolver::{find_package, resolve, resolve_target_file, resolve_with_hint};
pub use scrub::{ScrubbedText, scrub, split_lines};
pub use types::{
    DeclaredMember, FileResult, MemberKind, SearchMode, Target, UsageHit, UsageKind,
};
