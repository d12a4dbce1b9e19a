use serde::Serialize;
use std::path::PathBuf;

use nobifinder_core::{
    Dialect, FileResult, ScrubbedText, SearchMode, Target, UsageHit, scrub, split_lines,
};

/// How a hit is tied to the target, consulted by the filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Import or fully-qualified reference
    Qualified,
    /// Bare simple-name occurrence of the class (or an import alias)
    SimpleName,
    /// Receiver is a variable declared with the target type
    BoundReceiver,
    /// Receiver is the class itself (`User.create()`)
    StaticReceiver,
    /// Receiver could not be tied to the target
    UnboundReceiver,
    /// Overriding declaration
    Declaration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHit {
    pub hit: UsageHit,
    pub anchor: Anchor,
}

/// File-level facts that decide whether candidate hits are promoted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileEvidence {
    /// An import of the target (or its package/members) or an FQN literal
    pub qualified: bool,
    /// A bare simple-name occurrence outside imports and declarations
    pub simple_name_seen: bool,
    /// Another class with the target's simple name is imported
    pub conflicting_import: bool,
}

/// A source file as seen by the producers: original text, its scrubbed twin
/// and the dialect both were lexed with.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub text: String,
    pub scrubbed: ScrubbedText,
    pub dialect: Dialect,
}

impl SourceText {
    pub fn new(text: impl Into<String>, dialect: Dialect) -> Self {
        let text = text.into();
        let scrubbed = scrub(&text, dialect.rules());
        Self { text, scrubbed, dialect }
    }

    /// Original lines paired with their scrubbed counterparts.
    pub fn line_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        split_lines(&self.text).zip(self.scrubbed.lines())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub syntax_fallbacks: usize,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub target: Target,
    pub mode: SearchMode,
    /// Member names searched for; empty in class mode
    pub members: Vec<String>,
    pub root: PathBuf,
    /// Files with at least one hit, sorted by path
    pub results: Vec<FileResult>,
    pub stats: ScanStats,
}

impl SearchResult {
    pub fn total_hits(&self) -> usize {
        self.results.iter().map(FileResult::count).sum()
    }
}
