use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use log::debug;
use std::path::PathBuf;

use nobifinder_core::{SearchMode, normalize_extensions, resolve_root};

use crate::filter::FilterPolicy;

/// Which producer scans each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EngineChoice {
    /// Syntax tree for Java (heuristic fallback on parse errors), heuristic for Kotlin
    #[default]
    Auto,
    /// Heuristic engine for every file
    Heuristic,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "nobifinder")]
#[command(about = "Find usages of a Kotlin/Java class, its methods or its fields")]
pub struct Config {
    /// Source file declaring the target class
    #[arg(long)]
    pub target: PathBuf,

    /// Root directory to search (defaults to git root, else the current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// What to search for: class, method or field
    #[arg(long, default_value = "class")]
    pub mode: SearchMode,

    /// Members to search for: `all`, `a,b,c` or `/regex/` (method and field modes)
    #[arg(long)]
    pub member: Option<String>,

    /// Only report files that import the target or use its qualified name
    #[arg(long)]
    pub strict_import: bool,

    /// Treat files in the target's package as importing it
    #[arg(long)]
    pub same_package_ok: bool,

    /// Do not let a bare class name count as evidence
    #[arg(long)]
    pub no_bare_names: bool,

    /// Comma-separated file extensions to scan
    #[arg(long = "ext", default_value = ".kt,.kts,.java")]
    pub ext: String,

    /// Worker threads (0 = available parallelism)
    #[arg(long, default_value = "0")]
    pub max_workers: usize,

    /// Follow symbolic links while walking the root
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Usage producer to run
    #[arg(long, value_enum, default_value_t = EngineChoice::Auto)]
    pub engine: EngineChoice,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Include every matching line, not just per-file counts
    #[arg(long)]
    pub with_lines: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Show at most this many files
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print the target's declared members and exit
    #[arg(long)]
    pub list_members: bool,

    /// Debug logging (when RUST_LOG is unset)
    #[arg(short, long)]
    pub verbose: bool,

    /// Extensions without the leading dot, filled by `initialize`
    #[clap(skip)]
    pub extensions: Vec<String>,
}

impl Config {
    /// A config with every option at its default, for library callers.
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            root: None,
            mode: SearchMode::Class,
            member: None,
            strict_import: false,
            same_package_ok: false,
            no_bare_names: false,
            ext: ".kt,.kts,.java".to_string(),
            max_workers: 0,
            follow_symlinks: false,
            engine: EngineChoice::Auto,
            json: false,
            with_lines: false,
            no_color: false,
            limit: None,
            list_members: false,
            verbose: false,
            extensions: Vec::new(),
        }
    }

    /// Resolves the root, normalises extensions and checks the target path.
    /// Idempotent.
    pub fn initialize(&mut self) -> Result<()> {
        let root = resolve_root(self.root.as_deref())?;
        self.root = Some(root.canonicalize().unwrap_or(root));

        self.extensions = normalize_extensions(&self.ext);
        if self.extensions.is_empty() {
            return Err(anyhow!("no file extensions to scan (--ext '{}')", self.ext));
        }

        if !self.target.is_file() {
            return Err(anyhow!("target file does not exist: {}", self.target.display()));
        }
        self.target = self
            .target
            .canonicalize()
            .with_context(|| format!("failed to resolve target {}", self.target.display()))?;

        debug!(
            "Config initialized: root={:?}, target={:?}, extensions={:?}",
            self.root, self.target, self.extensions
        );
        Ok(())
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy {
            strict_import: self.strict_import,
            same_package_ok: self.same_package_ok,
            bare_names: !self.no_bare_names,
        }
    }
}
