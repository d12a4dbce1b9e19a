use anyhow::Result;
use ignore::WalkBuilder;
use log::{debug, trace, warn};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::constants::ALWAYS_IGNORED_DIRS;

pub struct CollectorConfig {
    pub root: PathBuf,
    /// Extensions without the leading dot
    pub extensions: Vec<String>,
    /// Excluded from the result, compared by canonical path
    pub exclude: Option<PathBuf>,
    pub follow_links: bool,
}

fn is_always_ignored(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|name| ALWAYS_IGNORED_DIRS.contains(&name))
}

/// Walks `root` and returns the source files to scan, sorted by path.
/// `.gitignore` files are honoured whether or not the root is a git checkout.
pub fn collect_source_files(cfg: &CollectorConfig) -> Result<Vec<PathBuf>> {
    debug!("Walking directory tree from root: {}", cfg.root.display());
    let exclude = cfg.exclude.as_deref().and_then(|p| fs::canonicalize(p).ok());

    let walker = WalkBuilder::new(&cfg.root)
        .hidden(false)
        .ignore(true)
        .git_ignore(true)
        .require_git(false)
        .follow_links(cfg.follow_links)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && entry.depth() > 0 && is_always_ignored(entry.path()))
        })
        .build();

    let mut files = Vec::new();
    for res in walker {
        let dent = match res {
            Ok(dent) => dent,
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        let p = dent.path();
        if !dent.file_type().is_some_and(|t| t.is_file()) && !p.is_file() {
            continue;
        }

        let Some(ext) = p.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) else {
            continue;
        };
        if !cfg.extensions.iter().any(|wanted| *wanted == ext) {
            continue;
        }

        if let Some(excluded) = &exclude
            && fs::canonicalize(p).is_ok_and(|c| &c == excluded)
        {
            trace!("Skipping target file: {}", p.display());
            continue;
        }

        trace!("Collected source file: {}", p.display());
        files.push(p.to_path_buf());
    }

    files.sort();
    files.dedup();
    debug!("Collected {} source files", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    fn config(root: &Path) -> CollectorConfig {
        CollectorConfig {
            root: root.to_path_buf(),
            extensions: vec!["kt".into(), "kts".into(), "java".into()],
            exclude: None,
            follow_links: false,
        }
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_collects_by_extension_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "src/b/B.kt", "");
        create_test_file(root, "src/a/A.java", "");
        create_test_file(root, "build.gradle.kts", "");
        create_test_file(root, "README.md", "");
        create_test_file(root, "src/c/C.groovy", "");

        let files = collect_source_files(&config(root)).unwrap();
        assert_eq!(relative(root, &files), vec!["build.gradle.kts", "src/a/A.java", "src/b/B.kt"]);
    }

    #[test]
    fn test_skips_always_ignored_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "src/Keep.kt", "");
        for dir in ["build", "out", "target", ".gradle", ".idea", "node_modules", ".git"] {
            create_test_file(root, &format!("{dir}/Gen.kt"), "");
        }
        create_test_file(root, "module/build/Gen.java", "");

        let files = collect_source_files(&config(root)).unwrap();
        assert_eq!(relative(root, &files), vec!["src/Keep.kt"]);
    }

    #[test]
    fn test_honours_gitignore_without_git_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, ".gitignore", "generated/\n*.tmp.kt\n");
        create_test_file(root, "src/Keep.kt", "");
        create_test_file(root, "generated/Gen.kt", "");
        create_test_file(root, "src/Scratch.tmp.kt", "");

        let files = collect_source_files(&config(root)).unwrap();
        assert_eq!(relative(root, &files), vec!["src/Keep.kt"]);
    }

    #[test]
    fn test_excludes_target_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let target = create_test_file(root, "src/User.kt", "class User");
        create_test_file(root, "src/Use.kt", "");

        let mut cfg = config(root);
        cfg.exclude = Some(root.join("src/../src/User.kt"));
        let files = collect_source_files(&cfg).unwrap();
        assert_eq!(relative(root, &files), vec!["src/Use.kt"]);
        assert!(target.exists());
    }

    #[test]
    fn test_custom_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "A.kt", "");
        create_test_file(root, "B.java", "");

        let mut cfg = config(root);
        cfg.extensions = vec!["java".into()];
        let files = collect_source_files(&cfg).unwrap();
        assert_eq!(relative(root, &files), vec!["B.java"]);
    }

    #[test]
    fn test_extension_match_ignores_case() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "src/Foo.KT", "");
        create_test_file(root, "src/Bar.Java", "");
        create_test_file(root, "src/Baz.MD", "");

        let files = collect_source_files(&config(root)).unwrap();
        assert_eq!(relative(root, &files), vec!["src/Bar.Java", "src/Foo.KT"]);
    }
}
