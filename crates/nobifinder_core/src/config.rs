use anyhow::{Result, anyhow};
use log::{debug, trace};
use path_clean::PathClean;
use std::{
    collections::HashSet,
    env,
    path::{Path, PathBuf},
};

pub fn find_git_root() -> Result<PathBuf> {
    debug!("Searching for git root");
    let mut current_dir = env::current_dir()?;
    trace!("Starting search from: {:?}", current_dir);

    loop {
        let git_dir = current_dir.join(".git");
        trace!("Checking for .git at: {:?}", git_dir);
        if git_dir.exists() {
            debug!("Found git root at: {:?}", current_dir);
            return Ok(current_dir);
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => {
                debug!("Could not find .git directory in any parent folder");
                return Err(anyhow!("Could not find .git directory in any parent folder"));
            }
        }
    }
}

/// Scan root: the explicit `--root` if given, else the enclosing git checkout,
/// else the current directory.
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    let root = match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => env::current_dir()?.join(path),
        None => match find_git_root() {
            Ok(root) => root,
            Err(_) => env::current_dir()?,
        },
    };
    let root = root.clean();
    if !root.is_dir() {
        return Err(anyhow!("root directory does not exist: {}", root.display()));
    }
    debug!("Scan root: {}", root.display());
    Ok(root)
}

/// Parses `.kt,.kts, java` into `["kt", "kts", "java"]`.
pub fn normalize_extensions(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && seen.insert(ext.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_git_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join(".git")).unwrap();
        let subdir = root.join("src").join("main").join("kotlin");
        fs::create_dir_all(&subdir).unwrap();

        let original_dir = env::current_dir().unwrap();
        env::set_current_dir(&subdir).unwrap();

        let git_root = find_git_root().unwrap();
        // canonicalize can add a /private prefix on macOS
        assert_eq!(git_root.canonicalize().unwrap(), root.canonicalize().unwrap());

        env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    fn test_resolve_root_explicit() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("app")).unwrap();

        let resolved = resolve_root(Some(&root.join("app").join("..").join("app"))).unwrap();
        assert_eq!(resolved, root.join("app"));
    }

    #[test]
    fn test_resolve_root_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let result = resolve_root(Some(&temp_dir.path().join("nope")));
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_extensions() {
        assert_eq!(normalize_extensions(".kt,.kts,.java"), vec!["kt", "kts", "java"]);
        assert_eq!(normalize_extensions(" KT , java,, "), vec!["kt", "java"]);
        assert!(normalize_extensions("").is_empty());
        assert_eq!(normalize_extensions(".kt,.java,.kt"), vec!["kt", "java"]);
        assert_eq!(normalize_extensions("java,.KT,.Java,kt"), vec!["java", "kt"]);
    }
}
