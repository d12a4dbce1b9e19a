//! Constants for source extensions and directory pruning.
//!
//! ## Supported Extensions
//!
//! - **Kotlin**: `.kt` (sources), `.kts` (scripts)
//! - **Java**: `.java`

/// Extensions scanned when the caller does not configure its own set
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &[
    "kt",   // Kotlin
    "kts",  // Kotlin script
    "java", // Java
];

/// Extensions handled with Kotlin lexing rules
pub const KOTLIN_EXTENSIONS: &[&str] = &["kt", "kts"];

/// Extensions handled with Java lexing rules
pub const JAVA_EXTENSIONS: &[&str] = &["java"];

/// Directory names that are never descended into, regardless of ignore files
pub const ALWAYS_IGNORED_DIRS: &[&str] =
    &[".git", "build", "out", "dist", "target", ".gradle", ".idea", "node_modules"];

/// Byte written over every scrubbed comment or literal byte
pub const SCRUB_FILLER: u8 = b' ';

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_extensions_cover_both_dialects() {
        for ext in KOTLIN_EXTENSIONS.iter().chain(JAVA_EXTENSIONS) {
            assert!(
                DEFAULT_SOURCE_EXTENSIONS.contains(ext),
                "DEFAULT_SOURCE_EXTENSIONS missing '{}'",
                ext
            );
        }
        assert_eq!(DEFAULT_SOURCE_EXTENSIONS.len(), KOTLIN_EXTENSIONS.len() + JAVA_EXTENSIONS.len());
    }

    #[test]
    fn test_filler_is_not_a_line_break() {
        assert_ne!(SCRUB_FILLER, b'\n');
        assert_ne!(SCRUB_FILLER, b'\r');
        assert!(SCRUB_FILLER.is_ascii());
    }
}
