//! Per-language lexical and declaration conventions.
//!
//! The scrubber, target resolver and usage engine consult a [`DialectRules`]
//! record instead of branching on the language, so the matching core stays
//! dialect-agnostic.

use log::trace;
use std::{fmt, path::Path};

use crate::constants::{JAVA_EXTENSIONS, KOTLIN_EXTENSIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Kotlin,
    Java,
}

/// Triple-quoted literal (`"""…"""`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripleQuote {
    /// Whether a backslash escapes the next character inside the literal
    pub escapes: bool,
}

/// How an overriding member is marked in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideMarker {
    /// Modifier on the declaration itself (`override fun name`)
    Keyword(&'static str),
    /// Annotation preceding the declaration (`@Override`)
    Annotation(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectRules {
    pub name: &'static str,
    pub line_comment: &'static str,
    pub block_comment: (&'static str, &'static str),
    pub nested_block_comments: bool,
    pub string_quote: u8,
    pub char_quote: u8,
    pub triple_quote: Option<TripleQuote>,
    /// Keywords introducing a type declaration
    pub declaration_keywords: &'static [&'static str],
    /// Modifiers that may precede a declaration keyword
    pub modifiers: &'static [&'static str],
    pub override_marker: OverrideMarker,
    /// Whether `import a.b.C as D` is legal
    pub import_aliases: bool,
}

static KOTLIN_RULES: DialectRules = DialectRules {
    name: "kotlin",
    line_comment: "//",
    block_comment: ("/*", "*/"),
    nested_block_comments: true,
    string_quote: b'"',
    char_quote: b'\'',
    triple_quote: Some(TripleQuote { escapes: false }),
    declaration_keywords: &["class", "interface", "object"],
    modifiers: &[
        "public",
        "private",
        "protected",
        "internal",
        "abstract",
        "final",
        "open",
        "sealed",
        "data",
        "enum",
        "annotation",
        "inner",
        "value",
        "inline",
        "expect",
        "actual",
        "fun",
        "companion",
    ],
    override_marker: OverrideMarker::Keyword("override"),
    import_aliases: true,
};

static JAVA_RULES: DialectRules = DialectRules {
    name: "java",
    line_comment: "//",
    block_comment: ("/*", "*/"),
    nested_block_comments: false,
    string_quote: b'"',
    char_quote: b'\'',
    triple_quote: Some(TripleQuote { escapes: true }),
    declaration_keywords: &["class", "interface", "enum", "record", "@interface"],
    modifiers: &[
        "public",
        "private",
        "protected",
        "abstract",
        "final",
        "static",
        "sealed",
        "non-sealed",
        "strictfp",
    ],
    override_marker: OverrideMarker::Annotation("@Override"),
    import_aliases: false,
};

impl Dialect {
    /// Picks the dialect for a file by extension. Unknown extensions get
    /// `None`; callers decide on a fallback.
    pub fn from_path(path: &Path) -> Option<Dialect> {
        let ext = path.extension().and_then(|e| e.to_str())?.to_ascii_lowercase();
        let dialect = if KOTLIN_EXTENSIONS.contains(&ext.as_str()) {
            Some(Dialect::Kotlin)
        } else if JAVA_EXTENSIONS.contains(&ext.as_str()) {
            Some(Dialect::Java)
        } else {
            None
        };
        trace!("Dialect for {}: {:?}", path.display(), dialect);
        dialect
    }

    /// Like [`Dialect::from_path`], falling back to Java's C-family rules.
    pub fn from_path_or_default(path: &Path) -> Dialect {
        Dialect::from_path(path).unwrap_or(Dialect::Java)
    }

    pub fn rules(self) -> &'static DialectRules {
        match self {
            Dialect::Kotlin => &KOTLIN_RULES,
            Dialect::Java => &JAVA_RULES,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rules().name)
    }
}
