use log::{debug, trace};
use regex::Regex;
use std::{collections::BTreeSet, fs, path::Path, sync::OnceLock};

use crate::{
    dialect::{Dialect, DialectRules},
    error::FinderError,
    scrub::{ScrubbedText, scrub},
    types::{DeclaredMember, MemberKind, Target},
};

const KOTLIN_MEMBER_MODIFIERS: &str = "public|private|protected|internal|override|open|final|abstract|suspend|inline|operator|infix|tailrec|external|const|lateinit|actual|expect";
const JAVA_MEMBER_MODIFIERS: &str =
    "public|private|protected|static|final|abstract|synchronized|native|transient|volatile|default|strictfp";
const JAVA_NON_TYPES: &[&str] = &[
    "return", "throw", "new", "else", "case", "package", "import", "public", "private",
    "protected", "static", "final", "abstract", "synchronized", "native", "transient",
    "volatile", "default", "strictfp",
];

fn package_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*package\s+([A-Za-z_]\w*(?:\s*\.\s*[A-Za-z_]\w*)*)")
            .expect("valid package regex")
    })
}

fn declaration_regex(dialect: Dialect) -> &'static Regex {
    static KOTLIN: OnceLock<Regex> = OnceLock::new();
    static JAVA: OnceLock<Regex> = OnceLock::new();
    let cell = match dialect {
        Dialect::Kotlin => &KOTLIN,
        Dialect::Java => &JAVA,
    };
    cell.get_or_init(|| build_declaration_regex(dialect.rules()))
}

fn build_declaration_regex(rules: &DialectRules) -> Regex {
    let alternation = |words: &[&str]| {
        words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|")
    };
    let pattern = format!(
        r"(?m)^[ \t]*(?:(?:@[A-Za-z_][\w.]*(?:\([^)\n]*\))?|(?:{mods}))\s+)*({kws})\s+([A-Za-z_]\w*)",
        mods = alternation(rules.modifiers),
        kws = alternation(rules.declaration_keywords),
    );
    Regex::new(&pattern).expect("valid declaration regex")
}

struct MemberRegexes {
    method: Regex,
    field: Regex,
}

fn member_regexes(dialect: Dialect) -> &'static MemberRegexes {
    static KOTLIN: OnceLock<MemberRegexes> = OnceLock::new();
    static JAVA: OnceLock<MemberRegexes> = OnceLock::new();
    match dialect {
        Dialect::Kotlin => KOTLIN.get_or_init(|| {
            let prefix = format!(
                r"^\s*(?:(?:@[A-Za-z_][\w.:]*(?:\([^)]*\))?|{KOTLIN_MEMBER_MODIFIERS})\s+)*"
            );
            MemberRegexes {
                method: Regex::new(&format!(
                    r"{prefix}fun\s+(?:<[^>]*>\s*)?(?:[A-Za-z_][\w.]*(?:<[^>]*>)?\??\.)?([A-Za-z_]\w*)\s*\("
                ))
                .expect("valid kotlin method regex"),
                field: Regex::new(&format!(
                    r"{prefix}(?:val|var)\s+(?:<[^>]*>\s*)?(?:[A-Za-z_][\w.]*\.)?([A-Za-z_]\w*)\s*(?::|=|\bby\b|$)"
                ))
                .expect("valid kotlin property regex"),
            }
        }),
        Dialect::Java => JAVA.get_or_init(|| {
            let prefix = format!(
                r"^\s*(?:(?:@[A-Za-z_][\w.]*(?:\([^)]*\))?|{JAVA_MEMBER_MODIFIERS})\s+)*(?:<[^>]*>\s+)?"
            );
            let ty = r"([A-Za-z_][\w.]*(?:<[^()=;{}]*>)?(?:\[\])*)";
            MemberRegexes {
                method: Regex::new(&format!(r"{prefix}{ty}\s+([A-Za-z_]\w*)\s*\("))
                    .expect("valid java method regex"),
                field: Regex::new(&format!(r"{prefix}{ty}\s+([A-Za-z_]\w*)\s*(?:=|;|,)"))
                    .expect("valid java field regex"),
            }
        }),
    }
}

/// Package of a scanned file: the first `package` declaration anywhere in the
/// scrubbed text, whitespace around dots removed.
pub fn find_package(scrubbed: &str) -> Option<String> {
    package_regex().captures(scrubbed).map(|caps| normalize_dotted(&caps[1]))
}

fn normalize_dotted(path: &str) -> String {
    path.chars().filter(|c| !c.is_whitespace()).collect()
}

fn brace_depth(text: &str, end: usize) -> i64 {
    text.as_bytes()[..end].iter().fold(0i64, |depth, b| match b {
        b'{' => depth + 1,
        b'}' => depth - 1,
        _ => depth,
    })
}

struct Declaration<'a> {
    keyword: &'a str,
    name: &'a str,
    start: usize,
    name_end: usize,
}

fn top_level_declarations<'a>(scrubbed: &'a str, dialect: Dialect) -> Vec<Declaration<'a>> {
    declaration_regex(dialect)
        .captures_iter(scrubbed)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(2)?;
            Some(Declaration {
                keyword: caps.get(1)?.as_str(),
                name: name.as_str(),
                start: whole.start(),
                name_end: name.end(),
            })
        })
        .filter(|decl| brace_depth(scrubbed, decl.start) == 0)
        .collect()
}

/// Resolves the target class from its source text. The first top-level type
/// declaration wins.
pub fn resolve(text: &str, dialect: Dialect) -> Result<Target, FinderError> {
    resolve_with_hint(text, dialect, None)
}

/// Like [`resolve`], but prefers the declaration named `preferred` (usually
/// the file stem) when the file declares several top-level types.
pub fn resolve_with_hint(
    text: &str,
    dialect: Dialect,
    preferred: Option<&str>,
) -> Result<Target, FinderError> {
    let scrubbed = scrub(text, dialect.rules());
    let clean = scrubbed.as_str();
    let decls = top_level_declarations(clean, dialect);
    trace!("Found {} top-level declarations", decls.len());

    let Some(first) = decls.first() else {
        return Err(FinderError::TargetParse(
            preferred.map_or_else(|| "target source".to_string(), |p| format!("{p} source")),
        ));
    };
    let chosen = preferred.and_then(|p| decls.iter().find(|d| d.name == p)).unwrap_or(first);

    let package = package_regex()
        .captures(clean)
        .filter(|caps| caps.get(0).is_some_and(|m| m.start() < first.start))
        .map(|caps| normalize_dotted(&caps[1]))
        .unwrap_or_default();

    let members = enumerate_members(&scrubbed, dialect, chosen);
    debug!(
        "Resolved target {} (package '{}') with {} declared members",
        chosen.name,
        package,
        members.len()
    );
    Ok(Target::new(package, chosen.name, members))
}

/// Reads and resolves a target file, dialect by extension, file stem as hint.
pub fn resolve_target_file(path: &Path) -> Result<Target, FinderError> {
    debug!("Resolving target file: {}", path.display());
    let bytes = fs::read(path)
        .map_err(|source| FinderError::FileRead { path: path.to_path_buf(), source })?;
    let text =
        String::from_utf8(bytes).map_err(|_| FinderError::Decode { path: path.to_path_buf() })?;
    let dialect = Dialect::from_path_or_default(path);
    let stem = path.file_stem().and_then(|s| s.to_str());
    resolve_with_hint(&text, dialect, stem).map_err(|err| match err {
        FinderError::TargetParse(_) => FinderError::TargetParse(path.display().to_string()),
        other => other,
    })
}

/// Advisory member listing. Not exhaustive: generics, multi-line signatures
/// and members declared after a `;` on the same line are easily missed.
fn enumerate_members(
    scrubbed: &ScrubbedText,
    dialect: Dialect,
    decl: &Declaration<'_>,
) -> BTreeSet<DeclaredMember> {
    let text = scrubbed.as_str();
    let mut members = BTreeSet::new();
    let add = |members: &mut BTreeSet<DeclaredMember>, name: &str, kind: MemberKind| {
        if name != decl.name {
            members.insert(DeclaredMember { name: name.to_string(), kind });
        }
    };

    let mut cursor = skip_generics(text, decl.name_end);
    if let Some((params, after)) = balanced_parens(text, cursor) {
        match (dialect, decl.keyword) {
            (Dialect::Kotlin, _) => {
                static PARAM: OnceLock<Regex> = OnceLock::new();
                let re = PARAM.get_or_init(|| {
                    Regex::new(r"\b(?:val|var)\s+([A-Za-z_]\w*)").expect("valid parameter regex")
                });
                for caps in re.captures_iter(params) {
                    add(&mut members, &caps[1], MemberKind::Field);
                }
            }
            (Dialect::Java, "record") => {
                for component in split_top_level(params, ',') {
                    if let Some(name) = component.split_whitespace().last() {
                        add(&mut members, name, MemberKind::Field);
                        add(&mut members, name, MemberKind::Method);
                    }
                }
            }
            _ => {}
        }
        cursor = after;
    }

    let Some(body_open) = find_body_open(text, cursor) else {
        trace!("Declaration {} has no body", decl.name);
        return members;
    };

    let regexes = member_regexes(dialect);
    // One entry per open brace: whether members declared directly inside count
    let mut scopes: Vec<bool> = vec![true];
    for line in text[body_open + 1..].split('\n') {
        if scopes.last().copied().unwrap_or(false) {
            if let Some(caps) = regexes.method.captures(line) {
                let (ty, name) = method_captures(dialect, &caps);
                if ty.is_none_or(|t| !JAVA_NON_TYPES.contains(&t)) {
                    add(&mut members, name, MemberKind::Method);
                }
            } else if let Some(caps) = regexes.field.captures(line) {
                let (ty, name) = method_captures(dialect, &caps);
                if ty.is_none_or(|t| !JAVA_NON_TYPES.contains(&t)) {
                    add(&mut members, name, MemberKind::Field);
                }
            }
        }
        for (idx, b) in line.bytes().enumerate() {
            match b {
                b'{' => scopes.push(opens_companion(&line[..idx])),
                b'}' => {
                    scopes.pop();
                }
                _ => {}
            }
            if scopes.is_empty() {
                return members;
            }
        }
    }
    members
}

fn method_captures<'t>(dialect: Dialect, caps: &regex::Captures<'t>) -> (Option<&'t str>, &'t str) {
    match dialect {
        Dialect::Kotlin => (None, caps.get(1).map_or("", |m| m.as_str())),
        Dialect::Java => (
            caps.get(1).map(|m| m.as_str()),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
    }
}

fn opens_companion(before_brace: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bcompanion\s+object\b").expect("valid companion regex"))
        .is_match(before_brace)
}

fn skip_inline_space(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
        pos += 1;
    }
    pos
}

/// Skips a type parameter list directly after a declared name.
fn skip_generics(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let start = skip_inline_space(bytes, pos);
    if bytes.get(start) != Some(&b'<') {
        return pos;
    }
    let mut depth = 0usize;
    for (offset, b) in bytes[start..].iter().enumerate() {
        match b {
            b'<' => depth += 1,
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return start + offset + 1;
                }
            }
            _ => {}
        }
    }
    pos
}

/// If the next non-space byte at `pos` opens a parenthesis, returns its
/// contents and the offset just past the closing one.
fn balanced_parens(text: &str, pos: usize) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    let start = skip_inline_space(bytes, pos);
    if bytes.get(start) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    for (offset, b) in bytes[start..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset;
                    return Some((&text[start + 1..end], end + 1));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut last = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(text[last..idx].trim());
                last = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[last..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Finds the `{` opening a declaration's body, following supertype lists and
/// where-clauses across lines. A `;`, a blank line or a line that does not
/// continue the header means the declaration has no body.
fn find_body_open(text: &str, from: usize) -> Option<usize> {
    const CONTINUATIONS: &[&str] = &["extends", "implements", "permits", "where", "by"];
    let bytes = text.as_bytes();
    let mut parens = 0i32;
    let mut last_significant = 0u8;
    let mut idx = from;
    while idx < bytes.len() {
        match bytes[idx] {
            b'(' | b'<' => parens += 1,
            b')' | b'>' => parens -= 1,
            b'{' if parens <= 0 => return Some(idx),
            b';' if parens <= 0 => return None,
            b'\n' if parens <= 0 => {
                let rest = text[idx + 1..].trim_start_matches([' ', '\t', '\r']);
                if rest.starts_with('\n') {
                    return None;
                }
                let continues = matches!(last_significant, b':' | b',')
                    || rest.starts_with([':', '{', ',', '.'])
                    || CONTINUATIONS.iter().any(|kw| {
                        rest.strip_prefix(kw)
                            .is_some_and(|tail| tail.starts_with(|c: char| c.is_whitespace()))
                    });
                if !continues {
                    return None;
                }
            }
            b if !b.is_ascii_whitespace() => last_significant = b,
            _ => {}
        }
        idx += 1;
    }
    None
}
