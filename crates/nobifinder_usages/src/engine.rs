//! Heuristic usage engine.
//!
//! Works line by line over scrubbed text, so nothing inside a comment or a
//! string literal can match. Class mode looks for imports and occurrences of
//! the class name; member modes look for `.member` sites and classify their
//! receiver through a per-file [`VariableBinding`]. Hit positions come from the
//! scrubbed line, snippets from the original one.

use log::{debug, trace};
use regex::Regex;
use std::sync::OnceLock;

use nobifinder_core::{
    Dialect, MemberKind, OverrideMarker, ParseError, Target, UsageHit, UsageKind,
};

use crate::{
    bindings::{TypeNames, VariableBinding},
    imports::{ImportRelation, ImportSummary, is_package_line, parse_import, relate},
    producer::{Query, UsageProducer},
    types::{Anchor, FileEvidence, RawHit, SourceText},
};

/// Words after which a class name is being declared, not used
const DECLARATION_WORDS: &[&str] = &["class", "interface", "object", "enum", "record", "typealias"];

/// Words that may directly precede a bare call in expression position
const EXPRESSION_WORDS: &[&str] = &["return", "else", "throw", "yield", "in", "is", "to"];

const JAVA_NON_TYPES: &[&str] = &["return", "new", "throw", "else", "case", "yield", "assert"];

const ASSIGNMENT_OPERATORS: &[&str] = &["+=", "-=", "*=", "/=", "%=", "++", "--"];

fn member_site_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.([A-Za-z_]\w*)").expect("valid member site regex"))
}

fn method_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"::([A-Za-z_]\w*)").expect("valid method reference regex"))
}

fn override_regex(dialect: Dialect) -> &'static Regex {
    static KOTLIN: OnceLock<Regex> = OnceLock::new();
    static JAVA: OnceLock<Regex> = OnceLock::new();
    let cell = match dialect {
        Dialect::Kotlin => &KOTLIN,
        Dialect::Java => &JAVA,
    };
    cell.get_or_init(|| {
        let pattern = match dialect.rules().override_marker {
            OverrideMarker::Keyword(keyword) => format!(
                r"\b{}\s+(?:[a-z]+\s+)*(fun|val|var)\s+(?:<[^>]*>\s*)?(?:[A-Za-z_][\w.]*\.)?([A-Za-z_]\w*)",
                regex::escape(keyword)
            ),
            OverrideMarker::Annotation(annotation) => format!(r"{}\b", regex::escape(annotation)),
        };
        Regex::new(&pattern).expect("valid override regex")
    })
}

fn java_method_declaration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:@[A-Za-z_][\w.]*(?:\([^)]*\))?|public|protected|private|static|final|abstract|synchronized|native|default|strictfp)\s+)*(?:<[^>]*>\s+)?([A-Za-z_][\w.]*(?:<[^()]*>)?(?:\[\])*)\s+([A-Za-z_]\w*)\s*\(",
        )
        .expect("valid java method declaration regex")
    })
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Byte offsets of `word` in `line` that are not part of a longer identifier.
pub(crate) fn word_occurrences<'a>(line: &'a str, word: &'a str) -> impl Iterator<Item = usize> + 'a {
    let bytes = line.as_bytes();
    line.match_indices(word).map(|(at, _)| at).filter(move |&at| {
        let end = at + word.len();
        (at == 0 || !is_ident_byte(bytes[at - 1]))
            && bytes.get(end).is_none_or(|b| !is_ident_byte(*b))
    })
}

/// 0-based character column of a byte offset.
pub(crate) fn char_column(line: &str, byte: usize) -> usize {
    line.get(..byte).map_or(byte, |prefix| prefix.chars().count())
}

fn preceding_word(text: &str) -> &str {
    let trimmed = text.trim_end();
    let start = trimmed.bytes().rposition(|b| !is_ident_byte(b)).map_or(0, |i| i + 1);
    &trimmed[start..]
}

fn skip_type_args(line: &str, pos: usize) -> usize {
    let bytes = line.as_bytes();
    if bytes.get(pos) != Some(&b'<') {
        return pos;
    }
    let mut depth = 0usize;
    for (offset, &b) in bytes[pos..].iter().enumerate() {
        match b {
            b'<' => depth += 1,
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return pos + offset + 1;
                }
            }
            b'(' | b')' | b';' | b'=' | b'{' | b'}' => return pos,
            _ => {}
        }
    }
    pos
}

fn next_significant(line: &str, pos: usize) -> Option<u8> {
    line.as_bytes().get(pos..)?.iter().copied().find(|b| !b.is_ascii_whitespace())
}

pub(crate) fn raw_hit(
    line_no: usize,
    original: &str,
    byte: usize,
    kind: UsageKind,
    member: Option<&str>,
    anchor: Anchor,
) -> RawHit {
    RawHit {
        hit: UsageHit {
            line: line_no,
            column: char_column(original, byte),
            member: member.map(str::to_string),
            kind,
            snippet: original.trim().to_string(),
        },
        anchor,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClassOccurrence {
    start: usize,
    kind: UsageKind,
    anchor: Anchor,
}

/// Occurrences of the target class on one scrubbed line. `names` are the
/// simple names the class is visible under; when the simple name is shadowed
/// by a conflicting import only fully-qualified occurrences are reported.
fn class_occurrences(line: &str, names: &[String], target: &Target) -> Vec<ClassOccurrence> {
    let qualifier = (!target.package.is_empty()).then(|| format!("{}.", target.package));
    let shadowed = !names.iter().any(|n| *n == target.class_name);
    let candidates = names
        .iter()
        .map(|n| (n.as_str(), false))
        .chain(shadowed.then_some((target.class_name.as_str(), true)));

    let bytes = line.as_bytes();
    let mut found = Vec::new();
    for (name, qualified_only) in candidates {
        for at in word_occurrences(line, name) {
            let head = &line[..at];
            let (start, anchor) = if head.ends_with('.') {
                let Some(qualifier) = qualifier.as_deref().filter(|_| name == target.class_name)
                else {
                    continue;
                };
                let Some(start) = at.checked_sub(qualifier.len()) else {
                    continue;
                };
                let bounded = start == 0 || !(is_ident_byte(bytes[start - 1]) || bytes[start - 1] == b'.');
                if !head.ends_with(qualifier) || !bounded {
                    continue;
                }
                (start, Anchor::Qualified)
            } else if qualified_only {
                continue;
            } else {
                (at, Anchor::SimpleName)
            };

            let before = &line[..start];
            let next = next_significant(line, skip_type_args(line, at + name.len()));
            let word = preceding_word(before);
            if DECLARATION_WORDS.contains(&word) || (word == "fun" && next != Some(b'.')) {
                trace!("Skipping declaration of '{}' at byte {}", name, at);
                continue;
            }

            let occurrence = if before.ends_with('@') {
                ClassOccurrence { start: start - 1, kind: UsageKind::Annotation, anchor }
            } else if next == Some(b'(') {
                ClassOccurrence { start, kind: UsageKind::ConstructorCall, anchor }
            } else {
                ClassOccurrence { start, kind: UsageKind::TypeReference, anchor }
            };
            found.push(occurrence);
        }
    }
    found.sort_by_key(|o| o.start);
    found.dedup_by_key(|o| o.start);
    found
}

/// File-level evidence for the filter stage, computed from imports and class
/// name occurrences regardless of the search mode.
pub fn collect_evidence(source: &SourceText, target: &Target) -> FileEvidence {
    let summary = ImportSummary::collect(source, target);
    let mut evidence = FileEvidence {
        qualified: summary.qualified,
        simple_name_seen: false,
        conflicting_import: summary.conflicting,
    };
    for line in source.scrubbed.lines() {
        if is_package_line(line) || parse_import(line).is_some() {
            continue;
        }
        for occurrence in class_occurrences(line, &summary.names, target) {
            match occurrence.anchor {
                Anchor::Qualified => evidence.qualified = true,
                _ => evidence.simple_name_seen = true,
            }
        }
        if evidence.qualified && evidence.simple_name_seen {
            break;
        }
    }
    trace!("File evidence: {:?}", evidence);
    evidence
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Follow {
    Call,
    Assign,
    Access,
}

fn follow_of(after: &str, dialect: Dialect) -> Follow {
    let rest = after.trim_start();
    if rest.starts_with('(') || (dialect == Dialect::Kotlin && rest.starts_with('{')) {
        Follow::Call
    } else if rest.starts_with("==") {
        Follow::Access
    } else if rest.starts_with('=') || ASSIGNMENT_OPERATORS.iter().any(|op| rest.starts_with(op)) {
        Follow::Assign
    } else {
        Follow::Access
    }
}

fn member_usage(kind: MemberKind, follow: Follow) -> Option<UsageKind> {
    match (kind, follow) {
        (MemberKind::Method, Follow::Call) => Some(UsageKind::MethodCall),
        (MemberKind::Field, Follow::Assign) => Some(UsageKind::FieldAssignment),
        (MemberKind::Field, Follow::Access) => Some(UsageKind::FieldAccess),
        _ => None,
    }
}

struct MemberScan<'q> {
    query: &'q Query,
    kind: MemberKind,
    dialect: Dialect,
    summary: ImportSummary,
    bindings: VariableBinding,
    pending_override: bool,
}

impl MemberScan<'_> {
    fn scan_line(&mut self, line_no: usize, original: &str, line: &str, out: &mut Vec<RawHit>) {
        if is_package_line(line) {
            return;
        }
        if let Some(decl) = parse_import(line) {
            if let ImportRelation::Member(name) = relate(&decl, &self.query.target)
                && self.query.wants(&name)
            {
                out.push(raw_hit(
                    line_no,
                    original,
                    decl.column,
                    UsageKind::Import,
                    Some(name.as_str()),
                    Anchor::Qualified,
                ));
            }
            return;
        }

        let names = TypeNames { simple: &self.summary.names, fqn: &self.query.target.fqn };
        self.bindings.observe_line(line, self.dialect, &names);

        let mut hits = Vec::new();
        self.overrides(line_no, original, line, &mut hits);
        self.member_sites(line_no, original, line, &mut hits);
        self.method_references(line_no, original, line, &mut hits);
        self.static_member_uses(line_no, original, line, &mut hits);
        hits.sort_by_key(|h| h.hit.column);
        hits.dedup_by(|a, b| a.hit.column == b.hit.column && a.hit.kind == b.hit.kind);
        out.extend(hits);
    }

    fn overrides(&mut self, line_no: usize, original: &str, line: &str, out: &mut Vec<RawHit>) {
        let regex = override_regex(self.dialect);
        match self.dialect.rules().override_marker {
            OverrideMarker::Keyword(_) => {
                for caps in regex.captures_iter(line) {
                    let Some(name) = caps.get(2) else { continue };
                    let kind = if &caps[1] == "fun" { MemberKind::Method } else { MemberKind::Field };
                    if kind == self.kind && self.query.wants(name.as_str()) {
                        out.push(raw_hit(
                            line_no,
                            original,
                            name.start(),
                            UsageKind::Override,
                            Some(name.as_str()),
                            Anchor::Declaration,
                        ));
                    }
                }
            }
            OverrideMarker::Annotation(_) => {
                if regex.is_match(line) {
                    self.pending_override = true;
                }
                if !self.pending_override {
                    return;
                }
                let declaration = java_method_declaration_regex()
                    .captures(line)
                    .filter(|caps| !JAVA_NON_TYPES.contains(&&caps[1]));
                if let Some(caps) = declaration {
                    self.pending_override = false;
                    if let Some(name) = caps.get(2)
                        && self.kind == MemberKind::Method
                        && self.query.wants(name.as_str())
                    {
                        out.push(raw_hit(
                            line_no,
                            original,
                            name.start(),
                            UsageKind::Override,
                            Some(name.as_str()),
                            Anchor::Declaration,
                        ));
                    }
                } else {
                    let rest = line.trim_start();
                    if !rest.is_empty() && !rest.starts_with('@') {
                        self.pending_override = false;
                    }
                }
            }
        }
    }

    /// Anchor for the receiver expression ending `head`. `None` for numeric
    /// literals, which never carry a member of the target.
    fn receiver_anchor(&self, head: &str) -> Option<Anchor> {
        let trimmed = head.trim_end();
        let bytes = trimmed.as_bytes();
        let mut start = bytes.len();
        while start > 0 && (is_ident_byte(bytes[start - 1]) || matches!(bytes[start - 1], b'.' | b'?' | b'!'))
        {
            start -= 1;
        }
        let token = trimmed[start..].trim_start_matches(['.', '?', '!']);
        if token.is_empty() {
            return Some(Anchor::UnboundReceiver);
        }
        if token.as_bytes()[0].is_ascii_digit() {
            return None;
        }

        let normalized = token.replace("?.", ".").replace("!!.", ".");
        let token = normalized.strip_prefix("this.").unwrap_or(&normalized);
        let anchor = if token == "this" || token == "super" {
            Anchor::UnboundReceiver
        } else if !token.contains('.') {
            if self.bindings.is_bound(token) {
                Anchor::BoundReceiver
            } else if self.summary.names.iter().any(|n| n == token) {
                Anchor::StaticReceiver
            } else {
                Anchor::UnboundReceiver
            }
        } else if token == self.query.target.fqn {
            Anchor::Qualified
        } else {
            Anchor::UnboundReceiver
        };
        Some(anchor)
    }

    fn member_sites(&self, line_no: usize, original: &str, line: &str, out: &mut Vec<RawHit>) {
        for caps in member_site_regex().captures_iter(line) {
            let (Some(dot), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
            if !self.query.wants(name.as_str()) {
                continue;
            }
            let head = &line[..dot.start()];
            if head.ends_with('.') {
                continue;
            }
            let head = head.strip_suffix("!!").or_else(|| head.strip_suffix('?')).unwrap_or(head);
            let Some(anchor) = self.receiver_anchor(head) else { continue };
            let Some(kind) = member_usage(self.kind, follow_of(&line[name.end()..], self.dialect))
            else {
                continue;
            };
            out.push(raw_hit(line_no, original, name.start(), kind, Some(name.as_str()), anchor));
        }
    }

    fn method_references(&self, line_no: usize, original: &str, line: &str, out: &mut Vec<RawHit>) {
        for caps in method_reference_regex().captures_iter(line) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
            if !self.query.wants(name.as_str()) {
                continue;
            }
            let Some(anchor) = self.receiver_anchor(&line[..whole.start()]) else { continue };
            let kind = match self.kind {
                MemberKind::Method => UsageKind::MethodReference,
                MemberKind::Field => UsageKind::FieldAccess,
            };
            out.push(raw_hit(line_no, original, name.start(), kind, Some(name.as_str()), anchor));
        }
    }

    /// Bare uses of members imported by name (`import static ...User.create`).
    fn static_member_uses(&self, line_no: usize, original: &str, line: &str, out: &mut Vec<RawHit>) {
        for name in &self.summary.static_members {
            if !self.query.wants(name) {
                continue;
            }
            for at in word_occurrences(line, name) {
                let head = line[..at].trim_end();
                if head.ends_with('.') || head.ends_with(':') {
                    continue;
                }
                let word = preceding_word(head);
                if !word.is_empty() && !EXPRESSION_WORDS.contains(&word) {
                    continue;
                }
                let follow = follow_of(&line[at + name.len()..], self.dialect);
                if let Some(kind) = member_usage(self.kind, follow) {
                    out.push(raw_hit(line_no, original, at, kind, Some(name.as_str()), Anchor::Qualified));
                }
            }
        }
    }
}

/// Scans one file. Never fails: unmatched text simply yields no hits.
pub fn scan(source: &SourceText, query: &Query) -> Vec<RawHit> {
    let summary = ImportSummary::collect(source, &query.target);
    let mut hits = Vec::new();

    match query.mode.member_kind() {
        None => {
            for (idx, (original, line)) in source.line_pairs().enumerate() {
                if is_package_line(line) {
                    continue;
                }
                if let Some(decl) = parse_import(line) {
                    if relate(&decl, &query.target).is_qualified() {
                        hits.push(raw_hit(
                            idx + 1,
                            original,
                            decl.column,
                            UsageKind::Import,
                            None,
                            Anchor::Qualified,
                        ));
                    }
                    continue;
                }
                for occurrence in class_occurrences(line, &summary.names, &query.target) {
                    hits.push(raw_hit(
                        idx + 1,
                        original,
                        occurrence.start,
                        occurrence.kind,
                        None,
                        occurrence.anchor,
                    ));
                }
            }
        }
        Some(kind) => {
            let mut member_scan = MemberScan {
                query,
                kind,
                dialect: source.dialect,
                summary,
                bindings: VariableBinding::new(),
                pending_override: false,
            };
            for (idx, (original, line)) in source.line_pairs().enumerate() {
                member_scan.scan_line(idx + 1, original, line, &mut hits);
            }
            trace!("{} bound variables at end of file", member_scan.bindings.bound_count());
        }
    }

    debug!("Heuristic scan produced {} raw hits ({} mode)", hits.len(), query.mode);
    hits
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEngine;

impl UsageProducer for HeuristicEngine {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn supports(&self, _dialect: Dialect) -> bool {
        true
    }

    fn produce(&self, source: &SourceText, query: &Query) -> Result<Vec<RawHit>, ParseError> {
        Ok(scan(source, query))
    }
}
