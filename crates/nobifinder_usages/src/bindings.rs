//! Variable-to-type tracking for receiver resolution.
//!
//! A [`VariableBinding`] lives for exactly one file scan. It records every
//! variable it sees declared and whether the declaration ties the variable to
//! the target class: an explicit type naming the target, or an initializer
//! that constructs it. Assignments between variables are not followed, so
//! `val v = u` leaves `v` unbound even when `u` is bound.

use log::trace;
use regex::Regex;
use std::{collections::HashMap, sync::OnceLock};

use nobifinder_core::Dialect;

const JAVA_NON_TYPES: &[&str] = &[
    "return", "new", "throw", "else", "case", "package", "import", "yield", "assert", "goto",
    "break", "continue", "do", "instanceof", "final", "static",
];

/// Spellings of the target type usable in declarations within one file.
#[derive(Debug, Clone, Copy)]
pub struct TypeNames<'a> {
    pub simple: &'a [String],
    pub fqn: &'a str,
}

impl TypeNames<'_> {
    /// Whether a declared type token names the target. Nullability, array
    /// brackets and type arguments are ignored, so `User?` and `User[]` match
    /// while `List<User>` does not.
    pub fn matches(&self, token: &str) -> bool {
        let base = token.split('<').next().unwrap_or(token).trim();
        let base = base.trim_end_matches(['?', '!', '[', ']', ' ']);
        base == self.fqn || self.simple.iter().any(|name| name == base)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableBinding {
    vars: HashMap<String, bool>,
}

fn kotlin_declaration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:val|var)\s+([A-Za-z_]\w*)").expect("valid kotlin declaration regex")
    })
}

fn kotlin_typed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_]\w*)\s*:\s*([A-Za-z_][\w.]*(?:<[^>]*>)?\??)")
            .expect("valid kotlin typed declaration regex")
    })
}

fn java_typed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:^|[^\w.])([A-Za-z_][\w.]*(?:<[^;=()]*?>)?(?:\[\])*)\s+([A-Za-z_]\w*)\s*(?:[=;,):]|$)",
        )
        .expect("valid java typed declaration regex")
    })
}

fn constructor_init_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:^|[^\w.])(?:this\.)?([A-Za-z_]\w*)\s*=\s*(?:new\s+)?([A-Za-z_][\w.]*)\s*(?:<[^>]*>)?\s*\(",
        )
        .expect("valid initializer regex")
    })
}

fn preceding_word(text: &str) -> &str {
    let trimmed = text.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
        .map_or(0, |(i, c)| i + c.len_utf8());
    &trimmed[start..]
}

impl VariableBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a declaration; a later declaration of the same name shadows
    /// the earlier one.
    pub fn declare(&mut self, name: &str, is_target: bool) {
        trace!("Binding '{}' -> {}", name, if is_target { "target" } else { "other" });
        self.vars.insert(name.to_string(), is_target);
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.vars.get(name).copied().unwrap_or(false)
    }

    pub fn bound_count(&self) -> usize {
        self.vars.values().filter(|bound| **bound).count()
    }

    /// Updates bindings from one scrubbed line. Untyped declarations reset a
    /// name first, explicit types decide next, and a constructor initializer
    /// can only bind.
    pub fn observe_line(&mut self, line: &str, dialect: Dialect, names: &TypeNames<'_>) {
        match dialect {
            Dialect::Kotlin => {
                for caps in kotlin_declaration_regex().captures_iter(line) {
                    self.declare(&caps[1], false);
                }
                for caps in kotlin_typed_regex().captures_iter(line) {
                    let Some(name) = caps.get(1) else { continue };
                    if matches!(preceding_word(&line[..name.start()]), "class" | "object" | "interface")
                    {
                        continue;
                    }
                    self.declare(name.as_str(), names.matches(&caps[2]));
                }
            }
            Dialect::Java => {
                for caps in java_typed_regex().captures_iter(line) {
                    let ty = &caps[1];
                    if ty == "var" {
                        self.declare(&caps[2], false);
                    } else if !JAVA_NON_TYPES.contains(&ty) {
                        self.declare(&caps[2], names.matches(ty));
                    }
                }
            }
        }

        for caps in constructor_init_regex().captures_iter(line) {
            if names.matches(&caps[2]) {
                self.declare(&caps[1], true);
            }
        }
    }
}
