use log::debug;
use regex::Regex;
use std::collections::BTreeSet;

use crate::error::FinderError;

/// Which members of the target a member-mode search looks for.
#[derive(Debug, Clone)]
pub enum MemberSpec {
    All,
    Names(BTreeSet<String>),
    /// Regex over the whole member name; `/get.*/` never matches `forget`.
    Pattern(Regex),
}

impl MemberSpec {
    /// Compiles a user-supplied member selector:
    /// `all` (any case), `/regex/`, or a comma-separated list of names.
    pub fn compile(spec: &str) -> Result<MemberSpec, FinderError> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("all") {
            return Ok(MemberSpec::All);
        }

        if spec.len() > 2 && spec.starts_with('/') && spec.ends_with('/') {
            let body = &spec[1..spec.len() - 1];
            let regex = Regex::new(&format!("^(?:{body})$")).map_err(|source| {
                FinderError::InvalidPattern { pattern: body.to_string(), source }
            })?;
            debug!("Member pattern compiled: {}", regex.as_str());
            return Ok(MemberSpec::Pattern(regex));
        }

        let names: BTreeSet<String> = spec
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        debug!("Member names: {:?}", names);
        Ok(MemberSpec::Names(names))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            MemberSpec::All => true,
            MemberSpec::Names(names) => names.contains(name),
            MemberSpec::Pattern(regex) => regex.is_match(name),
        }
    }

    /// Members of `declared` this selector picks, in declaration order.
    pub fn select<'a>(&self, declared: &[&'a str]) -> Vec<&'a str> {
        declared.iter().copied().filter(|name| self.matches(name)).collect()
    }
}
