use std::collections::BTreeSet;

use nobifinder_core::{Dialect, MemberSpec, ParseError, SearchMode, Target};

use crate::types::{RawHit, SourceText};

/// What every producer is asked to find in a file.
#[derive(Debug, Clone)]
pub struct Query {
    pub target: Target,
    pub mode: SearchMode,
    pub members: MemberSpec,
    /// Declared members of the searched kind; when set, only these names are
    /// candidates even if `members` would match more.
    pub declared: Option<BTreeSet<String>>,
}

impl Query {
    pub fn class(target: Target) -> Self {
        Self { target, mode: SearchMode::Class, members: MemberSpec::All, declared: None }
    }

    pub fn members(target: Target, mode: SearchMode, members: MemberSpec) -> Self {
        Self { target, mode, members, declared: None }
    }

    /// Restricts candidates to the target's declared members of the searched
    /// kind, if the target declares any.
    pub fn restrict_to_declared(mut self) -> Self {
        if let Some(kind) = self.mode.member_kind() {
            let declared: BTreeSet<String> =
                self.target.members_of(kind).into_iter().map(str::to_string).collect();
            self.declared = (!declared.is_empty()).then_some(declared);
        }
        self
    }

    pub fn wants(&self, name: &str) -> bool {
        self.members.matches(name) && self.declared.as_ref().is_none_or(|d| d.contains(name))
    }

    /// Names the query selects, as far as they are known up front: declared
    /// members passing the selector, else the explicit names. Empty for class
    /// mode and for unrestricted `all` or pattern selectors.
    pub fn selected_members(&self) -> Vec<String> {
        if self.mode == SearchMode::Class {
            return Vec::new();
        }
        match (&self.declared, &self.members) {
            (Some(declared), _) => {
                declared.iter().filter(|name| self.members.matches(name)).cloned().collect()
            }
            (None, MemberSpec::Names(names)) => names.iter().cloned().collect(),
            (None, _) => Vec::new(),
        }
    }
}

/// Produces raw, unfiltered usage hits for one file. Implementations keep no
/// state between files, so one instance serves every worker.
pub trait UsageProducer: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, dialect: Dialect) -> bool;

    /// Hits in text order (top to bottom, left to right). A `ParseError`
    /// means the caller must scan the file another way.
    fn produce(&self, source: &SourceText, query: &Query) -> Result<Vec<RawHit>, ParseError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nobifinder_core::{DeclaredMember, MemberKind};

    fn target() -> Target {
        let members = BTreeSet::from([
            DeclaredMember { name: "save".into(), kind: MemberKind::Method },
            DeclaredMember { name: "load".into(), kind: MemberKind::Method },
            DeclaredMember { name: "name".into(), kind: MemberKind::Field },
        ]);
        Target::new("com.example", "User", members)
    }

    #[test]
    fn test_wants_without_restriction() {
        let query = Query::members(target(), SearchMode::Method, MemberSpec::All);
        assert!(query.wants("save"));
        assert!(query.wants("undeclared"));
    }

    #[test]
    fn test_restrict_to_declared_kind() {
        let query =
            Query::members(target(), SearchMode::Method, MemberSpec::All).restrict_to_declared();
        assert!(query.wants("save"));
        assert!(query.wants("load"));
        assert!(!query.wants("name"));
        assert!(!query.wants("undeclared"));
    }

    #[test]
    fn test_selected_members() {
        let pattern = MemberSpec::compile("/l.*/").unwrap();
        let query = Query::members(target(), SearchMode::Method, pattern).restrict_to_declared();
        assert_eq!(query.selected_members(), vec!["load".to_string()]);

        let names = MemberSpec::compile("b, a").unwrap();
        let bare = Target::new("p", "Empty", BTreeSet::new());
        let query = Query::members(bare, SearchMode::Field, names).restrict_to_declared();
        assert_eq!(query.selected_members(), vec!["a".to_string(), "b".to_string()]);

        assert!(Query::class(target()).selected_members().is_empty());
    }

    #[test]
    fn test_restriction_skipped_when_nothing_declared() {
        let bare = Target::new("p", "Empty", BTreeSet::new());
        let query = Query::members(bare, SearchMode::Field, MemberSpec::All).restrict_to_declared();
        assert!(query.declared.is_none());
        assert!(query.wants("anything"));
    }
}
