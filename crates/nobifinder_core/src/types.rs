use serde::Serialize;
use std::{collections::BTreeSet, fmt, path::PathBuf, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Method,
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclaredMember {
    pub name: String,
    pub kind: MemberKind,
}

/// The class being searched for. Built once per run from the target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub package: String,
    pub class_name: String,
    pub fqn: String,
    pub declared_members: BTreeSet<DeclaredMember>,
}

impl Target {
    pub fn new(
        package: impl Into<String>,
        class_name: impl Into<String>,
        declared_members: BTreeSet<DeclaredMember>,
    ) -> Self {
        let package = package.into();
        let class_name = class_name.into();
        let fqn =
            if package.is_empty() { class_name.clone() } else { format!("{package}.{class_name}") };
        Self { package, class_name, fqn, declared_members }
    }

    /// Declared member names of one kind, sorted.
    pub fn members_of(&self, kind: MemberKind) -> Vec<&str> {
        self.declared_members.iter().filter(|m| m.kind == kind).map(|m| m.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Class,
    Method,
    Field,
}

impl SearchMode {
    /// The member kind searched for, `None` in class mode.
    pub fn member_kind(self) -> Option<MemberKind> {
        match self {
            SearchMode::Class => None,
            SearchMode::Method => Some(MemberKind::Method),
            SearchMode::Field => Some(MemberKind::Field),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMode::Class => "class",
            SearchMode::Method => "method",
            SearchMode::Field => "field",
        };
        f.write_str(s)
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "class" => Ok(SearchMode::Class),
            "method" => Ok(SearchMode::Method),
            "field" => Ok(SearchMode::Field),
            other => Err(format!("unknown search mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Import,
    TypeReference,
    ConstructorCall,
    Annotation,
    Override,
    MethodCall,
    FieldAccess,
    FieldAssignment,
    MethodReference,
}

impl UsageKind {
    pub fn label(self) -> &'static str {
        match self {
            UsageKind::Import => "import",
            UsageKind::TypeReference => "type_reference",
            UsageKind::ConstructorCall => "constructor_call",
            UsageKind::Annotation => "annotation",
            UsageKind::Override => "override",
            UsageKind::MethodCall => "method_call",
            UsageKind::FieldAccess => "field_access",
            UsageKind::FieldAssignment => "field_assignment",
            UsageKind::MethodReference => "method_reference",
        }
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One usage site. `line` is 1-based, `column` is a 0-based character offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageHit {
    pub line: usize,
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    pub kind: UsageKind,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    /// Package of the scanned file, not of the target
    pub package: Option<String>,
    hits: Vec<UsageHit>,
}

impl FileResult {
    /// Hits are ordered by line, then column.
    pub fn new(path: PathBuf, package: Option<String>, mut hits: Vec<UsageHit>) -> Self {
        hits.sort_by_key(|h| (h.line, h.column));
        Self { path, package, hits }
    }

    pub fn hits(&self) -> &[UsageHit] {
        &self.hits
    }

    pub fn count(&self) -> usize {
        self.hits.len()
    }
}
