use log::trace;
use regex::Regex;
use std::{collections::BTreeSet, sync::OnceLock};

use nobifinder_core::Target;

use crate::types::SourceText;

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\s*)import\s+(static\s+)?([A-Za-z_]\w*(?:\s*\.\s*[A-Za-z_]\w*)*)(\s*\.\s*\*)?(?:\s+as\s+([A-Za-z_]\w*))?",
        )
        .expect("valid import regex")
    })
}

fn package_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*package\s").expect("valid package line regex"))
}

pub(crate) fn is_package_line(line: &str) -> bool {
    package_line_regex().is_match(line)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportDecl {
    /// Byte offset of the `import` keyword
    pub column: usize,
    pub path: String,
    pub is_static: bool,
    pub wildcard: bool,
    pub alias: Option<String>,
}

impl ImportDecl {
    /// Name the import introduces into the file.
    fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.path.rsplit('.').next().unwrap_or(&self.path))
    }
}

pub(crate) fn parse_import(line: &str) -> Option<ImportDecl> {
    let caps = import_regex().captures(line)?;
    Some(ImportDecl {
        column: caps.get(1).map_or(0, |m| m.end()),
        path: caps[3].chars().filter(|c| !c.is_whitespace()).collect(),
        is_static: caps.get(2).is_some(),
        wildcard: caps.get(4).is_some(),
        alias: caps.get(5).map(|m| m.as_str().to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImportRelation {
    /// `import com.example.User`, possibly aliased
    Class,
    /// `import com.example.*`
    PackageWildcard,
    /// `import com.example.User.*` or `import static com.example.User.*`
    MemberWildcard,
    /// `import com.example.User.create`, `import static com.example.User.MAX`
    Member(String),
    /// Another class imported under the target's simple name
    Conflicting,
    Unrelated,
}

impl ImportRelation {
    pub(crate) fn is_qualified(&self) -> bool {
        matches!(
            self,
            ImportRelation::Class
                | ImportRelation::PackageWildcard
                | ImportRelation::MemberWildcard
                | ImportRelation::Member(_)
        )
    }
}

pub(crate) fn relate(decl: &ImportDecl, target: &Target) -> ImportRelation {
    if decl.wildcard {
        return if !target.package.is_empty() && decl.path == target.package {
            ImportRelation::PackageWildcard
        } else if decl.path == target.fqn {
            ImportRelation::MemberWildcard
        } else {
            ImportRelation::Unrelated
        };
    }
    if decl.path == target.fqn {
        return ImportRelation::Class;
    }
    if let Some(rest) = decl.path.strip_prefix(target.fqn.as_str()).and_then(|r| r.strip_prefix('.'))
    {
        let member = rest.split('.').next().unwrap_or(rest);
        return ImportRelation::Member(member.to_string());
    }
    if decl.local_name() == target.class_name {
        return ImportRelation::Conflicting;
    }
    ImportRelation::Unrelated
}

/// What a file's import block says about the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ImportSummary {
    /// Names the target class is visible under in this file
    pub names: Vec<String>,
    /// Members imported by name, callable without a receiver
    pub static_members: BTreeSet<String>,
    pub qualified: bool,
    pub conflicting: bool,
}

impl ImportSummary {
    pub(crate) fn collect(source: &SourceText, target: &Target) -> Self {
        let aliases_allowed = source.dialect.rules().import_aliases;
        let mut summary = ImportSummary::default();
        let mut aliases = Vec::new();

        for line in source.scrubbed.lines() {
            let Some(decl) = parse_import(line) else {
                continue;
            };
            let relation = relate(&decl, target);
            trace!("Import '{}' relates to target as {:?}", decl.path, relation);
            summary.qualified |= relation.is_qualified();
            match relation {
                ImportRelation::Class => {
                    if aliases_allowed
                        && let Some(alias) = decl.alias
                        && alias != target.class_name
                    {
                        aliases.push(alias);
                    }
                }
                ImportRelation::Member(name) => {
                    summary.static_members.insert(name);
                }
                ImportRelation::Conflicting => summary.conflicting = true,
                _ => {}
            }
        }

        if !summary.conflicting {
            summary.names.push(target.class_name.clone());
        }
        for alias in aliases {
            if !summary.names.contains(&alias) {
                summary.names.push(alias);
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nobifinder_core::Dialect;
    use std::collections::BTreeSet;

    fn target() -> Target {
        Target::new("com.example", "User", BTreeSet::new())
    }

    #[test]
    fn test_parse_import_forms() {
        let decl = parse_import("import com.example.User").unwrap();
        assert_eq!((decl.column, decl.path.as_str(), decl.wildcard), (0, "com.example.User", false));

        let decl = parse_import("  import static com.example.User.create;").unwrap();
        assert!(decl.is_static);
        assert_eq!(decl.column, 2);
        assert_eq!(decl.path, "com.example.User.create");

        let decl = parse_import("import com.example.*").unwrap();
        assert!(decl.wildcard);
        assert_eq!(decl.path, "com.example");

        let decl = parse_import("import com.example.User as Account").unwrap();
        assert_eq!(decl.alias.as_deref(), Some("Account"));

        assert!(parse_import("val important = 1").is_none());
        assert!(parse_import("// import com.example.User").is_none());
    }

    #[test]
    fn test_relations() {
        let t = target();
        let rel = |line: &str| relate(&parse_import(line).unwrap(), &t);
        assert_eq!(rel("import com.example.User"), ImportRelation::Class);
        assert_eq!(rel("import com.example.*"), ImportRelation::PackageWildcard);
        assert_eq!(rel("import static com.example.User.*;"), ImportRelation::MemberWildcard);
        assert_eq!(
            rel("import static com.example.User.create;"),
            ImportRelation::Member("create".into())
        );
        assert_eq!(rel("import com.example.User.Builder"), ImportRelation::Member("Builder".into()));
        assert_eq!(rel("import other.pkg.User"), ImportRelation::Conflicting);
        assert_eq!(rel("import other.pkg.Admin as User"), ImportRelation::Conflicting);
        assert_eq!(rel("import other.pkg.User as OtherUser"), ImportRelation::Unrelated);
        assert_eq!(rel("import com.example.UserService"), ImportRelation::Unrelated);
        assert_eq!(rel("import com.exampleX.*"), ImportRelation::Unrelated);
    }

    #[test]
    fn test_summary_collects_aliases_and_members() {
        let src = SourceText::new(
            "import com.example.User as Account\nimport com.example.User.create\n\nfun f() = create()\n",
            Dialect::Kotlin,
        );
        let summary = ImportSummary::collect(&src, &target());
        assert!(summary.qualified);
        assert!(!summary.conflicting);
        assert_eq!(summary.names, vec!["User".to_string(), "Account".to_string()]);
        assert!(summary.static_members.contains("create"));
    }

    #[test]
    fn test_summary_conflicting_import_drops_simple_name() {
        let src = SourceText::new("import other.pkg.User\n\nval u = User()\n", Dialect::Kotlin);
        let summary = ImportSummary::collect(&src, &target());
        assert!(summary.conflicting);
        assert!(!summary.qualified);
        assert!(summary.names.is_empty());
    }

    #[test]
    fn test_summary_ignores_commented_imports() {
        let src = SourceText::new("// import com.example.User\nclass A\n", Dialect::Java);
        let summary = ImportSummary::collect(&src, &target());
        assert!(!summary.qualified);
        assert_eq!(summary.names, vec!["User".to_string()]);
    }
}
