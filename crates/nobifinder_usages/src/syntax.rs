//! Syntax-tree producer for Java.
//!
//! Parses the original text with tree-sitter and maps nodes onto the same
//! [`RawHit`] shape the heuristic engine emits: positions point at the same
//! token, snippets are the trimmed original line, and anchors carry the same
//! meaning for the filter stage. A tree with error nodes is rejected with a
//! [`ParseError`] so the caller falls back to the heuristic scan.

use log::{debug, trace};
use tree_sitter::{Node, Parser, Tree};

use nobifinder_core::{Dialect, MemberKind, ParseError, UsageKind, split_lines};

use crate::{
    bindings::{TypeNames, VariableBinding},
    engine::raw_hit,
    imports::{ImportRelation, ImportSummary, parse_import, relate},
    producer::{Query, UsageProducer},
    types::{Anchor, RawHit, SourceText},
};

const NUMERIC_LITERALS: &[&str] = &[
    "decimal_integer_literal",
    "hex_integer_literal",
    "octal_integer_literal",
    "binary_integer_literal",
    "decimal_floating_point_literal",
    "hex_floating_point_literal",
];

const SKIPPED_NODES: &[&str] =
    &["package_declaration", "line_comment", "block_comment", "string_literal", "text_block"];

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaSyntaxAdapter;

impl JavaSyntaxAdapter {
    /// Parses Java source. A tree containing error or missing nodes counts as
    /// a failure.
    pub fn parse(&self, text: &str) -> Result<Tree, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| parse_error(format!("grammar rejected: {e}")))?;
        let tree = parser.parse(text, None).ok_or_else(|| parse_error("parser returned no tree"))?;
        if tree.root_node().has_error() {
            let reason = match first_error(tree.root_node()) {
                Some(node) => format!(
                    "syntax error at {}:{}",
                    node.start_position().row + 1,
                    node.start_position().column + 1
                ),
                None => "syntax error".to_string(),
            };
            return Err(parse_error(reason));
        }
        Ok(tree)
    }
}

fn parse_error(reason: impl Into<String>) -> ParseError {
    ParseError { dialect: "java", reason: reason.into() }
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn is_field<'t>(parent: Node<'t>, field: &str, node: Node<'t>) -> bool {
    parent.child_by_field_name(field).is_some_and(|child| child.id() == node.id())
}

/// Per-file state of one tree walk.
struct TreeScan<'a> {
    query: &'a Query,
    source: &'a str,
    lines: Vec<&'a str>,
    summary: ImportSummary,
    bindings: VariableBinding,
    hits: Vec<RawHit>,
}

impl<'a> TreeScan<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Node text with whitespace removed, for comparing dotted names.
    fn compact(&self, node: Node<'_>) -> String {
        self.text(node).chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn type_names(&self) -> TypeNames<'_> {
        TypeNames { simple: &self.summary.names, fqn: &self.query.target.fqn }
    }

    fn is_target_name(&self, name: &str) -> bool {
        self.summary.names.iter().any(|n| n == name)
    }

    /// Builds the hit for a node, anchored at the node's first character.
    fn map_node_to_hit(
        &self,
        node: Node<'_>,
        kind: UsageKind,
        member: Option<&str>,
        anchor: Anchor,
    ) -> Option<RawHit> {
        let position = node.start_position();
        let original = self.lines.get(position.row)?;
        Some(raw_hit(position.row + 1, original, position.column, kind, member, anchor))
    }

    fn emit(&mut self, node: Node<'_>, kind: UsageKind, member: Option<&str>, anchor: Anchor) {
        if let Some(hit) = self.map_node_to_hit(node, kind, member, anchor) {
            trace!("Syntax hit {:?} at {}:{}", hit.hit.kind, hit.hit.line, hit.hit.column);
            self.hits.push(hit);
        }
    }

    /// Visits one node; returns whether its children should be visited.
    fn visit(&mut self, node: Node<'_>) -> bool {
        if SKIPPED_NODES.contains(&node.kind()) {
            return false;
        }
        if node.kind() == "import_declaration" {
            self.visit_import(node);
            return false;
        }
        match self.query.mode.member_kind() {
            None => self.visit_class_mode(node),
            Some(kind) => {
                self.observe_binding(node);
                self.visit_member_mode(node, kind);
                true
            }
        }
    }

    fn visit_import(&mut self, node: Node<'_>) {
        let Some(decl) = parse_import(self.text(node)) else { return };
        let relation = relate(&decl, &self.query.target);
        match (self.query.mode.member_kind(), relation) {
            (None, relation) if relation.is_qualified() => {
                self.emit(node, UsageKind::Import, None, Anchor::Qualified);
            }
            (Some(_), ImportRelation::Member(name)) if self.query.wants(&name) => {
                self.emit(node, UsageKind::Import, Some(name.as_str()), Anchor::Qualified);
            }
            _ => {}
        }
    }

    /// Whether a type node (possibly wrapped in `generic_type`) is the type
    /// being instantiated by `new`.
    fn is_instantiated(&self, node: Node<'_>) -> bool {
        let Some(parent) = node.parent() else { return false };
        let (holder, typed) = if parent.kind() == "generic_type" {
            match parent.parent() {
                Some(grandparent) => (grandparent, parent),
                None => return false,
            }
        } else {
            (parent, node)
        };
        holder.kind() == "object_creation_expression" && is_field(holder, "type", typed)
    }

    fn type_usage(&self, node: Node<'_>) -> UsageKind {
        if self.is_instantiated(node) { UsageKind::ConstructorCall } else { UsageKind::TypeReference }
    }

    fn visit_class_mode(&mut self, node: Node<'_>) -> bool {
        match node.kind() {
            "marker_annotation" | "annotation" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let compact = self.compact(name);
                    if compact == self.query.target.fqn {
                        self.emit(node, UsageKind::Annotation, None, Anchor::Qualified);
                    } else if self.is_target_name(&compact) {
                        self.emit(node, UsageKind::Annotation, None, Anchor::SimpleName);
                    }
                }
                // arguments may still reference the class
                node.kind() == "annotation"
            }
            "scoped_type_identifier" | "field_access" => {
                if self.compact(node) == self.query.target.fqn {
                    let kind = self.type_usage(node);
                    self.emit(node, kind, None, Anchor::Qualified);
                    return false;
                }
                true
            }
            "type_identifier" => {
                let qualified_by_other =
                    node.parent().is_some_and(|p| p.kind() == "scoped_type_identifier")
                        && node.prev_sibling().is_some();
                if !qualified_by_other && self.is_target_name(self.text(node)) {
                    let kind = self.type_usage(node);
                    self.emit(node, kind, None, Anchor::SimpleName);
                }
                false
            }
            "identifier" => {
                let receiver = node.parent().is_some_and(|p| match p.kind() {
                    "method_invocation" | "field_access" => is_field(p, "object", node),
                    "method_reference" => node.prev_sibling().is_none(),
                    _ => false,
                });
                if receiver && self.is_target_name(self.text(node)) {
                    self.emit(node, UsageKind::TypeReference, None, Anchor::SimpleName);
                }
                false
            }
            _ => true,
        }
    }

    fn creates_target(&self, value: Option<Node<'_>>) -> bool {
        value.is_some_and(|v| {
            v.kind() == "object_creation_expression"
                && v.child_by_field_name("type")
                    .is_some_and(|ty| self.type_names().matches(&self.compact(ty)))
        })
    }

    fn observe_binding(&mut self, node: Node<'_>) {
        match node.kind() {
            "local_variable_declaration" | "field_declaration" => {
                let Some(ty) = node.child_by_field_name("type") else { return };
                let ty = self.compact(ty);
                let typed = ty != "var" && self.type_names().matches(&ty);
                let mut cursor = node.walk();
                let declarators: Vec<Node<'_>> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "variable_declarator")
                    .collect();
                for declarator in declarators {
                    let Some(name) = declarator.child_by_field_name("name") else { continue };
                    let bound = typed || self.creates_target(declarator.child_by_field_name("value"));
                    let name = self.text(name);
                    self.bindings.declare(name, bound);
                }
            }
            "formal_parameter" | "enhanced_for_statement" => {
                let (Some(ty), Some(name)) =
                    (node.child_by_field_name("type"), node.child_by_field_name("name"))
                else {
                    return;
                };
                let bound = self.type_names().matches(&self.compact(ty));
                let name = self.text(name);
                self.bindings.declare(name, bound);
            }
            "assignment_expression" => {
                let Some(left) = node.child_by_field_name("left") else { return };
                if !self.creates_target(node.child_by_field_name("right")) {
                    return;
                }
                let name = match left.kind() {
                    "identifier" => Some(left),
                    "field_access" => left
                        .child_by_field_name("object")
                        .filter(|o| o.kind() == "this")
                        .and_then(|_| left.child_by_field_name("field")),
                    _ => None,
                };
                if let Some(name) = name {
                    let name = self.text(name);
                    self.bindings.declare(name, true);
                }
            }
            _ => {}
        }
    }

    fn name_anchor(&self, name: &str) -> Anchor {
        if self.bindings.is_bound(name) {
            Anchor::BoundReceiver
        } else if self.is_target_name(name) {
            Anchor::StaticReceiver
        } else {
            Anchor::UnboundReceiver
        }
    }

    /// Anchor for a receiver expression; `None` for numeric literals.
    fn receiver_anchor(&self, receiver: Node<'_>) -> Option<Anchor> {
        let kind = receiver.kind();
        if NUMERIC_LITERALS.contains(&kind) {
            return None;
        }
        let anchor = match kind {
            "identifier" | "type_identifier" => self.name_anchor(self.text(receiver)),
            "field_access" | "scoped_type_identifier" => {
                if self.compact(receiver) == self.query.target.fqn {
                    Anchor::Qualified
                } else {
                    let this_field = receiver
                        .child_by_field_name("object")
                        .filter(|o| o.kind() == "this")
                        .and_then(|_| receiver.child_by_field_name("field"));
                    match this_field {
                        Some(field) => self.name_anchor(self.text(field)),
                        None => Anchor::UnboundReceiver,
                    }
                }
            }
            _ => Anchor::UnboundReceiver,
        };
        Some(anchor)
    }

    fn field_usage(node: Node<'_>) -> UsageKind {
        let assigned = node.parent().is_some_and(|p| match p.kind() {
            "assignment_expression" => is_field(p, "left", node),
            "update_expression" => true,
            _ => false,
        });
        if assigned { UsageKind::FieldAssignment } else { UsageKind::FieldAccess }
    }

    fn visit_member_mode(&mut self, node: Node<'_>, kind: MemberKind) {
        match node.kind() {
            "method_invocation" if kind == MemberKind::Method => {
                let Some(name) = node.child_by_field_name("name") else { return };
                let member = self.text(name);
                if !self.query.wants(member) {
                    return;
                }
                let anchor = match node.child_by_field_name("object") {
                    Some(object) => self.receiver_anchor(object),
                    None => self.summary.static_members.contains(member).then_some(Anchor::Qualified),
                };
                if let Some(anchor) = anchor {
                    self.emit(name, UsageKind::MethodCall, Some(member), anchor);
                }
            }
            "field_access" if kind == MemberKind::Field => {
                let (Some(object), Some(field)) =
                    (node.child_by_field_name("object"), node.child_by_field_name("field"))
                else {
                    return;
                };
                let member = self.text(field);
                if !self.query.wants(member) {
                    return;
                }
                if let Some(anchor) = self.receiver_anchor(object) {
                    self.emit(field, Self::field_usage(node), Some(member), anchor);
                }
            }
            "method_reference" => {
                let mut cursor = node.walk();
                let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
                let (Some(receiver), Some(name)) = (children.first(), children.last()) else {
                    return;
                };
                if name.kind() != "identifier" || children.len() < 3 {
                    return;
                }
                let member = self.text(*name);
                if !self.query.wants(member) {
                    return;
                }
                let usage = match kind {
                    MemberKind::Method => UsageKind::MethodReference,
                    MemberKind::Field => UsageKind::FieldAccess,
                };
                if let Some(anchor) = self.receiver_anchor(*receiver) {
                    self.emit(*name, usage, Some(member), anchor);
                }
            }
            "method_declaration" if kind == MemberKind::Method => {
                let Some(name) = node.child_by_field_name("name") else { return };
                let member = self.text(name);
                if self.has_override(node) && self.query.wants(member) {
                    self.emit(name, UsageKind::Override, Some(member), Anchor::Declaration);
                }
            }
            "identifier" if kind == MemberKind::Field => {
                let member = self.text(node);
                if !self.summary.static_members.contains(member) || !self.query.wants(member) {
                    return;
                }
                let Some(parent) = node.parent() else { return };
                if is_field(parent, "name", node)
                    || is_field(parent, "field", node)
                    || parent.kind() == "method_reference"
                {
                    return;
                }
                self.emit(node, Self::field_usage(node), Some(member), Anchor::Qualified);
            }
            _ => {}
        }
    }

    fn has_override(&self, declaration: Node<'_>) -> bool {
        let mut cursor = declaration.walk();
        let modifiers = declaration.children(&mut cursor).find(|c| c.kind() == "modifiers");
        let Some(modifiers) = modifiers else { return false };
        let mut cursor = modifiers.walk();
        modifiers.named_children(&mut cursor).any(|m| {
            matches!(m.kind(), "marker_annotation" | "annotation")
                && m.child_by_field_name("name").is_some_and(|n| self.text(n) == "Override")
        })
    }
}

/// Walks the tree in pre-order, the syntax-tree equivalent of text order.
pub fn scan_tree(tree: &Tree, source: &SourceText, query: &Query) -> Vec<RawHit> {
    let mut scan = TreeScan {
        query,
        source: &source.text,
        lines: split_lines(&source.text).collect(),
        summary: ImportSummary::collect(source, &query.target),
        bindings: VariableBinding::new(),
        hits: Vec::new(),
    };

    let mut cursor = tree.walk();
    loop {
        let descend = scan.visit(cursor.node());
        if descend && cursor.goto_first_child() {
            continue;
        }
        let mut finished = false;
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                finished = true;
                break;
            }
        }
        if finished {
            break;
        }
    }

    let mut hits = scan.hits;
    hits.sort_by_key(|h| (h.hit.line, h.hit.column));
    hits.dedup_by(|a, b| {
        a.hit.line == b.hit.line && a.hit.column == b.hit.column && a.hit.kind == b.hit.kind
    });
    debug!("Syntax scan produced {} raw hits ({} mode)", hits.len(), query.mode);
    hits
}

impl UsageProducer for JavaSyntaxAdapter {
    fn name(&self) -> &'static str {
        "tree-sitter-java"
    }

    fn supports(&self, dialect: Dialect) -> bool {
        dialect == Dialect::Java
    }

    fn produce(&self, source: &SourceText, query: &Query) -> Result<Vec<RawHit>, ParseError> {
        let tree = self.parse(&source.text)?;
        Ok(scan_tree(&tree, source, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeuristicEngine;
    use nobifinder_core::{DeclaredMember, MemberSpec, SearchMode, Target, UsageHit};
    use std::collections::BTreeSet;

    const SERVICE: &str = r#"package com.app;

import com.example.User;

public class Service {
    private User owner;

    // new User() in a comment
    public User create(String name) {
        User user = new User(name);
        user.save();
        User.registry().save();
        return user;
    }

    @Override
    public void save() {
    }
}
"#;

    fn user() -> Target {
        let members = BTreeSet::from([
            DeclaredMember { name: "save".into(), kind: MemberKind::Method },
            DeclaredMember { name: "name".into(), kind: MemberKind::Field },
        ]);
        Target::new("com.example", "User", members)
    }

    fn hits(producer: &dyn UsageProducer, text: &str, query: &Query) -> Vec<UsageHit> {
        let source = SourceText::new(text, Dialect::Java);
        producer.produce(&source, query).unwrap().into_iter().map(|h| h.hit).collect()
    }

    fn positions(hits: &[UsageHit]) -> Vec<(usize, usize, UsageKind)> {
        hits.iter().map(|h| (h.line, h.column, h.kind)).collect()
    }

    #[test]
    fn test_class_mode_hits() {
        let found = hits(&JavaSyntaxAdapter, SERVICE, &Query::class(user()));
        assert_eq!(
            positions(&found),
            vec![
                (3, 0, UsageKind::Import),
                (6, 12, UsageKind::TypeReference),
                (9, 11, UsageKind::TypeReference),
                (10, 8, UsageKind::TypeReference),
                (10, 24, UsageKind::ConstructorCall),
                (12, 8, UsageKind::TypeReference),
            ]
        );
        assert_eq!(found[4].snippet, "User user = new User(name);");
    }

    #[test]
    fn test_method_mode_hits() {
        let names = MemberSpec::compile("save").unwrap();
        let query = Query::members(user(), SearchMode::Method, names);
        let source = SourceText::new(SERVICE, Dialect::Java);
        let raw = JavaSyntaxAdapter.produce(&source, &query).unwrap();
        let summary: Vec<_> =
            raw.iter().map(|h| (h.hit.line, h.hit.column, h.hit.kind, h.anchor)).collect();
        assert_eq!(
            summary,
            vec![
                (11, 13, UsageKind::MethodCall, Anchor::BoundReceiver),
                (12, 24, UsageKind::MethodCall, Anchor::UnboundReceiver),
                (17, 16, UsageKind::Override, Anchor::Declaration),
            ]
        );
        assert!(raw.iter().all(|h| h.hit.member.as_deref() == Some("save")));
    }

    #[test]
    fn test_agrees_with_heuristic_engine() {
        let class_query = Query::class(user());
        assert_eq!(
            hits(&JavaSyntaxAdapter, SERVICE, &class_query),
            hits(&HeuristicEngine, SERVICE, &class_query)
        );

        let method_query =
            Query::members(user(), SearchMode::Method, MemberSpec::compile("save").unwrap());
        assert_eq!(
            hits(&JavaSyntaxAdapter, SERVICE, &method_query),
            hits(&HeuristicEngine, SERVICE, &method_query)
        );
    }

    #[test]
    fn test_field_assignment_and_access() {
        let text = "class A {\n    void m(User user) {\n        user.name = \"x\";\n        log(user.name);\n        user.name += \"y\";\n    }\n}\n";
        let query = Query::members(user(), SearchMode::Field, MemberSpec::compile("/name/").unwrap());
        let found = hits(&JavaSyntaxAdapter, text, &query);
        assert_eq!(
            positions(&found),
            vec![
                (3, 13, UsageKind::FieldAssignment),
                (4, 17, UsageKind::FieldAccess),
                (5, 13, UsageKind::FieldAssignment),
            ]
        );
    }

    #[test]
    fn test_static_import_and_method_reference() {
        let text = "import static com.example.User.save;\n\nclass A {\n    void m(java.util.List<User> users) {\n        save();\n        users.forEach(User::save);\n    }\n}\n";
        let query = Query::members(user(), SearchMode::Method, MemberSpec::compile("save").unwrap());
        let source = SourceText::new(text, Dialect::Java);
        let raw = JavaSyntaxAdapter.produce(&source, &query).unwrap();
        let summary: Vec<_> = raw.iter().map(|h| (h.hit.line, h.hit.kind, h.anchor)).collect();
        assert_eq!(
            summary,
            vec![
                (1, UsageKind::Import, Anchor::Qualified),
                (5, UsageKind::MethodCall, Anchor::Qualified),
                (6, UsageKind::MethodReference, Anchor::StaticReceiver),
            ]
        );
    }

    #[test]
    fn test_qualified_type_references() {
        let text = "class A {\n    com.example.User u = new com.example.User();\n    other.User v;\n}\n";
        let found = hits(&JavaSyntaxAdapter, text, &Query::class(user()));
        assert_eq!(
            positions(&found),
            vec![(2, 4, UsageKind::TypeReference), (2, 29, UsageKind::ConstructorCall)]
        );
    }

    #[test]
    fn test_broken_java_is_a_parse_error() {
        let source = SourceText::new("class Broken { void m( { }", Dialect::Java);
        let err = JavaSyntaxAdapter.produce(&source, &Query::class(user())).unwrap_err();
        assert_eq!(err.dialect, "java");
        assert!(err.reason.starts_with("syntax error"));
    }

    #[test]
    fn test_supports_java_only() {
        assert!(JavaSyntaxAdapter.supports(Dialect::Java));
        assert!(!JavaSyntaxAdapter.supports(Dialect::Kotlin));
    }
}
