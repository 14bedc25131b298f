//! Data model for a correlation rule export.
//!
//! A rule export is parsed in two stages: the outer document carries one
//! `rule` element per correlation rule with scalar metadata fields, and each
//! rule's `text` field holds a second, complete XML document (embedded as
//! CDATA) describing the rule's internal logic. The outer parse keeps the
//! CDATA content verbatim so the embedded document can be re-parsed
//! independently.

use anyhow::{bail, Context, Result};
use roxmltree::{Document, Node};
use std::collections::HashSet;

/// Display name of the structural placeholder every logic document carries.
/// It is excluded from output and from the relation graph.
pub const ROOT_PLACEHOLDER: &str = "Root Rule";

/// An ordered sequence of correlation rules read from one export file.
#[derive(Debug, Clone, Default)]
pub struct RuleExport {
    pub rules: Vec<Rule>,
}

/// One correlation rule with its metadata and embedded logic document.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub normalization_id: String,
    /// Display name. Unique across the export (enforced by validation).
    pub message: String,
    pub description: String,
    pub severity: String,
    pub tags: Vec<String>,
    pub logic: RuleLogic,
}

/// The embedded logic document of a rule, in document order.
#[derive(Debug, Clone, Default)]
pub struct RuleLogic {
    pub params: Vec<Param>,
    pub rulesets: Vec<RuleSet>,
    pub triggers: Vec<Trigger>,
    pub condition_rules: Vec<ConditionRule>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub description: String,
    pub default_value: String,
}

/// Grouping key for the rule's output.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub correlation_field: String,
}

/// A timing/threshold node aggregating child conditions or sub-triggers.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub name: String,
    pub timeout: String,
    pub time_unit: String,
    pub threshold: u32,
    pub ordered: bool,
    /// Name of the enclosing trigger, if any. A trigger without a parent is
    /// anchored at the synthetic root of the relation graph.
    pub parent: Option<String>,
}

/// A match block describing an event-matching condition.
#[derive(Debug, Clone)]
pub struct ConditionRule {
    pub name: String,
    /// Per-rule override of the export-level correlation field.
    pub correlation_field: Option<String>,
    pub activate: Option<String>,
    pub action: Option<RuleAction>,
    pub match_block: Option<MatchBlock>,
    /// Filter predicate fragments in document order. The renderer assembles
    /// them into completed (type, operator, value) triples.
    pub filter_events: Vec<FilterEvent>,
}

#[derive(Debug, Clone)]
pub struct RuleAction {
    pub kind: String,
    pub trigger: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MatchBlock {
    pub match_type: String,
    pub count: String,
}

/// One attribute observed while walking a condition rule's filter elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    FieldType(String),
    Operator(String),
    Value(String),
}

impl RuleExport {
    /// Parses the outer export document and, per rule, its embedded logic
    /// document. A malformed embedded document fails the whole parse.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml).context("rule export is not well-formed XML")?;
        let mut rules = Vec::new();
        for node in doc
            .root_element()
            .descendants()
            .filter(|n| n.has_tag_name("rule"))
        {
            rules.push(Rule::from_node(node)?);
        }
        Ok(Self { rules })
    }

    /// Rejects exports where two rules share a display name. Runs before any
    /// per-rule processing so a fatal export never produces partial output.
    pub fn validate_unique_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for rule in &self.rules {
            if !seen.insert(rule.message.as_str()) && !duplicates.contains(&rule.message) {
                duplicates.push(rule.message.clone());
            }
        }
        if !duplicates.is_empty() {
            bail!("duplicate rule names in export: {}", duplicates.join(", "));
        }
        Ok(())
    }

    /// Stable ascending sort by display name (case-sensitive lexical).
    pub fn sort_by_message(&mut self) {
        self.rules.sort_by(|a, b| a.message.cmp(&b.message));
    }
}

impl Rule {
    fn from_node(node: Node) -> Result<Self> {
        let message = child_text(node, "message").unwrap_or_default().to_string();
        let raw_logic = child_text(node, "text").unwrap_or_default();
        let logic = RuleLogic::parse(raw_logic)
            .with_context(|| format!("embedded logic document of rule '{message}'"))?;
        Ok(Self {
            id: child_text(node, "id").unwrap_or_default().to_string(),
            normalization_id: child_text(node, "normid").unwrap_or_default().to_string(),
            message,
            description: child_text(node, "description")
                .unwrap_or_default()
                .to_string(),
            severity: child_text(node, "severity").unwrap_or_default().to_string(),
            tags: node
                .children()
                .filter(|c| c.has_tag_name("tag"))
                .filter_map(|c| c.text())
                .map(str::to_string)
                .collect(),
            logic,
        })
    }
}

impl RuleLogic {
    /// Parses the embedded logic document. Elements are collected in
    /// document order, which the renderer and graph builder rely on.
    pub fn parse(xml: &str) -> Result<Self> {
        if xml.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc = Document::parse(xml).context("embedded logic is not well-formed XML")?;
        let mut logic = Self::default();
        for node in doc.root().descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "param" => logic.params.push(Param {
                    name: attr(node, "name"),
                    description: attr(node, "description"),
                    default_value: attr(node, "defaultvalue"),
                }),
                "ruleset" => logic.rulesets.push(RuleSet {
                    correlation_field: attr(node, "correlationField"),
                }),
                "trigger" => logic.triggers.push(Trigger::from_node(node)),
                "rule" => logic.condition_rules.push(ConditionRule::from_node(node)),
                _ => {}
            }
        }
        Ok(logic)
    }

    pub fn trigger(&self, name: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.name == name)
    }
}

impl Trigger {
    fn from_node(node: Node) -> Self {
        // Declared parent attribute wins; otherwise the nearest enclosing
        // trigger element is the parent. Neither means the synthetic root.
        let parent = node
            .attribute("parent")
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| {
                node.ancestors()
                    .skip(1)
                    .find(|a| a.has_tag_name("trigger"))
                    .and_then(|a| a.attribute("name"))
                    .map(str::to_string)
            });
        Self {
            name: attr(node, "name"),
            timeout: attr(node, "timeout"),
            time_unit: attr(node, "timeUnit"),
            threshold: node
                .attribute("threshold")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            ordered: node.attribute("ordered") == Some("true"),
            parent,
        }
    }
}

impl ConditionRule {
    fn from_node(node: Node) -> Self {
        let mut rule = Self {
            name: attr(node, "name"),
            correlation_field: node
                .attribute("correlationField")
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            activate: None,
            action: None,
            match_block: None,
            filter_events: Vec::new(),
        };
        for el in node.descendants().filter(|n| n.is_element() && *n != node) {
            // Scope to this rule: skip elements owned by a nested rule.
            if el.ancestors().skip(1).find(|a| a.has_tag_name("rule")) != Some(node) {
                continue;
            }
            match el.tag_name().name() {
                "activate" => rule.activate = el.attribute("type").map(str::to_string),
                "action" => {
                    rule.action = Some(RuleAction {
                        kind: attr(el, "type"),
                        trigger: el
                            .attribute("trigger")
                            .filter(|v| !v.is_empty())
                            .map(str::to_string),
                    })
                }
                "match" => {
                    rule.match_block = Some(MatchBlock {
                        match_type: attr(el, "matchType"),
                        count: attr(el, "count"),
                    })
                }
                "singleFilterComponent" => {
                    if let Some(t) = el.attribute("type") {
                        rule.filter_events.push(FilterEvent::FieldType(t.to_string()));
                    }
                }
                "filterData" => match el.attribute("name") {
                    Some("operator") => {
                        if let Some(v) = el.attribute("value") {
                            rule.filter_events.push(FilterEvent::Operator(v.to_string()));
                        }
                    }
                    Some("value") => {
                        if let Some(v) = el.attribute("value") {
                            rule.filter_events.push(FilterEvent::Value(v.to_string()));
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        rule
    }

    pub fn is_root_placeholder(&self) -> bool {
        self.name == ROOT_PLACEHOLDER
    }
}

fn child_text<'a>(node: Node<'a, 'a>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.has_tag_name(name))
        .and_then(|c| c.text())
}

fn attr(node: Node, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}
