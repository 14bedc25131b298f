//! Document renderer.
//!
//! Walks the ordered rule export and the per-rule relation graphs and emits
//! one markdown document: table of contents, then per rule a fixed sequence
//! of sections ending in a page-break marker. All styling (key/value
//! decorations, list prefixes) comes from the injected [`DocConfig`].

use crate::config::DocConfig;
use crate::model::{ConditionRule, FilterEvent, Rule, RuleExport};
use crate::relations::RelationGraph;
use percent_encoding::percent_decode_str;
use std::path::PathBuf;

/// Per-rule inputs the renderer consumes next to the rule itself.
#[derive(Debug)]
pub struct RuleArtifacts {
    pub graph: RelationGraph,
    /// Path of the rendered diagram, when the external renderer produced one.
    pub image: Option<PathBuf>,
}

/// Decodes URL-style escapes and maps the `$$` parameter-placeholder marker
/// of the rule authoring tool to an exclamation mark.
pub fn decode_value(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8_lossy()
        .replace("$$", "!")
}

/// Title-cases a condition rule's display name, with underscores read as
/// word separators: `Another_Subrule name` becomes `Another Subrule Name`.
pub fn title_case(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accumulates (type, operator, value) filter triples while walking a
/// condition rule's filter events in document order.
///
/// Reset policy: operator and value clear after every emission; the
/// component type deliberately carries over into the next sibling filter
/// group. This reproduces the source tool's behavior and is pinned by a
/// regression test rather than silently corrected.
#[derive(Debug, Default)]
pub struct FilterAccumulator {
    field_type: Option<String>,
    operator: Option<String>,
    value: Option<String>,
}

impl FilterAccumulator {
    /// Feeds one event and returns a completed triple once type, operator
    /// and value have all been observed since the last emission.
    pub fn observe(&mut self, event: &FilterEvent) -> Option<(String, String, String)> {
        match event {
            FilterEvent::FieldType(t) => self.field_type = Some(t.clone()),
            FilterEvent::Operator(o) => self.operator = Some(o.clone()),
            FilterEvent::Value(v) => self.value = Some(v.clone()),
        }
        match (&self.field_type, &self.operator, &self.value) {
            (Some(t), Some(o), Some(v))
                if !t.is_empty() && !o.is_empty() && !v.is_empty() =>
            {
                let triple = (t.clone(), o.clone(), v.clone());
                self.operator = None;
                self.value = None;
                Some(triple)
            }
            _ => None,
        }
    }
}

pub struct Renderer<'a> {
    config: &'a DocConfig,
}

impl<'a> Renderer<'a> {
    pub fn new(config: &'a DocConfig) -> Self {
        Self { config }
    }

    /// Renders the whole document. `artifacts` pairs with `export.rules` in
    /// order.
    pub fn render(&self, export: &RuleExport, artifacts: &[RuleArtifacts]) -> String {
        debug_assert_eq!(export.rules.len(), artifacts.len());
        let mut out = String::new();
        if self.config.toc {
            out.push_str("\n# Correlation Rule Overview\n\n");
            for rule in &export.rules {
                out.push_str(&self.line(1, &rule.message, None));
            }
        }
        for (rule, artifact) in export.rules.iter().zip(artifacts) {
            self.render_rule(rule, artifact, &mut out);
        }
        out
    }

    fn render_rule(&self, rule: &Rule, artifact: &RuleArtifacts, out: &mut String) {
        out.push_str(&self.heading(1, &rule.message));

        out.push_str(&self.heading(2, "Description"));
        out.push_str(&decode_value(&rule.description));
        out.push('\n');

        out.push_str(&self.heading(2, "General Information"));
        out.push_str(&self.line(1, "Rule ID:", Some(&rule.id)));
        out.push_str(&self.line(1, "Normalization ID:", Some(&rule.normalization_id)));
        out.push_str(&self.line(1, "Severity:", Some(&rule.severity)));
        for tag in &rule.tags {
            out.push_str(&self.line(1, "Tag:", Some(tag)));
        }
        for ruleset in &rule.logic.rulesets {
            out.push_str(&self.line(1, "Group By:", Some(&ruleset.correlation_field)));
        }

        out.push_str(&self.heading(2, "Correlation Details"));
        if let Some(image) = &artifact.image {
            out.push_str(&format!(
                "\n![{}]({})\n",
                decode_value(&rule.message),
                image.display()
            ));
        }

        if !rule.logic.params.is_empty() {
            out.push_str(&self.heading(3, "Parameters"));
            for param in &rule.logic.params {
                out.push_str(&self.line(1, &param.name, None));
                out.push_str(&self.line(2, "Description:", Some(&param.description)));
                out.push_str(&self.line(2, "Default Value:", Some(&param.default_value)));
            }
        }

        out.push_str(&self.heading(3, "Rules"));
        for cond in rule
            .logic
            .condition_rules
            .iter()
            .filter(|c| !c.is_root_placeholder())
        {
            self.render_condition_rule(rule, cond, &artifact.graph, out);
        }

        out.push_str("\n\\newpage\n");
    }

    fn render_condition_rule(
        &self,
        rule: &Rule,
        cond: &ConditionRule,
        graph: &RelationGraph,
        out: &mut String,
    ) {
        out.push_str(&self.heading(4, &title_case(&cond.name)));

        if let Some(activate) = &cond.activate {
            out.push_str(&self.line(1, "Activate:", Some(activate)));
        }
        if let Some(field) = &cond.correlation_field {
            out.push_str(&self.line(1, "Override Group By:", Some(field)));
        }

        if let Some(action) = &cond.action {
            out.push_str(&self.line(1, "Action", None));
            out.push_str(&self.line(2, "Type:", Some(&action.kind)));
            if action.kind == "TRIGGER" {
                if let Some(trigger_ref) = &action.trigger {
                    out.push_str(&self.line(2, "Trigger:", Some(trigger_ref)));
                    // Detail lines only for references the graph resolved;
                    // a dangling reference stays name-only.
                    if graph.parent_of(&cond.name) == Some(trigger_ref.as_str()) {
                        if let Some(trigger) = rule.logic.trigger(trigger_ref) {
                            out.push_str(&self.line(3, "Timeout:", Some(&trigger.timeout)));
                            out.push_str(&self.line(3, "Time Units:", Some(&trigger.time_unit)));
                            out.push_str(&self.line(
                                3,
                                "Threshold:",
                                Some(&trigger.threshold.to_string()),
                            ));
                            out.push_str(&self.line(
                                3,
                                "Sequence:",
                                Some(if trigger.ordered { "true" } else { "false" }),
                            ));
                        }
                    }
                }
            } else {
                out.push_str(&self.line(
                    2,
                    "Details:",
                    Some("rendering for this action type is not implemented"),
                ));
            }
        }

        if let Some(m) = &cond.match_block {
            out.push_str(&self.line(1, "Match", None));
            out.push_str(&self.line(2, "Match Type:", Some(&m.match_type)));
            out.push_str(&self.line(2, "Count:", Some(&m.count)));
        }

        let mut accumulator = FilterAccumulator::default();
        for event in &cond.filter_events {
            if let Some((t, o, v)) = accumulator.observe(event) {
                out.push_str(&self.line(2, "Filter Component", None));
                out.push_str(&self.line(3, "Condition:", Some(&format!("'{t}' {o} '{v}'"))));
            }
        }
    }

    fn heading(&self, level: usize, text: &str) -> String {
        format!("\n{} {}\n", "#".repeat(level), decode_value(text))
    }

    /// One list line. `None` renders the key alone; an empty key or value
    /// suppresses the line entirely.
    fn line(&self, level: usize, key: &str, value: Option<&str>) -> String {
        if key.is_empty() {
            return String::new();
        }
        let prefix = self.config.level_prefix(level);
        let ks = &self.config.key_style;
        let vs = &self.config.value_style;
        let key = decode_value(key);
        match value {
            None => format!("{prefix}{ks}{key}{ks}\n"),
            Some("") => String::new(),
            Some(v) => format!("{prefix}{ks}{key}{ks} {vs}{}{vs}\n", decode_value(v)),
        }
    }
}
