//! Relation graph builder.
//!
//! The export's logic document stores triggers and condition rules as a flat
//! set of loosely related elements. This module reconstructs the implicit
//! tree: which trigger each condition rule reports to, how triggers nest
//! under each other, and the logical combinator (AND/OR) governing each
//! trigger's children.

use crate::model::{RuleLogic, Trigger};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// Name of the synthetic node every parentless trigger is anchored at.
pub const SYNTHETIC_ROOT: &str = "root";

/// Inferred boolean operator governing how a trigger's children must fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "AND"),
            Combinator::Or => write!(f, "OR"),
        }
    }
}

/// Diagram coloring class of a condition rule, derived from its match type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualClass {
    Reference,
    #[default]
    Standard,
}

impl VisualClass {
    pub fn from_match_type(match_type: Option<&str>) -> Self {
        match match_type {
            Some("REFERENCE") => Self::Reference,
            _ => Self::Standard,
        }
    }
}

/// A parent → child edge between trigger names and condition-rule names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub parent: String,
    pub child: String,
}

/// Directed tree reconstructed from one rule's logic document.
///
/// Unresolvable references are not errors: the affected node stays
/// disconnected (no parent edge) and a warning is logged, while the linear
/// document still renders it.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    edges: Vec<Edge>,
    combinators: HashMap<String, Combinator>,
    classes: HashMap<String, VisualClass>,
}

impl RelationGraph {
    pub fn build(logic: &RuleLogic) -> Self {
        let mut graph = Self::default();
        let trigger_names: HashSet<&str> =
            logic.triggers.iter().map(|t| t.name.as_str()).collect();

        // Condition rules attach to the trigger their action references.
        for cond in logic
            .condition_rules
            .iter()
            .filter(|c| !c.is_root_placeholder())
        {
            graph.classes.insert(
                cond.name.clone(),
                VisualClass::from_match_type(
                    cond.match_block.as_ref().map(|m| m.match_type.as_str()),
                ),
            );
            let Some(action) = &cond.action else { continue };
            if action.kind != "TRIGGER" {
                continue;
            }
            match &action.trigger {
                Some(target) if trigger_names.contains(target.as_str()) => {
                    graph.edges.push(Edge {
                        parent: target.clone(),
                        child: cond.name.clone(),
                    });
                }
                Some(target) => {
                    warn!(
                        rule = %cond.name,
                        trigger = %target,
                        "condition rule references an unknown trigger; leaving it disconnected"
                    );
                }
                None => {}
            }
        }

        // Triggers attach to their enclosing trigger, or the synthetic root.
        for trigger in &logic.triggers {
            match &trigger.parent {
                None => graph.edges.push(Edge {
                    parent: SYNTHETIC_ROOT.to_string(),
                    child: trigger.name.clone(),
                }),
                Some(parent) if trigger_names.contains(parent.as_str()) => {
                    graph.edges.push(Edge {
                        parent: parent.clone(),
                        child: trigger.name.clone(),
                    })
                }
                Some(parent) => {
                    warn!(
                        trigger = %trigger.name,
                        parent = %parent,
                        "trigger declares an unknown parent; leaving it disconnected"
                    );
                }
            }
        }

        // Combinator heuristic: a trigger whose threshold equals the number
        // of direct children it gathered needs all of them (AND); any other
        // threshold means one suffices (OR).
        for trigger in &logic.triggers {
            let combinator = graph.infer_combinator(trigger);
            graph.combinators.insert(trigger.name.clone(), combinator);
        }

        graph
    }

    fn infer_combinator(&self, trigger: &Trigger) -> Combinator {
        if trigger.threshold as usize == self.observed_child_count(&trigger.name) {
            Combinator::And
        } else {
            Combinator::Or
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn observed_child_count(&self, trigger: &str) -> usize {
        self.edges.iter().filter(|e| e.parent == trigger).count()
    }

    /// The single parent of a node, or `None` for roots and disconnected
    /// nodes.
    pub fn parent_of(&self, child: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.child == child)
            .map(|e| e.parent.as_str())
    }

    pub fn children_of<'g>(&'g self, parent: &'g str) -> impl Iterator<Item = &'g str> {
        self.edges
            .iter()
            .filter(move |e| e.parent == parent)
            .map(|e| e.child.as_str())
    }

    pub fn combinator(&self, trigger: &str) -> Option<Combinator> {
        self.combinators.get(trigger).copied()
    }

    pub fn visual_class(&self, condition_rule: &str) -> VisualClass {
        self.classes
            .get(condition_rule)
            .copied()
            .unwrap_or_default()
    }
}
