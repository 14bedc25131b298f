//! Diagram exporter.
//!
//! Serializes a rule's relation graph to Graphviz DOT and shells out to the
//! `dot` binary to rasterize it. A missing or failing renderer never aborts
//! the run: the outcome is reported as [`DiagramOutcome::Skipped`] and the
//! document simply omits the image reference. The `.gv` file is kept next to
//! the image so an operator can re-render by hand.

use crate::config::DocConfig;
use crate::model::Rule;
use crate::relations::{RelationGraph, VisualClass, SYNTHETIC_ROOT};
use crate::render::decode_value;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Explicit per-rule result of the best-effort diagram step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramOutcome {
    Rendered(PathBuf),
    Skipped { reason: String },
}

pub struct DiagramExporter<'a> {
    config: &'a DocConfig,
}

impl<'a> DiagramExporter<'a> {
    pub fn new(config: &'a DocConfig) -> Self {
        Self { config }
    }

    /// Writes the DOT file and invokes the external renderer. Only I/O on
    /// our own files is fatal; renderer problems degrade to `Skipped`.
    pub fn export(&self, rule: &Rule, graph: &RelationGraph) -> Result<DiagramOutcome> {
        fs::create_dir_all(&self.config.image_dir).with_context(|| {
            format!(
                "creating image directory {}",
                self.config.image_dir.display()
            )
        })?;

        let stem = rule.id.replace(' ', "_");
        let dot_path = self.config.image_dir.join(format!("{stem}.gv"));
        let image_path = self.config.image_dir.join(format!("{stem}.png"));

        let dot = self.to_dot(rule, graph);
        fs::write(&dot_path, &dot)
            .with_context(|| format!("writing {}", dot_path.display()))?;

        self.run_renderer(&dot_path, &image_path)
    }

    /// DOT serialization: triggers are diamonds labelled with their inferred
    /// combinator, condition rules are boxes colored by visual class, and
    /// the synthetic root is a point.
    pub fn to_dot(&self, rule: &Rule, graph: &RelationGraph) -> String {
        let mut dot = String::new();
        dot.push_str(&format!(
            "digraph \"{}\" {{\n",
            escape(&decode_value(&rule.message))
        ));
        dot.push_str("    rankdir=TB;\n");
        dot.push_str("    node [style=filled, fontname=\"Helvetica\"];\n");

        if graph.edges().iter().any(|e| e.parent == SYNTHETIC_ROOT) {
            dot.push_str(&format!("    \"{SYNTHETIC_ROOT}\" [shape=point];\n"));
        }
        for trigger in &rule.logic.triggers {
            let mut label = escape(&decode_value(&trigger.name));
            if let Some(combinator) = graph.combinator(&trigger.name) {
                label = format!("{label}\\n{combinator}");
            }
            dot.push_str(&format!(
                "    \"{}\" [label=\"{}\", shape=diamond, fillcolor=khaki];\n",
                escape(&trigger.name),
                label
            ));
        }
        for cond in rule
            .logic
            .condition_rules
            .iter()
            .filter(|c| !c.is_root_placeholder())
        {
            let fill = match graph.visual_class(&cond.name) {
                VisualClass::Reference => "lightsteelblue",
                VisualClass::Standard => "palegreen",
            };
            dot.push_str(&format!(
                "    \"{}\" [label=\"{}\", shape=box, fillcolor={}];\n",
                escape(&cond.name),
                escape(&decode_value(&cond.name)),
                fill
            ));
        }

        let trigger_names: HashSet<&str> =
            rule.logic.triggers.iter().map(|t| t.name.as_str()).collect();
        for edge in graph.edges() {
            // Keep the trigger spine straight; condition leaves hang off it.
            let hint = if trigger_names.contains(edge.child.as_str()) {
                " [weight=2]"
            } else {
                ""
            };
            dot.push_str(&format!(
                "    \"{}\" -> \"{}\"{};\n",
                escape(&edge.parent),
                escape(&edge.child),
                hint
            ));
        }
        dot.push_str("}\n");
        dot
    }

    fn run_renderer(&self, dot_path: &Path, image_path: &Path) -> Result<DiagramOutcome> {
        let mut child = match Command::new("dot")
            .arg("-Tpng")
            .arg(dot_path)
            .arg("-o")
            .arg(image_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("graphviz 'dot' binary not found; diagram omitted");
                return Ok(DiagramOutcome::Skipped {
                    reason: "graphviz not installed".to_string(),
                });
            }
            Err(e) => return Err(e).context("spawning graphviz"),
        };

        let deadline = Instant::now() + Duration::from_secs(self.config.dot_timeout_secs);
        loop {
            match child.try_wait().context("waiting for graphviz")? {
                Some(status) if status.success() => {
                    debug!("rendered {}", image_path.display());
                    return Ok(DiagramOutcome::Rendered(image_path.to_path_buf()));
                }
                Some(status) => {
                    warn!(%status, "graphviz failed; diagram omitted");
                    return Ok(DiagramOutcome::Skipped {
                        reason: format!("graphviz exited with {status}"),
                    });
                }
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(
                        "graphviz did not finish within {}s; diagram omitted",
                        self.config.dot_timeout_secs
                    );
                    return Ok(DiagramOutcome::Skipped {
                        reason: "renderer timed out".to_string(),
                    });
                }
                None => std::thread::sleep(Duration::from_millis(25)),
            }
        }
    }
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleExport;
    use crate::relations::RelationGraph;

    fn sample_rule() -> Rule {
        let xml = r#"<export><rules><rule>
            <id>47 1</id><normid>1</normid><message>Sample Rule</message>
            <description>d</description><severity>50</severity>
            <text><![CDATA[<rule name="Root Rule"><ruleset>
              <trigger name="T1" threshold="2"/>
              <rule name="a"><action type="TRIGGER" trigger="T1"/>
                <match matchType="REFERENCE" count="1"/></rule>
              <rule name="b"><action type="TRIGGER" trigger="T1"/>
                <match matchType="EVENT" count="1"/></rule>
            </ruleset></rule>]]></text>
            </rule></rules></export>"#;
        RuleExport::parse(xml).unwrap().rules.remove(0)
    }

    #[test]
    fn dot_contains_nodes_edges_and_combinator() {
        let rule = sample_rule();
        let graph = RelationGraph::build(&rule.logic);
        let config = DocConfig::default();
        let dot = DiagramExporter::new(&config).to_dot(&rule, &graph);

        assert!(dot.contains("digraph \"Sample Rule\""));
        assert!(dot.contains("\"root\" [shape=point]"));
        assert!(dot.contains("label=\"T1\\nAND\""));
        assert!(dot.contains("\"a\" [label=\"a\", shape=box, fillcolor=lightsteelblue]"));
        assert!(dot.contains("\"b\" [label=\"b\", shape=box, fillcolor=palegreen]"));
        assert!(dot.contains("\"T1\" -> \"a\";"));
        assert!(dot.contains("\"root\" -> \"T1\" [weight=2];"));
    }

    #[test]
    fn labels_are_escaped() {
        assert_eq!(escape(r#"say "hi""#), r#"say \"hi\""#);
    }

    #[test]
    fn export_is_best_effort() {
        let rule = sample_rule();
        let graph = RelationGraph::build(&rule.logic);
        let dir = tempfile::tempdir().unwrap();
        let config = DocConfig {
            image_dir: dir.path().join("images"),
            dot_timeout_secs: 10,
            ..DocConfig::default()
        };
        // Succeeds whether or not graphviz is installed on this machine.
        let outcome = DiagramExporter::new(&config).export(&rule, &graph).unwrap();
        // The DOT file is always written, named after the id with spaces
        // replaced by underscores.
        assert!(config.image_dir.join("47_1.gv").exists());
        if let DiagramOutcome::Rendered(path) = outcome {
            assert_eq!(path, config.image_dir.join("47_1.png"));
            assert!(path.exists());
        }
    }
}
