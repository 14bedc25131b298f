//! # ruledoc - Correlation Rule Documentation Generator
//!
//! ruledoc reads a vendor XML export of security correlation rules and
//! produces a markdown document describing each rule's semantics: the events
//! it matches, the AND/OR combinators joining its sub-conditions, and the
//! timing/threshold constraints that trigger it. Each rule can additionally
//! be rendered as a Graphviz diagram embedded in the document.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ruledoc::{config::DocConfig, DocGenerator};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let generator = DocGenerator::new(DocConfig::default());
//! let summary = generator.run(
//!     Path::new("RuleExport.xml"),
//!     Path::new("documentation.md"),
//! )?;
//! println!("{} rules documented", summary.rules_rendered);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! - **Model**: two-stage XML parse (outer export, embedded logic document)
//! - **Relations**: reconstruct the trigger/condition tree and infer each
//!   trigger's combinator
//! - **Render**: emit the linear markdown document
//! - **Diagram**: best-effort Graphviz export per rule
//!
//! Fatal validation (duplicate rule names, malformed embedded logic) happens
//! before any output is written; unresolved references and a missing
//! Graphviz binary degrade locally instead of failing the run.

pub mod config;
pub mod diagram;
pub mod model;
pub mod relations;
pub mod render;

use crate::config::DocConfig;
use crate::diagram::{DiagramExporter, DiagramOutcome};
use crate::model::RuleExport;
use crate::relations::RelationGraph;
use crate::render::{Renderer, RuleArtifacts};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// What one run produced, for logging and tests.
#[derive(Debug)]
pub struct DocSummary {
    pub rules_rendered: usize,
    pub diagrams: Vec<DiagramOutcome>,
}

impl DocSummary {
    pub fn diagrams_rendered(&self) -> usize {
        self.diagrams
            .iter()
            .filter(|d| matches!(d, DiagramOutcome::Rendered(_)))
            .count()
    }
}

/// The batch pipeline: one rule export in, one document (plus zero or more
/// diagram images) out.
pub struct DocGenerator {
    config: DocConfig,
}

impl DocGenerator {
    pub fn new(config: DocConfig) -> Self {
        Self { config }
    }

    /// Runs the whole pipeline. The output document is written once, at the
    /// end, so a fatal condition never leaves a partial file behind.
    pub fn run(&self, input: &Path, output: &Path) -> Result<DocSummary> {
        let raw = fs::read_to_string(input)
            .with_context(|| format!("reading rule export {}", input.display()))?;
        let mut export = RuleExport::parse(&raw)?;
        export.validate_unique_names()?;
        if self.config.sort_rules {
            export.sort_by_message();
        }
        info!(rules = export.rules.len(), "parsed rule export");

        let exporter = DiagramExporter::new(&self.config);
        let mut artifacts = Vec::with_capacity(export.rules.len());
        let mut diagrams = Vec::with_capacity(export.rules.len());
        for rule in &export.rules {
            let graph = RelationGraph::build(&rule.logic);
            let outcome = exporter.export(rule, &graph)?;
            let image = match &outcome {
                DiagramOutcome::Rendered(path) => Some(path.clone()),
                DiagramOutcome::Skipped { .. } => None,
            };
            diagrams.push(outcome);
            artifacts.push(RuleArtifacts { graph, image });
        }

        let markdown = Renderer::new(&self.config).render(&export, &artifacts);
        fs::write(output, markdown)
            .with_context(|| format!("writing document {}", output.display()))?;

        let summary = DocSummary {
            rules_rendered: export.rules.len(),
            diagrams,
        };
        info!(
            rules = summary.rules_rendered,
            diagrams = summary.diagrams_rendered(),
            "documentation written to {}",
            output.display()
        );
        Ok(summary)
    }
}
