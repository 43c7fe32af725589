use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::MatchMode;
use super::document::{Paragraph, Run};
use super::error::EngineError;
use super::graph::{CatalogGraph, CatalogId};
use super::label::{extract_identifier, marker_keyword};
use super::reassemble::{
    DECLARATION_SENTINEL, DEFAULT_MAX_ABSORB, Located, MarkerSpan, MarkerSyntax, ScanCursor,
};
use super::report::{
    CatalogSummary, MarkerIssue, OrphanDeclaration, PassStats, ReferenceFailure,
    ResolutionReport,
};

pub const DEFAULT_REFERENCE_PREFIX: &str = "`";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Build,
    Replace,
    Report,
    Finished,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Replace => "replace",
            Self::Report => "report",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    pub max_absorb: usize,
    pub reference_prefix: String,
    pub match_mode: MatchMode,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_absorb: DEFAULT_MAX_ABSORB,
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
            match_mode: MatchMode::Exact,
        }
    }
}

/// Runs the three passes over a document: BUILD numbers every declaration, REPLACE rewrites
/// references with display strings, REPORT lists declarations nobody referenced.
///
/// Per-marker problems are logged and collected; they never stop a pass.
#[derive(Debug)]
pub struct ResolutionDriver {
    graph: CatalogGraph,
    options: DriverOptions,
    declaration: MarkerSyntax,
    reference: MarkerSyntax,
    stage: Stage,
    build_issues: Vec<MarkerIssue>,
    replace_issues: Vec<MarkerIssue>,
    reference_failures: Vec<ReferenceFailure>,
}

impl ResolutionDriver {
    pub fn new(graph: CatalogGraph, options: DriverOptions) -> Result<Self, EngineError> {
        validate_prefix(&options.reference_prefix)?;
        let reference = MarkerSyntax::reference(options.reference_prefix.clone());
        Ok(Self {
            graph,
            options,
            declaration: MarkerSyntax::Declaration,
            reference,
            stage: Stage::Build,
            build_issues: Vec::new(),
            replace_issues: Vec::new(),
            reference_failures: Vec::new(),
        })
    }

    pub fn graph(&self) -> &CatalogGraph {
        &self.graph
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn catalog_summaries(&self) -> Vec<CatalogSummary> {
        self.graph.summaries()
    }

    /// All three passes in order.
    pub fn run(&mut self, paragraphs: &mut [Paragraph]) -> Result<ResolutionReport, EngineError> {
        self.run_build_pass(paragraphs)?;
        self.run_replace_pass(paragraphs)?;
        self.run_report_pass()
    }

    pub fn run_build_pass(&mut self, paragraphs: &mut [Paragraph]) -> Result<PassStats, EngineError> {
        self.expect_stage(Stage::Build, &[Stage::Build])?;

        let labels = self.graph.labels();
        let mut stats = PassStats {
            paragraphs: paragraphs.len(),
            ..PassStats::default()
        };

        for (paragraph_index, paragraph) in paragraphs.iter_mut().enumerate() {
            for id in self.graph.ids() {
                let label = self.graph.catalog(id).label().to_string();
                let mut cursor = ScanCursor::default();

                while let Some(located) =
                    cursor.next_marker(&paragraph.runs, &self.declaration, self.options.max_absorb)
                {
                    let Located::Complete(span) = located else {
                        continue;
                    };
                    if marker_keyword(span.body()) != label {
                        step_over(&mut cursor, &span, &self.declaration);
                        continue;
                    }

                    match extract_identifier(span.body(), &label) {
                        Ok(identifier) => {
                            let declared = self.graph.declare(id, &identifier);
                            debug!(
                                catalog = %self.graph.catalog(id).name(),
                                label = %identifier,
                                ordinal = declared.ordinal,
                                paragraph = paragraph_index,
                                runs = span.runs_spanned(),
                                "declared label"
                            );
                            warn_if_unformattable(&self.graph, id, declared.ordinal);
                            span.erase(&mut paragraph.runs);
                            cursor.resume_at(span.start_run(), span.start_offset());
                            stats.applied += 1;
                        }
                        Err(err) => {
                            warn!(paragraph = paragraph_index, error = %err, "skipping declaration");
                            self.build_issues.push(MarkerIssue {
                                paragraph: paragraph_index,
                                marker: span.text().to_string(),
                                reason: err.to_string(),
                            });
                            cursor.skip_past(&span);
                            stats.failed += 1;
                        }
                    }
                }
            }

            let strays = stray_markers(
                paragraph_index,
                &paragraph.runs,
                &self.declaration,
                &labels,
                self.options.max_absorb,
            );
            self.build_issues.extend(strays);
        }

        for id in self.graph.ids() {
            let catalog = self.graph.catalog(id);
            info!(
                catalog = %catalog.name(),
                entries = catalog.len(),
                "catalog built"
            );
        }

        self.stage = Stage::Replace;
        Ok(stats)
    }

    /// May run again after a previous replace pass; markers already rewritten are gone, so only
    /// the failures of the latest pass are kept.
    pub fn run_replace_pass(
        &mut self,
        paragraphs: &mut [Paragraph],
    ) -> Result<PassStats, EngineError> {
        self.expect_stage(Stage::Replace, &[Stage::Replace, Stage::Report])?;

        self.replace_issues.clear();
        self.reference_failures.clear();

        let tags = self.graph.tags();
        let mode = self.options.match_mode;
        let mut stats = PassStats {
            paragraphs: paragraphs.len(),
            ..PassStats::default()
        };

        for (paragraph_index, paragraph) in paragraphs.iter_mut().enumerate() {
            for id in self.graph.ids() {
                let tag = self.graph.catalog(id).tag().to_string();
                let mut cursor = ScanCursor::default();

                while let Some(located) =
                    cursor.next_marker(&paragraph.runs, &self.reference, self.options.max_absorb)
                {
                    let Located::Complete(span) = located else {
                        continue;
                    };
                    if marker_keyword(span.body()) != tag {
                        step_over(&mut cursor, &span, &self.reference);
                        continue;
                    }

                    let identifier = match extract_identifier(span.body(), &tag) {
                        Ok(identifier) => identifier,
                        Err(err) => {
                            warn!(paragraph = paragraph_index, error = %err, "skipping reference");
                            self.replace_issues.push(MarkerIssue {
                                paragraph: paragraph_index,
                                marker: span.text().to_string(),
                                reason: err.to_string(),
                            });
                            cursor.skip_past(&span);
                            stats.failed += 1;
                            continue;
                        }
                    };

                    match self.graph.resolve(id, &identifier, mode) {
                        Ok(rendered) => {
                            self.graph
                                .catalog_mut(id)
                                .mark_referenced(&identifier, mode);
                            debug!(
                                catalog = %self.graph.catalog(id).name(),
                                label = %identifier,
                                display = %rendered,
                                paragraph = paragraph_index,
                                "resolved reference"
                            );
                            let resume = span.splice(&mut paragraph.runs, &rendered);
                            cursor.resume_at(span.start_run(), resume);
                            stats.applied += 1;
                        }
                        Err(err) => {
                            warn!(
                                paragraph = paragraph_index,
                                marker = %span.text(),
                                error = %err,
                                "leaving reference unresolved"
                            );
                            self.reference_failures.push(ReferenceFailure {
                                paragraph: paragraph_index,
                                catalog: self.graph.catalog(id).name().to_string(),
                                identifier,
                                reason: err.to_string(),
                            });
                            cursor.skip_past(&span);
                            stats.failed += 1;
                        }
                    }
                }
            }

            let strays = stray_markers(
                paragraph_index,
                &paragraph.runs,
                &self.reference,
                &tags,
                self.options.max_absorb,
            );
            self.replace_issues.extend(strays);
        }

        info!(
            resolved = stats.applied,
            failed = stats.failed,
            "references replaced"
        );

        self.stage = Stage::Report;
        Ok(stats)
    }

    pub fn run_report_pass(&mut self) -> Result<ResolutionReport, EngineError> {
        self.expect_stage(Stage::Report, &[Stage::Report])?;

        let mut orphans = Vec::new();
        for id in self.graph.ids() {
            let catalog = self.graph.catalog(id);
            for identifier in catalog.unreferenced_entries() {
                warn!(
                    catalog = %catalog.name(),
                    label = %identifier,
                    "label is not referenced anywhere in the text"
                );
                orphans.push(OrphanDeclaration {
                    catalog: catalog.name().to_string(),
                    identifier: identifier.to_string(),
                });
            }
        }

        let marker_issues = self
            .build_issues
            .iter()
            .chain(&self.replace_issues)
            .cloned()
            .collect();

        self.stage = Stage::Finished;
        Ok(ResolutionReport {
            catalogs: self.graph.summaries(),
            reference_failures: self.reference_failures.clone(),
            marker_issues,
            orphans,
        })
    }

    fn expect_stage(&self, requested: Stage, allowed: &[Stage]) -> Result<(), EngineError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(EngineError::StageOrder {
                requested,
                current: self.stage,
            })
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<(), EngineError> {
    let invalid = |reason| {
        Err(EngineError::InvalidPrefix {
            prefix: prefix.to_string(),
            reason,
        })
    };

    if prefix.is_empty() {
        return invalid("prefix is empty");
    }
    if !prefix.is_ascii() {
        return invalid("prefix must be ASCII");
    }
    if prefix.contains(['{', '}']) {
        return invalid("prefix may not contain braces");
    }
    if prefix.contains(DECLARATION_SENTINEL) {
        return invalid("prefix may not contain the declaration sentinel");
    }
    if prefix.chars().any(|character| character.is_ascii_whitespace()) {
        return invalid("prefix may not contain whitespace");
    }
    Ok(())
}

/// Only the opener of a span whose keyword did not match is skipped. The opener may be ordinary
/// text (a code backtick, `x^{2}`) with a real marker further inside the span.
fn step_over(cursor: &mut ScanCursor, span: &MarkerSpan, syntax: &MarkerSyntax) {
    cursor.resume_at(span.start_run(), span.start_offset() + syntax.opener().len());
}

fn warn_if_unformattable(graph: &CatalogGraph, id: CatalogId, ordinal: u32) {
    let catalog = graph.catalog(id);
    if let Some(max) = catalog.style().max_ordinal() {
        if ordinal > max {
            warn!(
                catalog = %catalog.name(),
                ordinal,
                style = %catalog.style(),
                "ordinal exceeds what the numbering style can display"
            );
        }
    }
}

/// Markers left in a paragraph after every catalog had its turn: complete ones whose keyword
/// names no catalog, and unterminated ones. Sentinel characters also occur in ordinary prose,
/// so only candidates containing a brace are reported.
fn stray_markers(
    paragraph_index: usize,
    runs: &[Run],
    syntax: &MarkerSyntax,
    keywords: &[String],
    max_absorb: usize,
) -> Vec<MarkerIssue> {
    let mut issues = Vec::new();
    let mut cursor = ScanCursor::default();

    while let Some(located) = cursor.next_marker(runs, syntax, max_absorb) {
        let (marker, reason) = match located {
            Located::Complete(span) => {
                step_over(&mut cursor, &span, syntax);
                let keyword = marker_keyword(span.body());
                if keywords.iter().any(|known| known == keyword) {
                    continue;
                }
                (span.into_text(), "keyword names no catalog")
            }
            Located::Incomplete(marker) => (marker.partial, "marker is never closed"),
            Located::NotFound => break,
        };

        if marker.contains('{') {
            warn!(paragraph = paragraph_index, marker = %marker, reason, "stray marker");
            issues.push(MarkerIssue {
                paragraph: paragraph_index,
                marker,
                reason: reason.to_string(),
            });
        } else {
            debug!(paragraph = paragraph_index, text = %marker, "ignoring sentinel in text");
        }
    }

    issues
}
