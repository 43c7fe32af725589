use serde::Serialize;

use super::numbering::NumberStyle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub paragraphs: usize,
    pub applied: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub identifier: String,
    pub ordinal: u32,
    pub display: Option<String>,
    pub referenced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub name: String,
    pub label: String,
    pub tag: String,
    pub style: NumberStyle,
    pub parent: Option<String>,
    pub entries: Vec<EntrySummary>,
}

/// A marker that could not be interpreted. The text around it is left as found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerIssue {
    pub paragraph: usize,
    pub marker: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceFailure {
    pub paragraph: usize,
    pub catalog: String,
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanDeclaration {
    pub catalog: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub catalogs: Vec<CatalogSummary>,
    pub reference_failures: Vec<ReferenceFailure>,
    pub marker_issues: Vec<MarkerIssue>,
    pub orphans: Vec<OrphanDeclaration>,
}
