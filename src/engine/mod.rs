//! Label numbering and cross-reference resolution over paragraphs of text runs.

pub mod catalog;
pub mod document;
pub mod driver;
pub mod error;
pub mod graph;
pub mod label;
pub mod numbering;
pub mod reassemble;
pub mod report;

pub use catalog::{CatalogEntry, MatchMode, ReferenceCatalog};
pub use document::{Paragraph, Run};
pub use driver::{DEFAULT_REFERENCE_PREFIX, DriverOptions, ResolutionDriver, Stage};
pub use error::EngineError;
pub use graph::{
    CatalogGraph, CatalogId, CatalogSpec, DefaultStyles, default_catalog_specs,
};
pub use numbering::{NumberStyle, format_ordinal};
pub use reassemble::{DEFAULT_MAX_ABSORB, MarkerSyntax, reassemble};
pub use report::{CatalogSummary, PassStats, ResolutionReport};

#[cfg(test)]
mod tests;
