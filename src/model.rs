use serde::{Deserialize, Serialize};

use latexref::engine::report::{PassStats, ResolutionReport};
use latexref::engine::{CatalogSpec, MatchMode};

/// Contents of a `--catalog-config` file. Catalogs are wired in list order, so a parent has to
/// be listed before its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfigFile {
    pub catalogs: Vec<CatalogSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentFingerprint {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveSettings {
    pub max_absorb: usize,
    pub reference_prefix: String,
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveRunManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub input: DocumentFingerprint,
    pub output_path: String,
    pub pdf_path: Option<String>,
    pub settings: ResolveSettings,
    pub build: PassStats,
    pub replace: PassStats,
    pub changed_runs: usize,
    #[serde(flatten)]
    pub report: ResolutionReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubstitutionCount {
    pub source: String,
    pub replacement: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubstituteRunManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub input: DocumentFingerprint,
    pub output_path: String,
    pub map_path: String,
    pub total_replacements: usize,
    pub changed_runs: usize,
    pub rules: Vec<SubstitutionCount>,
}
