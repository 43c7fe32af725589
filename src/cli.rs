use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use latexref::engine::{DEFAULT_MAX_ABSORB, DEFAULT_REFERENCE_PREFIX, NumberStyle};

#[derive(Parser, Debug)]
#[command(
    name = "latexref",
    version,
    about = "LaTeX-style label numbering and cross-references for Word documents"
)]
pub struct Cli {
    /// Log every declaration and resolved reference.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Number declarations, rewrite references and save a new document.
    Resolve(ResolveArgs),
    /// List the labels a document declares without writing anything.
    Scan(ScanArgs),
    /// Replace text from a CSV file of `source,replacement` rows.
    Substitute(SubstituteArgs),
}

/// Catalog and marker settings shared by `resolve` and `scan`.
#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    #[arg(long, default_value_t = NumberStyle::Arabic)]
    pub section_style: NumberStyle,

    #[arg(long, default_value_t = NumberStyle::Arabic)]
    pub subsection_style: NumberStyle,

    #[arg(long, default_value_t = NumberStyle::Arabic)]
    pub subsubsection_style: NumberStyle,

    #[arg(long, default_value_t = NumberStyle::Arabic)]
    pub figure_style: NumberStyle,

    #[arg(long, default_value_t = NumberStyle::Arabic)]
    pub table_style: NumberStyle,

    #[arg(long, default_value_t = NumberStyle::Arabic)]
    pub equation_style: NumberStyle,

    #[arg(long, default_value_t = NumberStyle::Arabic)]
    pub citation_style: NumberStyle,

    /// JSON file with a `catalogs` list; replaces the built-in catalogs and the style flags.
    #[arg(long)]
    pub catalog_config: Option<PathBuf>,

    /// Runs a split marker may absorb before it is abandoned.
    #[arg(long, default_value_t = DEFAULT_MAX_ABSORB)]
    pub max_absorb: usize,

    #[arg(long, default_value = DEFAULT_REFERENCE_PREFIX)]
    pub reference_prefix: String,

    /// Bind a reference to the first declared label it contains.
    #[arg(long, default_value_t = false)]
    pub legacy_substring_match: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    pub input: PathBuf,

    /// Defaults to `<input stem>.resolved.docx` next to the input.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub catalogs: CatalogArgs,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    /// Also export the resolved document as PDF into this directory.
    #[arg(long)]
    pub pdf_dir: Option<PathBuf>,

    #[arg(long, default_value = "soffice")]
    pub pdf_converter: String,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    pub input: PathBuf,

    #[command(flatten)]
    pub catalogs: CatalogArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SubstituteArgs {
    pub input: PathBuf,

    #[arg(long)]
    pub map: PathBuf,

    /// Defaults to `<input stem>.substituted.docx` next to the input.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}
