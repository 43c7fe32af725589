use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use latexref::engine::{
    CatalogGraph, CatalogSpec, DefaultStyles, DriverOptions, MatchMode, default_catalog_specs,
};

use crate::cli::CatalogArgs;
use crate::model::CatalogConfigFile;

pub fn catalog_specs(args: &CatalogArgs) -> Result<Vec<CatalogSpec>> {
    match &args.catalog_config {
        Some(path) => {
            if styles_from_args(args) != DefaultStyles::default() {
                warn!(
                    path = %path.display(),
                    "style flags are ignored when a catalog config is given"
                );
            }
            load_catalog_config(path)
        }
        None => Ok(default_catalog_specs(&styles_from_args(args))),
    }
}

pub fn build_graph(args: &CatalogArgs) -> Result<CatalogGraph> {
    let specs = catalog_specs(args)?;
    let graph = CatalogGraph::from_specs(&specs).context("invalid catalog configuration")?;

    for id in graph.ids() {
        let catalog = graph.catalog(id);
        debug!(
            catalog = %catalog.name(),
            label = %catalog.label(),
            tag = %catalog.tag(),
            style = %catalog.style(),
            lineage = %graph.lineage(id).join(" > "),
            "catalog configured"
        );
    }

    Ok(graph)
}

pub fn driver_options(args: &CatalogArgs) -> DriverOptions {
    DriverOptions {
        max_absorb: args.max_absorb,
        reference_prefix: args.reference_prefix.clone(),
        match_mode: if args.legacy_substring_match {
            MatchMode::Contains
        } else {
            MatchMode::Exact
        },
    }
}

fn styles_from_args(args: &CatalogArgs) -> DefaultStyles {
    DefaultStyles {
        section: args.section_style,
        subsection: args.subsection_style,
        subsubsection: args.subsubsection_style,
        figure: args.figure_style,
        table: args.table_style,
        equation: args.equation_style,
        citation: args.citation_style,
    }
}

fn load_catalog_config(path: &Path) -> Result<Vec<CatalogSpec>> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let config: CatalogConfigFile = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    if config.catalogs.is_empty() {
        bail!("{} defines no catalogs", path.display());
    }

    info!(
        path = %path.display(),
        catalogs = config.catalogs.len(),
        "loaded catalog config"
    );
    Ok(config.catalogs)
}
