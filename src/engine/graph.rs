use serde::{Deserialize, Serialize};

use super::catalog::{MatchMode, ReferenceCatalog};
use super::error::EngineError;
use super::numbering::{NumberStyle, format_ordinal};
use super::report::{CatalogSummary, EntrySummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogId(usize);

/// Configuration of one catalog. `parent` names a catalog defined earlier in the same set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSpec {
    pub name: String,
    pub label: String,
    pub tag: String,
    #[serde(default)]
    pub style: NumberStyle,
    #[serde(default)]
    pub parent: Option<String>,
}

impl CatalogSpec {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        tag: impl Into<String>,
        style: NumberStyle,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            tag: tag.into(),
            style,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredEntry {
    pub index: usize,
    pub ordinal: u32,
}

/// Catalogs in wiring order. A parent always precedes its children, which is also the order
/// passes visit them in, so a child declaring in a paragraph sees the parent's newest entry.
#[derive(Debug, Clone, Default)]
pub struct CatalogGraph {
    catalogs: Vec<ReferenceCatalog>,
}

impl CatalogGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &[CatalogSpec]) -> Result<Self, EngineError> {
        let mut graph = Self::new();
        for spec in specs {
            graph.add_catalog(spec)?;
        }
        Ok(graph)
    }

    pub fn add_catalog(&mut self, spec: &CatalogSpec) -> Result<CatalogId, EngineError> {
        let invalid = |reason: String| EngineError::InvalidCatalog {
            name: spec.name.clone(),
            reason,
        };

        if spec.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        validate_keyword("label", &spec.label).map_err(&invalid)?;
        validate_keyword("tag", &spec.tag).map_err(&invalid)?;

        for existing in &self.catalogs {
            if existing.name() == spec.name {
                return Err(invalid("name is already used".to_string()));
            }
            if existing.label().eq_ignore_ascii_case(&spec.label) {
                return Err(invalid(format!(
                    "label `{}` is already used by `{}`",
                    spec.label,
                    existing.name()
                )));
            }
            if existing.tag().eq_ignore_ascii_case(&spec.tag) {
                return Err(invalid(format!(
                    "tag `{}` is already used by `{}`",
                    spec.tag,
                    existing.name()
                )));
            }
        }

        let parent = match &spec.parent {
            Some(parent_name) => Some(self.find_by_name(parent_name).ok_or_else(|| {
                invalid(format!(
                    "parent `{parent_name}` must be defined before its children"
                ))
            })?),
            None => None,
        };

        self.catalogs.push(ReferenceCatalog::new(
            spec.name.clone(),
            spec.tag.to_ascii_lowercase(),
            spec.label.to_ascii_lowercase(),
            spec.style,
            parent,
        ));
        Ok(CatalogId(self.catalogs.len() - 1))
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CatalogId> + use<> {
        (0..self.catalogs.len()).map(CatalogId)
    }

    pub fn catalog(&self, id: CatalogId) -> &ReferenceCatalog {
        &self.catalogs[id.0]
    }

    pub fn catalog_mut(&mut self, id: CatalogId) -> &mut ReferenceCatalog {
        &mut self.catalogs[id.0]
    }

    pub fn find_by_name(&self, name: &str) -> Option<CatalogId> {
        self.catalogs
            .iter()
            .position(|catalog| catalog.name() == name)
            .map(CatalogId)
    }

    pub fn labels(&self) -> Vec<String> {
        self.catalogs
            .iter()
            .map(|catalog| catalog.label().to_string())
            .collect()
    }

    pub fn tags(&self) -> Vec<String> {
        self.catalogs
            .iter()
            .map(|catalog| catalog.tag().to_string())
            .collect()
    }

    /// Catalog names from the root down to `id`.
    pub fn lineage(&self, id: CatalogId) -> Vec<&str> {
        let mut names = vec![self.catalog(id).name()];
        let mut current = self.catalog(id).parent();
        while let Some(parent) = current {
            names.push(self.catalog(parent).name());
            current = self.catalog(parent).parent();
        }
        names.reverse();
        names
    }

    pub fn declare(&mut self, id: CatalogId, identifier: &str) -> DeclaredEntry {
        let scope = self
            .catalog(id)
            .parent()
            .and_then(|parent| self.catalog(parent).current_scope());
        let catalog = self.catalog_mut(id);
        let ordinal = catalog.declare(identifier, scope);
        DeclaredEntry {
            index: catalog.len() - 1,
            ordinal,
        }
    }

    /// Display string of the first entry matching `identifier`, e.g. `2.1` for the first
    /// subsection of the second section.
    pub fn resolve(
        &self,
        id: CatalogId,
        identifier: &str,
        mode: MatchMode,
    ) -> Result<String, EngineError> {
        let catalog = self.catalog(id);
        let index =
            catalog
                .find(identifier, mode)
                .ok_or_else(|| EngineError::UnresolvedReference {
                    catalog: catalog.name().to_string(),
                    identifier: identifier.to_string(),
                })?;
        self.display(id, index)
    }

    /// Walks the parent chain through the entry each ancestor had when `index` was declared.
    /// An entry declared before its parent catalog had any entry renders without a prefix.
    pub fn display(&self, id: CatalogId, index: usize) -> Result<String, EngineError> {
        let catalog = self.catalog(id);
        let entry = &catalog.entries()[index];
        let own = format_ordinal(entry.ordinal, catalog.style())?;

        match (catalog.parent(), entry.parent_entry) {
            (Some(parent), Some(parent_index)) => {
                Ok(format!("{}.{own}", self.display(parent, parent_index)?))
            }
            _ => Ok(own),
        }
    }

    pub fn summaries(&self) -> Vec<CatalogSummary> {
        self.ids()
            .map(|id| {
                let catalog = self.catalog(id);
                CatalogSummary {
                    name: catalog.name().to_string(),
                    label: catalog.label().to_string(),
                    tag: catalog.tag().to_string(),
                    style: catalog.style(),
                    parent: catalog
                        .parent()
                        .map(|parent| self.catalog(parent).name().to_string()),
                    entries: catalog
                        .entries()
                        .iter()
                        .enumerate()
                        .map(|(index, entry)| EntrySummary {
                            identifier: entry.identifier.clone(),
                            ordinal: entry.ordinal,
                            display: self.display(id, index).ok(),
                            referenced: entry.referenced,
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

fn validate_keyword(kind: &str, keyword: &str) -> Result<(), String> {
    if keyword.is_empty() {
        return Err(format!("{kind} is empty"));
    }
    if !keyword
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-' | ':'))
    {
        return Err(format!(
            "{kind} `{keyword}` may only contain ASCII letters, digits, `_`, `-` or `:`"
        ));
    }
    Ok(())
}

/// Section, subsection and subsubsection chained for dotted numbering, then the flat
/// figure, table, equation and citation catalogs. Tags equal labels.
pub fn default_catalog_specs(styles: &DefaultStyles) -> Vec<CatalogSpec> {
    vec![
        CatalogSpec::new("Section", "sec1", "sec1", styles.section),
        CatalogSpec::new("Subsection", "sec2", "sec2", styles.subsection).with_parent("Section"),
        CatalogSpec::new("Subsubsection", "sec3", "sec3", styles.subsubsection)
            .with_parent("Subsection"),
        CatalogSpec::new("Figure", "fig", "fig", styles.figure),
        CatalogSpec::new("Table", "tbl", "tbl", styles.table),
        CatalogSpec::new("Equation", "eq", "eq", styles.equation),
        CatalogSpec::new("Citation", "cite", "cite", styles.citation),
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultStyles {
    pub section: NumberStyle,
    pub subsection: NumberStyle,
    pub subsubsection: NumberStyle,
    pub figure: NumberStyle,
    pub table: NumberStyle,
    pub equation: NumberStyle,
    pub citation: NumberStyle,
}
