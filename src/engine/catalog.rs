use serde::{Deserialize, Serialize};

use super::graph::CatalogId;
use super::label::normalize_identifier;
use super::numbering::NumberStyle;

/// How a reference identifier is matched against declared identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The reference names exactly one declared identifier.
    #[default]
    Exact,
    /// Legacy rule: the first declared identifier contained in the reference wins, so `intro`
    /// captures a reference to `intro_extended` when declared first.
    Contains,
}

/// The parent catalog's newest entry at the time a child entry is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentScope {
    pub entry: usize,
    pub ordinal: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub identifier: String,
    pub ordinal: u32,
    pub parent_ordinal: Option<u32>,
    #[serde(skip)]
    pub parent_entry: Option<usize>,
    pub referenced: bool,
}

#[derive(Debug, Clone)]
pub struct ReferenceCatalog {
    name: String,
    tag: String,
    label: String,
    style: NumberStyle,
    parent: Option<CatalogId>,
    entries: Vec<CatalogEntry>,
}

impl ReferenceCatalog {
    pub fn new(
        name: impl Into<String>,
        tag: impl Into<String>,
        label: impl Into<String>,
        style: NumberStyle,
        parent: Option<CatalogId>,
    ) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            label: label.into(),
            style,
            parent,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn style(&self) -> NumberStyle {
        self.style
    }

    pub fn parent(&self) -> Option<CatalogId> {
        self.parent
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scope a child catalog records when it declares an entry under this catalog.
    pub fn current_scope(&self) -> Option<ParentScope> {
        self.entries.last().map(|entry| ParentScope {
            entry: self.entries.len() - 1,
            ordinal: entry.ordinal,
        })
    }

    /// Appends `identifier` and returns its ordinal. Counting restarts at 1 whenever the parent
    /// scope differs from the one recorded by the previous entry; duplicates are appended too.
    pub fn declare(&mut self, identifier: &str, parent: Option<ParentScope>) -> u32 {
        let parent_entry = parent.map(|scope| scope.entry);
        let ordinal = match self.entries.last() {
            Some(previous) if previous.parent_entry == parent_entry => previous.ordinal + 1,
            _ => 1,
        };

        self.entries.push(CatalogEntry {
            identifier: normalize_identifier(identifier),
            ordinal,
            parent_ordinal: parent.map(|scope| scope.ordinal),
            parent_entry,
            referenced: false,
        });

        ordinal
    }

    /// Index of the first entry matching `identifier`.
    pub fn find(&self, identifier: &str, mode: MatchMode) -> Option<usize> {
        let needle = normalize_identifier(identifier);
        match mode {
            MatchMode::Exact => self
                .entries
                .iter()
                .position(|entry| entry.identifier == needle),
            MatchMode::Contains => self
                .entries
                .iter()
                .position(|entry| needle.contains(entry.identifier.as_str())),
        }
    }

    pub fn mark_referenced(&mut self, identifier: &str, mode: MatchMode) -> bool {
        match self.find(identifier, mode) {
            Some(index) => {
                self.entries[index].referenced = true;
                true
            }
            None => false,
        }
    }

    pub fn unreferenced_entries(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| !entry.referenced)
            .map(|entry| entry.identifier.as_str())
            .collect()
    }
}
