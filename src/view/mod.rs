mod filters;

use itertools::Itertools;
use thiserror::Error;

use crate::record::{Record, SortValue};

pub use filters::{FilterChoice, FilterSelection, ALL_LABEL};

/// Declares which facets of a collection are filterable and which keys
/// are sortable. One descriptor per page; the engine rejects directives
/// that reference anything else.
#[derive(Clone, Debug, Default)]
pub struct ViewDescriptor {
    filterable: Vec<String>,
    sortable: Vec<String>,
}

impl ViewDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filterable(mut self, facet: impl Into<String>) -> Self {
        self.filterable.push(facet.into());
        self
    }

    #[must_use]
    pub fn sortable(mut self, key: impl Into<String>) -> Self {
        self.sortable.push(key.into());
        self
    }

    fn has_facet(&self, facet: &str) -> bool {
        self.filterable.iter().any(|f| f == facet)
    }

    fn has_sort_key(&self, key: &str) -> bool {
        self.sortable.iter().any(|k| k == key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Chosen sort key plus direction. Ascending is natural
/// numeric/chronological order.
#[derive(Clone, Debug)]
pub struct SortDirective {
    pub key: String,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// A directive referenced a facet or sort key the descriptor does not
/// declare. This is a programming error in the calling page, not a data
/// condition: it is returned loudly instead of producing a misleadingly
/// empty view.
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("unknown filter facet '{facet}'")]
    UnknownFacet { facet: String },

    #[error("unknown sort key '{key}'")]
    UnknownSortKey { key: String },
}

/// Curated output for one render pass: the visible ordering and the
/// record the detail panel shows.
#[derive(Debug)]
pub struct Curated<'a, R> {
    pub visible: Vec<&'a R>,
    pub active: Option<&'a R>,
}

/// The collection view engine. Pure: every operation is a function of
/// the snapshot and the caller-owned selection state, and the snapshot
/// is never mutated.
#[derive(Clone, Debug)]
pub struct CollectionView {
    descriptor: ViewDescriptor,
}

impl CollectionView {
    #[must_use]
    pub fn new(descriptor: ViewDescriptor) -> Self {
        Self { descriptor }
    }

    /// Keeps records matching every non-`All` facet choice (logical
    /// AND). An empty result is a valid view, distinct from "not yet
    /// loaded".
    pub fn apply_filters<'a, R: Record>(
        &self,
        snapshot: &'a [R],
        selection: &FilterSelection,
    ) -> Result<Vec<&'a R>, DirectiveError> {
        for (facet, _) in selection.iter() {
            if !self.descriptor.has_facet(facet) {
                return Err(DirectiveError::UnknownFacet {
                    facet: facet.to_string(),
                });
            }
        }

        let out = snapshot
            .iter()
            .filter(|record| {
                selection.iter().all(|(facet, choice)| match choice {
                    FilterChoice::All => true,
                    FilterChoice::Value(value) => {
                        record.facet_values(facet).contains(&value.as_str())
                    }
                })
            })
            .collect();
        Ok(out)
    }

    /// Orders the filtered view by one sort key. The sort is stable:
    /// records with equal keys keep their relative order from the
    /// snapshot. Records missing the key rank lowest.
    pub fn apply_sort<'a, R: Record>(
        &self,
        filtered: Vec<&'a R>,
        directive: &SortDirective,
    ) -> Result<Vec<&'a R>, DirectiveError> {
        if !self.descriptor.has_sort_key(&directive.key) {
            return Err(DirectiveError::UnknownSortKey {
                key: directive.key.clone(),
            });
        }

        let mut out = filtered;
        let key = directive.key.as_str();
        match directive.direction {
            SortDirection::Ascending => {
                out.sort_by(|a, b| rank(*a, key).cmp(&rank(*b, key)));
            }
            SortDirection::Descending => {
                out.sort_by(|a, b| rank(*b, key).cmp(&rank(*a, key)));
            }
        }
        Ok(out)
    }

    /// Distinct values of a facet across the snapshot, ordered
    /// case-insensitively, with the `All` sentinel first.
    pub fn available_filter_values<R: Record>(
        &self,
        snapshot: &[R],
        facet: &str,
    ) -> Result<Vec<String>, DirectiveError> {
        if !self.descriptor.has_facet(facet) {
            return Err(DirectiveError::UnknownFacet {
                facet: facet.to_string(),
            });
        }

        let mut values: Vec<String> = snapshot
            .iter()
            .flat_map(|record| record.facet_values(facet))
            .map(str::to_string)
            .unique()
            .collect();
        values.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });

        let mut out = Vec::with_capacity(values.len() + 1);
        out.push(ALL_LABEL.to_string());
        out.extend(values);
        Ok(out)
    }

    /// Resolves which record the detail panel shows: the requested id
    /// if it is still in the ordered view, otherwise the first visible
    /// record, otherwise nothing. The active selection is not sticky
    /// across a view that no longer contains it.
    pub fn resolve_active<'a, R: Record>(
        &self,
        ordered: &[&'a R],
        requested_id: Option<&str>,
    ) -> Option<&'a R> {
        requested_id
            .and_then(|id| ordered.iter().find(|record| record.id() == id))
            .or_else(|| ordered.first())
            .copied()
    }

    /// Filter, sort, and active resolution in one pass.
    pub fn curate<'a, R: Record>(
        &self,
        snapshot: &'a [R],
        selection: &FilterSelection,
        directive: &SortDirective,
        requested_id: Option<&str>,
    ) -> Result<Curated<'a, R>, DirectiveError> {
        let filtered = self.apply_filters(snapshot, selection)?;
        let visible = self.apply_sort(filtered, directive)?;
        let active = self.resolve_active(&visible, requested_id);
        Ok(Curated { visible, active })
    }
}

fn rank<R: Record>(record: &R, key: &str) -> SortValue {
    record.sort_value(key).unwrap_or_else(SortValue::floor)
}
