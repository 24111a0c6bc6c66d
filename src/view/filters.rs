use std::collections::BTreeMap;
use std::fmt;

/// Sentinel label for the unfiltered choice, first in every dropdown.
pub const ALL_LABEL: &str = "All";

/// Current choice for one filterable facet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FilterChoice {
    #[default]
    All,
    Value(String),
}

impl FilterChoice {
    /// Maps the sentinel label back to `All`; anything else is a
    /// concrete facet value.
    pub fn parse(label: &str) -> Self {
        if label == ALL_LABEL {
            Self::All
        } else {
            Self::Value(label.to_string())
        }
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for FilterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_LABEL),
            Self::Value(value) => f.write_str(value),
        }
    }
}

/// Facet-to-choice mapping for a page. Facets left unset behave as
/// `All`. Iteration order is deterministic so filter application does
/// not depend on insertion order.
#[derive(Clone, Debug, Default)]
pub struct FilterSelection {
    choices: BTreeMap<String, FilterChoice>,
}

impl FilterSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, facet: impl Into<String>, choice: FilterChoice) -> Self {
        self.set(facet, choice);
        self
    }

    pub fn set(&mut self, facet: impl Into<String>, choice: FilterChoice) {
        self.choices.insert(facet.into(), choice);
    }

    pub fn choice(&self, facet: &str) -> &FilterChoice {
        self.choices.get(facet).unwrap_or(&FilterChoice::All)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &FilterChoice)> {
        self.choices
            .iter()
            .map(|(facet, choice)| (facet.as_str(), choice))
    }
}
