use std::collections::BTreeMap;

use mechswitch_model::{CellAddress, CellRef, Worksheet};
use serde::Serialize;

use crate::{CatalogLayout, ReconcileError, Switch};

/// Ownership state of a catalog entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Owned,
    Missing,
}

/// What to do when two catalog rows carry the same switch name.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// The later row replaces the earlier one; the pair is recorded and logged.
    #[default]
    LastWins,
    /// Fail collection with [`ReconcileError::DuplicateSwitch`].
    Reject,
}

/// A catalog name seen on more than one row under [`DuplicatePolicy::LastWins`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateSwitch {
    pub name: String,
    pub superseded_row: u32,
    pub kept_row: u32,
}

#[derive(Clone, Debug)]
struct Entry {
    switch: Switch,
    classification: Classification,
    /// Board cell that justified a `Missing -> Owned` promotion.
    origin: Option<CellAddress>,
}

/// Classification of every catalog switch, keyed by name.
///
/// Each name maps to exactly one entry tagged `Owned` or `Missing`, so the two
/// classes can never overlap. The only transition is [`Registry::promote`].
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
    newly_discovered: Vec<Switch>,
    duplicates: Vec<DuplicateSwitch>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a catalog switch. Returns the switch previously registered under
    /// the same name, which this one replaces.
    pub fn insert(&mut self, switch: Switch, classification: Classification) -> Option<Switch> {
        let name = switch.name().to_string();
        let entry = Entry {
            switch,
            classification,
            origin: None,
        };
        self.entries.insert(name, entry).map(|prev| prev.switch)
    }

    pub fn get(&self, name: &str) -> Option<&Switch> {
        self.entries.get(name).map(|entry| &entry.switch)
    }

    pub fn classification(&self, name: &str) -> Option<Classification> {
        self.entries.get(name).map(|entry| entry.classification)
    }

    pub fn is_owned(&self, name: &str) -> bool {
        self.classification(name) == Some(Classification::Owned)
    }

    pub fn is_missing(&self, name: &str) -> bool {
        self.classification(name) == Some(Classification::Missing)
    }

    /// Owned switches, sorted by name.
    pub fn owned(&self) -> impl Iterator<Item = &Switch> {
        self.with_classification(Classification::Owned)
    }

    /// Missing switches, sorted by name.
    pub fn missing(&self) -> impl Iterator<Item = &Switch> {
        self.with_classification(Classification::Missing)
    }

    pub fn owned_count(&self) -> usize {
        self.owned().count()
    }

    pub fn missing_count(&self) -> usize {
        self.missing().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Switches promoted during this run, in promotion order.
    pub fn newly_discovered(&self) -> &[Switch] {
        &self.newly_discovered
    }

    pub fn origin(&self, name: &str) -> Option<&CellAddress> {
        self.entries.get(name).and_then(|entry| entry.origin.as_ref())
    }

    pub fn duplicates(&self) -> &[DuplicateSwitch] {
        &self.duplicates
    }

    /// Move a missing switch to owned and append it to the newly discovered list.
    ///
    /// Returns the promoted switch, or `None` when `name` is unknown or already
    /// owned; in that case nothing changes.
    pub fn promote(&mut self, name: &str, origin: CellAddress) -> Option<&Switch> {
        let entry = self.entries.get_mut(name)?;
        if entry.classification != Classification::Missing {
            return None;
        }
        entry.classification = Classification::Owned;
        entry.origin = Some(origin);
        self.newly_discovered.push(entry.switch.clone());
        self.newly_discovered.last()
    }

    fn with_classification(&self, wanted: Classification) -> impl Iterator<Item = &Switch> {
        self.entries
            .values()
            .filter(move |entry| entry.classification == wanted)
            .map(|entry| &entry.switch)
    }
}

/// Classify the catalog with the default layout, keeping the last row for
/// duplicate names.
pub fn collect(catalog: &Worksheet) -> Result<Registry, ReconcileError> {
    collect_with(catalog, &CatalogLayout::default(), DuplicatePolicy::default())
}

/// Classify every catalog row between the header and the end-of-table sentinel.
pub fn collect_with(
    catalog: &Worksheet,
    layout: &CatalogLayout,
    duplicates: DuplicatePolicy,
) -> Result<Registry, ReconcileError> {
    let mut registry = Registry::new();
    let last_row = catalog.last_row().unwrap_or(0);

    for row in layout.header_rows..=last_row {
        if catalog
            .display_string(CellRef::new(row, layout.sentinel_col))
            .is_empty()
        {
            break;
        }

        let name = catalog.display_string(CellRef::new(row, layout.name_col));
        if name.is_empty() {
            return Err(ReconcileError::MalformedRow {
                sheet: catalog.name().to_string(),
                row,
            });
        }

        let classification = if catalog
            .display_string(CellRef::new(row, layout.owned_col))
            .is_empty()
        {
            Classification::Missing
        } else {
            Classification::Owned
        };

        if let Some(prev) = registry.get(&name) {
            let first_row = prev.catalog_row();
            match duplicates {
                DuplicatePolicy::Reject => {
                    return Err(ReconcileError::DuplicateSwitch {
                        name,
                        first_row,
                        second_row: row,
                    });
                }
                DuplicatePolicy::LastWins => {
                    log::warn!(
                        "switch '{name}' defined on catalog rows {} and {}; keeping row {}",
                        first_row + 1,
                        row + 1,
                        row + 1
                    );
                    registry.duplicates.push(DuplicateSwitch {
                        name: name.clone(),
                        superseded_row: first_row,
                        kept_row: row,
                    });
                }
            }
        }

        registry.insert(Switch::new(name, row), classification);
    }

    log::info!(
        "collected {} switches from '{}' ({} owned, {} missing)",
        registry.len(),
        catalog.name(),
        registry.owned_count(),
        registry.missing_count()
    );
    Ok(registry)
}
