//! Human-readable and JSON summaries of a finished registry.

use core::fmt;

use serde::Serialize;

use crate::{Registry, Switch};

const BANNER_RULE: &str = "####################";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewSwitch {
    pub name: String,
    /// 1-based, as shown in the spreadsheet UI.
    pub catalog_row: u32,
    /// Board cell that justified the promotion, e.g. `'Boards'!B7`.
    pub origin: Option<String>,
}

/// Snapshot of the registry after both linking passes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Sorted.
    pub owned: Vec<String>,
    /// Sorted.
    pub missing: Vec<String>,
    /// In discovery order.
    pub new: Vec<NewSwitch>,
    pub owned_count: usize,
    pub missing_count: usize,
}

impl Report {
    pub fn from_registry(registry: &Registry) -> Self {
        let owned: Vec<String> = registry.owned().map(|s| s.name().to_string()).collect();
        let missing: Vec<String> = registry.missing().map(|s| s.name().to_string()).collect();
        let new = registry
            .newly_discovered()
            .iter()
            .map(|switch: &Switch| NewSwitch {
                name: switch.name().to_string(),
                catalog_row: switch.catalog_row() + 1,
                origin: registry.origin(switch.name()).map(ToString::to_string),
            })
            .collect();

        Self {
            owned_count: owned.len(),
            missing_count: missing.len(),
            owned,
            missing,
            new,
        }
    }
}

fn banner(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{BANNER_RULE}")?;
    writeln!(f, "# {title:<17}#")?;
    writeln!(f, "{BANNER_RULE}")
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        banner(f, "OWNED SWITCHES")?;
        for name in &self.owned {
            writeln!(f, "{name}")?;
        }

        if !self.missing.is_empty() {
            banner(f, "MISSING SWITCHES")?;
            for name in &self.missing {
                writeln!(f, "{name}")?;
            }
        }

        if !self.new.is_empty() {
            banner(f, "NEW SWITCHES")?;
            for switch in &self.new {
                writeln!(f, "{}", switch.name)?;
            }
        }

        banner(f, "STATS")?;
        writeln!(f, "Owned Switches: {}", self.owned_count)?;
        writeln!(f, "Missing Switches: {}", self.missing_count)
    }
}
