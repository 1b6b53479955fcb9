use std::collections::BTreeMap;

use time::OffsetDateTime;

/// Installed generation capacity, keyed by time with one column per
/// generation type (display name, e.g. `Wind Offshore`).
///
/// An empty table is a valid value: the capacity fetch degrades to it when
/// the data provider rejects our credentials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityTable {
    columns: BTreeMap<String, BTreeMap<OffsetDateTime, f64>>,
}

impl CapacityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of `column` at `ts`, replacing any previous value.
    pub fn insert(&mut self, column: impl Into<String>, ts: OffsetDateTime, mw: f64) {
        self.columns.entry(column.into()).or_default().insert(ts, mw);
    }

    pub fn is_empty(&self) -> bool {
        self.columns.values().all(|c| c.is_empty())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&BTreeMap<OffsetDateTime, f64>> {
        self.columns.get(name)
    }

    /// Earliest value of a column.
    pub fn first_value(&self, name: &str) -> Option<f64> {
        self.columns
            .get(name)
            .and_then(|c| c.values().next())
            .copied()
    }
}
