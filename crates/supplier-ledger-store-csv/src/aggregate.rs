use std::collections::BTreeSet;
use std::fs;
use std::io;

use serde::{Deserialize, Serialize};
use supplier_ledger_core::SupplierRecord;
use tracing::{debug, warn};

use crate::partition::{RowId, StoredRecord, YearPartitionStore};

/// A partition that could not be loaded during aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DegradedPartition {
    pub year: i32,
    pub file_name: String,
    pub reason: String,
}

/// Read-only union of every partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnifiedView {
    pub rows: Vec<StoredRecord>,
    pub degraded: Vec<DegradedPartition>,
}

impl UnifiedView {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn find(&self, row_id: RowId) -> Option<&StoredRecord> {
        self.rows.iter().find(|row| row.row_id == row_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &SupplierRecord> {
        self.rows.iter().map(|row| &row.record)
    }
}

pub struct Aggregator<'a> {
    store: &'a YearPartitionStore,
}

impl<'a> Aggregator<'a> {
    #[must_use]
    pub fn new(store: &'a YearPartitionStore) -> Self {
        Self { store }
    }

    /// Years with a partition file in the data directory, ascending. A
    /// missing or unreadable directory yields no years.
    #[must_use]
    pub fn discover_years(&self) -> Vec<i32> {
        let data_dir = &self.store.config().data_dir;
        let entries = match fs::read_dir(data_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %data_dir.display(), "data directory absent");
                return Vec::new();
            }
            Err(err) => {
                warn!(path = %data_dir.display(), error = %err, "data directory unreadable");
                return Vec::new();
            }
        };

        let mut years = BTreeSet::new();
        for entry in entries.filter_map(Result::ok) {
            if !entry.file_type().is_ok_and(|file_type| file_type.is_file()) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match self.store.year_of_file_name(name) {
                Some(year) => {
                    years.insert(year);
                }
                None if name.starts_with(self.store.config().file_prefix.as_str()) => {
                    debug!(file = name, "ignoring file that is not a year partition");
                }
                None => {}
            }
        }

        years.into_iter().collect()
    }

    /// Loads every partition. One unreadable year is logged and reported in
    /// [`UnifiedView::degraded`]; the rest still load.
    #[must_use]
    pub fn load_all(&self) -> UnifiedView {
        let mut view = UnifiedView::default();
        for year in self.discover_years() {
            match self.store.load(year) {
                Ok(partition) => view.rows.extend(partition.rows),
                Err(err) => {
                    let file_name = self.store.partition_file_name(year);
                    warn!(year, file = %file_name, error = %err, "partition unreadable; treating as empty");
                    view.degraded.push(DegradedPartition {
                        year,
                        file_name,
                        reason: err.to_string(),
                    });
                }
            }
        }
        view
    }
}
