use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use supplier_ledger_core::{
    compute_achievement, ClosingMonth, SupplierRecord, DEFAULT_ITEM_DELAY, DEFAULT_TARGET_DELIVERY,
};
use ulid::Ulid;

use crate::{StoreConfig, SupplierLedger, YearPartitionStore};

pub(crate) fn must<T, E: Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("test failure: {err}"),
    }
}

/// Unique data directory under the system temp dir, removed on drop. The
/// directory itself is not created.
pub(crate) struct TempDataDir {
    path: PathBuf,
}

impl TempDataDir {
    pub(crate) fn new(label: &str) -> Self {
        Self {
            path: std::env::temp_dir().join(format!("supplier-ledger-{label}-{}", Ulid::new())),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn store(&self) -> YearPartitionStore {
        must(YearPartitionStore::new(StoreConfig::new(&self.path)))
    }

    pub(crate) fn ledger(&self) -> SupplierLedger {
        must(SupplierLedger::open(StoreConfig::new(&self.path)))
    }
}

impl Drop for TempDataDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

pub(crate) fn fixture_record(
    supplier: &str,
    month: &str,
    total: u32,
    on_time: u32,
    purchase_amount: f64,
) -> SupplierRecord {
    SupplierRecord {
        closing_month: must(ClosingMonth::parse(month)),
        supplier_name: supplier.to_string(),
        total_delivery_item: total,
        on_time,
        minus: total.saturating_sub(on_time),
        target_delivery: DEFAULT_TARGET_DELIVERY,
        achievement: compute_achievement(total, on_time),
        purchase_amount,
        item_delay: DEFAULT_ITEM_DELAY.to_string(),
    }
}
