//! Year-partitioned CSV storage for supplier performance records.
//!
//! Each calendar year lives in its own file (`data_2025.csv`). Reads go
//! through [`Aggregator`], which unions every partition and degrades per
//! file; writes rewrite exactly one partition at a time, atomically, and
//! refuse to overwrite a file that changed since it was loaded.

mod aggregate;
mod codec;
mod config;
mod ledger;
mod merge;
mod partition;
#[cfg(test)]
mod test_support;

pub use aggregate::{Aggregator, DegradedPartition, UnifiedView};
pub use codec::{decode_upload, MANDATORY_UPLOAD_COLUMNS};
pub use config::{StoreConfig, DEFAULT_FILE_EXTENSION, DEFAULT_FILE_PREFIX};
pub use ledger::{AddKind, DashboardRow, SupplierDashboard, SupplierLedger};
pub use merge::{
    dedupe_keep_last, merge_batch, read_upload_file, validate_batch, MergeReport,
    YearMergeSummary,
};
pub use partition::{Partition, PartitionStamp, RowId, StoredRecord, YearPartitionStore};
