use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use supplier_ledger_core::{LedgerError, RecordKey, SupplierRecord};
use tracing::info;

use crate::codec::decode_upload;
use crate::partition::{Partition, YearPartitionStore};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearMergeSummary {
    pub year: i32,
    pub file_name: String,
    pub existing: usize,
    pub incoming: usize,
    pub persisted: usize,
    /// Records dropped because a later record had the same key.
    pub replaced: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeReport {
    pub years: Vec<YearMergeSummary>,
}

impl MergeReport {
    #[must_use]
    pub fn file_names(&self) -> Vec<&str> {
        self.years
            .iter()
            .map(|summary| summary.file_name.as_str())
            .collect()
    }
}

/// Checks the whole batch before any partition is touched.
///
/// # Errors
/// Returns [`LedgerError::InvalidBatch`] naming the first offending record.
pub fn validate_batch(batch: &[SupplierRecord]) -> Result<(), LedgerError> {
    for (index, record) in batch.iter().enumerate() {
        let position = index + 1;
        if record.supplier_name.trim().is_empty() {
            return Err(LedgerError::InvalidBatch(format!(
                "record {position}: supplier_name MUST NOT be empty"
            )));
        }
        if !(0..=9999).contains(&record.closing_month.year()) {
            return Err(LedgerError::InvalidBatch(format!(
                "record {position}: closing_month {} is outside the four-digit year range",
                record.closing_month
            )));
        }
    }
    Ok(())
}

/// Drops every record whose key appears again later. Survivors keep the
/// position of their last occurrence.
#[must_use]
pub fn dedupe_keep_last(records: Vec<SupplierRecord>) -> Vec<SupplierRecord> {
    let keys: Vec<RecordKey> = records.iter().map(SupplierRecord::key).collect();
    let mut last_index: BTreeMap<&RecordKey, usize> = BTreeMap::new();
    for (index, key) in keys.iter().enumerate() {
        last_index.insert(key, index);
    }

    records
        .into_iter()
        .enumerate()
        .filter(|(index, _)| last_index.get(&keys[*index]) == Some(index))
        .map(|(_, record)| record)
        .collect()
}

/// Folds `batch` into the partitions of the years it mentions. Every
/// affected partition is loaded and merged before the first one is
/// written, so an invalid batch or an unreadable year aborts the upload
/// before anything is written. Saves then run one year at a time; a failed
/// save leaves the years saved before it in place.
///
/// # Errors
/// Returns [`LedgerError::InvalidBatch`] for an invalid batch,
/// [`LedgerError::CorruptPartition`] when an affected partition cannot be
/// read or holds another year's records, and the errors of
/// [`YearPartitionStore::save_if_unchanged`].
pub fn merge_batch(
    store: &YearPartitionStore,
    batch: &[SupplierRecord],
) -> Result<MergeReport, LedgerError> {
    validate_batch(batch)?;

    let mut by_year: BTreeMap<i32, Vec<SupplierRecord>> = BTreeMap::new();
    for record in batch {
        let mut incoming = record.clone();
        incoming.recompute_achievement();
        by_year
            .entry(incoming.closing_month.year())
            .or_default()
            .push(incoming);
    }

    let mut planned: Vec<(Partition, usize, Vec<SupplierRecord>)> =
        Vec::with_capacity(by_year.len());
    for (year, incoming) in by_year {
        let partition = store.load_for_update(year)?;
        let incoming_count = incoming.len();
        let mut combined = partition.records();
        combined.extend(incoming);
        let merged = dedupe_keep_last(combined);
        planned.push((partition, incoming_count, merged));
    }

    let mut report = MergeReport::default();
    for (partition, incoming, merged) in planned {
        store.save_if_unchanged(partition.year, &merged, partition.stamp)?;

        let existing = partition.len();
        let summary = YearMergeSummary {
            year: partition.year,
            file_name: partition.file_name,
            existing,
            incoming,
            persisted: merged.len(),
            replaced: (existing + incoming).saturating_sub(merged.len()),
        };
        info!(
            year = summary.year,
            file = %summary.file_name,
            existing = summary.existing,
            incoming = summary.incoming,
            persisted = summary.persisted,
            replaced = summary.replaced,
            "merged upload batch into partition"
        );
        report.years.push(summary);
    }

    Ok(report)
}

/// Reads an upload batch from a CSV file.
///
/// # Errors
/// Returns [`LedgerError::InvalidBatch`] when the file cannot be read or
/// decoded.
pub fn read_upload_file(path: &Path, default_target: f64) -> Result<Vec<SupplierRecord>, LedgerError> {
    let bytes = fs::read(path).map_err(|err| {
        LedgerError::InvalidBatch(format!("failed to read {}: {err}", path.display()))
    })?;
    decode_upload(&bytes, default_target)
}
