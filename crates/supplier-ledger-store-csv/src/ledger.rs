use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use supplier_ledger_core::{
    format_percent, format_rupiah, format_target, normalize_supplier_name, performance_chart,
    purchasing_chart, summarize, Chart, EntryInput, FormattedKpi, KpiSummary, LedgerError,
    SupplierRecord, DEFAULT_ITEM_DELAY,
};
use tracing::{info, warn};

use crate::aggregate::{Aggregator, DegradedPartition, UnifiedView};
use crate::config::StoreConfig;
use crate::merge::{merge_batch, read_upload_file, MergeReport};
use crate::partition::{Partition, RowId, StoredRecord, YearPartitionStore};

/// Which uniqueness rule an added record is checked against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AddKind {
    /// The supplier must not appear anywhere in the target year.
    NewSupplier,
    /// The supplier must not already have a record for the target month.
    MonthlyEntry,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardRow {
    pub row_id: RowId,
    pub partition_year: i32,
    #[serde(flatten)]
    pub record: SupplierRecord,
    pub achievement_formatted: String,
    pub target_formatted: String,
    pub purchase_formatted: String,
}

impl From<StoredRecord> for DashboardRow {
    fn from(row: StoredRecord) -> Self {
        Self {
            achievement_formatted: format_percent(row.record.achievement),
            target_formatted: format_target(row.record.target_delivery),
            purchase_formatted: format_rupiah(row.record.purchase_amount),
            row_id: row.row_id,
            partition_year: row.partition_year,
            record: row.record,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SupplierDashboard {
    pub supplier_name: String,
    pub kpi: KpiSummary,
    pub kpi_display: FormattedKpi,
    pub performance_chart: Chart,
    pub purchasing_chart: Chart,
    /// Newest month first.
    pub table: Vec<DashboardRow>,
    pub degraded: Vec<DegradedPartition>,
}

/// Query and mutation surface over the year partitions.
#[derive(Debug, Clone)]
pub struct SupplierLedger {
    store: YearPartitionStore,
}

impl SupplierLedger {
    /// # Errors
    /// Returns [`LedgerError::Configuration`] when `config` is invalid.
    pub fn open(config: StoreConfig) -> Result<Self, LedgerError> {
        Ok(Self {
            store: YearPartitionStore::new(config)?,
        })
    }

    #[must_use]
    pub fn store(&self) -> &YearPartitionStore {
        &self.store
    }

    #[must_use]
    pub fn unified_view(&self) -> UnifiedView {
        Aggregator::new(&self.store).load_all()
    }

    /// Distinct supplier names, sorted. Names differing only in case or
    /// surrounding whitespace are listed once, spelled as first seen.
    #[must_use]
    pub fn list_suppliers(&self) -> Vec<String> {
        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        for record in self.unified_view().records() {
            seen.entry(normalize_supplier_name(&record.supplier_name))
                .or_insert_with(|| record.supplier_name.trim().to_string());
        }
        let mut names: Vec<String> = seen.into_values().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn supplier_exists(&self, name: &str) -> bool {
        self.unified_view()
            .records()
            .any(|record| record.is_supplier(name))
    }

    /// Every record of `name` across all years, oldest month first.
    #[must_use]
    pub fn supplier_history(&self, name: &str) -> Vec<StoredRecord> {
        history_of(self.unified_view(), name)
    }

    /// Appends one record to the partition of the entry's year.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidInput`] for a blank supplier or an
    /// unparseable entry, [`LedgerError::Conflict`] when `kind`'s uniqueness
    /// rule is violated, [`LedgerError::CorruptPartition`] when the target
    /// year cannot be read, and [`LedgerError::WriteFailure`] on save.
    pub fn add_record(
        &self,
        kind: AddKind,
        supplier_name: &str,
        entry: &EntryInput,
    ) -> Result<StoredRecord, LedgerError> {
        let supplier = supplier_name.trim();
        if supplier.is_empty() {
            return Err(LedgerError::InvalidInput(
                "supplier_name MUST NOT be empty".to_string(),
            ));
        }
        let parsed = entry.parse()?;
        let year = parsed.closing_month.year();
        let partition = self.store.load_for_update(year)?;

        let clash = match kind {
            AddKind::NewSupplier => partition
                .rows
                .iter()
                .any(|row| row.record.is_supplier(supplier)),
            AddKind::MonthlyEntry => partition.rows.iter().any(|row| {
                row.record.is_supplier(supplier)
                    && row.record.closing_month.month_key() == parsed.closing_month.month_key()
            }),
        };
        if clash {
            return Err(match kind {
                AddKind::NewSupplier => LedgerError::Conflict(format!(
                    "supplier `{supplier}` already exists in {}",
                    partition.file_name
                )),
                AddKind::MonthlyEntry => LedgerError::Conflict(format!(
                    "`{supplier}` already has an entry for {}",
                    parsed.closing_month.label()
                )),
            });
        }

        let item_delay = partition
            .rows
            .first()
            .map_or(DEFAULT_ITEM_DELAY, |row| row.record.item_delay.as_str())
            .to_string();
        let record = parsed.into_record(supplier, self.store.config().target_delivery, &item_delay);

        let mut records = partition.records();
        records.push(record.clone());
        self.store
            .save_if_unchanged(year, &records, partition.stamp)?;

        let stored = StoredRecord {
            row_id: RowId::derive(&partition.file_name, records.len() - 1),
            partition_year: year,
            record,
        };
        info!(
            ?kind,
            year,
            supplier = %stored.record.supplier_name,
            row_id = %stored.row_id,
            "added record"
        );
        Ok(stored)
    }

    /// Overwrites the entry fields of the record at `row_id`. A month in
    /// another year moves the record to that year's partition.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] for an unknown row id,
    /// [`LedgerError::Conflict`] when another record already holds the
    /// resulting supplier and month, and the errors of [`Self::add_record`]
    /// for input and storage failures.
    pub fn edit_record(&self, row_id: RowId, entry: &EntryInput) -> Result<StoredRecord, LedgerError> {
        let parsed = entry.parse()?;
        let source_year = self.resolve_year(row_id)?;
        let source = self.store.load_for_update(source_year)?;
        let index = source
            .position(row_id)
            .ok_or_else(|| not_found(row_id))?;

        let mut updated = source.rows[index].record.clone();
        updated.apply_entry(parsed);
        let key = updated.key();
        let target_year = updated.closing_month.year();

        if target_year == source_year {
            let taken = source
                .rows
                .iter()
                .enumerate()
                .any(|(other, row)| other != index && row.record.key() == key);
            if taken {
                return Err(duplicate_entry(&updated));
            }

            let mut records = source.records();
            records[index] = updated.clone();
            self.store
                .save_if_unchanged(source_year, &records, source.stamp)?;

            info!(year = source_year, row_id = %row_id, "edited record in place");
            return Ok(StoredRecord {
                row_id,
                partition_year: source_year,
                record: updated,
            });
        }

        self.move_record(&source, index, updated)
    }

    /// Appends `updated` to its own year's partition, then removes the
    /// record at `index` from `source`. A failed source save puts the
    /// target partition back, so the record never ends up in both years.
    fn move_record(
        &self,
        source: &Partition,
        index: usize,
        updated: SupplierRecord,
    ) -> Result<StoredRecord, LedgerError> {
        let target_year = updated.closing_month.year();
        let target = self.store.load_for_update(target_year)?;
        let key = updated.key();
        if target.rows.iter().any(|row| row.record.key() == key) {
            return Err(duplicate_entry(&updated));
        }

        let mut target_records = target.records();
        target_records.push(updated.clone());
        self.store
            .save_if_unchanged(target_year, &target_records, target.stamp)?;

        let mut source_records = source.records();
        source_records.remove(index);
        if let Err(err) = self
            .store
            .save_if_unchanged(source.year, &source_records, source.stamp)
        {
            if let Err(rollback) = self.store.restore(&target) {
                warn!(
                    year = target_year,
                    error = %rollback,
                    "failed to roll back target partition after aborted move"
                );
            }
            return Err(err);
        }

        let moved = StoredRecord {
            row_id: RowId::derive(&target.file_name, target_records.len() - 1),
            partition_year: target_year,
            record: updated,
        };
        info!(
            from = source.year,
            to = target_year,
            old_row_id = %source.rows[index].row_id,
            row_id = %moved.row_id,
            "moved record to another partition"
        );
        Ok(moved)
    }

    /// Removes the record at `row_id` from its partition and returns it.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] for an unknown row id and the
    /// storage errors of [`YearPartitionStore::save_if_unchanged`].
    pub fn delete_record(&self, row_id: RowId) -> Result<StoredRecord, LedgerError> {
        let year = self.resolve_year(row_id)?;
        let partition = self.store.load_for_update(year)?;
        let index = partition
            .position(row_id)
            .ok_or_else(|| not_found(row_id))?;

        let mut records = partition.records();
        records.remove(index);
        self.store.save_if_unchanged(year, &records, partition.stamp)?;

        info!(year, row_id = %row_id, remaining = records.len(), "deleted record");
        let mut rows = partition.rows;
        Ok(rows.swap_remove(index))
    }

    /// # Errors
    /// See [`merge_batch`].
    pub fn upload_batch(&self, batch: &[SupplierRecord]) -> Result<MergeReport, LedgerError> {
        merge_batch(&self.store, batch)
    }

    /// # Errors
    /// Returns [`LedgerError::InvalidBatch`] when the file cannot be read or
    /// decoded, otherwise see [`merge_batch`].
    pub fn upload_file(&self, path: &Path) -> Result<MergeReport, LedgerError> {
        let batch = read_upload_file(path, self.store.config().target_delivery)?;
        info!(path = %path.display(), records = batch.len(), "read upload batch");
        self.upload_batch(&batch)
    }

    /// KPIs, charts and history table for one supplier.
    ///
    /// # Errors
    /// Returns [`LedgerError::NotFound`] when the ledger holds no data or
    /// none for `name`.
    pub fn dashboard(&self, name: &str) -> Result<SupplierDashboard, LedgerError> {
        let view = self.unified_view();
        if view.is_empty() {
            return Err(LedgerError::NotFound(
                "no supplier data available".to_string(),
            ));
        }
        let degraded = view.degraded.clone();
        let history = history_of(view, name);
        let Some(latest) = history.last() else {
            return Err(LedgerError::NotFound(format!(
                "supplier `{}` has no records",
                name.trim()
            )));
        };
        let supplier_name = latest.record.supplier_name.clone();

        let records: Vec<&SupplierRecord> = history.iter().map(|row| &row.record).collect();
        let kpi = summarize(records.iter().copied());
        let kpi_display = kpi.formatted();
        let performance = performance_chart(records.iter().copied());
        let purchasing = purchasing_chart(records.iter().copied());

        let table = history.into_iter().rev().map(DashboardRow::from).collect();

        Ok(SupplierDashboard {
            supplier_name,
            kpi,
            kpi_display,
            performance_chart: performance,
            purchasing_chart: purchasing,
            table,
            degraded,
        })
    }

    fn resolve_year(&self, row_id: RowId) -> Result<i32, LedgerError> {
        self.unified_view()
            .find(row_id)
            .map(|row| row.partition_year)
            .ok_or_else(|| not_found(row_id))
    }
}

fn history_of(view: UnifiedView, name: &str) -> Vec<StoredRecord> {
    let mut rows: Vec<StoredRecord> = view
        .rows
        .into_iter()
        .filter(|row| row.record.is_supplier(name))
        .collect();
    rows.sort_by_key(|row| row.record.closing_month);
    rows
}

fn not_found(row_id: RowId) -> LedgerError {
    LedgerError::NotFound(format!("no record with row id {row_id}"))
}

fn duplicate_entry(record: &SupplierRecord) -> LedgerError {
    LedgerError::Conflict(format!(
        "`{}` already has an entry for {}",
        record.supplier_name,
        record.closing_month.label()
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]

    use std::fs;

    use super::*;
    use crate::test_support::{fixture_record, must, TempDataDir};
    use supplier_ledger_core::ClosingMonth;

    fn entry(month: &str, total: u32, on_time: u32, amount: f64) -> EntryInput {
        EntryInput {
            month: month.to_string(),
            total_delivery_item: total.to_string(),
            on_time: on_time.to_string(),
            minus: total.saturating_sub(on_time).to_string(),
            purchase_amount: amount.to_string(),
            target_delivery: None,
            item_delay: None,
        }
    }

    fn seeded(label: &str) -> TempDataDir {
        let dir = TempDataDir::new(label);
        let store = dir.store();
        must(store.save(
            2024,
            &[
                fixture_record("Acme", "2024-11", 10, 9, 100.0),
                fixture_record("Globex", "2024-12", 20, 20, 200.0),
            ],
        ));
        must(store.save(
            2025,
            &[
                fixture_record("Acme", "2025-01", 100, 95, 1_000.0),
                fixture_record("Acme", "2025-02", 80, 80, 2_000.0),
            ],
        ));
        dir
    }

    fn row_of(ledger: &SupplierLedger, supplier: &str, month: (i32, u8)) -> RowId {
        match ledger
            .supplier_history(supplier)
            .into_iter()
            .find(|row| row.record.closing_month.month_key() == month)
        {
            Some(row) => row.row_id,
            None => panic!("no {supplier} record for {month:?}"),
        }
    }

    #[test]
    fn new_supplier_with_nothing_due_is_fully_achieved() {
        let dir = TempDataDir::new("ledger-add-zero");
        let ledger = dir.ledger();

        let stored = must(ledger.add_record(AddKind::NewSupplier, "Initech", &entry("2025-03", 0, 0, 0.0)));

        assert_eq!(stored.record.achievement, 1.0);
        assert_eq!(stored.record.target_delivery, 0.9);
        assert_eq!(stored.record.item_delay, "0");
        let partition = must(ledger.store().load(2025));
        assert_eq!(partition.rows[0].row_id, stored.row_id);
        assert_eq!(partition.rows[0].record.achievement, 1.0);
    }

    #[test]
    fn new_supplier_conflicts_within_year_only() {
        let dir = seeded("ledger-add-conflict");
        let ledger = dir.ledger();

        let result = ledger.add_record(AddKind::NewSupplier, " acme ", &entry("2025-06", 1, 1, 1.0));
        assert!(matches!(result, Err(LedgerError::Conflict(_))));

        must(ledger.add_record(AddKind::NewSupplier, "Globex", &entry("2025-06", 1, 1, 1.0)));
        assert_eq!(must(ledger.store().load(2025)).len(), 3);
    }

    #[test]
    fn monthly_entry_conflicts_on_same_month() {
        let dir = seeded("ledger-add-month");
        let ledger = dir.ledger();

        let result = ledger.add_record(AddKind::MonthlyEntry, "ACME", &entry("2025-01-20", 1, 1, 1.0));
        assert!(matches!(result, Err(LedgerError::Conflict(_))));

        let stored = must(ledger.add_record(AddKind::MonthlyEntry, "Acme", &entry("2025-03", 5, 4, 1.0)));
        assert_eq!(stored.row_id, RowId::derive("data_2025.csv", 2));
        assert_eq!(stored.record.achievement, 0.8);
    }

    #[test]
    fn added_record_inherits_item_delay_and_accepts_target_override() {
        let dir = TempDataDir::new("ledger-add-defaults");
        let store = dir.store();
        let mut first = fixture_record("Acme", "2025-01", 1, 1, 1.0);
        first.item_delay = "3".to_string();
        must(store.save(2025, &[first]));
        let ledger = dir.ledger();

        let mut input = entry("2025-02", 10, 10, 1.0);
        input.target_delivery = Some("95".to_string());
        let stored = must(ledger.add_record(AddKind::MonthlyEntry, "Acme", &input));

        assert_eq!(stored.record.item_delay, "3");
        assert_eq!(stored.record.target_delivery, 0.95);
    }

    #[test]
    fn invalid_entry_is_rejected_without_writing() {
        let dir = TempDataDir::new("ledger-add-invalid");
        let ledger = dir.ledger();

        let mut input = entry("2025-01", 1, 1, 1.0);
        input.on_time = "many".to_string();
        assert!(matches!(
            ledger.add_record(AddKind::NewSupplier, "Acme", &input),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.add_record(AddKind::NewSupplier, "  ", &entry("2025-01", 1, 1, 1.0)),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(!ledger.store().partition_path(2025).exists());
    }

    #[test]
    fn edit_in_same_year_overwrites_entry_fields() {
        let dir = seeded("ledger-edit-same");
        let ledger = dir.ledger();
        let row_id = row_of(&ledger, "Acme", (2025, 1));

        let edited = must(ledger.edit_record(row_id, &entry("2025-01", 100, 98, 1_500.0)));

        assert_eq!(edited.row_id, row_id);
        assert_eq!(edited.record.supplier_name, "Acme");
        assert_eq!(edited.record.achievement, 0.98);
        let partition = must(ledger.store().load(2025));
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.rows[0].record.on_time, 98);
        assert_eq!(partition.rows[0].record.purchase_amount, 1_500.0);
    }

    #[test]
    fn edit_onto_existing_month_conflicts() {
        let dir = seeded("ledger-edit-dup");
        let ledger = dir.ledger();
        let row_id = row_of(&ledger, "Acme", (2025, 1));

        let result = ledger.edit_record(row_id, &entry("2025-02", 1, 1, 1.0));
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
    }

    #[test]
    fn edit_into_other_year_moves_record() {
        let dir = seeded("ledger-edit-move");
        let ledger = dir.ledger();
        let row_id = row_of(&ledger, "Acme", (2025, 2));

        let moved = must(ledger.edit_record(row_id, &entry("2026-02", 80, 70, 2_000.0)));

        assert_eq!(moved.partition_year, 2026);
        let source = must(ledger.store().load(2025));
        assert_eq!(source.len(), 1);
        assert!(source.rows.iter().all(|row| row.record.closing_month.year() == 2025));
        let target = must(ledger.store().load(2026));
        assert_eq!(target.len(), 1);
        assert_eq!(target.rows[0].row_id, moved.row_id);
        assert_eq!(target.rows[0].record.on_time, 70);
    }

    #[test]
    fn edit_into_occupied_month_of_other_year_conflicts_without_writing() {
        let dir = seeded("ledger-edit-move-dup");
        let ledger = dir.ledger();
        let before = must(fs::read(ledger.store().partition_path(2025)));
        let row_id = row_of(&ledger, "Acme", (2025, 1));

        let result = ledger.edit_record(row_id, &entry("2024-11", 1, 1, 1.0));

        assert!(matches!(result, Err(LedgerError::Conflict(_))));
        assert_eq!(must(fs::read(ledger.store().partition_path(2025))), before);
    }

    #[test]
    fn failed_source_save_rolls_back_new_target_partition() {
        let dir = seeded("ledger-move-rollback");
        let ledger = dir.ledger();
        let store = ledger.store();
        let source = must(store.load_for_update(2025));
        let mut updated = source.rows[1].record.clone();
        updated.closing_month = must(ClosingMonth::parse("2026-02"));

        must(store.save(2025, &source.records()[..1]));
        let result = ledger.move_record(&source, 1, updated);

        assert!(matches!(result, Err(LedgerError::Conflict(_))));
        assert!(!store.partition_path(2026).exists());
        let view = ledger.unified_view();
        assert!(view.degraded.is_empty());
        assert!(!view
            .records()
            .any(|record| record.closing_month.month_key() == (2026, 2)));
    }

    #[test]
    fn failed_source_save_restores_existing_target_partition() {
        let dir = seeded("ledger-move-restore");
        let ledger = dir.ledger();
        let store = ledger.store();
        must(store.save(2026, &[fixture_record("Globex", "2026-01", 1, 1, 1.0)]));
        let target_before = must(fs::read(store.partition_path(2026)));
        let source = must(store.load_for_update(2025));
        let mut updated = source.rows[1].record.clone();
        updated.closing_month = must(ClosingMonth::parse("2026-02"));

        must(store.save(2025, &source.records()[..1]));
        let result = ledger.move_record(&source, 1, updated);

        assert!(matches!(result, Err(LedgerError::Conflict(_))));
        assert_eq!(must(fs::read(store.partition_path(2026))), target_before);
        let acme_rows = ledger
            .unified_view()
            .rows
            .iter()
            .filter(|row| row.record.is_supplier("Acme"))
            .count();
        assert_eq!(acme_rows, 2);
    }

    #[test]
    fn stray_year_row_blocks_edit_as_corrupt_without_duplicating() {
        let dir = TempDataDir::new("ledger-stray");
        let store = dir.store();
        must(store.save(2025, &[fixture_record("Acme", "2025-02", 10, 10, 1.0)]));
        let mut text = must(fs::read_to_string(store.partition_path(2025)));
        text.push_str("2024-12-01,Old,1,1,0,0.9,1.0,1.0,0\n");
        must(fs::write(store.partition_path(2025), text));
        let ledger = dir.ledger();
        let row_id = row_of(&ledger, "Acme", (2025, 2));

        let result = ledger.edit_record(row_id, &entry("2026-02", 10, 8, 1.0));

        assert!(matches!(result, Err(LedgerError::CorruptPartition(_))));
        assert!(!store.partition_path(2026).exists());
        assert_eq!(ledger.supplier_history("acme").len(), 1);
        assert!(matches!(
            ledger.add_record(AddKind::MonthlyEntry, "Acme", &entry("2025-03", 1, 1, 1.0)),
            Err(LedgerError::CorruptPartition(_))
        ));
    }

    #[test]
    fn unknown_row_id_is_not_found() {
        let dir = seeded("ledger-unknown");
        let ledger = dir.ledger();
        let missing = RowId::derive("data_2025.csv", 99);

        assert!(matches!(
            ledger.edit_record(missing, &entry("2025-01", 1, 1, 1.0)),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            ledger.delete_record(missing),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn delete_removes_exactly_one_record_from_one_partition() {
        let dir = seeded("ledger-delete");
        let ledger = dir.ledger();
        let before_2024 = must(fs::read(ledger.store().partition_path(2024)));
        let row_id = row_of(&ledger, "Acme", (2025, 1));

        let removed = must(ledger.delete_record(row_id));

        assert_eq!(removed.row_id, row_id);
        assert_eq!(removed.record.closing_month.month_key(), (2025, 1));
        let remaining = must(ledger.store().load(2025));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining.rows[0].record.closing_month.month_key(), (2025, 2));
        assert_eq!(must(fs::read(ledger.store().partition_path(2024))), before_2024);
        assert_eq!(ledger.unified_view().len(), 3);
    }

    #[test]
    fn corrupt_year_degrades_reads_but_blocks_mutation() {
        let dir = seeded("ledger-corrupt");
        let ledger = dir.ledger();
        must(fs::write(ledger.store().partition_path(2026), "closing_month\nnope\n"));

        let view = ledger.unified_view();
        assert_eq!(view.len(), 4);
        assert_eq!(view.degraded.len(), 1);

        let result = ledger.add_record(AddKind::NewSupplier, "Initech", &entry("2026-01", 1, 1, 1.0));
        assert!(matches!(result, Err(LedgerError::CorruptPartition(_))));
    }

    #[test]
    fn suppliers_are_listed_once_and_matched_case_insensitively() {
        let dir = seeded("ledger-list");
        let store = dir.store();
        must(store.save(2023, &[fixture_record("GLOBEX", "2023-05", 1, 1, 1.0)]));
        let ledger = dir.ledger();

        assert_eq!(ledger.list_suppliers(), vec!["Acme".to_string(), "GLOBEX".to_string()]);
        assert!(ledger.supplier_exists(" globex"));
        assert!(!ledger.supplier_exists("Initech"));

        let months: Vec<(i32, u8)> = ledger
            .supplier_history("acme")
            .iter()
            .map(|row| row.record.closing_month.month_key())
            .collect();
        assert_eq!(months, vec![(2024, 11), (2025, 1), (2025, 2)]);
    }

    #[test]
    fn dashboard_summarizes_history_newest_first() {
        let dir = seeded("ledger-dashboard");
        let ledger = dir.ledger();

        let dashboard = must(ledger.dashboard("acme"));

        assert_eq!(dashboard.supplier_name, "Acme");
        assert_eq!(dashboard.kpi.record_count, 3);
        assert_eq!(dashboard.kpi.total_delivery, 190);
        assert_eq!(dashboard.kpi_display.total_purchase, "Rp 3.100");
        assert_eq!(dashboard.kpi_display.total_delivery, "190 pcs");
        assert_eq!(
            dashboard.performance_chart.labels,
            vec!["November 2024", "January 2025", "February 2025"]
        );
        assert_eq!(dashboard.purchasing_chart.series[0].values, vec![100.0, 1_000.0, 2_000.0]);

        let table_months: Vec<(i32, u8)> = dashboard
            .table
            .iter()
            .map(|row| row.record.closing_month.month_key())
            .collect();
        assert_eq!(table_months, vec![(2025, 2), (2025, 1), (2024, 11)]);
        assert_eq!(dashboard.table[1].achievement_formatted, "95.00%");
        assert_eq!(dashboard.table[1].target_formatted, "90%");
        assert_eq!(dashboard.table[1].purchase_formatted, "Rp 1.000");
    }

    #[test]
    fn dashboard_without_data_is_not_found() {
        let empty = TempDataDir::new("ledger-dashboard-empty");
        assert!(matches!(
            empty.ledger().dashboard("Acme"),
            Err(LedgerError::NotFound(_))
        ));

        let dir = seeded("ledger-dashboard-unknown");
        assert!(matches!(
            dir.ledger().dashboard("Initech"),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn upload_file_merges_into_partitions() {
        let dir = seeded("ledger-upload");
        let ledger = dir.ledger();
        let path = dir.path().join("batch.csv");
        must(fs::write(
            &path,
            "closing_month,supplier_name,total_delivery_item,on_time,minus,purchase_amount\n\
             2025-01,acme,100,98,2,1000\n\
             2025-03,Acme,10,10,0,500\n",
        ));

        let report = must(ledger.upload_file(&path));

        assert_eq!(report.file_names(), vec!["data_2025.csv"]);
        let partition = must(ledger.store().load(2025));
        assert_eq!(partition.len(), 3);
        assert_eq!(partition.rows[0].record.closing_month.month_key(), (2025, 2));
        assert_eq!(partition.rows[1].record.on_time, 98);
    }
}
