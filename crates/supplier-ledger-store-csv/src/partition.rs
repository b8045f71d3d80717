use std::fmt::{Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use supplier_ledger_core::{LedgerError, SupplierRecord};
use tracing::debug;
use ulid::Ulid;

use crate::codec::{decode_partition, encode_partition};
use crate::config::StoreConfig;

/// Load-time handle for a record. Derived from the partition file name and
/// the record's ordinal; never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl RowId {
    #[must_use]
    pub fn derive(file_name: &str, ordinal: usize) -> Self {
        Self(fnv1a64(format!("{file_name}-{ordinal}").as_bytes()))
    }
}

impl Display for RowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for RowId {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|err| LedgerError::InvalidInput(format!("invalid row id `{value}`: {err}")))
    }
}

/// Content fingerprint of a partition file, used to detect rewrites between
/// load and save.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PartitionStamp {
    Absent,
    Present { len: u64, digest: u64 },
}

impl PartitionStamp {
    fn of_bytes(bytes: &[u8]) -> Self {
        Self::Present {
            len: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            digest: fnv1a64(bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub row_id: RowId,
    pub partition_year: i32,
    #[serde(flatten)]
    pub record: SupplierRecord,
}

/// One year's records in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub year: i32,
    pub file_name: String,
    pub rows: Vec<StoredRecord>,
    pub stamp: PartitionStamp,
}

impl Partition {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn position(&self, row_id: RowId) -> Option<usize> {
        self.rows.iter().position(|row| row.row_id == row_id)
    }

    /// Fails when the file holds a record of another year. Such a file still
    /// loads for reading but is not rewritten until it is repaired.
    ///
    /// # Errors
    /// Returns [`LedgerError::CorruptPartition`] naming the first stray record.
    pub fn ensure_single_year(&self) -> Result<(), LedgerError> {
        match self
            .rows
            .iter()
            .find(|row| row.record.closing_month.year() != self.year)
        {
            Some(stray) => Err(LedgerError::CorruptPartition(format!(
                "{} holds a record for `{}` closing {}, which belongs to another year",
                self.file_name, stray.record.supplier_name, stray.record.closing_month
            ))),
            None => Ok(()),
        }
    }

    /// Records with their row ids dropped, ready to be saved.
    #[must_use]
    pub fn records(&self) -> Vec<SupplierRecord> {
        self.rows.iter().map(|row| row.record.clone()).collect()
    }
}

/// Durable per-year storage: one CSV file per year, rewritten whole on every
/// save.
#[derive(Debug, Clone)]
pub struct YearPartitionStore {
    config: StoreConfig,
}

impl YearPartitionStore {
    /// # Errors
    /// Returns [`LedgerError::Configuration`] when `config` is invalid.
    pub fn new(config: StoreConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn partition_file_name(&self, year: i32) -> String {
        format!(
            "{}{year:04}.{}",
            self.config.file_prefix, self.config.file_extension
        )
    }

    #[must_use]
    pub fn partition_path(&self, year: i32) -> PathBuf {
        self.config.data_dir.join(self.partition_file_name(year))
    }

    /// Inverse of [`Self::partition_file_name`]; `None` for any other file.
    #[must_use]
    pub fn year_of_file_name(&self, file_name: &str) -> Option<i32> {
        let stem = file_name
            .strip_prefix(self.config.file_prefix.as_str())?
            .strip_suffix(self.config.file_extension.as_str())?
            .strip_suffix('.')?;
        if stem.len() != 4 || !stem.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        stem.parse().ok()
    }

    /// Loads one year. A missing file is an empty partition.
    ///
    /// # Errors
    /// Returns [`LedgerError::CorruptPartition`] when the file exists but
    /// cannot be read or parsed.
    pub fn load(&self, year: i32) -> Result<Partition, LedgerError> {
        let path = self.partition_path(year);
        let file_name = self.partition_file_name(year);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(year, path = %path.display(), "partition file absent; loading empty");
                return Ok(Partition {
                    year,
                    file_name,
                    rows: Vec::new(),
                    stamp: PartitionStamp::Absent,
                });
            }
            Err(err) => {
                return Err(LedgerError::CorruptPartition(format!(
                    "failed to read {}: {err}",
                    path.display()
                )))
            }
        };

        let stamp = PartitionStamp::of_bytes(&bytes);
        let records = decode_partition(&bytes, self.config.target_delivery).map_err(|err| {
            LedgerError::CorruptPartition(format!("{}: {err}", path.display()))
        })?;

        let rows = records
            .into_iter()
            .enumerate()
            .map(|(ordinal, record)| StoredRecord {
                row_id: RowId::derive(&file_name, ordinal),
                partition_year: year,
                record,
            })
            .collect::<Vec<_>>();

        debug!(year, path = %path.display(), records = rows.len(), "loaded partition");
        Ok(Partition {
            year,
            file_name,
            rows,
            stamp,
        })
    }

    /// Loads one year for a load-modify-save cycle.
    ///
    /// # Errors
    /// Returns [`LedgerError::CorruptPartition`] when the file cannot be read
    /// or holds records of another year.
    pub fn load_for_update(&self, year: i32) -> Result<Partition, LedgerError> {
        let partition = self.load(year)?;
        partition.ensure_single_year()?;
        Ok(partition)
    }

    /// Current stamp of the partition file without decoding it.
    ///
    /// # Errors
    /// Returns [`LedgerError::CorruptPartition`] when the file exists but
    /// cannot be read.
    pub fn stamp(&self, year: i32) -> Result<PartitionStamp, LedgerError> {
        let path = self.partition_path(year);
        match fs::read(&path) {
            Ok(bytes) => Ok(PartitionStamp::of_bytes(&bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PartitionStamp::Absent),
            Err(err) => Err(LedgerError::CorruptPartition(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    /// Replaces the whole partition with `records`.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidInput`] when a record belongs to another
    /// year and [`LedgerError::WriteFailure`] when the file cannot be written.
    pub fn save(&self, year: i32, records: &[SupplierRecord]) -> Result<(), LedgerError> {
        if !(0..=9999).contains(&year) {
            return Err(LedgerError::InvalidInput(format!(
                "partition year {year} MUST have four digits"
            )));
        }

        if let Some(stray) = records
            .iter()
            .find(|record| record.closing_month.year() != year)
        {
            return Err(LedgerError::InvalidInput(format!(
                "record for `{}` closing {} does not belong to partition {year}",
                stray.supplier_name, stray.closing_month
            )));
        }

        let bytes = encode_partition(records)?;
        let path = self.partition_path(year);
        self.write_atomic(&path, &bytes)?;

        debug!(year, path = %path.display(), records = records.len(), "saved partition");
        Ok(())
    }

    /// Saves only if the file still matches the stamp taken at load time.
    ///
    /// # Errors
    /// Returns [`LedgerError::Conflict`] when the partition was rewritten
    /// since `expected` was taken, otherwise the errors of [`Self::save`].
    pub fn save_if_unchanged(
        &self,
        year: i32,
        records: &[SupplierRecord],
        expected: PartitionStamp,
    ) -> Result<(), LedgerError> {
        let current = self.stamp(year).map_err(|err| {
            LedgerError::WriteFailure(format!("failed to verify partition stamp: {err}"))
        })?;
        if current != expected {
            return Err(LedgerError::Conflict(format!(
                "{} changed since it was loaded; reload and retry",
                self.partition_file_name(year)
            )));
        }
        self.save(year, records)
    }

    /// Puts a partition back to the state it had when `previous` was
    /// loaded: rewritten from its records, or removed if it did not exist.
    ///
    /// # Errors
    /// Returns [`LedgerError::WriteFailure`] when the file cannot be
    /// rewritten or removed.
    pub fn restore(&self, previous: &Partition) -> Result<(), LedgerError> {
        match previous.stamp {
            PartitionStamp::Present { .. } => self.save(previous.year, &previous.records()),
            PartitionStamp::Absent => {
                let path = self.partition_path(previous.year);
                match fs::remove_file(&path) {
                    Ok(()) => Ok(()),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                    Err(err) => Err(LedgerError::WriteFailure(format!(
                        "failed to remove {}: {err}",
                        path.display()
                    ))),
                }
            }
        }
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), LedgerError> {
        fs::create_dir_all(&self.config.data_dir).map_err(|err| {
            LedgerError::WriteFailure(format!(
                "failed to create data directory {}: {err}",
                self.config.data_dir.display()
            ))
        })?;

        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            return Err(LedgerError::WriteFailure(format!(
                "partition path has no file name: {}",
                path.display()
            )));
        };
        let tmp_path = path.with_file_name(format!("{file_name}.{}.tmp", Ulid::new()));

        let result = write_and_sync(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, path));
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(LedgerError::WriteFailure(format!(
                "failed to write {}: {err}",
                path.display()
            )));
        }
        Ok(())
    }
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Stable FNV-1a hash; platform hashers are randomized per process.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
