//! CSV encoding of partitions and upload batches.

use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::Deserialize;
use supplier_ledger_core::{
    compute_achievement, parse_amount, parse_count, ClosingMonth, LedgerError, SupplierRecord,
    DEFAULT_ITEM_DELAY, PARTITION_COLUMNS,
};

/// Columns an upload batch must carry.
pub const MANDATORY_UPLOAD_COLUMNS: [&str; 6] = [
    "closing_month",
    "supplier_name",
    "total_delivery_item",
    "on_time",
    "minus",
    "purchase_amount",
];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum AchievementSource {
    Stored,
    Recompute,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    closing_month: Option<String>,
    supplier_name: Option<String>,
    total_delivery_item: Option<String>,
    on_time: Option<String>,
    minus: Option<String>,
    target_delivery: Option<String>,
    achievement: Option<String>,
    purchase_amount: Option<String>,
    item_delay: Option<String>,
}

impl RawRow {
    fn into_record(
        self,
        default_target: f64,
        source: AchievementSource,
    ) -> Result<SupplierRecord, LedgerError> {
        let closing_month =
            ClosingMonth::parse(required(self.closing_month.as_deref(), "closing_month")?)?;
        let supplier_name = required(self.supplier_name.as_deref(), "supplier_name")?
            .trim()
            .to_string();
        let total_delivery_item = parse_count(
            "total_delivery_item",
            required(self.total_delivery_item.as_deref(), "total_delivery_item")?,
        )?;
        let on_time = parse_count("on_time", required(self.on_time.as_deref(), "on_time")?)?;
        let minus = parse_count("minus", required(self.minus.as_deref(), "minus")?)?;
        let purchase_amount = parse_amount(
            "purchase_amount",
            required(self.purchase_amount.as_deref(), "purchase_amount")?,
        )?;

        let target_delivery = match non_blank(self.target_delivery.as_deref()) {
            Some(raw) => parse_amount("target_delivery", raw)?,
            None => default_target,
        };
        let achievement = match (source, non_blank(self.achievement.as_deref())) {
            (AchievementSource::Stored, Some(raw)) => parse_amount("achievement", raw)?,
            _ => compute_achievement(total_delivery_item, on_time),
        };
        let item_delay = non_blank(self.item_delay.as_deref())
            .map_or_else(|| DEFAULT_ITEM_DELAY.to_string(), |value| value.trim().to_string());

        Ok(SupplierRecord {
            closing_month,
            supplier_name,
            total_delivery_item,
            on_time,
            minus,
            target_delivery,
            achievement,
            purchase_amount,
            item_delay,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|raw| !raw.trim().is_empty())
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, LedgerError> {
    non_blank(value).ok_or_else(|| LedgerError::InvalidInput(format!("{field} is required")))
}

fn decode_records(
    bytes: &[u8],
    default_target: f64,
    source: AchievementSource,
) -> Result<Vec<SupplierRecord>, String> {
    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(bytes);
    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<RawRow>().enumerate() {
        let position = index + 1;
        let row = row.map_err(|err| format!("record {position}: {err}"))?;
        let record = row
            .into_record(default_target, source)
            .map_err(|err| format!("record {position}: {err}"))?;
        records.push(record);
    }
    Ok(records)
}

/// Decodes a persisted partition. Stored achievement values are kept; a
/// missing `achievement` column is recomputed.
pub(crate) fn decode_partition(
    bytes: &[u8],
    default_target: f64,
) -> Result<Vec<SupplierRecord>, String> {
    decode_records(bytes, default_target, AchievementSource::Stored)
}

/// Decodes an upload batch. Mandatory columns are checked against the
/// header row before any record is read, and achievement is always
/// recomputed.
///
/// # Errors
/// Returns [`LedgerError::InvalidBatch`] when a mandatory column is missing
/// or any record fails to parse.
pub fn decode_upload(bytes: &[u8], default_target: f64) -> Result<Vec<SupplierRecord>, LedgerError> {
    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|err| LedgerError::InvalidBatch(format!("unreadable header row: {err}")))?;

    for column in MANDATORY_UPLOAD_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(LedgerError::InvalidBatch(format!(
                "missing mandatory column `{column}`"
            )));
        }
    }

    decode_records(bytes, default_target, AchievementSource::Recompute)
        .map_err(LedgerError::InvalidBatch)
}

/// Encodes records with a fixed header row. No `row_id` column is written.
pub(crate) fn encode_partition(records: &[SupplierRecord]) -> Result<Vec<u8>, LedgerError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(PARTITION_COLUMNS)
        .map_err(|err| LedgerError::WriteFailure(format!("failed to encode header: {err}")))?;
    for record in records {
        writer.serialize(record).map_err(|err| {
            LedgerError::WriteFailure(format!(
                "failed to encode record for `{}`: {err}",
                record.supplier_name
            ))
        })?;
    }
    writer
        .into_inner()
        .map_err(|err| LedgerError::WriteFailure(format!("failed to flush partition: {err}")))
}
