//! Record schema, input parsing, and KPI/chart projections for the supplier
//! performance ledger.
//!
//! Everything in this crate is pure: persistence lives in
//! `supplier-ledger-store-csv`.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::format_description;
use time::Date;

/// Target delivery ratio applied when an entry does not carry its own.
pub const DEFAULT_TARGET_DELIVERY: f64 = 0.90;

/// Value written to `item_delay` when nothing else is known.
pub const DEFAULT_ITEM_DELAY: &str = "0";

/// Column order of a persisted partition. `row_id` is never part of it.
pub const PARTITION_COLUMNS: [&str; 9] = [
    "closing_month",
    "supplier_name",
    "total_delivery_item",
    "on_time",
    "minus",
    "target_delivery",
    "achievement",
    "purchase_amount",
    "item_delay",
];

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("write failure: {0}")]
    WriteFailure(String),
    #[error("corrupt partition: {0}")]
    CorruptPartition(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LedgerError {
    /// Stable machine-readable code for error envelopes.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "ledger.invalid_input",
            Self::InvalidBatch(_) => "ledger.invalid_batch",
            Self::Conflict(_) => "ledger.conflict",
            Self::NotFound(_) => "ledger.not_found",
            Self::WriteFailure(_) => "ledger.write_failure",
            Self::CorruptPartition(_) => "ledger.corrupt_partition",
            Self::Configuration(_) => "ledger.configuration",
        }
    }
}

/// A closing month. The day component is carried through persistence but
/// ignored by every comparison that matters for identity.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClosingMonth(Date);

impl ClosingMonth {
    /// Parses `YYYY-MM`, `YYYY-MM-DD`, or a date followed by a time part
    /// (`YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`). Month and day may be
    /// given without a leading zero (`2025-1`).
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidInput`] when the value is not a date.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let trimmed = raw.trim();
        let date_part = match trimmed.find(|ch: char| ch == ' ' || ch == 'T') {
            Some(index) => &trimmed[..index],
            None => trimmed,
        };
        let mut fields: Vec<String> = date_part
            .split('-')
            .map(|field| format!("{field:0>2}"))
            .collect();
        if fields.len() == 2 {
            fields.push("01".to_string());
        }
        let candidate = fields.join("-");

        Date::parse(&candidate, format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|err| {
                LedgerError::InvalidInput(format!(
                    "closing_month `{raw}` MUST be YYYY-MM or YYYY-MM-DD: {err}"
                ))
            })
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    /// `(year, month)` with the day dropped.
    #[must_use]
    pub fn month_key(self) -> (i32, u8) {
        (self.0.year(), u8::from(self.0.month()))
    }

    /// Chart label such as `January 2025`.
    #[must_use]
    pub fn label(self) -> String {
        format!("{} {}", self.0.month(), self.0.year())
    }
}

impl Display for ClosingMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for ClosingMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClosingMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// One supplier-month performance entry as persisted in a partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplierRecord {
    pub closing_month: ClosingMonth,
    pub supplier_name: String,
    pub total_delivery_item: u32,
    pub on_time: u32,
    pub minus: u32,
    pub target_delivery: f64,
    pub achievement: f64,
    pub purchase_amount: f64,
    pub item_delay: String,
}

/// Identity of a record inside a partition: normalized supplier plus month.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordKey {
    pub supplier: String,
    pub year: i32,
    pub month: u8,
}

impl SupplierRecord {
    #[must_use]
    pub fn key(&self) -> RecordKey {
        let (year, month) = self.closing_month.month_key();
        RecordKey {
            supplier: normalize_supplier_name(&self.supplier_name),
            year,
            month,
        }
    }

    #[must_use]
    pub fn is_supplier(&self, name: &str) -> bool {
        normalize_supplier_name(&self.supplier_name) == normalize_supplier_name(name)
    }

    pub fn recompute_achievement(&mut self) {
        self.achievement = compute_achievement(self.total_delivery_item, self.on_time);
    }

    /// Overwrites every entry-controlled field. The supplier name is kept;
    /// target and item delay are kept unless the entry carries them.
    pub fn apply_entry(&mut self, entry: ParsedEntry) {
        self.closing_month = entry.closing_month;
        self.total_delivery_item = entry.total_delivery_item;
        self.on_time = entry.on_time;
        self.minus = entry.minus;
        self.purchase_amount = entry.purchase_amount;
        if let Some(target) = entry.target_delivery {
            self.target_delivery = target;
        }
        if let Some(item_delay) = entry.item_delay {
            self.item_delay = item_delay;
        }
        self.recompute_achievement();
    }
}

/// Case- and whitespace-insensitive form of a supplier name.
#[must_use]
pub fn normalize_supplier_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// On-time ratio for a delivery month. A month with nothing due and nothing
/// delivered counts as fully achieved.
#[must_use]
pub fn compute_achievement(total_delivery_item: u32, on_time: u32) -> f64 {
    if total_delivery_item > 0 {
        f64::from(on_time) / f64::from(total_delivery_item)
    } else if on_time == 0 {
        1.0
    } else {
        0.0
    }
}

/// Parses a non-negative item count. Integral decimals such as `12.0` are
/// accepted.
///
/// # Errors
/// Returns [`LedgerError::InvalidInput`] naming `field` when the value is
/// empty, negative, fractional, or not a number.
pub fn parse_count(field: &str, raw: &str) -> Result<u32, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidInput(format!("{field} is required")));
    }

    if let Ok(value) = trimmed.parse::<u32>() {
        return Ok(value);
    }

    let value = trimmed.parse::<f64>().map_err(|_| {
        LedgerError::InvalidInput(format!("{field} MUST be a whole number, got `{raw}`"))
    })?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(LedgerError::InvalidInput(format!(
            "{field} MUST be a non-negative whole number, got `{raw}`"
        )));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = value as u32;
    Ok(count)
}

/// Parses a non-negative finite decimal.
///
/// # Errors
/// Returns [`LedgerError::InvalidInput`] naming `field` when the value is
/// empty, negative, or not a finite number.
pub fn parse_amount(field: &str, raw: &str) -> Result<f64, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidInput(format!("{field} is required")));
    }

    let value = trimmed.parse::<f64>().map_err(|_| {
        LedgerError::InvalidInput(format!("{field} MUST be a number, got `{raw}`"))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerError::InvalidInput(format!(
            "{field} MUST be a non-negative number, got `{raw}`"
        )));
    }
    Ok(value)
}

/// Parses a target given as a percentage (`"90"`) into a fraction (`0.9`).
///
/// # Errors
/// Returns [`LedgerError::InvalidInput`] when the value is not within 0..=100.
pub fn parse_target_percent(raw: &str) -> Result<f64, LedgerError> {
    let percent = parse_amount("target_delivery", raw)?;
    if percent > 100.0 {
        return Err(LedgerError::InvalidInput(format!(
            "target_delivery MUST be a percentage in [0, 100], got `{raw}`"
        )));
    }
    Ok(percent / 100.0)
}

/// Raw entry fields as submitted by an operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryInput {
    pub month: String,
    pub total_delivery_item: String,
    pub on_time: String,
    pub minus: String,
    pub purchase_amount: String,
    /// Percentage, e.g. `"90"`.
    pub target_delivery: Option<String>,
    pub item_delay: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    pub closing_month: ClosingMonth,
    pub total_delivery_item: u32,
    pub on_time: u32,
    pub minus: u32,
    pub purchase_amount: f64,
    pub target_delivery: Option<f64>,
    pub item_delay: Option<String>,
}

impl EntryInput {
    /// Parses every field; nothing is defaulted to zero on failure.
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidInput`] for the first unparseable field.
    pub fn parse(&self) -> Result<ParsedEntry, LedgerError> {
        let target_delivery = match self.target_delivery.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(parse_target_percent(raw)?),
            _ => None,
        };
        let item_delay = self
            .item_delay
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(ParsedEntry {
            closing_month: ClosingMonth::parse(&self.month)?,
            total_delivery_item: parse_count("total_delivery_item", &self.total_delivery_item)?,
            on_time: parse_count("on_time", &self.on_time)?,
            minus: parse_count("minus", &self.minus)?,
            purchase_amount: parse_amount("purchase_amount", &self.purchase_amount)?,
            target_delivery,
            item_delay,
        })
    }
}

impl ParsedEntry {
    #[must_use]
    pub fn achievement(&self) -> f64 {
        compute_achievement(self.total_delivery_item, self.on_time)
    }

    #[must_use]
    pub fn into_record(
        self,
        supplier_name: &str,
        default_target: f64,
        default_item_delay: &str,
    ) -> SupplierRecord {
        let achievement = self.achievement();
        SupplierRecord {
            closing_month: self.closing_month,
            supplier_name: supplier_name.trim().to_string(),
            total_delivery_item: self.total_delivery_item,
            on_time: self.on_time,
            minus: self.minus,
            target_delivery: self.target_delivery.unwrap_or(default_target),
            achievement,
            purchase_amount: self.purchase_amount,
            item_delay: self
                .item_delay
                .unwrap_or_else(|| default_item_delay.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KpiSummary {
    pub record_count: usize,
    pub total_purchase: f64,
    /// `None` when there is nothing to average.
    pub mean_achievement_pct: Option<f64>,
    pub total_delivery: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormattedKpi {
    pub total_purchase: String,
    pub avg_achievement: String,
    pub total_delivery: String,
}

impl KpiSummary {
    #[must_use]
    pub fn formatted(&self) -> FormattedKpi {
        FormattedKpi {
            total_purchase: format_rupiah(self.total_purchase),
            avg_achievement: self
                .mean_achievement_pct
                .map_or_else(|| "n/a".to_string(), |pct| format!("{pct:.2}%")),
            total_delivery: format!("{} pcs", self.total_delivery),
        }
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize<'a, I>(records: I) -> KpiSummary
where
    I: IntoIterator<Item = &'a SupplierRecord>,
{
    let mut record_count = 0_usize;
    let mut total_purchase = 0.0_f64;
    let mut achievement_sum = 0.0_f64;
    let mut total_delivery = 0_u64;

    for record in records {
        record_count += 1;
        total_purchase += record.purchase_amount;
        achievement_sum += record.achievement;
        total_delivery += u64::from(record.total_delivery_item);
    }

    let mean_achievement_pct = if record_count == 0 {
        None
    } else {
        Some(achievement_sum / record_count as f64 * 100.0)
    };

    KpiSummary {
        record_count,
        total_purchase,
        mean_achievement_pct,
        total_delivery,
    }
}

/// Formats an amount as Rupiah with `.` as thousands separator, e.g.
/// `Rp 1.500.000`.
#[must_use]
pub fn format_rupiah(amount: f64) -> String {
    let rounded = amount.abs().round();
    let digits = format!("{rounded:.0}");
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if amount < 0.0 && rounded > 0.0 {
        format!("Rp -{grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

/// `0.955` -> `95.50%`.
#[must_use]
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// `0.9` -> `90%`.
#[must_use]
pub fn format_target(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chart {
    pub title: String,
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

fn chronological<'a, I>(records: I) -> Vec<&'a SupplierRecord>
where
    I: IntoIterator<Item = &'a SupplierRecord>,
{
    let mut ordered: Vec<&SupplierRecord> = records.into_iter().collect();
    ordered.sort_by_key(|record| record.closing_month);
    ordered
}

/// Delivered vs on-time items per month, oldest first.
#[must_use]
pub fn performance_chart<'a, I>(records: I) -> Chart
where
    I: IntoIterator<Item = &'a SupplierRecord>,
{
    let ordered = chronological(records);
    Chart {
        title: "Delivery and On-Time Performance (All Years)".to_string(),
        labels: ordered.iter().map(|record| record.closing_month.label()).collect(),
        series: vec![
            ChartSeries {
                name: "Total Delivery".to_string(),
                values: ordered
                    .iter()
                    .map(|record| f64::from(record.total_delivery_item))
                    .collect(),
            },
            ChartSeries {
                name: "On Time".to_string(),
                values: ordered
                    .iter()
                    .map(|record| f64::from(record.on_time))
                    .collect(),
            },
        ],
    }
}

/// Purchase amount per month, oldest first.
#[must_use]
pub fn purchasing_chart<'a, I>(records: I) -> Chart
where
    I: IntoIterator<Item = &'a SupplierRecord>,
{
    let ordered = chronological(records);
    Chart {
        title: "Monthly Purchasing Amount (All Years)".to_string(),
        labels: ordered.iter().map(|record| record.closing_month.label()).collect(),
        series: vec![ChartSeries {
            name: "Purchase Amount".to_string(),
            values: ordered.iter().map(|record| record.purchase_amount).collect(),
        }],
    }
}
