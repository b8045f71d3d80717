use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use supplier_ledger_core::{LedgerError, DEFAULT_TARGET_DELIVERY};

pub const DEFAULT_FILE_PREFIX: &str = "data_";
pub const DEFAULT_FILE_EXTENSION: &str = "csv";

/// Where partitions live and how they are named. Injected at construction;
/// there is no process-wide default location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub file_prefix: String,
    pub file_extension: String,
    /// Fraction applied to new entries without an explicit target.
    pub target_delivery: f64,
}

impl StoreConfig {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            target_delivery: DEFAULT_TARGET_DELIVERY,
        }
    }

    #[must_use]
    pub fn with_target_delivery(mut self, target_delivery: f64) -> Self {
        self.target_delivery = target_delivery;
        self
    }

    /// Validates naming and policy values.
    ///
    /// # Errors
    /// Returns [`LedgerError::Configuration`] when the prefix or extension
    /// is empty or contains path separators, or when the target is outside
    /// [0.0, 1.0].
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.file_prefix.is_empty() {
            return Err(LedgerError::Configuration(
                "file_prefix MUST NOT be empty".to_string(),
            ));
        }

        if self.file_extension.is_empty() || self.file_extension.starts_with('.') {
            return Err(LedgerError::Configuration(
                "file_extension MUST be non-empty and given without a leading dot".to_string(),
            ));
        }

        for (name, value) in [
            ("file_prefix", &self.file_prefix),
            ("file_extension", &self.file_extension),
        ] {
            if value.contains(['/', '\\']) {
                return Err(LedgerError::Configuration(format!(
                    "{name} MUST NOT contain path separators"
                )));
            }
        }

        if !self.target_delivery.is_finite() || !(0.0..=1.0).contains(&self.target_delivery) {
            return Err(LedgerError::Configuration(
                "target_delivery MUST be in [0.0, 1.0]".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StoreConfig::new("/tmp/ledger");
        assert!(config.validate().is_ok());
        assert_eq!(config.file_prefix, "data_");
        assert_eq!(config.file_extension, "csv");
    }

    #[test]
    fn rejects_out_of_range_target() {
        let config = StoreConfig::new("/tmp/ledger").with_target_delivery(1.5);
        assert!(matches!(
            config.validate(),
            Err(LedgerError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_path_separators_and_dotted_extension() {
        let mut config = StoreConfig::new("/tmp/ledger");
        config.file_prefix = "../data_".to_string();
        assert!(config.validate().is_err());

        let mut config = StoreConfig::new("/tmp/ledger");
        config.file_extension = ".csv".to_string();
        assert!(config.validate().is_err());
    }
}
