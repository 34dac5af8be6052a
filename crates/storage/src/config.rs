//! Table configuration.

use crate::error::{Result, StorageError};
use crate::node::INTERNAL_NODE_MAX_KEYS;

/// Fixed maximum number of pages a table file may hold, header page included.
pub const TABLE_MAX_PAGES: u32 = 100;

/// Tunables for an open table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    /// Upper bound on the page count. Allocating past it fails with `TableFull`.
    pub max_pages: u32,
    /// Keys an internal node may hold before it splits. Lowering it below the
    /// layout maximum forces taller trees without changing the file format.
    pub internal_max_keys: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_pages: TABLE_MAX_PAGES,
            internal_max_keys: INTERNAL_NODE_MAX_KEYS,
        }
    }
}

impl TableConfig {
    /// Check the bounds the engine relies on.
    pub fn validate(&self) -> Result<()> {
        // header page + root leaf
        if self.max_pages < 2 {
            return Err(StorageError::InvalidConfig(format!(
                "max_pages must be at least 2, got {}",
                self.max_pages
            )));
        }
        if !(2..=INTERNAL_NODE_MAX_KEYS).contains(&self.internal_max_keys) {
            return Err(StorageError::InvalidConfig(format!(
                "internal_max_keys must be in 2..={}, got {}",
                INTERNAL_NODE_MAX_KEYS, self.internal_max_keys
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TableConfig::default();
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.internal_max_keys, 510);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_values() {
        let too_few_pages = TableConfig {
            max_pages: 1,
            ..TableConfig::default()
        };
        assert!(matches!(
            too_few_pages.validate(),
            Err(StorageError::InvalidConfig(_))
        ));

        let fan_out_too_small = TableConfig {
            internal_max_keys: 1,
            ..TableConfig::default()
        };
        assert!(fan_out_too_small.validate().is_err());

        let fan_out_too_large = TableConfig {
            internal_max_keys: INTERNAL_NODE_MAX_KEYS + 1,
            ..TableConfig::default()
        };
        assert!(fan_out_too_large.validate().is_err());
    }
}
