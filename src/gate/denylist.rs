//! Static per-chain denylist loaded from CSV.
//!
//! Rows are `chain_id,address` with a header line. Addresses match case-insensitively.

use crate::domain::{Address, ChainId};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DenylistError {
    #[error("failed to read denylist: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid denylist row {line}: {message}")]
    Row { line: usize, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct Denylist {
    entries: HashSet<(ChainId, Address)>,
}

impl Denylist {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (ChainId, Address)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn parse_csv(csv_bytes: &[u8]) -> Result<Self, DenylistError> {
        #[derive(Debug, serde::Deserialize)]
        struct Row {
            chain_id: u64,
            address: String,
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_bytes);

        let mut entries = HashSet::new();
        for (i, record) in reader.deserialize::<Row>().enumerate() {
            // Line numbers are 1-based and skip the header.
            let line = i + 2;
            let row = record.map_err(|e| DenylistError::Row {
                line,
                message: e.to_string(),
            })?;
            let address = Address::from_str(&row.address).map_err(|e| DenylistError::Row {
                line,
                message: format!("invalid address {}: {}", row.address, e),
            })?;
            entries.insert((ChainId::new(row.chain_id), address));
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, DenylistError> {
        let bytes = std::fs::read(path)?;
        Self::parse_csv(&bytes)
    }

    pub fn contains(&self, chain_id: ChainId, address: &Address) -> bool {
        self.entries.contains(&(chain_id, *address))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
