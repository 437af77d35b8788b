pub mod api;
pub mod breakdown;
pub mod chain;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gate;
pub mod metadata;
pub mod orchestration;

pub use chain::{ChainClient, ChainError, JsonRpcChainClient, MockChainClient};
pub use config::Config;
pub use db::{init_db, EntityStore, MemoryStore, Repository, StoreError};
pub use domain::{Address, BlockNumber, ChainId, Decimal, Timestamp, U256};
pub use error::AppError;
pub use metadata::{BeefyApiClient, StaticMetadataSource, VaultCatalog};
pub use orchestration::{BreakdownOrchestrator, ClockScheduler, TransferProcessor};
