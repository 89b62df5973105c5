//! exgen-stores: Store backends and configuration.
//!
//! Implements the exgen-core collaborator traits over TOML catalogs, and
//! provides a failure-injecting mock store for exercising retries.

pub mod catalog;
pub mod config;
pub mod mock;

pub use catalog::CatalogStore;
pub use config::{load_config, load_config_from, open_store, ExgenConfig};
pub use mock::MockStore;
