pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod metrics;
pub mod store;
