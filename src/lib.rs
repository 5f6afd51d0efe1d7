pub mod calendar;
pub mod config;
pub mod error;
pub mod export;
pub mod fake_provider;
pub mod http_client;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod provider;
pub mod settlement;
pub mod sofascore;
pub mod stats;
pub mod store;
pub mod tracker;
