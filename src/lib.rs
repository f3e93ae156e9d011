pub mod alerts;
pub mod api;
pub mod catalog;
pub mod config;
pub mod humanize;
pub mod imaging;
pub mod inference;
pub mod ingest;
pub mod ledger;
pub mod observability;
pub mod pipeline;
pub mod queue;
pub mod storage;
pub mod worker;
