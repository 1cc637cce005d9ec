pub mod config;
pub mod humanize;
pub mod observability;
pub mod proto;
pub mod queue;
pub mod storage;
