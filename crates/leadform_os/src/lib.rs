#![forbid(unsafe_code)]

pub mod config;
pub mod notifier;
pub mod store;
