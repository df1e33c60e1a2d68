#![forbid(unsafe_code)]

pub mod common;
pub mod event;
pub mod form;

pub use common::{ContractViolation, ReasonCodeId, SchemaVersion, Validate};
