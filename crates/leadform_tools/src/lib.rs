#![forbid(unsafe_code)]

pub mod form_cli;
