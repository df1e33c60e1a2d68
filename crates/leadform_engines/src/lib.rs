#![forbid(unsafe_code)]

pub mod canonical;
pub mod cookie;
pub mod hasher;
pub mod identity;
