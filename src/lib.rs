// src/lib.rs — Library root for Roundtable

pub mod api;
pub mod broadcast;
pub mod cli;
pub mod core;
pub mod infra;
pub mod persist;
pub mod provider;
pub mod report;
