// src/core/mod.rs — Meeting engine core

pub mod chain;
pub mod cost;
pub mod executor;
pub mod mood;
pub mod prompt;
pub mod registry;
pub mod types;
