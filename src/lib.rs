// src/lib.rs

pub mod config;
pub mod error;
pub mod fetch;
pub mod notify;
pub mod orchestrator;
pub mod publish;
pub mod transform;
