// src/core/mod.rs — Core iteration engine

pub mod controller;
pub mod eval_cache;
pub mod request;
pub mod session;
pub mod system_prompt;
pub mod types;
