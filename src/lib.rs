// src/lib.rs — Library root for shaderloop

pub mod cli;
pub mod core;
pub mod evaluator;
pub mod history;
pub mod infra;
pub mod parser;
pub mod provider;
pub mod render;
pub mod util;
