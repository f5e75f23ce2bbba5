// src/cli/mod.rs — CLI definition (clap derive)

pub mod config;
pub mod generate;
pub mod history;
pub mod parse;
pub mod progress;
pub mod session;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shaderloop",
    about = "Generate, evaluate and refine fragment shaders",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a model reply into commentary and shader source
    Parse {
        /// File to read (stdin when omitted)
        file: Option<String>,
    },
    /// Send one generation request and print the parsed shader
    Generate {
        /// What the shader should look like
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,

        /// Print the raw reply instead of the parsed source
        #[arg(long)]
        raw: bool,
    },
    /// Show iteration history
    History {
        /// Include intermediate automatic retries
        #[arg(long)]
        all: bool,

        /// Show only the last N records
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print the resolved configuration as TOML
    Config,
}
