//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ConfigCommand, GenerateCommand, HistoryCommand, InitCommand, ServeCommand, StepsCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Step-by-step project generator driven by a language model
#[derive(Debug, Parser, Clone)]
#[command(name = "stepgen")]
#[command(version)]
#[command(about = "A step-by-step, LLM-assisted project generator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Project root containing the agent directory
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Path to the settings YAML file
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Model to use instead of the configured one
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Gemini API key
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Initialize a project
    Init(InitCommand),

    /// Run a step
    Generate(GenerateCommand),

    /// Read or change the project configuration
    Config(ConfigCommand),

    /// List the steps
    Steps(StepsCommand),

    /// Show run history
    History(HistoryCommand),

    /// Serve over stdio JSON-RPC
    Serve(ServeCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
