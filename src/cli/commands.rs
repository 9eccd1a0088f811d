//! CLI command definitions

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Create `.agent/` and generate the step specifications
#[derive(Debug, Args, Clone)]
pub struct InitCommand {
    /// Problem the project should solve
    pub problem: String,

    /// Directory holding `<template>.md` guideline files
    #[arg(long)]
    pub template_dir: Option<PathBuf>,

    /// Replace an existing project
    #[arg(long)]
    pub force: bool,
}

/// Generate a plan for a step and materialize its file actions
#[derive(Debug, Args, Clone)]
pub struct GenerateCommand {
    /// Step to run; defaults to the step after `current_step`
    pub step: Option<String>,

    /// Write new files instead of listing them for review
    #[arg(long)]
    pub apply: bool,

    /// Where files are materialized (default: `<agent_dir>/outputs`)
    #[arg(long)]
    pub target_dir: Option<PathBuf>,

    /// Don't record the run in history
    #[arg(long)]
    pub no_history: bool,
}

/// Read or change the project configuration
#[derive(Debug, Args, Clone)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ConfigAction {
    /// Show every key
    List,

    /// Show one key
    Get { key: String },

    /// Change `model` or `current_step`
    Set { key: String, value: String },
}

/// List the step catalog
#[derive(Debug, Args, Clone)]
pub struct StepsCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show recorded runs
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Only runs of this step
    #[arg(short, long)]
    pub step: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Serve the pipeline over stdio JSON-RPC
#[derive(Debug, Args, Clone)]
pub struct ServeCommand {}
