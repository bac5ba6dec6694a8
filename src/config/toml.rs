//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    // Input
    if let Some(ref dir) = cli.data_dir {
        config.input.data_dir = Some(dir.clone());
    }
    if let Some(max) = cli.max_entities {
        config.input.max_entities = Some(max);
    }

    // Worker pool
    if let Some(threads) = cli.threads {
        config.workers.threads = threads;
    }
    if let Some(policy) = cli.policy {
        config.workers.policy = policy;
    }
    if let Some(chunk) = cli.chunk_size {
        config.workers.chunk_size = chunk;
    }

    // Kernel
    if let Some(group_size) = cli.group_size {
        config.kernel.group_size = group_size;
    }
    if let Some(max_groups) = cli.max_groups {
        config.kernel.max_groups = max_groups;
    }
    if let Some(layout) = cli.layout {
        config.kernel.layout = layout;
    }
    if let Some(team) = cli.team {
        config.kernel.team = team;
    }

    // Distributed: an explicit node list and local processes replace each other
    if let Some(ref nodes) = cli.nodes {
        config.distributed.nodes = nodes.clone();
        config.distributed.processes = 0;
    }
    if let Some(processes) = cli.processes {
        config.distributed.processes = processes;
        config.distributed.nodes.clear();
    }
    if let Some(gather) = cli.gather {
        config.distributed.gather = gather;
    }
    if let Some(policy) = cli.rank_policy {
        config.distributed.policy = policy;
    }

    // Output
    if let Some(top_n) = cli.top_n {
        config.output.top_n = top_n;
    }
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.quiet {
        config.output.quiet = true;
    }

    Ok(config)
}

/// Build the run configuration from the CLI, loading `--config` when given
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, base)
}
