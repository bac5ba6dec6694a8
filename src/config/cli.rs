//! CLI argument parsing using clap

use super::{Backend, GatherMode, PartitionPolicy, TeamBackend, UnitLayout};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Standalone mode (default) - run the configured backend and report
    Standalone,
    /// Service mode - run a node service (accepts coordinator assignments)
    Service,
}

/// wxreduce - parallel per-entity weather statistics
#[derive(Parser, Debug)]
#[command(name = "wxreduce")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: standalone or service
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: ExecutionMode,

    /// Port for service to listen on (service mode only)
    #[arg(long, default_value = "9999")]
    pub listen_port: u16,

    /// Directory with one CSV file per entity
    ///
    /// Not required in service mode (coordinator sends the work items)
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Maximum number of entities to process
    #[arg(long)]
    pub max_entities: Option<usize>,

    // === Backend Options ===
    /// Execution backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Number of worker threads (threads backend, and per node in distributed mode)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Partition policy for the worker pool
    #[arg(long, value_enum)]
    pub policy: Option<PartitionPolicy>,

    /// Claim granularity for dynamic and guided policies
    #[arg(long)]
    pub chunk_size: Option<usize>,

    // === Kernel Options ===
    /// Units per execution group (power of two, at most 1024)
    #[arg(long)]
    pub group_size: Option<usize>,

    /// Maximum concurrently launched execution groups
    #[arg(long)]
    pub max_groups: Option<usize>,

    /// How records are spread over kernel units
    #[arg(long, value_enum)]
    pub layout: Option<UnitLayout>,

    /// Execution group backend
    #[arg(long, value_enum)]
    pub team: Option<TeamBackend>,

    // === Distributed Options ===
    /// Comma-separated node addresses (e.g., "10.0.1.10:9999,10.0.1.11:9999")
    #[arg(long, value_delimiter = ',')]
    pub nodes: Option<Vec<String>>,

    /// Spawn this many local node services instead of connecting to --nodes
    #[arg(long)]
    pub processes: Option<usize>,

    /// Gather mode for collecting node results
    #[arg(long, value_enum)]
    pub gather: Option<GatherMode>,

    /// Rank ownership policy across nodes (block or cyclic)
    #[arg(long, value_enum)]
    pub rank_policy: Option<PartitionPolicy>,

    // === Output Options ===
    /// Entries per ranking table
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Write a JSON report to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Suppress the text report
    #[arg(short = 'q', long)]
    pub quiet: bool,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments that do not depend on the config file
    pub fn validate(&self) -> anyhow::Result<()> {
        // Service mode doesn't need validation (coordinator sends assignments)
        if self.mode == ExecutionMode::Service {
            return Ok(());
        }

        if self.threads == Some(0) {
            anyhow::bail!("threads must be at least 1");
        }
        if self.chunk_size == Some(0) {
            anyhow::bail!("chunk_size must be at least 1");
        }
        if self.nodes.is_some() && self.processes.is_some() {
            anyhow::bail!("--nodes and --processes are mutually exclusive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "wxreduce",
            "/data/cities",
            "--backend",
            "kernel",
            "-t",
            "8",
            "--policy",
            "guided",
            "--group-size",
            "128",
            "--layout",
            "chunked",
            "--team",
            "threads",
            "--top-n",
            "5",
            "--quiet",
        ])
        .unwrap();

        assert_eq!(cli.mode, ExecutionMode::Standalone);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/data/cities")));
        assert_eq!(cli.backend, Some(Backend::Kernel));
        assert_eq!(cli.threads, Some(8));
        assert_eq!(cli.policy, Some(PartitionPolicy::Guided));
        assert_eq!(cli.group_size, Some(128));
        assert_eq!(cli.layout, Some(UnitLayout::Chunked));
        assert_eq!(cli.team, Some(TeamBackend::Threads));
        assert_eq!(cli.top_n, Some(5));
        assert!(cli.quiet);
        cli.validate().unwrap();
    }

    #[test]
    fn test_parse_nodes_list() {
        let cli = Cli::try_parse_from([
            "wxreduce",
            "data",
            "--backend",
            "distributed",
            "--nodes",
            "10.0.0.1:9999,10.0.0.2:9999",
            "--gather",
            "nonblocking",
            "--rank-policy",
            "cyclic",
        ])
        .unwrap();

        assert_eq!(
            cli.nodes,
            Some(vec!["10.0.0.1:9999".to_string(), "10.0.0.2:9999".to_string()])
        );
        assert_eq!(cli.gather, Some(GatherMode::Nonblocking));
        assert_eq!(cli.rank_policy, Some(PartitionPolicy::Cyclic));
    }

    #[test]
    fn test_service_mode() {
        let cli = Cli::try_parse_from(["wxreduce", "--mode", "service", "--listen-port", "7000"]).unwrap();
        assert_eq!(cli.mode, ExecutionMode::Service);
        assert_eq!(cli.listen_port, 7000);
        assert!(cli.data_dir.is_none());
        cli.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let cli = Cli::try_parse_from(["wxreduce", "data", "-t", "0"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["wxreduce", "data", "--nodes", "a:1", "--processes", "2"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
