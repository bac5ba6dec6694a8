//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! Every section has serde defaults, so a TOML file only needs the keys it
//! changes. CLI flags override file values (see [`toml::merge_cli_with_config`]).

pub mod cli;
pub mod toml;
pub mod validator;

pub use crate::distributed::GatherMode;
pub use crate::kernel::team::TeamBackend;
pub use crate::kernel::UnitLayout;
pub use crate::partition::PartitionPolicy;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub kernel: KernelConfig,
    #[serde(default)]
    pub distributed: DistributedConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Execution substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Shared-memory worker pool
    #[default]
    Threads,
    /// Coordinator plus node services
    Distributed,
    /// Block-parallel record-level kernel
    Kernel,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Threads => write!(f, "threads"),
            Backend::Distributed => write!(f, "distributed"),
            Backend::Kernel => write!(f, "kernel"),
        }
    }
}

/// Input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Directory holding one record file per entity
    pub data_dir: Option<PathBuf>,
    /// Cap on the number of entities, applied after sorting
    pub max_entities: Option<usize>,
    /// File extension to accept, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    "csv".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_entities: None,
            extension: default_extension(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Partition policy
    #[serde(default = "default_policy")]
    pub policy: PartitionPolicy,
    /// Claim granularity for dynamic and guided policies
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_threads() -> usize {
    num_cpus::get()
}

fn default_policy() -> PartitionPolicy {
    PartitionPolicy::Dynamic
}

fn default_chunk_size() -> usize {
    1
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            policy: default_policy(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Record-level kernel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Units per execution group (power of two, at most 1024)
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    /// Cap on concurrently launched groups
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,
    #[serde(default)]
    pub layout: UnitLayout,
    #[serde(default)]
    pub team: TeamBackend,
}

fn default_group_size() -> usize {
    256
}

fn default_max_groups() -> usize {
    64
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            max_groups: default_max_groups(),
            layout: UnitLayout::default(),
            team: TeamBackend::default(),
        }
    }
}

/// Distributed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedConfig {
    /// Node addresses (host:port), one per rank
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Local node services to spawn on loopback when `nodes` is empty
    #[serde(default)]
    pub processes: usize,
    #[serde(default)]
    pub gather: GatherMode,
    /// Rank ownership policy (block or cyclic)
    #[serde(default = "default_distributed_policy")]
    pub policy: PartitionPolicy,
}

fn default_distributed_policy() -> PartitionPolicy {
    PartitionPolicy::Block
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            processes: 0,
            gather: GatherMode::default(),
            policy: default_distributed_policy(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Entries per ranking table
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// JSON report path
    pub json_output: Option<PathBuf>,
    /// Suppress the text report
    #[serde(default)]
    pub quiet: bool,
}

fn default_top_n() -> usize {
    10
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            json_output: None,
            quiet: false,
        }
    }
}

impl Config {
    /// Degree of parallelism of the configured backend, for reporting
    pub fn parallelism(&self) -> usize {
        match self.backend {
            Backend::Threads => self.workers.threads,
            Backend::Distributed => {
                if self.distributed.nodes.is_empty() {
                    self.distributed.processes
                } else {
                    self.distributed.nodes.len()
                }
            }
            Backend::Kernel => self.kernel.group_size * self.kernel.max_groups,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Backend: {}", self.backend)?;
        writeln!(f, "  Input: {}", self.input)?;
        match self.backend {
            Backend::Threads => writeln!(f, "  Workers: {}", self.workers)?,
            Backend::Distributed => {
                writeln!(f, "  Distributed: {}", self.distributed)?;
                writeln!(f, "  Node workers: {}", self.workers)?;
            }
            Backend::Kernel => writeln!(f, "  Kernel: {}", self.kernel)?,
        }
        writeln!(f, "  Output: {}", self.output)?;
        Ok(())
    }
}

impl fmt::Display for InputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data_dir {
            Some(dir) => write!(f, "{}", dir.display())?,
            None => write!(f, "<none>")?,
        }
        write!(f, " (*.{})", self.extension)?;
        if let Some(max) = self.max_entities {
            write!(f, ", max_entities={}", max)?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} thread(s), policy={}", self.threads, self.policy)?;
        if matches!(self.policy, PartitionPolicy::Dynamic | PartitionPolicy::Guided) {
            write!(f, ", chunk_size={}", self.chunk_size)?;
        }
        Ok(())
    }
}

impl fmt::Display for KernelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group_size={}, max_groups={}, layout={:?}, team={}",
            self.group_size,
            self.max_groups,
            self.layout,
            self.team.as_str()
        )
    }
}

impl fmt::Display for DistributedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            write!(f, "{} local process(es)", self.processes)?;
        } else {
            write!(f, "nodes=[{}]", self.nodes.join(", "))?;
        }
        write!(f, ", policy={}, gather={}", self.policy, self.gather.as_str())
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "top_n={}", self.top_n)?;
        if let Some(ref path) = self.json_output {
            write!(f, ", json={}", path.display())?;
        }
        if self.quiet {
            write!(f, ", quiet")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Threads);
        assert_eq!(config.input.extension, "csv");
        assert!(config.workers.threads >= 1);
        assert_eq!(config.workers.policy, PartitionPolicy::Dynamic);
        assert_eq!(config.workers.chunk_size, 1);
        assert_eq!(config.kernel.group_size, 256);
        assert_eq!(config.kernel.max_groups, 64);
        assert_eq!(config.kernel.layout, UnitLayout::Strided);
        assert_eq!(config.kernel.team, TeamBackend::Serial);
        assert_eq!(config.distributed.policy, PartitionPolicy::Block);
        assert_eq!(config.distributed.gather, GatherMode::Blocking);
        assert_eq!(config.output.top_n, 10);
        assert!(!config.output.quiet);
    }

    #[test]
    fn test_parallelism() {
        let mut config = Config::default();
        config.workers.threads = 6;
        assert_eq!(config.parallelism(), 6);

        config.backend = Backend::Distributed;
        config.distributed.processes = 3;
        assert_eq!(config.parallelism(), 3);
        config.distributed.nodes = vec!["a:1".into(), "b:1".into()];
        assert_eq!(config.parallelism(), 2);

        config.backend = Backend::Kernel;
        config.kernel.group_size = 32;
        config.kernel.max_groups = 4;
        assert_eq!(config.parallelism(), 128);
    }

    #[test]
    fn test_display() {
        let mut config = Config::default();
        config.input.data_dir = Some(PathBuf::from("/data/cities"));
        config.workers.threads = 4;
        let text = config.to_string();
        assert!(text.contains("Backend: threads"));
        assert!(text.contains("/data/cities (*.csv)"));
        assert!(text.contains("4 thread(s), policy=dynamic, chunk_size=1"));
    }
}
