//! Configuration validation

use super::*;
use crate::kernel::MAX_GROUP_SIZE;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_input(&config.input)?;
    validate_workers(&config.workers)?;
    validate_output(&config.output)?;

    match config.backend {
        Backend::Threads => {}
        Backend::Kernel => validate_kernel(&config.kernel)?,
        Backend::Distributed => validate_distributed(&config.distributed)?,
    }

    Ok(())
}

/// Validate input configuration
pub fn validate_input(input: &InputConfig) -> Result<()> {
    if input.data_dir.is_none() {
        anyhow::bail!("No data directory specified (pass DATA_DIR or set input.data_dir)");
    }
    if input.max_entities == Some(0) {
        anyhow::bail!("max_entities must be at least 1");
    }
    if input.extension.is_empty() || input.extension.starts_with('.') {
        anyhow::bail!("extension must be non-empty and given without a dot, got '{}'", input.extension);
    }
    Ok(())
}

/// Validate worker pool configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.threads == 0 {
        anyhow::bail!("threads must be at least 1");
    }
    if workers.chunk_size == 0 {
        anyhow::bail!("chunk_size must be at least 1");
    }
    Ok(())
}

/// Validate kernel configuration
pub fn validate_kernel(kernel: &KernelConfig) -> Result<()> {
    if !kernel.group_size.is_power_of_two() || kernel.group_size > MAX_GROUP_SIZE {
        anyhow::bail!(
            "group_size must be a power of two between 1 and {}, got {}",
            MAX_GROUP_SIZE,
            kernel.group_size
        );
    }
    if kernel.max_groups == 0 {
        anyhow::bail!("max_groups must be at least 1");
    }
    Ok(())
}

/// Validate distributed configuration
pub fn validate_distributed(distributed: &DistributedConfig) -> Result<()> {
    if distributed.nodes.is_empty() && distributed.processes == 0 {
        anyhow::bail!("Distributed backend needs --nodes or --processes");
    }
    if !distributed.policy.is_deterministic() {
        anyhow::bail!(
            "Distributed rank policy must be block or cyclic, got '{}'",
            distributed.policy
        );
    }
    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if output.top_n == 0 {
        anyhow::bail!("top_n must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.input.data_dir = Some(PathBuf::from("/data"));
        config
    }

    #[test]
    fn test_valid_default() {
        validate_config(&valid()).unwrap();
    }

    #[test]
    fn test_missing_data_dir() {
        assert!(validate_config(&Config::default()).is_err());
    }

    #[test]
    fn test_zero_threads_and_chunk() {
        let mut config = valid();
        config.workers.threads = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.workers.chunk_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_group_size_rules() {
        let mut config = valid();
        config.backend = Backend::Kernel;

        for ok in [1, 32, 256, 1024] {
            config.kernel.group_size = ok;
            validate_config(&config).unwrap();
        }
        for bad in [0, 3, 100, 2048] {
            config.kernel.group_size = bad;
            assert!(validate_config(&config).is_err(), "group_size {bad} accepted");
        }

        config.kernel.group_size = 64;
        config.kernel.max_groups = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_kernel_rules_only_apply_to_kernel_backend() {
        let mut config = valid();
        config.kernel.group_size = 3;
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_distributed_rules() {
        let mut config = valid();
        config.backend = Backend::Distributed;
        assert!(validate_config(&config).is_err());

        config.distributed.processes = 2;
        validate_config(&config).unwrap();

        config.distributed.policy = PartitionPolicy::Guided;
        assert!(validate_config(&config).is_err());

        config.distributed.policy = PartitionPolicy::Cyclic;
        config.distributed.processes = 0;
        config.distributed.nodes = vec!["127.0.0.1:9999".into()];
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_top_n_zero() {
        let mut config = valid();
        config.output.top_n = 0;
        assert!(validate_config(&config).is_err());
    }
}
