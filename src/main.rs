//! wxreduce CLI entry point

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use wxreduce::collector::EntityResult;
use wxreduce::config::cli::{Cli, ExecutionMode};
use wxreduce::config::{toml::load_config, validator::validate_config, Backend, Config};
use wxreduce::distributed::{spawn_local_nodes, DistributedCoordinator, NodeService};
use wxreduce::kernel::KernelBackend;
use wxreduce::output::{json::write_json_report, text::print_report, RunInfo};
use wxreduce::partition::PartitionPlanner;
use wxreduce::source::csv::CsvRecordSource;
use wxreduce::source::discovery::discover;
use wxreduce::source::WorkItem;
use wxreduce::util::logging::init_logging;
use wxreduce::worker::WorkerPool;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug)?;
    cli.validate()?;

    match cli.mode {
        ExecutionMode::Standalone => run_standalone(&cli),
        ExecutionMode::Service => run_service(&cli),
    }
}

/// Reduce a data directory with the configured backend and report
fn run_standalone(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    validate_config(&config).context("Configuration validation failed")?;

    if !config.output.quiet {
        print!("{config}");
        println!();
    }

    if cli.dry_run {
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let data_dir = config
        .input
        .data_dir
        .as_deref()
        .context("No data directory specified")?;
    let items = discover(data_dir, &config.input.extension, config.input.max_entities)?;
    info!(
        backend = %config.backend,
        entities = items.len(),
        parallelism = config.parallelism(),
        "starting reduction"
    );

    let start = Instant::now();
    let results = match config.backend {
        Backend::Threads => run_threads(&config, items)?,
        Backend::Distributed => run_distributed(&config, items, cli.listen_port)?,
        Backend::Kernel => KernelBackend::new(config.kernel.clone()).run(&items, &CsvRecordSource::new())?,
    };
    let run = RunInfo::new(config.backend, config.parallelism(), start.elapsed());
    info!(
        entities = results.len(),
        elapsed_ms = run.elapsed.as_millis() as u64,
        "reduction complete"
    );

    if !config.output.quiet {
        print_report(&results, config.output.top_n, run);
    }
    if let Some(ref path) = config.output.json_output {
        write_json_report(path, &results, run)?;
        info!(path = %path.display(), "JSON report written");
    }

    Ok(())
}

fn run_threads(config: &Config, items: Vec<WorkItem>) -> Result<Vec<EntityResult>> {
    let planner = PartitionPlanner::new(config.workers.policy, config.workers.threads, config.workers.chunk_size);
    let outcome = WorkerPool::new(planner).run(Arc::new(items), Arc::new(CsvRecordSource::new()))?;
    for report in &outcome.reports {
        debug!(
            worker = report.worker_id,
            items = report.items.len(),
            records = report.records,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "worker finished"
        );
    }
    Ok(outcome.results)
}

fn run_distributed(config: &Config, items: Vec<WorkItem>, default_port: u16) -> Result<Vec<EntityResult>> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(gather_distributed(config, items, default_port))
}

async fn gather_distributed(config: &Config, items: Vec<WorkItem>, default_port: u16) -> Result<Vec<EntityResult>> {
    let (addresses, local_nodes) = if config.distributed.nodes.is_empty() {
        spawn_local_nodes(config.distributed.processes).await?
    } else {
        let addresses: Vec<String> = config
            .distributed
            .nodes
            .iter()
            .map(|addr| normalize_node_address(addr, default_port))
            .collect();
        (addresses, Vec::new())
    };

    let coordinator = DistributedCoordinator::new(addresses, &config.distributed, &config.workers)?;
    let outcome = coordinator.run(items).await;

    for handle in &local_nodes {
        handle.abort();
    }

    let outcome = outcome?;
    for node in &outcome.nodes {
        debug!(
            rank = node.rank,
            node_id = %node.node_id,
            results = node.local_count,
            elapsed_ms = node.duration.as_millis() as u64,
            "node finished"
        );
    }
    Ok(outcome.results)
}

/// Run as a node service, accepting coordinator assignments
fn run_service(cli: &Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let service = NodeService::bind(&format!("0.0.0.0:{}", cli.listen_port))
            .await
            .context("Failed to create node service")?;

        service.run().await
    })
}

/// Append the default port when a node address has none
fn normalize_node_address(addr: &str, default_port: u16) -> String {
    let addr = addr.trim();
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{addr}:{default_port}")
    }
}
