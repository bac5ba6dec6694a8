//! Block-parallel record reduction
//!
//! This is the record-level regime: many units reduce records of the *same*
//! entity and their partial accumulators are combined in two stages.
//!
//! # Launch geometry
//!
//! For `n` records and a group size `G`:
//!
//! ```text
//! needed   = ceil(n / G)
//! groups   = min(needed, max_groups)
//! units    = groups * G
//! ```
//!
//! `max_groups` is a throughput cap. When `needed > max_groups` the launched
//! groups cover the excess records by grid-stride re-use instead of
//! launching more groups.
//!
//! # Unit layouts
//!
//! - **strided**: unit `u` handles records `u, u + units, u + 2*units, ...`
//! - **chunked**: unit `u` handles one contiguous run of `ceil(n / units)`
//!   records
//!
//! # Combination
//!
//! Inside a group the partials meet in a tournament reduction
//! ([`team::tournament_reduce`]). Unit 0 of every group then folds the group
//! result into one [`AtomicStatAccumulator`] shared by the whole launch.
//! Groups are dispatched on the rayon pool.

pub mod team;

use crate::collector::{EntityResult, ResultCollector};
use crate::config::KernelConfig;
use crate::error::ReduceError;
use crate::partition::block::block_range;
use crate::reduce::LocalReducer;
use crate::source::{Record, RecordSource, WorkItem};
use crate::stats::atomic::AtomicStatAccumulator;
use crate::stats::StatAccumulator;
use crate::Result;
use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Largest supported execution group
pub const MAX_GROUP_SIZE: usize = 1024;

/// How records are spread over the units of a launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnitLayout {
    #[default]
    Strided,
    Chunked,
}

/// Geometry of one kernel launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub records: usize,
    pub group_size: usize,
    /// Groups the record count would need without the cap
    pub needed_groups: usize,
    /// Groups actually launched
    pub groups: usize,
}

impl LaunchGeometry {
    /// Compute the geometry for `records` records
    ///
    /// # Errors
    ///
    /// [`ReduceError::InvalidLaunch`] when the group size is zero, not a
    /// power of two or above [`MAX_GROUP_SIZE`], or when `max_groups` is zero.
    pub fn new(records: usize, group_size: usize, max_groups: usize) -> std::result::Result<Self, ReduceError> {
        if group_size == 0 || !group_size.is_power_of_two() || group_size > MAX_GROUP_SIZE {
            return Err(ReduceError::InvalidLaunch(format!(
                "group size {group_size} must be a power of two between 1 and {MAX_GROUP_SIZE}"
            )));
        }
        if max_groups == 0 {
            return Err(ReduceError::InvalidLaunch("max_groups must be at least 1".to_string()));
        }

        let needed_groups = records.div_ceil(group_size);
        Ok(Self {
            records,
            group_size,
            needed_groups,
            groups: needed_groups.min(max_groups),
        })
    }

    pub fn total_units(&self) -> usize {
        self.groups * self.group_size
    }

    /// True when the cap forced groups to be re-used
    pub fn is_capped(&self) -> bool {
        self.needed_groups > self.groups
    }
}

/// Indices of the records handled by `unit`
pub fn unit_records(layout: UnitLayout, geometry: &LaunchGeometry, unit: usize) -> std::iter::StepBy<std::ops::Range<usize>> {
    let units = geometry.total_units().max(1);
    match layout {
        UnitLayout::Strided => (unit.min(geometry.records)..geometry.records).step_by(units),
        UnitLayout::Chunked => block_range(unit, geometry.records, units).step_by(1),
    }
}

/// Result of one launch
#[derive(Debug, Clone, Copy)]
pub struct KernelOutcome {
    pub stats: StatAccumulator,
    pub geometry: LaunchGeometry,
}

/// Reduce one entity's records with the record-level regime
///
/// Zero records yield the identity accumulator without launching anything.
pub fn launch(records: &[Record], config: &KernelConfig) -> std::result::Result<KernelOutcome, ReduceError> {
    let geometry = LaunchGeometry::new(records.len(), config.group_size, config.max_groups)?;
    if geometry.groups == 0 {
        return Ok(KernelOutcome {
            stats: StatAccumulator::new(),
            geometry,
        });
    }

    debug!(
        records = geometry.records,
        group_size = geometry.group_size,
        groups = geometry.groups,
        capped = geometry.is_capped(),
        "kernel launch"
    );

    let global = AtomicStatAccumulator::new();
    let team = config.team.team();
    let layout = config.layout;

    (0..geometry.groups).into_par_iter().for_each(|group| {
        let fold_unit = |lane: usize| {
            let unit = group * geometry.group_size + lane;
            let mut reducer = LocalReducer::new();
            for index in unit_records(layout, &geometry, unit) {
                reducer.push(&records[index]);
            }
            reducer.finish()
        };
        team.run_group(geometry.group_size, &fold_unit, &global);
    });

    Ok(KernelOutcome {
        stats: global.snapshot(),
        geometry,
    })
}

/// Kernel backend: every entity reduced by its own launch
#[derive(Debug, Clone)]
pub struct KernelBackend {
    config: KernelConfig,
}

impl KernelBackend {
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    /// Reduce every work item, one launch per entity
    ///
    /// # Returns
    ///
    /// Results in work-item order. Unreadable items degrade to the identity.
    pub fn run<S>(&self, items: &[WorkItem], source: &S) -> Result<Vec<EntityResult>>
    where
        S: RecordSource + ?Sized,
    {
        // Validate geometry once up front so a bad config fails before any I/O
        LaunchGeometry::new(0, self.config.group_size, self.config.max_groups)?;

        info!(
            items = items.len(),
            group_size = self.config.group_size,
            max_groups = self.config.max_groups,
            team = self.config.team.as_str(),
            "starting kernel backend"
        );

        let collector = ResultCollector::per_item(items.len())?;
        let start = Instant::now();

        for item in items {
            let records: Vec<Record> = match source.records(item) {
                Ok(stream) => stream.collect(),
                Err(e) => {
                    warn!(entity = %item.entity, error = %e, "skipping unreadable work item");
                    Vec::new()
                }
            };
            let outcome = launch(&records, &self.config)?;
            collector.place(item.index, 0, EntityResult::new(item.entity.clone(), outcome.stats))?;
        }

        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "kernel backend finished");
        Ok(collector.finish()?)
    }
}
