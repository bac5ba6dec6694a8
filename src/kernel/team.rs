//! Execution groups
//!
//! An execution group is a fixed-size cohort of units that share a scratch
//! buffer (one accumulator per unit) and a barrier. Running one group means:
//!
//! 1. every unit folds its own records into its scratch slot
//! 2. tournament reduction: for `half = size/2, size/4, ..., 1`, unit `i`
//!    with `i < half` merges slot `i + half` into slot `i`, and no unit
//!    starts the next step before every unit finished the current one
//! 3. unit 0 publishes slot 0 into the global atomic accumulator
//!
//! Two backends implement this with the same merge order:
//!
//! - [`SerialTeam`]: one thread steps through all units in lockstep
//! - [`ThreadTeam`]: one OS thread per unit, synchronised by a `Barrier`
//!
//! Group sizes must be powers of two (1 counts).

use crate::stats::atomic::AtomicStatAccumulator;
use crate::stats::StatAccumulator;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::{Barrier, Mutex, PoisonError};

/// Produces the private accumulator of one unit, given its lane in the group
pub type UnitFold<'a> = dyn Fn(usize) -> StatAccumulator + Sync + 'a;

/// Runs one execution group
pub trait Team: Sync {
    /// Fold, tree-reduce and publish one group
    ///
    /// # Arguments
    ///
    /// * `group_size` - Number of units, a power of two
    /// * `fold_unit` - Private reduction of one unit, by lane
    /// * `global` - Accumulator shared by every group of the launch
    ///
    /// # Returns
    ///
    /// The group's combined accumulator (the value unit 0 published).
    fn run_group(&self, group_size: usize, fold_unit: &UnitFold<'_>, global: &AtomicStatAccumulator) -> StatAccumulator;
}

/// Team backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TeamBackend {
    #[default]
    Serial,
    Threads,
}

const TEAMS: [&dyn Team; 2] = [&SerialTeam, &ThreadTeam];

impl TeamBackend {
    pub fn team(self) -> &'static dyn Team {
        TEAMS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TeamBackend::Serial => "serial",
            TeamBackend::Threads => "threads",
        }
    }
}

/// Tournament reduction over a group's scratch buffer
///
/// After the call `scratch[0]` holds the combine of every slot. The merge
/// order is fixed by the buffer length alone.
pub fn tournament_reduce(scratch: &mut [StatAccumulator]) {
    debug_assert!(scratch.len().is_power_of_two());
    let mut half = scratch.len() / 2;
    while half > 0 {
        let (left, right) = scratch.split_at_mut(half);
        for (l, r) in left.iter_mut().zip(right.iter()) {
            l.merge(r);
        }
        half /= 2;
    }
}

/// All units of a group simulated on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialTeam;

impl Team for SerialTeam {
    fn run_group(&self, group_size: usize, fold_unit: &UnitFold<'_>, global: &AtomicStatAccumulator) -> StatAccumulator {
        let mut scratch: Vec<StatAccumulator> = (0..group_size).map(fold_unit).collect();
        tournament_reduce(&mut scratch);

        let combined = scratch.first().copied().unwrap_or_default();
        global.combine_from(&combined);
        combined
    }
}

/// One OS thread per unit
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadTeam;

impl Team for ThreadTeam {
    fn run_group(&self, group_size: usize, fold_unit: &UnitFold<'_>, global: &AtomicStatAccumulator) -> StatAccumulator {
        let scratch: Vec<Mutex<StatAccumulator>> = (0..group_size).map(|_| Mutex::new(StatAccumulator::new())).collect();
        let barrier = Barrier::new(group_size);

        let read = |slot: usize| *scratch[slot].lock().unwrap_or_else(PoisonError::into_inner);

        std::thread::scope(|s| {
            for lane in 0..group_size {
                let scratch = &scratch;
                let barrier = &barrier;
                let read = &read;
                s.spawn(move || {
                    let local = fold_unit(lane);
                    *scratch[lane].lock().unwrap_or_else(PoisonError::into_inner) = local;
                    barrier.wait();

                    let mut half = group_size / 2;
                    while half > 0 {
                        if lane < half {
                            let peer = read(lane + half);
                            scratch[lane]
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .merge(&peer);
                        }
                        barrier.wait();
                        half /= 2;
                    }

                    if lane == 0 {
                        global.combine_from(&read(0));
                    }
                });
            }
        });

        read(0)
    }
}
