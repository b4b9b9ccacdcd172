use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::cache::CacheSim;
use crate::config::{CacheKind, SimulationConfig};
use crate::error::{ConfigError, TraceError};
use crate::trace::{records, TraceRecord};
use crate::transaction::AccessType;

/// The simulator feeds a trace through a set of independent caches, one step per record.
///
/// It supports calling simulate multiple times, continuing from where the previous call stopped,
/// and can step backwards through the most recent records
pub struct Simulator {
    caches: Vec<CacheSim>,
    step: u64,
    simulation_time: Duration,
}

/// The result of a simulation. Can be serialised to the output format
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SimulationResult {
    pub caches: Vec<CacheResult>,
}

/// The result for an individual cache
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CacheResult {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub reads: u64,
    pub writes: u64,
    pub writebacks: u64,
}

impl From<&CacheSim> for CacheResult {
    fn from(cache: &CacheSim) -> Self {
        let stats = cache.get_stats();
        Self {
            name: cache.get_config().name.clone(),
            hits: stats.hits,
            misses: stats.misses,
            reads: stats.reads,
            writes: stats.writes,
            writebacks: stats.writebacks,
        }
    }
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A simulation configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, ConfigError>
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let caches = config
            .caches
            .iter()
            .map(|cache| {
                let mut cache = CacheSim::new(cache.clone())?;
                cache.set_undo_depth(config.undo_depth);
                // Only the steps which can still be reversed need their statistics
                cache.set_statistics_depth(Some(config.undo_depth));
                Ok(cache)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            caches,
            step: 0,
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Plays one trace record as the next step. Data caches see the data access, instruction
    /// caches the fetch of the instruction which made it
    pub fn step(&mut self, record: &TraceRecord) {
        for cache in &mut self.caches {
            match cache.get_config().kind {
                CacheKind::Data => cache.access_at(self.step, record.address, record.access),
                CacheKind::Instruction => cache.access_at(self.step, record.pc, AccessType::Read),
            };
        }
        self.step += 1;
    }

    /// Simulates every record of a trace
    ///
    /// Records before a malformed line have already been played when the error is returned
    ///
    /// # Arguments
    ///
    /// * `bytes`: The trace, in the `PC ADDRESS MODE [SIZE]` text format
    ///
    /// returns: Result<SimulationResult, TraceError>
    pub fn simulate(&mut self, bytes: &[u8]) -> Result<SimulationResult, TraceError> {
        let start = Instant::now();
        let outcome = records(bytes).try_for_each(|record| {
            self.step(&record?);
            Ok(())
        });
        self.simulation_time += start.elapsed();
        outcome.map(|_| self.result())
    }

    /// Reverses the newest step in every cache
    ///
    /// returns: bool, false if there were no steps or the undo depth was exhausted. Nothing
    /// changes in that case
    pub fn undo_step(&mut self) -> bool {
        let Some(last) = self.step.checked_sub(1) else {
            return false;
        };
        let exhausted = self.caches.iter().any(|cache| {
            let history = cache.get_history();
            history.latest_step() == Some(last) && history.undoable() == 0
        });
        if exhausted {
            debug!(step = last, "undo depth exhausted");
            return false;
        }
        for cache in &mut self.caches {
            cache.reverse_step(last);
        }
        self.step = last;
        true
    }

    /// Clears every cache and restarts at step 0
    pub fn reset(&mut self) {
        self.caches.iter_mut().for_each(CacheSim::reset);
        self.step = 0;
    }

    /// The statistics of every cache as of the newest step
    pub fn result(&self) -> SimulationResult {
        SimulationResult {
            caches: self.caches.iter().map(CacheResult::from).collect(),
        }
    }

    pub fn caches(&self) -> &[CacheSim] {
        &self.caches
    }

    /// Number of steps played and not undone
    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }
}
