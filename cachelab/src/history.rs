use std::collections::{BTreeMap, VecDeque};
use serde::{Deserialize, Serialize};
use tracing::trace;
use crate::cache::CacheWay;
use crate::config::DEFAULT_UNDO_DEPTH;
use crate::replacement_policies::MetadataUndo;
use crate::transaction::{AccessType, CacheTransaction};

/// Cumulative access statistics up to and including one step
///
/// Each entry of the access trace is the previous entry plus the contribution of one transaction,
/// so removing the newest entry exactly forgets the newest access
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStats {
    pub hits: u64,
    pub misses: u64,
    pub reads: u64,
    pub writes: u64,
    pub writebacks: u64,
}

impl AccessStats {
    /// These statistics with one more transaction counted
    pub fn after(&self, transaction: &CacheTransaction) -> Self {
        let read = transaction.access_type == AccessType::Read;
        Self {
            hits: self.hits + transaction.is_hit as u64,
            misses: self.misses + !transaction.is_hit as u64,
            reads: self.reads + read as u64,
            writes: self.writes + !read as u64,
            writebacks: self.writebacks + transaction.is_writeback as u64,
        }
    }

    /// Hits over all accesses, 0 before the first access
    pub fn hit_rate(&self) -> f64 {
        let accesses = self.hits + self.misses;
        if accesses == 0 {
            0.0
        } else {
            self.hits as f64 / accesses as f64
        }
    }
}

/// One undoable access: the transaction, the target way as it was before the access, and whatever
/// else the replacement policy needs to roll its update back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTrace {
    pub transaction: CacheTransaction,
    pub old_way: CacheWay,
    pub undo: MetadataUndo,
}

/// The undo history of a cache, and its statistics over time
///
/// Traces are kept in a ring of `depth` entries, the oldest being dropped silently once it is
/// full. Undoing past that point does nothing. The access trace is keyed by the host's step
/// counter and is only ever trimmed if a statistics depth was given
#[derive(Debug, Clone)]
pub struct HistoryLog {
    traces: VecDeque<CacheTrace>,
    depth: usize,
    access_trace: BTreeMap<u64, AccessStats>,
    statistics_depth: Option<usize>,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

impl HistoryLog {
    pub fn new(depth: usize) -> Self {
        Self {
            traces: VecDeque::with_capacity(depth.min(1024)),
            depth,
            access_trace: BTreeMap::new(),
            statistics_depth: None,
        }
    }

    /// Records a completed access. `step` must be greater than every step recorded so far
    pub fn push(&mut self, step: u64, trace: CacheTrace) {
        debug_assert!(self.latest_step().map_or(true, |latest| step > latest));
        let stats = self.latest_stats().after(&trace.transaction);
        self.access_trace.insert(step, stats);
        self.traces.push_back(trace);
        self.trim();
    }

    /// Removes the newest access, if it can still be undone
    pub fn pop(&mut self) -> Option<CacheTrace> {
        let trace = self.traces.pop_back()?;
        self.access_trace.pop_last();
        Some(trace)
    }

    pub fn latest_stats(&self) -> AccessStats {
        self.access_trace
            .last_key_value()
            .map(|(_, stats)| *stats)
            .unwrap_or_default()
    }

    pub fn latest_step(&self) -> Option<u64> {
        self.access_trace.last_key_value().map(|(step, _)| *step)
    }

    /// The newest transaction which can still be undone
    pub fn latest_transaction(&self) -> Option<&CacheTransaction> {
        self.traces.back().map(|trace| &trace.transaction)
    }

    pub fn access_trace(&self) -> &BTreeMap<u64, AccessStats> {
        &self.access_trace
    }

    /// Number of accesses which can currently be undone
    pub fn undoable(&self) -> usize {
        self.traces.len()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
        self.trim();
    }

    /// Limits the access trace to its newest entries. It always keeps one entry more than the undo
    /// depth, so the totals from before the oldest undoable access survive
    pub fn set_statistics_depth(&mut self, depth: Option<usize>) {
        self.statistics_depth = depth;
        self.trim();
    }

    pub fn clear(&mut self) {
        self.traces.clear();
        self.access_trace.clear();
    }

    fn trim(&mut self) {
        while self.traces.len() > self.depth {
            if let Some(dropped) = self.traces.pop_front() {
                trace!(address = dropped.transaction.address, "undo history full, dropping oldest access");
            }
        }
        if let Some(limit) = self.statistics_depth {
            let limit = limit.max(self.depth.saturating_add(1));
            while self.access_trace.len() > limit {
                self.access_trace.pop_first();
            }
        }
    }
}
