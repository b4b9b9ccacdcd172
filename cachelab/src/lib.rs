//! # CacheLab
//!
//! Cachelab is a library for reversible cache simulation
//!
//! It provides a set-associative cache over 32-bit addresses which can be parameterised by its
//! geometry, write policies and a replacement policy, optionally with skewed indexing. Every
//! access can be undone exactly, including the internal state of the replacement policy, so a
//! host can step a program backwards and watch the cache follow
//!
//! A trace-driven simulator runs several caches side by side over a program trace

/// Splits addresses into tag, set index and block index
pub mod address;

/// Contains the cache model and the engine which performs and undoes accesses
pub mod cache;

/// Contains definitions for the JSON configuration format
pub mod config;

/// Errors for rejected configurations and unreadable traces
pub mod error;

/// The undo history and the statistics trace
pub mod history;

/// Reading trace files
pub mod io;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Contains the simulator used to run a trace against a set of caches
pub mod simulator;

/// Set indexing for skewed-associative caches
pub mod skew;

/// Parses program traces
pub mod trace;

/// The record of a single access, used for reporting and undo
pub mod transaction;

/// Helpers for showing the contents of cache lines
pub mod view;

#[cfg(test)]
mod test;

/// Contains utilities for running tests and benchmarks.
pub mod util;
