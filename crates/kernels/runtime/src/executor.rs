//! Chunked parallel scheduling for zone- and element-parallel kernels.
//!
//! Every kernel in the update is embarrassingly parallel over work items
//! (zones for the point physics, element batches for interpolation,
//! elements for restriction). Work items write disjoint output chunks, so
//! rayon is only told how finely to split the index space:
//!
//! ```text
//! Work items:  [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, ...]
//!               └─split 0─┘ └─split 1─┘ └─split 2─┘
//!                    ↓           ↓           ↓
//!               ┌─thread 0─┐ ┌─thread 1─┐ ┌─thread 2─┐
//!               │ disjoint │ │ disjoint │ │ disjoint │
//!               │  chunks  │ │  chunks  │ │  chunks  │
//!               └──────────┘ └──────────┘ └──────────┘
//! ```
//!
//! # Determinism
//!
//! Each output element is written by exactly one work item, and no work
//! item reads another's output, so results are bitwise identical for any
//! split. Reductions over the outputs go through [`crate::reductions`].

use serde::{Deserialize, Serialize};

// ============================================================================
// Chunk Configuration
// ============================================================================

/// Configuration for chunked parallel execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkConfig {
    /// Number of work items per parallel split
    pub chunk_size: usize,
    /// Minimum chunk size (avoid too-small splits)
    pub min_chunk: usize,
    /// Maximum chunk size (limit per-task working set)
    pub max_chunk: usize,
    /// Populations at or below this size run on the calling thread
    pub serial_threshold: usize,
}

impl ChunkConfig {
    /// Create a chunk configuration with explicit size.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Compute optimal chunk size based on population.
    ///
    /// Uses 4x oversubscription to balance work distribution
    /// against scheduling overhead.
    pub fn auto(population_size: usize) -> Self {
        Self::new(optimal_chunk_size(population_size))
    }

    /// Configuration that always splits down to single work items.
    ///
    /// Mostly useful to exercise the parallel path on tiny meshes.
    pub fn fine_grained() -> Self {
        Self {
            chunk_size: 1,
            min_chunk: 1,
            max_chunk: 1,
            serial_threshold: 0,
        }
    }

    /// Get effective chunk size after clamping.
    pub fn effective_size(&self) -> usize {
        self.chunk_size
            .clamp(self.min_chunk, self.max_chunk.max(self.min_chunk))
            .max(1)
    }

    /// Whether a population this small should skip the thread pool.
    pub fn runs_serially(&self, population: usize) -> bool {
        population <= self.serial_threshold
    }

    /// Minimum split length to hand to rayon for `population` work items.
    ///
    /// Serial populations get a single split covering everything, which
    /// rayon executes on the calling thread.
    pub fn min_len(&self, population: usize) -> usize {
        if self.runs_serially(population) {
            population.max(1)
        } else {
            self.effective_size()
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            min_chunk: 64,
            max_chunk: 4096,
            serial_threshold: 64,
        }
    }
}

/// Compute optimal chunk size for a given population.
///
/// The formula targets 4x oversubscription (4 chunks per thread) to:
/// - Balance work if some zones take longer (viscous points do more work)
/// - Hide scheduling latency
///
/// # Bounds
///
/// - Minimum: 64 (avoid excessive scheduling overhead)
/// - Maximum: 4096 (limit per-task working set)
pub fn optimal_chunk_size(population_size: usize) -> usize {
    let num_threads = rayon::current_num_threads();
    let min_chunk = 64;
    let max_chunk = 4096;

    // Target 4x oversubscription
    let ideal = population_size / (num_threads * 4);

    ideal.clamp(min_chunk, max_chunk)
}
