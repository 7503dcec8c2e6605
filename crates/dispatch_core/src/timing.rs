//! Fixed-count iteration controller with per-iteration wall-clock timing.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::verify::VerifyReport;
use crate::Scalar;

/// Stale-output prefill value, `0xdeadbeef` read as a float.
pub const POISON: Scalar = 0xDEAD_BEEF_u32 as Scalar;

/// Run-level knobs passed explicitly instead of living in globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Fixed number of compute passes; there is no adaptive termination.
    pub iterations: usize,
    /// Verification tolerance for this run's kernels.
    pub tolerance: Scalar,
    /// Value outputs are reset to before each pass, so stale results cannot
    /// masquerade as correct ones.
    pub sentinel: Scalar,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { iterations: 1, tolerance: 1.0e-3, sentinel: POISON }
    }
}

/// Timing and verification outcome of one iteration, reported independently.
#[derive(Debug)]
pub struct IterationRecord {
    pub elapsed: Duration,
    pub verify: VerifyReport,
}

/// Run `body` the fixed number of times, timing each pass with the monotonic
/// clock.
///
/// Each iteration's elapsed time and verification report are recorded
/// separately; nothing is averaged, and iteration durations carry no ordering
/// constraint among themselves. The body is expected to perform one full
/// dispatch-retrieve-verify pass (including any sentinel reset of its output
/// buffer). The first failing iteration aborts the run.
pub fn run_iterations<F>(iterations: usize, mut body: F) -> Result<Vec<IterationRecord>>
where
    F: FnMut(usize) -> Result<VerifyReport>,
{
    let mut records = Vec::with_capacity(iterations);
    for iteration in 0..iterations {
        let start = Instant::now();
        let verify = body(iteration)?;
        records.push(IterationRecord { elapsed: start.elapsed(), verify });
    }
    Ok(records)
}
