//! Numeric columns of the scheduler output.
//!
//! Every parser returns the reason it could not produce a value. Callers substitute the
//! fallback themselves (see [`count_or_zero`]), so a single odd field never fails a run.

use std::fmt::Display;
use std::num::ParseIntError;

use thiserror::Error;
use tracing::debug;

/// What slurm prints for a node or job without generic resources.
pub const NULL_GRES: &str = "(null)";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuSpecError {
    #[error("trying to parse an empty GPU spec")]
    Empty,
    #[error("GPU spec `{0}` has no `:<count>` part")]
    MissingCount(String),
    #[error("count in GPU spec `{spec}` is not an integer")]
    InvalidCount {
        spec: String,
        #[source]
        source: ParseIntError,
    },
}

/// Number of GPUs in a gres/tres spec such as `gpu:tesla:4`, `tesla:4`, `gres/gpu:2` or
/// `gpu:a100:4(S:0-1)`. Only the first entry of a comma separated list is looked at.
///
/// `(null)` means "no GPUs" and is not an error.
pub fn gpu_count(spec: &str) -> Result<usize, GpuSpecError> {
    use GpuSpecError::*;
    let spec = spec.trim();

    if spec.is_empty() {
        return Err(Empty);
    }
    if spec == NULL_GRES {
        return Ok(0);
    }

    let first = spec.split(',').next().unwrap_or_default();
    // socket / index annotation, e.g. `(S:0-1)` or `(IDX:0,2)`
    let first = first.split_once('(').map_or(first, |(head, _)| head);
    let (_, count) = first
        .rsplit_once(':')
        .ok_or_else(|| MissingCount(spec.to_owned()))?;

    count.parse().map_err(|source| InvalidCount {
        spec: spec.to_owned(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuCountError {
    #[error("trying to parse an empty CPU count")]
    Empty,
    #[error("CPU count `{input}` is not an integer")]
    InvalidCount {
        input: String,
        #[source]
        source: ParseIntError,
    },
}

/// CPU count column. Some slurm versions print `32+` for "at least 32".
pub fn cpu_count(input: &str) -> Result<usize, CpuCountError> {
    let trimmed = input.trim().trim_end_matches('+');
    if trimmed.is_empty() {
        return Err(CpuCountError::Empty);
    }
    trimmed.parse().map_err(|source| CpuCountError::InvalidCount {
        input: input.to_owned(),
        source,
    })
}

/// Substitute 0 for a count that could not be parsed, logging why.
pub fn count_or_zero<E: Display>(parsed: Result<usize, E>, what: &str) -> usize {
    parsed.unwrap_or_else(|e| {
        debug!(what, "{e}, falling back to 0");
        0
    })
}
