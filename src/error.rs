//! The core's single error type, propagated up to the driver (§7).
//!
//! Every internal failure mode funnels into one of these variants; the
//! driver is the only place that turns a `CoreError` into process exit
//! behavior (see `driver::run_to_exit_code`).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid or inconsistent scenario input. Always fatal.
    #[error("scenario error at {location}: {message}")]
    Scenario { location: String, message: String },

    /// Corrupt or mismatched checkpoint stream.
    #[error("checkpoint error: {message}")]
    Checkpoint { message: String },

    /// Fitter non-convergence, quadrature accuracy failure, or a NaN
    /// surfacing from the vector engine. `dump_path`, if set, is where the
    /// offending state was written for postmortem inspection.
    #[error("numerical error: {message}")]
    Numerical {
        message: String,
        dump_path: Option<PathBuf>,
    },

    /// Cumulative-probability overflow in a decision branch (infection-list
    /// overflow is NOT an error; it is silently truncated per §4.3).
    #[error("range error: {message}")]
    Range { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
