//! Logging utilities for colloc.
//!
//! Structured `tracing` events for the stages of a collocation run, so that
//! runs can be followed and compared from their logs.

use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::collocator::CollocationSummary;
use crate::error::CollocError;

/// Initialize the tracing subscriber with the given log level
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => log_level.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Log a start message for a significant operation
pub fn log_operation_start(operation: &str, details: Option<&str>) {
    if let Some(details) = details {
        info!(
            operation = operation,
            details = details,
            "Starting operation"
        );
    } else {
        info!(operation = operation, "Starting operation");
    }
}

/// Log the completion of a significant operation
pub fn log_operation_end(operation: &str, start_time: Instant, success: bool) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if success {
        info!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed successfully"
        );
    } else {
        warn!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed with warnings"
        );
    }
}

/// Run `f` as one stage of the run `run_id`, logging its duration
pub fn log_timed_operation<F, R>(operation: &str, run_id: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();

    debug!(
        operation = operation,
        run_id = run_id,
        "Starting operation"
    );

    let result = f();

    info!(
        operation = operation,
        run_id = run_id,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation completed"
    );

    result
}

/// Log the outcome counts of a finished collocation
pub fn log_collocation_stats(
    run_id: &str,
    kernel: &str,
    summary: &CollocationSummary,
    start_time: Instant,
) {
    info!(
        operation = "collocate",
        run_id = run_id,
        kernel = kernel,
        points = summary.points,
        valid = summary.valid,
        invalid = summary.invalid,
        filled = summary.filled,
        empty = summary.empty,
        invalid_pct = summary.invalid_fraction() * 100.0,
        duration_ms = start_time.elapsed().as_secs_f64() * 1000.0,
        "Collocation finished"
    );
}

/// Log an error with context
pub fn log_error(error: &CollocError, context: &str) {
    error!(
        error = %error,
        context = context,
        configuration = error.is_configuration(),
        error_type = std::any::type_name_of_val(error),
        "Error occurred"
    );
}

/// Generate a unique run ID
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}
