/// Logging setup and run summaries
///
/// Log output goes through the `log` facade with `pretty_env_logger` as the
/// backend. `RUST_LOG` controls verbosity; without it the job logs at
/// `info`, and per-reach drops only show up at `debug`.

use crate::analysis::transform::TransformStats;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Installs the global logger. Safe to call more than once; later calls
/// are ignored (e.g., in tests).
pub fn init_logger() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filter)
        .try_init()
        .ok();
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Severity of a transform summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLevel {
    Info,
    Warning,
    Error,
}

/// Picks the level for a transform summary: clean runs are info, runs that
/// dropped invalid reaches warn, and runs with nothing left are errors.
pub fn transform_summary_level(stats: &TransformStats) -> SummaryLevel {
    if stats.classified == 0 {
        SummaryLevel::Error
    } else if stats.invalid > 0 {
        SummaryLevel::Warning
    } else {
        SummaryLevel::Info
    }
}

/// Logs one line summarizing what happened to every input reach.
pub fn log_transform_summary(stats: &TransformStats) {
    let message = format!(
        "Classified {}/{} joined reaches ({} invalid, {} below min flow, \
         {} velocity-only, {} streamflow-only, {} duplicate ids)",
        stats.classified,
        stats.joined,
        stats.invalid,
        stats.below_min_flow,
        stats.velocity_only,
        stats.streamflow_only,
        stats.duplicates
    );

    match transform_summary_level(stats) {
        SummaryLevel::Info => log::info!("{}", message),
        SummaryLevel::Warning => log::warn!("{}", message),
        SummaryLevel::Error => log::error!("{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_level_by_outcome() {
        let clean = TransformStats {
            joined: 10,
            classified: 10,
            ..TransformStats::default()
        };
        assert_eq!(transform_summary_level(&clean), SummaryLevel::Info);

        let lossy = TransformStats {
            joined: 10,
            classified: 8,
            invalid: 2,
            ..TransformStats::default()
        };
        assert_eq!(transform_summary_level(&lossy), SummaryLevel::Warning);

        let empty = TransformStats {
            joined: 2,
            invalid: 2,
            ..TransformStats::default()
        };
        assert_eq!(transform_summary_level(&empty), SummaryLevel::Error);
    }

    #[test]
    fn test_init_logger_twice_does_not_panic() {
        init_logger();
        init_logger();
    }
}
