use std::{io, time::Duration};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::pipeline::StageReport;

const LOG_ENV: &str = "JIRA2BZ_LOG";
const DEFAULT_FILTER: &str = "info";

pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

pub fn emit_success(report: &StageReport, elapsed: Duration) {
    info!(
        op = report.stage,
        status = "ok",
        duration_ms = duration_ms(elapsed),
        processed = report.processed,
        written = report.written,
        skipped = report.skipped,
        missing = report.missing,
        "stage finished"
    );
}

pub fn emit_failure(stage: &str, elapsed: Duration, error: &anyhow::Error) {
    error!(
        op = stage,
        status = "error",
        duration_ms = duration_ms(elapsed),
        error = %format!("{error:#}"),
        "stage failed"
    );
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::duration_ms;

    #[test]
    fn converts_durations_to_millis() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::ZERO), 0);
    }
}
