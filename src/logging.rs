//! # Structured Logging Module
//!
//! Environment-aware structured logging for the migration orchestration tree.

use crate::constants::events;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json = use_json_format(&environment);

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Another subscriber (usually a test harness) may already be installed
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("MIGRATION_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format(environment: &str) -> bool {
    environment == "production"
        || std::env::var("MIGRATION_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
}

/// Log a workflow state transition
pub fn log_workflow_transition(
    instance_id: &str,
    workflow: &str,
    from_state: &str,
    to_state: &str,
    details: Option<&str>,
) {
    tracing::info!(
        event = events::WORKFLOW_TRANSITION,
        instance_id = %instance_id,
        workflow = %workflow,
        from_state = %from_state,
        to_state = %to_state,
        details = details,
        "🔄 WORKFLOW_TRANSITION"
    );
}

/// Log structured data for activity operations
pub fn log_activity_operation(
    event: &str,
    instance_id: &str,
    activity: &str,
    seq: u64,
    attempt: u32,
    details: Option<&str>,
) {
    tracing::info!(
        event = %event,
        instance_id = %instance_id,
        activity = %activity,
        seq = seq,
        attempt = attempt,
        details = details,
        "🔧 ACTIVITY_OPERATION"
    );
}
