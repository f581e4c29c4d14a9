use serde_json::Value;
use tracing::info;

/// Record an account event on the `activity` log target.
///
/// Filter it on its own with e.g. `RUST_LOG=activity=info`.
pub fn log_activity(action: &str, client_ip: Option<&str>, details: Value) {
    info!(
        target: "activity",
        action,
        ip = client_ip.unwrap_or("unknown"),
        %details,
        "ACTIVITY"
    );
}
