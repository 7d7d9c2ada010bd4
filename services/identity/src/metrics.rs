//! Prometheus metrics for the identity core.
//!
//! Counters for key lifecycle, token customization and RBAC mutations.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec};

/// Key rotations by trigger (`startup`, `scheduled`) and outcome
/// (`generated`, `already_satisfied`, `failed`).
pub static KEY_ROTATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "identity_key_rotations_total",
        "Total number of signing key rotation attempts",
        &["trigger", "outcome"]
    )
    .expect("Failed to register key_rotations metric")
});

/// Key purges by status.
pub static KEY_PURGES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "identity_key_purges_total",
        "Total number of signing key purge runs",
        &["status"]
    )
    .expect("Failed to register key_purges metric")
});

/// Token claim customizations by grant type and token kind.
pub static TOKENS_CUSTOMIZED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "identity_tokens_customized_total",
        "Total number of token claim customizations",
        &["grant_type", "token_kind"]
    )
    .expect("Failed to register tokens_customized metric")
});

/// RBAC mutations by entity, operation and status.
pub static RBAC_MUTATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "identity_rbac_mutations_total",
        "Total number of RBAC graph mutations",
        &["entity", "operation", "status"]
    )
    .expect("Failed to register rbac_mutations metric")
});

/// Record a key rotation attempt.
pub fn record_key_rotation(trigger: &str, outcome: &str) {
    KEY_ROTATIONS.with_label_values(&[trigger, outcome]).inc();
}

/// Record a purge run.
pub fn record_key_purge(success: bool) {
    let status = if success { "success" } else { "failure" };
    KEY_PURGES.with_label_values(&[status]).inc();
}

/// Record a token customization.
pub fn record_token_customized(grant_type: &str, token_kind: &str) {
    TOKENS_CUSTOMIZED
        .with_label_values(&[grant_type, token_kind])
        .inc();
}

/// Record an RBAC mutation result.
pub fn record_rbac_mutation<T, E>(entity: &str, operation: &str, result: &Result<T, E>) {
    let status = if result.is_ok() { "success" } else { "failure" };
    RBAC_MUTATIONS
        .with_label_values(&[entity, operation, status])
        .inc();
}
