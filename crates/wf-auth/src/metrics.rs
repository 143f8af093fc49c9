//! Authentication metrics.
//!
//! Counters are emitted through the `metrics` facade; without an installed
//! recorder they are no-ops.

use metrics::{counter, describe_counter};

pub const METADATA_REFRESH_TOTAL: &str = "wf_metadata_refresh_total";
pub const AUTHENTICATION_TOTAL: &str = "wf_authentication_total";

/// Register metric descriptions with the installed recorder.
pub fn describe_auth_metrics() {
    describe_counter!(
        METADATA_REFRESH_TOTAL,
        "Identity provider metadata refresh attempts by outcome"
    );
    describe_counter!(
        AUTHENTICATION_TOTAL,
        "Bearer authentication attempts by outcome"
    );
}

pub(crate) fn record_metadata_refresh(outcome: &'static str) {
    counter!(METADATA_REFRESH_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_authentication(outcome: &'static str) {
    counter!(AUTHENTICATION_TOTAL, "outcome" => outcome).increment(1);
}
