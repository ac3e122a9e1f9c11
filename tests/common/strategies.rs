use proptest::prelude::*;
use std::path::PathBuf;
use webled::config::BackoffConfig;
use webled::orchestration::JobSpec;

/// Strategy for scratch-file cleanup specs
pub fn delete_spec_strategy() -> impl Strategy<Value = JobSpec> {
    "[a-z0-9]{1,16}".prop_map(|name| JobSpec::DeleteFile {
        path: PathBuf::from(format!("/tmp/ledweb{name}")),
    })
}

/// Strategy for valid backoff configurations
pub fn backoff_config_strategy() -> impl Strategy<Value = BackoffConfig> {
    (
        1u64..1_000,
        1u64..100,
        1.0f64..4.0,
        any::<bool>(),
        prop::option::of(1u32..50),
    )
        .prop_map(|(initial, spread, multiplier, jitter, max_attempts)| BackoffConfig {
            initial_delay_ms: initial,
            max_delay_ms: initial * spread,
            multiplier,
            jitter,
            max_attempts,
        })
}
