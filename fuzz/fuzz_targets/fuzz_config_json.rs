//! Fuzz target: configuration loading
//!
//! Any document either fails with a `ConfigError` or yields a config that
//! passes validation and builds an alert policy.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use doorwatch::config::{ControllerConfig, MAX_DOORS, validate_config};
use doorwatch::policy::AlertPolicy;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(cfg) = ControllerConfig::from_json_str(json) {
        assert!(!cfg.doors.is_empty() && cfg.doors.len() <= MAX_DOORS);
        assert!(validate_config(&cfg).is_ok());
        assert!(AlertPolicy::from_config(&cfg.alerts).is_ok());
    }
});
