#![no_main]
use libfuzzer_sys::fuzz_target;
use teleop_core::config::{CollectionCfg, ControlCfg, PublisherCfg};

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not.
    let Ok(cfg) = teleop_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config must always convert.
    assert!(PublisherCfg::try_from(&cfg).is_ok());
    assert!(CollectionCfg::try_from(&cfg).is_ok());
    assert!(ControlCfg::try_from(&cfg).is_ok());
});
