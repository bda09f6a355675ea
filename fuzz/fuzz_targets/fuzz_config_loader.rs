#![no_main]
use libfuzzer_sys::fuzz_target;

// Parsing and validation must reject bad input with an error, never a panic.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = station_config::load_toml(data) {
        let _ = cfg.validate();
    }
});
