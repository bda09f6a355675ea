use station_config::{load_file, load_toml};
use rstest::rstest;

const MINIMAL: &str = r#"
[scale]
port = "/dev/ttyUSB0"
"#;

#[test]
fn minimal_config_uses_defaults() {
    let cfg = load_toml(MINIMAL).expect("parse TOML");
    cfg.validate().expect("defaults should validate");
    assert_eq!(cfg.scale.baudrate, 9600);
    assert_eq!(cfg.scale.pause_ms, 0);
    assert_eq!(cfg.measure.sample_window, 5);
    assert_eq!(cfg.readers.inactivity_timeout_ms, 30_000);
    assert_eq!(cfg.photo.default_name, "camera");
}

#[test]
fn missing_scale_section_is_a_parse_error() {
    let err = load_toml("[measure]\nsample_window = 3\n").expect_err("scale is required");
    assert!(err.to_string().contains("scale"));
}

#[test]
fn photo_names_map_serials() {
    let toml = r#"
[scale]
port = "/dev/ttyUSB0"

[photo]
default_name = "extra"
names = { "A100" = "overhead", "B200" = "side" }
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.photo.default_name, "extra");
    assert_eq!(cfg.photo.names.get("A100").map(String::as_str), Some("overhead"));
    assert_eq!(cfg.photo.names.get("B200").map(String::as_str), Some("side"));
    assert_eq!(cfg.photo.names.len(), 2);
}

#[rstest]
#[case("[scale]\nport = \"/dev/ttyUSB0\"\nbaudrate = 0\n", "scale.baudrate must be > 0")]
#[case("[scale]\nport = \"\"\n", "scale.port must not be empty")]
#[case("[scale]\nport = \"p\"\ntimeout_ms = 0\n", "scale.timeout_ms must be >= 1")]
#[case("[scale]\nport = \"p\"\nprecision = 9\n", "scale.precision must be <= 6")]
#[case("[scale]\nport = \"p\"\n[measure]\nsample_window = 0\n", "measure.sample_window must be >= 1")]
#[case("[scale]\nport = \"p\"\n[measure]\ncm_per_unit = 0.0\n", "measure.cm_per_unit must be a positive number")]
#[case("[scale]\nport = \"p\"\n[measure]\nrange = 7\n", "measure.range must be in 1..=3")]
#[case("[scale]\nport = \"p\"\n[lights]\nlevel = 1.5\n", "lights.level must be in [0.0, 1.0]")]
#[case("[scale]\nport = \"p\"\n[photo]\ndefault_name = \" \"\n", "photo.default_name must not be empty")]
#[case("[scale]\nport = \"p\"\n[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn zero_inactivity_timeout_is_allowed() {
    let toml = "[scale]\nport = \"p\"\n[readers]\ninactivity_timeout_ms = 0\n";
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("0 disables idle teardown");
}

#[test]
fn load_file_reports_invalid_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("station.toml");
    std::fs::write(&path, "[scale]\nport = 5\n").unwrap();
    let err = load_file(&path).expect_err("port must be a string");
    assert!(err.to_string().contains("invalid configuration"));
}

#[test]
fn shipped_sample_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../etc/station.toml");
    let cfg = station_config::load_file(&path).expect("etc/station.toml loads");
    assert_eq!(cfg.measure.address, 0x29);
    assert_eq!(
        cfg.photo.names.get("SIM-usb001").map(String::as_str),
        Some("overhead")
    );
}
