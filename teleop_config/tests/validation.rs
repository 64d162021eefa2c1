use rstest::rstest;
use teleop_config::{FilterKind, RobotTarget, load_toml};

fn reject(toml: &str, needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("config should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected `{needle}` in `{err}`"
    );
}

#[test]
fn accepts_full_abb_deployment() {
    let toml = r#"
[acquisition]
period_us = 4000
max_samples = 5000

[position]
ranges = [[-22.5, 22.5], [0.0, 45.0], [-45.0, 0.0]]

[position.publish_filter]
kind = "blpma"
window = 100
sma_window = 20
cutoff_hz = 1.95
order = 3

[fingers]
window = 25
closed_offset = 10.0

[robot]
target = "abb"
workspace = [360.0, 360.0, 360.0]
axis_map = [2, 0, 1]
direction = [1.0, 1.0, 1.0]

[robot.servo]
velocity = 0.05
acceleration = 0.5

[telemetry]
publish_to = "192.168.0.20:5555"
listen = "0.0.0.0:5555"
liveness_timeout_ms = 500

[logging]
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config");
    assert_eq!(cfg.robot.target, RobotTarget::Abb);
    assert_eq!(cfg.position.publish_filter.kind, FilterKind::Blpma);
    assert_eq!(cfg.acquisition.max_samples, Some(5000));
    assert_eq!(cfg.telemetry.liveness_timeout_ms, Some(500));
}

#[rstest]
#[case("[acquisition]\nperiod_us = 0\n", "acquisition.period_us must be > 0")]
#[case("[acquisition]\nmax_samples = 0\n", "acquisition.max_samples")]
#[case(
    "[position]\nranges = [[22.5, -22.5], [0.0, 45.0], [-45.0, 0.0]]\n",
    "position.ranges[0]: low must be < high"
)]
#[case(
    "[position]\nranges = [[-22.5, 22.5], [10.0, 10.0], [-45.0, 0.0]]\n",
    "position.ranges[1]: low must be < high"
)]
#[case(
    "[position.publish_filter]\nkind = \"sma\"\nwindow = 0\n",
    "position.publish_filter.window"
)]
#[case(
    "[position.publish_filter]\nkind = \"lpf\"\ncutoff_hz = 0.0\n",
    "position.publish_filter.cutoff_hz must be > 0"
)]
#[case("[fingers]\nwindow = 0\n", "fingers.window must be >= 1")]
#[case("[fingers]\nclosed_offset = -1.0\n", "fingers.closed_offset")]
#[case("[limit_guard]\nepsilon = -0.01\n", "limit_guard.epsilon")]
#[case("[collection]\nsma_window = 0\n", "collection windows")]
#[case("[collection]\norder = 0\n", "collection.order")]
#[case("[collection]\norder = 9\n", "collection.order")]
#[case("[control]\nperiod_us = 0\n", "control.period_us")]
#[case("[robot]\nworkspace = [760.0, 0.0, 200.0]\n", "robot.workspace")]
#[case("[robot]\ndirection = [1.0, 0.5, 1.0]\n", "robot.direction")]
#[case("[robot]\naxis_map = [0, 0, 1]\n", "robot.axis_map")]
#[case("[robot]\naxis_map = [0, 1, 3]\n", "robot.axis_map")]
#[case("[robot.servo]\ngain = 0.0\n", "robot.servo.gain")]
#[case("[robot.servo]\nlookahead_s = 0.0\n", "robot.servo.lookahead_s")]
#[case("[robot.servo]\nlookahead_s = 1e300\n", "robot.servo.lookahead_s")]
#[case("[robot.servo]\nlookahead_s = 10.5\n", "robot.servo.lookahead_s")]
#[case("[telemetry]\nlisten = \"not-an-address\"\n", "telemetry.listen")]
#[case("[telemetry]\nliveness_timeout_ms = 0\n", "telemetry.liveness_timeout_ms")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    reject(toml, needle);
}

#[rstest]
#[case(125.0)]
#[case(200.0)]
fn rejects_cutoff_at_or_above_nyquist(#[case] cutoff: f64) {
    // 4 ms period -> 250 Hz sampling -> 125 Hz Nyquist
    let toml = format!("[collection]\ncutoff_hz = {cutoff}\n");
    reject(&toml, "collection.cutoff_hz must be < Nyquist");
}

#[test]
fn nyquist_follows_acquisition_period() {
    // 20 ms period -> 25 Hz Nyquist; the 2.5 Hz default still fits but 30 Hz does not.
    let ok = load_toml("[acquisition]\nperiod_us = 20000\n").expect("parse");
    ok.validate().expect("defaults fit a 50 Hz stream");

    reject(
        "[acquisition]\nperiod_us = 20000\n[control]\ncutoff_hz = 30.0\n",
        "control.cutoff_hz must be < Nyquist",
    );
}

#[test]
fn unknown_filter_kind_is_a_parse_error() {
    let err = load_toml("[position.publish_filter]\nkind = \"kalman\"\n")
        .expect_err("unknown variant");
    assert!(err.to_string().contains("kalman"));
}

#[test]
fn none_filter_skips_lowpass_checks() {
    let cfg = load_toml("[position.publish_filter]\nkind = \"none\"\ncutoff_hz = -1.0\n")
        .expect("parse");
    cfg.validate().expect("cutoff is unused for kind = none");
}

#[test]
fn loads_from_file() {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(f, "[robot]\ntarget = \"abb\"").expect("write");
    let text = std::fs::read_to_string(f.path()).expect("read back");
    let cfg = load_toml(&text).expect("parse");
    assert_eq!(cfg.robot.target, RobotTarget::Abb);
    cfg.validate().expect("valid");
}
