//! Shared helpers for the integration tests

#![allow(dead_code)]

use anyhow::{Context, Result};
use scanner_calibration::calibration::{CalibrationToken, Calibrator, ProbeSize};
use scanner_calibration::keyboard::LayoutProfile;
use std::path::PathBuf;

pub const GS: char = '\u{1d}';

/// Layouts that calibrate successfully
pub const GOOD_LAYOUTS: [&str; 5] = ["us", "de", "fr", "uk", "virtual-host"];

/// Layouts that cannot be calibrated
pub const BAD_LAYOUTS: [&str; 3] = ["no-separator", "colliding-dead-keys", "missing-punctuation"];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/layouts")
        .join(format!("{}.toml", name))
}

pub fn layout(name: &str) -> Result<LayoutProfile> {
    let path = fixture_path(name);
    LayoutProfile::load_from(&path).with_context(|| format!("loading {}", path.display()))
}

/// Host report for the token's pending probe
pub fn scan(layout: &LayoutProfile, token: &CalibrationToken) -> Vec<char> {
    token
        .barcode_segments()
        .iter()
        .flat_map(|segment| layout.type_text(segment))
        .collect()
}

pub fn calibrate(layout: &LayoutProfile) -> CalibrationToken {
    Calibrator::new().run(ProbeSize::Automatic, |token| scan(layout, token))
}

/// What the host reports when the scanner reads `barcode` followed by CR
pub fn live_scan(layout: &LayoutProfile, barcode: &str) -> String {
    layout.type_text(&format!("{}\r", barcode)).into_iter().collect()
}

/// Twelve pack barcodes covering both grammars
pub fn business_barcodes() -> Vec<String> {
    let gs = GS;
    let rs = '\u{1e}';
    let eot = '\u{4}';
    vec![
        format!("01041501234567821726123110LOTyz42{gs}21SNzy0815"),
        format!("{gs}010400123456789121a=b+c{gs}1727010010B-7/9"),
        format!("0105312345678901112501151728022910Charge%1{gs}21X(1)*2"),
        format!("01075912345678941726060021Qwertz_Az{gs}10'quote'"),
        format!("01087654321098761729113010ee==ea{gs}21=e+e{gs}71012345"),
        format!("01041501234567821726123110<>?:;{gs}21\"!&,."),
        format!("[)>{rs}06{gs}9N110375286414{gs}1TBATCH1{gs}D261231{gs}SSERIAL1{rs}{eot}"),
        format!("[)>{rs}06{gs}8P04150123456782{gs}1TYZ12{gs}D270100{gs}SZY99{rs}{eot}"),
        format!("9N111234567842{gs}SABCXYZ{gs}1TL0T{gs}D301231"),
        format!("[)>{rs}06{gs}S12345678901234567890{gs}9N110415012347{gs}D260200{gs}1TQ1{rs}{eot}"),
        format!("010400123456789110A1{gs}1726123121zzzzzz"),
        format!("01053123456789011727061510X{gs}711ABC{gs}211"),
    ]
}
