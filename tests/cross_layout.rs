//! Cross-layout equivalence: every calibratable host layout must decode the
//! same business barcodes to the same pack identifiers as the baseline host.

mod common;

use anyhow::Result;
use common::*;
use scanner_calibration::parser::{Parser, RecognisedDataElement, Scheme};

fn parser_for(name: &str) -> Result<Parser> {
    let layout = layout(name)?;
    let token = calibrate(&layout);
    let data = token
        .calibration_data()
        .ok_or_else(|| anyhow::anyhow!("{} failed to calibrate: {:?}", name, token.errors()))?;
    Ok(Parser::new(
        data.clone(),
        RecognisedDataElement::pack_identifier_defaults(),
    ))
}

#[test]
fn baseline_reads_every_business_barcode() -> Result<()> {
    init_logging();
    let parser = parser_for("us")?;
    for barcode in business_barcodes() {
        let id = parser.parse(&live_scan(&layout("us")?, &barcode));
        assert!(id.is_valid, "{:?}: {:?}", barcode, id.diagnostics);
        assert_ne!(id.scheme, Scheme::Unknown);
        assert!(id.product_code.is_some());
        assert!(id.expiry.is_some());
    }
    Ok(())
}

#[test]
fn every_layout_decodes_like_the_baseline() -> Result<()> {
    init_logging();
    let us = layout("us")?;
    let baseline = parser_for("us")?;

    for name in GOOD_LAYOUTS {
        let host = layout(name)?;
        let parser = parser_for(name)?;
        for barcode in business_barcodes() {
            let expected = baseline.parse(&live_scan(&us, &barcode));
            let actual = parser.parse(&live_scan(&host, &barcode));
            assert_eq!(
                actual.key_fields(),
                expected.key_fields(),
                "layout {} barcode {:?}",
                name,
                barcode
            );
            assert!(actual.is_valid, "layout {}: {:?}", name, actual.diagnostics);
        }
    }
    Ok(())
}

#[test]
fn remapped_text_is_canonical() -> Result<()> {
    for name in GOOD_LAYOUTS {
        let host = layout(name)?;
        let parser = parser_for(name)?;
        let remapper = scanner_calibration::parser::Remapper::new(parser.data().clone());
        for barcode in business_barcodes() {
            let raw = host.type_text(&barcode);
            assert_eq!(remapper.remap(&raw), barcode, "layout {}", name);
        }
    }
    Ok(())
}

#[test]
fn german_host_needs_dead_key_rounds() -> Result<()> {
    let token = calibrate(&layout("de")?);
    assert_eq!(token.rounds(), 3);
    let data = token.calibration_data().unwrap();
    assert_eq!(data.character_map().translate('z'), 'y');
    assert_eq!(data.dead_key('´').map(|t| t.canonical()), Some('='));
    assert_eq!(data.dead_key('`').map(|t| t.canonical()), Some('+'));
    Ok(())
}

#[test]
fn virtual_host_uses_decimal_separators() -> Result<()> {
    let token = calibrate(&layout("virtual-host")?);
    let data = token.calibration_data().unwrap();
    assert!(data.separators().uses_substitutes());
    assert_eq!(
        data.separators()
            .report(scanner_calibration::keyboard::Separator::Gs),
        Some("0029")
    );
    Ok(())
}
