//! Value checks for data elements

use super::catalog::{CharSet, Check, ElementDefinition};
use crate::error::ParseError;
use crate::keyboard::template;
use chrono::{Datelike, NaiveDate};

impl CharSet {
    pub fn contains(&self, c: char) -> bool {
        match self {
            Self::Numeric => c.is_ascii_digit(),
            Self::Gs1Set82 => template::is_printable(c),
            Self::Alphanumeric => c.is_ascii_uppercase() || c.is_ascii_digit(),
        }
    }
}

/// GTIN (any length) with a valid mod-10 check digit
pub fn gtin_is_valid(value: &str) -> bool {
    let digits: Option<Vec<u32>> = value.chars().map(|c| c.to_digit(10)).collect();
    let Some((check, body)) = digits.as_deref().and_then(|d| d.split_last()) else {
        return false;
    };
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - sum % 10) % 10 == *check
}

/// PPN whose last two digits match the mod-97 check over the rest
pub fn ppn_is_valid(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 3 {
        return false;
    }
    let (body, check) = chars.split_at(chars.len() - 2);
    let sum: u64 = body
        .iter()
        .enumerate()
        .map(|(i, &c)| u64::from(u32::from(c)) * (i as u64 + 2))
        .sum();
    let expected = format!("{:02}", sum % 97);
    check.iter().copied().eq(expected.chars())
}

/// Parse a YYMMDD date. Day 00 stands for the last day of the month.
pub fn parse_date(value: &str, century: i32) -> Option<NaiveDate> {
    if value.len() != 6 || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = century + value[0..2].parse::<i32>().ok()?;
    let month = value[2..4].parse::<u32>().ok()?;
    let day = value[4..6].parse::<u32>().ok()?;

    if day == 0 {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, first.month() + 1, 1)?
        };
        next.pred_opt()
    } else {
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// Check one value against its definition.
///
/// Returns the date for date elements that passed, plus every violation.
pub fn validate(
    def: &ElementDefinition,
    value: &str,
    century: i32,
) -> (Option<NaiveDate>, Vec<ParseError>) {
    let mut errors = Vec::new();

    let (min, max) = def.length.bounds();
    let actual = value.chars().count();
    if actual < min || actual > max {
        errors.push(ParseError::InvalidLength {
            code: def.code.clone(),
            min,
            max,
            actual,
        });
    }

    if let Some((position, character)) = value
        .chars()
        .enumerate()
        .find(|(_, c)| !def.charset.contains(*c))
    {
        errors.push(ParseError::InvalidCharacter {
            code: def.code.clone(),
            position,
            character,
        });
    }

    if !errors.is_empty() {
        return (None, errors);
    }

    let mut date = None;
    match def.check {
        Check::None => {}
        Check::Gtin if !gtin_is_valid(value) => errors.push(ParseError::InvalidCheckDigit {
            code: def.code.clone(),
            value: value.to_string(),
        }),
        Check::Ppn if !ppn_is_valid(value) => errors.push(ParseError::InvalidCheckDigit {
            code: def.code.clone(),
            value: value.to_string(),
        }),
        Check::Gtin | Check::Ppn => {}
        Check::Date => match parse_date(value, century) {
            Some(d) => date = Some(d),
            None => errors.push(ParseError::InvalidDate {
                code: def.code.clone(),
                value: value.to_string(),
            }),
        },
    }

    (date, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::catalog::{IdentifierCatalog, Syntax};

    #[test]
    fn gtin_check_digit() {
        assert!(gtin_is_valid("04150123456782"));
        assert!(gtin_is_valid("04001234567891"));
        assert!(!gtin_is_valid("04150123456783"));
        assert!(!gtin_is_valid("0415012345678A"));
        assert!(!gtin_is_valid(""));
    }

    #[test]
    fn ppn_check_digits() {
        assert!(ppn_is_valid("110375286414"));
        assert!(ppn_is_valid("111234567842"));
        assert!(!ppn_is_valid("110375286415"));
        assert!(!ppn_is_valid("14"));
    }

    #[test]
    fn dates() {
        assert_eq!(
            parse_date("251231", 2000),
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
        assert_eq!(
            parse_date("240200", 2000),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            parse_date("271200", 2000),
            NaiveDate::from_ymd_opt(2027, 12, 31)
        );
        assert_eq!(parse_date("251301", 2000), None);
        assert_eq!(parse_date("250230", 2000), None);
        assert_eq!(parse_date("25123", 2000), None);
        assert_eq!(parse_date("99010a", 2000), None);
    }

    #[test]
    fn validate_reports_character_before_check_digit() {
        let catalog = IdentifierCatalog::default();
        let gtin = catalog
            .get(Syntax::Gs1ApplicationIdentifiers, "01")
            .unwrap();
        let (_, errors) = validate(gtin, "0415012345678A", 2000);
        assert_eq!(
            errors,
            vec![ParseError::InvalidCharacter {
                code: "01".to_string(),
                position: 13,
                character: 'A',
            }]
        );
    }

    #[test]
    fn validate_length() {
        let catalog = IdentifierCatalog::default();
        let ppn = catalog.get(Syntax::AscMhDataIdentifiers, "9N").unwrap();
        let (_, errors) = validate(ppn, "114", 2000);
        assert!(matches!(
            errors.as_slice(),
            [ParseError::InvalidLength { min: 4, max: 22, actual: 3, .. }]
        ));
    }

    #[test]
    fn validate_returns_dates() {
        let catalog = IdentifierCatalog::default();
        let expiry = catalog
            .get(Syntax::Gs1ApplicationIdentifiers, "17")
            .unwrap();
        let (date, errors) = validate(expiry, "260600", 2000);
        assert!(errors.is_empty());
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 6, 30));
    }

    #[test]
    fn charsets() {
        assert!(CharSet::Gs1Set82.contains('%'));
        assert!(!CharSet::Gs1Set82.contains('#'));
        assert!(!CharSet::Alphanumeric.contains('a'));
        assert!(CharSet::Numeric.contains('7'));
    }
}
