//! Decoding of live scans into pack identifiers
//!
//! A [`Parser`] owns a shared, immutable [`CalibrationData`] and the set of
//! data elements the caller declared. `parse` never fails: every problem is
//! reported as a diagnostic on the returned [`PackIdentifier`].

pub mod catalog;
pub mod identifier;
pub mod remap;
pub mod validate;

pub use catalog::{
    CharSet, Check, ElementDefinition, FieldRole, IdentifierCatalog, LengthRule,
    RecognisedDataElement, Syntax,
};
pub use identifier::{DataElement, PackIdentifier, Scheme};
pub use remap::{RemapResult, RemapStats, Remapper, ScanText};

use crate::calibration::CalibrationData;
use crate::config::ParserConfig;
use crate::error::ParseError;
use crate::keyboard::template::{Separator, EOT};
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

const GS: char = '\u{1d}';
const RS: char = '\u{1e}';

/// ISO/IEC 15434 message header, before the RS and format indicator
const ENVELOPE_HEADER: [char; 3] = ['[', ')', '>'];

/// Contents of an ISO/IEC 15434 envelope
struct Envelope {
    format: String,
    content: Range<usize>,
    terminated: bool,
}

fn open_envelope(text: &ScanText, start: usize) -> Option<Envelope> {
    let chars = text.chars();
    if !chars.get(start..)?.starts_with(&ENVELOPE_HEADER) {
        return None;
    }
    let header_end = start + ENVELOPE_HEADER.len();
    let format_start = header_end + text.separator_at(header_end, Separator::Rs)?;

    let (format_end, content_start) = (format_start..text.len())
        .find_map(|i| text.separator_at(i, Separator::Gs).map(|len| (i, i + len)))
        .unwrap_or((text.len(), text.len()));
    let format = text.text(format_start..format_end);

    let trailer = (content_start..text.len()).find(|&i| {
        text.separator_at(i, Separator::Rs)
            .is_some_and(|len| chars.get(i + len) == Some(&EOT))
    });
    Some(match trailer {
        Some(end) => Envelope {
            format,
            content: content_start..end,
            terminated: true,
        },
        None => {
            let mut end = text.len();
            while end > content_start && matches!(chars[end - 1], RS | EOT) {
                end -= 1;
            }
            Envelope {
                format,
                content: content_start..end,
                terminated: false,
            }
        }
    })
}

/// Decodes scans with one calibration and one set of declared elements
#[derive(Debug, Clone)]
pub struct Parser {
    remapper: Remapper,
    recognised: BTreeSet<RecognisedDataElement>,
    catalog: IdentifierCatalog,
    config: ParserConfig,
}

impl Parser {
    pub fn new(
        data: Arc<CalibrationData>,
        recognised: impl IntoIterator<Item = RecognisedDataElement>,
    ) -> Self {
        Self {
            remapper: Remapper::new(data),
            recognised: recognised.into_iter().collect(),
            catalog: IdentifierCatalog::default(),
            config: ParserConfig::default(),
        }
    }

    /// Use a different element catalog
    pub fn with_catalog(mut self, catalog: IdentifierCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn data(&self) -> &Arc<CalibrationData> {
        self.remapper.data()
    }

    pub fn recognised(&self) -> &BTreeSet<RecognisedDataElement> {
        &self.recognised
    }

    /// Parse a scan as received from the host
    pub fn parse(&self, raw: &str) -> PackIdentifier {
        let codes: Vec<char> = raw.chars().collect();
        self.parse_codes(&codes)
    }

    pub fn parse_codes(&self, raw: &[char]) -> PackIdentifier {
        let text = self.remapper.read(raw);
        let start = self.skip_fnc1(&text);
        let mut id = PackIdentifier::default();

        let (scheme, content) = match open_envelope(&text, start) {
            Some(envelope) => {
                if !envelope.terminated {
                    id.diagnostics.push(ParseError::UnterminatedEnvelope);
                }
                let scheme = match envelope.format.as_str() {
                    "06" => Scheme::Ifa,
                    "05" => Scheme::Gs1,
                    _ => Scheme::Unknown,
                };
                (scheme, envelope.content)
            }
            None => (self.detect_scheme(&text, start), start..text.len()),
        };

        id.scheme = scheme;
        match scheme {
            Scheme::Gs1 => {
                self.read_fields(Syntax::Gs1ApplicationIdentifiers, &text, content, &mut id)
            }
            Scheme::Ifa => self.read_fields(Syntax::AscMhDataIdentifiers, &text, content, &mut id),
            Scheme::Unknown => id.diagnostics.push(ParseError::UnknownScheme),
        }

        if scheme != Scheme::Unknown {
            for &role in &self.config.mandatory_roles {
                if !id.has_role(role) {
                    id.diagnostics.push(ParseError::MissingMandatory { role });
                }
            }
        }

        id.is_valid = scheme != Scheme::Unknown && id.diagnostics.is_empty();
        if !id.is_valid {
            log::debug!(
                "Rejected scan ({:?}): {} diagnostic(s)",
                scheme,
                id.diagnostics.len()
            );
        }
        id
    }

    /// Position after any leading FNC1. A GS substitute only counts as FNC1
    /// when a message follows it.
    fn skip_fnc1(&self, text: &ScanText) -> usize {
        let mut pos = 0;
        while let Some(&c) = text.chars().get(pos) {
            if c == GS {
                pos += 1;
                continue;
            }
            match text.substitute_at(pos) {
                Some((Separator::Gs, len)) if self.starts_message(text, pos + len) => pos += len,
                _ => break,
            }
        }
        pos
    }

    fn starts_message(&self, text: &ScanText, pos: usize) -> bool {
        text.chars()
            .get(pos..)
            .is_some_and(|rest| rest.starts_with(&ENVELOPE_HEADER))
            || self.detect_scheme(text, pos) != Scheme::Unknown
    }

    fn detect_scheme(&self, text: &ScanText, pos: usize) -> Scheme {
        let end = text.len();
        if self
            .identifier_at(Syntax::AscMhDataIdentifiers, text, pos, end)
            .is_some()
        {
            Scheme::Ifa
        } else if self
            .identifier_at(Syntax::Gs1ApplicationIdentifiers, text, pos, end)
            .is_some()
        {
            Scheme::Gs1
        } else {
            Scheme::Unknown
        }
    }

    /// Declared identifier of `syntax` that the text at `pos` starts with
    fn identifier_at(
        &self,
        syntax: Syntax,
        text: &ScanText,
        pos: usize,
        end: usize,
    ) -> Option<&ElementDefinition> {
        self.catalog
            .longest_prefix(syntax, &text.text(pos..end), &self.recognised)
    }

    /// Read data elements up to `content.end`.
    ///
    /// GS1 elements are concatenated and only variable-length values need a
    /// trailing GS. ASC MH elements are GS-separated. A GS between elements
    /// is skipped in both.
    fn read_fields(
        &self,
        syntax: Syntax,
        text: &ScanText,
        content: Range<usize>,
        id: &mut PackIdentifier,
    ) {
        let Range { start, end } = content;
        let mut pos = start;

        while pos < end {
            if let Some(len) = text.separator_at(pos, Separator::Gs) {
                pos += len;
                continue;
            }

            let Some(def) = self.identifier_at(syntax, text, pos, end) else {
                let field_end = (pos..end)
                    .find(|&p| text.separator_at(p, Separator::Gs).is_some())
                    .unwrap_or(end);
                id.diagnostics.push(ParseError::UnrecognisedElement {
                    syntax,
                    offset: pos - start,
                    found: text.text(pos..field_end),
                });
                if syntax == Syntax::Gs1ApplicationIdentifiers {
                    break;
                }
                pos = field_end;
                continue;
            };

            let value_start = pos + def.code.chars().count();
            let value_end = self.value_end(syntax, def.length, text, value_start, end);
            self.accept(def, text.text(value_start..value_end), id);
            pos = value_end;
        }
    }

    /// End of the value starting at `start`.
    ///
    /// A GS code always ends a value. Substitutes are never looked for inside
    /// a fixed-length value. In a variable-length value a GS substitute ends
    /// the value only when a declared identifier follows it; digits that
    /// spell a substitute followed by an identifier remain ambiguous and are
    /// read as a separator.
    fn value_end(
        &self,
        syntax: Syntax,
        length: LengthRule,
        text: &ScanText,
        start: usize,
        end: usize,
    ) -> usize {
        let fixed_end = match length {
            LengthRule::Fixed(n) => Some((start + n).min(end)),
            LengthRule::Variable { .. } => None,
        };

        for pos in start..end {
            if text.chars()[pos] == GS {
                return pos;
            }
            let substitute = text
                .substitute_at(pos)
                .filter(|&(separator, _)| separator == Separator::Gs);
            let ends = match (fixed_end, substitute) {
                // GS1 needs no separator after a fixed-length value
                (Some(fixed_end), _) if syntax == Syntax::Gs1ApplicationIdentifiers => {
                    pos == fixed_end
                }
                (Some(fixed_end), Some(_)) => pos >= fixed_end,
                (None, Some((_, len))) => {
                    self.identifier_at(syntax, text, pos + len, end).is_some()
                }
                _ => false,
            };
            if ends {
                return pos;
            }
        }
        end
    }

    fn accept(&self, def: &ElementDefinition, value: String, id: &mut PackIdentifier) {
        if let Some(existing) = id.element(&def.code) {
            if existing.value != value {
                id.diagnostics.push(ParseError::DuplicateElement {
                    code: def.code.clone(),
                });
            }
            return;
        }

        let (date, errors) = validate::validate(def, &value, self.config.century);
        id.diagnostics.extend(errors);

        match def.role {
            FieldRole::ProductCode => {
                id.product_code.get_or_insert_with(|| value.clone());
            }
            FieldRole::SerialNumber => {
                id.serial_number.get_or_insert_with(|| value.clone());
            }
            FieldRole::BatchIdentifier => {
                id.batch_identifier.get_or_insert_with(|| value.clone());
            }
            FieldRole::Expiry => {
                if id.expiry.is_none() {
                    id.expiry = date;
                }
            }
            FieldRole::Other => {}
        }

        id.elements.push(DataElement {
            code: def.code.clone(),
            value,
            role: def.role,
        });
    }
}
