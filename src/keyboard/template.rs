//! Canonical calibration template
//!
//! Every probe is compared position by position against this fixed sequence:
//! the 82 printable characters of the GS1 invariant set, four reserved
//! separator slots (GS, FS, RS, US) and a terminating carriage return.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Printable section of the template, in probe order.
pub const PRINTABLE: &str =
    "!\"%&'()*+,-./0123456789:;<=>?ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Number of printable positions in the template
pub const PRINTABLE_LEN: usize = 82;

/// Code that terminates every probe report
pub const TERMINATOR: char = '\r';

/// Marker a host emits in front of a dead-key lead
pub const DEAD_KEY_MARKER: char = '\0';

/// End of transmission, closes an ISO/IEC 15434 envelope
pub const EOT: char = '\u{4}';

/// One of the four reserved separator slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Separator {
    /// Group separator (0x1D), also used to transmit FNC1
    Gs,
    /// File separator (0x1C)
    Fs,
    /// Record separator (0x1E)
    Rs,
    /// Unit separator (0x1F)
    Us,
}

impl Separator {
    /// All separators in template order
    pub const ALL: [Separator; 4] = [Separator::Gs, Separator::Fs, Separator::Rs, Separator::Us];

    /// The ASCII control code this separator stands for
    pub fn code(self) -> char {
        match self {
            Self::Gs => '\u{1d}',
            Self::Fs => '\u{1c}',
            Self::Rs => '\u{1e}',
            Self::Us => '\u{1f}',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Short name, as used in layout fixtures
    pub fn name(self) -> &'static str {
        match self {
            Self::Gs => "GS",
            Self::Fs => "FS",
            Self::Rs => "RS",
            Self::Us => "US",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Template position of each printable character
static POSITIONS: LazyLock<HashMap<char, usize>> =
    LazyLock::new(|| PRINTABLE.chars().enumerate().map(|(i, c)| (c, i)).collect());

/// Printable characters in probe order
pub fn printable() -> impl Iterator<Item = char> {
    PRINTABLE.chars()
}

/// The printable character at `index`, if any
pub fn printable_at(index: usize) -> Option<char> {
    PRINTABLE.chars().nth(index)
}

/// Position of `c` within the printable section
pub fn position(c: char) -> Option<usize> {
    POSITIONS.get(&c).copied()
}

/// Whether `c` is one of the 82 printable template characters
pub fn is_printable(c: char) -> bool {
    POSITIONS.contains_key(&c)
}

/// Barcode data for the baseline probe
pub fn baseline_probe() -> String {
    let mut data = String::with_capacity(PRINTABLE_LEN + 5);
    data.push_str(PRINTABLE);
    data.extend(Separator::ALL.iter().map(|s| s.code()));
    data.push(TERMINATOR);
    data
}

/// Barcode data for the dead-key probe of the character `canonical`.
///
/// Each printable character `p` contributes the triple `canonical p p`: the
/// host reports the dead key, its composition with `p`, then `p` on its own.
pub fn dead_key_probe(canonical: char) -> String {
    let mut data = String::with_capacity(PRINTABLE_LEN * 3 + 1);
    for p in printable() {
        data.push(canonical);
        data.push(p);
        data.push(p);
    }
    data.push(TERMINATOR);
    data
}
