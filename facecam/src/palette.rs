use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use thiserror::Error;

/// Scheme used when none is configured.
pub const DEFAULT_SCHEME: &str = "Paired";

/// Number of colors the backend cycles through.
pub const DEFAULT_SIZE: usize = 10;

// ColorBrewer qualitative schemes, in their published order.
const PAIRED: &[u32] = &[
    0xa6cee3, 0x1f78b4, 0xb2df8a, 0x33a02c, 0xfb9a99, 0xe31a1c, 0xfdbf6f, 0xff7f00, 0xcab2d6,
    0x6a3d9a, 0xffff99, 0xb15928,
];
const SET1: &[u32] = &[
    0xe41a1c, 0x377eb8, 0x4daf4a, 0x984ea3, 0xff7f00, 0xffff33, 0xa65628, 0xf781bf, 0x999999,
];
const SET3: &[u32] = &[
    0x8dd3c7, 0xffffb3, 0xbebada, 0xfb8072, 0x80b1d3, 0xfdb462, 0xb3de69, 0xfccde5, 0xd9d9d9,
    0xbc80bd, 0xccebc5, 0xffed6f,
];
const DARK2: &[u32] = &[
    0x1b9e77, 0xd95f02, 0x7570b3, 0xe7298a, 0x66a61e, 0xe6ab02, 0xa6761d, 0x666666,
];

static SCHEMES: Lazy<HashMap<&'static str, &'static [u32]>> = Lazy::new(|| {
    HashMap::from([
        ("paired", PAIRED),
        ("set1", SET1),
        ("set3", SET3),
        ("dark2", DARK2),
    ])
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaletteError {
    #[error("unknown color scheme: {0}")]
    UnknownScheme(String),

    #[error("scheme {scheme} has {available} colors, {requested} requested")]
    BadCount {
        scheme: String,
        requested: usize,
        available: usize,
    },

    #[error("invalid hex color: {0}")]
    InvalidHex(String),
}

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    const fn from_u32(packed: u32) -> Self {
        Self::new((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
    }

    /// Raw `[r, g, b]` components as sent on the wire.
    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Lowercase `#rrggbb`.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl FromStr for Color {
    type Err = PaletteError;

    /// Accepts `#rrggbb` or `rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PaletteError::InvalidHex(s.to_string()));
        }
        let packed =
            u32::from_str_radix(digits, 16).map_err(|_| PaletteError::InvalidHex(s.to_string()))?;
        Ok(Self::from_u32(packed))
    }
}

/// Return the first `count` colors of `scheme`.
///
/// Scheme names are case-insensitive and may carry the `cb-` prefix
/// used by the browser palette library (`cb-Paired`).
pub fn palette(scheme: &str, count: usize) -> Result<Vec<Color>, PaletteError> {
    let lowered = scheme.to_ascii_lowercase();
    let key = lowered.strip_prefix("cb-").unwrap_or(&lowered);
    let table = SCHEMES
        .get(key)
        .ok_or_else(|| PaletteError::UnknownScheme(scheme.to_string()))?;

    if count == 0 || count > table.len() {
        return Err(PaletteError::BadCount {
            scheme: scheme.to_string(),
            requested: count,
            available: table.len(),
        });
    }

    Ok(table[..count].iter().copied().map(Color::from_u32).collect())
}
