//! Palette and asset catalogs
//!
//! Immutable lookup tables handed to the dispatcher at construction. The core
//! never rejects a token for being absent here; it forwards the token and the
//! lookup result and lets the renderer decide.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An 8-bit RGBA color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha (255 = opaque)
    pub a: u8,
}

impl Rgba {
    /// Build a color from its channels
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Rgba {
    type Err = String;

    /// Parse `"r,g,b"` or `"r,g,b,a"` with channels in 0..=255
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let channels = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u8>()
                    .map_err(|_| format!("invalid color channel '{}'", part.trim()))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        match channels.as_slice() {
            [r, g, b] => Ok(Self::new(*r, *g, *b, 255)),
            [r, g, b, a] => Ok(Self::new(*r, *g, *b, *a)),
            _ => Err(format!("expected 3 or 4 channels, got {}", channels.len())),
        }
    }
}

/// Token lookup tables for colors, images and backgrounds
#[derive(Clone, Debug, PartialEq)]
pub struct AssetCatalog {
    /// Color token -> RGBA
    pub palette: HashMap<String, Rgba>,
    /// Image token -> file
    pub images: HashMap<String, PathBuf>,
    /// Background token -> file
    pub backgrounds: HashMap<String, PathBuf>,
}

impl Default for AssetCatalog {
    /// The two translucent text colors the display has always shipped with
    fn default() -> Self {
        let palette = HashMap::from([
            ("green".to_string(), Rgba::new(0, 255, 0, 180)),
            ("red".to_string(), Rgba::new(255, 0, 0, 180)),
        ]);
        Self {
            palette,
            images: HashMap::new(),
            backgrounds: HashMap::new(),
        }
    }
}

impl AssetCatalog {
    /// Look up a color token
    #[must_use]
    pub fn resolve_color(&self, token: &str) -> Option<Rgba> {
        self.palette.get(token).copied()
    }

    /// Look up an image token
    #[must_use]
    pub fn resolve_image(&self, token: &str) -> Option<&Path> {
        self.images.get(token).map(PathBuf::as_path)
    }

    /// Look up a background token
    #[must_use]
    pub fn resolve_background(&self, token: &str) -> Option<&Path> {
        self.backgrounds.get(token).map(PathBuf::as_path)
    }
}
