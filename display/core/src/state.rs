//! Display State
//!
//! The canonical, renderer-independent description of what the screen shows.
//! Only the dispatcher mutates it. Power is just another field: commands keep
//! applying while the display is off, and the renderer decides what to hide.

use serde::{Deserialize, Serialize};

use crate::command::{Alignment, Command, Region};
use crate::config::InitialDisplay;

/// Everything the rendering surface needs apart from the clock
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    /// Region order on screen
    pub layout: Vec<Region>,
    /// Clue alignment
    pub alignment: Alignment,
    /// Palette token for timer and clue text
    pub color: String,
    /// Current clue text
    pub clue: String,
    /// Shown image, `None` when the image region is empty
    pub image: Option<String>,
    /// Background token, `None` before any background was set
    pub background: Option<String>,
    /// Whether the regions are visible
    pub powered: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::from_initial(&InitialDisplay::default())
    }
}

impl DisplayState {
    /// Startup state from configuration
    #[must_use]
    pub fn from_initial(initial: &InitialDisplay) -> Self {
        Self {
            layout: dedup_regions(&initial.layout),
            alignment: initial.alignment,
            color: initial.color.clone(),
            clue: String::new(),
            image: None,
            background: initial.background.clone(),
            powered: initial.power,
        }
    }

    /// Apply a command to the display fields
    ///
    /// Returns `false` when the command leaves the display fields alone: an
    /// empty layout, or a timer command (the clock lives in the timer engine).
    pub fn apply_command(&mut self, cmd: &Command) -> bool {
        match cmd {
            Command::SetLayout(regions) => {
                if regions.is_empty() {
                    return false;
                }
                self.layout = dedup_regions(regions);
            }
            Command::SetAlignment(alignment) => {
                self.alignment = *alignment;
            }
            Command::SetColor(color) => {
                self.color.clone_from(color);
            }
            Command::SetClue(text) => {
                self.clue.clone_from(text);
            }
            Command::SetImage(image) => {
                self.image.clone_from(image);
            }
            Command::SetBackground(background) => {
                self.background = Some(background.clone());
            }
            Command::SetPower(on) => {
                self.powered = *on;
            }
            Command::SetTimerSpeed(_) | Command::SetTimerTime(_) => return false,
        }
        true
    }
}

/// Keep the first occurrence of each region
///
/// Regions are keyed by identifier, so `timer timer` is the same layout as
/// `timer`.
fn dedup_regions(regions: &[Region]) -> Vec<Region> {
    let mut out = Vec::with_capacity(regions.len());
    for region in regions {
        if !out.contains(region) {
            out.push(*region);
        }
    }
    out
}
