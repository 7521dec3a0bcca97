//! Display Messages
//!
//! Notifications sent from the dispatcher to rendering surfaces. Each message
//! is a delta: it names one field that changed and carries its new value, so
//! a surface can redraw only what moved. The one exception is [`Snapshot`],
//! sent once when the dispatcher starts so surfaces begin from a known state.
//!
//! Tokens are forwarded as received. Where the catalog knows a token, the
//! resolved value travels alongside it; an unknown token arrives with `None`
//! and the surface decides how to show it.
//!
//! [`Snapshot`]: DisplayMessage::Snapshot

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::command::{Alignment, Region};
use crate::config::Rgba;
use crate::state::DisplayState;
use crate::timer::TimerSnapshot;

/// Messages from the dispatcher to rendering surfaces
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayMessage {
    /// Full state, sent when the dispatcher starts
    Snapshot {
        /// Display fields
        state: DisplayState,
        /// Clock
        timer: TimerSnapshot,
    },

    /// Region order changed
    Layout {
        /// New region order
        regions: Vec<Region>,
    },

    /// Clue alignment changed
    Alignment {
        /// New alignment
        alignment: Alignment,
    },

    /// Text color changed
    Color {
        /// Token as received
        token: String,
        /// Palette entry, if the token is known
        rgba: Option<Rgba>,
    },

    /// Clue text changed
    Clue {
        /// New text (may contain newlines)
        text: String,
    },

    /// Image changed or hidden
    Image {
        /// Token as received, `None` to hide
        key: Option<String>,
        /// Catalog file, if the token is known
        path: Option<PathBuf>,
    },

    /// Background changed
    Background {
        /// Token as received
        key: String,
        /// Catalog file, if the token is known
        path: Option<PathBuf>,
    },

    /// Display turned on or off
    Power {
        /// Whether regions should be visible
        on: bool,
    },

    /// Clock value after a timer command or a tick
    Timer(TimerSnapshot),
}

impl DisplayMessage {
    /// Short name used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::Layout { .. } => "layout",
            Self::Alignment { .. } => "alignment",
            Self::Color { .. } => "color",
            Self::Clue { .. } => "clue",
            Self::Image { .. } => "image",
            Self::Background { .. } => "background",
            Self::Power { .. } => "power",
            Self::Timer(_) => "timer",
        }
    }
}
