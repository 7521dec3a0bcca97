//! Headless stdout surface
//!
//! Writes every display message as one line on an async writer (stdout in
//! the daemon). `json` output is meant for a rendering process on the other
//! end of a pipe; `text` is for people watching a terminal.

use clap::ValueEnum;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use cluedisplay_core::DisplayMessage;

/// Line format of the stdout surface
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Short human-readable lines
    Text,
}

/// Render one message as a single line (without terminator)
pub fn format_message(message: &DisplayMessage, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(message),
        OutputFormat::Text => Ok(text_line(message)),
    }
}

fn text_line(message: &DisplayMessage) -> String {
    match message {
        DisplayMessage::Snapshot { state, timer } => {
            let layout: Vec<&str> = state.layout.iter().map(|r| r.as_str()).collect();
            format!(
                "snapshot power={} layout={} alignment={} color={} clock={}",
                on_off(state.powered),
                layout.join(","),
                state.alignment,
                state.color,
                timer.display
            )
        }
        DisplayMessage::Layout { regions } => {
            let names: Vec<&str> = regions.iter().map(|r| r.as_str()).collect();
            format!("layout {}", names.join(" "))
        }
        DisplayMessage::Alignment { alignment } => format!("alignment {alignment}"),
        DisplayMessage::Color { token, rgba } => match rgba {
            Some(rgba) => format!("color {token} {rgba}"),
            None => format!("color {token} (not in palette)"),
        },
        DisplayMessage::Clue { text } => format!("clue {}", text.replace('\n', "\\n")),
        DisplayMessage::Image { key, path } => match (key, path) {
            (None, _) => "image none".to_string(),
            (Some(key), Some(path)) => format!("image {key} {}", path.display()),
            (Some(key), None) => format!("image {key} (not in catalog)"),
        },
        DisplayMessage::Background { key, path } => match path {
            Some(path) => format!("background {key} {}", path.display()),
            None => format!("background {key} (not in catalog)"),
        },
        DisplayMessage::Power { on } => format!("power {}", on_off(*on)),
        DisplayMessage::Timer(snapshot) => format!("timer {}", snapshot.display),
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Write messages until the dispatcher closes the surface channel
///
/// Returns the number of lines written.
pub async fn render<W>(
    mut rx: mpsc::Receiver<DisplayMessage>,
    mut out: W,
    format: OutputFormat,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(message) = rx.recv().await {
        let line = match format_message(&message, format) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(kind = message.kind(), error = %e, "Could not encode display message");
                continue;
            }
        };
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
        written += 1;
    }

    tracing::debug!(lines = written, "Stdout surface closed");
    Ok(written)
}
