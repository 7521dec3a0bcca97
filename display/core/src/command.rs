//! Control Protocol Commands
//!
//! One input line is one instruction. This module turns a raw line into typed
//! [`Command`] values, or a [`ParseError`] that carries the offending line.
//!
//! # Grammar
//!
//! The keyword is everything up to the first whitespace run; the rest of the
//! line is the raw argument remainder.
//!
//! ```text
//! layout <region>...          regions: timer | clue | image
//! alignment left|center|right
//! color <token>
//! clue <free text>            literal "\n" becomes a newline
//! timer <speed> [<time>]      "+t" / "-t" adjust, "t" sets absolutely
//! image [<token>|none]
//! background <token>
//! power on|off                anything but "off" means on
//! ```
//!
//! The parser never panics and never touches display state. Blank lines parse
//! to an empty command list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A screen region that can appear in a layout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// The countdown / count-up clock
    Timer,
    /// The clue text
    Clue,
    /// The image gallery slot
    Image,
}

impl Region {
    /// Protocol name of this region
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Clue => "clue",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ParseErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timer" => Ok(Self::Timer),
            "clue" => Ok(Self::Clue),
            "image" => Ok(Self::Image),
            other => Err(ParseErrorKind::UnknownRegion(other.to_string())),
        }
    }
}

/// Horizontal alignment of the clue text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Flush left
    Left,
    /// Centered
    #[default]
    Center,
    /// Flush right
    Right,
}

impl Alignment {
    /// Protocol name of this alignment
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alignment {
    type Err = ParseErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            other => Err(ParseErrorKind::UnknownAlignment(other.to_string())),
        }
    }
}

/// How a `timer` time argument changes the accumulated seconds
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TimeAdjust {
    /// Replace the accumulator (argument had no leading sign)
    Absolute(f64),
    /// Add to the accumulator (argument started with `+` or `-`)
    Relative(f64),
}

impl TimeAdjust {
    /// Parse a time argument; the leading character picks the mode
    pub fn parse(raw: &str) -> Result<Self, ParseErrorKind> {
        let value = parse_finite(raw)?;
        if raw.starts_with(['+', '-']) {
            Ok(Self::Relative(value))
        } else {
            Ok(Self::Absolute(value))
        }
    }
}

/// A single parsed instruction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Arrange the given regions on screen (empty = leave layout alone)
    SetLayout(Vec<Region>),
    /// Align the clue text
    SetAlignment(Alignment),
    /// Palette token for the timer and clue text
    SetColor(String),
    /// Replace the clue text (already newline-decoded)
    SetClue(String),
    /// Change the timer speed multiplier
    SetTimerSpeed(f64),
    /// Change the timer's accumulated seconds
    SetTimerTime(TimeAdjust),
    /// Show an image, or hide the image region with `None`
    SetImage(Option<String>),
    /// Background image token
    SetBackground(String),
    /// Turn the display on or off
    SetPower(bool),
}

impl Command {
    /// Short name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetLayout(_) => "layout",
            Self::SetAlignment(_) => "alignment",
            Self::SetColor(_) => "color",
            Self::SetClue(_) => "clue",
            Self::SetTimerSpeed(_) => "timer_speed",
            Self::SetTimerTime(_) => "timer_time",
            Self::SetImage(_) => "image",
            Self::SetBackground(_) => "background",
            Self::SetPower(_) => "power",
        }
    }
}

/// Why a line failed to parse
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// First word is not a protocol keyword
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Keyword needs an argument that was not given
    #[error("'{0}' requires an argument")]
    MissingArgument(&'static str),

    /// More arguments than the keyword accepts
    #[error("'{keyword}' got unexpected argument '{extra}'")]
    UnexpectedArgument {
        /// Keyword being parsed
        keyword: &'static str,
        /// First surplus token
        extra: String,
    },

    /// Layout token outside {timer, clue, image}
    #[error("unknown layout region '{0}'")]
    UnknownRegion(String),

    /// Alignment other than left/center/right
    #[error("unknown alignment '{0}'")]
    UnknownAlignment(String),

    /// Numeric argument could not be read as a finite float
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// A line that could not be turned into commands
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} (line: {line:?})")]
pub struct ParseError {
    /// The original input line
    pub line: String,
    /// What went wrong
    pub kind: ParseErrorKind,
}

/// Parse one protocol line (without its terminator)
///
/// Returns an empty list for blank lines. `timer` with a time argument yields
/// two commands: the speed change followed by the time change.
///
/// # Errors
///
/// Returns [`ParseError`] for unknown keywords and argument grammar mismatches.
pub fn parse_line(line: &str) -> Result<Vec<Command>, ParseError> {
    parse_inner(line).map_err(|kind| ParseError {
        line: line.to_string(),
        kind,
    })
}

fn parse_inner(line: &str) -> Result<Vec<Command>, ParseErrorKind> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let (keyword, rest) = split_keyword(trimmed);

    let command = match keyword {
        "layout" => Command::SetLayout(
            rest.split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()?,
        ),
        "alignment" => Command::SetAlignment(single_token("alignment", rest)?.parse()?),
        "color" => Command::SetColor(required("color", rest)?),
        "clue" => Command::SetClue(decode_newlines(rest)),
        "timer" => return parse_timer(rest),
        "image" => {
            let token = rest.trim();
            if token.is_empty() || token == "none" {
                Command::SetImage(None)
            } else {
                Command::SetImage(Some(token.to_string()))
            }
        }
        "background" => Command::SetBackground(required("background", rest)?),
        "power" => Command::SetPower(single_token("power", rest)? != "off"),
        other => return Err(ParseErrorKind::UnknownCommand(other.to_string())),
    };

    Ok(vec![command])
}

/// Split at the first whitespace run; no whitespace means an empty remainder
fn split_keyword(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(idx) => {
            let (keyword, rest) = line.split_at(idx);
            (keyword, rest.trim_start())
        }
        None => (line, ""),
    }
}

fn parse_timer(rest: &str) -> Result<Vec<Command>, ParseErrorKind> {
    let mut args = rest.split_whitespace();
    let speed = args
        .next()
        .ok_or(ParseErrorKind::MissingArgument("timer"))?;
    let mut commands = vec![Command::SetTimerSpeed(parse_finite(speed)?)];

    if let Some(time) = args.next() {
        commands.push(Command::SetTimerTime(TimeAdjust::parse(time)?));
    }
    if let Some(extra) = args.next() {
        return Err(ParseErrorKind::UnexpectedArgument {
            keyword: "timer",
            extra: extra.to_string(),
        });
    }

    Ok(commands)
}

fn required(keyword: &'static str, rest: &str) -> Result<String, ParseErrorKind> {
    let token = rest.trim();
    if token.is_empty() {
        Err(ParseErrorKind::MissingArgument(keyword))
    } else {
        Ok(token.to_string())
    }
}

fn single_token<'a>(keyword: &'static str, rest: &'a str) -> Result<&'a str, ParseErrorKind> {
    let mut tokens = rest.split_whitespace();
    let token = tokens
        .next()
        .ok_or(ParseErrorKind::MissingArgument(keyword))?;
    match tokens.next() {
        Some(extra) => Err(ParseErrorKind::UnexpectedArgument {
            keyword,
            extra: extra.to_string(),
        }),
        None => Ok(token),
    }
}

/// Rust accepts "inf" and "NaN"; neither is a usable speed or time
fn parse_finite(raw: &str) -> Result<f64, ParseErrorKind> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseErrorKind::InvalidNumber(raw.to_string())),
    }
}

/// Replace the two-character sequence `\n` with a real newline
#[must_use]
pub fn decode_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}
