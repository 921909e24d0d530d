//! Waypoint line format
//!
//! One waypoint per line, as a chat-style command:
//!
//! ```text
//! /wp create <NAME...> <dimension> <x> <y> <z> aqua @p true
//! ```
//!
//! The name is the only variable-length field and may contain spaces. The
//! decoder finds the dimension by scanning for the first namespaced token
//! (`ns:path`) after the first name token, which means a name that itself
//! contains such a token cannot be decoded faithfully.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{LineError, LineResult};

pub const COMMAND_TAG: &str = "/wp";
pub const CREATE_TAG: &str = "create";
pub const COLOR_TAG: &str = "aqua";
pub const TARGET_TAG: &str = "@p";
pub const FLAG_TAG: &str = "true";

const MIN_TOKENS: usize = 7;
const NAME_START: usize = 2;

static DIMENSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+:\S+$").expect("dimension pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedWaypoint {
    pub name: String,
    pub dimension: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ParsedWaypoint {
    pub fn new(
        name: impl Into<String>,
        dimension: impl Into<String>,
        x: i32,
        y: i32,
        z: i32,
    ) -> Self {
        Self {
            name: name.into(),
            dimension: dimension.into(),
            x,
            y,
            z,
        }
    }
}

pub fn is_dimension_token(token: &str) -> bool {
    DIMENSION_PATTERN.is_match(token)
}

/// True when the name contains a token the decoder would take for the
/// dimension, so `decode(encode(w))` would not give `w` back.
pub fn is_ambiguous_name(name: &str) -> bool {
    name.split(' ').skip(1).any(is_dimension_token)
}

pub fn encode(waypoint: &ParsedWaypoint) -> String {
    if is_ambiguous_name(&waypoint.name) {
        warn!(
            "Waypoint name '{}' contains a namespaced token and will not decode cleanly",
            waypoint.name
        );
    }
    format!(
        "{} {} {} {} {} {} {} {} {} {}",
        COMMAND_TAG,
        CREATE_TAG,
        waypoint.name,
        waypoint.dimension,
        waypoint.x,
        waypoint.y,
        waypoint.z,
        COLOR_TAG,
        TARGET_TAG,
        FLAG_TAG
    )
}

pub fn decode(line: &str) -> LineResult<ParsedWaypoint> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() < MIN_TOKENS {
        return Err(LineError::MalformedLine(line.to_string()));
    }

    let dimension_index = (NAME_START + 1..parts.len() - 3)
        .find(|&i| is_dimension_token(parts[i]))
        .ok_or_else(|| LineError::MalformedLine(line.to_string()))?;

    let name = parts[NAME_START..dimension_index].join(" ");
    let coordinate = |offset: usize| -> LineResult<i32> {
        let token = parts[dimension_index + offset];
        token.parse::<i32>().map_err(|_| LineError::InvalidCoordinate {
            token: token.to_string(),
            line: line.to_string(),
        })
    };

    Ok(ParsedWaypoint {
        name,
        dimension: parts[dimension_index].to_string(),
        x: coordinate(1)?,
        y: coordinate(2)?,
        z: coordinate(3)?,
    })
}

/// Result of decoding a whole line file.
#[derive(Debug, Clone, Default)]
pub struct DecodedLines {
    pub waypoints: Vec<ParsedWaypoint>,
    pub errors: Vec<(usize, LineError)>,
}

/// Decodes every non-blank line. Bad lines are collected with their
/// 1-based line number and decoding carries on.
pub fn decode_lines(text: &str) -> DecodedLines {
    let mut decoded = DecodedLines::default();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match decode(line) {
            Ok(waypoint) => decoded.waypoints.push(waypoint),
            Err(err) => decoded.errors.push((index + 1, err)),
        }
    }
    decoded
}
