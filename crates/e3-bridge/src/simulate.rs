//! Replays recorded telemetry through a bridge.
//!
//! Input is line based: `<topic> <payload>`, split at the first space.
//! Blank lines and lines starting with `#` are ignored.

use std::io::BufRead;

use tracing::debug;

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::publisher::Publisher;

/// Counters of one simulation run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulationStats {
    /// Lines handed to the bridge
    pub messages: usize,
    /// Non-comment lines without a payload
    pub skipped: usize,
    pub published: usize,
}

/// Outcome of parsing one input line
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    Message { topic: &'a str, payload: &'a str },
    Comment,
    Malformed,
}

pub fn parse_line(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Line::Comment;
    }
    match line.split_once(' ') {
        Some((topic, payload)) => Line::Message { topic, payload },
        None => Line::Malformed,
    }
}

pub fn simulate<P: Publisher, R: BufRead>(
    bridge: &mut Bridge<P>,
    input: R,
) -> BridgeResult<SimulationStats> {
    let mut stats = SimulationStats::default();

    for line in input.lines() {
        let line = line.map_err(BridgeError::Input)?;
        match parse_line(&line) {
            Line::Message { topic, payload } => {
                stats.messages += 1;
                stats.published += bridge.handle_message(topic, payload.as_bytes())?;
            }
            Line::Comment => {}
            Line::Malformed => {
                debug!("Skipping line without payload: {}", line.trim());
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}
