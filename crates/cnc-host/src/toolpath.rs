//! Toolpath record parser.
//!
//! One record per line, `;` starts a comment. Coordinate words are a letter
//! immediately followed by a number (`X10.5`, `F600`, `I-10`); the leading
//! keyword selects the operation.

use motion::MAX_AXES;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ToolpathError {
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: bad word `{word}`")]
    BadWord { line: usize, word: String },
}

/// A parsed toolpath record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Line {
        axes: [Option<f32>; MAX_AXES],
        feed: Option<f32>,
    },
    Arc {
        axes: [Option<f32>; MAX_AXES],
        offset_a: f32,
        offset_b: f32,
        feed: Option<f32>,
        clockwise: bool,
    },
    Dwell {
        ms: u32,
    },
    Probe {
        axes: [Option<f32>; MAX_AXES],
        feed: Option<f32>,
        no_alarm: bool,
    },
    Home,
    Pause,
}

fn axis_index(letter: char) -> Option<usize> {
    "XYZABC".find(letter.to_ascii_uppercase())
}

struct Words {
    axes: [Option<f32>; MAX_AXES],
    feed: Option<f32>,
    offset_a: f32,
    offset_b: f32,
    dwell_ms: u32,
    clockwise: bool,
    ccw: bool,
    no_alarm: bool,
}

fn parse_words<'a>(
    words: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<Words, ToolpathError> {
    let mut parsed = Words {
        axes: [None; MAX_AXES],
        feed: None,
        offset_a: 0.0,
        offset_b: 0.0,
        dwell_ms: 0,
        clockwise: false,
        ccw: false,
        no_alarm: false,
    };

    for word in words {
        match word.to_ascii_lowercase().as_str() {
            "cw" => {
                parsed.clockwise = true;
                continue;
            }
            "ccw" => {
                parsed.ccw = true;
                continue;
            }
            "noalarm" => {
                parsed.no_alarm = true;
                continue;
            }
            _ => {}
        }

        let bad = || ToolpathError::BadWord {
            line,
            word: word.to_string(),
        };
        let mut chars = word.chars();
        let letter = chars.next().ok_or_else(bad)?;
        let value: f32 = chars.as_str().parse().map_err(|_| bad())?;

        if let Some(axis) = axis_index(letter) {
            parsed.axes[axis] = Some(value);
        } else {
            match letter.to_ascii_uppercase() {
                'F' => parsed.feed = Some(value),
                'I' => parsed.offset_a = value,
                'J' => parsed.offset_b = value,
                'P' => parsed.dwell_ms = value as u32,
                _ => return Err(bad()),
            }
        }
    }

    Ok(parsed)
}

/// Parses one toolpath line; returns `None` for blanks and comments.
pub fn parse_record(text: &str, line: usize) -> Result<Option<Record>, ToolpathError> {
    let clean = text.split(';').next().unwrap_or("").trim();
    if clean.is_empty() {
        return Ok(None);
    }

    let mut words = clean.split_whitespace();
    let command = words.next().unwrap_or("").to_ascii_lowercase();
    let parsed = parse_words(words, line)?;

    let record = match command.as_str() {
        "line" => Record::Line {
            axes: parsed.axes,
            feed: parsed.feed,
        },
        "arc" => Record::Arc {
            axes: parsed.axes,
            offset_a: parsed.offset_a,
            offset_b: parsed.offset_b,
            feed: parsed.feed,
            clockwise: parsed.clockwise && !parsed.ccw,
        },
        "dwell" => Record::Dwell { ms: parsed.dwell_ms },
        "probe" => Record::Probe {
            axes: parsed.axes,
            feed: parsed.feed,
            no_alarm: parsed.no_alarm,
        },
        "home" => Record::Home,
        "pause" => Record::Pause,
        unknown => {
            return Err(ToolpathError::UnknownCommand {
                line,
                command: unknown.to_string(),
            })
        }
    };

    Ok(Some(record))
}
