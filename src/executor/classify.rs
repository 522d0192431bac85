//! Failure classification for captured build output.
//!
//! Classification only shapes the diagnostic; it never changes how many
//! attempts a stage gets.

use crate::error::FailureKind;
use crate::process::{CommandOutput, TAIL_LINES};

/// Lower-case substrings that indicate storage exhaustion.
pub const SPACE_MARKERS: &[&str] = &[
    "no space left",
    "not enough space",
    "disk full",
    "insufficient storage",
    "insufficient disk",
    "espacio insuficiente",
    "enospc",
];

/// Lower-case substrings of generic toolchain failures.
pub const ERROR_MARKERS: &[&str] = &["error:", "exception", "failed", "could not"];

const SPACE_LINES: usize = 3;
const ERROR_LINES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: FailureKind,
    /// Excerpt of the output most likely to explain the failure.
    pub diagnostic: String,
    /// Last lines of the captured output, regardless of markers.
    pub tail: String,
}

impl Classification {
    /// Diagnostic excerpt followed by the output tail when the tail adds
    /// lines the excerpt does not already show.
    pub fn report(&self) -> String {
        let tail = self.tail.trim_end();
        if tail.is_empty() || self.diagnostic.ends_with(tail) {
            self.diagnostic.clone()
        } else if self.diagnostic.is_empty() {
            tail.to_string()
        } else {
            format!("{}\n--- last output ---\n{}", self.diagnostic, tail)
        }
    }
}

fn matching_lines(text: &str, markers: &[&str], limit: usize) -> Vec<String> {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            markers.iter().any(|m| lower.contains(m))
        })
        .take(limit)
        .map(|l| l.trim().to_string())
        .collect()
}

pub fn classify(output: &CommandOutput) -> Classification {
    let text = output.combined();
    let space = matching_lines(&text, SPACE_MARKERS, SPACE_LINES);
    let errors = matching_lines(&text, ERROR_MARKERS, ERROR_LINES);

    let kind = if output.timed_out {
        FailureKind::Timeout
    } else if !space.is_empty() {
        FailureKind::Space
    } else {
        FailureKind::Toolchain
    };

    let tail = output.tail(TAIL_LINES);
    let diagnostic = if !space.is_empty() {
        space.join("\n")
    } else if !errors.is_empty() {
        errors.join("\n")
    } else {
        tail.clone()
    };

    let diagnostic = if output.timed_out {
        format!("timed out\n{}", diagnostic).trim_end().to_string()
    } else {
        diagnostic
    };

    Classification {
        kind,
        diagnostic,
        tail,
    }
}
