use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)-cada\s+([0-9]+)([mhd])").expect("valid recurrence marker regex")
});

const MINUTES_PER_HOUR: u64 = 60;
const MINUTES_PER_DAY: u64 = 24 * MINUTES_PER_HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceUnit {
    Minutes,
    Hours,
    Days,
}

impl RecurrenceUnit {
    fn from_char(ch: char) -> Option<Self> {
        match ch.to_ascii_lowercase() {
            'm' => Some(Self::Minutes),
            'h' => Some(Self::Hours),
            'd' => Some(Self::Days),
            _ => None,
        }
    }

    pub fn minutes_per_unit(self) -> u64 {
        match self {
            Self::Minutes => 1,
            Self::Hours => MINUTES_PER_HOUR,
            Self::Days => MINUTES_PER_DAY,
        }
    }
}

/// A `-cada <N><unit>` marker found in task text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceMarker {
    pub amount: u64,
    pub unit: RecurrenceUnit,
    /// Byte range of the whole marker in the scanned text.
    pub span: Range<usize>,
}

impl RecurrenceMarker {
    /// Interval in minutes, `None` when it does not fit a `u32`.
    pub fn minutes(&self) -> Option<u32> {
        self.amount
            .checked_mul(self.unit.minutes_per_unit())
            .and_then(|minutes| u32::try_from(minutes).ok())
    }
}

/// Finds the leftmost `-cada\s+\d+[mhd]` marker, case-insensitively.
///
/// A unit outside m/h/d makes that occurrence a non-match; the text is left
/// for the date parser.
pub fn find_marker(text: &str) -> Option<RecurrenceMarker> {
    let captures = MARKER_RE.captures(text)?;
    let whole = captures.get(0)?;
    let unit = captures
        .get(2)
        .and_then(|unit| unit.as_str().chars().next())
        .and_then(RecurrenceUnit::from_char)?;

    // Digit runs too long for u64 are treated as unrepresentable intervals.
    let amount = captures
        .get(1)
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
        .unwrap_or(u64::MAX);

    Some(RecurrenceMarker {
        amount,
        unit,
        span: whole.range(),
    })
}

/// Result of pulling a recurrence marker out of raw task text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedText {
    pub clean_text: String,
    pub interval_minutes: Option<u32>,
}

/// Removes the first marker and converts it to minutes.
///
/// Intervals below `min_minutes`, or too large for a `u32`, are rejected.
pub fn strip_marker(text: &str, min_minutes: u32) -> Result<StrippedText, AppError> {
    let Some(marker) = find_marker(text) else {
        return Ok(StrippedText {
            clean_text: text.trim().to_string(),
            interval_minutes: None,
        });
    };

    let minutes = marker
        .minutes()
        .ok_or_else(|| AppError::invalid_interval("recurrence interval is too large"))?;
    if minutes < min_minutes {
        return Err(AppError::invalid_interval(format!(
            "recurrence interval must be at least {min_minutes} min"
        )));
    }

    let mut clean_text = String::with_capacity(text.len());
    clean_text.push_str(&text[..marker.span.start]);
    clean_text.push_str(&text[marker.span.end..]);

    Ok(StrippedText {
        clean_text: clean_text.trim().to_string(),
        interval_minutes: Some(minutes),
    })
}
