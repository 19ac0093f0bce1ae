//! Note-duration table for a tempo and the unit-aware formatting of its values.
//!
//! All durations are in milliseconds. A whole note lasts `240000 / bpm` ms and
//! every following note value is half of the previous one.

use std::fmt;

const WHOLE_NOTE_MS_AT_ONE_BPM: f64 = 240_000.0;
const MAX_CASCADE_DIGITS: usize = 10;

/// Placeholder for values that have no meaningful duration.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteValue {
    Full,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
    OneTwentyEighth,
    TwoFiftySixth,
    FiveTwelve,
    TenTwentyFour,
}

impl NoteValue {
    /// Every note value, longest first.
    pub const ALL: [NoteValue; 11] = [
        NoteValue::Full,
        NoteValue::Half,
        NoteValue::Quarter,
        NoteValue::Eighth,
        NoteValue::Sixteenth,
        NoteValue::ThirtySecond,
        NoteValue::SixtyFourth,
        NoteValue::OneTwentyEighth,
        NoteValue::TwoFiftySixth,
        NoteValue::FiveTwelve,
        NoteValue::TenTwentyFour,
    ];

    /// Length of the standard ladder (whole note down to 1/128).
    pub const STANDARD_LEN: usize = 8;

    pub fn label(self) -> &'static str {
        match self {
            NoteValue::Full => "1",
            NoteValue::Half => "1/2",
            NoteValue::Quarter => "1/4",
            NoteValue::Eighth => "1/8",
            NoteValue::Sixteenth => "1/16",
            NoteValue::ThirtySecond => "1/32",
            NoteValue::SixtyFourth => "1/64",
            NoteValue::OneTwentyEighth => "1/128",
            NoteValue::TwoFiftySixth => "1/256",
            NoteValue::FiveTwelve => "1/512",
            NoteValue::TenTwentyFour => "1/1024",
        }
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Milliseconds per note value at one tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationTable {
    pub bpm: f64,
    values: [f64; 11],
}

impl DurationTable {
    /// Build the table for `bpm`. Returns `None` for a tempo that is not a
    /// positive finite number.
    pub fn compute(bpm: f64) -> Option<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return None;
        }

        let mut values = [0.0; 11];
        let mut current = WHOLE_NOTE_MS_AT_ONE_BPM / bpm;
        for slot in values.iter_mut() {
            *slot = current;
            current *= 0.5;
        }

        Some(Self { bpm, values })
    }

    pub fn get(&self, note: NoteValue) -> f64 {
        self.values[note as usize]
    }

    /// Same table with every value divided by `divisor`.
    pub fn scaled(&self, divisor: f64) -> Self {
        let mut values = self.values;
        for value in values.iter_mut() {
            *value /= divisor;
        }
        Self {
            bpm: self.bpm,
            values,
        }
    }
}

/// Round to a whole number, carrying upwards one decimal place at a time.
///
/// Starting at the tenths, while the remainder below the current place is at
/// least one half the value is rounded at that place and the next place is
/// examined. `15.469` becomes `15.5` and then `16`, where a single rounding
/// step would give `15`. Negative values are rounded symmetrically.
pub fn round_human_cascading(value: f64) -> f64 {
    if value < 0.0 {
        return -round_human_cascading(-value);
    }

    let mut current = value;
    let mut multiplier = 1.0;
    for _ in 0..MAX_CASCADE_DIGITS {
        multiplier *= 10.0;

        let shifted = current * multiplier;
        let frac = shifted.fract();
        if frac < 0.5 {
            break;
        }
        current = (shifted + 0.5).floor() / multiplier;
    }

    current.round()
}

/// Render a millisecond value with a unit chosen by its magnitude.
///
/// With `round_outputs` the value is cascaded to a whole number first and the
/// unit is picked from the rounded result: seconds with one decimal from
/// 1000 ms, whole milliseconds from 1 ms, whole microseconds below that.
/// Without it the raw value is shown with three decimals.
pub fn format_value(value: f64, round_outputs: bool) -> String {
    if !value.is_finite() || value < 0.0 {
        return NOT_AVAILABLE.to_string();
    }

    if round_outputs {
        let rounded = round_human_cascading(value);
        if rounded >= 1000.0 {
            format!("{:.1} s", rounded / 1000.0)
        } else if rounded >= 1.0 {
            format!("{rounded:.0} ms")
        } else {
            let micros = round_human_cascading(value * 1000.0);
            if micros < 1.0 {
                "<1 μs".to_string()
            } else {
                format!("{micros:.0} μs")
            }
        }
    } else if value >= 1000.0 {
        format!("{:.3} s", value / 1000.0)
    } else if value >= 1.0 {
        format!("{value:.3} ms")
    } else {
        format!("{:.3} μs", value * 1000.0)
    }
}
