//! Camelot wheel notation (1A-12B) and the key-distance rule used for
//! harmonic mixing.
//!
//! - Numbers 1-12 walk the circle of fifths
//! - 'A' = minor, 'B' = major
//! - Same number, other letter = relative major/minor

use crate::key::{Key, Mode, PitchClass};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Camelot number for each major tonic, indexed by pitch class (C = 0).
/// B→1B, F#→2B, C#→3B, G#→4B, D#→5B, A#→6B, F→7B, C→8B, G→9B, D→10B, A→11B, E→12B
const MAJOR_NUMBERS: [u8; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];

/// Camelot number for each minor tonic, indexed by pitch class (C = 0).
/// G#→1A, D#→2A, A#→3A, F→4A, C→5A, G→6A, D→7A, A→8A, E→9A, B→10A, F#→11A, C#→12A
const MINOR_NUMBERS: [u8; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];

/// Key distance reported when either code can't be parsed. Large enough to
/// sink the candidate below any real match.
pub const MALFORMED_KEY_DISTANCE: u32 = 999;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid Camelot code: {0:?}")]
pub struct ParseCamelotError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Letter {
    /// Minor
    A,
    /// Major
    B,
}

impl Letter {
    pub fn mode(self) -> Mode {
        match self {
            Letter::A => Mode::Minor,
            Letter::B => Mode::Major,
        }
    }

    fn from_mode(mode: Mode) -> Self {
        match mode {
            Mode::Minor => Letter::A,
            Mode::Major => Letter::B,
        }
    }
}

/// A position on the Camelot wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CamelotCode {
    number: u8,
    letter: Letter,
}

impl CamelotCode {
    /// `number` must be 1-12.
    pub fn new(number: u8, letter: Letter) -> Option<Self> {
        (1..=12)
            .contains(&number)
            .then_some(Self { number, letter })
    }

    pub fn number(self) -> u8 {
        self.number
    }

    pub fn letter(self) -> Letter {
        self.letter
    }

    pub fn from_key(key: Key) -> Self {
        let table = match key.mode {
            Mode::Major => &MAJOR_NUMBERS,
            Mode::Minor => &MINOR_NUMBERS,
        };
        Self {
            number: table[key.tonic.index()],
            letter: Letter::from_mode(key.mode),
        }
    }

    /// The single key sitting at this wheel position.
    pub fn key(self) -> Key {
        let mode = self.letter.mode();
        let table = match mode {
            Mode::Major => &MAJOR_NUMBERS,
            Mode::Minor => &MINOR_NUMBERS,
        };
        let tonic = table
            .iter()
            .position(|&n| n == self.number)
            .map(PitchClass::new)
            .unwrap_or_else(|| unreachable!("wheel tables cover every number 1-12"));
        Key::new(tonic, mode)
    }

    /// Steps between the two wheel numbers going the short way round (0-6).
    pub fn wheel_steps(self, other: CamelotCode) -> u32 {
        let diff = (self.number as i32 - other.number as i32).unsigned_abs();
        diff.min(12 - diff)
    }

    /// Mixing distance between two codes: 0 identical, 1 relative
    /// major/minor, 2 one step, 4 two steps, 6 + steps further along the same
    /// letter, 8 for a different letter and number.
    pub fn distance(self, other: CamelotCode) -> u32 {
        if self == other {
            return 0;
        }
        if self.number == other.number {
            return 1;
        }
        if self.letter != other.letter {
            return 8;
        }
        match self.wheel_steps(other) {
            1 => 2,
            2 => 4,
            steps => 6 + steps,
        }
    }
}

impl fmt::Display for CamelotCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.letter {
            Letter::A => 'A',
            Letter::B => 'B',
        };
        write!(f, "{}{}", self.number, letter)
    }
}

impl FromStr for CamelotCode {
    type Err = ParseCamelotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCamelotError(s.to_string());
        let trimmed = s.trim();
        let split = trimmed.len().checked_sub(1).ok_or_else(err)?;
        if !trimmed.is_char_boundary(split) {
            return Err(err());
        }
        let (digits, letter) = trimmed.split_at(split);
        let letter = match letter {
            "A" | "a" => Letter::A,
            "B" | "b" => Letter::B,
            _ => return Err(err()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let number: u8 = digits.parse().map_err(|_| err())?;
        CamelotCode::new(number, letter).ok_or_else(err)
    }
}

/// Map a key onto the wheel. Unknown key → `None`.
pub fn to_camelot(key: Option<&Key>) -> Option<CamelotCode> {
    key.map(|k| CamelotCode::from_key(*k))
}

/// Map a textual key label such as `"A minor"`. Unknown or malformed labels
/// give `None`.
pub fn key_label_to_camelot(label: &str) -> Option<CamelotCode> {
    label.parse::<Key>().ok().map(CamelotCode::from_key)
}

/// Distance between two textual Camelot codes, or
/// [`MALFORMED_KEY_DISTANCE`] if either doesn't parse.
pub fn camelot_distance(a: &str, b: &str) -> u32 {
    match (a.parse::<CamelotCode>(), b.parse::<CamelotCode>()) {
        (Ok(a), Ok(b)) => a.distance(b),
        _ => MALFORMED_KEY_DISTANCE,
    }
}
