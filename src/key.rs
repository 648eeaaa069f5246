//! Key estimation by matching a chroma vector against rotated
//! Krumhansl-Schmuckler key profiles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pitch class names, index 0 = C.
pub const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Krumhansl-Schmuckler major profile rooted at C.
pub const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Schmuckler minor profile rooted at C.
pub const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Added to the chroma norm so an all-zero vector doesn't divide by zero.
const NORM_EPSILON: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("Unknown pitch class: {0}")]
    PitchClass(String),
    #[error("Unknown mode: {0}")]
    Mode(String),
    #[error("Malformed key label: {0:?}")]
    Malformed(String),
}

/// One of the 12 pitch classes, C = 0 through B = 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    /// Build from any integer, wrapping modulo 12.
    pub fn new(index: usize) -> Self {
        Self((index % 12) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        PITCH_NAMES[self.index()]
    }

    /// All 12 pitch classes in ascending order.
    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0..12).map(PitchClass::new)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PITCH_NAMES
            .iter()
            .position(|&name| name == s)
            .map(PitchClass::new)
            .ok_or_else(|| ParseKeyError::PitchClass(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }

    pub fn is_major(self) -> bool {
        self == Mode::Major
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(Mode::Major),
            "minor" => Ok(Mode::Minor),
            other => Err(ParseKeyError::Mode(other.to_string())),
        }
    }
}

/// A musical key: tonic plus mode. "Unknown" is expressed as `Option<Key>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: PitchClass, mode: Mode) -> Self {
        Self { tonic, mode }
    }

    /// All 24 keys in estimator iteration order (C major, C minor, C# major, ...).
    pub fn all() -> impl Iterator<Item = Key> {
        PitchClass::all().flat_map(|tonic| {
            [Key::new(tonic, Mode::Major), Key::new(tonic, Mode::Minor)]
        })
    }
}

/// Renders as `"C# minor"`.
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

impl FromStr for Key {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tonic, mode) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| ParseKeyError::Malformed(s.to_string()))?;
        Ok(Key::new(tonic.parse()?, mode.trim().parse()?))
    }
}

/// Average a time series of chroma frames (each 12 bins) into one vector.
/// Returns `None` for an empty series or if any frame isn't 12 long.
pub fn mean_chroma(frames: &[Vec<f64>]) -> Option<[f64; 12]> {
    if frames.is_empty() {
        return None;
    }
    let mut mean = [0.0_f64; 12];
    for frame in frames {
        if frame.len() != 12 {
            return None;
        }
        for (acc, &v) in mean.iter_mut().zip(frame) {
            *acc += v;
        }
    }
    let n = frames.len() as f64;
    for m in &mut mean {
        *m /= n;
    }
    Some(mean)
}

/// Scores for all 24 candidate keys, in iteration order (tonic ascending,
/// major before minor). Empty if the input isn't a 12-bin vector.
pub fn key_scores(chroma: &[f64]) -> Vec<(Key, f64)> {
    if chroma.len() != 12 {
        return Vec::new();
    }

    let norm = chroma.iter().map(|v| v * v).sum::<f64>().sqrt();
    let normalized: Vec<f64> = chroma.iter().map(|v| v / (norm + NORM_EPSILON)).collect();

    let major = unit_profile(&MAJOR_PROFILE);
    let minor = unit_profile(&MINOR_PROFILE);

    Key::all()
        .map(|key| {
            let profile = match key.mode {
                Mode::Major => &major,
                Mode::Minor => &minor,
            };
            (key, rotated_dot(&normalized, profile, key.tonic.index()))
        })
        .collect()
}

/// Estimate the key of a time-averaged chroma vector.
///
/// The first strictly-greater score wins, so ties go to the lower tonic and
/// then to major. Returns `None` when there is no usable input.
pub fn estimate_key(chroma: &[f64]) -> Option<Key> {
    let mut best_score = f64::NEG_INFINITY;
    let mut best_key = None;

    for (key, score) in key_scores(chroma) {
        if score > best_score {
            best_score = score;
            best_key = Some(key);
        }
    }

    best_key
}

/// Profiles are compared at unit length so that major and minor templates
/// compete on shape alone.
fn unit_profile(profile: &[f64; 12]) -> [f64; 12] {
    let norm = profile.iter().map(|v| v * v).sum::<f64>().sqrt();
    let mut out = [0.0_f64; 12];
    for (o, &p) in out.iter_mut().zip(profile) {
        *o = p / norm;
    }
    out
}

/// Dot product of `v` with `profile` rotated right by `shift` bins.
fn rotated_dot(v: &[f64], profile: &[f64; 12], shift: usize) -> f64 {
    v.iter()
        .enumerate()
        .map(|(i, &x)| x * profile[(i + 12 - shift) % 12])
        .sum()
}
