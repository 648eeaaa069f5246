use crate::key::Mode;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Spectral centroid (Hz) treated as fully bright.
const BRIGHTNESS_CEILING_HZ: f64 = 3500.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown mood: {0:?}")]
pub struct ParseMoodError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mood {
    Energetic,
    Uplifting,
    Dark,
    Intense,
    Chill,
    Melancholic,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Energetic,
        Mood::Uplifting,
        Mood::Dark,
        Mood::Intense,
        Mood::Chill,
        Mood::Melancholic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Energetic => "Energetic",
            Mood::Uplifting => "Uplifting",
            Mood::Dark => "Dark",
            Mood::Intense => "Intense",
            Mood::Chill => "Chill",
            Mood::Melancholic => "Melancholic",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ParseMoodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseMoodError(s.to_string()))
    }
}

/// Spectral centroid scaled to 0-1 against a 3.5 kHz ceiling.
pub fn normalized_brightness(centroid_hz: f64) -> f64 {
    (centroid_hz / BRIGHTNESS_CEILING_HZ).min(1.0)
}

/// Classify a track's mood from tempo (BPM), mean RMS energy, mean spectral
/// centroid (Hz) and the mode of its key.
///
/// Rules are checked top to bottom and the first match wins. Tempo bands:
/// above 145, above 125 with high energy, 110 and up, 95 and up, below 95.
pub fn classify_mood(tempo_bpm: f64, energy: f64, brightness_hz: f64, mode: Mode) -> Mood {
    let bright = normalized_brightness(brightness_hz);
    let major = mode.is_major();

    if tempo_bpm > 145.0 {
        return Mood::Energetic;
    }

    if tempo_bpm > 125.0 && energy > 0.12 {
        return if major || bright > 0.5 {
            Mood::Energetic
        } else {
            Mood::Intense
        };
    }

    // 110-125, plus fast tracks that missed the high-energy rule above
    if tempo_bpm >= 110.0 {
        return if bright > 0.55 && energy > 0.08 {
            Mood::Uplifting
        } else if bright < 0.3 && energy < 0.11 {
            Mood::Dark
        } else if energy > 0.13 && !major {
            Mood::Intense
        } else {
            Mood::Energetic
        };
    }

    if tempo_bpm >= 95.0 {
        return if energy < 0.08 {
            Mood::Chill
        } else if major && bright > 0.5 {
            Mood::Uplifting
        } else if bright < 0.3 {
            Mood::Dark
        } else {
            Mood::Chill
        };
    }

    if energy < 0.07 {
        Mood::Chill
    } else if !major && bright < 0.4 {
        Mood::Melancholic
    } else if major {
        Mood::Uplifting
    } else if energy > 0.1 && bright > 0.4 {
        Mood::Uplifting
    } else {
        Mood::Chill
    }
}
