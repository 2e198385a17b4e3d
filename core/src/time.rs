// Copyright (c) 2023 Mike Tsao. All rights reserved.

use std::time::Duration;
use strum_macros::{Display, EnumIter, EnumString, FromRepr};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// The standard note lengths a [crate::Score] knows how to write. The
/// discriminant is the number of that note that fit in a whole note.
#[derive(Clone, Copy, Debug, Default, Display, EnumIter, EnumString, Eq, FromRepr, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(rename_all = "kebab-case"))]
#[strum(serialize_all = "kebab-case")]
pub enum BeatValue {
    Whole = 1,     // semibreve
    Half = 2,      // minim
    #[default]
    Quarter = 4, // crotchet
    Eighth = 8,    // quaver
    Sixteenth = 16, // semiquaver
    ThirtySecond = 32, // demisemiquaver
    SixtyFourth = 64, // hemidemisemiquaver
}
impl BeatValue {
    /// The shortest standard unit. Single-note renderings last this long.
    pub const SHORTEST: BeatValue = BeatValue::SixtyFourth;

    pub fn divisor(&self) -> u32 {
        *self as u32
    }

    /// Length in beats, where a quarter note is one beat.
    pub fn beats(&self) -> f64 {
        4.0 / self.divisor() as f64
    }
}

/// Converts a position or length in beats to wall-clock time. A zero bpm
/// yields zero, but [crate::Score] never lets one through.
pub fn beats_to_duration(beats: f64, bpm: u32) -> Duration {
    if bpm == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(beats * 60.0 / bpm as f64)
}
