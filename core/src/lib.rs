// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Fundamental structs for building short percussion phrases.

/// The [midi] module knows about [MIDI](https://en.wikipedia.org/wiki/MIDI)
/// events and the General MIDI percussion map.
pub mod midi;
/// The [score] module holds the timeline that phrases write onto.
pub mod score;
/// The [time] module handles musical time.
pub mod time;

pub use score::{Score, ScoreError, TimedMessage};
pub use time::BeatValue;

/// The tempo a score gets when nobody says otherwise.
pub const DEFAULT_BPM: u32 = 120;

/// The number of measures a score gets when nobody says otherwise.
pub const DEFAULT_BARS: u32 = 1;
