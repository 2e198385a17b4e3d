// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{
    midi::{u7, GeneralMidiPercussionProgram, MidiChannel, MidiMessage, PERCUSSION_CHANNEL},
    time::{beats_to_duration, BeatValue},
};
use std::{fmt::Display, time::Duration};

/// Why a [Score] couldn't be built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScoreError {
    InvalidTempo(u32),
    InvalidBars(u32),
}
impl Display for ScoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreError::InvalidTempo(bpm) => write!(f, "tempo must be positive (got {bpm} bpm)"),
            ScoreError::InvalidBars(bars) => write!(
                f,
                "bar count must be between 1 and {} (got {bars})",
                Score::MAX_BARS
            ),
        }
    }
}
impl std::error::Error for ScoreError {}

/// One or more percussion keys struck together.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    /// Position in beats from the start of the score.
    pub at: f64,
    /// Length in beats.
    pub length: f64,
    pub keys: Vec<u8>,
    pub velocity: u8,
}

/// A MIDI message stamped with its offset from the start of playback.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedMessage {
    pub offset: Duration,
    pub channel: MidiChannel,
    pub message: MidiMessage,
}

/// A short timeline of percussion hits, `bars` measures long at `bpm`.
///
/// Phrases get a `&mut Score` (the "drummer") and write onto it with
/// [Score::note], [Score::rest], and the canned patterns. Writing moves a
/// cursor forward; anything that starts past the last bar is dropped when the
/// score is rendered.
#[derive(Clone, Debug)]
pub struct Score {
    bpm: u32,
    bars: u32,
    beats_per_bar: u32,
    channel: MidiChannel,
    velocity: u8,
    cursor: f64,
    hits: Vec<Hit>,
}
impl Score {
    pub const DEFAULT_BEATS_PER_BAR: u32 = 4;
    pub const DEFAULT_VELOCITY: u8 = 100;
    /// Longest fragment a score will hold. Sixteen minutes at 256 bpm.
    pub const MAX_BARS: u32 = 1024;

    pub fn new_with(bpm: u32, bars: u32) -> Result<Self, ScoreError> {
        if bpm == 0 {
            return Err(ScoreError::InvalidTempo(bpm));
        }
        if bars == 0 || bars > Self::MAX_BARS {
            return Err(ScoreError::InvalidBars(bars));
        }
        Ok(Self {
            bpm,
            bars,
            beats_per_bar: Self::DEFAULT_BEATS_PER_BAR,
            channel: PERCUSSION_CHANNEL,
            velocity: Self::DEFAULT_VELOCITY,
            cursor: 0.0,
            hits: Vec::default(),
        })
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    /// Total length of the fragment, in beats.
    pub fn length_in_beats(&self) -> f64 {
        self.bars as f64 * self.beats_per_bar as f64
    }

    /// Where the next note will land, in beats.
    pub fn position(&self) -> f64 {
        self.cursor
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        self.velocity = velocity.min(127);
    }

    pub fn channel(&self) -> MidiChannel {
        self.channel
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Strikes every key in `keys` at once, then advances by `value`. Once the
    /// cursor is past the last bar nothing more is recorded.
    pub fn note(&mut self, value: BeatValue, keys: &[u8]) {
        let velocity = self.velocity;
        self.accent(value, keys, velocity);
    }

    /// Like [Score::note], with an explicit velocity.
    pub fn accent(&mut self, value: BeatValue, keys: &[u8], velocity: u8) {
        let length = value.beats();
        if !keys.is_empty() && self.cursor < self.length_in_beats() {
            self.hits.push(Hit {
                at: self.cursor,
                length,
                keys: keys.iter().map(|k| k & 0x7f).collect(),
                velocity: velocity.min(127),
            });
        }
        self.cursor += length;
    }

    /// Advances the cursor without striking anything.
    pub fn rest(&mut self, value: BeatValue) {
        self.cursor += value.beats();
    }

    /// Four-beat time keeping for every bar: kick on one and three, snare on
    /// two and four, closed hi-hat throughout.
    pub fn metronome4(&mut self) {
        use GeneralMidiPercussionProgram::*;
        for _ in 0..self.bars {
            self.note(BeatValue::Quarter, &[ClosedHiHat.key(), AcousticBassDrum.key()]);
            self.note(BeatValue::Quarter, &[ClosedHiHat.key(), AcousticSnare.key()]);
            self.note(BeatValue::Quarter, &[ClosedHiHat.key(), AcousticBassDrum.key()]);
            self.note(BeatValue::Quarter, &[ClosedHiHat.key(), AcousticSnare.key()]);
        }
    }

    /// Waltz time keeping for every bar: kick on one, snare on two and three.
    pub fn metronome3(&mut self) {
        use GeneralMidiPercussionProgram::*;
        for _ in 0..self.bars {
            self.note(BeatValue::Quarter, &[ClosedHiHat.key(), AcousticBassDrum.key()]);
            self.note(BeatValue::Quarter, &[ClosedHiHat.key(), AcousticSnare.key()]);
            self.note(BeatValue::Quarter, &[ClosedHiHat.key(), AcousticSnare.key()]);
        }
    }

    /// One bar of pedal hi-hat quarters.
    pub fn count_in(&mut self) {
        for _ in 0..self.beats_per_bar {
            self.note(
                BeatValue::Quarter,
                &[GeneralMidiPercussionProgram::PedalHiHat.key()],
            );
        }
    }

    /// Turns the hits into note-on/note-off pairs, sorted by offset. At equal
    /// offsets note-offs come first so a repeated key retriggers cleanly.
    pub fn render(&self) -> Vec<TimedMessage> {
        let end = self.length_in_beats();
        let mut messages: Vec<(Duration, bool, TimedMessage)> = Vec::default();
        for hit in self.hits.iter().filter(|hit| hit.at < end) {
            let on = beats_to_duration(hit.at, self.bpm);
            let off = beats_to_duration(hit.at + hit.length, self.bpm);
            for key in hit.keys.iter() {
                messages.push((
                    on,
                    true,
                    TimedMessage {
                        offset: on,
                        channel: self.channel,
                        message: MidiMessage::NoteOn {
                            key: u7::from(*key),
                            vel: u7::from(hit.velocity),
                        },
                    },
                ));
                messages.push((
                    off,
                    false,
                    TimedMessage {
                        offset: off,
                        channel: self.channel,
                        message: MidiMessage::NoteOff {
                            key: u7::from(*key),
                            vel: u7::from(0),
                        },
                    },
                ));
            }
        }
        messages.sort_by_key(|(offset, is_on, _)| (*offset, *is_on));
        messages.into_iter().map(|(_, _, m)| m).collect()
    }
}
