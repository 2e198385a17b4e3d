// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Real-time drum filters. A [DrumFilter] looks at each incoming MIDI event
//! and, when it matches, builds a short percussion score and plays it on a
//! detached thread, returning to the event source right away.
//!
//! ```no_run
//! use fillin::{DrumFilter, EventRouter};
//! use fillin_core::midi::EventKind;
//! use fillin_midi::{ExternalMidiOutput, MidiInputService};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let output = Arc::new(ExternalMidiOutput::open("FluidSynth")?);
//! let filter = DrumFilter::new(output);
//! filter.set_trigger(Some(99));
//! filter.set_bars(2)?;
//!
//! let mut router = EventRouter::new();
//! router.add_drum_filter("drums", &[EventKind::NoteOn, EventKind::NoteOff], filter);
//! let input = MidiInputService::open("TempoPAD")?;
//! router.run(input.receiver());
//! # Ok(())
//! # }
//! ```

pub use crate::error::FilterError;
pub use crate::filter::{Dispatch, DrumFilter};
pub use crate::matching::{Flow, Part, Verdict};
pub use crate::phrase::{CommonArgs, Phrase, PhraseArgs, PhraseLibrary};
pub use crate::router::EventRouter;
pub use crate::scheduler::{ChannelScheduler, DetachedScheduler, PlaybackJob, Schedules};
pub use crate::settings::{FilterSettings, RigSettings};
pub use crate::state::FilterState;

pub mod error;
pub mod matching;
pub mod phrase;
pub mod settings;

pub(crate) mod filter;
pub(crate) mod router;
pub(crate) mod scheduler;
pub(crate) mod state;

/// The crate version, for `--version` output and logs.
pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
