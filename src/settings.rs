// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Settings files. These are JSON5, with kebab-case keys:
//!
//! ```json5
//! {
//!   input: "TempoPAD",
//!   output: "FluidSynth",
//!   filters: [
//!     { trigger: 99, bars: 2, bpm: 100, phrase: "metronome4" },
//!     { events: ["control_change"], value: 127, phrase: "roll", common: { key: 38 } },
//!   ],
//! }
//! ```

use crate::{
    error::Result,
    filter::DrumFilter,
    matching::Flow,
    phrase::{CommonArgs, PhraseLibrary},
    router::EventRouter,
    scheduler::{DetachedScheduler, Schedules},
    state::FilterState,
};
use fillin_core::{midi::EventKind, DEFAULT_BARS, DEFAULT_BPM};
use fillin_midi::OutputTarget;
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

/// One drum filter as it appears in a settings file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilterSettings {
    pub name: String,
    /// The event kinds the filter is registered for.
    pub events: Vec<EventKind>,
    pub trigger: Option<u8>,
    pub value: Option<u8>,
    pub bars: i64,
    pub bpm: i64,
    pub phrase: String,
    pub common: CommonArgs,
    pub on_reject: Flow,
}
impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            name: "drums".to_string(),
            events: vec![EventKind::NoteOn, EventKind::ControlChange],
            trigger: None,
            value: None,
            bars: DEFAULT_BARS as i64,
            bpm: DEFAULT_BPM as i64,
            phrase: PhraseLibrary::METRONOME4.to_string(),
            common: CommonArgs::default(),
            on_reject: Flow::Stop,
        }
    }
}
impl FilterSettings {
    /// Validates the settings and resolves the phrase name.
    pub fn into_state(&self, library: &PhraseLibrary) -> Result<FilterState> {
        let mut state = FilterState::default();
        state.set_trigger(self.trigger);
        state.set_value(self.value);
        state.set_bars(self.bars)?;
        state.set_bpm(self.bpm)?;
        state.set_phrase(library.resolve(&self.phrase)?);
        state.set_common(self.common.clone());
        state.set_on_reject(self.on_reject);
        Ok(state)
    }
}

/// A whole rig: where events come from, where drums go, and the filters in
/// between.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RigSettings {
    /// Input port name, or a piece of one.
    pub input: Option<String>,
    /// Output port name, or a piece of one.
    pub output: Option<String>,
    /// Name for a virtual output port. Takes precedence over `output`.
    pub virtual_output: Option<String>,
    /// Most playback jobs allowed at once. Unlimited if absent.
    pub max_in_flight: Option<usize>,
    pub filters: Vec<FilterSettings>,
}
impl Default for RigSettings {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            virtual_output: None,
            max_in_flight: None,
            filters: vec![FilterSettings::default()],
        }
    }
}
impl RigSettings {
    pub fn new_from_json5(text: &str) -> anyhow::Result<Self> {
        Ok(json5::from_str(text)?)
    }

    pub fn new_from_file(path: &Path) -> anyhow::Result<Self> {
        Self::new_from_json5(std::fs::read_to_string(path)?.as_str())
    }

    /// Builds every filter and registers it with a new router. The filters
    /// are returned as well so their settings can be changed while the
    /// router runs.
    pub fn instantiate(
        &self,
        output: Arc<dyn OutputTarget>,
        library: &PhraseLibrary,
    ) -> Result<(EventRouter, Vec<DrumFilter>)> {
        let scheduler: Arc<dyn Schedules> = match self.max_in_flight {
            Some(max) => Arc::new(DetachedScheduler::with_max_in_flight(max)),
            None => Arc::new(DetachedScheduler::new()),
        };
        let mut router = EventRouter::new();
        let mut filters = Vec::with_capacity(self.filters.len());
        for settings in self.filters.iter() {
            let filter = DrumFilter::new_with(Arc::clone(&output), settings.into_state(library)?)
                .with_scheduler(Arc::clone(&scheduler));
            router.add_drum_filter(&settings.name, &settings.events, filter.clone());
            filters.push(filter);
        }
        Ok((router, filters))
    }
}
