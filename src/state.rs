// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{
    error::{FilterError, Result},
    matching::Flow,
    phrase::{CommonArgs, Phrase},
};
use fillin_core::{Score, DEFAULT_BARS, DEFAULT_BPM};

/// Everything a drum filter is configured with. Dispatch works from a clone
/// taken under the lock, so a scheduled job never sees later changes.
#[derive(Clone, Debug)]
pub struct FilterState {
    trigger: Option<u8>,
    value: Option<u8>,
    bars: u32,
    bpm: u32,
    phrase: Phrase,
    common: CommonArgs,
    on_reject: Flow,
}
impl Default for FilterState {
    fn default() -> Self {
        Self {
            trigger: None,
            value: None,
            bars: DEFAULT_BARS,
            bpm: DEFAULT_BPM,
            phrase: Phrase::default(),
            common: CommonArgs::default(),
            on_reject: Flow::Stop,
        }
    }
}
impl FilterState {
    pub fn trigger(&self) -> Option<u8> {
        self.trigger
    }

    pub fn set_trigger(&mut self, trigger: Option<u8>) {
        self.trigger = trigger;
    }

    pub fn value(&self) -> Option<u8> {
        self.value
    }

    pub fn set_value(&mut self, value: Option<u8>) {
        self.value = value;
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    /// Fails, leaving the old value, unless `bars` is between 1 and
    /// [Score::MAX_BARS].
    pub fn set_bars(&mut self, bars: i64) -> Result<()> {
        self.bars = bounded("bars", bars, Score::MAX_BARS)?;
        Ok(())
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Fails, leaving the old value, unless `bpm` is positive.
    pub fn set_bpm(&mut self, bpm: i64) -> Result<()> {
        self.bpm = bounded("bpm", bpm, u32::MAX)?;
        Ok(())
    }

    pub fn phrase(&self) -> &Phrase {
        &self.phrase
    }

    pub fn set_phrase(&mut self, phrase: Phrase) {
        self.phrase = phrase;
    }

    pub fn common(&self) -> &CommonArgs {
        &self.common
    }

    pub fn set_common(&mut self, common: CommonArgs) {
        self.common = common;
    }

    /// What dispatch returns for an event the filter refuses.
    pub fn on_reject(&self) -> Flow {
        self.on_reject
    }

    pub fn set_on_reject(&mut self, flow: Flow) {
        self.on_reject = flow;
    }
}

fn bounded(name: &str, value: i64, max: u32) -> Result<u32> {
    if value <= 0 {
        return Err(FilterError::InvalidConfiguration(format!(
            "{name} must be positive (got {value})"
        )));
    }
    match u32::try_from(value) {
        Ok(value) if value <= max => Ok(value),
        _ => Err(FilterError::InvalidConfiguration(format!(
            "{name} can't be more than {max} (got {value})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let state = FilterState::default();
        assert_eq!(state.trigger(), None);
        assert_eq!(state.value(), None);
        assert_eq!(state.bars(), 1);
        assert_eq!(state.bpm(), 120);
        assert_eq!(state.phrase().name(), "metronome4");
        assert!(state.common().is_empty());
        assert_eq!(state.on_reject(), Flow::Stop);
    }

    #[test]
    fn non_positive_bars_and_bpm_keep_previous_value() {
        let mut state = FilterState::default();
        state.set_bars(3).unwrap();
        state.set_bpm(90).unwrap();
        for bad in [0, -1, -120] {
            assert!(matches!(
                state.set_bars(bad),
                Err(FilterError::InvalidConfiguration(_))
            ));
            assert!(matches!(
                state.set_bpm(bad),
                Err(FilterError::InvalidConfiguration(_))
            ));
        }
        assert!(state.set_bpm(i64::MAX).is_err());
        assert_eq!(state.bars(), 3);
        assert_eq!(state.bpm(), 90);
    }

    #[test]
    fn huge_bar_counts_are_refused() {
        let mut state = FilterState::default();
        state.set_bars(Score::MAX_BARS as i64).unwrap();
        for bad in [Score::MAX_BARS as i64 + 1, 1_073_741_824, u32::MAX as i64] {
            assert!(matches!(
                state.set_bars(bad),
                Err(FilterError::InvalidConfiguration(_))
            ));
        }
        assert_eq!(state.bars(), Score::MAX_BARS);
    }
}
