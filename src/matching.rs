// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Deciding what, if anything, an incoming event should play.
//!
//! | event | condition | verdict |
//! |---|---|---|
//! | note_on | trigger set and note == trigger | [Verdict::Trigger] |
//! | note_on | otherwise | [Verdict::Default] at the event's note |
//! | control_change | value set, value matches, trigger unset or controller == trigger | [Verdict::Trigger] |
//! | control_change | otherwise | [Verdict::Rejected] |
//! | note_off, anything else | | [Verdict::PassThrough] |

use crate::{
    phrase::{Phrase, PhraseArgs},
    state::FilterState,
};
use fillin_core::{
    midi::{Event, EventKind},
    BeatValue,
};
use serde::{Deserialize, Serialize};

/// Whether the event source should keep offering an event to the filters
/// registered after this one. Converts to the `bool` dispatch returns, with
/// `true` meaning continue.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flow {
    Continue,
    Stop,
}
impl From<Flow> for bool {
    fn from(flow: Flow) -> Self {
        flow == Flow::Continue
    }
}

/// The match predicate's answer for one event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Not ours to render (note-offs and the like). Left untouched.
    PassThrough,
    /// A control change that didn't match.
    Rejected,
    /// Play the configured phrase.
    Trigger,
    /// Play a single short note.
    Default { note: u8 },
}
impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Trigger | Verdict::Default { .. })
    }
}

/// Matches `event` against the filter's trigger and value.
pub fn matches(state: &FilterState, event: &Event) -> Verdict {
    match event.kind {
        EventKind::NoteOn => match state.trigger() {
            Some(trigger) if trigger == event.note => Verdict::Trigger,
            _ => Verdict::Default { note: event.note },
        },
        EventKind::ControlChange => match state.value() {
            Some(value) if value == event.value => match state.trigger() {
                Some(trigger) if trigger != event.note => Verdict::Rejected,
                _ => Verdict::Trigger,
            },
            _ => Verdict::Rejected,
        },
        EventKind::NoteOff | EventKind::Other => Verdict::PassThrough,
    }
}

/// What gets written onto a fresh score once an event matches.
#[derive(Clone, Debug)]
pub enum Part {
    Phrase(Phrase),
    /// One [BeatValue::SHORTEST] note at `note`.
    Single { note: u8 },
}
impl Part {
    pub fn name(&self) -> String {
        match self {
            Part::Phrase(phrase) => phrase.name().to_string(),
            Part::Single { note } => format!("single note {note}"),
        }
    }

    pub fn play(&self, args: &mut PhraseArgs<'_>) -> anyhow::Result<()> {
        match self {
            Part::Phrase(phrase) => phrase.play(args),
            Part::Single { note } => {
                args.drummer.note(BeatValue::SHORTEST, &[*note]);
                Ok(())
            }
        }
    }
}

/// Picks the part for a matching verdict. Non-matching verdicts have none.
pub fn select_part(state: &FilterState, verdict: Verdict) -> Option<Part> {
    match verdict {
        Verdict::Trigger => Some(Part::Phrase(state.phrase().clone())),
        Verdict::Default { note } => Some(Part::Single { note }),
        Verdict::PassThrough | Verdict::Rejected => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fillin_core::Score;

    fn state_with(trigger: Option<u8>, value: Option<u8>) -> FilterState {
        let mut state = FilterState::default();
        state.set_trigger(trigger);
        state.set_value(value);
        state
    }

    #[test]
    fn note_off_always_passes_through() {
        for (trigger, value) in [(None, None), (Some(99), None), (Some(99), Some(5))] {
            let state = state_with(trigger, value);
            assert_eq!(
                matches(&state, &Event::note_off(0, 99, 0)),
                Verdict::PassThrough
            );
        }
        assert_eq!(
            matches(
                &FilterState::default(),
                &Event::new(EventKind::Other, 0, 0, 0)
            ),
            Verdict::PassThrough
        );
    }

    #[test]
    fn untriggered_note_on_gets_default_part() {
        let state = FilterState::default();
        for note in [0, 40, 99, 127] {
            assert_eq!(
                matches(&state, &Event::note_on(0, note, 64)),
                Verdict::Default { note }
            );
        }
    }

    #[test]
    fn trigger_note_selects_phrase() {
        let state = state_with(Some(99), None);
        assert_eq!(matches(&state, &Event::note_on(0, 99, 64)), Verdict::Trigger);
        assert_eq!(
            matches(&state, &Event::note_on(0, 40, 64)),
            Verdict::Default { note: 40 }
        );
    }

    #[test]
    fn control_change_needs_matching_value() {
        let state = state_with(None, None);
        assert_eq!(
            matches(&state, &Event::control_change(0, 0, 5)),
            Verdict::Rejected
        );

        let state = state_with(None, Some(5));
        assert_eq!(
            matches(&state, &Event::control_change(0, 0, 5)),
            Verdict::Trigger
        );
        assert_eq!(
            matches(&state, &Event::control_change(0, 0, 6)),
            Verdict::Rejected
        );

        let state = state_with(Some(7), Some(5));
        assert_eq!(
            matches(&state, &Event::control_change(0, 7, 5)),
            Verdict::Trigger
        );
        assert_eq!(
            matches(&state, &Event::control_change(0, 8, 5)),
            Verdict::Rejected
        );
    }

    #[test]
    fn flow_converts_to_continue_bool() {
        assert!(bool::from(Flow::Continue));
        assert!(!bool::from(Flow::Stop));
    }

    #[test]
    fn part_selection_follows_verdict() {
        let state = state_with(Some(99), None);
        assert!(matches!(
            select_part(&state, Verdict::Trigger),
            Some(Part::Phrase(ref phrase)) if phrase.name() == "metronome4"
        ));
        assert!(matches!(
            select_part(&state, Verdict::Default { note: 40 }),
            Some(Part::Single { note: 40 })
        ));
        assert!(select_part(&state, Verdict::Rejected).is_none());
        assert!(select_part(&state, Verdict::PassThrough).is_none());
    }

    #[test]
    fn single_part_writes_one_shortest_note() {
        let mut score = Score::new_with(120, 1).unwrap();
        let mut args = PhraseArgs {
            drummer: &mut score,
            device: "test",
            delta: 0.0,
            event: Event::note_on(0, 40, 64),
            common: Default::default(),
        };
        Part::Single { note: 40 }.play(&mut args).unwrap();
        assert_eq!(score.hits().len(), 1);
        assert_eq!(score.hits()[0].keys, vec![40]);
        assert_eq!(score.hits()[0].length, BeatValue::SHORTEST.beats());
    }
}
