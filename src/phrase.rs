// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::error::{FilterError, Result};
use fillin_core::{
    midi::{Event, GeneralMidiPercussionProgram},
    BeatValue, Score,
};
use serde_json::Value;
use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

/// Extra named arguments handed to every phrase invocation.
pub type CommonArgs = BTreeMap<String, Value>;

/// The argument name reserved for the live score. A `common` entry with this
/// name never reaches a phrase.
pub const DRUMMER_KEY: &str = "drummer";

/// Copies `common` for one invocation, dropping anything stored under
/// [DRUMMER_KEY].
pub fn merge_common(common: &CommonArgs) -> CommonArgs {
    let mut merged = common.clone();
    if merged.remove(DRUMMER_KEY).is_some() {
        log::debug!("ignoring common argument \"{DRUMMER_KEY}\"; the live score takes its place");
    }
    merged
}

/// The named arguments a phrase is invoked with.
pub struct PhraseArgs<'a> {
    /// The fresh score to write onto.
    pub drummer: &'a mut Score,
    /// Which input the triggering event came from.
    pub device: &'a str,
    /// Seconds since the previous event from that input.
    pub delta: f64,
    /// The event that triggered this invocation.
    pub event: Event,
    pub common: CommonArgs,
}
impl<'a> PhraseArgs<'a> {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.common.get(key)
    }

    pub fn get_u8(&self, key: &str) -> Option<u8> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }
}

type PhraseFn = dyn Fn(&mut PhraseArgs<'_>) -> anyhow::Result<()> + Send + Sync;

/// A replaceable unit of behavior that writes onto a [Score]. Cloning is
/// cheap; clones share the same function.
#[derive(Clone)]
pub struct Phrase {
    name: String,
    body: Arc<PhraseFn>,
}
impl Debug for Phrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phrase").field("name", &self.name).finish()
    }
}
impl Default for Phrase {
    fn default() -> Self {
        Self::new_with(PhraseLibrary::METRONOME4, |args| {
            args.drummer.metronome4();
            Ok(())
        })
    }
}
impl Phrase {
    pub fn new_with<F>(name: &str, body: F) -> Self
    where
        F: Fn(&mut PhraseArgs<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn play(&self, args: &mut PhraseArgs<'_>) -> anyhow::Result<()> {
        (self.body)(args)
    }
}

/// Phrases addressable by name, for settings files and the command line.
#[derive(Clone, Debug)]
pub struct PhraseLibrary {
    phrases: BTreeMap<String, Phrase>,
}
impl Default for PhraseLibrary {
    fn default() -> Self {
        let mut r = Self {
            phrases: Default::default(),
        };
        r.insert(Phrase::default());
        r.insert(Phrase::new_with(Self::METRONOME3, |args| {
            args.drummer.metronome3();
            Ok(())
        }));
        r.insert(Phrase::new_with(Self::COUNT_IN, |args| {
            args.drummer.count_in();
            Ok(())
        }));
        r.insert(Phrase::new_with(Self::ROLL, roll));
        r
    }
}
impl PhraseLibrary {
    pub const METRONOME4: &'static str = "metronome4";
    pub const METRONOME3: &'static str = "metronome3";
    pub const COUNT_IN: &'static str = "count-in";
    pub const ROLL: &'static str = "roll";

    /// Adds a phrase, replacing any with the same name.
    pub fn insert(&mut self, phrase: Phrase) {
        self.phrases.insert(phrase.name().to_string(), phrase);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.phrases.keys().map(String::as_str)
    }

    /// Looks up a phrase by name.
    pub fn resolve(&self, name: &str) -> Result<Phrase> {
        self.phrases.get(name).cloned().ok_or_else(|| {
            FilterError::InvalidConfiguration(format!(
                "unknown phrase \"{name}\" (known: {})",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }
}

/// Sixteenth notes on one key. `key` defaults to the acoustic snare and
/// `beats` to a full bar. The roll stops at the end of the score.
fn roll(args: &mut PhraseArgs<'_>) -> anyhow::Result<()> {
    let key = args
        .get_u8("key")
        .unwrap_or(GeneralMidiPercussionProgram::AcousticSnare.key());
    if key > 127 {
        return Err(anyhow::anyhow!("roll key {key} is out of MIDI range"));
    }
    let remaining = (args.drummer.length_in_beats() - args.drummer.position()).max(0.0);
    let beats = args
        .get_f64("beats")
        .unwrap_or(args.drummer.beats_per_bar() as f64)
        .min(remaining);
    let strokes = (beats / BeatValue::Sixteenth.beats()).round() as usize;
    for _ in 0..strokes {
        args.drummer.note(BeatValue::Sixteenth, &[key]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoke(phrase: &Phrase, score: &mut Score, common: CommonArgs) -> anyhow::Result<()> {
        let mut args = PhraseArgs {
            drummer: score,
            device: "test",
            delta: 0.0,
            event: Event::note_on(0, 99, 64),
            common,
        };
        phrase.play(&mut args)
    }

    #[test]
    fn default_phrase_is_metronome4() {
        let phrase = Phrase::default();
        assert_eq!(phrase.name(), PhraseLibrary::METRONOME4);
        let mut score = Score::new_with(120, 2).unwrap();
        invoke(&phrase, &mut score, CommonArgs::default()).unwrap();
        assert_eq!(score.hits().len(), 8);
    }

    #[test]
    fn drummer_key_is_stripped_from_common() {
        let mut common = CommonArgs::default();
        common.insert(DRUMMER_KEY.to_string(), json!("not a score"));
        common.insert("key".to_string(), json!(42));
        let merged = merge_common(&common);
        assert!(!merged.contains_key(DRUMMER_KEY));
        assert_eq!(merged.get("key"), Some(&json!(42)));
        assert!(common.contains_key(DRUMMER_KEY));
    }

    #[test]
    fn unknown_phrase_is_invalid_configuration() {
        let library = PhraseLibrary::default();
        assert!(library.resolve("count-in").is_ok());
        match library.resolve("polka") {
            Err(FilterError::InvalidConfiguration(msg)) => assert!(msg.contains("polka")),
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn roll_reads_common_arguments() {
        let library = PhraseLibrary::default();
        let roll = library.resolve(PhraseLibrary::ROLL).unwrap();

        let mut score = Score::new_with(120, 1).unwrap();
        invoke(&roll, &mut score, CommonArgs::default()).unwrap();
        assert_eq!(score.hits().len(), 16);
        assert_eq!(
            score.hits()[0].keys,
            vec![GeneralMidiPercussionProgram::AcousticSnare.key()]
        );

        let mut common = CommonArgs::default();
        common.insert("key".to_string(), json!(50));
        common.insert("beats".to_string(), json!(2));
        let mut score = Score::new_with(120, 1).unwrap();
        invoke(&roll, &mut score, common).unwrap();
        assert_eq!(score.hits().len(), 8);
        assert_eq!(score.hits()[7].keys, vec![50]);
    }

    #[test]
    fn roll_stops_at_the_end_of_the_score() {
        let roll = PhraseLibrary::default()
            .resolve(PhraseLibrary::ROLL)
            .unwrap();
        let mut common = CommonArgs::default();
        common.insert("beats".to_string(), json!(1e12));
        let mut score = Score::new_with(120, 2).unwrap();
        score.rest(BeatValue::Whole);
        invoke(&roll, &mut score, common).unwrap();
        assert_eq!(score.hits().len(), 16);
        assert_eq!(score.position(), score.length_in_beats());

        let mut common = CommonArgs::default();
        common.insert("beats".to_string(), json!(-3));
        let mut score = Score::new_with(120, 1).unwrap();
        invoke(&roll, &mut score, common).unwrap();
        assert!(score.hits().is_empty());
    }

    #[test]
    fn custom_phrases_replace_builtins() {
        let mut library = PhraseLibrary::default();
        library.insert(Phrase::new_with(PhraseLibrary::COUNT_IN, |args| {
            args.drummer.rest(BeatValue::Whole);
            Ok(())
        }));
        let mut score = Score::new_with(120, 1).unwrap();
        invoke(
            &library.resolve(PhraseLibrary::COUNT_IN).unwrap(),
            &mut score,
            CommonArgs::default(),
        )
        .unwrap();
        assert!(score.hits().is_empty());
        assert_eq!(score.position(), 4.0);
    }
}
