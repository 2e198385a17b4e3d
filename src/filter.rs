// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{
    error::Result,
    matching::{matches, select_part, Flow, Verdict},
    phrase::{merge_common, CommonArgs, Phrase},
    scheduler::{DetachedScheduler, PlaybackJob, Schedules},
    state::FilterState,
};
use fillin_core::{midi::Event, Score};
use fillin_midi::OutputTarget;
use std::{
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// What one dispatch call did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dispatch {
    /// The event wasn't one this filter renders.
    PassedThrough,
    /// The predicate refused the event; carries the filter's reject flow.
    Rejected(Flow),
    /// A playback job with this id was handed to the scheduler.
    Scheduled(u64),
}
impl Dispatch {
    /// The continue/stop answer for the event source. `true` means keep
    /// offering the event to other filters.
    pub fn proceed(&self) -> bool {
        match self {
            Dispatch::PassedThrough | Dispatch::Scheduled(_) => true,
            Dispatch::Rejected(flow) => bool::from(*flow),
        }
    }
}

/// A drum filter: turns matching events into short percussion scores and
/// schedules them for playback without waiting for them.
///
/// Clones share configuration, so one clone can sit in an event router
/// while another is used to retune it from elsewhere.
#[derive(Clone)]
pub struct DrumFilter {
    state: Arc<RwLock<FilterState>>,
    output: Arc<dyn OutputTarget>,
    scheduler: Arc<dyn Schedules>,
}
impl Debug for DrumFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrumFilter")
            .field("state", &*self.read())
            .field("output", &self.output.name())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
impl DrumFilter {
    /// A filter with default settings: no trigger, no value, one bar at 120
    /// bpm, the four-beat metronome phrase.
    pub fn new(output: Arc<dyn OutputTarget>) -> Self {
        Self::new_with(output, FilterState::default())
    }

    pub fn new_with(output: Arc<dyn OutputTarget>, state: FilterState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            output,
            scheduler: Arc::new(DetachedScheduler::new()),
        }
    }

    /// Replaces the scheduler that playback jobs go to.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Schedules>) -> Self {
        self.scheduler = scheduler;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, FilterState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FilterState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current configuration.
    pub fn snapshot(&self) -> FilterState {
        self.read().clone()
    }

    pub fn trigger(&self) -> Option<u8> {
        self.read().trigger()
    }

    pub fn set_trigger(&self, trigger: Option<u8>) {
        self.write().set_trigger(trigger);
    }

    pub fn value(&self) -> Option<u8> {
        self.read().value()
    }

    pub fn set_value(&self, value: Option<u8>) {
        self.write().set_value(value);
    }

    pub fn bars(&self) -> u32 {
        self.read().bars()
    }

    pub fn set_bars(&self, bars: i64) -> Result<()> {
        self.write().set_bars(bars)
    }

    pub fn bpm(&self) -> u32 {
        self.read().bpm()
    }

    pub fn set_bpm(&self, bpm: i64) -> Result<()> {
        self.write().set_bpm(bpm)
    }

    pub fn set_phrase(&self, phrase: Phrase) {
        self.write().set_phrase(phrase);
    }

    pub fn set_common(&self, common: CommonArgs) {
        self.write().set_common(common);
    }

    pub fn set_on_reject(&self, flow: Flow) {
        self.write().set_on_reject(flow);
    }

    /// Matches `event` and, if it matches, schedules a playback job built
    /// from a snapshot of the current configuration. Returns as soon as the
    /// job is handed off.
    ///
    /// ### Errors
    /// Returns [crate::FilterError::ScoreConstruction] if the score for a
    /// matched event couldn't be built. Nothing is scheduled in that case.
    pub fn try_dispatch(&self, device: &str, delta: f64, event: &Event) -> Result<Dispatch> {
        let snapshot = self.snapshot();
        let verdict = matches(&snapshot, event);
        log::debug!("{device} {event} after {delta:.3}s: {verdict:?}");

        let Some(part) = select_part(&snapshot, verdict) else {
            return Ok(match verdict {
                Verdict::Rejected => Dispatch::Rejected(snapshot.on_reject()),
                _ => Dispatch::PassedThrough,
            });
        };

        let score = Score::new_with(snapshot.bpm(), snapshot.bars())?;
        let job = PlaybackJob::new_with(
            score,
            part,
            merge_common(snapshot.common()),
            device,
            delta,
            *event,
            Arc::clone(&self.output),
        );
        let id = job.id();
        log::info!(
            "scheduling job {id}: {} for {} bar(s) at {} bpm on {}",
            job.part().name(),
            snapshot.bars(),
            snapshot.bpm(),
            self.output.name()
        );
        self.scheduler.schedule(job);
        Ok(Dispatch::Scheduled(id))
    }

    /// The entry point an event source calls. `true` means the event should
    /// go on to the next registered filter.
    ///
    /// Failures inside this filter are logged and answered with `true`, so
    /// other filters in a chain still see the event.
    pub fn dispatch(&self, device: &str, delta: f64, event: &Event) -> bool {
        match self.try_dispatch(device, delta, event) {
            Ok(dispatch) => dispatch.proceed(),
            Err(err) => {
                log::error!("{device} {event}: {err}");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        matching::Part,
        scheduler::{ChannelScheduler, PlaybackJob},
    };
    use crossbeam_channel::Receiver;
    use fillin_core::midi::EventKind;
    use fillin_midi::RecordingOutput;
    use serde_json::json;

    fn filter() -> (DrumFilter, Receiver<PlaybackJob>) {
        let (scheduler, receiver) = ChannelScheduler::new_with_receiver();
        let filter = DrumFilter::new(Arc::new(RecordingOutput::new_with("test")))
            .with_scheduler(Arc::new(scheduler));
        (filter, receiver)
    }

    #[test]
    fn note_off_never_schedules() {
        let (filter, jobs) = filter();
        filter.set_trigger(Some(99));
        for note in [0, 40, 99] {
            assert_eq!(
                filter.try_dispatch("pad", 0.0, &Event::note_off(0, note, 0)),
                Ok(Dispatch::PassedThrough)
            );
            assert!(filter.dispatch("pad", 0.0, &Event::note_off(0, note, 0)));
        }
        assert!(jobs.is_empty());
    }

    #[test]
    fn rejected_control_change_returns_reject_flow() {
        let (filter, jobs) = filter();
        let cc = Event::control_change(0, 0, 5);
        assert!(!filter.dispatch("pad", 0.0, &cc));

        filter.set_on_reject(Flow::Continue);
        assert!(filter.dispatch("pad", 0.0, &cc));
        assert_eq!(
            filter.try_dispatch("pad", 0.0, &cc),
            Ok(Dispatch::Rejected(Flow::Continue))
        );
        assert!(jobs.is_empty());
    }

    #[test]
    fn matching_control_change_plays_phrase() {
        let (filter, jobs) = filter();
        filter.set_value(Some(5));
        assert!(filter.dispatch("pad", 0.0, &Event::control_change(0, 0, 5)));
        let job = jobs.try_recv().unwrap();
        assert!(matches!(job.part(), Part::Phrase(_)));
        assert_eq!(job.event().kind, EventKind::ControlChange);
    }

    #[test]
    fn common_args_are_copied_without_drummer() {
        let (filter, jobs) = filter();
        let mut common = CommonArgs::default();
        common.insert("drummer".to_string(), json!(1));
        common.insert("key".to_string(), json!(38));
        filter.set_common(common);
        filter.dispatch("pad", 0.0, &Event::note_on(0, 60, 100));
        let job = jobs.try_recv().unwrap();
        assert!(!job.common().contains_key("drummer"));
        assert_eq!(job.common().get("key"), Some(&json!(38)));
    }

    #[test]
    fn later_setter_calls_do_not_touch_scheduled_jobs() {
        let (filter, jobs) = filter();
        filter.set_trigger(Some(99));
        filter.set_bpm(100).unwrap();
        filter.dispatch("pad", 0.0, &Event::note_on(0, 99, 64));
        filter.set_bpm(200).unwrap();
        filter.set_bars(4).unwrap();
        filter.set_phrase(Phrase::new_with("other", |_| Ok(())));
        filter.dispatch("pad", 0.0, &Event::note_on(0, 99, 64));

        let first = jobs.try_recv().unwrap();
        let second = jobs.try_recv().unwrap();
        assert_eq!(first.score().bpm(), 100);
        assert_eq!(first.score().bars(), 1);
        assert_eq!(first.part().name(), "metronome4");
        assert_eq!(second.score().bpm(), 200);
        assert_eq!(second.score().bars(), 4);
        assert_eq!(second.part().name(), "other");
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn bad_setters_leave_filter_unchanged() {
        let (filter, _jobs) = filter();
        assert!(filter.set_bars(0).is_err());
        assert!(filter.set_bpm(-5).is_err());
        assert_eq!(filter.bars(), 1);
        assert_eq!(filter.bpm(), 120);
    }

    #[test]
    fn clones_share_configuration() {
        let (filter, _jobs) = filter();
        let remote = filter.clone();
        remote.set_trigger(Some(36));
        remote.set_value(Some(1));
        assert_eq!(filter.trigger(), Some(36));
        assert_eq!(filter.value(), Some(1));
    }
}
