// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{
    error::{FilterError, Result},
    matching::Part,
    phrase::{CommonArgs, PhraseArgs},
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use fillin_core::{midi::Event, Score};
use fillin_midi::{OutputTarget, PerformanceReport, Performer};
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

/// One matched event's worth of work: a fresh score, the part to write onto
/// it, and the arguments to write it with. Nothing in here points back at
/// the filter that made it.
pub struct PlaybackJob {
    id: u64,
    score: Score,
    part: Part,
    common: CommonArgs,
    device: String,
    delta: f64,
    event: Event,
    output: Arc<dyn OutputTarget>,
}
impl Debug for PlaybackJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackJob")
            .field("id", &self.id)
            .field("part", &self.part.name())
            .field("bpm", &self.score.bpm())
            .field("bars", &self.score.bars())
            .field("event", &self.event)
            .finish()
    }
}
impl PlaybackJob {
    pub fn new_with(
        score: Score,
        part: Part,
        common: CommonArgs,
        device: &str,
        delta: f64,
        event: Event,
        output: Arc<dyn OutputTarget>,
    ) -> Self {
        Self {
            id: Self::unique_id(),
            score,
            part,
            common,
            device: device.to_string(),
            delta,
            event,
            output,
        }
    }

    // Generate a new unique job id.
    fn unique_id() -> u64 {
        static ID: AtomicU64 = AtomicU64::new(1);
        ID.fetch_add(1, Ordering::Relaxed)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn part(&self) -> &Part {
        &self.part
    }

    pub fn common(&self) -> &CommonArgs {
        &self.common
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Invokes the part against this job's score.
    pub fn compose(&mut self) -> Result<()> {
        let mut args = PhraseArgs {
            drummer: &mut self.score,
            device: &self.device,
            delta: self.delta,
            event: self.event,
            common: self.common.clone(),
        };
        self.part.play(&mut args).map_err(|err| {
            FilterError::Playback(format!("phrase {} failed: {err}", self.part.name()))
        })
    }

    /// Composes, then plays the result on the calling thread.
    pub fn run(mut self) -> Result<PerformanceReport> {
        self.compose()?;
        let messages = self.score.render();
        Ok(Performer::play(&messages, self.output.as_ref()))
    }
}

/// Takes a [PlaybackJob] off the dispatching thread's hands. Implementations
/// must return without waiting for the job to play, and have nothing to
/// report back.
pub trait Schedules: Send + Sync + Debug {
    fn schedule(&self, job: PlaybackJob);
}

/// Runs every job on its own detached thread.
///
/// By default there's no limit on how many jobs play at once. With
/// [DetachedScheduler::with_max_in_flight], jobs arriving while the limit is
/// reached are dropped with a warning.
#[derive(Debug, Default)]
pub struct DetachedScheduler {
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Option<usize>,
}
impl DetachedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_in_flight(max_in_flight: usize) -> Self {
        Self {
            in_flight: Default::default(),
            max_in_flight: Some(max_in_flight),
        }
    }

    /// How many jobs are playing right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}
impl Schedules for DetachedScheduler {
    fn schedule(&self, job: PlaybackJob) {
        let count = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        let guard = InFlight(Arc::clone(&self.in_flight));
        if let Some(max) = self.max_in_flight {
            if count > max {
                log::warn!("dropping playback job {}: {max} already playing", job.id());
                return;
            }
        }
        let id = job.id();
        let spawned = std::thread::Builder::new()
            .name(format!("fillin-job-{id}"))
            .spawn(move || {
                let _guard = guard;
                match job.run() {
                    Ok(report) => log::debug!("playback job {id} done: {report:?}"),
                    Err(err) => log::error!("playback job {id}: {err}"),
                }
            });
        if let Err(err) = spawned {
            log::error!("couldn't start playback job {id}: {err}");
        }
    }
}

// Decrements the in-flight count when a job ends, however it ends.
struct InFlight(Arc<AtomicUsize>);
impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Hands jobs to whoever holds the receiver instead of playing them.
#[derive(Debug)]
pub struct ChannelScheduler {
    sender: Sender<PlaybackJob>,
}
impl ChannelScheduler {
    pub fn new_with_receiver() -> (Self, Receiver<PlaybackJob>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}
impl Schedules for ChannelScheduler {
    fn schedule(&self, job: PlaybackJob) {
        if let Err(err) = self.sender.send(job) {
            log::warn!("nobody is listening for playback job {}", err.0.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::Phrase;
    use fillin_midi::RecordingOutput;
    use std::time::{Duration, Instant};

    fn job_with(part: Part, output: Arc<dyn OutputTarget>) -> PlaybackJob {
        PlaybackJob::new_with(
            Score::new_with(6000, 1).unwrap(),
            part,
            CommonArgs::default(),
            "test",
            0.0,
            Event::note_on(0, 40, 64),
            output,
        )
    }

    #[test]
    fn job_ids_are_unique() {
        let output: Arc<dyn OutputTarget> = Arc::new(RecordingOutput::default());
        let a = job_with(Part::Single { note: 40 }, output.clone());
        let b = job_with(Part::Single { note: 40 }, output);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn running_a_job_plays_its_part() {
        let output = Arc::new(RecordingOutput::default());
        let report = job_with(Part::Single { note: 40 }, output.clone())
            .run()
            .unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(output.sent().len(), 2);
    }

    #[test]
    fn failing_phrase_is_a_playback_error() {
        let output = Arc::new(RecordingOutput::default());
        let broken = Phrase::new_with("broken", |_| Err(anyhow::anyhow!("no sticks")));
        let result = job_with(Part::Phrase(broken), output.clone()).run();
        assert!(matches!(result, Err(FilterError::Playback(msg)) if msg.contains("no sticks")));
        assert!(output.sent().is_empty());
    }

    #[test]
    fn detached_jobs_finish_on_their_own() {
        let scheduler = DetachedScheduler::new();
        let output = Arc::new(RecordingOutput::default());
        for _ in 0..3 {
            scheduler.schedule(job_with(Part::Single { note: 40 }, output.clone()));
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.in_flight() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(output.sent().len(), 6);
    }

    #[test]
    fn capped_scheduler_drops_excess_jobs() {
        let scheduler = DetachedScheduler::with_max_in_flight(0);
        let output = Arc::new(RecordingOutput::default());
        scheduler.schedule(job_with(Part::Single { note: 40 }, output.clone()));
        assert_eq!(scheduler.in_flight(), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert!(output.sent().is_empty());
    }

    #[test]
    fn channel_scheduler_forwards_jobs() {
        let (scheduler, receiver) = ChannelScheduler::new_with_receiver();
        let output: Arc<dyn OutputTarget> = Arc::new(RecordingOutput::default());
        let job = job_with(Part::Single { note: 40 }, output);
        let id = job.id();
        scheduler.schedule(job);
        assert_eq!(receiver.try_recv().unwrap().id(), id);
        assert!(receiver.try_recv().is_err());
    }
}
