// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::filter::DrumFilter;
use crossbeam_channel::Receiver;
use fillin_core::midi::{Event, EventKind};
use fillin_midi::InputEvent;
use std::fmt::Debug;

type FilterFn = dyn Fn(&str, f64, &Event) -> bool + Send + Sync;

struct Route {
    name: String,
    kinds: Vec<EventKind>,
    filter: Box<FilterFn>,
}
impl Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// Offers each incoming event to the filters registered for its kind, in
/// registration order, until one of them answers `false`.
#[derive(Debug, Default)]
pub struct EventRouter {
    routes: Vec<Route>,
}
impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers any callback with the dispatch signature.
    pub fn add_filter<F>(&mut self, name: &str, kinds: &[EventKind], filter: F)
    where
        F: Fn(&str, f64, &Event) -> bool + Send + Sync + 'static,
    {
        self.routes.push(Route {
            name: name.to_string(),
            kinds: kinds.to_vec(),
            filter: Box::new(filter),
        });
    }

    /// Registers a [DrumFilter]'s dispatch entry point.
    pub fn add_drum_filter(&mut self, name: &str, kinds: &[EventKind], filter: DrumFilter) {
        self.add_filter(name, kinds, move |device, delta, event| {
            filter.dispatch(device, delta, event)
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs the chain for one event. Returns how many filters saw it.
    pub fn route(&self, device: &str, delta: f64, event: &Event) -> usize {
        let mut called = 0;
        for route in self.routes.iter().filter(|r| r.kinds.contains(&event.kind)) {
            called += 1;
            if !(route.filter)(device, delta, event) {
                log::trace!("{} stopped the chain for {event}", route.name);
                break;
            }
        }
        called
    }

    /// Routes events from `receiver` until every sender hangs up.
    pub fn run(&self, receiver: &Receiver<InputEvent>) {
        while let Ok(input) = receiver.recv() {
            self.route(&input.device, input.delta, &input.event);
        }
        log::info!("input closed; event router exiting");
    }
}
