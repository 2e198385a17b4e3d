// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! This crate connects scores to external MIDI hardware. An [OutputTarget]
//! is wherever rendered messages go, [Performer] plays a rendered score onto
//! one, and [MidiInputService] turns a hardware input port into a channel of
//! [InputEvent]s.

use anyhow::anyhow;
use crossbeam_channel::{unbounded, Receiver, Sender};
use fillin_core::{
    midi::{u4, Event, LiveEvent, MidiChannel, MidiMessage},
    TimedMessage,
};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::{
    fmt::Debug,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Names an input or output port as the OS reported it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MidiPortDescriptor {
    pub index: usize,
    pub name: String,
}
impl std::fmt::Display for MidiPortDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.index, self.name)
    }
}

/// Picks a port by name. An exact match wins; otherwise the first port whose
/// name contains `wanted`, ignoring case.
pub fn find_port(ports: &[MidiPortDescriptor], wanted: &str) -> Option<MidiPortDescriptor> {
    if let Some(port) = ports.iter().find(|port| port.name == wanted) {
        return Some(port.clone());
    }
    let wanted = wanted.to_lowercase();
    ports
        .iter()
        .find(|port| port.name.to_lowercase().contains(&wanted))
        .cloned()
}

/// Lists the MIDI input ports the OS knows about.
pub fn list_input_ports() -> anyhow::Result<Vec<MidiPortDescriptor>> {
    let midi = MidiInput::new("Fillin port scan")?;
    Ok(midi
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPortDescriptor {
            index,
            name: midi
                .port_name(port)
                .unwrap_or("[unnamed input]".to_string()),
        })
        .collect())
}

/// Lists the MIDI output ports the OS knows about.
pub fn list_output_ports() -> anyhow::Result<Vec<MidiPortDescriptor>> {
    let midi = MidiOutput::new("Fillin port scan")?;
    Ok(midi
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPortDescriptor {
            index,
            name: midi
                .port_name(port)
                .unwrap_or("[unnamed output]".to_string()),
        })
        .collect())
}

/// Wherever rendered MIDI goes. Implementations are shared across playback
/// threads, so sending takes `&self`.
pub trait OutputTarget: Send + Sync + Debug {
    fn name(&self) -> &str;
    fn send(&self, channel: MidiChannel, message: MidiMessage) -> anyhow::Result<()>;
}

/// Outputs MIDI messages to an external MIDI device through `midir`.
pub struct ExternalMidiOutput {
    name: String,
    connection: Mutex<MidiOutputConnection>,
}
impl Debug for ExternalMidiOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalMidiOutput")
            .field("name", &self.name)
            .finish()
    }
}
impl ExternalMidiOutput {
    /// Connects to the output port best matching `port_name`.
    pub fn open(port_name: &str) -> anyhow::Result<Self> {
        let midi = MidiOutput::new("Fillin MIDI output")?;
        let ports = midi.ports();
        let descriptors: Vec<MidiPortDescriptor> = ports
            .iter()
            .enumerate()
            .map(|(index, port)| MidiPortDescriptor {
                index,
                name: midi.port_name(port).unwrap_or("[unknown]".to_string()),
            })
            .collect();
        let selected = find_port(&descriptors, port_name)
            .ok_or_else(|| anyhow!("no MIDI output port matches \"{port_name}\""))?;
        let port = ports
            .get(selected.index)
            .ok_or_else(|| anyhow!("MIDI output port #{} is no longer valid", selected.index))?;
        match midi.connect(port, "Fillin output") {
            Ok(connection) => {
                log::info!("opened MIDI output {selected}");
                Ok(Self {
                    name: selected.name,
                    connection: Mutex::new(connection),
                })
            }
            Err(err) => Err(anyhow!("{err}")),
        }
    }

    /// Creates a virtual output port that other software can connect to.
    #[cfg(unix)]
    pub fn open_virtual(port_name: &str) -> anyhow::Result<Self> {
        use midir::os::unix::VirtualOutput;

        let midi = MidiOutput::new("Fillin MIDI output")?;
        match midi.create_virtual(port_name) {
            Ok(connection) => {
                log::info!("created virtual MIDI output {port_name}");
                Ok(Self {
                    name: port_name.to_string(),
                    connection: Mutex::new(connection),
                })
            }
            Err(err) => Err(anyhow!("{err}")),
        }
    }
}
impl OutputTarget for ExternalMidiOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, channel: MidiChannel, message: MidiMessage) -> anyhow::Result<()> {
        let event = LiveEvent::Midi {
            channel: u4::from(channel),
            message,
        };
        let mut buf = Vec::new();
        event
            .write(&mut buf)
            .map_err(|err| anyhow!("couldn't encode {message:?}: {err:?}"))?;
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| anyhow!("MIDI output {} is poisoned", self.name))?;
        connection.send(&buf).map_err(|err| anyhow!("{err}"))
    }
}

/// Keeps everything sent to it. Handy when there's no hardware around.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    name: String,
    sent: Mutex<Vec<(MidiChannel, MidiMessage)>>,
}
impl RecordingOutput {
    pub fn new_with(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sent: Default::default(),
        }
    }

    pub fn sent(&self) -> Vec<(MidiChannel, MidiMessage)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}
impl OutputTarget for RecordingOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, channel: MidiChannel, message: MidiMessage) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow!("recording output {} is poisoned", self.name))?
            .push((channel, message));
        Ok(())
    }
}

/// What happened during one performance.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PerformanceReport {
    pub sent: usize,
    pub failed: usize,
}

/// Plays rendered scores onto an [OutputTarget] in real time.
///
/// Send failures don't stop a performance and are never handed back to
/// whoever started it. They're logged here, and counted in the
/// [PerformanceReport] for anyone who plays synchronously.
pub struct Performer {}
impl Performer {
    /// Plays already-rendered messages on the calling thread, sleeping until
    /// each one is due.
    pub fn play(messages: &[TimedMessage], target: &dyn OutputTarget) -> PerformanceReport {
        let start = Instant::now();
        let mut report = PerformanceReport::default();
        for timed in messages {
            let due = start + timed.offset;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
            match target.send(timed.channel, timed.message) {
                Ok(_) => report.sent += 1,
                Err(err) => {
                    report.failed += 1;
                    log::error!("playback to {} failed: {err}", target.name());
                }
            }
        }
        if report.failed > 0 {
            log::warn!(
                "performance on {} finished with {} of {} messages lost",
                target.name(),
                report.failed,
                report.sent + report.failed
            );
        }
        report
    }
}

/// One event from an input port, in the shape the filters want.
#[derive(Clone, Debug, PartialEq)]
pub struct InputEvent {
    pub device: String,
    /// Seconds since the previous event from the same port.
    pub delta: f64,
    pub event: Event,
}

// Turns raw input callbacks into InputEvents on a channel.
struct InputForwarder {
    device: String,
    sender: Sender<InputEvent>,
    last_stamp: Option<u64>,
    disconnected: bool,
}
impl InputForwarder {
    fn new_with(device: &str, sender: Sender<InputEvent>) -> Self {
        Self {
            device: device.to_string(),
            sender,
            last_stamp: None,
            disconnected: false,
        }
    }

    fn handle(&mut self, stamp: u64, bytes: &[u8]) {
        let delta = self
            .last_stamp
            .map(|last| Duration::from_micros(stamp.saturating_sub(last)).as_secs_f64())
            .unwrap_or_default();
        self.last_stamp = Some(stamp);
        let Ok(LiveEvent::Midi { channel, message }) = LiveEvent::parse(bytes) else {
            return;
        };
        let input = InputEvent {
            device: self.device.clone(),
            delta,
            event: Event::from_midi(channel.as_int(), &message),
        };
        if let Err(err) = self.sender.try_send(input) {
            // Logged once. A dropped receiver never comes back.
            if !self.disconnected {
                log::debug!("dropping input from {}: {err}", self.device);
                self.disconnected = true;
            }
        }
    }
}

/// Handles MIDI input arriving via `midir` (e.g., via a MIDI keyboard plugged
/// into your computer's USB) and forwards it over a channel.
pub struct MidiInputService {
    device: String,
    connection: Option<MidiInputConnection<()>>,
    receiver: Receiver<InputEvent>,
}
impl Debug for MidiInputService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiInputService")
            .field("device", &self.device)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}
impl MidiInputService {
    /// Connects to the input port best matching `port_name`.
    pub fn open(port_name: &str) -> anyhow::Result<Self> {
        let midi = MidiInput::new("Fillin MIDI input")?;
        let ports = midi.ports();
        let descriptors: Vec<MidiPortDescriptor> = ports
            .iter()
            .enumerate()
            .map(|(index, port)| MidiPortDescriptor {
                index,
                name: midi.port_name(port).unwrap_or("[unknown]".to_string()),
            })
            .collect();
        let selected = find_port(&descriptors, port_name)
            .ok_or_else(|| anyhow!("no MIDI input port matches \"{port_name}\""))?;
        let port = ports
            .get(selected.index)
            .ok_or_else(|| anyhow!("MIDI input port #{} is no longer valid", selected.index))?;

        let (sender, receiver) = unbounded();
        let device = selected.name.clone();
        let mut forwarder = InputForwarder::new_with(&device, sender);
        match midi.connect(
            port,
            "Fillin input",
            move |stamp, bytes, _| forwarder.handle(stamp, bytes),
            (),
        ) {
            Ok(connection) => {
                log::info!("opened MIDI input {selected}");
                Ok(Self {
                    device,
                    connection: Some(connection),
                    receiver,
                })
            }
            Err(err) => Err(anyhow!("{err}")),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }

    /// Closes the port. The receiver disconnects once anything already
    /// queued has been drained.
    pub fn stop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
    }
}
impl Drop for MidiInputService {
    fn drop(&mut self) {
        self.stop();
    }
}
