// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! The CLI (command-line interface) tool listens to a MIDI input and plays
//! drum phrases on a MIDI output.

use anyhow::anyhow;
use clap::Parser;
use fillin::{app_version, FilterSettings, PhraseLibrary, RigSettings};
use fillin_midi::{
    list_input_ports, list_output_ports, ExternalMidiOutput, MidiInputService, OutputTarget,
};
use fillin_utils::Paths;
use std::{path::PathBuf, sync::Arc};

#[derive(Parser, Debug, Default)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Settings file (JSON5). Defaults to fillin.json5 in the current or
    /// per-user config directory, if one exists.
    #[clap(short = 'c', long, value_parser)]
    config: Option<PathBuf>,

    /// Input port name, or a piece of one
    #[clap(short = 'i', long, value_parser)]
    input: Option<String>,

    /// Output port name, or a piece of one
    #[clap(short = 'o', long, value_parser)]
    output: Option<String>,

    /// Create a virtual output port with this name instead
    #[clap(long = "virtual", value_parser)]
    virtual_output: Option<String>,

    /// Note that plays the phrase (first filter)
    #[clap(short = 't', long, value_parser)]
    trigger: Option<u8>,

    /// Control-change value that plays the phrase (first filter)
    #[clap(long, value_parser)]
    value: Option<u8>,

    /// Bars per phrase (first filter)
    #[clap(short = 'b', long, value_parser)]
    bars: Option<i64>,

    /// Tempo in beats per minute (first filter)
    #[clap(long, value_parser)]
    bpm: Option<i64>,

    /// Phrase name (first filter)
    #[clap(short = 'p', long, value_parser)]
    phrase: Option<String>,

    /// List MIDI ports and phrases, then exit
    #[clap(short = 'l', long, value_parser)]
    list_ports: bool,

    /// Print version and exit
    #[clap(short = 'v', long, value_parser)]
    version: bool,
}
impl Args {
    fn apply_to(&self, settings: &mut RigSettings) {
        if self.input.is_some() {
            settings.input = self.input.clone();
        }
        if self.output.is_some() {
            settings.output = self.output.clone();
        }
        if self.virtual_output.is_some() {
            settings.virtual_output = self.virtual_output.clone();
        }
        if settings.filters.is_empty() {
            settings.filters.push(FilterSettings::default());
        }
        let first = &mut settings.filters[0];
        if self.trigger.is_some() {
            first.trigger = self.trigger;
        }
        if self.value.is_some() {
            first.value = self.value;
        }
        if let Some(bars) = self.bars {
            first.bars = bars;
        }
        if let Some(bpm) = self.bpm {
            first.bpm = bpm;
        }
        if let Some(phrase) = self.phrase.as_ref() {
            first.phrase = phrase.clone();
        }
    }
}

fn list(library: &PhraseLibrary) -> anyhow::Result<()> {
    println!("MIDI inputs:");
    for port in list_input_ports()? {
        println!("  {port}");
    }
    println!("MIDI outputs:");
    for port in list_output_ports()? {
        println!("  {port}");
    }
    println!("Phrases:");
    for name in library.names() {
        println!("  {name}");
    }
    Ok(())
}

fn open_output(settings: &RigSettings) -> anyhow::Result<Arc<dyn OutputTarget>> {
    if let Some(name) = settings.virtual_output.as_ref() {
        #[cfg(unix)]
        return Ok(Arc::new(ExternalMidiOutput::open_virtual(name)?));
        #[cfg(not(unix))]
        return Err(anyhow!("virtual port {name} needs a unix MIDI backend"));
    }
    let name = settings
        .output
        .as_ref()
        .ok_or_else(|| anyhow!("no output port given (use --output or --virtual)"))?;
    Ok(Arc::new(ExternalMidiOutput::open(name)?))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.version {
        println!("fillin-cli {}", app_version());
        return Ok(());
    }

    let library = PhraseLibrary::default();
    if args.list_ports {
        return list(&library);
    }

    let mut settings = match args.config.clone().or_else(Paths::find_config) {
        Some(path) => {
            log::info!("loading settings from {}", path.display());
            RigSettings::new_from_file(&path)?
        }
        None => RigSettings::default(),
    };
    args.apply_to(&mut settings);

    let output = open_output(&settings)?;
    let (router, _filters) = settings.instantiate(output, &library)?;

    let input_name = settings
        .input
        .as_ref()
        .ok_or_else(|| anyhow!("no input port given (use --input)"))?;
    let input = MidiInputService::open(input_name)?;
    println!(
        "Listening to {} with {} filter(s). Ctrl-C to quit.",
        input.device(),
        router.len()
    );
    router.run(input.receiver());
    Ok(())
}
