//! A running Soir session: engine, audio clock, MIDI and host bridge.
//!
//! The session assembles the engine's host from the runtime parts: log
//! lines go to the console, MIDI notes to the midir output thread, and
//! everything addressed to the DSP side (sample triggers, control
//! payloads, recording, track layouts) is forwarded over a channel for
//! the audio process bridge to consume.

use crate::console::ConsoleLog;
use crate::driver::AudioDriver;
use crate::midi_out::MidiOut;
use crate::watcher::SourceWatcher;
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use soir_core::{Engine, EngineStats, Snapshot};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Messages forwarded to the DSP side of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SamplePlay {
        track: Option<String>,
        params: String,
    },
    SampleStop {
        track: Option<String>,
        params: String,
    },
    Controls {
        payload: String,
    },
    StartRecording {
        path: String,
    },
    StopRecording,
    TracksChanged {
        layout: String,
    },
}

/// Session parameters fixed at startup.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Control plane update frequency in Hz.
    pub control_update_hz: f64,
    /// Sample packs available to `sampler::new`, with their samples.
    pub sample_packs: BTreeMap<String, Vec<String>>,
    /// MIDI output port to connect to, by name fragment.
    pub midi_port: Option<String>,
    /// Block size reported to the engine before the stream runs.
    pub block_size_hint: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_update_hz: 100.0,
            sample_packs: BTreeMap::new(),
            midi_port: None,
            block_size_hint: 512,
        }
    }
}

/// The engine host built out of the runtime parts.
struct SessionHost {
    console: ConsoleLog,
    midi: Option<MidiOut>,
    events_tx: Sender<EngineEvent>,
    tracks: Mutex<String>,
    sample_rate: u32,
    config: SessionConfig,
}

impl soir_core::Host for SessionHost {
    fn log(&self, message: &str) {
        self.console.line(message);
    }

    fn block_size(&self) -> u32 {
        self.config.block_size_hint
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn control_update_frequency(&self) -> f64 {
        self.config.control_update_hz
    }

    fn midi_note_on(&self, track: &str, channel: u8, note: u8, velocity: u8) {
        log::trace!("note on {} ch{} {} vel{}", track, channel, note, velocity);
        if let Some(midi) = &self.midi {
            midi.note_on(channel, note, velocity);
        }
    }

    fn midi_note_off(&self, track: &str, channel: u8, note: u8, velocity: u8) {
        log::trace!("note off {} ch{} {} vel{}", track, channel, note, velocity);
        if let Some(midi) = &self.midi {
            midi.note_off(channel, note, velocity);
        }
    }

    fn sample_play(&self, track: Option<&str>, params: &str) {
        let _ = self.events_tx.send(EngineEvent::SamplePlay {
            track: track.map(|t| t.to_string()),
            params: params.to_string(),
        });
    }

    fn sample_stop(&self, track: Option<&str>, params: &str) {
        let _ = self.events_tx.send(EngineEvent::SampleStop {
            track: track.map(|t| t.to_string()),
            params: params.to_string(),
        });
    }

    fn publish_controls(&self, payload: &str) {
        let _ = self.events_tx.send(EngineEvent::Controls {
            payload: payload.to_string(),
        });
    }

    fn start_recording(&self, path: &str) {
        let _ = self.events_tx.send(EngineEvent::StartRecording {
            path: path.to_string(),
        });
    }

    fn stop_recording(&self) {
        let _ = self.events_tx.send(EngineEvent::StopRecording);
    }

    fn setup_tracks(&self, layout: &str) -> bool {
        *self.tracks.lock().unwrap() = layout.to_string();
        let _ = self.events_tx.send(EngineEvent::TracksChanged {
            layout: layout.to_string(),
        });
        true
    }

    fn get_tracks(&self) -> String {
        self.tracks.lock().unwrap().clone()
    }

    fn sample_packs(&self) -> Vec<String> {
        self.config.sample_packs.keys().cloned().collect()
    }

    fn pack_samples(&self, pack: &str) -> Vec<String> {
        self.config
            .sample_packs
            .get(pack)
            .cloned()
            .unwrap_or_default()
    }
}

/// A running session.
pub struct Session {
    engine: Arc<Engine>,
    driver: Option<AudioDriver>,
    watcher: Option<SourceWatcher>,
    events_rx: Receiver<EngineEvent>,
}

impl Session {
    /// Open the default audio device and start the engine clock.
    ///
    /// MIDI output failing to initialize is not fatal: notes are then
    /// dropped, the rest of the session works.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let sample_rate = AudioDriver::probe()?;
        let (engine, events_rx) = Self::build_engine(config, sample_rate, true);
        let driver = AudioDriver::start(engine.clone())?;

        Ok(Self {
            engine,
            driver: Some(driver),
            watcher: None,
            events_rx,
        })
    }

    /// A session without audio or MIDI devices. The caller drives the
    /// clock through `engine().on_block`; useful for tests and tools.
    pub fn headless(config: SessionConfig, sample_rate: u32) -> Self {
        let (engine, events_rx) = Self::build_engine(config, sample_rate, false);
        Self {
            engine,
            driver: None,
            watcher: None,
            events_rx,
        }
    }

    fn build_engine(
        config: SessionConfig,
        sample_rate: u32,
        with_midi: bool,
    ) -> (Arc<Engine>, Receiver<EngineEvent>) {
        let (events_tx, events_rx) = unbounded();

        let midi = if with_midi { MidiOut::new().ok() } else { None };
        if let (Some(midi), Some(port)) = (&midi, &config.midi_port) {
            midi.connect(port);
        }

        let host = Arc::new(SessionHost {
            console: ConsoleLog::new(),
            midi,
            events_tx,
            tracks: Mutex::new("{}".to_string()),
            sample_rate,
            config,
        });
        (Arc::new(Engine::new(host)), events_rx)
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Messages bound for the DSP side.
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events_rx
    }

    /// Evaluate a code snapshot.
    pub fn ingest(&self, snapshot: &Snapshot) {
        self.engine.ingest(snapshot);
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Watch `dir` for changes, returning the stream of snapshot texts.
    /// The language front-end turns each text into a `Snapshot` and
    /// feeds it back through [`Session::ingest`].
    pub fn watch(&mut self, dir: impl AsRef<Path>) -> Result<Receiver<String>> {
        let (tx, rx) = unbounded();
        self.watcher = Some(SourceWatcher::new(dir, tx)?);
        Ok(rx)
    }

    /// Stop the clock and tear the engine down.
    pub fn shutdown(self) {
        self.engine.shutdown();
        if let Some(driver) = &self.driver {
            let _ = driver.pause();
        }
    }
}
