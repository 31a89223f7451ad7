//! # Soir
//!
//! Soir is a live-coding music environment: you edit a directory of
//! source files and the engine re-evaluates them on every save, keeping
//! loops, setup blocks and real-time controls coherent with a running
//! audio timeline.
//!
//! This crate is the desktop runtime around [`soir_core`]: a cpal-driven
//! audio clock, a midir MIDI output, a notify-based source watcher and a
//! console logger, wired together by [`session::Session`]. The engine
//! itself (beat scheduling, code hot-swap, the control plane) lives in
//! `soir-core` and is device-free.
//!
//! ## Modules
//!
//! - `session`: assembles the engine host and owns the running pieces.
//! - `driver`: the cpal output stream advancing the beat clock.
//! - `midi_out`: midir-backed MIDI note dispatch on its own thread.
//! - `watcher`: turns directory changes into full code snapshots.
//! - `console`: colored console output for engine messages.

pub mod console;
pub mod driver;
pub mod midi_out;
pub mod session;
pub mod watcher;

// Re-export the core surface so embedders need a single dependency.
pub use session::{EngineEvent, Session, SessionConfig};
pub use soir_core::{
    Api, Engine, EngineError, EngineStats, Host, LoopOpts, PlayParams, Snapshot, SourceSpan,
};
