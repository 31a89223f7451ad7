//! # Soir Core
//!
//! Engine core of the Soir live-coding environment: beat-accurate
//! scheduling, hot-swappable user code and a real-time control plane,
//! with no audio or MIDI device dependencies.
//!
//! The embedding runtime drives two inputs. The audio driver calls
//! [`Engine::on_block`] before rendering each block, which advances the
//! beat clock and drains every scheduled action whose beat has passed.
//! The code path calls [`Engine::ingest`] with a full [`Snapshot`] of
//! the user's code whenever it changes; declarations made by the
//! snapshot are reconciled against the previous ones so loops, lives,
//! controls and recordings disappear when the code stops declaring them.
//!
//! ## Modules
//!
//! - `engine`: shared state, the ingestor and the block drain.
//! - `timeline`: beat cursor and tempo.
//! - `sched`: the beat-ordered action queue.
//! - `ctrl`: named value generators published to the host at a fixed
//!   rate.
//! - `loops` / `live`: the two registries of user callables and their
//!   reconciliation rules.
//! - `api`: the handle user code sees (`sleep`, `log`, declarations).
//! - `midi`, `sampler`, `tracks`, `fx`, `rnd`: the user-facing
//!   dispatchers, thin translations to host operations.
//! - `host`: the trait the embedding runtime implements.
//!
//! ## Example
//!
//! ```ignore
//! use soir_core::{Engine, LoopOpts, Snapshot};
//! use std::sync::Arc;
//!
//! let engine = Engine::new(Arc::new(my_host));
//! engine.ingest(&Snapshot::new("kick loop", |api| {
//!     api.define_loop("kick", LoopOpts { beats: 1, ..Default::default() }, |api| {
//!         api.log("tick");
//!         Ok(())
//!     });
//!     Ok(())
//! }));
//! ```

pub mod api;
pub mod ctrl;
pub mod engine;
pub mod error;
pub mod fx;
pub mod host;
pub mod live;
pub mod loops;
pub mod midi;
pub mod rnd;
pub mod sampler;
mod sched;
pub mod timeline;
pub mod tracks;

// Re-export commonly used types
pub use api::{Api, Body};
pub use ctrl::{Ctrl, Param};
pub use engine::{Engine, EngineStats, Snapshot};
pub use error::EngineError;
pub use fx::Fx;
pub use host::Host;
pub use live::SourceSpan;
pub use loops::LoopOpts;
pub use sampler::{Kit, PlayParams, Sampler};
pub use timeline::DEFAULT_BPM;
pub use tracks::Track;
