//! The engine: shared state, the code ingestor and the block drain.
//!
//! All mutable state lives in one value behind a coarse lock. The audio
//! driver takes it once per rendered block to advance the beat and drain
//! the scheduler; the ingest thread takes it for the duration of a
//! snapshot evaluation. User code therefore never runs in parallel with
//! itself, and a drain never observes a half-applied ingest.

use crate::api::{Api, Body};
use crate::ctrl::{self, ControlBank};
use crate::host::Host;
use crate::live::LiveArtifact;
use crate::loops::LoopArtifact;
use crate::sched::Queue;
use crate::timeline::{Timeline, DEFAULT_BPM};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Which user scope, if any, is currently executing.
#[derive(Default)]
pub(crate) struct ExecContext {
    pub current_loop: Option<String>,
    pub current_live: Option<String>,
    pub in_ctrl_update: bool,
}

/// At most one recording is active at a time.
#[derive(Default)]
pub(crate) struct Recording {
    pub path: Option<String>,
    /// Generation of the last snapshot that requested it.
    pub requested_at: u64,
}

pub(crate) struct State {
    pub timeline: Timeline,
    pub queue: Queue,
    pub ctrls: ControlBank,
    pub loops: BTreeMap<String, LoopArtifact>,
    pub lives: BTreeMap<String, LiveArtifact>,
    /// Incremented after each successfully evaluated snapshot. Every
    /// registered artifact is stamped with the value current at its
    /// declaration; reconciliation compares stamps to prune the ones a
    /// snapshot stopped declaring.
    pub generation: u64,
    pub exec: ExecContext,
    /// Text of the last ingested snapshot, sliced for live change
    /// detection.
    pub code: String,
    pub recording: Recording,
}

/// A full snapshot of the user's code: the text as written and the
/// program that registers its declarations when executed.
///
/// Front-end language bindings produce these from the user's buffer; the
/// text is what `SourceSpan`s of live declarations slice into.
#[derive(Clone)]
pub struct Snapshot {
    text: String,
    program: Body,
}

impl Snapshot {
    pub fn new(
        text: impl Into<String>,
        program: impl Fn(&mut Api<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            text: text.into(),
            program: Arc::new(program),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Point-in-time engine counters, for status displays.
#[derive(Clone, Copy, Debug)]
pub struct EngineStats {
    pub beat: f64,
    pub bpm: f64,
    pub generation: u64,
    pub loops: usize,
    pub lives: usize,
    pub controls: usize,
    pub queued: usize,
    pub next_due: Option<f64>,
}

/// The live-coding engine core.
pub struct Engine {
    state: Mutex<State>,
    host: Arc<dyn Host>,
}

impl Engine {
    pub fn new(host: Arc<dyn Host>) -> Self {
        let frequency = host.control_update_frequency();
        let mut state = State {
            timeline: Timeline::new(DEFAULT_BPM, host.sample_rate()),
            queue: Queue::new(),
            ctrls: ControlBank::new(frequency),
            loops: BTreeMap::new(),
            lives: BTreeMap::new(),
            generation: 0,
            exec: ExecContext::default(),
            code: String::new(),
            recording: Recording::default(),
        };

        if frequency > 0.0 {
            // The control clock is a scheduler entry from the start; it
            // reschedules itself forever.
            state.queue.schedule_at(0.0, ctrl::update_action());
        } else {
            warn!("control update frequency is {}, controls disabled", frequency);
        }

        Self {
            state: Mutex::new(state),
            host,
        }
    }

    /// Evaluate a code snapshot.
    ///
    /// On success the reconciliation sweeps run and the generation is
    /// bumped. A failing program is reported through the host log and
    /// does not bump: a broken snapshot must not prune registrations
    /// made by the last good one.
    pub fn ingest(&self, snapshot: &Snapshot) {
        let mut guard = self.state.lock().unwrap();
        let st = &mut *guard;

        debug!("evaluating snapshot ({} bytes)", snapshot.text.len());
        st.code = snapshot.text.clone();

        let program = snapshot.program.clone();
        let result = {
            let mut api = Api::new(st, self.host.as_ref());
            program(&mut api)
        };

        match result {
            Ok(()) => Self::post_eval(st, self.host.as_ref()),
            Err(e) => self.host.log(&format!("evaluation error: {:#}", e)),
        }
    }

    /// Reconciliation: drop artifacts the evaluated snapshot stopped
    /// declaring, then bump the generation.
    fn post_eval(st: &mut State, host: &dyn Host) {
        let stale: Vec<String> = st
            .loops
            .iter()
            .filter(|(_, lp)| lp.updated_at != st.generation)
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            host.log(&format!("removing loop {}", name));
            st.loops.remove(&name);
        }

        let stale: Vec<String> = st
            .lives
            .iter()
            .filter(|(_, lv)| lv.updated_at != st.generation)
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            host.log(&format!("removing live {}", name));
            st.lives.remove(&name);
        }

        ctrl::sweep(st);

        if st.recording.path.is_some() && st.recording.requested_at != st.generation {
            host.stop_recording();
            st.recording.path = None;
        }

        st.generation += 1;
        debug!("snapshot applied, generation {}", st.generation);
    }

    /// Advance the beat by `frames` audio frames and drain every entry
    /// whose due beat has passed. Called by the audio driver before each
    /// block is rendered.
    pub fn on_block(&self, frames: u32) {
        let mut guard = self.state.lock().unwrap();
        let st = &mut *guard;

        st.timeline.advance(frames);
        let now = st.timeline.beat();
        while let Some(entry) = st.queue.pop_due(now) {
            (entry.action)(&mut *st, self.host.as_ref());
        }
    }

    /// Run `f` with an API handle in the global scope, outside of any
    /// snapshot. Used by embedders for programmatic setup and queries.
    pub fn with_api<R>(&self, f: impl FnOnce(&mut Api<'_>) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        let st = &mut *guard;
        let mut api = Api::new(st, self.host.as_ref());
        f(&mut api)
    }

    pub fn stats(&self) -> EngineStats {
        let st = self.state.lock().unwrap();
        EngineStats {
            beat: st.timeline.beat(),
            bpm: st.timeline.bpm(),
            generation: st.generation,
            loops: st.loops.len(),
            lives: st.lives.len(),
            controls: st.ctrls.map.len(),
            queued: st.queue.len(),
            next_due: st.queue.next_due(),
        }
    }

    /// Tear the session down: drop queued actions, remove every
    /// artifact and close an active recording.
    pub fn shutdown(&self) {
        let mut guard = self.state.lock().unwrap();
        let st = &mut *guard;

        st.queue.clear();
        st.loops.clear();
        st.lives.clear();
        st.ctrls.map.clear();
        if st.recording.path.take().is_some() {
            self.host.stop_recording();
        }
        debug!("engine shut down at beat {}", st.timeline.beat());
    }
}
