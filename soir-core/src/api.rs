//! The surface user code sees while a snapshot or a body executes.
//!
//! Every registration and operation goes through an [`Api`] handle: the
//! ingestor passes one to the snapshot program, the scheduler passes one
//! to loop and live bodies. The handle knows whether a loop or live is
//! currently executing and enforces the scope invariants (`sleep` only
//! inside a loop, BPM and track setup only outside).

use crate::engine::State;
use crate::error::EngineError;
use crate::host::Host;
use crate::live::{self, SourceSpan};
use crate::loops::{self, LoopArtifact, LoopOpts};
use std::sync::Arc;

/// A user callable: a snapshot program or a loop/live body.
///
/// The return value is the user-error channel; failures are caught at
/// the execution boundary and reported through the host log.
pub type Body = Arc<dyn Fn(&mut Api<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Handle to the engine for user code.
pub struct Api<'a> {
    st: &'a mut State,
    host: &'a dyn Host,
}

impl<'a> Api<'a> {
    pub(crate) fn new(st: &'a mut State, host: &'a dyn Host) -> Self {
        Self { st, host }
    }

    pub(crate) fn state(&self) -> &State {
        self.st
    }

    pub(crate) fn with_state<R>(&mut self, f: impl FnOnce(&mut State) -> R) -> R {
        f(self.st)
    }

    pub(crate) fn parts(&mut self) -> (&mut State, &dyn Host) {
        (&mut *self.st, self.host)
    }

    pub(crate) fn host(&self) -> &dyn Host {
        self.host
    }

    pub(crate) fn current_loop(&self) -> Option<&LoopArtifact> {
        let name = self.st.exec.current_loop.as_deref()?;
        self.st.loops.get(name)
    }

    pub(crate) fn current_loop_mut(&mut self) -> Option<&mut LoopArtifact> {
        let name = self.st.exec.current_loop.clone()?;
        self.st.loops.get_mut(&name)
    }

    /// Track and offset of the current loop; the track is required.
    pub(crate) fn loop_track_offset(&self) -> Result<(String, f64), EngineError> {
        let lp = self.current_loop().ok_or(EngineError::NotInLoop)?;
        let track = lp.track.clone().ok_or(EngineError::UnknownMidiTrack)?;
        Ok((track, lp.current_offset))
    }

    /// Track and offset of the current loop; the track may be unset.
    pub(crate) fn loop_any_track_offset(&self) -> Result<(Option<String>, f64), EngineError> {
        let lp = self.current_loop().ok_or(EngineError::NotInLoop)?;
        Ok((lp.track.clone(), lp.current_offset))
    }

    pub(crate) fn assert_not_in_loop(&self) -> Result<(), EngineError> {
        if self.st.exec.current_loop.is_some() {
            return Err(EngineError::InLoop);
        }
        Ok(())
    }

    /// Current beat, shifted by the loop's offset when called from a
    /// loop body so it reflects where scheduled events will land.
    pub fn beat(&self) -> f64 {
        let beat = self.st.timeline.beat();
        match self.current_loop() {
            Some(lp) => beat + lp.current_offset,
            None => beat,
        }
    }

    /// Current tempo. Global scope only.
    pub fn bpm(&self) -> Result<f64, EngineError> {
        self.assert_not_in_loop()?;
        Ok(self.st.timeline.bpm())
    }

    /// Replace the tempo. Global scope only.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<f64, EngineError> {
        self.assert_not_in_loop()?;
        Ok(self.st.timeline.set_bpm(bpm))
    }

    /// Advance the current loop's scheduling cursor by `beats`.
    ///
    /// Nothing blocks: subsequent notes, sample triggers and logs from
    /// this body are deferred by the accumulated offset.
    pub fn sleep(&mut self, beats: f64) -> Result<(), EngineError> {
        match self.current_loop_mut() {
            Some(lp) => {
                lp.current_offset += beats;
                Ok(())
            }
            None => Err(EngineError::NotInLoop),
        }
    }

    /// Log a message, deferred by the loop offset when inside a loop so
    /// it lines up with the events scheduled around it.
    pub fn log(&mut self, message: &str) {
        log_routed(self.st, self.host, message);
    }

    /// Record the audio output to `path`. Global scope only.
    ///
    /// Recording continues as long as each evaluated snapshot keeps
    /// calling this; a snapshot that drops the call stops it, and a
    /// changed path stops the old file before starting the new one.
    pub fn record(&mut self, path: &str) -> Result<bool, EngineError> {
        self.assert_not_in_loop()?;
        if self.st.recording.path.as_deref() != Some(path) {
            if self.st.recording.path.is_some() {
                self.host.stop_recording();
            }
            self.host.start_recording(path);
            self.st.recording.path = Some(path.to_string());
        }
        self.st.recording.requested_at = self.st.generation;
        Ok(true)
    }

    /// Declare a loop. New names start their temporal recursion (aligned
    /// to the period when `opts.align` is set); existing names are
    /// updated in place and keep their scheduled timing.
    pub fn define_loop(
        &mut self,
        name: &str,
        opts: LoopOpts,
        body: impl Fn(&mut Api<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        loops::declare(self.st, self.host, name, opts, Arc::new(body));
    }

    /// Declare a live block. Runs immediately when new or when the
    /// snapshot text covered by `span` changed since last declaration.
    pub fn define_live(
        &mut self,
        name: &str,
        span: SourceSpan,
        body: impl Fn(&mut Api<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        live::declare(self.st, self.host, name, span, Arc::new(body));
    }
}

/// Shared log routing: direct when global, scheduled at the loop offset
/// when a loop body is executing.
pub(crate) fn log_routed(st: &mut State, host: &dyn Host, message: &str) {
    let offset = st
        .exec
        .current_loop
        .as_deref()
        .and_then(|name| st.loops.get(name))
        .map(|lp| lp.current_offset);
    match offset {
        Some(offset) => {
            let msg = message.to_string();
            let due = st.timeline.beat() + offset;
            st.queue
                .schedule_at(due, Box::new(move |_st, host| host.log(&msg)));
        }
        None => host.log(message),
    }
}
