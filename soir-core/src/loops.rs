//! Loop registry and temporal recursion.
//!
//! A loop is a named user callable re-entered every `beats` beats. The
//! scheduler never holds the loop itself, only a re-dispatch action keyed
//! by name: when the action fires it looks the artifact up again and
//! exits early if a reconciliation pass removed it in the meantime.

use crate::api::{Api, Body};
use crate::engine::State;
use crate::host::Host;
use crate::sched::Action;
use std::collections::HashMap;

/// Declaration parameters of a loop.
#[derive(Clone, Debug)]
pub struct LoopOpts {
    /// Period of the temporal recursion, in beats.
    pub beats: u32,
    /// Track the loop plays on.
    pub track: Option<String>,
    /// Delay the first run so it starts on a multiple of `beats`.
    pub align: bool,
}

impl Default for LoopOpts {
    fn default() -> Self {
        Self {
            beats: 4,
            track: None,
            align: true,
        }
    }
}

pub(crate) struct LoopArtifact {
    pub beats: u32,
    pub track: Option<String>,
    pub align: bool,
    pub body: Body,
    /// Generation of the snapshot that last declared this loop.
    pub updated_at: u64,
    /// Beat at which the body last began executing.
    pub eval_at: Option<f64>,
    /// Accumulated sub-beat offset within the current run, advanced by
    /// `sleep` and consumed by every in-loop schedule.
    pub current_offset: f64,
    /// Per-loop scratch values (MIDI channel context).
    pub extra: HashMap<String, i64>,
}

/// Register or update a loop under the current generation.
pub(crate) fn declare(st: &mut State, host: &dyn Host, name: &str, opts: LoopOpts, body: Body) {
    let beats = opts.beats.max(1);

    if let Some(lp) = st.loops.get_mut(name) {
        lp.updated_at = st.generation;
        // Updated period and alignment only take effect from the next
        // firing: the current one already enqueued itself with the old
        // values.
        lp.beats = beats;
        lp.align = opts.align;
        lp.track = opts.track;
        lp.body = body;
        return;
    }

    let lp = LoopArtifact {
        beats,
        track: opts.track,
        align: opts.align,
        body,
        updated_at: st.generation,
        eval_at: None,
        current_offset: 0.0,
        extra: HashMap::new(),
    };

    let now = st.timeline.beat();
    let at = if lp.align {
        beats as f64 - (now % beats as f64)
    } else {
        0.0
    };
    st.queue.schedule_at(now + at, run_action(name.to_string()));
    st.loops.insert(name.to_string(), lp);

    crate::api::log_routed(st, host, &format!("adding loop {}", name));
}

/// The scheduled entry that runs one iteration of a loop and re-enqueues
/// itself `beats` later.
pub(crate) fn run_action(name: String) -> Action {
    Box::new(move |st: &mut State, host: &dyn Host| {
        // Removed during reconciliation: drop the recursion.
        let body = match st.loops.get(&name) {
            Some(lp) => lp.body.clone(),
            None => return,
        };

        let now = st.timeline.beat();
        if let Some(lp) = st.loops.get_mut(&name) {
            lp.current_offset = 0.0;
            lp.eval_at = Some(now);
        }

        st.exec.current_loop = Some(name.clone());
        let result = {
            let mut api = Api::new(st, host);
            body(&mut api)
        };
        st.exec.current_loop = None;

        // Reschedule before surfacing any error so a broken body keeps
        // its slot instead of silencing the loop.
        let beats = st.loops.get(&name).map(|lp| lp.beats).unwrap_or(1);
        let due = st.timeline.beat() + beats as f64;
        st.queue.schedule_at(due, run_action(name.clone()));

        if let Err(e) = result {
            host.log(&format!("error in loop {}: {:#}", name, e));
        }
    })
}
