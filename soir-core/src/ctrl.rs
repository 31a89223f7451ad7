//! Real-time controls: named value generators advanced at a fixed rate.
//!
//! A control computes a fresh value on every pass of the control update
//! loop; the payload of all values is published to the host, which
//! interpolates between updates. Controls are registered from user code
//! (`mk_lfo`, `mk_linear`, `mk_val`, `mk_func`) and referred to by name.

use crate::api::Api;
use crate::engine::State;
use crate::error::EngineError;
use crate::host::Host;
use crate::sched::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Callable backing a `Func` control. Runs inside the update pass and
/// may read other controls through the API handle.
pub type FuncBody = Arc<dyn Fn(&mut Api<'_>) -> f64 + Send + Sync>;

/// Where a control was declared. Drives its reconciliation policy: a
/// control dies with the scope that stopped producing it.
#[derive(Clone, Debug)]
pub(crate) enum ControlScope {
    /// Declared at the top level of a snapshot.
    Global { generation: u64 },
    /// Declared while a live body was executing.
    Live { name: String, eval_at: f64 },
    /// Declared while a loop body was executing.
    Loop { name: String, eval_at: f64 },
}

#[derive(Clone)]
pub(crate) enum ControlKind {
    Lfo {
        rate: f64,
        intensity: f64,
        low: f64,
        high: f64,
    },
    Linear {
        start: f64,
        end: f64,
        duration: f64,
    },
    Val,
    Func(FuncBody),
}

pub(crate) struct Control {
    pub kind: ControlKind,
    /// Per-control clock in seconds, preserved across re-declarations.
    pub tick: f64,
    pub value: f64,
    pub scope: ControlScope,
}

impl Control {
    /// Advance one update step of `tick_sec` seconds.
    ///
    /// Pure kinds update in place. A `Func` control returns its callable
    /// instead: the caller runs it with full engine context and stores
    /// the result, since the callable may read other controls.
    pub(crate) fn fwd(&mut self, tick_sec: f64) -> Option<FuncBody> {
        match &self.kind {
            ControlKind::Lfo {
                rate,
                intensity,
                low,
                high,
            } => {
                let u = ((self.tick * std::f64::consts::TAU * rate).sin() * intensity + 1.0) / 2.0;
                self.value = low + (high - low) * u;
                self.tick += tick_sec;
                None
            }
            ControlKind::Linear {
                start,
                end,
                duration,
            } => {
                // Deliberately unclamped past `duration`.
                self.value = start + (end - start) * (self.tick / duration);
                self.tick += tick_sec;
                None
            }
            ControlKind::Val => None,
            ControlKind::Func(f) => Some(f.clone()),
        }
    }
}

/// The control registry. A `BTreeMap` so every iteration is in
/// lexicographic name order: a `Func` control reading another control
/// sees an already-advanced value for any earlier name, and the
/// published payload is stable. This ordering is a contract.
pub(crate) struct ControlBank {
    pub map: BTreeMap<String, Control>,
    /// Update frequency in Hz, fixed at engine startup.
    pub frequency: f64,
}

impl ControlBank {
    pub fn new(frequency: f64) -> Self {
        Self {
            map: BTreeMap::new(),
            frequency,
        }
    }
}

#[derive(Serialize)]
struct ControlsPayload {
    knobs: BTreeMap<String, f64>,
}

/// The self-rescheduling scheduler entry implementing the control clock.
pub(crate) fn update_action() -> Action {
    Box::new(update_tick)
}

fn update_tick(st: &mut State, host: &dyn Host) {
    st.exec.in_ctrl_update = true;

    let names: Vec<String> = st.ctrls.map.keys().cloned().collect();
    let mut knobs = BTreeMap::new();
    for name in names {
        advance(st, host, &name);
        if let Some(c) = st.ctrls.map.get(&name) {
            knobs.insert(name, c.value);
        }
    }

    match serde_json::to_string(&ControlsPayload { knobs }) {
        Ok(payload) => host.publish_controls(&payload),
        Err(e) => host.log(&format!("controls payload encoding failed: {}", e)),
    }

    // Re-evaluated each tick so the period in beats follows the BPM; in
    // wall-clock seconds it stays 1/frequency at any tempo.
    let next = (1.0 / st.ctrls.frequency) * st.timeline.bpm() / 60.0;
    let due = st.timeline.beat() + next;
    st.queue.schedule_at(due, update_action());

    st.exec.in_ctrl_update = false;
}

/// Advance a single control by one update step.
pub(crate) fn advance(st: &mut State, host: &dyn Host, name: &str) {
    let tick_sec = 1.0 / st.ctrls.frequency;
    let func = match st.ctrls.map.get_mut(name) {
        Some(c) => c.fwd(tick_sec),
        None => return,
    };
    if let Some(f) = func {
        let value = {
            let mut api = Api::new(st, host);
            f(&mut api)
        };
        if let Some(c) = st.ctrls.map.get_mut(name) {
            c.value = value;
        }
    }
}

/// Capture the declaration scope from the current execution context.
fn capture_scope(st: &State) -> ControlScope {
    if let Some(name) = &st.exec.current_live {
        let eval_at = st.lives.get(name).map(|l| l.eval_at).unwrap_or(0.0);
        ControlScope::Live {
            name: name.clone(),
            eval_at,
        }
    } else if let Some(name) = &st.exec.current_loop {
        let eval_at = st.loops.get(name).and_then(|l| l.eval_at).unwrap_or(0.0);
        ControlScope::Loop {
            name: name.clone(),
            eval_at,
        }
    } else {
        ControlScope::Global {
            generation: st.generation,
        }
    }
}

/// Register a control, replacing any prior one with the same name.
///
/// When the name already exists the prior `tick` and `value` carry over
/// so a re-declaration hands off smoothly instead of restarting the
/// generator; kinds that define an initial value override the latter.
pub(crate) fn insert(st: &mut State, name: &str, kind: ControlKind, init_value: Option<f64>) {
    let (tick, value) = st
        .ctrls
        .map
        .get(name)
        .map(|c| (c.tick, c.value))
        .unwrap_or((0.0, 0.0));
    let scope = capture_scope(st);
    st.ctrls.map.insert(
        name.to_string(),
        Control {
            kind,
            tick,
            value: init_value.unwrap_or(value),
            scope,
        },
    );
}

/// Drop controls whose declaring scope stopped producing them.
///
/// Runs after the loop and live sweeps of a snapshot evaluation, while
/// the generation counter still holds the evaluated snapshot's id.
pub(crate) fn sweep(st: &mut State) {
    let mut dead = Vec::new();
    for (name, c) in &st.ctrls.map {
        let gone = match &c.scope {
            // Last declared under an older snapshot: no longer present
            // in the global scope.
            ControlScope::Global { generation } => *generation != st.generation,
            // The hosting live was removed, or it ran again without
            // re-creating the control.
            ControlScope::Live { name, eval_at } => st
                .lives
                .get(name)
                .map_or(true, |lv| lv.eval_at != *eval_at),
            // Same policy for loops. The check only happens on snapshot
            // evaluation, not on every loop run.
            ControlScope::Loop { name, eval_at } => st
                .loops
                .get(name)
                .map_or(true, |lp| lp.eval_at != Some(*eval_at)),
        };
        if gone {
            dead.push(name.clone());
        }
    }
    for name in dead {
        st.ctrls.map.remove(&name);
    }
}

/// A named reference to a registered control.
///
/// Carries the value observed when the reference was taken; pass it to
/// sampler or track parameters to have the audio side resolve the live
/// value by name.
#[derive(Clone, Debug)]
pub struct Ctrl {
    name: String,
    value: f64,
}

impl Ctrl {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value at the time the reference was taken.
    pub fn get(&self) -> f64 {
        self.value
    }

    /// Replace the value of a `Val` control.
    pub fn set(&self, api: &mut Api<'_>, value: f64) -> Result<(), EngineError> {
        api.ctrl_set(&self.name, value)
    }

    /// Advance the control by one update step.
    ///
    /// Meant to be driven by the engine: fails with `NotInControlLoop`
    /// anywhere outside the control update pass.
    pub fn fwd(&self, api: &mut Api<'_>) -> Result<(), EngineError> {
        api.ctrl_fwd(&self.name)
    }
}

/// A parameter that is either a plain value or a control reference.
///
/// Serializes as a bare float or as the control's name string, which is
/// the negotiated host encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Value(f64),
    Control(String),
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Value(v)
    }
}

impl From<&Ctrl> for Param {
    fn from(c: &Ctrl) -> Self {
        Param::Control(c.name().to_string())
    }
}

impl Api<'_> {
    /// Create an LFO control oscillating between `low` and `high` at
    /// `rate` Hz, scaled by `intensity`.
    pub fn mk_lfo(&mut self, name: &str, rate: f64, intensity: f64, low: f64, high: f64) {
        self.with_state(|st| {
            insert(
                st,
                name,
                ControlKind::Lfo {
                    rate,
                    intensity,
                    low,
                    high,
                },
                None,
            )
        });
    }

    /// Create a linear ramp from `start` to `end` over `duration`
    /// seconds. The ramp keeps extrapolating past `duration`.
    pub fn mk_linear(&mut self, name: &str, start: f64, end: f64, duration: f64) {
        self.with_state(|st| {
            insert(
                st,
                name,
                ControlKind::Linear {
                    start,
                    end,
                    duration,
                },
                Some(start),
            )
        });
    }

    /// Create a constant control that only changes through `set()`.
    pub fn mk_val(&mut self, name: &str, value: f64) {
        self.with_state(|st| insert(st, name, ControlKind::Val, Some(value)));
    }

    /// Create a control computed by `func` on every update pass.
    pub fn mk_func(
        &mut self,
        name: &str,
        func: impl Fn(&mut Api<'_>) -> f64 + Send + Sync + 'static,
    ) {
        let func: FuncBody = Arc::new(func);
        self.with_state(|st| insert(st, name, ControlKind::Func(func.clone()), None));
        // The initial value is computed right away, outside the update
        // loop, so the control is readable before the next pass.
        let value = func(self);
        self.with_state(|st| {
            if let Some(c) = st.ctrls.map.get_mut(name) {
                c.value = value;
            }
        });
    }

    /// Look up a control by name.
    pub fn ctrl(&self, name: &str) -> Result<Ctrl, EngineError> {
        let c = self
            .state()
            .ctrls
            .map
            .get(name)
            .ok_or_else(|| EngineError::ControlNotFound(name.to_string()))?;
        Ok(Ctrl {
            name: name.to_string(),
            value: c.value,
        })
    }

    /// References to every registered control, in name order.
    pub fn controls(&self) -> Vec<Ctrl> {
        self.state()
            .ctrls
            .map
            .iter()
            .map(|(name, c)| Ctrl {
                name: name.clone(),
                value: c.value,
            })
            .collect()
    }

    pub(crate) fn ctrl_set(&mut self, name: &str, value: f64) -> Result<(), EngineError> {
        self.with_state(|st| {
            let c = st
                .ctrls
                .map
                .get_mut(name)
                .ok_or_else(|| EngineError::ControlNotFound(name.to_string()))?;
            match c.kind {
                ControlKind::Val => {
                    c.value = value;
                    Ok(())
                }
                _ => Err(EngineError::ControlNotSettable(name.to_string())),
            }
        })
    }

    pub(crate) fn ctrl_fwd(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.state().exec.in_ctrl_update {
            return Err(EngineError::NotInControlLoop);
        }
        if !self.state().ctrls.map.contains_key(name) {
            return Err(EngineError::ControlNotFound(name.to_string()));
        }
        let (st, host) = self.parts();
        advance(st, host, name);
        Ok(())
    }
}
