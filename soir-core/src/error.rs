//! Errors surfaced by the engine to user code.

use thiserror::Error;

/// Errors raised by engine operations when an invariant is violated.
///
/// User-code failures (a loop or live body returning an error) are not
/// represented here: they are caught at the execution boundary and
/// reported through the host log.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An operation that needs a loop context was called from the
    /// global scope (for instance `sleep`).
    #[error("not in a loop context")]
    NotInLoop,

    /// An operation reserved to the global scope was called from
    /// inside a loop body (for instance setting the BPM).
    #[error("not allowed inside a loop context")]
    InLoop,

    /// A control was advanced outside of the control update pass.
    #[error("control advanced outside of the update loop")]
    NotInControlLoop,

    /// No MIDI channel or track could be resolved for the current loop.
    #[error("no MIDI channel or track configured for this loop")]
    UnknownMidiTrack,

    /// `ctrl()` was called with a name that has no registered control.
    #[error("unknown control '{0}'")]
    ControlNotFound(String),

    /// `set()` was called on a control kind that does not support it.
    #[error("control '{0}' does not support set()")]
    ControlNotSettable(String),

    /// A sampler was created against a pack the host has not loaded.
    #[error("sample pack '{0}' is not loaded in this session")]
    SamplePackNotFound(String),

    /// A host payload could not be encoded.
    #[error("payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}
