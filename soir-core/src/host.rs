//! Host-provided operations the engine calls into.
//!
//! The engine itself owns no audio or MIDI device: rendering, device I/O
//! and disk recording live on the other side of this trait. Payloads that
//! cross it are JSON strings, which keeps the bridge language-neutral
//! (the original engine talks to its DSP process the same way).

/// Operations the embedding runtime must provide.
///
/// All methods are called with the engine lock held, from either the
/// audio-driver thread (during a drain) or the ingest thread. They must
/// not block; implementations are expected to offload to their own
/// threads or channels.
pub trait Host: Send + Sync {
    /// Report a user-visible log line.
    fn log(&self, message: &str);

    /// Audio block size in frames.
    fn block_size(&self) -> u32;

    /// Audio sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Update frequency of the control plane, in Hz.
    fn control_update_frequency(&self) -> f64;

    /// Send a MIDI note-on to the synthesizer configured on `track`.
    fn midi_note_on(&self, track: &str, channel: u8, note: u8, velocity: u8);

    /// Send a MIDI note-off to the synthesizer configured on `track`.
    fn midi_note_off(&self, track: &str, channel: u8, note: u8, velocity: u8);

    /// Trigger a sample. `params` is a JSON object whose values are
    /// floats or control names (resolved to live values on the DSP side).
    fn sample_play(&self, track: Option<&str>, params: &str);

    /// Stop a playing sample, LIFO when several share a name.
    fn sample_stop(&self, track: Option<&str>, params: &str);

    /// Publish the `{"knobs": {name: value}}` control payload.
    fn publish_controls(&self, payload: &str);

    /// Start recording the audio output to `path`.
    fn start_recording(&self, path: &str);

    /// Stop the active recording.
    fn stop_recording(&self);

    /// Apply a track layout, JSON-encoded as `{name: track}`.
    fn setup_tracks(&self, layout: &str) -> bool;

    /// Current track layout, JSON-encoded as `{name: track}`.
    fn get_tracks(&self) -> String;

    /// Names of the sample packs loaded in this session.
    fn sample_packs(&self) -> Vec<String>;

    /// Names of the samples available in `pack`.
    fn pack_samples(&self, pack: &str) -> Vec<String>;
}
