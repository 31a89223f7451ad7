//! Track setup and layout.
//!
//! A track names an instrument plus mix parameters and an effect chain.
//! `setup` applies a layout to the host, `layout` reads the current one
//! back in the same shape, so feeding one into the other is a no-op.
//! Both are global-scope operations.

use crate::api::Api;
use crate::ctrl::Param;
use crate::error::EngineError;
use crate::fx::Fx;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// Description of one engine track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default = "default_name")]
    pub name: String,
    pub instrument: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub muted: Option<bool>,
    #[serde(default = "default_volume")]
    pub volume: Param,
    #[serde(default = "default_pan")]
    pub pan: Param,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fxs: Vec<Fx>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extra: Option<serde_json::Value>,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_volume() -> Param {
    Param::Value(1.0)
}

fn default_pan() -> Param {
    Param::Value(0.0)
}

impl Track {
    pub fn new(instrument: &str) -> Self {
        Self {
            name: default_name(),
            instrument: instrument.to_string(),
            muted: None,
            volume: default_volume(),
            pan: default_pan(),
            fxs: Vec::new(),
            extra: None,
        }
    }

    /// A sampler track.
    pub fn sampler() -> Self {
        Self::new("sampler")
    }

    /// An external MIDI track, routed to `midi_out` with audio coming
    /// back on `audio_in` over the given channels.
    pub fn midi(midi_out: &str, audio_in: &str, audio_chans: &[u32]) -> Self {
        let chans = if audio_chans.is_empty() {
            vec![0, 1]
        } else {
            audio_chans.to_vec()
        };
        Self {
            extra: Some(json!({
                "midi_out": midi_out,
                "audio_in": audio_in,
                "audio_channels": chans,
            })),
            ..Self::new("midi_ext")
        }
    }

    pub fn volume(mut self, volume: impl Into<Param>) -> Self {
        self.volume = volume.into();
        self
    }

    pub fn pan(mut self, pan: impl Into<Param>) -> Self {
        self.pan = pan.into();
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = Some(muted);
        self
    }

    pub fn fx(mut self, fx: Fx) -> Self {
        self.fxs.push(fx);
        self
    }
}

/// Apply a track layout. Track names come from the map keys; existing
/// tracks not in the map are left to the host's policy.
pub fn setup(api: &mut Api<'_>, tracks: BTreeMap<String, Track>) -> Result<bool, EngineError> {
    api.assert_not_in_loop()?;

    let mut named = BTreeMap::new();
    for (name, mut track) in tracks {
        track.name = name.clone();
        named.insert(name, track);
    }
    let layout = serde_json::to_string(&named)?;
    Ok(api.host().setup_tracks(&layout))
}

/// Read the current track layout back from the host.
///
/// Control references in the layout are validated against the registry
/// so the result can be fed straight back into [`setup`].
pub fn layout(api: &Api<'_>) -> Result<BTreeMap<String, Track>, EngineError> {
    api.assert_not_in_loop()?;

    let raw = api.host().get_tracks();
    let tracks: BTreeMap<String, Track> = serde_json::from_str(&raw)?;
    for track in tracks.values() {
        for param in [&track.volume, &track.pan] {
            if let Param::Control(name) = param {
                api.ctrl(name)?;
            }
        }
    }
    Ok(tracks)
}
