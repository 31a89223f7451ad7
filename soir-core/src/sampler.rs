//! Sample playback from loaded packs.
//!
//! A `Sampler` is a cheap handle over one pack; creating many at once is
//! fine. Plays are scheduled at the current loop offset and serialized
//! as JSON parameters for the audio side, with control references
//! rendered by name so the DSP resolves their live value.

use crate::api::Api;
use crate::ctrl::Param;
use crate::error::EngineError;
use serde::Serialize;
use std::collections::HashMap;

/// Playback parameters of a single sample trigger.
///
/// `start`/`end` select a portion of the sample in the `[0.0, 1.0]`
/// range; `attack`/`decay`/`level`/`release` shape the envelope; `rate`
/// is the playback speed and `amp` the amplitude. `pan` may be a control.
#[derive(Clone, Debug, Serialize)]
pub struct PlayParams {
    pub start: f64,
    pub end: f64,
    pub pan: Param,
    pub attack: f64,
    pub decay: f64,
    pub level: f64,
    pub release: f64,
    pub rate: f64,
    pub amp: f64,
}

impl Default for PlayParams {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 1.0,
            pan: Param::Value(0.0),
            attack: 0.0,
            decay: 0.0,
            level: 1.0,
            release: 0.0,
            rate: 1.0,
            amp: 1.0,
        }
    }
}

#[derive(Serialize)]
struct PlayPayload<'a> {
    pack: &'a str,
    name: &'a str,
    #[serde(flatten)]
    params: PlayParams,
}

#[derive(Serialize)]
struct StopPayload<'a> {
    pack: &'a str,
    name: &'a str,
}

/// A sample from a loaded pack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub name: String,
    pub pack: String,
}

/// Names of the sample packs loaded in this session.
pub fn packs(api: &Api<'_>) -> Vec<String> {
    api.host().sample_packs()
}

/// Samples available in `pack`.
pub fn samples(api: &Api<'_>, pack: &str) -> Vec<Sample> {
    api.host()
        .pack_samples(pack)
        .into_iter()
        .map(|name| Sample {
            name,
            pack: pack.to_string(),
        })
        .collect()
}

/// Create a sampler over `pack`, which must be loaded in the session.
pub fn new(api: &Api<'_>, pack: &str) -> Result<Sampler, EngineError> {
    if !api.host().sample_packs().iter().any(|p| p == pack) {
        return Err(EngineError::SamplePackNotFound(pack.to_string()));
    }
    Ok(Sampler {
        pack: pack.to_string(),
    })
}

/// Plays samples from one pack. Created with [`new`].
#[derive(Clone, Debug)]
pub struct Sampler {
    pack: String,
}

impl Sampler {
    pub fn pack(&self) -> &str {
        &self.pack
    }

    /// Trigger `name` at the current loop offset. A name with no exact
    /// match plays the first sample containing it; triggering a sample
    /// already playing enqueues another voice.
    pub fn play(
        &self,
        api: &mut Api<'_>,
        name: &str,
        params: PlayParams,
    ) -> Result<(), EngineError> {
        let (track, offset) = api.loop_any_track_offset()?;
        let payload = serde_json::to_string(&PlayPayload {
            pack: &self.pack,
            name,
            params,
        })?;
        let due = api.state().timeline.beat() + offset;
        api.with_state(|st| {
            st.queue.schedule_at(
                due,
                Box::new(move |_st, host| host.sample_play(track.as_deref(), &payload)),
            )
        });
        Ok(())
    }

    /// Stop `name`; when several voices share it the latest one stops.
    pub fn stop(&self, api: &mut Api<'_>, name: &str) -> Result<(), EngineError> {
        let (track, offset) = api.loop_any_track_offset()?;
        let payload = serde_json::to_string(&StopPayload {
            pack: &self.pack,
            name,
        })?;
        let due = api.state().timeline.beat() + offset;
        api.with_state(|st| {
            st.queue.schedule_at(
                due,
                Box::new(move |_st, host| host.sample_stop(track.as_deref(), &payload)),
            )
        });
        Ok(())
    }
}

type MkPlay = Box<dyn Fn() -> (String, PlayParams) + Send + Sync>;

/// Character-grid sequencing of sampler plays.
///
/// Bind characters to plays with [`Kit::set`], define equal-length rows
/// with [`Kit::seq`], then trigger a whole grid with [`Kit::play`]; the
/// grid spans the declaring loop's period.
pub struct Kit {
    sampler: Sampler,
    duration: f64,
    plays: HashMap<char, MkPlay>,
    patterns: HashMap<String, Vec<Vec<char>>>,
}

impl Kit {
    /// Build a kit spanning the current loop's period.
    pub fn new(api: &Api<'_>, sampler: Sampler) -> Result<Self, EngineError> {
        let lp = api.current_loop().ok_or(EngineError::NotInLoop)?;
        Ok(Self {
            sampler,
            duration: lp.beats as f64,
            plays: HashMap::new(),
            patterns: HashMap::new(),
        })
    }

    /// Bind `key` to a play; the callable picks the sample and its
    /// parameters each time the step triggers.
    pub fn set(&mut self, key: char, mkplay: impl Fn() -> (String, PlayParams) + Send + Sync + 'static) {
        self.plays.insert(key, Box::new(mkplay));
    }

    /// Define the rows of a pattern. All rows must have the same length.
    pub fn seq(&mut self, flavor: &str, rows: &[&str]) -> anyhow::Result<()> {
        let lengths: std::collections::HashSet<usize> =
            rows.iter().map(|r| r.chars().count()).collect();
        if lengths.len() != 1 {
            anyhow::bail!("kit rows must all have the same length");
        }
        self.patterns.insert(
            flavor.to_string(),
            rows.iter().map(|r| r.chars().collect()).collect(),
        );
        Ok(())
    }

    /// Play one full pattern, stepping through the loop's period.
    pub fn play(&self, api: &mut Api<'_>, flavor: &str) -> anyhow::Result<()> {
        let pattern = self
            .patterns
            .get(flavor)
            .ok_or_else(|| anyhow::anyhow!("kit has no flavor named {}", flavor))?;

        let steps = pattern[0].len();
        let step_beats = self.duration / steps as f64;

        for i in 0..steps {
            for row in pattern {
                if let Some(mkplay) = self.plays.get(&row[i]) {
                    let (name, params) = mkplay();
                    self.sampler.play(api, &name, params)?;
                }
            }
            api.sleep(step_beats)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_payload_renders_controls_by_name() {
        let payload = serde_json::to_string(&PlayPayload {
            pack: "808",
            name: "kick",
            params: PlayParams {
                pan: Param::Control("x0".into()),
                amp: 0.8,
                ..Default::default()
            },
        })
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["pack"], "808");
        assert_eq!(value["name"], "kick");
        assert_eq!(value["pan"], "x0");
        assert_eq!(value["amp"], 0.8);
        assert_eq!(value["rate"], 1.0);
    }
}
