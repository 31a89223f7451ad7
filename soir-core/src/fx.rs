//! Effect descriptions attached to tracks.
//!
//! Effects are pure data here: the DSP side instantiates them from the
//! serialized track layout. Every shaping parameter accepts a control
//! reference, which serializes by name.

use crate::ctrl::Param;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One effect slot in a track's chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fx {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mix: Option<Param>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extra: Option<serde_json::Value>,
}

impl Fx {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            mix: None,
            extra: None,
        }
    }

    /// Set the dry/wet mix of the effect.
    pub fn mix(mut self, mix: impl Into<Param>) -> Self {
        self.mix = Some(mix.into());
        self
    }

    /// A chorus. All parameters live in the `[0.0, 1.0]` range.
    pub fn chorus(
        name: &str,
        time: impl Into<Param>,
        depth: impl Into<Param>,
        rate: impl Into<Param>,
    ) -> Self {
        let (time, depth, rate): (Param, Param, Param) = (time.into(), depth.into(), rate.into());
        Self {
            extra: Some(json!({ "time": time, "depth": depth, "rate": rate })),
            ..Self::new(name, "chorus")
        }
    }

    /// A reverb. `time`, `wet` and `dry` live in the `[0.0, 1.0]` range.
    pub fn reverb(
        name: &str,
        time: impl Into<Param>,
        wet: impl Into<Param>,
        dry: impl Into<Param>,
    ) -> Self {
        let (time, wet, dry): (Param, Param, Param) = (time.into(), wet.into(), dry.into());
        Self {
            extra: Some(json!({ "time": time, "wet": wet, "dry": dry })),
            ..Self::new(name, "reverb")
        }
    }

    /// A low-pass filter. `cutoff` and `resonance` live in the
    /// `[0.0, 1.0]` range.
    pub fn lpf(name: &str, cutoff: impl Into<Param>, resonance: impl Into<Param>) -> Self {
        let (cutoff, resonance): (Param, Param) = (cutoff.into(), resonance.into());
        Self {
            extra: Some(json!({ "cutoff": cutoff, "resonance": resonance })),
            ..Self::new(name, "lpf")
        }
    }

    /// A high-pass filter. `cutoff` and `resonance` live in the
    /// `[0.0, 1.0]` range.
    pub fn hpf(name: &str, cutoff: impl Into<Param>, resonance: impl Into<Param>) -> Self {
        let (cutoff, resonance): (Param, Param) = (cutoff.into(), resonance.into());
        Self {
            extra: Some(json!({ "cutoff": cutoff, "resonance": resonance })),
            ..Self::new(name, "hpf")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_serializes_type_and_mix() {
        let fx = Fx::reverb("rev", 0.01, 0.75, 0.25).mix(0.2);
        let value = serde_json::to_value(&fx).unwrap();
        assert_eq!(value["type"], "reverb");
        assert_eq!(value["mix"], 0.2);
        assert_eq!(value["extra"]["time"], 0.01);
        assert_eq!(value["extra"]["wet"], 0.75);
        assert_eq!(value["extra"]["dry"], 0.25);
    }

    #[test]
    fn test_mix_is_omitted_when_unset() {
        let fx = Fx::chorus("cho", 0.5, 0.5, 0.5);
        let value = serde_json::to_value(&fx).unwrap();
        assert_eq!(value["type"], "chorus");
        assert!(value.get("mix").is_none());
        assert_eq!(value["extra"]["depth"], 0.5);
    }

    #[test]
    fn test_filter_params_accept_controls() {
        let fx = Fx::lpf("lpf", Param::Control("x5".into()), 0.5).mix(Param::Control("x1".into()));
        let value = serde_json::to_value(&fx).unwrap();
        assert_eq!(value["extra"]["cutoff"], "x5");
        assert_eq!(value["extra"]["resonance"], 0.5);
        assert_eq!(value["mix"], "x1");
    }

    #[test]
    fn test_hpf_round_trips_through_json() {
        let fx = Fx::hpf("hpf", 0.3, 0.7).mix(0.4);
        let encoded = serde_json::to_string(&fx).unwrap();
        let decoded: Fx = serde_json::from_str(&encoded).unwrap();
        assert_eq!(fx, decoded);
    }
}
