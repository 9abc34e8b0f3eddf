//! Architect configuration shape and full-shape normalizers
//!
//! Every subtree of [`SystemConfig`] has a small pure function that takes a
//! complete base value plus an optional partial patch and returns a complete
//! value. `merge_config` composes them, so a patch can never leave a leaf
//! unset.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three orbits of the diagram, numbered 1..=3 on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OrbitIndex {
    One,
    Two,
    Three,
}

impl OrbitIndex {
    pub const ALL: [OrbitIndex; 3] = [OrbitIndex::One, OrbitIndex::Two, OrbitIndex::Three];

    pub fn number(self) -> u8 {
        match self {
            OrbitIndex::One => 1,
            OrbitIndex::Two => 2,
            OrbitIndex::Three => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(OrbitIndex::One),
            2 => Some(OrbitIndex::Two),
            3 => Some(OrbitIndex::Three),
            _ => None,
        }
    }
}

impl TryFrom<u8> for OrbitIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        OrbitIndex::from_number(value).ok_or_else(|| format!("orbit index out of range: {}", value))
    }
}

impl From<OrbitIndex> for u8 {
    fn from(value: OrbitIndex) -> Self {
        value.number()
    }
}

impl fmt::Display for OrbitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A value for each of the three orbits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitSet<T> {
    #[serde(rename = "1")]
    pub one: T,
    #[serde(rename = "2")]
    pub two: T,
    #[serde(rename = "3")]
    pub three: T,
}

impl<T: Copy> OrbitSet<T> {
    pub fn splat(value: T) -> Self {
        Self {
            one: value,
            two: value,
            three: value,
        }
    }

    pub fn get(&self, orbit: OrbitIndex) -> T {
        match orbit {
            OrbitIndex::One => self.one,
            OrbitIndex::Two => self.two,
            OrbitIndex::Three => self.three,
        }
    }

    pub fn set(&mut self, orbit: OrbitIndex, value: T) {
        match orbit {
            OrbitIndex::One => self.one = value,
            OrbitIndex::Two => self.two = value,
            OrbitIndex::Three => self.three = value,
        }
    }

    /// Per-key override: keys absent from `patch` keep their base value.
    pub fn merged(&self, patch: &OrbitPatch<T>) -> Self {
        Self {
            one: patch.one.unwrap_or(self.one),
            two: patch.two.unwrap_or(self.two),
            three: patch.three.unwrap_or(self.three),
        }
    }
}

/// Partial per-orbit values. `None` keeps the base value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitPatch<T> {
    #[serde(rename = "1", default, skip_serializing_if = "Option::is_none")]
    pub one: Option<T>,
    #[serde(rename = "2", default, skip_serializing_if = "Option::is_none")]
    pub two: Option<T>,
    #[serde(rename = "3", default, skip_serializing_if = "Option::is_none")]
    pub three: Option<T>,
}

impl<T> Default for OrbitPatch<T> {
    fn default() -> Self {
        Self {
            one: None,
            two: None,
            three: None,
        }
    }
}

impl<T: Copy> OrbitPatch<T> {
    /// Patch touching a single orbit.
    pub fn only(orbit: OrbitIndex, value: T) -> Self {
        let mut patch = Self::default();
        patch.set(orbit, value);
        patch
    }

    pub fn set(&mut self, orbit: OrbitIndex, value: T) {
        match orbit {
            OrbitIndex::One => self.one = Some(value),
            OrbitIndex::Two => self.two = Some(value),
            OrbitIndex::Three => self.three = Some(value),
        }
    }

    pub fn get(&self, orbit: OrbitIndex) -> Option<T> {
        match orbit {
            OrbitIndex::One => self.one,
            OrbitIndex::Two => self.two,
            OrbitIndex::Three => self.three,
        }
    }
}

/// Visibility toggles of the diagram.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShowFlags {
    pub nebula: bool,
    pub rings: bool,
    pub labels: bool,
    pub moons: bool,
    pub tooltips: bool,
    pub orbits: OrbitSet<bool>,
}

impl Default for ShowFlags {
    fn default() -> Self {
        Self {
            nebula: true,
            rings: true,
            labels: true,
            moons: true,
            tooltips: true,
            orbits: OrbitSet::splat(true),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nebula: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rings: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moons: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltips: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbits: Option<OrbitPatch<bool>>,
}

impl ShowPatch {
    /// The complete flags this patch describes over `base`, expressed as a patch.
    pub fn completed(&self, base: &ShowFlags) -> ShowPatch {
        let full = merge_show(base, Some(self));
        ShowPatch::from(full)
    }
}

impl From<ShowFlags> for ShowPatch {
    fn from(flags: ShowFlags) -> Self {
        Self {
            nebula: Some(flags.nebula),
            rings: Some(flags.rings),
            labels: Some(flags.labels),
            moons: Some(flags.moons),
            tooltips: Some(flags.tooltips),
            orbits: Some(OrbitPatch {
                one: Some(flags.orbits.one),
                two: Some(flags.orbits.two),
                three: Some(flags.orbits.three),
            }),
        }
    }
}

/// Full visual-editor configuration of the orbit diagram
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Canvas edge length in pixels
    pub size: f32,
    /// Camera tilt of the orbital plane, degrees
    pub tilt_deg: f32,
    pub radii: OrbitSet<f32>,
    /// Seconds per revolution
    pub speeds: OrbitSet<f32>,
    /// Extra per-orbit tilt on top of `tilt_deg`, degrees
    pub orbit_tilts: OrbitSet<f32>,
    pub show: ShowFlags,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            size: 720.0,
            tilt_deg: 62.0,
            radii: OrbitSet {
                one: 160.0,
                two: 260.0,
                three: 340.0,
            },
            speeds: OrbitSet {
                one: 24.0,
                two: 40.0,
                three: 64.0,
            },
            orbit_tilts: OrbitSet::splat(0.0),
            show: ShowFlags::default(),
        }
    }
}

/// Caller intent: the leaves to override, everything else retained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt_deg: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radii: Option<OrbitPatch<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speeds: Option<OrbitPatch<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbit_tilts: Option<OrbitPatch<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<ShowPatch>,
}

impl SystemConfigPatch {
    pub fn radius(orbit: OrbitIndex, value: f32) -> Self {
        Self {
            radii: Some(OrbitPatch::only(orbit, value)),
            ..Default::default()
        }
    }

    pub fn speed(orbit: OrbitIndex, value: f32) -> Self {
        Self {
            speeds: Some(OrbitPatch::only(orbit, value)),
            ..Default::default()
        }
    }
}

/// Orbit tilts are coerced to finite numbers: the patch value if finite,
/// else the base value if present and finite, else zero.
pub fn normalize_orbit_tilts(
    base: Option<&OrbitSet<f32>>,
    patch: Option<&OrbitPatch<f32>>,
) -> OrbitSet<f32> {
    let pick = |orbit: OrbitIndex| {
        let candidate = patch.and_then(|p| p.get(orbit)).filter(|v| v.is_finite());
        let fallback = base.map(|b| b.get(orbit)).filter(|v| v.is_finite());
        candidate.or(fallback).unwrap_or(0.0)
    };
    OrbitSet {
        one: pick(OrbitIndex::One),
        two: pick(OrbitIndex::Two),
        three: pick(OrbitIndex::Three),
    }
}

/// Top-level flags merge shallowly, then `orbits` merges per key.
pub fn merge_show(base: &ShowFlags, patch: Option<&ShowPatch>) -> ShowFlags {
    let Some(patch) = patch else {
        return *base;
    };
    let orbits = match &patch.orbits {
        Some(orbits) => base.orbits.merged(orbits),
        None => base.orbits,
    };
    ShowFlags {
        nebula: patch.nebula.unwrap_or(base.nebula),
        rings: patch.rings.unwrap_or(base.rings),
        labels: patch.labels.unwrap_or(base.labels),
        moons: patch.moons.unwrap_or(base.moons),
        tooltips: patch.tooltips.unwrap_or(base.tooltips),
        orbits,
    }
}

/// Non-finite patch values are dropped and the base value kept.
fn finite_or(value: Option<f32>, base: f32) -> f32 {
    value.filter(|v| v.is_finite()).unwrap_or(base)
}

fn merge_finite(base: &OrbitSet<f32>, patch: Option<&OrbitPatch<f32>>) -> OrbitSet<f32> {
    let Some(patch) = patch else {
        return *base;
    };
    OrbitSet {
        one: finite_or(patch.one, base.one),
        two: finite_or(patch.two, base.two),
        three: finite_or(patch.three, base.three),
    }
}

pub fn merge_config(base: &SystemConfig, patch: &SystemConfigPatch) -> SystemConfig {
    SystemConfig {
        size: finite_or(patch.size, base.size),
        tilt_deg: finite_or(patch.tilt_deg, base.tilt_deg),
        radii: merge_finite(&base.radii, patch.radii.as_ref()),
        speeds: merge_finite(&base.speeds, patch.speeds.as_ref()),
        orbit_tilts: normalize_orbit_tilts(Some(&base.orbit_tilts), patch.orbit_tilts.as_ref()),
        show: merge_show(&base.show, patch.show.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(c: &SystemConfig) -> Vec<f32> {
        let b = |v: bool| if v { 1.0 } else { 0.0 };
        vec![
            c.size,
            c.tilt_deg,
            c.radii.one,
            c.radii.two,
            c.radii.three,
            c.speeds.one,
            c.speeds.two,
            c.speeds.three,
            c.orbit_tilts.one,
            c.orbit_tilts.two,
            c.orbit_tilts.three,
            b(c.show.nebula),
            b(c.show.rings),
            b(c.show.labels),
            b(c.show.moons),
            b(c.show.tooltips),
            b(c.show.orbits.one),
            b(c.show.orbits.two),
            b(c.show.orbits.three),
        ]
    }

    #[test]
    fn radius_patch_keeps_sibling_radii() {
        let base = SystemConfig::default();
        let merged = merge_config(&base, &SystemConfigPatch::radius(OrbitIndex::One, 200.0));
        assert_eq!(merged.radii.one, 200.0);
        assert_eq!(merged.radii.two, 260.0);
        assert_eq!(merged.radii.three, 340.0);
    }

    #[test]
    fn radius_patch_is_isolated() {
        let base = SystemConfig::default();
        let merged = merge_config(&base, &SystemConfigPatch::radius(OrbitIndex::One, 111.0));
        assert_eq!(merged.speeds, base.speeds);
        assert_eq!(merged.orbit_tilts, base.orbit_tilts);
        assert_eq!(merged.show, base.show);
        assert_eq!(merged.size, base.size);
        assert_eq!(merged.tilt_deg, base.tilt_deg);
    }

    #[test]
    fn merge_is_idempotent_for_leaf_patches() {
        let base = SystemConfig::default();
        let patch = SystemConfigPatch {
            size: Some(500.0),
            speeds: Some(OrbitPatch::only(OrbitIndex::Three, 12.0)),
            show: Some(ShowPatch {
                rings: Some(false),
                orbits: Some(OrbitPatch::only(OrbitIndex::Two, false)),
                ..Default::default()
            }),
            ..Default::default()
        };
        let once = merge_config(&base, &patch);
        let twice = merge_config(&once, &patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn show_orbit_patch_keeps_flags() {
        let base = ShowFlags {
            nebula: false,
            ..Default::default()
        };
        let patch = ShowPatch {
            orbits: Some(OrbitPatch::only(OrbitIndex::Two, false)),
            ..Default::default()
        };
        let merged = merge_show(&base, Some(&patch));
        assert!(!merged.nebula);
        assert!(merged.orbits.one);
        assert!(!merged.orbits.two);
        assert!(merged.orbits.three);
    }

    #[test]
    fn tilts_fall_back_to_base_then_zero() {
        let base = OrbitSet {
            one: 10.0,
            two: f32::NAN,
            three: 30.0,
        };
        let patch = OrbitPatch {
            one: None,
            two: None,
            three: Some(f32::INFINITY),
        };
        let tilts = normalize_orbit_tilts(Some(&base), Some(&patch));
        assert_eq!(tilts.one, 10.0);
        assert_eq!(tilts.two, 0.0);
        assert_eq!(tilts.three, 30.0);

        let without_base = normalize_orbit_tilts(None, Some(&OrbitPatch::only(OrbitIndex::Two, 5.0)));
        assert_eq!(without_base, OrbitSet { one: 0.0, two: 5.0, three: 0.0 });
    }

    #[test]
    fn merged_config_has_every_leaf_defined() {
        let mut base = SystemConfig::default();
        base.orbit_tilts.two = f32::NAN;
        let patch: SystemConfigPatch =
            serde_json::from_str(r#"{"orbit_tilts":{"1":4.5},"show":{"orbits":{"3":false}}}"#)
                .unwrap();
        let merged = merge_config(&base, &patch);
        let values = leaves(&merged);
        assert_eq!(values.len(), 19);
        assert!(values.iter().all(|v| v.is_finite()));
        assert_eq!(merged.orbit_tilts.one, 4.5);
        assert!(!merged.show.orbits.three);
    }

    #[test]
    fn non_finite_scalars_keep_base() {
        let base = SystemConfig::default();
        let patch = SystemConfigPatch {
            size: Some(f32::NAN),
            tilt_deg: Some(f32::NEG_INFINITY),
            radii: Some(OrbitPatch {
                one: Some(f32::NAN),
                two: Some(300.0),
                three: None,
            }),
            speeds: Some(OrbitPatch::only(OrbitIndex::One, f32::INFINITY)),
            ..Default::default()
        };
        let merged = merge_config(&base, &patch);
        assert_eq!(merged.size, base.size);
        assert_eq!(merged.tilt_deg, base.tilt_deg);
        assert_eq!(merged.radii, OrbitSet { one: 160.0, two: 300.0, three: 340.0 });
        assert_eq!(merged.speeds, base.speeds);
        assert!(leaves(&merged).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn patch_json_uses_numeric_orbit_keys() {
        let patch: SystemConfigPatch = serde_json::from_str(r#"{"radii":{"1":200}}"#).unwrap();
        let merged = merge_config(&SystemConfig::default(), &patch);
        assert_eq!(merged.radii, OrbitSet { one: 200.0, two: 260.0, three: 340.0 });

        let json = serde_json::to_value(SystemConfig::default()).unwrap();
        assert_eq!(json["radii"]["3"], 340.0);
        assert_eq!(json["show"]["orbits"]["2"], true);
    }

    #[test]
    fn completed_show_patch_is_total() {
        let base = ShowFlags::default();
        let patch = ShowPatch {
            labels: Some(false),
            ..Default::default()
        };
        let full = patch.completed(&base);
        assert_eq!(full.labels, Some(false));
        assert_eq!(full.nebula, Some(true));
        assert!(full.orbits.is_some_and(|o| o.one.is_some() && o.two.is_some() && o.three.is_some()));
    }

    #[test]
    fn orbit_index_rejects_out_of_range() {
        assert!(serde_json::from_str::<OrbitIndex>("0").is_err());
        assert_eq!(serde_json::from_str::<OrbitIndex>("3").unwrap(), OrbitIndex::Three);
    }
}
