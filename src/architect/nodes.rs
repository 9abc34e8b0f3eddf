//! Orbit bodies shown on the Architect diagram

use serde::{Deserialize, Deserializer, Serialize};

use crate::architect::config::OrbitIndex;

/// A planet riding one of the orbits
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub orbit: OrbitIndex,
    /// Display angle in degrees, interpreted modulo 360
    #[serde(default)]
    pub angle: f32,
    /// Accent colour token
    pub accent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub moons: Vec<Moon>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Moon {
    pub id: String,
    #[serde(default)]
    pub angle: f32,
    pub accent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Fields to overwrite on a node. `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbit: Option<OrbitIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    /// `Some(None)` (JSON `null`) clears the title.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moons: Option<Vec<Moon>>,
}

/// Keeps an explicit `null` apart from a missing key.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Node {
    /// Shallow merge of `patch` over this node. The id never changes.
    pub fn patched(&self, patch: &NodePatch) -> Node {
        Node {
            id: self.id.clone(),
            orbit: patch.orbit.unwrap_or(self.orbit),
            angle: patch.angle.filter(|a| a.is_finite()).unwrap_or(self.angle),
            accent: patch.accent.clone().unwrap_or_else(|| self.accent.clone()),
            title: patch.title.clone().unwrap_or_else(|| self.title.clone()),
            moons: patch.moons.clone().unwrap_or_else(|| self.moons.clone()),
        }
    }

    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// Wrap an angle into [0, 360).
pub fn normalize_angle(degrees: f32) -> f32 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Replace the node whose id matches; unknown ids leave the list untouched.
pub fn set_node(nodes: &[Node], id: &str, patch: &NodePatch) -> Vec<Node> {
    nodes
        .iter()
        .map(|n| if n.id == id { n.patched(patch) } else { n.clone() })
        .collect()
}

pub fn rotate_node(nodes: &[Node], id: &str, delta_deg: f32) -> Vec<Node> {
    nodes
        .iter()
        .map(|n| {
            if n.id == id {
                let mut rotated = n.clone();
                rotated.angle = normalize_angle(n.angle + delta_deg);
                rotated
            } else {
                n.clone()
            }
        })
        .collect()
}

pub fn default_nodes() -> Vec<Node> {
    vec![
        Node {
            id: "p1".to_string(),
            orbit: OrbitIndex::One,
            angle: 350.0,
            accent: "emerald".to_string(),
            title: Some("Growers".to_string()),
            moons: Vec::new(),
        },
        Node {
            id: "p2".to_string(),
            orbit: OrbitIndex::Two,
            angle: 130.0,
            accent: "amber".to_string(),
            title: Some("Brands".to_string()),
            moons: vec![Moon {
                id: "p2-m1".to_string(),
                angle: 45.0,
                accent: "lime".to_string(),
                title: Some("Products".to_string()),
            }],
        },
        Node {
            id: "p3".to_string(),
            orbit: OrbitIndex::Three,
            angle: 250.0,
            accent: "violet".to_string(),
            title: Some("Events".to_string()),
            moons: vec![
                Moon {
                    id: "p3-m1".to_string(),
                    angle: 0.0,
                    accent: "sky".to_string(),
                    title: Some("Expos".to_string()),
                },
                Moon {
                    id: "p3-m2".to_string(),
                    angle: 180.0,
                    accent: "rose".to_string(),
                    title: None,
                },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_wraps_past_full_turn() {
        let nodes = default_nodes();
        assert_eq!(nodes[0].angle, 350.0);
        let rotated = rotate_node(&nodes, "p1", 370.0);
        assert_eq!(rotated[0].angle, 0.0);
    }

    #[test]
    fn rotate_negative_delta_stays_in_range() {
        let nodes = default_nodes();
        let rotated = rotate_node(&nodes, "p2", -190.0);
        assert_eq!(rotated[1].angle, 300.0);
        for delta in [-720.5_f32, -1.0, -0.000_01, 0.0, 359.99, 1e6] {
            let a = rotate_node(&nodes, "p3", delta)[2].angle;
            assert!((0.0..360.0).contains(&a), "delta {} gave {}", delta, a);
        }
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let nodes = default_nodes();
        assert_eq!(rotate_node(&nodes, "nope", 10.0), nodes);
        let patch = NodePatch {
            angle: Some(1.0),
            ..Default::default()
        };
        assert_eq!(set_node(&nodes, "nope", &patch), nodes);
    }

    #[test]
    fn set_node_merges_shallowly() {
        let nodes = default_nodes();
        let patch = NodePatch {
            accent: Some("rose".to_string()),
            ..Default::default()
        };
        let updated = set_node(&nodes, "p3", &patch);
        assert_eq!(updated[2].accent, "rose");
        assert_eq!(updated[2].angle, 250.0);
        assert_eq!(updated[2].moons.len(), 2);
        assert_eq!(updated[0], nodes[0]);
    }

    #[test]
    fn title_can_be_cleared_or_kept() {
        let nodes = default_nodes();
        let keep: NodePatch = serde_json::from_str(r#"{"accent":"sky"}"#).unwrap();
        assert_eq!(keep.title, None);
        assert_eq!(set_node(&nodes, "p1", &keep)[0].title.as_deref(), Some("Growers"));

        let clear: NodePatch = serde_json::from_str(r#"{"title":null}"#).unwrap();
        assert_eq!(clear.title, Some(None));
        let cleared = set_node(&nodes, "p1", &clear);
        assert_eq!(cleared[0].title, None);
        assert_eq!(cleared[0].display_name(), "p1");

        let rename: NodePatch = serde_json::from_str(r#"{"title":"Farms"}"#).unwrap();
        assert_eq!(set_node(&nodes, "p1", &rename)[0].title.as_deref(), Some("Farms"));
    }

    #[test]
    fn non_finite_angle_patch_is_ignored() {
        let nodes = default_nodes();
        let patch = NodePatch {
            angle: Some(f32::NAN),
            ..Default::default()
        };
        assert_eq!(set_node(&nodes, "p1", &patch), nodes);
    }

    #[test]
    fn missing_angle_defaults_to_zero() {
        let node: Node =
            serde_json::from_str(r#"{"id":"x","orbit":2,"accent":"sky"}"#).unwrap();
        assert_eq!(node.angle, 0.0);
        assert_eq!(node.orbit, OrbitIndex::Two);
        assert!(node.moons.is_empty());
    }
}
