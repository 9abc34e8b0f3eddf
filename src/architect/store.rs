//! Architect state container
//!
//! `reduce` is the pure transition function; `ArchitectStore` owns one state,
//! applies actions through it and notifies subscribers when the state changed.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::architect::config::{
    OrbitIndex, OrbitPatch, ShowPatch, SystemConfig, SystemConfigPatch, merge_config,
};
use crate::architect::nodes::{Node, NodePatch, default_nodes, rotate_node, set_node};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchitectState {
    pub config: SystemConfig,
    pub nodes: Vec<Node>,
}

impl Default for ArchitectState {
    fn default() -> Self {
        Self {
            config: SystemConfig::default(),
            nodes: default_nodes(),
        }
    }
}

/// Every mutation the Architect supports
#[derive(Clone, Debug, PartialEq)]
pub enum ArchitectAction {
    SetConfig(SystemConfigPatch),
    SetShow(ShowPatch),
    SetOrbitVisibility { orbit: OrbitIndex, visible: bool },
    SetOrbitTilts(OrbitPatch<f32>),
    SetOrbitTilt { orbit: OrbitIndex, degrees: f32 },
    SetNode { id: String, patch: NodePatch },
    RotateNode { id: String, delta_deg: f32 },
    Reset,
}

pub fn reduce(state: &ArchitectState, action: &ArchitectAction) -> ArchitectState {
    match action {
        ArchitectAction::SetConfig(patch) => ArchitectState {
            config: merge_config(&state.config, patch),
            nodes: state.nodes.clone(),
        },
        ArchitectAction::SetShow(patch) => {
            // Build the complete show subtree first, then go through SetConfig.
            let show = patch.completed(&state.config.show);
            reduce(
                state,
                &ArchitectAction::SetConfig(SystemConfigPatch {
                    show: Some(show),
                    ..Default::default()
                }),
            )
        }
        ArchitectAction::SetOrbitVisibility { orbit, visible } => reduce(
            state,
            &ArchitectAction::SetShow(ShowPatch {
                orbits: Some(OrbitPatch::only(*orbit, *visible)),
                ..Default::default()
            }),
        ),
        ArchitectAction::SetOrbitTilts(patch) => reduce(
            state,
            &ArchitectAction::SetConfig(SystemConfigPatch {
                orbit_tilts: Some(*patch),
                ..Default::default()
            }),
        ),
        ArchitectAction::SetOrbitTilt { orbit, degrees } => reduce(
            state,
            &ArchitectAction::SetOrbitTilts(OrbitPatch::only(*orbit, *degrees)),
        ),
        ArchitectAction::SetNode { id, patch } => ArchitectState {
            config: state.config,
            nodes: set_node(&state.nodes, id, patch),
        },
        ArchitectAction::RotateNode { id, delta_deg } => ArchitectState {
            config: state.config,
            nodes: rotate_node(&state.nodes, id, *delta_deg),
        },
        ArchitectAction::Reset => ArchitectState::default(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&ArchitectState) + Send + Sync>;

/// The Architect's single source of truth
#[derive(Resource)]
pub struct ArchitectStore {
    state: ArchitectState,
    version: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Default for ArchitectStore {
    fn default() -> Self {
        Self::new(ArchitectState::default())
    }
}

impl ArchitectStore {
    pub fn new(initial: ArchitectState) -> Self {
        Self {
            state: initial,
            version: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &ArchitectState {
        &self.state
    }

    pub fn config(&self) -> &SystemConfig {
        &self.state.config
    }

    pub fn nodes(&self) -> &[Node] {
        &self.state.nodes
    }

    /// Bumped once per state change
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ArchitectState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Apply an action; returns whether the state changed.
    pub fn dispatch(&mut self, action: &ArchitectAction) -> bool {
        let next = reduce(&self.state, action);
        if next == self.state {
            return false;
        }
        self.state = next;
        self.version += 1;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.state);
        }
        true
    }

    pub fn set_config(&mut self, patch: SystemConfigPatch) -> bool {
        self.dispatch(&ArchitectAction::SetConfig(patch))
    }

    pub fn set_show(&mut self, patch: ShowPatch) -> bool {
        self.dispatch(&ArchitectAction::SetShow(patch))
    }

    pub fn set_orbit_visibility(&mut self, orbit: OrbitIndex, visible: bool) -> bool {
        self.dispatch(&ArchitectAction::SetOrbitVisibility { orbit, visible })
    }

    pub fn set_orbit_tilts(&mut self, patch: OrbitPatch<f32>) -> bool {
        self.dispatch(&ArchitectAction::SetOrbitTilts(patch))
    }

    pub fn set_orbit_tilt(&mut self, orbit: OrbitIndex, degrees: f32) -> bool {
        self.dispatch(&ArchitectAction::SetOrbitTilt { orbit, degrees })
    }

    pub fn set_node(&mut self, id: &str, patch: NodePatch) -> bool {
        self.dispatch(&ArchitectAction::SetNode {
            id: id.to_string(),
            patch,
        })
    }

    pub fn rotate_node(&mut self, id: &str, delta_deg: f32) -> bool {
        self.dispatch(&ArchitectAction::RotateNode {
            id: id.to_string(),
            delta_deg,
        })
    }

    pub fn reset(&mut self) -> bool {
        self.dispatch(&ArchitectAction::Reset)
    }
}
