//! Control dock: keyboard bindings and the status readout
//!
//! Every key press becomes an `ArchitectCommand`; nothing is debounced.

use bevy::prelude::*;

use crate::architect::config::{OrbitIndex, ShowPatch, SystemConfigPatch};
use crate::architect::gate::ArchitectGate;
use crate::architect::render::HoveredNode;
use crate::architect::store::{ArchitectAction, ArchitectState, ArchitectStore};

/// A store mutation requested by input or another plugin
#[derive(Message, Clone, Debug)]
pub struct ArchitectCommand(pub ArchitectAction);

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct DockState {
    pub selected_orbit: OrbitIndex,
}

impl Default for DockState {
    fn default() -> Self {
        Self {
            selected_orbit: OrbitIndex::One,
        }
    }
}

/// Increment per key press
#[derive(Resource, Debug, Clone)]
pub struct DockSteps {
    pub radius: f32,
    pub min_radius: f32,
    pub speed: f32,
    pub min_speed: f32,
    pub tilt_deg: f32,
    pub size: f32,
    pub min_size: f32,
    pub rotate_deg: f32,
}

impl Default for DockSteps {
    fn default() -> Self {
        Self {
            radius: 10.0,
            min_radius: 20.0,
            speed: 2.0,
            min_speed: 2.0,
            tilt_deg: 5.0,
            size: 20.0,
            min_size: 200.0,
            rotate_deg: 15.0,
        }
    }
}

#[derive(Component)]
pub struct DockText;

pub fn selected_orbit_for(keys: &ButtonInput<KeyCode>) -> Option<OrbitIndex> {
    if keys.just_pressed(KeyCode::Digit1) {
        Some(OrbitIndex::One)
    } else if keys.just_pressed(KeyCode::Digit2) {
        Some(OrbitIndex::Two)
    } else if keys.just_pressed(KeyCode::Digit3) {
        Some(OrbitIndex::Three)
    } else {
        None
    }
}

/// Translate this frame's key presses into store actions
pub fn dock_actions(
    keys: &ButtonInput<KeyCode>,
    orbit: OrbitIndex,
    state: &ArchitectState,
    steps: &DockSteps,
) -> Vec<ArchitectAction> {
    let config = &state.config;
    let mut actions = Vec::new();

    let radius = config.radii.get(orbit);
    if keys.just_pressed(KeyCode::ArrowUp) {
        actions.push(ArchitectAction::SetConfig(SystemConfigPatch::radius(
            orbit,
            radius + steps.radius,
        )));
    }
    if keys.just_pressed(KeyCode::ArrowDown) {
        actions.push(ArchitectAction::SetConfig(SystemConfigPatch::radius(
            orbit,
            (radius - steps.radius).max(steps.min_radius),
        )));
    }

    let speed = config.speeds.get(orbit);
    if keys.just_pressed(KeyCode::ArrowRight) {
        actions.push(ArchitectAction::SetConfig(SystemConfigPatch::speed(
            orbit,
            (speed - steps.speed).max(steps.min_speed),
        )));
    }
    if keys.just_pressed(KeyCode::ArrowLeft) {
        actions.push(ArchitectAction::SetConfig(SystemConfigPatch::speed(
            orbit,
            speed + steps.speed,
        )));
    }

    let orbit_tilt = config.orbit_tilts.get(orbit);
    if keys.just_pressed(KeyCode::BracketLeft) {
        actions.push(ArchitectAction::SetOrbitTilt {
            orbit,
            degrees: orbit_tilt - steps.tilt_deg,
        });
    }
    if keys.just_pressed(KeyCode::BracketRight) {
        actions.push(ArchitectAction::SetOrbitTilt {
            orbit,
            degrees: orbit_tilt + steps.tilt_deg,
        });
    }

    if keys.just_pressed(KeyCode::Comma) {
        actions.push(ArchitectAction::SetConfig(SystemConfigPatch {
            tilt_deg: Some(config.tilt_deg - steps.tilt_deg),
            ..Default::default()
        }));
    }
    if keys.just_pressed(KeyCode::Period) {
        actions.push(ArchitectAction::SetConfig(SystemConfigPatch {
            tilt_deg: Some(config.tilt_deg + steps.tilt_deg),
            ..Default::default()
        }));
    }
    if keys.just_pressed(KeyCode::Minus) {
        actions.push(ArchitectAction::SetConfig(SystemConfigPatch {
            size: Some((config.size - steps.size).max(steps.min_size)),
            ..Default::default()
        }));
    }
    if keys.just_pressed(KeyCode::Equal) {
        actions.push(ArchitectAction::SetConfig(SystemConfigPatch {
            size: Some(config.size + steps.size),
            ..Default::default()
        }));
    }

    if keys.just_pressed(KeyCode::KeyV) {
        actions.push(ArchitectAction::SetOrbitVisibility {
            orbit,
            visible: !config.show.orbits.get(orbit),
        });
    }

    let show = &config.show;
    let toggles = [
        (KeyCode::KeyN, ShowPatch { nebula: Some(!show.nebula), ..Default::default() }),
        (KeyCode::KeyR, ShowPatch { rings: Some(!show.rings), ..Default::default() }),
        (KeyCode::KeyL, ShowPatch { labels: Some(!show.labels), ..Default::default() }),
        (KeyCode::KeyM, ShowPatch { moons: Some(!show.moons), ..Default::default() }),
        (KeyCode::KeyT, ShowPatch { tooltips: Some(!show.tooltips), ..Default::default() }),
    ];
    for (key, patch) in toggles {
        if keys.just_pressed(key) {
            actions.push(ArchitectAction::SetShow(patch));
        }
    }

    if let Some(node) = state.nodes.iter().find(|n| n.orbit == orbit) {
        if keys.just_pressed(KeyCode::KeyQ) {
            actions.push(ArchitectAction::RotateNode {
                id: node.id.clone(),
                delta_deg: -steps.rotate_deg,
            });
        }
        if keys.just_pressed(KeyCode::KeyE) {
            actions.push(ArchitectAction::RotateNode {
                id: node.id.clone(),
                delta_deg: steps.rotate_deg,
            });
        }
    }

    if keys.just_pressed(KeyCode::Home) {
        actions.push(ArchitectAction::Reset);
    }

    actions
}

pub fn dock_input_system(
    keys: Res<ButtonInput<KeyCode>>,
    store: Res<ArchitectStore>,
    steps: Res<DockSteps>,
    mut dock: ResMut<DockState>,
    mut gate: ResMut<ArchitectGate>,
    mut commands_out: MessageWriter<ArchitectCommand>,
) {
    if let Some(orbit) = selected_orbit_for(&keys) {
        dock.selected_orbit = orbit;
    }
    if keys.just_pressed(KeyCode::Escape) {
        gate.lock();
        return;
    }
    for action in dock_actions(&keys, dock.selected_orbit, store.state(), &steps) {
        commands_out.write(ArchitectCommand(action));
    }
}

pub fn apply_architect_commands(
    mut store: ResMut<ArchitectStore>,
    mut commands_in: MessageReader<ArchitectCommand>,
) {
    for ArchitectCommand(action) in commands_in.read() {
        // Only take a mutable borrow (and trip change detection) when needed.
        if store.bypass_change_detection().dispatch(action) {
            store.set_changed();
            debug!("[ARCHITECT] applied {:?}", action);
        }
    }
}

pub fn spawn_dock_text(mut commands: Commands) {
    commands.spawn((
        Text::new(""),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        },
        DockText,
    ));
}

pub fn dock_readout(state: &ArchitectState, dock: &DockState, hovered: Option<&str>) -> String {
    let c = &state.config;
    let o = dock.selected_orbit;
    let flag = |v: bool| if v { "on" } else { "off" };
    let mut lines = vec![
        "ARCHITECT".to_string(),
        format!("size {:.0}  tilt {:.0}°", c.size, c.tilt_deg),
        format!(
            "orbit {}  radius {:.0}  period {:.0}s  tilt {:+.0}°  {}",
            o,
            c.radii.get(o),
            c.speeds.get(o),
            c.orbit_tilts.get(o),
            if c.show.orbits.get(o) { "visible" } else { "hidden" }
        ),
        format!(
            "nebula {}  rings {}  labels {}  moons {}  tooltips {}",
            flag(c.show.nebula),
            flag(c.show.rings),
            flag(c.show.labels),
            flag(c.show.moons),
            flag(c.show.tooltips)
        ),
    ];
    if let Some(node) = hovered.and_then(|id| state.nodes.iter().find(|n| n.id == id)) {
        lines.push(format!("› {} ({:.0}°)", node.display_name(), node.angle));
    }
    lines.push("[1-3] orbit  [↑↓] radius  [←→] speed  [[ ]] tilt  [V N R L M T] show  [Q E] rotate  [Home] reset  [Esc] lock".to_string());
    lines.join("\n")
}

pub fn refresh_dock_text_system(
    store: Res<ArchitectStore>,
    dock: Res<DockState>,
    hovered: Res<HoveredNode>,
    gate: Res<ArchitectGate>,
    mut texts: Query<&mut Text, With<DockText>>,
) {
    if !(store.is_changed() || dock.is_changed() || hovered.is_changed() || gate.is_changed()) {
        return;
    }
    let Ok(mut text) = texts.single_mut() else {
        return;
    };
    text.0 = if gate.is_unlocked() {
        dock_readout(store.state(), &dock, hovered.0.as_deref())
    } else {
        format!(
            "ARCHITECT is locked\npassphrase: {}\n[Enter] unlock",
            "•".repeat(gate.entry.chars().count())
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architect::config::OrbitSet;

    fn press(keys: &[KeyCode]) -> ButtonInput<KeyCode> {
        let mut input = ButtonInput::<KeyCode>::default();
        for key in keys {
            input.press(*key);
        }
        input
    }

    #[test]
    fn arrow_up_grows_selected_radius_only() {
        let state = ArchitectState::default();
        let actions = dock_actions(&press(&[KeyCode::ArrowUp]), OrbitIndex::Two, &state, &DockSteps::default());
        assert_eq!(actions.len(), 1);
        let mut store = ArchitectStore::new(state);
        store.dispatch(&actions[0]);
        assert_eq!(store.config().radii, OrbitSet { one: 160.0, two: 270.0, three: 340.0 });
    }

    #[test]
    fn radius_never_drops_below_minimum() {
        let mut state = ArchitectState::default();
        state.config.radii.one = 25.0;
        let actions = dock_actions(&press(&[KeyCode::ArrowDown]), OrbitIndex::One, &state, &DockSteps::default());
        let mut store = ArchitectStore::new(state);
        store.dispatch(&actions[0]);
        assert_eq!(store.config().radii.one, 20.0);
    }

    #[test]
    fn visibility_key_toggles_selected_orbit() {
        let state = ArchitectState::default();
        let actions = dock_actions(&press(&[KeyCode::KeyV]), OrbitIndex::Three, &state, &DockSteps::default());
        assert_eq!(
            actions,
            vec![ArchitectAction::SetOrbitVisibility {
                orbit: OrbitIndex::Three,
                visible: false
            }]
        );
    }

    #[test]
    fn rotate_targets_first_node_on_orbit() {
        let state = ArchitectState::default();
        let actions = dock_actions(&press(&[KeyCode::KeyE]), OrbitIndex::Two, &state, &DockSteps::default());
        assert_eq!(
            actions,
            vec![ArchitectAction::RotateNode {
                id: "p2".to_string(),
                delta_deg: 15.0
            }]
        );
    }

    #[test]
    fn no_keys_no_actions() {
        let state = ArchitectState::default();
        assert!(dock_actions(&press(&[]), OrbitIndex::One, &state, &DockSteps::default()).is_empty());
    }

    #[test]
    fn digit_selects_orbit() {
        assert_eq!(selected_orbit_for(&press(&[KeyCode::Digit3])), Some(OrbitIndex::Three));
        assert_eq!(selected_orbit_for(&press(&[KeyCode::KeyA])), None);
    }

    #[test]
    fn readout_mentions_hovered_node() {
        let state = ArchitectState::default();
        let text = dock_readout(&state, &DockState::default(), Some("p2"));
        assert!(text.contains("Brands"));
        assert!(text.contains("radius 160"));
    }

    #[test]
    fn commands_flow_into_store() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<ArchitectStore>()
            .add_message::<ArchitectCommand>()
            .add_systems(Update, apply_architect_commands);

        app.world_mut()
            .write_message(ArchitectCommand(ArchitectAction::SetOrbitVisibility {
                orbit: OrbitIndex::Two,
                visible: false,
            }));
        app.update();

        let store = app.world().resource::<ArchitectStore>();
        assert!(!store.config().show.orbits.two);
        assert_eq!(store.version(), 1);
    }
}
