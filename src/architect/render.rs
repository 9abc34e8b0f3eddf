//! Orbit diagram rendering
//!
//! Orbits, planets, moons and haze are immediate-mode gizmos redrawn every
//! frame from the store. Labels are `Text2d` entities rebuilt whenever the
//! store changes.

use bevy::math::Isometry2d;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::architect::config::{OrbitIndex, SystemConfig};
use crate::architect::nodes::{Node, normalize_angle};
use crate::architect::store::ArchitectStore;

/// Diagram drawing parameters
#[derive(Resource, Debug, Clone)]
pub struct DiagramStyle {
    pub orbit_color: Color,
    pub ring_color: Color,
    pub haze_color: Color,
    pub planet_radius: f32,
    pub moon_radius: f32,
    pub moon_distance: f32,
    /// Seconds per revolution of a moon around its planet
    pub moon_period_s: f32,
    pub ring_scale: f32,
    pub haze_layers: u32,
    pub label_offset: f32,
    pub label_font_size: f32,
    pub hover_radius: f32,
    /// Flattened orbits never get thinner than this fraction of their radius
    pub min_squash: f32,
}

impl Default for DiagramStyle {
    fn default() -> Self {
        Self {
            orbit_color: Color::srgba(0.55, 0.8, 0.6, 0.55),
            ring_color: Color::srgba(0.9, 0.9, 0.8, 0.35),
            haze_color: Color::srgba(0.35, 0.2, 0.55, 0.12),
            planet_radius: 14.0,
            moon_radius: 4.0,
            moon_distance: 28.0,
            moon_period_s: 9.0,
            ring_scale: 1.6,
            haze_layers: 6,
            label_offset: 24.0,
            label_font_size: 14.0,
            hover_radius: 18.0,
            min_squash: 0.02,
        }
    }
}

#[derive(Component)]
pub struct DiagramCamera;

#[derive(Component)]
pub struct NodeLabel {
    pub node_id: String,
}

/// Node currently under the cursor, if tooltips are on
#[derive(Resource, Debug, Default, PartialEq)]
pub struct HoveredNode(pub Option<String>);

pub fn accent_color(token: &str) -> Color {
    match token {
        "emerald" => Color::srgb(0.2, 0.78, 0.5),
        "amber" => Color::srgb(0.96, 0.7, 0.15),
        "violet" => Color::srgb(0.6, 0.4, 0.95),
        "sky" => Color::srgb(0.3, 0.7, 0.95),
        "rose" => Color::srgb(0.95, 0.35, 0.5),
        "lime" => Color::srgb(0.6, 0.9, 0.2),
        _ => Color::srgb(0.6, 0.6, 0.6),
    }
}

/// Vertical flattening of an orbit seen at the configured tilt
pub fn orbit_squash(config: &SystemConfig, orbit: OrbitIndex, min_squash: f32) -> f32 {
    let tilt = config.tilt_deg + config.orbit_tilts.get(orbit);
    tilt.to_radians().cos().abs().max(min_squash)
}

/// Angle of a node after `elapsed_s` seconds of animation
pub fn live_angle(config: &SystemConfig, node: &Node, elapsed_s: f32) -> f32 {
    let period = config.speeds.get(node.orbit);
    if period <= 0.0 || !period.is_finite() {
        return normalize_angle(node.angle);
    }
    normalize_angle(node.angle + elapsed_s * 360.0 / period)
}

/// Point on an orbit ellipse centred at the origin
pub fn orbit_point(config: &SystemConfig, orbit: OrbitIndex, angle_deg: f32, min_squash: f32) -> Vec2 {
    let r = config.radii.get(orbit);
    let squash = orbit_squash(config, orbit, min_squash);
    let a = angle_deg.to_radians();
    Vec2::new(r * a.cos(), r * squash * a.sin())
}

pub fn node_position(config: &SystemConfig, node: &Node, elapsed_s: f32, min_squash: f32) -> Vec2 {
    orbit_point(config, node.orbit, live_angle(config, node, elapsed_s), min_squash)
}

/// Node nearest to `point` within `radius`, among visible orbits
pub fn node_at<'a>(
    config: &SystemConfig,
    nodes: &'a [Node],
    point: Vec2,
    elapsed_s: f32,
    style: &DiagramStyle,
) -> Option<&'a Node> {
    nodes
        .iter()
        .filter(|n| config.show.orbits.get(n.orbit))
        .map(|n| (n, node_position(config, n, elapsed_s, style.min_squash).distance(point)))
        .filter(|(_, d)| *d <= style.hover_radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(n, _)| n)
}

pub fn setup_diagram_camera(mut commands: Commands) {
    commands.spawn((Camera2d, DiagramCamera, Name::new("Architect Camera")));
}

pub fn draw_diagram_system(
    mut gizmos: Gizmos,
    store: Res<ArchitectStore>,
    style: Res<DiagramStyle>,
    time: Res<Time>,
) {
    let config = store.config();
    let elapsed = time.elapsed_secs();

    if config.show.nebula {
        let outer = config.size * 0.5;
        for layer in 1..=style.haze_layers {
            let r = outer * layer as f32 / style.haze_layers as f32;
            gizmos.circle_2d(Isometry2d::IDENTITY, r, style.haze_color);
        }
    }

    for orbit in OrbitIndex::ALL {
        if !config.show.orbits.get(orbit) {
            continue;
        }
        let r = config.radii.get(orbit);
        let squash = orbit_squash(config, orbit, style.min_squash);
        gizmos.ellipse_2d(Isometry2d::IDENTITY, Vec2::new(r, r * squash), style.orbit_color);
    }

    for node in store.nodes() {
        if !config.show.orbits.get(node.orbit) {
            continue;
        }
        let pos = node_position(config, node, elapsed, style.min_squash);
        let color = accent_color(&node.accent);
        gizmos.circle_2d(Isometry2d::from_translation(pos), style.planet_radius, color);

        if config.show.rings {
            let squash = orbit_squash(config, node.orbit, style.min_squash);
            let ring = style.planet_radius * style.ring_scale;
            gizmos.ellipse_2d(
                Isometry2d::from_translation(pos),
                Vec2::new(ring, ring * squash),
                style.ring_color,
            );
        }

        if config.show.moons {
            let spin = if style.moon_period_s > 0.0 {
                elapsed * 360.0 / style.moon_period_s
            } else {
                0.0
            };
            for moon in &node.moons {
                let a = normalize_angle(moon.angle + spin).to_radians();
                let offset = Vec2::new(a.cos(), a.sin()) * style.moon_distance;
                gizmos.circle_2d(
                    Isometry2d::from_translation(pos + offset),
                    style.moon_radius,
                    accent_color(&moon.accent),
                );
            }
        }
    }
}

/// Rebuild label entities after a store change
pub fn rebuild_labels_system(
    mut commands: Commands,
    store: Res<ArchitectStore>,
    style: Res<DiagramStyle>,
    labels: Query<Entity, With<NodeLabel>>,
) {
    for entity in labels.iter() {
        commands.entity(entity).despawn();
    }
    for node in store.nodes() {
        commands.spawn((
            Text2d::new(node.display_name().to_string()),
            TextFont {
                font_size: style.label_font_size,
                ..default()
            },
            TextColor(accent_color(&node.accent)),
            Transform::default(),
            Visibility::Hidden,
            NodeLabel {
                node_id: node.id.clone(),
            },
        ));
    }
}

pub fn position_labels_system(
    store: Res<ArchitectStore>,
    style: Res<DiagramStyle>,
    time: Res<Time>,
    mut labels: Query<(&NodeLabel, &mut Transform, &mut Visibility)>,
) {
    let config = store.config();
    let elapsed = time.elapsed_secs();
    for (label, mut transform, mut visibility) in labels.iter_mut() {
        let node = store.nodes().iter().find(|n| n.id == label.node_id);
        let Some(node) = node.filter(|n| config.show.labels && config.show.orbits.get(n.orbit))
        else {
            *visibility = Visibility::Hidden;
            continue;
        };
        let pos = node_position(config, node, elapsed, style.min_squash);
        transform.translation = (pos + Vec2::new(0.0, style.label_offset)).extend(1.0);
        *visibility = Visibility::Inherited;
    }
}

pub fn hover_system(
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<DiagramCamera>>,
    store: Res<ArchitectStore>,
    style: Res<DiagramStyle>,
    time: Res<Time>,
    mut hovered: ResMut<HoveredNode>,
) {
    let config = store.config();
    if !config.show.tooltips {
        hovered.set_if_neq(HoveredNode(None));
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.single() else {
        return;
    };
    let world = window
        .cursor_position()
        .and_then(|cursor| camera.viewport_to_world_2d(camera_transform, cursor).ok());
    let id = world
        .and_then(|p| node_at(config, store.nodes(), p, time.elapsed_secs(), &style))
        .map(|n| n.id.clone());
    hovered.set_if_neq(HoveredNode(id));
}
