//! Architect: the password-gated orbit diagram editor
//!
//! `config`, `nodes` and `store` hold the editable state and its merge rules;
//! `render` and `dock` are the views that react to it; `snapshot` keeps the
//! last edit on disk.

use bevy::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub mod config;
pub mod dock;
pub mod gate;
pub mod nodes;
pub mod render;
pub mod snapshot;
pub mod store;

pub use dock::{ArchitectCommand, DockState, DockSteps};
pub use gate::ArchitectGate;
pub use render::{DiagramStyle, HoveredNode};
pub use store::{ArchitectAction, ArchitectState, ArchitectStore};

use crate::settings::AppSettings;
use snapshot::SnapshotStore;

/// Plugin for the Architect editor
pub struct ArchitectPlugin;

impl Plugin for ArchitectPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ArchitectStore>()
            .init_resource::<ArchitectGate>()
            .init_resource::<DockState>()
            .init_resource::<DockSteps>()
            .init_resource::<DiagramStyle>()
            .init_resource::<HoveredNode>()
            .add_message::<ArchitectCommand>()
            .add_systems(
                Startup,
                (
                    setup_architect,
                    render::setup_diagram_camera,
                    dock::spawn_dock_text,
                ),
            )
            .add_systems(
                Update,
                (
                    gate::gate_input_system,
                    dock::dock_input_system.run_if(gate::gate_unlocked),
                    dock::apply_architect_commands,
                    render::rebuild_labels_system.run_if(resource_changed::<ArchitectStore>),
                    render::hover_system.run_if(gate::gate_unlocked),
                    render::position_labels_system.run_if(gate::gate_unlocked),
                    hide_labels_system.run_if(gate::gate_locked),
                    dock::refresh_dock_text_system,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    render::draw_diagram_system.run_if(gate::gate_unlocked),
                    autosave_snapshot_system,
                ),
            );
    }
}

/// Disk persistence state for the store
#[derive(Resource)]
pub struct SnapshotSync {
    snapshots: Option<SnapshotStore>,
    dirty: Arc<AtomicBool>,
    interval: Duration,
    last_flush: Option<Duration>,
}

impl SnapshotSync {
    /// Flush is due when something changed and the interval has elapsed.
    fn due(&self, now: Duration) -> bool {
        self.dirty.load(Ordering::Relaxed)
            && self
                .last_flush
                .is_none_or(|last| now.saturating_sub(last) >= self.interval)
    }
}

fn setup_architect(mut commands: Commands, settings: Res<AppSettings>) {
    let snapshots = if settings.persist_architect {
        match SnapshotStore::new() {
            Ok(s) => Some(s),
            Err(err) => {
                warn!("[ARCHITECT] snapshots disabled: {}", err);
                None
            }
        }
    } else {
        None
    };

    let initial = match snapshots.as_ref().map(|s| s.load()) {
        Some(Ok(Some(loaded))) => {
            info!(
                "[ARCHITECT] restored snapshot saved at {}",
                loaded
                    .saved_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            loaded.state
        }
        Some(Err(err)) => {
            warn!("[ARCHITECT] ignoring unreadable snapshot: {}", err);
            ArchitectState::default()
        }
        _ => ArchitectState::default(),
    };

    let mut store = ArchitectStore::new(initial);
    let dirty = Arc::new(AtomicBool::new(false));
    let flag = dirty.clone();
    store.subscribe(move |_| flag.store(true, Ordering::Relaxed));

    commands.insert_resource(store);
    commands.insert_resource(SnapshotSync {
        snapshots,
        dirty,
        interval: settings.autosave_interval(),
        last_flush: None,
    });
    commands.insert_resource(ArchitectGate::new(settings.architect_passphrase.clone()));
    info!("[INIT] Architect ready");
}

fn autosave_snapshot_system(
    store: Res<ArchitectStore>,
    sync: Option<ResMut<SnapshotSync>>,
    time: Res<Time>,
) {
    let Some(mut sync) = sync else { return };
    let now = time.elapsed();
    if !sync.due(now) {
        return;
    }
    sync.dirty.store(false, Ordering::Relaxed);
    sync.last_flush = Some(now);
    let Some(snapshots) = sync.snapshots.as_ref() else {
        return;
    };
    match snapshots.save(store.state()) {
        Ok(()) => debug!("[ARCHITECT] snapshot v{} saved", store.version()),
        Err(err) => warn!("[ARCHITECT] snapshot save failed: {}", err),
    }
}

fn hide_labels_system(mut labels: Query<&mut Visibility, With<render::NodeLabel>>) {
    for mut visibility in labels.iter_mut() {
        visibility.set_if_neq(Visibility::Hidden);
    }
}
