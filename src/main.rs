use bevy::prelude::*;
use bevy::window::{PresentMode, Window, WindowPlugin};

#[cfg(feature = "dev")]
use bevy::dev_tools::fps_overlay::FpsOverlayPlugin;

mod architect;
mod backend;
mod payments;
mod portal;
mod settings;

use architect::ArchitectPlugin;
use backend::BackendPlugin;
use payments::PaymentsPlugin;
use portal::PortalPlugin;
use settings::AppSettings;

fn main() {
    let mut app = App::new();
    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Hempverse Architect".to_string(),
            present_mode: PresentMode::AutoVsync,
            ..default()
        }),
        ..default()
    }));

    #[cfg(feature = "dev")]
    app.add_plugins(FpsOverlayPlugin::default());

    // Loaded after DefaultPlugins so settings warnings reach the log.
    let settings = AppSettings::load();
    app.insert_resource(ClearColor(Color::srgb(0.02, 0.03, 0.05)))
        .insert_resource(settings)
        .add_plugins(ArchitectPlugin)
        .add_plugins(BackendPlugin::default())
        .add_plugins(PaymentsPlugin::default())
        .add_plugins(PortalPlugin);

    app.run();
}
