//! Member portal data access
//!
//! Session handling, single-row fetches with polling live updates, point
//! totals, entitlement upserts and the moderation queue. All HTTP happens on
//! a worker thread; systems only exchange commands and results with it.

use bevy::prelude::*;

pub mod client;
pub mod entitlements;
pub mod error;
pub mod live;
pub mod member;
pub mod session;
pub mod systems;
pub mod types;
pub mod worker;

pub use entitlements::{EntitlementToggles, MODULES};
pub use error::BackendError;
pub use live::BrandChanged;
pub use member::{MemberData, ModerationQueue};
pub use session::SessionState;
pub use systems::BackendRequest;

/// Plugin for the member portal backend
pub struct BackendPlugin {
    spawn_worker: bool,
}

impl Default for BackendPlugin {
    fn default() -> Self {
        Self { spawn_worker: true }
    }
}

impl BackendPlugin {
    /// Systems only; the caller supplies `BackendChannels`.
    pub fn without_worker() -> Self {
        Self {
            spawn_worker: false,
        }
    }
}

impl Plugin for BackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SessionState>()
            .init_resource::<EntitlementToggles>()
            .init_resource::<ModerationQueue>()
            .add_message::<BackendRequest>()
            .add_message::<BrandChanged>()
            .add_systems(
                Update,
                (
                    systems::dispatch_backend_requests,
                    systems::apply_backend_results,
                    systems::session_change_system,
                    systems::poll_brand_watch_system,
                )
                    .chain(),
            );

        if self.spawn_worker {
            app.add_systems(Startup, systems::setup_backend_worker);
        }
    }
}
