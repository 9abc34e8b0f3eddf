//! Member portal panel: account, billing and moderation on function keys

use bevy::prelude::*;

use crate::backend::live::RowChange;
use crate::backend::types::ModerationDecision;
use crate::backend::{
    BackendRequest, BrandChanged, EntitlementToggles, MODULES, MemberData, ModerationQueue,
    SessionState,
};
use crate::payments::{Checkout, CheckoutRequest, CheckoutStage};
use crate::settings::AppSettings;

pub const MEMBERSHIP_PRODUCT: &str = "hempverse-membership";

const TOGGLE_KEYS: [KeyCode; 3] = [KeyCode::F7, KeyCode::F8, KeyCode::F9];

#[derive(Clone, Debug, PartialEq)]
pub enum PortalIntent {
    Backend(BackendRequest),
    Checkout(CheckoutRequest),
}

/// Things the panel needs to know to turn keys into requests
pub struct PortalContext<'a> {
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
    pub signed_in: bool,
    pub is_admin: bool,
    pub first_pending: Option<&'a str>,
}

pub fn portal_intents(keys: &ButtonInput<KeyCode>, ctx: &PortalContext) -> Vec<PortalIntent> {
    let mut out = Vec::new();

    if keys.just_pressed(KeyCode::F5)
        && !ctx.signed_in
        && let Some(email) = ctx.email
    {
        out.push(PortalIntent::Backend(BackendRequest::SignIn {
            email: email.to_string(),
            password: ctx.password.map(str::to_string),
        }));
    }
    if !ctx.signed_in {
        return out;
    }

    if keys.just_pressed(KeyCode::F6) {
        out.push(PortalIntent::Backend(BackendRequest::SignOut));
        return out;
    }
    if keys.just_pressed(KeyCode::F3) {
        out.push(PortalIntent::Backend(BackendRequest::RefreshMember));
    }
    for (key, module) in TOGGLE_KEYS.iter().zip(MODULES) {
        if keys.just_pressed(*key) {
            out.push(PortalIntent::Backend(BackendRequest::ToggleEntitlement {
                module: module.to_string(),
            }));
        }
    }
    if keys.just_pressed(KeyCode::F10) {
        out.push(PortalIntent::Checkout(CheckoutRequest::Start {
            product_id: MEMBERSHIP_PRODUCT.to_string(),
        }));
    }
    if keys.just_pressed(KeyCode::F11) {
        out.push(PortalIntent::Checkout(CheckoutRequest::Approved));
    }
    if keys.just_pressed(KeyCode::F12) {
        out.push(PortalIntent::Checkout(CheckoutRequest::Cancel));
    }

    if ctx.is_admin {
        if keys.just_pressed(KeyCode::F4) {
            out.push(PortalIntent::Backend(BackendRequest::RefreshModeration));
        }
        if let Some(id) = ctx.first_pending {
            let decision = if keys.just_pressed(KeyCode::PageUp) {
                Some(ModerationDecision::Approve)
            } else if keys.just_pressed(KeyCode::PageDown) {
                Some(ModerationDecision::Reject { reason: None })
            } else {
                None
            };
            if let Some(decision) = decision {
                out.push(PortalIntent::Backend(BackendRequest::Decide {
                    submission_id: id.to_string(),
                    decision,
                }));
            }
        }
    }
    out
}

pub fn portal_input_system(
    keys: Res<ButtonInput<KeyCode>>,
    settings: Res<AppSettings>,
    session: Res<SessionState>,
    member: Option<Res<MemberData>>,
    moderation: Res<ModerationQueue>,
    mut backend: MessageWriter<BackendRequest>,
    mut checkout: MessageWriter<CheckoutRequest>,
) {
    let ctx = PortalContext {
        email: settings.member_email.as_deref(),
        password: settings.member_password.as_deref(),
        signed_in: session.current().is_some(),
        is_admin: member
            .as_deref()
            .and_then(|m| m.profile.as_ref())
            .is_some_and(|p| p.is_admin()),
        first_pending: moderation.pending.first().map(|s| s.id.as_str()),
    };
    for intent in portal_intents(&keys, &ctx) {
        match intent {
            PortalIntent::Backend(r) => {
                backend.write(r);
            }
            PortalIntent::Checkout(r) => {
                checkout.write(r);
            }
        }
    }
}

/// Last live brand event, for the readout
#[derive(Resource, Debug, Default)]
pub struct BrandFeed(pub Option<String>);

pub fn brand_feed_system(mut changes: MessageReader<BrandChanged>, mut feed: ResMut<BrandFeed>) {
    if let Some(BrandChanged(change)) = changes.read().last() {
        feed.0 = Some(match change {
            RowChange::Inserted(b) => format!("brand {} created", b.name),
            RowChange::Updated { old, new } if old.status != new.status => format!(
                "brand status {} -> {}",
                old.status.as_deref().unwrap_or("none"),
                new.status.as_deref().unwrap_or("none")
            ),
            RowChange::Updated { new, .. } => format!("brand {} updated", new.name),
            RowChange::Deleted(b) => format!("brand {} removed", b.name),
        });
    }
}

pub fn portal_readout(
    session: &SessionState,
    member: Option<&MemberData>,
    toggles: &EntitlementToggles,
    checkout: &Checkout,
    moderation: &ModerationQueue,
    feed: &BrandFeed,
) -> String {
    let mut lines = vec!["PORTAL".to_string()];

    let Some(current) = session.current() else {
        lines.push(if session.pending {
            "signing in…".to_string()
        } else {
            "signed out  [F5] sign in".to_string()
        });
        lines.extend(session.notice.clone());
        lines.extend(session.error.iter().map(|e| format!("! {}", e)));
        return lines.join("\n");
    };

    let name = member
        .and_then(|m| m.profile.as_ref())
        .and_then(|p| p.display_name.clone())
        .or_else(|| current.user.email.clone())
        .unwrap_or_else(|| current.user.id.clone());
    lines.push(format!("{}  [F6] sign out", name));

    if let Some(m) = member {
        lines.push(format!("level {}  ({} xp)", m.level(), m.experience));
        lines.push(match m.brand.current() {
            Some(b) => format!(
                "brand {} ({})",
                b.name,
                b.status.as_deref().unwrap_or("unreviewed")
            ),
            None => "no brand yet".to_string(),
        });
        lines.extend(m.error.iter().map(|e| format!("! {}", e)));
    }
    lines.extend(feed.0.clone());

    let modules: Vec<String> = TOGGLE_KEYS
        .iter()
        .zip(MODULES)
        .map(|(key, module)| {
            let mark = if toggles.is_enabled(module) { "x" } else { " " };
            let busy = if toggles.in_flight(module) { "…" } else { "" };
            format!("[{:?}] {}{} {}", key, mark, busy, module)
        })
        .collect();
    lines.push(modules.join("  "));
    lines.extend(toggles.error.iter().map(|e| format!("! {}", e)));

    lines.push(match &checkout.stage {
        CheckoutStage::Idle => "billing: [F10] upgrade".to_string(),
        CheckoutStage::AwaitingApproval { order_id, .. } => {
            format!("billing: order {}  [F11] capture  [F12] cancel", order_id)
        }
        CheckoutStage::Completed { order_id } => format!("billing: paid ({})", order_id),
        CheckoutStage::Failed { message } => format!("billing failed: {}", message),
        other => format!("billing: {}", other.label()),
    });

    let admin = member
        .and_then(|m| m.profile.as_ref())
        .is_some_and(|p| p.is_admin());
    if admin {
        lines.push(match moderation.pending.first() {
            Some(next) => format!(
                "moderation: {} pending, next \"{}\"  [PgUp] approve  [PgDn] reject",
                moderation.pending.len(),
                next.title
            ),
            None if moderation.loading => "moderation: loading…".to_string(),
            None => "moderation: queue empty  [F4] refresh".to_string(),
        });
        lines.extend(moderation.error.iter().map(|e| format!("! {}", e)));
    }
    lines.extend(session.error.iter().map(|e| format!("! {}", e)));
    lines.join("\n")
}

#[derive(Component)]
pub struct PortalText;

fn spawn_portal_text(mut commands: Commands) {
    commands.spawn((
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            bottom: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        },
        PortalText,
    ));
}

pub fn refresh_portal_text_system(
    session: Res<SessionState>,
    member: Option<Res<MemberData>>,
    toggles: Res<EntitlementToggles>,
    checkout: Res<Checkout>,
    moderation: Res<ModerationQueue>,
    feed: Res<BrandFeed>,
    mut texts: Query<&mut Text, With<PortalText>>,
) {
    let member_changed = member.as_ref().is_some_and(|m| m.is_changed());
    if !(session.is_changed()
        || member_changed
        || toggles.is_changed()
        || checkout.is_changed()
        || moderation.is_changed()
        || feed.is_changed())
    {
        return;
    }
    let Ok(mut text) = texts.single_mut() else {
        return;
    };
    text.0 = portal_readout(
        &session,
        member.as_deref(),
        &toggles,
        &checkout,
        &moderation,
        &feed,
    );
}

pub struct PortalPlugin;

impl Plugin for PortalPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BrandFeed>()
            .add_systems(Startup, spawn_portal_text)
            .add_systems(
                Update,
                (
                    portal_input_system,
                    brand_feed_system,
                    refresh_portal_text_system,
                )
                    .chain(),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::live::RowWatch;
    use crate::backend::types::{Profile, Session, SessionUser};
    use std::time::Duration;

    fn press(keys: &[KeyCode]) -> ButtonInput<KeyCode> {
        let mut input = ButtonInput::<KeyCode>::default();
        for key in keys {
            input.press(*key);
        }
        input
    }

    fn ctx(signed_in: bool, is_admin: bool) -> PortalContext<'static> {
        PortalContext {
            email: Some("grower@example.com"),
            password: None,
            signed_in,
            is_admin,
            first_pending: Some("s1"),
        }
    }

    #[test]
    fn signed_out_can_only_sign_in() {
        let intents = portal_intents(&press(&[KeyCode::F5, KeyCode::F7, KeyCode::F10]), &ctx(false, false));
        assert_eq!(
            intents,
            vec![PortalIntent::Backend(BackendRequest::SignIn {
                email: "grower@example.com".to_string(),
                password: None,
            })]
        );
    }

    #[test]
    fn function_keys_map_to_modules() {
        let intents = portal_intents(&press(&[KeyCode::F8]), &ctx(true, false));
        assert_eq!(
            intents,
            vec![PortalIntent::Backend(BackendRequest::ToggleEntitlement {
                module: "analytics".to_string()
            })]
        );
    }

    #[test]
    fn moderation_needs_admin() {
        assert!(portal_intents(&press(&[KeyCode::PageUp]), &ctx(true, false)).is_empty());
        let intents = portal_intents(&press(&[KeyCode::PageDown]), &ctx(true, true));
        assert_eq!(
            intents,
            vec![PortalIntent::Backend(BackendRequest::Decide {
                submission_id: "s1".to_string(),
                decision: ModerationDecision::Reject { reason: None },
            })]
        );
    }

    #[test]
    fn readout_shows_member_state() {
        let mut session = SessionState::default();
        session.set(Some(Session {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
            user: SessionUser {
                id: "u1".to_string(),
                email: Some("grower@example.com".to_string()),
            },
        }));
        let mut member = MemberData::new(RowWatch::new(Duration::from_secs(15)));
        member.profile = Some(Profile {
            id: "u1".to_string(),
            display_name: Some("Sam".to_string()),
            role: None,
            avatar_url: None,
        });
        member.experience = 450;
        let mut toggles = EntitlementToggles::default();
        toggles.toggle("events");

        let text = portal_readout(
            &session,
            Some(&member),
            &toggles,
            &Checkout::default(),
            &ModerationQueue::default(),
            &BrandFeed::default(),
        );
        assert!(text.contains("Sam"));
        assert!(text.contains("level 3"));
        assert!(text.contains("x… events"));
        assert!(text.contains("[F10] upgrade"));
        assert!(!text.contains("moderation"));
    }

    #[test]
    fn signed_out_readout_shows_errors() {
        let mut session = SessionState::default();
        session.error = Some("Invalid login credentials".to_string());
        let text = portal_readout(
            &session,
            None,
            &EntitlementToggles::default(),
            &Checkout::default(),
            &ModerationQueue::default(),
            &BrandFeed::default(),
        );
        assert!(text.contains("signed out"));
        assert!(text.contains("! Invalid login credentials"));
    }
}
