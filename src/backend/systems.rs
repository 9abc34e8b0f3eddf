//! Backend systems (request dispatch, live polling, result apply)

use bevy::prelude::*;
use chrono::Utc;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::entitlements::EntitlementToggles;
use crate::backend::live::{BrandChanged, RowChange, RowWatch};
use crate::backend::member::{MemberData, ModerationQueue, validate_decision};
use crate::backend::session::SessionState;
use crate::backend::types::{
    BackendChannels, BackendCommand, BackendConfig, BackendOp, BackendResult, EntitlementRow,
    ModerationDecision,
};
use crate::backend::worker::start_backend_worker;
use crate::settings::AppSettings;

/// Something a view wants from the backend
#[derive(Message, Clone, Debug, PartialEq)]
pub enum BackendRequest {
    /// Password sign-in, or a magic link when no password is given
    SignIn { email: String, password: Option<String> },
    SignOut,
    RefreshMember,
    ToggleEntitlement { module: String },
    RefreshModeration,
    Decide { submission_id: String, decision: ModerationDecision },
}

/// User ids pushed by the session listener (None on sign-out)
#[derive(Resource)]
pub struct SessionChanges {
    pub rx: Arc<Mutex<Receiver<Option<String>>>>,
}

pub fn backend_config_from(settings: &AppSettings) -> BackendConfig {
    BackendConfig {
        base_url: settings.backend_url.clone(),
        api_key: settings.backend_key.clone(),
        watch_interval: Duration::from_secs(settings.watch_interval_secs.max(1)),
    }
}

/// Register the session listener that drives member data loading.
pub fn install_session_listener(session: &mut SessionState) -> SessionChanges {
    let (tx, rx) = mpsc::channel::<Option<String>>();
    session.subscribe(move |s| {
        let _ = tx.send(s.map(|s| s.user.id.clone()));
    });
    SessionChanges {
        rx: Arc::new(Mutex::new(rx)),
    }
}

pub fn setup_backend_worker(
    mut commands: Commands,
    settings: Res<AppSettings>,
    mut session: ResMut<SessionState>,
    mut requests: MessageWriter<BackendRequest>,
) {
    let config = backend_config_from(&settings);
    let channels = start_backend_worker(&config);
    info!("[INIT] Backend worker started for {}", config.base_url);

    commands.insert_resource(MemberData::new(RowWatch::new(config.watch_interval)));
    commands.insert_resource(install_session_listener(&mut session));
    commands.insert_resource(channels);
    commands.insert_resource(config);

    if let Some(email) = settings.member_email.clone() {
        requests.write(BackendRequest::SignIn {
            email,
            password: settings.member_password.clone(),
        });
    }
}

fn queue(channels: &BackendChannels, cmd: BackendCommand) -> Result<(), String> {
    channels
        .cmd_tx
        .send(cmd)
        .map_err(|err| format!("Failed to queue backend request: {}", err))
}

pub fn dispatch_backend_requests(
    mut requests: MessageReader<BackendRequest>,
    channels: Option<Res<BackendChannels>>,
    mut session: ResMut<SessionState>,
    mut toggles: ResMut<EntitlementToggles>,
    mut moderation: ResMut<ModerationQueue>,
    mut member: Option<ResMut<MemberData>>,
) {
    let Some(channels) = channels else { return };

    for request in requests.read() {
        if let BackendRequest::SignIn { email, password } = request {
            let cmd = match password {
                Some(password) => BackendCommand::SignInWithPassword {
                    email: email.clone(),
                    password: password.clone(),
                },
                None => BackendCommand::SendMagicLink {
                    email: email.clone(),
                },
            };
            match queue(&channels, cmd) {
                Ok(()) => {
                    session.pending = true;
                    session.error = None;
                }
                Err(err) => session.error = Some(err),
            }
            continue;
        }

        if session.current().is_some_and(|s| s.is_expired(Utc::now())) {
            warn!("[BACKEND] session expired");
            session.clear();
            session.error = Some("Session expired, sign in again".to_string());
            continue;
        }

        let (Some(user_id), Some(token)) = (
            session.user_id().map(str::to_string),
            session.token().map(str::to_string),
        ) else {
            session.error = Some("Sign in required".to_string());
            continue;
        };

        let result = match request {
            BackendRequest::SignIn { .. } => Ok(()),
            BackendRequest::SignOut => {
                let res = queue(&channels, BackendCommand::SignOut { token });
                // Local sign-out does not wait for the server.
                session.clear();
                res
            }
            BackendRequest::RefreshMember => {
                if let Some(member) = member.as_deref_mut() {
                    member.brand.watch(Some(user_id.clone()));
                }
                queue_member_fetches(&channels, &user_id, &token)
            }
            BackendRequest::ToggleEntitlement { module } => {
                let toggle = toggles.toggle(module);
                let row = EntitlementRow::new(&user_id, &toggle.module, toggle.enabled, Utc::now());
                let res = queue(
                    &channels,
                    BackendCommand::UpsertEntitlement {
                        row,
                        token,
                        generation: toggle.generation,
                    },
                );
                if let Err(err) = &res {
                    toggles.fail(&toggle.module, toggle.generation, err.clone());
                }
                res
            }
            BackendRequest::RefreshModeration => {
                moderation.loading = true;
                queue(&channels, BackendCommand::ListPendingSubmissions { token })
            }
            BackendRequest::Decide {
                submission_id,
                decision,
            } => {
                let Some(submission) = moderation
                    .pending
                    .iter()
                    .find(|s| &s.id == submission_id)
                    .cloned()
                else {
                    moderation.error = Some(format!("Unknown submission {}", submission_id));
                    continue;
                };
                if let Err(err) = validate_decision(&submission, decision) {
                    moderation.error = Some(err.to_string());
                    continue;
                }
                queue(
                    &channels,
                    BackendCommand::DecideSubmission {
                        submission,
                        decision: decision.clone(),
                        token,
                    },
                )
            }
        };

        if let Err(err) = result {
            warn!("[BACKEND] {}", err);
            session.error = Some(err);
        }
    }
}

fn queue_member_fetches(channels: &BackendChannels, user_id: &str, token: &str) -> Result<(), String> {
    let user_id = user_id.to_string();
    let token = token.to_string();
    queue(
        channels,
        BackendCommand::FetchProfile {
            user_id: user_id.clone(),
            token: token.clone(),
        },
    )?;
    queue(
        channels,
        BackendCommand::FetchPoints {
            user_id: user_id.clone(),
            token: token.clone(),
        },
    )?;
    queue(channels, BackendCommand::FetchEntitlements { user_id, token })
}

/// React to sign-in / sign-out pushed by the session listener
pub fn session_change_system(
    changes: Option<Res<SessionChanges>>,
    channels: Option<Res<BackendChannels>>,
    session: Res<SessionState>,
    mut member: Option<ResMut<MemberData>>,
    mut toggles: ResMut<EntitlementToggles>,
    mut moderation: ResMut<ModerationQueue>,
) {
    let Some(changes) = changes else { return };
    let Ok(rx) = changes.rx.lock() else {
        return;
    };
    while let Ok(change) = rx.try_recv() {
        match change {
            Some(user_id) => {
                info!("[BACKEND] signed in as {}", user_id);
                if let Some(member) = member.as_deref_mut() {
                    member.clear();
                    member.brand.watch(Some(user_id.clone()));
                }
                if let (Some(channels), Some(token)) = (channels.as_deref(), session.token())
                    && let Err(err) = queue_member_fetches(channels, &user_id, token)
                {
                    warn!("[BACKEND] {}", err);
                }
            }
            None => {
                info!("[BACKEND] signed out");
                if let Some(member) = member.as_deref_mut() {
                    member.clear();
                }
                toggles.clear();
                *moderation = ModerationQueue::default();
            }
        }
    }
}

/// Re-fetch the watched brand row when its interval has elapsed
pub fn poll_brand_watch_system(
    time: Res<Time>,
    session: Res<SessionState>,
    channels: Option<Res<BackendChannels>>,
    member: Option<ResMut<MemberData>>,
) {
    let (Some(channels), Some(mut member)) = (channels, member) else {
        return;
    };
    let now = time.elapsed();
    if !member.brand.due(now) {
        return;
    }
    let (Some(owner_id), Some(token)) = (member.brand.owner_id.clone(), session.token()) else {
        return;
    };
    member.brand.mark_requested(now);
    if let Err(err) = queue(
        &channels,
        BackendCommand::FetchBrand {
            owner_id,
            token: token.to_string(),
        },
    ) {
        member.error = Some(err);
    }
}

/// System to drain backend results into resources
pub fn apply_backend_results(
    channels: Option<Res<BackendChannels>>,
    mut session: ResMut<SessionState>,
    mut toggles: ResMut<EntitlementToggles>,
    mut moderation: ResMut<ModerationQueue>,
    mut member: Option<ResMut<MemberData>>,
    mut brand_changes: MessageWriter<BrandChanged>,
) {
    let Some(channels) = channels else { return };
    let Ok(guard) = channels.res_rx.lock() else {
        return;
    };

    while let Ok(msg) = guard.try_recv() {
        match msg {
            BackendResult::SignedIn(new_session) => {
                session.error = None;
                session.notice = None;
                session.set(Some(new_session));
            }
            BackendResult::MagicLinkSent { email } => {
                session.pending = false;
                session.notice = Some(format!("Check {} for a sign-in link", email));
            }
            BackendResult::SignedOut => {}
            BackendResult::Profile(profile) => {
                if let Some(member) = member.as_deref_mut() {
                    member.profile = profile;
                }
            }
            BackendResult::Brand { owner_id, brand } => {
                if let Some(member) = member.as_deref_mut()
                    && let Some(change) = member.observe_brand(&owner_id, brand)
                {
                    match &change {
                        RowChange::Inserted(b) => info!("[BACKEND] brand created: {}", b.name),
                        RowChange::Updated { new, .. } => info!("[BACKEND] brand updated: {}", new.name),
                        RowChange::Deleted(b) => info!("[BACKEND] brand removed: {}", b.name),
                    }
                    brand_changes.write(BrandChanged(change));
                }
            }
            BackendResult::Points(events) => {
                if let Some(member) = member.as_deref_mut() {
                    member.set_points(&events);
                }
            }
            BackendResult::Entitlements(rows) => toggles.load(&rows),
            BackendResult::EntitlementSaved { row, generation } => toggles.confirm(&row, generation),
            BackendResult::EntitlementFailed {
                module,
                generation,
                error,
            } => {
                warn!("[BACKEND] entitlement {} not saved: {}", module, error);
                toggles.fail(&module, generation, error.to_string());
                if error.is_unauthorized() {
                    session.clear();
                    session.error = Some(error.to_string());
                }
            }
            BackendResult::Submissions(list) => moderation.replace(list),
            BackendResult::SubmissionDecided(submission) => {
                info!("[BACKEND] submission {} is now {:?}", submission.id, submission.status);
                moderation.resolved(&submission);
                moderation.error = None;
            }
            BackendResult::Failed { op, error } => {
                if error.is_unauthorized() {
                    session.clear();
                }
                let message = error.to_string();
                match op {
                    BackendOp::SignIn | BackendOp::MagicLink | BackendOp::SignOut => {
                        session.pending = false;
                        session.error = Some(message);
                    }
                    BackendOp::Submissions | BackendOp::Decide => {
                        moderation.loading = false;
                        moderation.error = Some(message);
                    }
                    BackendOp::Entitlements => toggles.error = Some(message),
                    BackendOp::Profile | BackendOp::Brand | BackendOp::Points => {
                        if let Some(member) = member.as_deref_mut() {
                            member.error = Some(message);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendPlugin;
    use crate::backend::error::BackendError;
    use crate::backend::types::{Brand, PointEvent, Session, SessionUser};
    use bevy::ecs::message::Messages;
    use std::sync::mpsc::Sender;

    struct Harness {
        app: App,
        results: Sender<BackendResult>,
        commands: Receiver<BackendCommand>,
    }

    /// App with the backend systems but a hand-driven worker.
    fn harness() -> Harness {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(BackendPlugin::without_worker());

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (res_tx, res_rx) = mpsc::channel();
        app.insert_resource(BackendChannels {
            cmd_tx,
            res_rx: Arc::new(Mutex::new(res_rx)),
        });
        app.insert_resource(MemberData::new(RowWatch::new(Duration::from_secs(3600))));
        let changes = {
            let mut session = app.world_mut().resource_mut::<SessionState>();
            install_session_listener(&mut session)
        };
        app.insert_resource(changes);

        Harness {
            app,
            results: res_tx,
            commands: cmd_rx,
        }
    }

    fn session(user: &str) -> Session {
        Session {
            access_token: format!("token-{}", user),
            refresh_token: None,
            expires_at: None,
            user: SessionUser {
                id: user.to_string(),
                email: Some(format!("{}@example.com", user)),
            },
        }
    }

    fn drain(rx: &Receiver<BackendCommand>) -> Vec<BackendCommand> {
        rx.try_iter().collect()
    }

    #[test]
    fn sign_in_loads_member_data() {
        let mut h = harness();
        h.results.send(BackendResult::SignedIn(session("u1"))).unwrap();
        h.app.update();
        h.app.update();

        let sent = drain(&h.commands);
        assert!(sent.iter().any(|c| matches!(c, BackendCommand::FetchProfile { user_id, .. } if user_id == "u1")));
        assert!(sent.iter().any(|c| matches!(c, BackendCommand::FetchPoints { .. })));
        assert!(sent.iter().any(|c| matches!(c, BackendCommand::FetchEntitlements { .. })));
        assert!(sent.iter().any(|c| matches!(c, BackendCommand::FetchBrand { owner_id, .. } if owner_id == "u1")));

        h.results
            .send(BackendResult::Points(vec![
                PointEvent { amount: 150, reason: None },
                PointEvent { amount: 100, reason: None },
            ]))
            .unwrap();
        h.app.update();
        let member = h.app.world().resource::<MemberData>();
        assert_eq!(member.experience, 250);
        assert_eq!(member.level(), 2);
    }

    #[test]
    fn brand_updates_become_messages() {
        let mut h = harness();
        h.results.send(BackendResult::SignedIn(session("u1"))).unwrap();
        h.app.update();
        h.app.update();

        let brand = |name: &str| Brand {
            id: "b1".to_string(),
            owner_id: "u1".to_string(),
            name: name.to_string(),
            status: None,
            website: None,
            updated_at: None,
        };
        h.results
            .send(BackendResult::Brand { owner_id: "u1".to_string(), brand: Some(brand("Leafy")) })
            .unwrap();
        h.results
            .send(BackendResult::Brand { owner_id: "u1".to_string(), brand: Some(brand("Leafy Co")) })
            .unwrap();
        h.app.update();

        let messages = h.app.world().resource::<Messages<BrandChanged>>();
        let mut cursor = messages.get_cursor();
        let changes: Vec<_> = cursor.read(messages).map(|m| m.0.clone()).collect();
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], RowChange::Updated { new, .. } if new.name == "Leafy Co"));
    }

    #[test]
    fn failed_toggle_is_reverted() {
        let mut h = harness();
        h.results.send(BackendResult::SignedIn(session("u1"))).unwrap();
        h.app.update();
        drain(&h.commands);

        h.app.world_mut().write_message(BackendRequest::ToggleEntitlement {
            module: "analytics".to_string(),
        });
        h.app.update();
        assert!(h.app.world().resource::<EntitlementToggles>().is_enabled("analytics"));

        let generation = drain(&h.commands)
            .into_iter()
            .find_map(|c| match c {
                BackendCommand::UpsertEntitlement { row, generation, .. } => {
                    assert!(row.enabled());
                    Some(generation)
                }
                _ => None,
            })
            .expect("upsert queued");

        h.results
            .send(BackendResult::EntitlementFailed {
                module: "analytics".to_string(),
                generation,
                error: BackendError::Conflict("nope".to_string()),
            })
            .unwrap();
        h.app.update();
        let toggles = h.app.world().resource::<EntitlementToggles>();
        assert!(!toggles.is_enabled("analytics"));
        assert!(toggles.error.is_some());
    }

    #[test]
    fn unauthorized_clears_session() {
        let mut h = harness();
        h.results.send(BackendResult::SignedIn(session("u1"))).unwrap();
        h.app.update();
        h.results
            .send(BackendResult::Failed {
                op: BackendOp::Profile,
                error: BackendError::Unauthorized("JWT expired".to_string()),
            })
            .unwrap();
        h.app.update();
        assert!(h.app.world().resource::<SessionState>().current().is_none());
    }

    #[test]
    fn expired_session_is_cleared_before_request() {
        let mut h = harness();
        let mut expired = session("u1");
        expired.expires_at = Some(1);
        h.results.send(BackendResult::SignedIn(expired)).unwrap();
        h.app.update();
        drain(&h.commands);

        h.app.world_mut().write_message(BackendRequest::RefreshModeration);
        h.app.update();
        assert!(drain(&h.commands).is_empty());
        let session = h.app.world().resource::<SessionState>();
        assert!(session.current().is_none());
        assert_eq!(session.error.as_deref(), Some("Session expired, sign in again"));
    }

    #[test]
    fn requests_without_session_need_sign_in() {
        let mut h = harness();
        h.app.world_mut().write_message(BackendRequest::RefreshModeration);
        h.app.update();
        assert!(drain(&h.commands).is_empty());
        assert_eq!(
            h.app.world().resource::<SessionState>().error.as_deref(),
            Some("Sign in required")
        );
    }
}
