//! Backend worker thread
//!
//! Owns a Tokio runtime and one HTTP client; executes commands in the order
//! they were queued and sends one result per command.

use bevy::log::{error, info, warn};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use crate::backend::client::BackendClient;
use crate::backend::error::BackendError;
use crate::backend::types::{
    BackendChannels, BackendCommand, BackendConfig, BackendOp, BackendResult, Brand, Profile,
};

/// Start the background backend worker thread
pub fn start_backend_worker(config: &BackendConfig) -> BackendChannels {
    let (cmd_tx, cmd_rx) = mpsc::channel::<BackendCommand>();
    let (res_tx, res_rx) = mpsc::channel::<BackendResult>();
    let base_url = config.base_url.clone();
    let api_key = config.api_key.clone();

    thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(err) => {
                error!("[BACKEND] could not start runtime: {}", err);
                return;
            }
        };
        rt.block_on(async move {
            let client = BackendClient::new(reqwest::Client::new(), &base_url, &api_key);
            while let Ok(cmd) = cmd_rx.recv() {
                let result = execute(&client, cmd).await;
                if let BackendResult::Failed { op, error } = &result {
                    warn!("[BACKEND] {:?} failed: {}", op, error);
                }
                if res_tx.send(result).is_err() {
                    break;
                }
            }
            info!("[BACKEND] worker stopped");
        });
    });

    BackendChannels {
        cmd_tx,
        res_rx: Arc::new(Mutex::new(res_rx)),
    }
}

fn failed(op: BackendOp) -> impl FnOnce(BackendError) -> BackendResult {
    move |error| BackendResult::Failed { op, error }
}

async fn execute(client: &BackendClient, cmd: BackendCommand) -> BackendResult {
    match cmd {
        BackendCommand::SignInWithPassword { email, password } => client
            .sign_in_with_password(&email, &password)
            .await
            .map(BackendResult::SignedIn)
            .unwrap_or_else(failed(BackendOp::SignIn)),
        BackendCommand::SendMagicLink { email } => match client.send_magic_link(&email).await {
            Ok(()) => BackendResult::MagicLinkSent { email },
            Err(error) => BackendResult::Failed {
                op: BackendOp::MagicLink,
                error,
            },
        },
        BackendCommand::SignOut { token } => client
            .sign_out(&token)
            .await
            .map(|_| BackendResult::SignedOut)
            .unwrap_or_else(failed(BackendOp::SignOut)),
        BackendCommand::FetchProfile { user_id, token } => client
            .fetch_one::<Profile>("profiles", "id", &user_id, &token)
            .await
            .map(BackendResult::Profile)
            .unwrap_or_else(failed(BackendOp::Profile)),
        BackendCommand::FetchBrand { owner_id, token } => {
            match client
                .fetch_one::<Brand>("brands", "owner_id", &owner_id, &token)
                .await
            {
                Ok(brand) => BackendResult::Brand { owner_id, brand },
                Err(error) => BackendResult::Failed {
                    op: BackendOp::Brand,
                    error,
                },
            }
        }
        BackendCommand::FetchPoints { user_id, token } => client
            .fetch_point_events(&user_id, &token)
            .await
            .map(BackendResult::Points)
            .unwrap_or_else(failed(BackendOp::Points)),
        BackendCommand::FetchEntitlements { user_id, token } => client
            .fetch_entitlements(&user_id, &token)
            .await
            .map(BackendResult::Entitlements)
            .unwrap_or_else(failed(BackendOp::Entitlements)),
        BackendCommand::UpsertEntitlement {
            row,
            token,
            generation,
        } => match client.upsert_entitlement(&row, &token).await {
            Ok(saved) => BackendResult::EntitlementSaved {
                row: saved,
                generation,
            },
            Err(error) => BackendResult::EntitlementFailed {
                module: row.module,
                generation,
                error,
            },
        },
        BackendCommand::ListPendingSubmissions { token } => client
            .list_pending_submissions(&token)
            .await
            .map(BackendResult::Submissions)
            .unwrap_or_else(failed(BackendOp::Submissions)),
        BackendCommand::DecideSubmission {
            submission,
            decision,
            token,
        } => client
            .decide_submission(&submission.id, &decision, &token)
            .await
            .map(BackendResult::SubmissionDecided)
            .unwrap_or_else(failed(BackendOp::Decide)),
    }
}
