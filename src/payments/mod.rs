//! Billing: order creation and capture through the payment functions

use bevy::prelude::*;
use std::sync::{
    Arc, Mutex,
    mpsc::{self, Receiver, Sender},
};
use std::thread;

pub mod checkout;
pub mod client;

pub use checkout::{Checkout, CheckoutStage};

use crate::backend::error::BackendError;
use crate::settings::AppSettings;
use client::PaymentsClient;

#[derive(Debug)]
pub enum PaymentsCommand {
    CreateOrder { product_id: String },
    CaptureOrder { order_id: String },
}

#[derive(Debug)]
pub enum PaymentsResult {
    OrderCreated { product_id: String, order_id: String },
    Captured { order_id: String, completed: bool, status: String },
    Failed { error: BackendError },
}

#[derive(Resource)]
pub struct PaymentsChannels {
    pub cmd_tx: Sender<PaymentsCommand>,
    pub res_rx: Arc<Mutex<Receiver<PaymentsResult>>>,
}

#[derive(Resource, Debug, Clone)]
pub struct PaymentsConfig {
    /// Base URL of the create-order / capture-order functions
    pub base_url: String,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8888/.netlify/functions".to_string(),
        }
    }
}

impl From<&AppSettings> for PaymentsConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            base_url: settings.payments_url.clone(),
        }
    }
}

/// What the billing view asks for
#[derive(Message, Clone, Debug, PartialEq)]
pub enum CheckoutRequest {
    Start { product_id: String },
    /// The buyer approved the order with the provider.
    Approved,
    Cancel,
}

/// Plugin for the checkout flow
pub struct PaymentsPlugin {
    spawn_worker: bool,
}

impl Default for PaymentsPlugin {
    fn default() -> Self {
        Self { spawn_worker: true }
    }
}

impl PaymentsPlugin {
    pub fn without_worker() -> Self {
        Self {
            spawn_worker: false,
        }
    }
}

impl Plugin for PaymentsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Checkout>()
            .add_message::<CheckoutRequest>()
            .add_systems(
                Update,
                (dispatch_checkout_requests, apply_payments_results).chain(),
            );
        if self.spawn_worker {
            app.add_systems(Startup, setup_payments_worker);
        }
    }
}

pub fn start_payments_worker(config: &PaymentsConfig) -> PaymentsChannels {
    let (cmd_tx, cmd_rx) = mpsc::channel::<PaymentsCommand>();
    let (res_tx, res_rx) = mpsc::channel::<PaymentsResult>();
    let base_url = config.base_url.clone();

    thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(err) => {
                error!("[PAYMENTS] could not start runtime: {}", err);
                return;
            }
        };
        rt.block_on(async move {
            let client = PaymentsClient::new(reqwest::Client::new(), &base_url);
            while let Ok(cmd) = cmd_rx.recv() {
                let result = match cmd {
                    PaymentsCommand::CreateOrder { product_id } => {
                        match client.create_order(&product_id).await {
                            Ok(order_id) => {
                                info!("[PAYMENTS] created order {} for {}", order_id, product_id);
                                PaymentsResult::OrderCreated {
                                    product_id,
                                    order_id,
                                }
                            }
                            Err(error) => PaymentsResult::Failed { error },
                        }
                    }
                    PaymentsCommand::CaptureOrder { order_id } => {
                        match client.capture_order(&order_id).await {
                            Ok(outcome) => PaymentsResult::Captured {
                                completed: outcome.is_completed(),
                                status: outcome.status,
                                order_id,
                            },
                            Err(error) => PaymentsResult::Failed { error },
                        }
                    }
                };
                if let PaymentsResult::Failed { error } = &result {
                    warn!("[PAYMENTS] {}", error);
                }
                if res_tx.send(result).is_err() {
                    break;
                }
            }
        });
    });

    PaymentsChannels {
        cmd_tx,
        res_rx: Arc::new(Mutex::new(res_rx)),
    }
}

fn setup_payments_worker(mut commands: Commands, settings: Res<AppSettings>) {
    let config = PaymentsConfig::from(&*settings);
    commands.insert_resource(start_payments_worker(&config));
    info!("[INIT] Payments worker started for {}", config.base_url);
    commands.insert_resource(config);
}

pub fn dispatch_checkout_requests(
    mut requests: MessageReader<CheckoutRequest>,
    channels: Option<Res<PaymentsChannels>>,
    mut checkout: ResMut<Checkout>,
) {
    let Some(channels) = channels else { return };
    for request in requests.read() {
        let cmd = match request {
            CheckoutRequest::Start { product_id } => {
                if !checkout.begin(product_id) {
                    continue;
                }
                PaymentsCommand::CreateOrder {
                    product_id: product_id.clone(),
                }
            }
            CheckoutRequest::Approved => match checkout.approve() {
                Some(order_id) => PaymentsCommand::CaptureOrder { order_id },
                None => continue,
            },
            CheckoutRequest::Cancel => {
                checkout.cancel();
                continue;
            }
        };
        if let Err(err) = channels.cmd_tx.send(cmd) {
            checkout.fail(format!("Failed to queue payment request: {}", err));
        }
    }
}

pub fn apply_payments_results(channels: Option<Res<PaymentsChannels>>, mut checkout: ResMut<Checkout>) {
    let Some(channels) = channels else { return };
    let Ok(guard) = channels.res_rx.lock() else {
        return;
    };
    while let Ok(msg) = guard.try_recv() {
        match msg {
            PaymentsResult::OrderCreated {
                product_id,
                order_id,
            } => checkout.order_created(&product_id, order_id),
            PaymentsResult::Captured {
                order_id,
                completed,
                status,
            } => {
                checkout.captured(&order_id, completed, &status);
                if completed {
                    info!("[PAYMENTS] order {} captured", order_id);
                }
            }
            PaymentsResult::Failed { error } => checkout.fail(error.to_string()),
        }
    }
}
