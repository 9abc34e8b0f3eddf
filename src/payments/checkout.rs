//! Checkout flow state

use bevy::prelude::*;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum CheckoutStage {
    #[default]
    Idle,
    Creating { product_id: String },
    /// Order exists; waiting for the buyer to approve it with the provider.
    AwaitingApproval { product_id: String, order_id: String },
    Capturing { order_id: String },
    Completed { order_id: String },
    Failed { message: String },
}

impl CheckoutStage {
    pub fn label(&self) -> &'static str {
        match self {
            CheckoutStage::Idle => "idle",
            CheckoutStage::Creating { .. } => "creating order",
            CheckoutStage::AwaitingApproval { .. } => "awaiting approval",
            CheckoutStage::Capturing { .. } => "capturing",
            CheckoutStage::Completed { .. } => "completed",
            CheckoutStage::Failed { .. } => "failed",
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, CheckoutStage::Creating { .. } | CheckoutStage::Capturing { .. })
    }
}

#[derive(Resource, Debug, Default)]
pub struct Checkout {
    pub stage: CheckoutStage,
}

impl Checkout {
    /// Returns false (and leaves the stage alone) while a call is in flight.
    pub fn begin(&mut self, product_id: &str) -> bool {
        if self.stage.is_busy() || matches!(self.stage, CheckoutStage::AwaitingApproval { .. }) {
            warn!("[PAYMENTS] checkout already {}", self.stage.label());
            return false;
        }
        self.stage = CheckoutStage::Creating {
            product_id: product_id.to_string(),
        };
        true
    }

    pub fn order_created(&mut self, product_id: &str, order_id: String) {
        match &self.stage {
            CheckoutStage::Creating { product_id: p } if p == product_id => {
                self.stage = CheckoutStage::AwaitingApproval {
                    product_id: product_id.to_string(),
                    order_id,
                };
            }
            other => warn!("[PAYMENTS] order {} arrived while {}", order_id, other.label()),
        }
    }

    /// Buyer approved; returns the order to capture.
    pub fn approve(&mut self) -> Option<String> {
        let CheckoutStage::AwaitingApproval { order_id, .. } = &self.stage else {
            warn!("[PAYMENTS] nothing to capture while {}", self.stage.label());
            return None;
        };
        let order_id = order_id.clone();
        self.stage = CheckoutStage::Capturing {
            order_id: order_id.clone(),
        };
        Some(order_id)
    }

    pub fn captured(&mut self, order_id: &str, completed: bool, status: &str) {
        match &self.stage {
            CheckoutStage::Capturing { order_id: o } if o == order_id => {
                self.stage = if completed {
                    CheckoutStage::Completed {
                        order_id: order_id.to_string(),
                    }
                } else {
                    CheckoutStage::Failed {
                        message: format!("payment not completed ({})", status),
                    }
                };
            }
            other => warn!("[PAYMENTS] capture for {} arrived while {}", order_id, other.label()),
        }
    }

    pub fn fail(&mut self, message: String) {
        if self.stage.is_busy() {
            self.stage = CheckoutStage::Failed { message };
        } else {
            warn!("[PAYMENTS] ignoring failure while {}: {}", self.stage.label(), message);
        }
    }

    pub fn cancel(&mut self) {
        if !self.stage.is_busy() {
            self.stage = CheckoutStage::Idle;
        }
    }
}
