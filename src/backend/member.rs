//! Signed-in member data as last fetched

use bevy::prelude::*;

use crate::backend::live::{RowChange, RowWatch};
use crate::backend::types::{Brand, PointEvent, Profile, Submission, SubmissionStatus};
use crate::backend::types::ModerationDecision;
use crate::backend::error::BackendError;

pub const XP_PER_LEVEL_STEP: i64 = 100;

/// Sum of all point events
pub fn total_experience(events: &[PointEvent]) -> i64 {
    events.iter().fold(0i64, |acc, e| acc.saturating_add(e.amount))
}

/// Level 1 starts at 0 XP; each level needs quadratically more.
pub fn level_for(xp: i64) -> u32 {
    if xp <= 0 {
        return 1;
    }
    ((xp as f64 / XP_PER_LEVEL_STEP as f64).sqrt().floor() as u32) + 1
}

#[derive(Resource, Debug)]
pub struct MemberData {
    pub profile: Option<Profile>,
    pub brand: RowWatch<Brand>,
    pub experience: i64,
    pub error: Option<String>,
}

impl MemberData {
    pub fn new(watch: RowWatch<Brand>) -> Self {
        Self {
            profile: None,
            brand: watch,
            experience: 0,
            error: None,
        }
    }

    pub fn level(&self) -> u32 {
        level_for(self.experience)
    }

    pub fn clear(&mut self) {
        self.profile = None;
        self.brand.watch(None);
        self.experience = 0;
        self.error = None;
    }

    pub fn set_points(&mut self, events: &[PointEvent]) {
        self.experience = total_experience(events);
    }

    pub fn observe_brand(&mut self, owner_id: &str, brand: Option<Brand>) -> Option<RowChange<Brand>> {
        self.brand.observe(owner_id, brand)
    }
}

/// Admin moderation queue
#[derive(Resource, Debug, Default)]
pub struct ModerationQueue {
    pub pending: Vec<Submission>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ModerationQueue {
    pub fn replace(&mut self, submissions: Vec<Submission>) {
        self.pending = submissions
            .into_iter()
            .filter(|s| s.status == SubmissionStatus::Pending)
            .collect();
        self.loading = false;
        self.error = None;
    }

    pub fn resolved(&mut self, decided: &Submission) {
        self.pending.retain(|s| s.id != decided.id);
    }
}

/// Local check before sending a decision: only pending submissions can be decided.
pub fn validate_decision(submission: &Submission, decision: &ModerationDecision) -> Result<(), BackendError> {
    if submission.status != SubmissionStatus::Pending {
        return Err(BackendError::Conflict(format!(
            "submission {} is already {:?}",
            submission.id, submission.status
        )));
    }
    if let ModerationDecision::Reject { reason: Some(reason) } = decision
        && reason.trim().is_empty()
    {
        return Err(BackendError::Conflict("rejection reason is blank".to_string()));
    }
    Ok(())
}
