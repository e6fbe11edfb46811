use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{EngineError, Result};
use crate::user::Creator;
use crate::{Points, UserId};

pub type EventId = u64;

/// A scheduled event carrying a signed reward for each participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub creator: Creator,

    #[serde(
        default,
        alias = "eventDate",
        deserialize_with = "crate::feed_time::deserialize_optional"
    )]
    pub scheduled_for: Option<DateTime<Utc>>,

    /// Points applied to each participant; negative for mandatory costs
    pub reward: Points,

    /// Users whose ledger already received the reward
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub claimed_by: BTreeSet<UserId>,
}

impl Event {
    pub fn new(id: EventId, title: impl Into<String>, creator: Creator, reward: Points) -> Self {
        Event {
            id,
            title: title.into(),
            description: String::new(),
            creator,
            scheduled_for: None,
            reward,
            claimed_by: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn scheduled(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn is_claimed_by(&self, user: UserId) -> bool {
        self.claimed_by.contains(&user)
    }

    pub(crate) fn check_claim(&self, user: UserId) -> Result<()> {
        if self.is_claimed_by(user) {
            return Err(EngineError::AlreadyClaimed {
                event: self.id,
                user,
            });
        }
        Ok(())
    }

    pub(crate) fn mark_claimed(&mut self, user: UserId) {
        self.claimed_by.insert(user);
    }
}
