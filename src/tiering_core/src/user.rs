use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::UNKNOWN_CREATOR;
use crate::tier::Tier;
use crate::{Points, UserId};

/// A registered user and their running total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    #[serde(alias = "username", alias = "name")]
    pub display_name: String,

    #[serde(default, alias = "points")]
    pub total_points: Points,
}

impl User {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        User {
            id,
            display_name: display_name.into(),
            total_points: 0,
        }
    }

    pub fn with_total(mut self, total_points: Points) -> Self {
        self.total_points = total_points;
        self
    }
}

/// Author of a bet or event.
///
/// Feeds send creators either as a bare name or as a profile object; both
/// deserialize into this one shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawCreator")]
pub struct Creator {
    pub id: Option<UserId>,
    pub display_name: String,
}

impl Creator {
    pub fn new(id: Option<UserId>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let display_name = if display_name.trim().is_empty() {
            UNKNOWN_CREATOR.to_string()
        } else {
            display_name
        };
        Creator { id, display_name }
    }

    pub fn unknown() -> Self {
        Creator::new(None, UNKNOWN_CREATOR)
    }
}

impl Default for Creator {
    fn default() -> Self {
        Creator::unknown()
    }
}

impl From<&User> for Creator {
    fn from(user: &User) -> Self {
        Creator::new(Some(user.id), user.display_name.clone())
    }
}

impl fmt::Display for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCreator {
    Name(String),
    Profile(CreatorProfile),
    Missing(Option<()>),
}

#[derive(Deserialize)]
struct CreatorProfile {
    #[serde(default)]
    id: Option<UserId>,
    #[serde(default, alias = "display_name", alias = "name")]
    username: Option<String>,
}

impl From<RawCreator> for Creator {
    fn from(raw: RawCreator) -> Self {
        match raw {
            RawCreator::Name(name) => Creator::new(None, name),
            RawCreator::Profile(profile) => {
                Creator::new(profile.id, profile.username.unwrap_or_default())
            }
            RawCreator::Missing(_) => Creator::unknown(),
        }
    }
}

/// Derived, read-only row of the leaderboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(rename = "id")]
    pub user_id: UserId,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "points")]
    pub total_points: Points,
}

/// One user's position, read from a single ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub user_id: UserId,
    pub display_name: String,
    pub rank: usize,
    pub tier: Tier,
    pub total_points: Points,
    pub population: usize,
}
