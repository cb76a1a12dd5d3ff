//! Chore and reward catalog plus the avatar pool, loaded from `config/catalog.toml`.
use std::{fs, path::Path};

use bevy::prelude::*;
use serde::Deserialize;

use super::types::{Chore, Reward};

pub const DEFAULT_CATALOG_PATH: &str = "config/catalog.toml";

#[derive(Debug, Clone, Deserialize, Default)]
struct RawCatalog {
    #[serde(default)]
    chores: Vec<RawChore>,
    #[serde(default)]
    rewards: Vec<RawReward>,
    #[serde(default)]
    avatars: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawChore {
    id: String,
    title: String,
    points: u32,
    #[serde(default = "default_recurring")]
    is_recurring: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawReward {
    id: String,
    title: String,
    cost: u32,
}

fn default_recurring() -> bool {
    true
}

/// Everything a parent can log or redeem, plus avatar references for new children.
#[derive(Resource, Debug, Clone)]
pub struct Catalog {
    chores: Vec<Chore>,
    rewards: Vec<Reward>,
    avatars: Vec<String>,
}

impl Catalog {
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<RawCatalog>(&raw) {
                Ok(parsed) => parsed.into(),
                Err(err) => {
                    warn!(
                        "Failed to parse {} ({}). Falling back to the built-in catalog.",
                        path.display(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                debug!(
                    "No catalog at {} ({}). Using the built-in catalog.",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    pub fn chores(&self) -> &[Chore] {
        &self.chores
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    pub fn avatars(&self) -> &[String] {
        &self.avatars
    }

    pub fn chore(&self, id: &str) -> Option<&Chore> {
        self.chores.iter().find(|chore| chore.id() == id)
    }

    pub fn reward(&self, id: &str) -> Option<&Reward> {
        self.rewards.iter().find(|reward| reward.id() == id)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            chores: default_chores(),
            rewards: default_rewards(),
            avatars: default_avatars(),
        }
    }
}

impl From<RawCatalog> for Catalog {
    fn from(value: RawCatalog) -> Self {
        let mut chores: Vec<Chore> = Vec::new();
        for raw in value.chores {
            match Chore::new(raw.id, raw.title, raw.points, raw.is_recurring) {
                Ok(chore) if chores.iter().any(|known| known.id() == chore.id()) => {
                    warn!("Skipping duplicate chore id {}", chore.id());
                }
                Ok(chore) => chores.push(chore),
                Err(err) => warn!("Skipping catalog chore: {}", err),
            }
        }

        let mut rewards: Vec<Reward> = Vec::new();
        for raw in value.rewards {
            match Reward::new(raw.id, raw.title, raw.cost) {
                Ok(reward) if rewards.iter().any(|known| known.id() == reward.id()) => {
                    warn!("Skipping duplicate reward id {}", reward.id());
                }
                Ok(reward) => rewards.push(reward),
                Err(err) => warn!("Skipping catalog reward: {}", err),
            }
        }

        let avatars: Vec<String> = value
            .avatars
            .iter()
            .map(|avatar| avatar.trim().to_string())
            .filter(|avatar| !avatar.is_empty())
            .collect();

        Self {
            chores: if chores.is_empty() {
                default_chores()
            } else {
                chores
            },
            rewards: if rewards.is_empty() {
                default_rewards()
            } else {
                rewards
            },
            avatars: if avatars.is_empty() {
                default_avatars()
            } else {
                avatars
            },
        }
    }
}

fn default_chores() -> Vec<Chore> {
    [
        ("1", "Make Bed", 10),
        ("2", "Empty Dishwasher", 20),
        ("3", "Take out Trash", 15),
        ("4", "Clean Room", 50),
        ("5", "Homework Completed", 30),
        ("6", "Pet Feeding", 10),
    ]
    .into_iter()
    .filter_map(|(id, title, points)| Chore::new(id, title, points, true).ok())
    .collect()
}

fn default_rewards() -> Vec<Reward> {
    [
        ("r1", "30 Mins Screen Time", 100),
        ("r2", "Select Dinner Menu", 200),
        ("r3", "New Toy/Book", 500),
        ("r4", "Late Bedtime (1hr)", 300),
    ]
    .into_iter()
    .filter_map(|(id, title, cost)| Reward::new(id, title, cost).ok())
    .collect()
}

fn default_avatars() -> Vec<String> {
    (1..=4)
        .map(|index| format!("https://picsum.photos/seed/child{index}/200"))
        .collect()
}
