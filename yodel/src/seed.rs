//! Users, devices, groups and copy headers loaded into the in-memory
//! directory at startup, plus the outbox of Yos submitted once it is up.
//!
//! Everything refers to users by username; [`Roster`] maps those to the ids
//! they were given.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use yodel_common::{Endpoint, Header, Platform, User, UserId, Yo};
use yodel_store::{MemoryDirectory, MemoryHeaders, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Unknown username {0}")]
    UnknownUsername(String),

    #[error("Username {0} is taken")]
    DuplicateUsername(String),

    #[error("Invalid headers: {0}")]
    Headers(#[from] StoreError),

    #[error("Outbox entry from {0} has no recipient")]
    NoRecipient(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub headers: Vec<Header>,

    #[serde(default)]
    pub users: Vec<SeedUser>,

    #[serde(default)]
    pub groups: Vec<SeedGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Reachable by SMS only
    #[serde(default)]
    pub pseudo: bool,
    #[serde(default)]
    pub service: bool,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub devices: Vec<SeedDevice>,
    /// Usernames this user follows
    #[serde(default)]
    pub follows: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedDevice {
    pub platform: Platform,
    pub token: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedGroup {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub members: Vec<String>,
}

/// Usernames mapped to the ids they were given
#[derive(Debug, Default, Clone)]
pub struct Roster(HashMap<String, UserId>);

impl Roster {
    pub fn id(&self, username: &str) -> Result<UserId, SeedError> {
        self.0
            .get(username)
            .copied()
            .ok_or_else(|| SeedError::UnknownUsername(username.to_string()))
    }

    fn ids(&self, usernames: &[String]) -> Result<Vec<UserId>, SeedError> {
        usernames.iter().map(|username| self.id(username)).collect()
    }

    fn add(&mut self, directory: &MemoryDirectory, user: User) -> Result<UserId, SeedError> {
        if self.0.contains_key(&user.username) {
            return Err(SeedError::DuplicateUsername(user.username));
        }

        let username = user.username.clone();
        let id = directory.add_user(user);
        self.0.insert(username, id);
        Ok(id)
    }
}

impl Seed {
    /// Adds every user, device, group and follow to `directory`
    pub fn load(&self, directory: &MemoryDirectory) -> Result<Roster, SeedError> {
        let mut roster = Roster::default();

        for seeded in &self.users {
            let mut user = match &seeded.phone {
                Some(phone) if seeded.pseudo => User::pseudo(&seeded.username, phone),
                _ => User::new(&seeded.username),
            };
            user.display_name.clone_from(&seeded.display_name);
            user.phone.clone_from(&seeded.phone);
            user.is_service = seeded.service;
            user.callback_url.clone_from(&seeded.callback_url);

            let id = roster.add(directory, user)?;

            for device in &seeded.devices {
                let mut endpoint = Endpoint::new(id, device.platform, &device.token);
                endpoint.app_version.clone_from(&device.version);
                endpoint.app_id.clone_from(&device.app_id);
                directory.register_endpoint(endpoint);
            }
        }

        for group in &self.groups {
            let mut user = User::new(&group.name);
            user.display_name.clone_from(&group.display_name);

            let id = roster.add(directory, user)?;
            directory.set_group(id, roster.ids(&group.members)?);
        }

        for seeded in &self.users {
            let follower = roster.id(&seeded.username)?;
            for followed in &seeded.follows {
                directory.follow(follower, roster.id(followed)?);
            }
        }

        Ok(roster)
    }

    pub fn headers(&self) -> Result<MemoryHeaders, SeedError> {
        Ok(MemoryHeaders::load(self.headers.iter().cloned())?)
    }
}

/// A Yo to submit once the service is running
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxYo {
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub group: Option<String>,
    /// To every follower of `from`
    #[serde(default)]
    pub broadcast: bool,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub location: Option<(f64, f64)>,
    #[serde(default)]
    pub push_only: bool,
    /// Send at this time rather than straight away
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

impl OutboxYo {
    pub fn to_yo(&self, roster: &Roster, schedule: &str) -> Result<Yo, SeedError> {
        let sender = roster.id(&self.from)?;

        let mut yo = if self.broadcast {
            Yo::broadcast(sender)
        } else if let Some(group) = &self.group {
            Yo::to_group(sender, roster.id(group)?)
        } else {
            match roster.ids(&self.to)?.as_slice() {
                [] => return Err(SeedError::NoRecipient(self.from.clone())),
                [recipient] => Yo::to(sender, *recipient),
                recipients => Yo::to_many(sender, recipients.to_vec()),
            }
        };

        if let Some(link) = &self.link {
            yo = yo.with_link(link);
        }

        if let Some(text) = &self.text {
            yo = yo.with_text(text);
        }

        if let Some((lat, lng)) = self.location {
            yo = yo.with_location(lat, lng);
        }

        if self.push_only {
            yo = yo.push_only();
        }

        if let Some(at) = self.at {
            yo = yo.scheduled(at, schedule);
        }

        Ok(yo)
    }
}
