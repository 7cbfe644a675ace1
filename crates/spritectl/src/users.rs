//! User list payload
//!
//! Mirrors the JSON returned by the remote user API. Every field is optional in
//! the payload and falls back to its default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Name of a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserName {
    /// Title (Mr, Ms, Dr, ...)
    pub title: String,
    /// First name
    pub first: String,
    /// Last name
    pub last: String,
}

/// Date of birth of a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirthDate {
    /// Date of birth as sent by the API
    pub date: String,
    /// Age in years
    pub age: u32,
}

/// Picture URLs of a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPicture {
    /// Large picture URL
    pub large: String,
    /// Medium picture URL
    pub medium: String,
    /// Thumbnail URL
    pub thumbnail: String,
}

/// One user record of the payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalUser {
    /// Name
    pub name: UserName,
    /// Date of birth
    pub dob: BirthDate,
    /// Picture URLs
    pub picture: UserPicture,
    /// Email address, unique per user
    pub email: String,
    /// Gender
    pub gender: String,
    /// Phone number
    pub phone: String,
}

/// Payload metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    /// Seed used to generate the data
    pub seed: String,
    /// Number of results
    pub results: u32,
    /// Page number
    pub page: u32,
    /// API version
    pub version: String,
}

/// The full user list payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersData {
    /// User records
    pub results: Vec<FinalUser>,
    /// Metadata
    pub info: Info,
}

impl UsersData {
    /// Parse a payload from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse user list")
    }

    /// Load a payload from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read user list {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// Flattened view of one user, as shown in a list row or detail view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserData {
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email address
    pub email: String,
    /// Gender
    pub gender: String,
    /// Phone number
    pub phone: String,
    /// Age in years
    pub age: u32,
    /// Large picture URL
    pub image_url: String,
    /// Thumbnail URL
    pub thumbnail_url: String,
}

impl UserData {
    /// First and last name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<&FinalUser> for UserData {
    fn from(user: &FinalUser) -> Self {
        Self {
            first_name: user.name.first.clone(),
            last_name: user.name.last.clone(),
            email: user.email.clone(),
            gender: user.gender.clone(),
            phone: user.phone.clone(),
            age: user.dob.age,
            image_url: user.picture.large.clone(),
            thumbnail_url: user.picture.thumbnail.clone(),
        }
    }
}
