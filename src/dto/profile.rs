//! DTOs of the profile endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    dao::models::{ExtraFields, ProfileRecord},
    dto::validation::{validate_identity, validate_not_blank},
    services::profile_projector::ProjectionReport,
};

/// Profile fields submitted by the person using the device.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileInput {
    /// Pseudo-identity; the device identity is used when omitted.
    #[validate(custom(function = validate_identity))]
    pub user_id: Option<String>,
    #[validate(length(min = 1, max = 80), custom(function = validate_not_blank))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 80))]
    pub city: Option<String>,
    #[validate(length(max = 80))]
    pub state: Option<String>,
    #[validate(length(max = 80))]
    pub sport: Option<String>,
    #[validate(length(max = 80))]
    pub position: Option<String>,
    #[validate(range(min = 5, max = 120))]
    pub age: Option<u32>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub matches_played: u32,
}

impl From<ProfileInput> for ProfileRecord {
    fn from(input: ProfileInput) -> Self {
        Self {
            user_id: input.user_id.unwrap_or_default(),
            name: input.name.trim().to_string(),
            email: input.email,
            city: input.city,
            state: input.state,
            sport: input.sport,
            position: input.position,
            age: input.age,
            bio: input.bio,
            image: input.image,
            matches_played: input.matches_played,
            extra: ExtraFields::new(),
        }
    }
}

/// Identity of the device and its current profile, if one was saved.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub profile: Option<ProfileRecord>,
}

/// What saving a profile changed in `players`.
#[derive(Debug, Serialize)]
pub struct ProjectionSummary {
    pub added: usize,
    pub updated: usize,
    pub assigned: usize,
}

impl From<ProjectionReport> for ProjectionSummary {
    fn from(report: ProjectionReport) -> Self {
        Self {
            added: report.added,
            updated: report.updated,
            assigned: report.assigned,
        }
    }
}

/// Saved profile and the projection it triggered.
#[derive(Debug, Serialize)]
pub struct ProfileSaveResponse {
    pub profile: ProfileRecord,
    pub projection: ProjectionSummary,
}
