//! DTOs of the workflow endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{dto::validation::validate_identity, services::workflow_tracker::WorkflowEntry};

/// Request filed by a user for a community or a tournament.
#[derive(Debug, Deserialize, Validate)]
pub struct WorkflowRequestInput {
    #[validate(custom(function = validate_identity))]
    pub user_id: String,
}

/// Every request filed for one community or tournament.
#[derive(Debug, Serialize)]
pub struct WorkflowEntriesResponse {
    pub entries: Vec<WorkflowEntry>,
}
