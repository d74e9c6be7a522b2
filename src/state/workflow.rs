use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    dao::models::{CollectionKey, RecordId, WorkflowStatus},
    state::notice::{Notice, NoticeKind, NoticeLevel},
};

/// Approval workflows tracked per `(entity, user)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    /// Request to join a community, stored in `communityRequests`.
    CommunityJoin,
    /// Registration to a tournament, stored in `registrations`.
    TournamentRegistration,
}

impl WorkflowKind {
    /// Collection holding the requests of this kind.
    pub fn collection(self) -> CollectionKey {
        match self {
            WorkflowKind::CommunityJoin => CollectionKey::CommunityRequests,
            WorkflowKind::TournamentRegistration => CollectionKey::Registrations,
        }
    }

    /// Terminal status reached when the request is accepted.
    pub fn accepted_status(self) -> WorkflowStatus {
        match self {
            WorkflowKind::CommunityJoin => WorkflowStatus::Approved,
            WorkflowKind::TournamentRegistration => WorkflowStatus::Confirmed,
        }
    }

    /// Path segment naming the workflow.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowKind::CommunityJoin => "community-join",
            WorkflowKind::TournamentRegistration => "tournament-registration",
        }
    }

    fn subject(self, entity: &RecordId) -> String {
        match self {
            WorkflowKind::CommunityJoin => format!("request to join community {entity}"),
            WorkflowKind::TournamentRegistration => {
                format!("registration for tournament {entity}")
            }
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a path segment names no workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown workflow `{0}`")]
pub struct UnknownWorkflow(pub String);

impl FromStr for WorkflowKind {
    type Err = UnknownWorkflow;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "community-join" | "communityRequests" => Ok(WorkflowKind::CommunityJoin),
            "tournament-registration" | "registrations" => {
                Ok(WorkflowKind::TournamentRegistration)
            }
            other => Err(UnknownWorkflow(other.to_string())),
        }
    }
}

/// Decision taken by an organiser on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Accept the request.
    Approve,
    /// Turn the request down.
    Reject,
}

impl FromStr for Decision {
    type Err = UnknownWorkflow;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approve" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            other => Err(UnknownWorkflow(other.to_string())),
        }
    }
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {decision:?} cannot be applied while {from}")]
pub struct InvalidTransition {
    /// The status the request was in when the decision arrived.
    pub from: WorkflowStatus,
    /// The decision that cannot be applied from this status.
    pub decision: Decision,
}

/// Transition table of the approval workflows.
///
/// `pending` is the only initial state; both accepted and rejected are
/// terminal.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowMachine {
    kind: WorkflowKind,
}

impl WorkflowMachine {
    /// Machine for `kind`.
    pub fn new(kind: WorkflowKind) -> Self {
        Self { kind }
    }

    /// Workflow the machine applies to.
    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// Status reached by applying `decision` to a request in status `from`.
    pub fn apply(
        &self,
        from: WorkflowStatus,
        decision: Decision,
    ) -> Result<WorkflowStatus, InvalidTransition> {
        match (from, decision) {
            (WorkflowStatus::Pending, Decision::Approve) => Ok(self.kind.accepted_status()),
            (WorkflowStatus::Pending, Decision::Reject) => Ok(WorkflowStatus::Rejected),
            (from, decision) => Err(InvalidTransition { from, decision }),
        }
    }
}

/// Classification of an observed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowOutcome {
    /// The request was accepted.
    Approved,
    /// The request was turned down.
    Rejected,
    /// Any other status move.
    Changed,
}

/// One user-facing notification about a request the user is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowNotice {
    /// Classification of the move.
    pub outcome: WorkflowOutcome,
    /// Status before the move.
    pub from: WorkflowStatus,
    /// Status after the move; `None` when the request disappeared.
    pub to: Option<WorkflowStatus>,
}

impl WorkflowNotice {
    fn classify(from: WorkflowStatus, to: Option<WorkflowStatus>) -> Self {
        let outcome = match to {
            Some(WorkflowStatus::Approved | WorkflowStatus::Confirmed) => {
                WorkflowOutcome::Approved
            }
            Some(WorkflowStatus::Rejected) => WorkflowOutcome::Rejected,
            Some(WorkflowStatus::Pending) | None => WorkflowOutcome::Changed,
        };
        Self { outcome, from, to }
    }

    /// Render as a notice for the hub.
    pub fn to_notice(&self, kind: WorkflowKind, entity: &RecordId) -> Notice {
        let subject = kind.subject(entity);
        match self.outcome {
            WorkflowOutcome::Approved => Notice::new(
                NoticeLevel::Info,
                NoticeKind::WorkflowApproved,
                format!("Your {subject} was approved."),
            ),
            WorkflowOutcome::Rejected => Notice::new(
                NoticeLevel::Warning,
                NoticeKind::WorkflowRejected,
                format!("Your {subject} was declined."),
            ),
            WorkflowOutcome::Changed => {
                let to = self
                    .to
                    .map_or_else(|| "withdrawn".to_string(), |status| status.to_string());
                Notice::new(
                    NoticeLevel::Info,
                    NoticeKind::WorkflowChanged,
                    format!("Your {subject} is now {to}."),
                )
            }
        }
    }
}

/// Last-observed comparator behind the tracker.
///
/// The first observation only primes the comparator, so a status already
/// settled before tracking started never notifies.
#[derive(Debug, Default, Clone)]
pub struct StatusObserver {
    last: Option<WorkflowStatus>,
}

impl StatusObserver {
    /// Last status observed.
    pub fn last(&self) -> Option<WorkflowStatus> {
        self.last
    }

    /// Record `current` and classify it against the previous observation.
    pub fn observe(&mut self, current: Option<WorkflowStatus>) -> Option<WorkflowNotice> {
        let previous = std::mem::replace(&mut self.last, current);
        match previous {
            Some(from) if Some(from) != current => Some(WorkflowNotice::classify(from, current)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_sequence_notifies_once_on_confirmation() {
        let mut observer = StatusObserver::default();
        let notices: Vec<_> = [
            None,
            Some(WorkflowStatus::Pending),
            Some(WorkflowStatus::Pending),
            Some(WorkflowStatus::Confirmed),
        ]
        .into_iter()
        .filter_map(|status| observer.observe(status))
        .collect();

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].outcome, WorkflowOutcome::Approved);
        assert_eq!(notices[0].from, WorkflowStatus::Pending);
    }

    #[test]
    fn first_observation_never_notifies() {
        let mut observer = StatusObserver::default();
        assert!(observer.observe(Some(WorkflowStatus::Rejected)).is_none());
        assert!(observer.observe(Some(WorkflowStatus::Rejected)).is_none());
    }

    #[test]
    fn removed_request_is_a_change() {
        let mut observer = StatusObserver::default();
        observer.observe(Some(WorkflowStatus::Pending));
        let notice = observer.observe(None).unwrap();
        assert_eq!(notice.outcome, WorkflowOutcome::Changed);

        let rendered = notice.to_notice(WorkflowKind::CommunityJoin, &RecordId::Number(3));
        assert_eq!(rendered.kind, NoticeKind::WorkflowChanged);
        assert!(rendered.message.contains("withdrawn"));
    }

    #[test]
    fn machine_accepts_only_from_pending() {
        let joins = WorkflowMachine::new(WorkflowKind::CommunityJoin);
        assert_eq!(
            joins.apply(WorkflowStatus::Pending, Decision::Approve),
            Ok(WorkflowStatus::Approved)
        );

        let registrations = WorkflowMachine::new(WorkflowKind::TournamentRegistration);
        assert_eq!(
            registrations.apply(WorkflowStatus::Pending, Decision::Approve),
            Ok(WorkflowStatus::Confirmed)
        );
        assert_eq!(
            registrations.apply(WorkflowStatus::Pending, Decision::Reject),
            Ok(WorkflowStatus::Rejected)
        );

        let err = registrations
            .apply(WorkflowStatus::Rejected, Decision::Approve)
            .unwrap_err();
        assert_eq!(err.from, WorkflowStatus::Rejected);
    }

    #[test]
    fn kinds_parse_from_path_segments() {
        assert_eq!(
            "community-join".parse::<WorkflowKind>(),
            Ok(WorkflowKind::CommunityJoin)
        );
        assert_eq!(
            "registrations".parse::<WorkflowKind>(),
            Ok(WorkflowKind::TournamentRegistration)
        );
        assert!("votes".parse::<WorkflowKind>().is_err());
    }
}
