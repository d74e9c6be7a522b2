//! Community join requests and tournament registrations: creating them,
//! deciding them and telling the requester when their status moves.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::{
    sync::broadcast::error::RecvError,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        collections::{
            Collection, Communities, CommunityRequests, Registrations, next_numeric_id,
        },
        models::{
            CommunityRequestRecord, Document, RecordId, RegistrationRecord, WorkflowStatus,
        },
        storage::LoadError,
    },
    services::mutator::{self, MutationError},
    state::{
        SharedContext, SyncContext,
        task::PeriodicTask,
        workflow::{Decision, InvalidTransition, StatusObserver, WorkflowKind, WorkflowMachine},
    },
};

/// Failure of a workflow operation. The document is left unchanged.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No request exists for the pair.
    #[error("no {kind} request from `{user_id}` for {entity_id}")]
    NotFound {
        /// Workflow searched.
        kind: WorkflowKind,
        /// Community or tournament searched.
        entity_id: RecordId,
        /// Requester searched.
        user_id: String,
    },
    /// The decision does not apply to the current status.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// The change could not be persisted.
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// Kind-independent view of a request record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEntry {
    /// Identifier of the request record.
    pub id: RecordId,
    /// Workflow the request belongs to.
    pub kind: WorkflowKind,
    /// Community or tournament targeted.
    pub entity_id: RecordId,
    /// Pseudo-identity of the requester.
    pub user_id: String,
    /// Current status.
    pub status: WorkflowStatus,
    /// RFC 3339 time the request was filed.
    pub requested_at: Option<String>,
}

trait WorkflowRecord: Clone {
    fn create(id: RecordId, entity_id: RecordId, user_id: &str) -> Self;
    fn id(&self) -> &RecordId;
    fn entity_id(&self) -> &RecordId;
    fn user_id(&self) -> &str;
    fn status(&self) -> WorkflowStatus;
    fn set_status(&mut self, status: WorkflowStatus);
    fn requested_at(&self) -> Option<&str>;

    fn is_for(&self, entity_id: &RecordId, user_id: &str) -> bool {
        self.entity_id() == entity_id && self.user_id() == user_id
    }

    fn entry(&self, kind: WorkflowKind) -> WorkflowEntry {
        WorkflowEntry {
            id: self.id().clone(),
            kind,
            entity_id: self.entity_id().clone(),
            user_id: self.user_id().to_string(),
            status: self.status(),
            requested_at: self.requested_at().map(str::to_string),
        }
    }
}

macro_rules! workflow_record {
    ($record:ty, $entity:ident) => {
        impl WorkflowRecord for $record {
            fn create(id: RecordId, entity_id: RecordId, user_id: &str) -> Self {
                Self {
                    id,
                    $entity: entity_id,
                    user_id: user_id.to_string(),
                    status: WorkflowStatus::Pending,
                    requested_at: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
                    extra: Default::default(),
                }
            }

            fn id(&self) -> &RecordId {
                &self.id
            }

            fn entity_id(&self) -> &RecordId {
                &self.$entity
            }

            fn user_id(&self) -> &str {
                &self.user_id
            }

            fn status(&self) -> WorkflowStatus {
                self.status
            }

            fn set_status(&mut self, status: WorkflowStatus) {
                self.status = status;
            }

            fn requested_at(&self) -> Option<&str> {
                self.requested_at.as_deref()
            }
        }
    };
}

workflow_record!(RegistrationRecord, tournament_id);
workflow_record!(CommunityRequestRecord, community_id);

/// Current status of the `(entity, user)` request, if any.
pub fn current_status(
    document: &Document,
    kind: WorkflowKind,
    entity_id: &RecordId,
    user_id: &str,
) -> Option<WorkflowStatus> {
    match kind {
        WorkflowKind::CommunityJoin => {
            find(&document.community_requests, entity_id, user_id).map(WorkflowRecord::status)
        }
        WorkflowKind::TournamentRegistration => {
            find(&document.registrations, entity_id, user_id).map(WorkflowRecord::status)
        }
    }
}

/// Every request of `kind` targeting `entity_id`.
pub fn entries(
    document: &Document,
    kind: WorkflowKind,
    entity_id: &RecordId,
) -> Vec<WorkflowEntry> {
    fn collect<R: WorkflowRecord>(
        records: &[R],
        kind: WorkflowKind,
        entity_id: &RecordId,
    ) -> Vec<WorkflowEntry> {
        records
            .iter()
            .filter(|record| record.entity_id() == entity_id)
            .map(|record| record.entry(kind))
            .collect()
    }

    match kind {
        WorkflowKind::CommunityJoin => collect(&document.community_requests, kind, entity_id),
        WorkflowKind::TournamentRegistration => collect(&document.registrations, kind, entity_id),
    }
}

fn find<'a, R: WorkflowRecord>(
    records: &'a [R],
    entity_id: &RecordId,
    user_id: &str,
) -> Option<&'a R> {
    records.iter().find(|record| record.is_for(entity_id, user_id))
}

/// File a pending request, or return the one already filed for the pair.
pub async fn request(
    context: &SyncContext,
    kind: WorkflowKind,
    entity_id: RecordId,
    user_id: &str,
) -> Result<WorkflowEntry, WorkflowError> {
    match kind {
        WorkflowKind::CommunityJoin => {
            request_in::<CommunityRequests>(context, kind, entity_id, user_id).await
        }
        WorkflowKind::TournamentRegistration => {
            request_in::<Registrations>(context, kind, entity_id, user_id).await
        }
    }
}

/// Apply an organiser decision to a pending request.
///
/// Approving a community join also adds the user to the community members,
/// in the same write as the status change.
pub async fn decide(
    context: &SyncContext,
    kind: WorkflowKind,
    entity_id: RecordId,
    user_id: &str,
    decision: Decision,
) -> Result<WorkflowEntry, WorkflowError> {
    let machine = WorkflowMachine::new(kind);
    let mut outcome = Err(WorkflowError::NotFound {
        kind,
        entity_id: entity_id.clone(),
        user_id: user_id.to_string(),
    });

    mutator::update_document(context, kind.collection(), |document| {
        outcome = match kind {
            WorkflowKind::CommunityJoin => decide_in::<CommunityRequests>(
                document, &machine, kind, &entity_id, user_id, decision,
            ),
            WorkflowKind::TournamentRegistration => decide_in::<Registrations>(
                document, &machine, kind, &entity_id, user_id, decision,
            ),
        };
        let approved_join = kind == WorkflowKind::CommunityJoin
            && matches!(&outcome, Ok(entry) if entry.status == WorkflowStatus::Approved);
        if approved_join {
            add_member(document, &entity_id, user_id);
        }
    })
    .await?;

    let entry = outcome?;
    info!(
        %kind,
        entity = %entity_id,
        user = user_id,
        status = %entry.status,
        "workflow decided"
    );
    Ok(entry)
}

async fn request_in<C>(
    context: &SyncContext,
    kind: WorkflowKind,
    entity_id: RecordId,
    user_id: &str,
) -> Result<WorkflowEntry, WorkflowError>
where
    C: Collection,
    C::Record: WorkflowRecord,
{
    let mut filed = None;
    mutator::update::<C, _>(context, |records| {
        let mut next = records.to_vec();
        match find(records, &entity_id, user_id) {
            Some(existing) => filed = Some(existing.entry(kind)),
            None => {
                let id = next_numeric_id(records.iter().map(WorkflowRecord::id));
                let record = C::Record::create(id, entity_id.clone(), user_id);
                filed = Some(record.entry(kind));
                next.push(record);
            }
        }
        next
    })
    .await?;

    filed.ok_or_else(|| WorkflowError::NotFound {
        kind,
        entity_id,
        user_id: user_id.to_string(),
    })
}

fn decide_in<C>(
    document: &mut Document,
    machine: &WorkflowMachine,
    kind: WorkflowKind,
    entity_id: &RecordId,
    user_id: &str,
    decision: Decision,
) -> Result<WorkflowEntry, WorkflowError>
where
    C: Collection,
    C::Record: WorkflowRecord,
{
    let mut next = C::slot(document).to_vec();
    let record = next
        .iter_mut()
        .find(|record| record.is_for(entity_id, user_id))
        .ok_or_else(|| WorkflowError::NotFound {
            kind,
            entity_id: entity_id.clone(),
            user_id: user_id.to_string(),
        })?;
    let status = machine.apply(record.status(), decision)?;
    record.set_status(status);
    let entry = record.entry(kind);

    *C::slot_mut(document) = C::validate(next);
    Ok(entry)
}

fn add_member(document: &mut Document, community_id: &RecordId, user_id: &str) {
    let mut next = Communities::slot(document).clone();
    match next.iter_mut().find(|community| &community.id == community_id) {
        Some(community) => community.members.push(user_id.to_string()),
        None => debug!(community = %community_id, "approved join for unknown community"),
    }
    *Communities::slot_mut(document) = Communities::validate(next);
}

/// Watches one request and notifies its owner when the status moves.
pub struct WorkflowTracker;

impl WorkflowTracker {
    /// Start tracking `(entity_id, user_id)`. The status is re-read on every
    /// storage change and at least every `poll`; the returned task stops the
    /// tracking when cancelled or dropped.
    pub fn spawn(
        context: &SharedContext,
        kind: WorkflowKind,
        entity_id: RecordId,
        user_id: String,
        poll: Duration,
    ) -> PeriodicTask {
        let weak = Arc::downgrade(context);
        let mut local = context.bus().subscribe_intra();
        let mut foreign = context.bus().subscribe_inter();

        PeriodicTask::spawn("workflow-tracker", async move {
            let mut observer = StatusObserver::default();
            let mut ticker = interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    change = local.recv() => {
                        if matches!(change, Err(RecvError::Closed)) {
                            break;
                        }
                    }
                    change = foreign.recv() => {
                        if matches!(change, Err(RecvError::Closed)) {
                            break;
                        }
                    }
                }

                let Some(context) = weak.upgrade() else {
                    break;
                };

                let current = match context.store().load() {
                    Ok(document) => current_status(&document, kind, &entity_id, &user_id),
                    Err(LoadError::NotFound { .. }) => None,
                    Err(err) => {
                        warn!(error = %err, "workflow tracker skipped an unreadable document");
                        continue;
                    }
                };

                if let Some(change) = observer.observe(current) {
                    debug!(
                        %kind,
                        entity = %entity_id,
                        from = %change.from,
                        "workflow status moved"
                    );
                    context.notify(change.to_notice(kind, &entity_id));
                }
            }
        })
    }
}
