//! Keeps `players` in step with the profiles cached on this device.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    dao::{
        collections::{DEFAULT_PLAYER_NAME, Players, next_numeric_id},
        models::{PlayerRecord, ProfileRecord, RecordId},
        profile_cache::{ProfileCache, new_pseudo_identity},
        storage::WriteError,
    },
    services::mutator::{self, MutationError},
    state::SyncContext,
};

/// Failure while saving a profile or projecting it.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The profile cache could not be written.
    #[error("failed to store profile")]
    Cache(#[from] WriteError),
    /// The projected players could not be persisted.
    #[error("failed to project profile into players")]
    Projection(#[from] MutationError),
}

/// What a projection pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionReport {
    /// Players synthesized for profiles that had none.
    pub added: usize,
    /// Players whose mutable fields were refreshed.
    pub updated: usize,
    /// Legacy players that received a pseudo-identity.
    pub assigned: usize,
}

impl ProjectionReport {
    /// Whether the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.assigned == 0
    }
}

/// Project every cached profile into `players`, writing at most once and
/// not at all when nothing changed.
pub async fn project(context: &SyncContext) -> Result<ProjectionReport, MutationError> {
    let profiles = ProfileCache::new(context.store()).profiles();
    let mut report = ProjectionReport::default();

    mutator::update::<Players, _>(context, |players| {
        let (next, pass) = project_players(players, &profiles);
        report = pass;
        next
    })
    .await?;

    if report.is_empty() {
        debug!("profile projection found nothing to change");
    } else {
        info!(
            added = report.added,
            updated = report.updated,
            assigned = report.assigned,
            "projected profiles into players"
        );
    }
    Ok(report)
}

/// Store `profile` as the current profile and project it right away.
pub async fn save_profile(
    context: &SyncContext,
    mut profile: ProfileRecord,
) -> Result<ProjectionReport, ProfileError> {
    let cache = ProfileCache::new(context.store());
    if profile.user_id.trim().is_empty() {
        profile.user_id = cache.user_id()?;
    }
    cache.save_profile(&profile)?;
    Ok(project(context).await?)
}

fn project_players(
    players: &[PlayerRecord],
    profiles: &IndexMap<String, ProfileRecord>,
) -> (Vec<PlayerRecord>, ProjectionReport) {
    let mut next = players.to_vec();
    let mut report = ProjectionReport::default();

    for player in next.iter_mut() {
        if player.user_id.as_deref().is_none_or(str::is_empty) {
            player.user_id = Some(new_pseudo_identity());
            report.assigned += 1;
        }
    }

    for profile in profiles.values() {
        let linked = next
            .iter_mut()
            .find(|player| player.user_id.as_deref() == Some(profile.user_id.as_str()));
        match linked {
            Some(player) => {
                if refresh_player(player, profile) {
                    report.updated += 1;
                }
            }
            None => {
                let id = next_numeric_id(next.iter().map(|player| &player.id));
                next.push(synthesize_player(id, profile));
                report.added += 1;
            }
        }
    }

    (next, report)
}

fn synthesize_player(id: RecordId, profile: &ProfileRecord) -> PlayerRecord {
    let mut player = PlayerRecord {
        id,
        user_id: Some(profile.user_id.clone()),
        name: String::new(),
        city: None,
        state: None,
        sport: None,
        position: None,
        age: None,
        bio: None,
        image: None,
        matches_played: 0,
        extra: Default::default(),
    };
    refresh_player(&mut player, profile);
    player
}

/// Copy the mutable profile fields onto `player`; true if any differed.
fn refresh_player(player: &mut PlayerRecord, profile: &ProfileRecord) -> bool {
    let name = if profile.name.trim().is_empty() {
        DEFAULT_PLAYER_NAME.to_string()
    } else {
        profile.name.clone()
    };

    let mut changed = false;
    changed |= sync_field(&mut player.name, &name);
    changed |= sync_field(&mut player.city, &profile.city);
    changed |= sync_field(&mut player.state, &profile.state);
    changed |= sync_field(&mut player.sport, &profile.sport);
    changed |= sync_field(&mut player.position, &profile.position);
    changed |= sync_field(&mut player.age, &profile.age);
    changed |= sync_field(&mut player.bio, &profile.bio);
    changed |= sync_field(&mut player.image, &profile.image);
    changed |= sync_field(&mut player.matches_played, &profile.matches_played);
    changed
}

fn sync_field<T: PartialEq + Clone>(target: &mut T, source: &T) -> bool {
    if target == source {
        false
    } else {
        *target = source.clone();
        true
    }
}
