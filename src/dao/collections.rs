//! Typed access to the collections of the [`Document`] and their validators.

use std::collections::{HashMap, HashSet};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::dao::models::{
    CollectionKey, CommunityRecord, CommunityRequestRecord, Document, PlayerRecord, Record,
    RecordId, RegistrationRecord,
};

/// Name substituted for players saved without one.
pub const DEFAULT_PLAYER_NAME: &str = "Unknown Player";
/// Name substituted for communities saved without one.
pub const DEFAULT_COMMUNITY_NAME: &str = "Unnamed Community";
/// Location substituted for communities saved without one.
pub const DEFAULT_COMMUNITY_LOCATION: &str = "Unknown";
/// Placeholder image for communities saved without one.
pub const DEFAULT_COMMUNITY_IMAGE: &str = "/images/community-placeholder.png";

/// A named collection of the document together with its record type and validator.
pub trait Collection: Send + Sync + 'static {
    type Record: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    const KEY: CollectionKey;

    fn slot(document: &Document) -> &Vec<Self::Record>;
    fn slot_mut(document: &mut Document) -> &mut Vec<Self::Record>;

    /// Normalise a candidate value before it is persisted. Validators repair
    /// records with defaults rather than rejecting them.
    fn validate(records: Vec<Self::Record>) -> Vec<Self::Record>;
}

macro_rules! record_collection {
    ($(#[$doc:meta])* $marker:ident, $field:ident, $key:expr) => {
        $(#[$doc])*
        pub struct $marker;

        impl Collection for $marker {
            type Record = Record;

            const KEY: CollectionKey = $key;

            fn slot(document: &Document) -> &Vec<Record> {
                &document.$field
            }

            fn slot_mut(document: &mut Document) -> &mut Vec<Record> {
                &mut document.$field
            }

            fn validate(records: Vec<Record>) -> Vec<Record> {
                dedup_by_id(records, |record| record.id.clone())
            }
        }
    };
}

record_collection!(
    /// `tournaments`
    Tournaments, tournaments, CollectionKey::Tournaments
);
record_collection!(
    /// `news`
    News, news, CollectionKey::News
);
record_collection!(
    /// `teams`
    Teams, teams, CollectionKey::Teams
);
record_collection!(
    /// `liveMatches`
    LiveMatches, live_matches, CollectionKey::LiveMatches
);
record_collection!(
    /// `products`
    Products, products, CollectionKey::Products
);
record_collection!(
    /// `sports`
    Sports, sports, CollectionKey::Sports
);
record_collection!(
    /// `communityHighlights`
    CommunityHighlights, community_highlights, CollectionKey::CommunityHighlights
);

/// `players`
pub struct Players;

impl Collection for Players {
    type Record = PlayerRecord;

    const KEY: CollectionKey = CollectionKey::Players;

    fn slot(document: &Document) -> &Vec<PlayerRecord> {
        &document.players
    }

    fn slot_mut(document: &mut Document) -> &mut Vec<PlayerRecord> {
        &mut document.players
    }

    fn validate(records: Vec<PlayerRecord>) -> Vec<PlayerRecord> {
        dedup_by_id(records, |player| player.id.clone())
            .into_iter()
            .map(|mut player| {
                if player.name.trim().is_empty() {
                    player.name = DEFAULT_PLAYER_NAME.to_string();
                }
                player
            })
            .collect()
    }
}

/// `communities`
pub struct Communities;

impl Collection for Communities {
    type Record = CommunityRecord;

    const KEY: CollectionKey = CollectionKey::Communities;

    fn slot(document: &Document) -> &Vec<CommunityRecord> {
        &document.communities
    }

    fn slot_mut(document: &mut Document) -> &mut Vec<CommunityRecord> {
        &mut document.communities
    }

    fn validate(records: Vec<CommunityRecord>) -> Vec<CommunityRecord> {
        dedup_by_id(records, |community| community.id.clone())
            .into_iter()
            .map(|mut community| {
                fill_blank(&mut community.name, DEFAULT_COMMUNITY_NAME);
                fill_blank(&mut community.location, DEFAULT_COMMUNITY_LOCATION);
                fill_blank(&mut community.image, DEFAULT_COMMUNITY_IMAGE);
                let mut seen = HashSet::new();
                community.members.retain(|member| seen.insert(member.clone()));
                community
            })
            .collect()
    }
}

/// `registrations`
pub struct Registrations;

impl Collection for Registrations {
    type Record = RegistrationRecord;

    const KEY: CollectionKey = CollectionKey::Registrations;

    fn slot(document: &Document) -> &Vec<RegistrationRecord> {
        &document.registrations
    }

    fn slot_mut(document: &mut Document) -> &mut Vec<RegistrationRecord> {
        &mut document.registrations
    }

    fn validate(records: Vec<RegistrationRecord>) -> Vec<RegistrationRecord> {
        let records = dedup_by_id(records, |record| record.id.clone());
        first_per_pair(records, |record| {
            (record.tournament_id.clone(), record.user_id.clone())
        })
    }
}

/// `communityRequests`
pub struct CommunityRequests;

impl Collection for CommunityRequests {
    type Record = CommunityRequestRecord;

    const KEY: CollectionKey = CollectionKey::CommunityRequests;

    fn slot(document: &Document) -> &Vec<CommunityRequestRecord> {
        &document.community_requests
    }

    fn slot_mut(document: &mut Document) -> &mut Vec<CommunityRequestRecord> {
        &mut document.community_requests
    }

    fn validate(records: Vec<CommunityRequestRecord>) -> Vec<CommunityRequestRecord> {
        let records = dedup_by_id(records, |record| record.id.clone());
        first_per_pair(records, |record| {
            (record.community_id.clone(), record.user_id.clone())
        })
    }
}

/// Decode `values` as records of `C`, validate them and store them in `document`.
pub fn replace_from_values<C: Collection>(
    document: &mut Document,
    values: Vec<Value>,
) -> serde_json::Result<()> {
    let records = values
        .into_iter()
        .map(serde_json::from_value)
        .collect::<serde_json::Result<Vec<C::Record>>>()?;
    *C::slot_mut(document) = C::validate(records);
    Ok(())
}

/// Dynamic counterpart of [`replace_from_values`] keyed by collection name.
pub fn replace_dynamic(
    document: &mut Document,
    key: CollectionKey,
    values: Vec<Value>,
) -> serde_json::Result<()> {
    match key {
        CollectionKey::Tournaments => replace_from_values::<Tournaments>(document, values),
        CollectionKey::News => replace_from_values::<News>(document, values),
        CollectionKey::Players => replace_from_values::<Players>(document, values),
        CollectionKey::Teams => replace_from_values::<Teams>(document, values),
        CollectionKey::Communities => replace_from_values::<Communities>(document, values),
        CollectionKey::LiveMatches => replace_from_values::<LiveMatches>(document, values),
        CollectionKey::Products => replace_from_values::<Products>(document, values),
        CollectionKey::Registrations => replace_from_values::<Registrations>(document, values),
        CollectionKey::CommunityRequests => {
            replace_from_values::<CommunityRequests>(document, values)
        }
        CollectionKey::Sports => replace_from_values::<Sports>(document, values),
        CollectionKey::CommunityHighlights => {
            replace_from_values::<CommunityHighlights>(document, values)
        }
    }
}

/// Serialize one collection of the document as JSON values.
pub fn collection_values(document: &Document, key: CollectionKey) -> serde_json::Result<Value> {
    match key {
        CollectionKey::Tournaments => serde_json::to_value(&document.tournaments),
        CollectionKey::News => serde_json::to_value(&document.news),
        CollectionKey::Players => serde_json::to_value(&document.players),
        CollectionKey::Teams => serde_json::to_value(&document.teams),
        CollectionKey::Communities => serde_json::to_value(&document.communities),
        CollectionKey::LiveMatches => serde_json::to_value(&document.live_matches),
        CollectionKey::Products => serde_json::to_value(&document.products),
        CollectionKey::Registrations => serde_json::to_value(&document.registrations),
        CollectionKey::CommunityRequests => serde_json::to_value(&document.community_requests),
        CollectionKey::Sports => serde_json::to_value(&document.sports),
        CollectionKey::CommunityHighlights => serde_json::to_value(&document.community_highlights),
    }
}

/// Number of records held by one collection.
pub fn collection_len(document: &Document, key: CollectionKey) -> usize {
    match key {
        CollectionKey::Tournaments => document.tournaments.len(),
        CollectionKey::News => document.news.len(),
        CollectionKey::Players => document.players.len(),
        CollectionKey::Teams => document.teams.len(),
        CollectionKey::Communities => document.communities.len(),
        CollectionKey::LiveMatches => document.live_matches.len(),
        CollectionKey::Products => document.products.len(),
        CollectionKey::Registrations => document.registrations.len(),
        CollectionKey::CommunityRequests => document.community_requests.len(),
        CollectionKey::Sports => document.sports.len(),
        CollectionKey::CommunityHighlights => document.community_highlights.len(),
    }
}

/// Next free numeric id: one above the largest numeric id in use.
pub fn next_numeric_id<'a>(ids: impl IntoIterator<Item = &'a RecordId>) -> RecordId {
    let max = ids
        .into_iter()
        .filter_map(RecordId::as_number)
        .max()
        .unwrap_or(0);
    RecordId::Number(max + 1)
}

/// Collapse records sharing an id: the last occurrence wins, at the position
/// of the first.
fn dedup_by_id<T>(records: Vec<T>, id_of: impl Fn(&T) -> RecordId) -> Vec<T> {
    let mut slots: HashMap<RecordId, usize> = HashMap::new();
    let mut kept: Vec<T> = Vec::with_capacity(records.len());
    for record in records {
        let id = id_of(&record);
        match slots.get(&id) {
            Some(&index) => kept[index] = record,
            None => {
                slots.insert(id, kept.len());
                kept.push(record);
            }
        }
    }
    kept
}

fn first_per_pair<T>(records: Vec<T>, pair_of: impl Fn(&T) -> (RecordId, String)) -> Vec<T> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(pair_of(record)))
        .collect()
}

fn fill_blank(value: &mut String, fallback: &str) {
    if value.trim().is_empty() {
        *value = fallback.to_string();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dao::models::WorkflowStatus;

    #[test]
    fn community_defaults_are_substituted() {
        let mut document = Document::default();
        replace_dynamic(
            &mut document,
            CollectionKey::Communities,
            vec![json!({ "id": 7, "members": ["U1", "U1", "U2"] })],
        )
        .unwrap();

        let community = &document.communities[0];
        assert_eq!(community.name, DEFAULT_COMMUNITY_NAME);
        assert_eq!(community.location, DEFAULT_COMMUNITY_LOCATION);
        assert_eq!(community.image, DEFAULT_COMMUNITY_IMAGE);
        assert_eq!(community.members, vec!["U1".to_string(), "U2".to_string()]);
    }

    #[test]
    fn duplicate_ids_keep_last_value_in_first_position() {
        let mut document = Document::default();
        replace_dynamic(
            &mut document,
            CollectionKey::News,
            vec![
                json!({ "id": 1, "title": "old" }),
                json!({ "id": 2, "title": "other" }),
                json!({ "id": 1, "title": "new" }),
            ],
        )
        .unwrap();

        assert_eq!(document.news.len(), 2);
        assert_eq!(document.news[0].fields.get("title"), Some(&json!("new")));
        assert_eq!(document.news[1].id, RecordId::Number(2));
    }

    #[test]
    fn one_registration_per_tournament_and_user() {
        let mut document = Document::default();
        replace_dynamic(
            &mut document,
            CollectionKey::Registrations,
            vec![
                json!({ "id": 1, "tournamentId": 5, "userId": "U1", "status": "pending" }),
                json!({ "id": 2, "tournamentId": 5, "userId": "U1", "status": "confirmed" }),
                json!({ "id": 3, "tournamentId": 6, "userId": "U1", "status": "pending" }),
            ],
        )
        .unwrap();

        assert_eq!(document.registrations.len(), 2);
        assert_eq!(document.registrations[0].status, WorkflowStatus::Pending);
    }

    #[test]
    fn records_without_id_are_refused() {
        let mut document = Document::default();
        let result = replace_dynamic(
            &mut document,
            CollectionKey::Teams,
            vec![json!({ "name": "Falcons" })],
        );
        assert!(result.is_err());
        assert!(document.teams.is_empty());
    }
}
