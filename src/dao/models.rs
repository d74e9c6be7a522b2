use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnNull, DisplayFromStr, PickFirst, serde_as, skip_serializing_none};

/// Extra fields carried by a record that the engine does not interpret.
pub type ExtraFields = BTreeMap<String, Value>;

/// Names of every collection stored in the [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionKey {
    /// Tournaments listing.
    Tournaments,
    /// News articles.
    News,
    /// Player projections.
    Players,
    /// Teams.
    Teams,
    /// Communities.
    Communities,
    /// Live matches.
    LiveMatches,
    /// Shop products.
    Products,
    /// Tournament registrations.
    Registrations,
    /// Community join requests.
    CommunityRequests,
    /// Sports catalogue.
    Sports,
    /// Community highlight posts.
    CommunityHighlights,
}

impl CollectionKey {
    /// Every collection key, in persisted order.
    pub const ALL: [CollectionKey; 11] = [
        CollectionKey::Tournaments,
        CollectionKey::News,
        CollectionKey::Players,
        CollectionKey::Teams,
        CollectionKey::Communities,
        CollectionKey::LiveMatches,
        CollectionKey::Products,
        CollectionKey::Registrations,
        CollectionKey::CommunityRequests,
        CollectionKey::Sports,
        CollectionKey::CommunityHighlights,
    ];

    /// Wire name of the collection inside the persisted document.
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKey::Tournaments => "tournaments",
            CollectionKey::News => "news",
            CollectionKey::Players => "players",
            CollectionKey::Teams => "teams",
            CollectionKey::Communities => "communities",
            CollectionKey::LiveMatches => "liveMatches",
            CollectionKey::Products => "products",
            CollectionKey::Registrations => "registrations",
            CollectionKey::CommunityRequests => "communityRequests",
            CollectionKey::Sports => "sports",
            CollectionKey::CommunityHighlights => "communityHighlights",
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection `{0}`")]
pub struct UnknownCollection(pub String);

impl FromStr for CollectionKey {
    type Err = UnknownCollection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        CollectionKey::ALL
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| UnknownCollection(value.to_string()))
    }
}

/// Per-collection record identifier, numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric identifier.
    Number(i64),
    /// Textual identifier.
    Text(String),
}

impl RecordId {
    /// Numeric value of the identifier, if it is one.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            RecordId::Number(value) => Some(*value),
            RecordId::Text(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(value) => write!(f, "{value}"),
            RecordId::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Number(value)
    }
}

/// Identifier read from text, such as a path segment. Only canonical
/// integers become numbers, so `"007"` stays textual.
impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(number) if number.to_string() == value => RecordId::Number(number),
            _ => RecordId::Text(value.to_string()),
        }
    }
}

/// Record of a collection whose shape the engine does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier unique within the collection.
    pub id: RecordId,
    /// Remaining fields, stored verbatim.
    #[serde(flatten)]
    pub fields: ExtraFields,
}

/// Player projection derived from a profile, plus admin-only fields.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    /// Identifier unique within `players`.
    pub id: RecordId,
    /// Back-reference to the originating profile.
    pub user_id: Option<String>,
    /// Display name.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub name: String,
    /// City of residence.
    pub city: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// Main sport.
    pub sport: Option<String>,
    /// Playing position.
    pub position: Option<String>,
    /// Age in years.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub age: Option<u32>,
    /// Free-form biography.
    pub bio: Option<String>,
    /// Avatar reference.
    pub image: Option<String>,
    /// Number of matches played.
    #[serde_as(as = "DefaultOnNull<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub matches_played: u32,
    /// Admin-authored fields preserved across projections.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Community with its member list.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityRecord {
    /// Identifier unique within `communities`.
    pub id: RecordId,
    /// Display name.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub name: String,
    /// Human readable location.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub location: String,
    /// Cover image reference.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub image: String,
    /// Optional description.
    pub description: Option<String>,
    /// Pseudo-identities of the members.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub members: Vec<String>,
    /// Remaining fields, stored verbatim.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Status of a join request or a tournament registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Waiting for an organiser decision.
    Pending,
    /// Community join accepted.
    Approved,
    /// Tournament registration accepted.
    Confirmed,
    /// Request declined.
    Rejected,
}

impl WorkflowStatus {
    /// Whether no further transition is possible from this status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, WorkflowStatus::Pending)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Confirmed => "confirmed",
            WorkflowStatus::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// Registration of a user to a tournament.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    /// Identifier unique within `registrations`.
    pub id: RecordId,
    /// Tournament the user registers to.
    pub tournament_id: RecordId,
    /// Registering pseudo-identity.
    pub user_id: String,
    /// Current workflow status.
    pub status: WorkflowStatus,
    /// RFC 3339 timestamp of the request.
    pub requested_at: Option<String>,
    /// Remaining fields, stored verbatim.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Request of a user to join a community.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityRequestRecord {
    /// Identifier unique within `communityRequests`.
    pub id: RecordId,
    /// Community the user asks to join.
    pub community_id: RecordId,
    /// Requesting pseudo-identity.
    pub user_id: String,
    /// Current workflow status.
    pub status: WorkflowStatus,
    /// RFC 3339 timestamp of the request.
    pub requested_at: Option<String>,
    /// Remaining fields, stored verbatim.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Personal and sport attributes of a local profile.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Stable client-generated pseudo-identity.
    pub user_id: String,
    /// Display name.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// City of residence.
    pub city: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// Main sport.
    pub sport: Option<String>,
    /// Playing position.
    pub position: Option<String>,
    /// Age in years.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub age: Option<u32>,
    /// Free-form biography.
    pub bio: Option<String>,
    /// Avatar reference.
    pub image: Option<String>,
    /// Number of matches played.
    #[serde_as(as = "DefaultOnNull<PickFirst<(_, DisplayFromStr)>>")]
    #[serde(default)]
    pub matches_played: u32,
    /// Remaining fields, stored verbatim.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ProfileRecord {
    /// Empty profile for the given pseudo-identity.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            email: None,
            city: None,
            state: None,
            sport: None,
            position: None,
            age: None,
            bio: None,
            image: None,
            matches_played: 0,
            extra: ExtraFields::new(),
        }
    }
}

/// A single `(emoji, user)` reaction on a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Emoji used for the reaction.
    pub emoji: String,
    /// Pseudo-identity of the reacting user.
    pub user_id: String,
}

/// Chat message of a community channel.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRecord {
    /// Unique message identifier.
    pub id: String,
    /// Community channel the message belongs to.
    pub community_id: String,
    /// Pseudo-identity of the author.
    pub user_id: String,
    /// Display name of the author.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub author: String,
    /// Message body.
    pub text: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Reactions attached to the message.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

/// Root persisted object: every collection key always resolves to an array.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Document {
    /// Tournaments listing.
    #[serde_as(as = "DefaultOnNull")]
    pub tournaments: Vec<Record>,
    /// News articles.
    #[serde_as(as = "DefaultOnNull")]
    pub news: Vec<Record>,
    /// Player projections.
    #[serde_as(as = "DefaultOnNull")]
    pub players: Vec<PlayerRecord>,
    /// Teams.
    #[serde_as(as = "DefaultOnNull")]
    pub teams: Vec<Record>,
    /// Communities.
    #[serde_as(as = "DefaultOnNull")]
    pub communities: Vec<CommunityRecord>,
    /// Live matches.
    #[serde_as(as = "DefaultOnNull")]
    pub live_matches: Vec<Record>,
    /// Shop products.
    #[serde_as(as = "DefaultOnNull")]
    pub products: Vec<Record>,
    /// Tournament registrations.
    #[serde_as(as = "DefaultOnNull")]
    pub registrations: Vec<RegistrationRecord>,
    /// Community join requests.
    #[serde_as(as = "DefaultOnNull")]
    pub community_requests: Vec<CommunityRequestRecord>,
    /// Sports catalogue.
    #[serde_as(as = "DefaultOnNull")]
    pub sports: Vec<Record>,
    /// Community highlight posts.
    #[serde_as(as = "DefaultOnNull")]
    pub community_highlights: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_ids_keep_their_form_unless_canonical_integers() {
        assert_eq!(RecordId::from("42"), RecordId::Number(42));
        assert_eq!(RecordId::from("-3"), RecordId::Number(-3));
        assert_eq!(RecordId::from("007"), RecordId::Text("007".into()));
        assert_eq!(RecordId::from("+5"), RecordId::Text("+5".into()));
        assert_eq!(RecordId::from("t-1"), RecordId::Text("t-1".into()));
    }

    #[test]
    fn missing_and_null_collections_read_as_empty() {
        let doc: Document = serde_json::from_value(json!({
            "players": null,
            "news": [{ "id": 3, "title": "Kick-off" }]
        }))
        .unwrap();

        assert!(doc.players.is_empty());
        assert!(doc.tournaments.is_empty());
        assert_eq!(doc.news.len(), 1);
        assert_eq!(doc.news[0].id, RecordId::Number(3));
    }

    #[test]
    fn serialized_document_always_carries_every_key() {
        let value = serde_json::to_value(Document::default()).unwrap();
        let object = value.as_object().unwrap();
        for key in CollectionKey::ALL {
            assert_eq!(object.get(key.as_str()), Some(&json!([])), "{key}");
        }
    }

    #[test]
    fn collection_key_parses_wire_names() {
        assert_eq!(
            "liveMatches".parse::<CollectionKey>(),
            Ok(CollectionKey::LiveMatches)
        );
        assert!("matches".parse::<CollectionKey>().is_err());
    }

    #[test]
    fn player_age_accepts_numeric_strings() {
        let player: PlayerRecord = serde_json::from_value(json!({
            "id": "p-1",
            "name": "Alice",
            "age": "27",
            "matchesPlayed": null,
            "rating": 4.5
        }))
        .unwrap();

        assert_eq!(player.id, RecordId::Text("p-1".into()));
        assert_eq!(player.age, Some(27));
        assert_eq!(player.matches_played, 0);
        assert_eq!(player.extra.get("rating"), Some(&json!(4.5)));
    }
}
