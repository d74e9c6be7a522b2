//! Community chat rooms: live ingestion from the remote channel with a
//! cached transcript to fall back on.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        local_store::LocalStore,
        models::ChatMessageRecord,
        remote::{
            CHAT_COLLECTION, RemoteService, Subscription, chat_channel, error::RemoteResult,
        },
        storage::LoadError,
    },
    state::{
        SharedContext, SyncContext,
        chat::{ChatSource, Transcript, WELCOME_AUTHOR_ID, welcome_transcript},
        notice::{Notice, NoticeKind, NoticeLevel},
        task::PeriodicTask,
    },
};

/// Cache key of a community transcript.
pub fn messages_key(community_id: &str) -> String {
    format!("chat_messages_{community_id}")
}

/// Marker key set once the welcome transcript was seeded for a community.
pub fn welcome_seeded_key(community_id: &str) -> String {
    format!("chat_welcome_seeded_{community_id}")
}

/// Failure of a chat operation.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No message with this id in the transcript.
    #[error("message `{0}` not found")]
    MessageNotFound(String),
}

/// An open community chat.
pub struct ChatRoom {
    context: SharedContext,
    community_id: String,
    source: ChatSource,
    transcript: Arc<Mutex<Transcript>>,
    _ingestion: Option<PeriodicTask>,
}

impl ChatRoom {
    /// Join the live channel of `community_id`, or fall back to the cached
    /// transcript when the remote cannot be reached.
    pub async fn open(context: SharedContext, community_id: &str) -> Self {
        let channel = chat_channel(community_id);

        match connect(context.remote().as_ref(), &channel).await {
            Ok((subscription, history)) => {
                let history = decode_messages(history);
                let cached = load_cached(context.store(), community_id);
                let pending: Vec<ChatMessageRecord> = cached
                    .iter()
                    .filter(|message| message.user_id != WELCOME_AUTHOR_ID)
                    .filter(|message| !history.iter().any(|known| known.id == message.id))
                    .cloned()
                    .collect();

                // Remote copies win for ids known on both sides.
                let transcript = Transcript::from_messages(history.into_iter().chain(cached));
                cache_transcript(context.store(), community_id, &transcript);
                info!(
                    community = community_id,
                    messages = transcript.len(),
                    pending = pending.len(),
                    "chat room joined live channel"
                );

                let transcript = Arc::new(Mutex::new(transcript));
                let ingestion =
                    spawn_ingestion(&context, community_id, subscription, transcript.clone());
                let room = Self {
                    context,
                    community_id: community_id.to_string(),
                    source: ChatSource::Remote,
                    transcript,
                    _ingestion: Some(ingestion),
                };
                for message in &pending {
                    room.forward(message, Forward::Create).await;
                }
                room
            }
            Err(err) => {
                warn!(
                    community = community_id,
                    error = %err,
                    "live chat unavailable; using cached transcript"
                );
                context.notify(Notice::new(
                    NoticeLevel::Warning,
                    NoticeKind::RemoteUnavailable,
                    "Live chat is unavailable right now. Showing messages saved on this device.",
                ));
                let transcript = load_local(context.store(), community_id);
                Self {
                    context,
                    community_id: community_id.to_string(),
                    source: ChatSource::Local,
                    transcript: Arc::new(Mutex::new(transcript)),
                    _ingestion: None,
                }
            }
        }
    }

    /// Community this room belongs to.
    pub fn community_id(&self) -> &str {
        &self.community_id
    }

    /// Whether the room follows the live channel or the cache.
    pub fn source(&self) -> ChatSource {
        self.source
    }

    /// Transcript in display order.
    pub async fn messages(&self) -> Vec<ChatMessageRecord> {
        self.transcript.lock().await.messages()
    }

    /// Post a message. It is shown and cached right away; delivery to the
    /// remote channel is best effort.
    pub async fn send(&self, user_id: &str, author: &str, text: &str) -> ChatMessageRecord {
        let message = ChatMessageRecord {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            community_id: self.community_id.clone(),
            user_id: user_id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
            created_at: now_ms(),
            reactions: Vec::new(),
        };

        {
            let mut transcript = self.transcript.lock().await;
            transcript.merge(message.clone());
            cache_transcript(self.context.store(), &self.community_id, &transcript);
        }

        if self.source == ChatSource::Remote {
            self.forward(&message, Forward::Create).await;
        }
        message
    }

    /// Toggle the `(emoji, user)` reaction on a message.
    pub async fn toggle_reaction(
        &self,
        message_id: &str,
        emoji: &str,
        user_id: &str,
    ) -> Result<ChatMessageRecord, ChatError> {
        let message = {
            let mut transcript = self.transcript.lock().await;
            let message = transcript
                .toggle_reaction(message_id, emoji, user_id)
                .cloned()
                .ok_or_else(|| ChatError::MessageNotFound(message_id.to_string()))?;
            cache_transcript(self.context.store(), &self.community_id, &transcript);
            message
        };

        if self.source == ChatSource::Remote {
            self.forward(&message, Forward::Update).await;
        }
        Ok(message)
    }

    async fn forward(&self, message: &ChatMessageRecord, kind: Forward) {
        let record = match serde_json::to_value(message) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "failed to encode chat message");
                return;
            }
        };
        let remote = self.context.remote();
        let result = match kind {
            Forward::Create => remote.create(CHAT_COLLECTION, record).await,
            Forward::Update => remote.update(CHAT_COLLECTION, record).await,
        };
        if let Err(err) = result {
            warn!(message = %message.id, error = %err, "chat message kept locally only");
        }
    }
}

#[derive(Clone, Copy)]
enum Forward {
    Create,
    Update,
}

/// Rooms opened by the daemon, one per community.
#[derive(Default)]
pub struct ChatRooms {
    rooms: DashMap<String, Arc<ChatRoom>>,
}

impl ChatRooms {
    /// Room of `community_id`, opening it on first use.
    pub async fn open(&self, context: &SharedContext, community_id: &str) -> Arc<ChatRoom> {
        if let Some(room) = self.rooms.get(community_id) {
            return room.clone();
        }
        let room = Arc::new(ChatRoom::open(context.clone(), community_id).await);
        self.rooms
            .entry(community_id.to_string())
            .or_insert(room)
            .clone()
    }

    /// Leave every room, stopping their ingestion.
    pub fn close_all(&self) {
        self.rooms.clear();
    }
}

async fn connect(
    remote: &dyn RemoteService,
    channel: &str,
) -> RemoteResult<(Subscription, Vec<Value>)> {
    let subscription = remote.subscribe(channel).await?;
    let history = remote.fetch_history(channel).await?;
    Ok((subscription, history))
}

fn spawn_ingestion(
    context: &SharedContext,
    community_id: &str,
    mut subscription: Subscription,
    transcript: Arc<Mutex<Transcript>>,
) -> PeriodicTask {
    let weak: Weak<SyncContext> = Arc::downgrade(context);
    let community_id = community_id.to_string();

    PeriodicTask::spawn("chat-ingestion", async move {
        while let Some(event) = subscription.next().await {
            let message = match serde_json::from_value::<ChatMessageRecord>(event.payload) {
                Ok(message) => message,
                Err(err) => {
                    debug!(channel = %event.channel, error = %err, "ignoring malformed chat event");
                    continue;
                }
            };

            let mut transcript = transcript.lock().await;
            if !transcript.merge(message) {
                continue;
            }
            let Some(context) = weak.upgrade() else {
                break;
            };
            cache_transcript(context.store(), &community_id, &transcript);
        }
        debug!(community = %community_id, "chat ingestion stopped");
    })
}

fn decode_messages(values: Vec<Value>) -> Vec<ChatMessageRecord> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(message) => Some(message),
            Err(err) => {
                debug!(error = %err, "skipping malformed chat history entry");
                None
            }
        })
        .collect()
}

/// Cached transcript, seeding the welcome messages the first time a
/// community is opened without one.
fn load_local(store: &LocalStore, community_id: &str) -> Transcript {
    let cached = load_cached(store, community_id);
    if !cached.is_empty() {
        return Transcript::from_messages(cached);
    }

    let seeded_key = welcome_seeded_key(community_id);
    if matches!(store.load_json::<bool>(&seeded_key), Ok(true)) {
        return Transcript::default();
    }

    let transcript = Transcript::from_messages(welcome_transcript(community_id, now_ms()));
    cache_transcript(store, community_id, &transcript);
    if let Err(err) = store.save_json(&seeded_key, &true) {
        warn!(community = community_id, error = %err, "failed to mark welcome transcript");
    }
    debug!(community = community_id, "seeded welcome transcript");
    transcript
}

fn load_cached(store: &LocalStore, community_id: &str) -> Vec<ChatMessageRecord> {
    match store.load_json::<Vec<ChatMessageRecord>>(&messages_key(community_id)) {
        Ok(messages) => messages,
        Err(LoadError::NotFound { .. }) => Vec::new(),
        Err(err) => {
            warn!(community = community_id, error = %err, "cached transcript unreadable");
            Vec::new()
        }
    }
}

fn cache_transcript(store: &LocalStore, community_id: &str, transcript: &Transcript) {
    if let Err(err) = store.save_json(&messages_key(community_id), &transcript.messages()) {
        warn!(community = community_id, error = %err, "failed to cache chat transcript");
    }
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        dao::{
            medium::{MemoryMedium, StorageMedium},
            remote::MemoryRemote,
        },
        state::{ContextSettings, bus::RelayChannel},
    };

    fn context_with(medium: Arc<MemoryMedium>, remote: &MemoryRemote) -> SharedContext {
        SyncContext::new(
            medium,
            Arc::new(RelayChannel::default()),
            Arc::new(remote.clone()),
            ContextSettings::default(),
        )
    }

    fn wire_message(id: &str, created_at: i64) -> Value {
        json!({
            "id": id,
            "communityId": "c1",
            "userId": "U2",
            "author": "Bo",
            "text": "hi",
            "createdAt": created_at,
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn offline_room_seeds_welcome_once() {
        let medium = Arc::new(MemoryMedium::new());
        let remote = MemoryRemote::unreachable();
        let context = context_with(medium.clone(), &remote);
        let mut notices = context.notices().subscribe();

        let room = ChatRoom::open(context.clone(), "c1").await;
        assert_eq!(room.source(), ChatSource::Local);
        assert_eq!(room.messages().await.len(), 3);
        assert_eq!(notices.recv().await.unwrap().kind, NoticeKind::RemoteUnavailable);

        medium.remove(&messages_key("c1")).unwrap();
        let reopened = ChatRoom::open(context, "c1").await;
        assert!(reopened.messages().await.is_empty());
    }

    #[tokio::test]
    async fn live_room_merges_history_and_ignores_redelivery() {
        let remote = MemoryRemote::new();
        let channel = chat_channel("c1");
        remote.publish(&channel, wire_message("M1", 10));
        let context = context_with(Arc::new(MemoryMedium::new()), &remote);

        let room = ChatRoom::open(context.clone(), "c1").await;
        assert_eq!(room.source(), ChatSource::Remote);

        remote.push(&channel, wire_message("M1", 10));
        remote.push(&channel, wire_message("M2", 5));
        settle().await;

        let ids: Vec<_> = room.messages().await.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, ["M2", "M1"]);
        let cached: Vec<ChatMessageRecord> =
            context.store().load_json(&messages_key("c1")).unwrap();
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn reconnect_keeps_and_forwards_messages_sent_offline() {
        let remote = MemoryRemote::unreachable();
        let context = context_with(Arc::new(MemoryMedium::new()), &remote);

        let offline = ChatRoom::open(context.clone(), "c1").await;
        let sent = offline.send("U1", "Uma", "sent while offline").await;
        let cached_before: Vec<ChatMessageRecord> =
            context.store().load_json(&messages_key("c1")).unwrap();
        assert_eq!(cached_before.len(), 4);
        drop(offline);

        remote.set_reachable(true);
        let live = ChatRoom::open(context.clone(), "c1").await;
        assert_eq!(live.source(), ChatSource::Remote);

        let messages = live.messages().await;
        assert_eq!(messages.len(), 4);
        assert!(messages.iter().any(|message| message.id == sent.id));
        let cached: Vec<ChatMessageRecord> =
            context.store().load_json(&messages_key("c1")).unwrap();
        assert_eq!(cached.len(), 4);

        let forwarded = remote.records(CHAT_COLLECTION);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0]["id"], sent.id.as_str());
    }

    #[tokio::test]
    async fn empty_remote_history_keeps_cached_transcript() {
        let medium = Arc::new(MemoryMedium::new());
        let remote = MemoryRemote::unreachable();
        let context = context_with(medium, &remote);
        drop(ChatRoom::open(context.clone(), "c1").await);

        remote.set_reachable(true);
        let live = ChatRoom::open(context, "c1").await;
        assert_eq!(live.messages().await.len(), 3);
    }

    #[tokio::test]
    async fn sent_message_echo_is_collapsed() {
        let remote = MemoryRemote::new();
        let context = context_with(Arc::new(MemoryMedium::new()), &remote);
        let room = ChatRoom::open(context, "c1").await;

        let sent = room.send("U1", "Uma", "hello").await;
        settle().await;

        let messages = room.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, sent.id);
        assert_eq!(remote.records(CHAT_COLLECTION).len(), 1);
    }

    #[tokio::test]
    async fn reactions_toggle_and_are_cached() {
        let remote = MemoryRemote::unreachable();
        let context = context_with(Arc::new(MemoryMedium::new()), &remote);
        let room = ChatRoom::open(context.clone(), "c1").await;
        let sent = room.send("U1", "Uma", "match at 6?").await;

        let liked = room.toggle_reaction(&sent.id, "👍", "U2").await.unwrap();
        assert_eq!(liked.reactions.len(), 1);
        let cleared = room.toggle_reaction(&sent.id, "👍", "U2").await.unwrap();
        assert!(cleared.reactions.is_empty());

        let cached: Vec<ChatMessageRecord> =
            context.store().load_json(&messages_key("c1")).unwrap();
        assert!(cached.iter().all(|message| message.reactions.is_empty()));
        assert!(matches!(
            room.toggle_reaction("nope", "👍", "U2").await,
            Err(ChatError::MessageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn dropping_the_room_unsubscribes() {
        let remote = MemoryRemote::new();
        let context = context_with(Arc::new(MemoryMedium::new()), &remote);
        let rooms = ChatRooms::default();

        let room = rooms.open(&context, "c1").await;
        let again = rooms.open(&context, "c1").await;
        assert!(Arc::ptr_eq(&room, &again));
        assert_eq!(remote.subscriber_count(&chat_channel("c1")), 1);

        drop((room, again));
        rooms.close_all();
        settle().await;
        assert_eq!(remote.subscriber_count(&chat_channel("c1")), 0);
    }
}
