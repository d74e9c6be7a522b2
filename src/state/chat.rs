use indexmap::IndexMap;
use serde::Serialize;

use crate::dao::models::{ChatMessageRecord, Reaction};

/// Author id of the synthesized welcome messages.
pub const WELCOME_AUTHOR_ID: &str = "community-bot";

/// Where the transcript of an open room comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSource {
    /// Live channel of the remote service.
    Remote,
    /// Transcript cached on this device.
    Local,
}

/// Messages of one community keyed by id, kept in `(createdAt, id)` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: IndexMap<String, ChatMessageRecord>,
}

impl Transcript {
    /// Transcript of `messages`; the first copy of a repeated id wins.
    pub fn from_messages(messages: impl IntoIterator<Item = ChatMessageRecord>) -> Self {
        let mut transcript = Self::default();
        for message in messages {
            transcript.messages.entry(message.id.clone()).or_insert(message);
        }
        transcript.sort();
        transcript
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message with `id`.
    pub fn get(&self, id: &str) -> Option<&ChatMessageRecord> {
        self.messages.get(id)
    }

    /// Snapshot in display order.
    pub fn messages(&self) -> Vec<ChatMessageRecord> {
        self.messages.values().cloned().collect()
    }

    /// Add `message` unless one with the same id is already present.
    pub fn merge(&mut self, message: ChatMessageRecord) -> bool {
        if self.messages.contains_key(&message.id) {
            return false;
        }
        self.messages.insert(message.id.clone(), message);
        self.sort();
        true
    }

    /// Toggle the `(emoji, user)` reaction on a message. Returns the updated
    /// message, or `None` when it is unknown.
    pub fn toggle_reaction(
        &mut self,
        message_id: &str,
        emoji: &str,
        user_id: &str,
    ) -> Option<&ChatMessageRecord> {
        let message = self.messages.get_mut(message_id)?;
        toggle(&mut message.reactions, emoji, user_id);
        Some(&*message)
    }

    fn sort(&mut self) {
        self.messages.sort_by(|_, left, _, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
    }
}

/// Remove the user's reaction with `emoji` if present, add it otherwise.
/// Returns whether the reaction is now held.
pub fn toggle(reactions: &mut Vec<Reaction>, emoji: &str, user_id: &str) -> bool {
    let held = |reaction: &Reaction| reaction.emoji == emoji && reaction.user_id == user_id;
    if reactions.iter().any(held) {
        reactions.retain(|reaction| !held(reaction));
        false
    } else {
        reactions.push(Reaction {
            emoji: emoji.to_string(),
            user_id: user_id.to_string(),
        });
        true
    }
}

/// Fixed transcript shown in a community nobody has talked in yet.
pub fn welcome_transcript(community_id: &str, now_ms: i64) -> Vec<ChatMessageRecord> {
    [
        "Welcome to the community chat! Say hi to your teammates.",
        "Share match times, training spots and results here.",
        "Keep it friendly and respectful. Have fun!",
    ]
    .into_iter()
    .enumerate()
    .map(|(index, text)| ChatMessageRecord {
        id: format!("welcome-{community_id}-{}", index + 1),
        community_id: community_id.to_string(),
        user_id: WELCOME_AUTHOR_ID.to_string(),
        author: "Community Bot".to_string(),
        text: text.to_string(),
        created_at: now_ms + index as i64,
        reactions: Vec::new(),
    })
    .collect()
}
