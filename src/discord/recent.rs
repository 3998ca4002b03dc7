//! Buffer of recently seen guild messages.
//!
//! Deletion events only carry ids, so the content and author of a deleted
//! message have to come from here.

use std::collections::{HashMap, VecDeque};

use serenity::all::{Message, MessageId, RoleId, UserId};

/// Default number of messages kept.
pub const DEFAULT_CAPACITY: usize = 1000;

/// What we remember about a message.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMessage {
    pub id: MessageId,
    pub author_id: UserId,
    /// Role ids of the author when the message was sent, if attached.
    pub author_roles: Option<Vec<RoleId>>,
    pub content: String,
}

impl From<&Message> for CachedMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id,
            author_id: msg.author.id,
            author_roles: msg.member.as_ref().map(|m| m.roles.clone()),
            content: msg.content.clone(),
        }
    }
}

/// Bounded message store; the oldest message is evicted first.
#[derive(Debug)]
pub struct RecentMessages {
    capacity: usize,
    order: VecDeque<MessageId>,
    messages: HashMap<MessageId, CachedMessage>,
}

impl RecentMessages {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            messages: HashMap::new(),
        }
    }

    pub fn insert(&mut self, message: CachedMessage) {
        if self.messages.contains_key(&message.id) {
            self.messages.insert(message.id, message);
            return;
        }

        while self.messages.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.messages.remove(&oldest);
                }
                None => break,
            }
        }

        self.order.push_back(message.id);
        self.messages.insert(message.id, message);
    }

    /// Track an edit. Returns false if the message is not buffered.
    pub fn update_content(&mut self, id: MessageId, content: String) -> bool {
        match self.messages.get_mut(&id) {
            Some(message) => {
                message.content = content;
                true
            }
            None => false,
        }
    }

    /// Remove and return a message.
    pub fn take(&mut self, id: MessageId) -> Option<CachedMessage> {
        let message = self.messages.remove(&id)?;
        self.order.retain(|m| *m != id);
        Some(message)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

impl Default for RecentMessages {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
