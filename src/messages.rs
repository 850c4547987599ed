use crate::errors::{Result, StoreError};
use crate::kv::{K_CONVERSATIONS, KvStore};
use crate::models::{ChatMessage, Conversation, new_id, now};

/// Two-party conversations, optionally scoped to a job. The collection is
/// global; sending scans it for a participant-pair + job match before
/// appending, so the same pair talking about two different jobs gets two
/// conversations.
pub struct MessagesStore<'a> {
    kv: &'a KvStore,
}

impl<'a> MessagesStore<'a> {
    pub fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }

    pub fn all(&self) -> Vec<Conversation> {
        self.kv.get_as(K_CONVERSATIONS).unwrap_or_default()
    }

    fn save(&self, conversations: &[Conversation]) -> Result<()> {
        self.kv.set_as(K_CONVERSATIONS, &conversations)
    }

    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.all().into_iter().find(|c| c.id == id)
    }

    /// Conversations the user participates in, most recent activity first.
    pub fn for_user(&self, user_id: &str) -> Vec<Conversation> {
        let mut mine: Vec<Conversation> = self
            .all()
            .into_iter()
            .filter(|c| c.participants.iter().any(|p| p == user_id))
            .collect();
        mine.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        mine
    }

    pub fn send_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        job_id: Option<&str>,
        text: &str,
    ) -> Result<Conversation> {
        let mut conversations = self.all();
        let message = ChatMessage {
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            timestamp: now(),
        };

        let existing = conversations.iter_mut().find(|c| {
            c.involves(sender_id, recipient_id) && c.job_id.as_deref() == job_id
        });

        let updated = match existing {
            Some(conversation) => {
                conversation.last_message = Some(message.text.clone());
                conversation.last_message_at = Some(message.timestamp.clone());
                conversation.read = false;
                conversation.messages.push(message);
                conversation.clone()
            }
            None => {
                let conversation = Conversation {
                    id: new_id(),
                    participants: vec![sender_id.to_string(), recipient_id.to_string()],
                    job_id: job_id.map(str::to_string),
                    last_message: Some(message.text.clone()),
                    last_message_at: Some(message.timestamp.clone()),
                    messages: vec![message],
                    read: false,
                };
                conversations.push(conversation.clone());
                conversation
            }
        };

        self.save(&conversations)?;
        Ok(updated)
    }

    /// One flag for the whole conversation, matching the original.
    pub fn mark_read(&self, id: &str) -> Result<()> {
        let mut conversations = self.all();
        let conversation = conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("conversation", id))?;
        conversation.read = true;
        self.save(&conversations)
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.for_user(user_id).iter().filter(|c| !c.read).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::testutil::temp_store;

    #[test]
    fn reply_reuses_the_pair_conversation() {
        let (_dir, kv) = temp_store();
        let store = MessagesStore::new(&kv);
        store.send_message("a", "b", None, "hello").unwrap();
        let conv = store.send_message("b", "a", None, "hi back").unwrap();

        assert_eq!(store.all().len(), 1);
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.last_message.as_deref(), Some("hi back"));
    }

    #[test]
    fn job_scope_separates_conversations() {
        let (_dir, kv) = temp_store();
        let store = MessagesStore::new(&kv);
        store.send_message("a", "b", Some("job-1"), "about job 1").unwrap();
        store.send_message("a", "b", Some("job-2"), "about job 2").unwrap();
        store.send_message("a", "b", None, "general").unwrap();

        assert_eq!(store.all().len(), 3);
        assert_eq!(store.for_user("a").len(), 3);
    }

    #[test]
    fn third_parties_do_not_match() {
        let (_dir, kv) = temp_store();
        let store = MessagesStore::new(&kv);
        store.send_message("a", "b", None, "x").unwrap();
        store.send_message("a", "c", None, "y").unwrap();

        assert_eq!(store.all().len(), 2);
        assert_eq!(store.for_user("b").len(), 1);
        assert_eq!(store.for_user("c").len(), 1);
    }

    #[test]
    fn self_messages_do_not_alias_other_conversations() {
        let (_dir, kv) = temp_store();
        let store = MessagesStore::new(&kv);
        store.send_message("a", "b", None, "hey").unwrap();
        let conv = store.send_message("a", "a", None, "note to self").unwrap();

        assert_eq!(store.all().len(), 2);
        assert_eq!(conv.participants, vec!["a", "a"]);
        assert_eq!(store.for_user("b")[0].messages.len(), 1);

        // A second note lands in the same self-conversation.
        let again = store.send_message("a", "a", None, "another").unwrap();
        assert_eq!(again.id, conv.id);
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn read_flag_is_per_conversation() {
        let (_dir, kv) = temp_store();
        let store = MessagesStore::new(&kv);
        let conv = store.send_message("a", "b", None, "ping").unwrap();
        assert_eq!(store.unread_count("b"), 1);

        store.mark_read(&conv.id).unwrap();
        assert_eq!(store.unread_count("b"), 0);

        // Any new message flips the single flag back.
        store.send_message("b", "a", None, "pong").unwrap();
        assert_eq!(store.unread_count("a"), 1);
        assert_eq!(store.unread_count("b"), 1);
    }
}
