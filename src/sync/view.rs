use std::collections::HashSet;

use uuid::Uuid;

use crate::store::Message;

/// Messages of one room visit, oldest first, each id at most once.
///
/// Only grows: there is no removal, no reordering and no in-place update.
#[derive(Debug, Default)]
pub struct MessageView {
    messages: Vec<Message>,
    ids: HashSet<Uuid>,
}

impl MessageView {
    /// Takes an already ordered batch; repeated ids keep their first entry.
    pub fn load(batch: Vec<Message>) -> Self {
        let mut view = Self::default();
        for message in batch {
            view.append(message);
        }
        view
    }

    /// Returns the new index, or `None` if the id is already present.
    pub fn append(&mut self, message: Message) -> Option<usize> {
        if !self.ids.insert(message.id) {
            return None;
        }
        self.messages.push(message);
        Some(self.messages.len() - 1)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
