//! Property-based tests for the session store
//!
//! The store is checked against a plain recency list of keys.

use super::*;
use crate::state_machine::{FlowState, Pending};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Commit(ChatId),
    Read(ChatId),
    Append(ChatId, MessageRef),
    Clear(ChatId),
}

fn arb_op() -> impl Strategy<Value = Op> {
    let chat = 0..12_i64;
    prop_oneof![
        chat.clone().prop_map(Op::Commit),
        chat.clone().prop_map(Op::Read),
        (chat.clone(), any::<i32>()).prop_map(|(c, m)| Op::Append(c, m)),
        chat.prop_map(Op::Clear),
    ]
}

/// Keys ordered least to most recently used
#[derive(Default)]
struct Model {
    order: Vec<ChatId>,
}

impl Model {
    fn bump(&mut self, chat: ChatId) -> bool {
        if let Some(pos) = self.order.iter().position(|c| *c == chat) {
            self.order.remove(pos);
            self.order.push(chat);
            true
        } else {
            false
        }
    }

    fn write(&mut self, chat: ChatId, capacity: usize) {
        if !self.bump(chat) {
            if self.order.len() == capacity {
                self.order.remove(0);
            }
            self.order.push(chat);
        }
    }

    fn clear(&mut self, chat: ChatId) {
        self.order.retain(|c| *c != chat);
    }
}

fn pending_for(chat: ChatId) -> Pending {
    Pending::RenameCategory {
        category_id: chat.to_string(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_store_matches_lru_model(
        capacity in 1usize..6,
        ops in proptest::collection::vec(arb_op(), 0..60)
    ) {
        let store = MemorySessionStore::new(capacity, Duration::from_secs(3600));
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Commit(chat) => {
                    store.commit(chat, FlowState::EditingCategory, Some(pending_for(chat)));
                    model.write(chat, capacity);
                }
                Op::Read(chat) => {
                    let found = store.state(chat).is_some();
                    prop_assert_eq!(found, model.bump(chat));
                }
                Op::Append(chat, message) => {
                    store.append_history(chat, message);
                    model.write(chat, capacity);
                }
                Op::Clear(chat) => {
                    store.clear(chat);
                    model.clear(chat);
                }
            }
            prop_assert!(store.stats().sessions <= capacity);
            prop_assert_eq!(store.stats().sessions, model.order.len());
        }

        for chat in 0..12 {
            let snapshot = store.snapshot(chat);
            prop_assert_eq!(snapshot.is_some(), model.order.contains(&chat));
            // Facets never come from a different session
            if let Some(Pending::RenameCategory { category_id }) = snapshot.and_then(|s| s.pending) {
                prop_assert_eq!(category_id, chat.to_string());
            }
        }
    }

    #[test]
    fn prop_history_bounded_and_ordered(messages in proptest::collection::vec(any::<i32>(), 0..250)) {
        let store = MemorySessionStore::default();
        for m in &messages {
            store.append_history(1, *m);
        }

        let history = store.history(1);
        let keep = messages.len().min(HISTORY_LIMIT);
        prop_assert_eq!(history.len(), keep);
        prop_assert_eq!(&history[..], &messages[messages.len() - keep..]);
    }
}
