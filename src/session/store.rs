//! Bounded, expiring session store

use super::record::{MessageRef, Session};
use crate::state_machine::{FlowState, Pending};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Conversation key, one per chat
pub type ChatId = i64;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Point-in-time view of the store for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub sessions: usize,
    pub capacity: usize,
    /// Sessions in a state other than idle
    pub active_flows: usize,
    /// Sessions carrying a pending payload
    pub pending: usize,
    /// Conversations that lost a flow and have not written back since
    pub interrupted: usize,
    pub evicted: usize,
    pub expired: usize,
}

/// Per-conversation ephemeral context.
///
/// Every operation is atomic with respect to every other operation on the
/// same key. Reads and writes both refresh recency and the TTL clock; a read
/// of a missing session never creates one.
pub trait SessionStore: Send + Sync {
    fn state(&self, chat: ChatId) -> Option<FlowState>;
    fn set_state(&self, chat: ChatId, state: FlowState);

    fn pending(&self, chat: ChatId) -> Option<Pending>;
    fn set_pending(&self, chat: ChatId, pending: Pending);

    fn last_message(&self, chat: ChatId) -> Option<MessageRef>;
    fn set_last_message(&self, chat: ChatId, message: MessageRef);

    fn append_history(&self, chat: ChatId, message: MessageRef);
    /// Set the last message and append it to the history under one lock
    fn record_outbound(&self, chat: ChatId, message: MessageRef);
    /// Copy of the outbound history, oldest first
    fn history(&self, chat: ChatId) -> Vec<MessageRef>;

    /// Copy of the whole record, taken under one lock
    fn snapshot(&self, chat: ChatId) -> Option<Session>;
    /// Write state and pending together. `None` clears the pending payload.
    fn commit(&self, chat: ChatId, state: FlowState, pending: Option<Pending>);

    /// Remove every facet for the key. Idempotent.
    fn clear(&self, chat: ChatId);

    /// Whether the key lost an unfinished flow since it was last written.
    /// Consumes the mark.
    fn take_interrupted(&self, chat: ChatId) -> bool;

    /// Remove sessions idle for longer than the TTL. Returns how many went.
    fn sweep_expired(&self) -> usize;

    fn stats(&self) -> StoreStats;
}

struct Inner {
    sessions: LruCache<ChatId, Session>,
    interrupted: LruCache<ChatId, Instant>,
    evicted: usize,
    expired: usize,
}

impl Inner {
    /// Fetch the session for writing, creating it if absent
    fn entry(&mut self, chat: ChatId, now: Instant) -> &mut Session {
        if !self.sessions.contains(&chat) {
            if self.sessions.len() >= self.sessions.cap().get() {
                if let Some((evicted, session)) = self.sessions.pop_lru() {
                    tracing::debug!(chat_id = evicted, state = %session.state, "Evicted least recently used session");
                    self.evicted += 1;
                    self.retire(evicted, &session, now);
                }
            }
            self.interrupted.pop(&chat);
        }
        let session = self.sessions.get_or_insert_mut(chat, || Session::new(now));
        session.last_access = now;
        session
    }

    /// Fetch an existing session, refreshing it
    fn touch(&mut self, chat: ChatId, now: Instant) -> Option<&mut Session> {
        let session = self.sessions.get_mut(&chat)?;
        session.last_access = now;
        Some(session)
    }

    fn retire(&mut self, chat: ChatId, session: &Session, now: Instant) {
        if session.mid_flow() {
            self.interrupted.put(chat, now);
        }
    }
}

/// In-memory store: one LRU of whole session records behind one mutex
pub struct MemorySessionStore {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                sessions: LruCache::new(cap),
                interrupted: LruCache::new(cap),
                evicted: 0,
                expired: 0,
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sweep as if the clock read `now`
    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut inner = self.lock();

        let stale: Vec<ChatId> = inner
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_access) > ttl)
            .map(|(chat, _)| *chat)
            .collect();
        for chat in &stale {
            if let Some(session) = inner.sessions.pop(chat) {
                inner.retire(*chat, &session, now);
            }
        }
        inner.expired += stale.len();

        let forgotten: Vec<ChatId> = inner
            .interrupted
            .iter()
            .filter(|(_, at)| now.saturating_duration_since(**at) > ttl)
            .map(|(chat, _)| *chat)
            .collect();
        for chat in &forgotten {
            inner.interrupted.pop(chat);
        }

        stale.len()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl SessionStore for MemorySessionStore {
    fn state(&self, chat: ChatId) -> Option<FlowState> {
        self.lock().touch(chat, Instant::now()).map(|s| s.state)
    }

    fn set_state(&self, chat: ChatId, state: FlowState) {
        self.lock().entry(chat, Instant::now()).state = state;
    }

    fn pending(&self, chat: ChatId) -> Option<Pending> {
        self.lock()
            .touch(chat, Instant::now())
            .and_then(|s| s.pending.clone())
    }

    fn set_pending(&self, chat: ChatId, pending: Pending) {
        self.lock().entry(chat, Instant::now()).pending = Some(pending);
    }

    fn last_message(&self, chat: ChatId) -> Option<MessageRef> {
        self.lock()
            .touch(chat, Instant::now())
            .and_then(|s| s.last_message)
    }

    fn set_last_message(&self, chat: ChatId, message: MessageRef) {
        self.lock().entry(chat, Instant::now()).last_message = Some(message);
    }

    fn append_history(&self, chat: ChatId, message: MessageRef) {
        self.lock().entry(chat, Instant::now()).push_history(message);
    }

    fn record_outbound(&self, chat: ChatId, message: MessageRef) {
        let mut inner = self.lock();
        let session = inner.entry(chat, Instant::now());
        session.last_message = Some(message);
        session.push_history(message);
    }

    fn history(&self, chat: ChatId) -> Vec<MessageRef> {
        self.lock()
            .touch(chat, Instant::now())
            .map(|s| s.history.iter().copied().collect())
            .unwrap_or_default()
    }

    fn snapshot(&self, chat: ChatId) -> Option<Session> {
        self.lock().touch(chat, Instant::now()).map(|s| s.clone())
    }

    fn commit(&self, chat: ChatId, state: FlowState, pending: Option<Pending>) {
        let mut inner = self.lock();
        let session = inner.entry(chat, Instant::now());
        session.state = state;
        session.pending = pending;
        tracing::debug!(chat_id = chat, state = %state, "Session committed");
    }

    fn clear(&self, chat: ChatId) {
        let mut inner = self.lock();
        if let Some(session) = inner.sessions.pop(&chat) {
            inner.retire(chat, &session, Instant::now());
            tracing::debug!(chat_id = chat, "Session cleared");
        }
    }

    fn take_interrupted(&self, chat: ChatId) -> bool {
        let ttl = self.ttl;
        self.lock()
            .interrupted
            .pop(&chat)
            .is_some_and(|at| at.elapsed() <= ttl)
    }

    fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn stats(&self) -> StoreStats {
        let inner = self.lock();
        let mut stats = StoreStats {
            sessions: inner.sessions.len(),
            capacity: inner.sessions.cap().get(),
            active_flows: 0,
            pending: 0,
            interrupted: inner.interrupted.len(),
            evicted: inner.evicted,
            expired: inner.expired,
        };
        for (_, session) in &inner.sessions {
            if !session.state.is_idle() {
                stats.active_flows += 1;
            }
            if session.pending.is_some() {
                stats.pending += 1;
            }
        }
        stats
    }
}
