//! Read-through query cache with tag invalidation.
//!
//! Queries are cached by key and labelled with tags; a mutation invalidates
//! the tags it touches, dropping every entry that carries one of them and
//! flagging the subscribers of those keys. Request tickets fence out
//! responses that arrive after a newer request for the same key was issued.

use std::collections::{HashMap, HashSet};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Terms,
    Plans,
    Reports,
    Expenses,
    Lookups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    key: String,
    seq: u64,
}

struct Entry<V> {
    value: V,
    tags: Vec<Tag>,
}

pub struct QueryCache<V> {
    entries: HashMap<String, Entry<V>>,
    subscribers: HashMap<String, Vec<SubscriptionId>>,
    notified: HashSet<SubscriptionId>,
    latest_request: HashMap<String, u64>,
    next_id: u64,
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            subscribers: HashMap::new(),
            notified: HashSet::new(),
            latest_request: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<V> QueryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached value or run `fetch` and cache its result under `tags`.
    /// Fetch errors are returned and nothing is cached.
    pub fn get_or_fetch<F>(&mut self, key: &str, tags: &[Tag], fetch: F) -> Result<&V>
    where
        F: FnOnce() -> Result<V>,
    {
        if !self.entries.contains_key(key) {
            log::debug!("cache miss: {key}");
            let value = fetch()?;
            self.insert(key, tags, value);
        }
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| crate::error::FinplanError::Other(format!("cache entry vanished: {key}")))?;
        Ok(&entry.value)
    }

    fn insert(&mut self, key: &str, tags: &[Tag], value: V) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                tags: tags.to_vec(),
            },
        );
    }

    /// Start a request for `key`. Only the most recent ticket may complete.
    #[allow(dead_code)]
    pub fn begin_request(&mut self, key: &str) -> RequestTicket {
        let seq = self.next();
        self.latest_request.insert(key.to_string(), seq);
        RequestTicket {
            key: key.to_string(),
            seq,
        }
    }

    /// Store a response. Returns `false` and drops the value when a newer
    /// request for the same key has been started since `ticket` was issued.
    #[allow(dead_code)]
    pub fn complete(&mut self, ticket: RequestTicket, tags: &[Tag], value: V) -> bool {
        if self.latest_request.get(&ticket.key) != Some(&ticket.seq) {
            log::debug!("dropping stale response for {}", ticket.key);
            return false;
        }
        self.latest_request.remove(&ticket.key);
        self.insert(&ticket.key, tags, value);
        self.notify(&ticket.key);
        true
    }

    /// Drop every entry tagged with `tag`. Returns how many were dropped.
    pub fn invalidate(&mut self, tag: Tag) -> usize {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.tags.contains(&tag))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            self.entries.remove(key);
            self.notify(key);
        }
        if !stale.is_empty() {
            log::debug!("invalidated {tag:?}: {} entries", stale.len());
        }
        stale.len()
    }

    pub fn subscribe(&mut self, key: &str) -> SubscriptionId {
        let id = SubscriptionId(self.next());
        self.subscribers.entry(key.to_string()).or_default().push(id);
        id
    }

    /// Stop flagging `id` when its key changes.
    #[allow(dead_code)]
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        for subs in self.subscribers.values_mut() {
            subs.retain(|s| *s != id);
        }
        self.notified.remove(&id);
    }

    /// Whether the subscribed key changed since the last call.
    pub fn take_notification(&mut self, id: SubscriptionId) -> bool {
        self.notified.remove(&id)
    }

    fn notify(&mut self, key: &str) {
        if let Some(subs) = self.subscribers.get(key) {
            self.notified.extend(subs.iter().copied());
        }
    }
}
