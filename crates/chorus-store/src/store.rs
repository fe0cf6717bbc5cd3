// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The content store: event log, blobs and the indexes rebuilt from them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chorus_core::{
    Account, AccountId, AccountStats, ChorusError, Identity, Message, MessageId, MessageRefs,
    Platform, Thread, ThreadId, ThreadStats, ids,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::blob::BlobStore;
use crate::log::{self, EventLog, LogEntry, StoreEvent};
use crate::models::{AccountSpec, MessageMeta, MessageWrite, NewMessage, StoreStats, ThreadSpec};

type IdentityKey = (Platform, String);

/// Durable, deduplicating message store.
///
/// Reads are served from in-memory indexes. Account and thread creation
/// happen while holding the log writer, so two concurrent creations of
/// the same entity cannot fork it. Message ids are claimed through
/// `DashMap::entry`, so only one writer of a given message ever appends
/// its event.
pub struct ContentStore {
    root: PathBuf,
    log: Mutex<EventLog>,
    blobs: BlobStore,
    accounts: DashMap<AccountId, Account>,
    identities: DashMap<IdentityKey, AccountId>,
    self_accounts: DashMap<Platform, AccountId>,
    threads: DashMap<ThreadId, Thread>,
    account_threads: DashMap<AccountId, BTreeSet<ThreadId>>,
    messages: DashMap<MessageId, MessageMeta>,
    sources: DashMap<IdentityKey, MessageId>,
}

impl ContentStore {
    /// Opens (or creates) the store at `root` and replays its event log.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, ChorusError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join("events")).await?;
        tokio::fs::create_dir_all(root.join("blobs")).await?;

        let store = Self {
            log: Mutex::new(EventLog::new(root.join("events"))),
            blobs: BlobStore::new(root.join("blobs")),
            root,
            accounts: DashMap::new(),
            identities: DashMap::new(),
            self_accounts: DashMap::new(),
            threads: DashMap::new(),
            account_threads: DashMap::new(),
            messages: DashMap::new(),
            sources: DashMap::new(),
        };

        let entries = log::replay(&store.root.join("events")).await?;
        let replayed = entries.len();
        for entry in entries {
            store.apply(entry.event);
        }

        info!(
            root = %store.root.display(),
            events = replayed,
            accounts = store.accounts.len(),
            threads = store.threads.len(),
            messages = store.messages.len(),
            "content store opened"
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // --- accounts ---

    /// Finds the account owning `(platform, handle)` or creates it.
    pub async fn get_or_create_account(&self, spec: AccountSpec) -> Result<Account, ChorusError> {
        let handle = ids::normalize_handle(&spec.handle);
        if handle.is_empty() {
            return Err(ChorusError::Validation("account handle is empty".into()));
        }
        if let Some(existing) = self.lookup_account(spec.platform, &handle) {
            return Ok(existing);
        }

        let mut log = self.log.lock().await;
        if let Some(existing) = self.lookup_account(spec.platform, &handle) {
            return Ok(existing);
        }

        let id = ids::account_id(spec.platform, &handle);
        if spec.is_self
            && let Some(current) = self.self_accounts.get(&spec.platform)
            && *current != id
        {
            return Err(ChorusError::Validation(format!(
                "{} already has self account {}",
                spec.platform,
                current.value()
            )));
        }

        let display_name = if spec.display_name.trim().is_empty() {
            spec.handle.trim().to_string()
        } else {
            spec.display_name
        };
        let event = StoreEvent::AccountCreated {
            id: id.clone(),
            display_name,
            identity: Identity {
                platform: spec.platform,
                handle,
            },
            is_self: spec.is_self,
            created_at: Utc::now(),
        };
        append(&mut log, &event).await?;
        self.apply(event);
        drop(log);

        debug!(account_id = %id, platform = %spec.platform, "account created");
        self.get_account(&id)
            .ok_or_else(|| ChorusError::Internal(format!("account {id} missing after create")))
    }

    /// Links another platform handle to an existing account.
    pub async fn add_identity(
        &self,
        account_id: &AccountId,
        identity: Identity,
    ) -> Result<Account, ChorusError> {
        let identity = Identity {
            platform: identity.platform,
            handle: ids::normalize_handle(&identity.handle),
        };
        if identity.handle.is_empty() {
            return Err(ChorusError::Validation("identity handle is empty".into()));
        }

        let mut log = self.log.lock().await;
        if !self.accounts.contains_key(account_id) {
            return Err(ChorusError::Validation(format!(
                "unknown account {account_id}"
            )));
        }
        let key = (identity.platform, identity.handle.clone());
        match self.identities.get(&key).map(|owner| owner.value().clone()) {
            Some(owner) if owner == *account_id => {}
            Some(owner) => {
                return Err(ChorusError::Validation(format!(
                    "{}:{} already belongs to {owner}",
                    identity.platform, identity.handle
                )));
            }
            None => {
                let event = StoreEvent::AccountIdentityAdded {
                    id: account_id.clone(),
                    identity,
                };
                append(&mut log, &event).await?;
                self.apply(event);
            }
        }
        drop(log);

        self.get_account(account_id)
            .ok_or_else(|| ChorusError::Internal(format!("account {account_id} vanished")))
    }

    /// Changes the display name. Author snapshots on stored messages keep
    /// the name they were sent under.
    pub async fn rename_account(
        &self,
        account_id: &AccountId,
        display_name: &str,
    ) -> Result<Account, ChorusError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ChorusError::Validation("display name is empty".into()));
        }

        let mut log = self.log.lock().await;
        let current = self
            .accounts
            .get(account_id)
            .map(|a| a.display_name.clone())
            .ok_or_else(|| ChorusError::Validation(format!("unknown account {account_id}")))?;
        if current != display_name {
            let event = StoreEvent::AccountRenamed {
                id: account_id.clone(),
                display_name: display_name.to_string(),
            };
            append(&mut log, &event).await?;
            self.apply(event);
        }
        drop(log);

        self.get_account(account_id)
            .ok_or_else(|| ChorusError::Internal(format!("account {account_id} vanished")))
    }

    pub fn get_account(&self, id: &AccountId) -> Option<Account> {
        self.accounts.get(id).map(|a| a.clone())
    }

    pub fn find_account(&self, platform: Platform, handle: &str) -> Option<Account> {
        self.lookup_account(platform, &ids::normalize_handle(handle))
    }

    pub fn self_account(&self, platform: Platform) -> Option<Account> {
        let id = self.self_accounts.get(&platform)?.value().clone();
        self.get_account(&id)
    }

    pub fn list_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|a| a.clone()).collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        accounts
    }

    fn lookup_account(&self, platform: Platform, normalized: &str) -> Option<Account> {
        let by_identity = self
            .identities
            .get(&(platform, normalized.to_string()))
            .map(|id| id.value().clone());
        let id = by_identity.unwrap_or_else(|| ids::account_id(platform, normalized));
        self.get_account(&id)
    }

    // --- threads ---

    /// Finds the thread for `(platform, conversation_id)` or creates it.
    /// Participants not yet on the thread are appended.
    pub async fn get_or_create_thread(&self, spec: ThreadSpec) -> Result<Thread, ChorusError> {
        if spec.conversation_id.trim().is_empty() {
            return Err(ChorusError::Validation("conversation id is empty".into()));
        }
        for participant in &spec.participants {
            if !self.accounts.contains_key(participant) {
                return Err(ChorusError::Validation(format!(
                    "unknown participant {participant}"
                )));
            }
        }

        let id = ids::thread_id(spec.platform, &spec.conversation_id);
        if let Some(thread) = self.threads.get(&id)
            && spec.participants.iter().all(|p| thread.participants.contains(p))
        {
            return Ok(thread.clone());
        }

        let mut log = self.log.lock().await;
        let event = match self.threads.get(&id).map(|t| t.participants.clone()) {
            Some(existing) => {
                let added = new_participants(&existing, &spec.participants);
                if added.is_empty() {
                    None
                } else {
                    Some(StoreEvent::ThreadParticipantsAdded {
                        id: id.clone(),
                        participants: added,
                    })
                }
            }
            None => Some(StoreEvent::ThreadCreated {
                id: id.clone(),
                title: spec.title.clone(),
                kind: spec.kind,
                source: chorus_core::ThreadSource {
                    platform: spec.platform,
                    conversation_id: spec.conversation_id.clone(),
                },
                participants: new_participants(&[], &spec.participants),
                created_at: Utc::now(),
            }),
        };
        if let Some(event) = event {
            append(&mut log, &event).await?;
            self.apply(event);
        }
        drop(log);

        self.get_thread(&id)
            .ok_or_else(|| ChorusError::Internal(format!("thread {id} missing after create")))
    }

    pub fn get_thread(&self, id: &ThreadId) -> Option<Thread> {
        self.threads.get(id).map(|t| t.clone())
    }

    pub fn list_threads(&self) -> Vec<Thread> {
        let mut threads: Vec<Thread> = self.threads.iter().map(|t| t.clone()).collect();
        sort_by_activity(&mut threads);
        threads
    }

    /// Threads the account participates in or has authored messages in,
    /// most recently active first.
    pub fn list_threads_for_account(&self, account_id: &AccountId) -> Vec<Thread> {
        let Some(thread_ids) = self.account_threads.get(account_id).map(|s| s.clone()) else {
            return Vec::new();
        };
        let mut threads: Vec<Thread> = thread_ids
            .iter().filter_map(|id| self.get_thread(id)).collect();
        sort_by_activity(&mut threads);
        threads
    }

    // --- messages ---

    /// Stores a message, deduplicating on its content-derived id.
    ///
    /// Order: validate, derive id, write the blob, claim the id, append the
    /// log event, bump counters. A failed append releases the claim, so the
    /// call can be retried unchanged. A blob already on disk for an unclaimed
    /// id is an orphan from an interrupted write and is replaced.
    pub async fn create_message(&self, new: NewMessage) -> Result<MessageWrite, ChorusError> {
        self.validate(&new)?;

        let created_at = ids::truncate_to_millis(new.created_at);
        let id = ids::message_id(
            new.kind,
            &new.content,
            created_at,
            new.source.platform,
            &new.source.platform_id,
        );

        if self.messages.contains_key(&id) {
            return self.duplicate(&id).await;
        }

        let imported_at = Utc::now();
        let message = Message {
            id: id.clone(),
            kind: new.kind,
            content: new.content,
            account_id: new.account_id,
            author: new.author,
            created_at,
            imported_at,
            refs: MessageRefs {
                thread_id: new.thread_id,
                reply_to: new.reply_to,
            },
            source: new.source,
            tags: new.tags,
            visibility: new.visibility,
        };
        let fresh_blob = self.blobs.put_if_absent(&message).await?;

        let meta = MessageMeta {
            id: id.clone(),
            account_id: message.account_id.clone(),
            thread_id: message.refs.thread_id.clone(),
            created_at,
            imported_at,
            platform: message.source.platform,
            kind: message.kind,
            platform_id: message.source.platform_id.clone(),
        };
        let claimed = match self.messages.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(meta.clone());
                true
            }
        };
        if !claimed {
            return self.duplicate(&id).await;
        }
        if !fresh_blob {
            if let Err(e) = self.blobs.replace(&message).await {
                self.messages.remove(&id);
                return Err(e);
            }
            debug!(message_id = %id, "orphaned blob replaced");
        }

        let event = StoreEvent::MessageCreated {
            id: id.clone(),
            account_id: meta.account_id.clone(),
            thread_id: meta.thread_id.clone(),
            created_at,
            imported_at,
            platform: meta.platform,
            kind: meta.kind,
            platform_id: meta.platform_id.clone(),
        };
        let appended = {
            let mut log = self.log.lock().await;
            append(&mut log, &event).await
        };
        if let Err(e) = appended {
            self.messages.remove(&id);
            warn!(message_id = %id, error = %e, "event log append failed; claim released");
            return Err(e);
        }

        self.index_message(&meta);
        debug!(message_id = %id, thread_id = %meta.thread_id, "message stored");
        Ok(MessageWrite {
            message,
            inserted: true,
        })
    }

    /// Reads a stored message body.
    pub async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, ChorusError> {
        if !self.messages.contains_key(id) {
            return Ok(None);
        }
        self.blobs.get(id).await
    }

    pub fn get_message_meta(&self, id: &MessageId) -> Option<MessageMeta> {
        self.messages.get(id).map(|m| m.clone())
    }

    /// Resolves a platform-native message id to a stored message id.
    pub fn find_by_source(&self, platform: Platform, platform_id: &str) -> Option<MessageId> {
        self.sources
            .get(&(platform, platform_id.to_string()))
            .map(|id| id.value().clone())
    }

    /// Metadata of every stored message, optionally limited to one thread,
    /// in `(created_at, id)` order.
    pub fn messages(&self, thread: Option<&ThreadId>) -> Vec<MessageMeta> {
        let mut out: Vec<MessageMeta> = self
            .messages
            .iter()
            .filter(|m| thread.is_none_or(|t| m.thread_id == *t))
            .map(|m| m.clone())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn stats(&self) -> StoreStats {
        let mut per_platform = BTreeMap::new();
        for meta in self.messages.iter() {
            *per_platform.entry(meta.platform).or_insert(0u64) += 1;
        }
        StoreStats {
            accounts: self.accounts.len() as u64,
            threads: self.threads.len() as u64,
            messages: self.messages.len() as u64,
            per_platform,
        }
    }

    fn validate(&self, new: &NewMessage) -> Result<(), ChorusError> {
        if new.content.trim().is_empty() {
            return Err(ChorusError::Validation("message content is empty".into()));
        }
        if new.author.handle.trim().is_empty() {
            return Err(ChorusError::Validation("author handle is empty".into()));
        }
        if new.source.platform_id.trim().is_empty() {
            return Err(ChorusError::Validation("platform message id is empty".into()));
        }
        if !self.accounts.contains_key(&new.account_id) {
            return Err(ChorusError::Validation(format!(
                "unknown account {}",
                new.account_id
            )));
        }
        let thread_platform = self
            .threads
            .get(&new.thread_id)
            .map(|t| t.source.platform)
            .ok_or_else(|| ChorusError::Validation(format!("unknown thread {}", new.thread_id)))?;
        if thread_platform != new.source.platform {
            return Err(ChorusError::Validation(format!(
                "message from {} cannot be stored in {} thread {}",
                new.source.platform, thread_platform, new.thread_id
            )));
        }
        Ok(())
    }

    async fn duplicate(&self, id: &MessageId) -> Result<MessageWrite, ChorusError> {
        let message = self
            .blobs
            .get(id)
            .await?
            .ok_or_else(|| ChorusError::storage(format!("blob for {id} is missing")))?;
        Ok(MessageWrite {
            message,
            inserted: false,
        })
    }

    /// Applies a logged event to the indexes. Used by replay and by every
    /// write after its append succeeded.
    fn apply(&self, event: StoreEvent) {
        match event {
            StoreEvent::AccountCreated {
                id,
                display_name,
                identity,
                is_self,
                created_at,
            } => {
                self.identities
                    .insert((identity.platform, identity.handle.clone()), id.clone());
                if is_self {
                    self.self_accounts.insert(identity.platform, id.clone());
                }
                self.accounts.entry(id.clone()).or_insert(Account {
                    id,
                    display_name,
                    identities: vec![identity],
                    is_self,
                    created_at,
                    stats: AccountStats::default(),
                });
            }
            StoreEvent::AccountIdentityAdded { id, identity } => {
                if let Some(mut account) = self.accounts.get_mut(&id) {
                    self.identities
                        .insert((identity.platform, identity.handle.clone()), id.clone());
                    if !account.has_identity(identity.platform, &identity.handle) {
                        account.identities.push(identity);
                    }
                }
            }
            StoreEvent::AccountRenamed { id, display_name } => {
                if let Some(mut account) = self.accounts.get_mut(&id) {
                    account.display_name = display_name;
                }
            }
            StoreEvent::ThreadCreated {
                id,
                title,
                kind,
                source,
                participants,
                created_at,
            } => {
                for participant in &participants {
                    self.link(participant, &id);
                }
                self.threads.entry(id.clone()).or_insert(Thread {
                    id,
                    title,
                    kind,
                    participants,
                    source,
                    created_at,
                    stats: ThreadStats::default(),
                });
            }
            StoreEvent::ThreadParticipantsAdded { id, participants } => {
                for participant in &participants {
                    self.link(participant, &id);
                }
                if let Some(mut thread) = self.threads.get_mut(&id) {
                    let added = new_participants(&thread.participants, &participants);
                    thread.participants.extend(added);
                }
            }
            StoreEvent::MessageCreated {
                id,
                account_id,
                thread_id,
                created_at,
                imported_at,
                platform,
                kind,
                platform_id,
            } => {
                let meta = MessageMeta {
                    id: id.clone(),
                    account_id,
                    thread_id,
                    created_at,
                    imported_at,
                    platform,
                    kind,
                    platform_id,
                };
                if self.messages.insert(id, meta.clone()).is_none() {
                    self.index_message(&meta);
                }
            }
        }
    }

    /// Source index, thread membership and counters for a newly stored message.
    fn index_message(&self, meta: &MessageMeta) {
        self.sources
            .insert((meta.platform, meta.platform_id.clone()), meta.id.clone());
        self.link(&meta.account_id, &meta.thread_id);

        if let Some(mut account) = self.accounts.get_mut(&meta.account_id) {
            account.stats.message_count += 1;
            account.stats.last_active_at = latest(account.stats.last_active_at, meta.created_at);
        }
        if let Some(mut thread) = self.threads.get_mut(&meta.thread_id) {
            thread.stats.message_count += 1;
            thread.stats.last_message_at = latest(thread.stats.last_message_at, meta.created_at);
        }
    }

    fn link(&self, account: &AccountId, thread: &ThreadId) {
        self.account_threads
            .entry(account.clone())
            .or_default()
            .insert(thread.clone());
    }
}

async fn append(log: &mut EventLog, event: &StoreEvent) -> Result<(), ChorusError> {
    log.append(&LogEntry {
        at: Utc::now(),
        event: event.clone(),
    })
    .await
}

fn new_participants(existing: &[AccountId], requested: &[AccountId]) -> Vec<AccountId> {
    let mut added: Vec<AccountId> = Vec::new();
    for p in requested {
        if !existing.contains(p) && !added.contains(p) {
            added.push(p.clone());
        }
    }
    added
}

fn latest(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(current.map_or(candidate, |c| c.max(candidate)))
}

fn sort_by_activity(threads: &mut [Thread]) {
    threads.sort_by(|a, b| {
        b.stats
            .last_message_at
            .cmp(&a.stats.last_message_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
