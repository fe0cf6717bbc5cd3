// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-addressed message bodies under `blobs/<2 hex>/<id>.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chorus_core::{ChorusError, Message, MessageId};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, id: &MessageId) -> PathBuf {
        let digest = id.as_str().trim_start_matches("msg_");
        let shard = digest.get(..2).unwrap_or("00");
        self.root.join(shard).join(format!("{id}.json"))
    }

    /// Writes `message` unless a blob with its id exists.
    ///
    /// The body goes to a synced temp file which is then hard-linked into
    /// place, so a reader never sees a partial blob and an existing blob is
    /// never replaced. Returns `true` when this call created the blob.
    pub async fn put_if_absent(&self, message: &Message) -> Result<bool, ChorusError> {
        let path = self.path_for(&message.id);
        if fs::try_exists(&path).await? {
            return Ok(false);
        }

        let Some(dir) = path.parent() else {
            return Err(ChorusError::Internal(format!(
                "blob path has no parent: {}",
                path.display()
            )));
        };
        fs::create_dir_all(dir).await?;

        let tmp = dir.join(format!(".{}.{}.tmp", message.id, uuid::Uuid::new_v4()));
        let body = serde_json::to_vec_pretty(message)?;
        let written = write_synced(&tmp, &body).await;
        let linked = match written {
            Ok(()) => match fs::hard_link(&tmp, &path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };
        let _ = fs::remove_file(&tmp).await;
        linked
    }

    /// Atomically replaces the blob for `message.id`, creating it if absent.
    ///
    /// Only for blobs no log event refers to, left behind by a write that
    /// never reached the log.
    pub async fn replace(&self, message: &Message) -> Result<(), ChorusError> {
        let path = self.path_for(&message.id);
        let Some(dir) = path.parent() else {
            return Err(ChorusError::Internal(format!(
                "blob path has no parent: {}",
                path.display()
            )));
        };
        fs::create_dir_all(dir).await?;

        let tmp = dir.join(format!(".{}.{}.tmp", message.id, uuid::Uuid::new_v4()));
        let body = serde_json::to_vec_pretty(message)?;
        let renamed = match write_synced(&tmp, &body).await {
            Ok(()) => fs::rename(&tmp, &path).await.map_err(ChorusError::from),
            Err(e) => Err(e),
        };
        if renamed.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        renamed
    }

    pub async fn get(&self, id: &MessageId) -> Result<Option<Message>, ChorusError> {
        match fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn write_synced(path: &Path, body: &[u8]) -> Result<(), ChorusError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(body).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{
        AccountId, Author, MessageKind, MessageRefs, MessageSource, Platform, Tags, ThreadId,
        Visibility,
    };
    use chrono::Utc;

    fn message(id: &str, content: &str) -> Message {
        Message {
            id: MessageId::from(id),
            kind: MessageKind::DiscordMessage,
            content: content.into(),
            account_id: AccountId::from("acc_1"),
            author: Author {
                name: "Alice".into(),
                handle: "alice".into(),
            },
            created_at: Utc::now(),
            imported_at: Utc::now(),
            refs: MessageRefs {
                thread_id: ThreadId::from("thr_1"),
                reply_to: None,
            },
            source: MessageSource {
                platform: Platform::Discord,
                platform_id: "1".into(),
            },
            tags: Tags::new(),
            visibility: Visibility::Private,
        }
    }

    #[tokio::test]
    async fn sharded_by_digest_prefix() {
        let store = BlobStore::new("/blobs");
        let path = store.path_for(&MessageId::from("msg_abcdef"));
        assert_eq!(path, PathBuf::from("/blobs/ab/msg_abcdef.json"));
    }

    #[tokio::test]
    async fn never_overwrites_existing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        assert!(store.put_if_absent(&message("msg_aa01", "first")).await.unwrap());
        assert!(!store.put_if_absent(&message("msg_aa01", "second")).await.unwrap());

        let stored = store.get(&MessageId::from("msg_aa01")).await.unwrap().unwrap();
        assert_eq!(stored.content, "first");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("aa"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn replace_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        store.put_if_absent(&message("msg_bb01", "stale")).await.unwrap();
        store.replace(&message("msg_bb01", "fresh")).await.unwrap();
        store.replace(&message("msg_bb02", "new")).await.unwrap();

        let stored = store.get(&MessageId::from("msg_bb01")).await.unwrap().unwrap();
        assert_eq!(stored.content, "fresh");
        assert!(store.get(&MessageId::from("msg_bb02")).await.unwrap().is_some());
        assert_eq!(std::fs::read_dir(dir.path().join("bb")).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn missing_blob_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        assert!(store.get(&MessageId::from("msg_ff")).await.unwrap().is_none());
    }
}
