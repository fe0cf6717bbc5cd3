// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the search index.

use chorus_core::{
    Author, Message, MessageKind, MessageRefs, MessageSource, Platform, Tags, ThreadKind,
    Visibility,
};
use chorus_search::{SearchFilters, SearchIndex};
use chorus_store::{AccountSpec, ContentStore, NewMessage, ThreadSpec};
use chrono::{DateTime, TimeZone, Utc};

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap()
}

fn message(id: &str, platform: Platform, thread: &str, content: &str, minute: u32) -> Message {
    Message {
        id: id.into(),
        kind: MessageKind::for_platform(platform),
        content: content.to_string(),
        account_id: "acc_test".into(),
        author: Author {
            name: "Alice".into(),
            handle: "alice".into(),
        },
        created_at: at(minute),
        imported_at: at(minute),
        refs: MessageRefs {
            thread_id: thread.into(),
            reply_to: None,
        },
        source: MessageSource {
            platform,
            platform_id: id.to_string(),
        },
        tags: Tags::new(),
        visibility: Visibility::Private,
    }
}

async fn seeded() -> SearchIndex {
    let index = SearchIndex::open_in_memory().await.unwrap();
    let batch = vec![
        message("msg_1", Platform::Signal, "thr_a", "lunch at the harbour tomorrow?", 1),
        message("msg_2", Platform::Signal, "thr_a", "harbour works, see you at noon", 2),
        message("msg_3", Platform::Telegram, "thr_b", "deploy finished without errors", 3),
        message("msg_4", Platform::Email, "thr_c", "quarterly report attached", 4),
    ];
    assert_eq!(index.index_batch(&batch).await.unwrap(), 4);
    index
}

#[tokio::test]
async fn indexing_is_idempotent() {
    let index = seeded().await;
    let again = message("msg_1", Platform::Signal, "thr_a", "lunch at the harbour tomorrow?", 1);
    assert!(!index.index(&again).await.unwrap());
    assert_eq!(index.count().await.unwrap(), 4);
}

#[tokio::test]
async fn search_matches_all_terms_and_ranks() {
    let index = seeded().await;

    let hits = index.search("harbour", &SearchFilters::default()).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.score > 0.0));
    assert!(hits[0].snippet.contains("[harbour]"));

    let hits = index.search("harbour noon", &SearchFilters::default()).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "msg_2");
}

#[tokio::test]
async fn search_ignores_fts_syntax_in_input() {
    let index = seeded().await;
    let hits = index
        .search("report OR deploy", &SearchFilters::default())
        .await
        .unwrap();
    assert!(hits.is_empty());
    assert!(index.search("\"*", &SearchFilters::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn filters_narrow_results() {
    let index = seeded().await;

    let filters = SearchFilters {
        platform: Some(Platform::Telegram),
        ..Default::default()
    };
    assert!(index.search("harbour", &filters).await.unwrap().is_empty());

    let filters = SearchFilters {
        since: Some(at(2)),
        ..Default::default()
    };
    let hits = index.search("harbour", &filters).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "msg_2");

    let filters = SearchFilters {
        until: Some(at(2)),
        thread: Some("thr_a".into()),
        limit: Some(10),
        ..Default::default()
    };
    let hits = index.search("harbour", &filters).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "msg_1");
}

#[tokio::test]
async fn subject_tags_are_searchable() {
    let index = SearchIndex::open_in_memory().await.unwrap();
    let mut email = message("msg_9", Platform::Email, "thr_e", "see attached", 9);
    email.tags.insert(Tags::SUBJECT, "Invoice March");
    index.index(&email).await.unwrap();

    let hits = index.search("invoice", &SearchFilters::default()).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject.as_deref(), Some("Invoice March"));
}

#[tokio::test]
async fn recent_and_thread_listings_are_ordered() {
    let index = seeded().await;

    let recent = index.recent(2).await.unwrap();
    let ids: Vec<_> = recent.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["msg_4", "msg_3"]);

    index
        .index(&message("msg_5", Platform::Signal, "thr_a", "running late", 5))
        .await
        .unwrap();
    let thread = index.thread_messages(&"thr_a".into(), 2).await.unwrap();
    let ids: Vec<_> = thread.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["msg_2", "msg_5"]);
}

#[tokio::test]
async fn remove_all_empties_the_index() {
    let index = seeded().await;
    index.remove_all().await.unwrap();
    assert_eq!(index.count().await.unwrap(), 0);
    assert!(index.search("harbour", &SearchFilters::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn rebuild_repopulates_from_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path().join("store")).await.unwrap();
    let account = store
        .get_or_create_account(AccountSpec::new(Platform::Discord, "bob#1", "Bob"))
        .await
        .unwrap();
    let thread = store
        .get_or_create_thread(ThreadSpec {
            platform: Platform::Discord,
            conversation_id: "chan-1".into(),
            title: "general".into(),
            kind: ThreadKind::Channel,
            participants: vec![account.id.clone()],
        })
        .await
        .unwrap();
    for (i, text) in ["first ping", "second ping", "unrelated"].iter().enumerate() {
        store
            .create_message(NewMessage {
                kind: MessageKind::DiscordMessage,
                content: text.to_string(),
                account_id: account.id.clone(),
                author: Author {
                    name: "Bob".into(),
                    handle: "bob#1".into(),
                },
                created_at: at(i as u32),
                thread_id: thread.id.clone(),
                reply_to: None,
                source: MessageSource {
                    platform: Platform::Discord,
                    platform_id: format!("d{i}"),
                },
                tags: Tags::new(),
                visibility: Visibility::Private,
            })
            .await
            .unwrap();
    }

    let index = SearchIndex::open(&dir.path().join("search.db")).await.unwrap();
    index
        .index(&message("msg_stale", Platform::Signal, "thr_x", "stale ping", 0))
        .await
        .unwrap();

    assert_eq!(index.rebuild(&store).await.unwrap(), 3);
    assert_eq!(index.count().await.unwrap(), 3);
    let hits = index.search("ping", &SearchFilters::default()).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.platform == Platform::Discord));
    index.close().await.unwrap();
}

#[tokio::test]
async fn catch_up_indexes_only_missing_messages() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(dir.path().join("store")).await.unwrap();
    let account = store
        .get_or_create_account(AccountSpec::new(Platform::Telegram, "carol", "Carol"))
        .await
        .unwrap();
    let thread = store
        .get_or_create_thread(ThreadSpec {
            platform: Platform::Telegram,
            conversation_id: "chat-9".into(),
            title: "Carol".into(),
            kind: ThreadKind::Dm,
            participants: vec![account.id.clone()],
        })
        .await
        .unwrap();
    let mut written = Vec::new();
    for (i, text) in ["ferry at noon", "ferry delayed"].iter().enumerate() {
        let write = store
            .create_message(NewMessage {
                kind: MessageKind::TelegramMessage,
                content: text.to_string(),
                account_id: account.id.clone(),
                author: Author {
                    name: "Carol".into(),
                    handle: "carol".into(),
                },
                created_at: at(i as u32),
                thread_id: thread.id.clone(),
                reply_to: None,
                source: MessageSource {
                    platform: Platform::Telegram,
                    platform_id: format!("{i}"),
                },
                tags: Tags::new(),
                visibility: Visibility::Private,
            })
            .await
            .unwrap();
        written.push(write.message);
    }

    let index = SearchIndex::open_in_memory().await.unwrap();
    index.index(&written[0]).await.unwrap();

    assert_eq!(index.catch_up(&store).await.unwrap(), 1);
    assert_eq!(index.count().await.unwrap(), 2);
    assert_eq!(index.search("delayed", &SearchFilters::default()).await.unwrap().len(), 1);
    assert_eq!(index.catch_up(&store).await.unwrap(), 0);
}
