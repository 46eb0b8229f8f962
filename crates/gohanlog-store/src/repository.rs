// ABOUTME: Log repository: CRUD over dining logs, each write paired with tag ledger updates in one transaction.
// ABOUTME: Also exposes tag curation (create, rename/merge, emoji, delete) and publishes a change event after every commit.

use std::collections::HashSet;

use chrono::{Local, NaiveDate};
use gohanlog_core::{Log, LogDraft, LogFilter, Operation, Tag, TagType};

use crate::changes::ChangeFeed;
use crate::config::{GohanConfig, ImageStorage};
use crate::engine::{Store, logs};
use crate::error::StoreError;
use crate::ledger::{self, RenameOutcome};

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// The data layer's interface to the UI for logs and tags.
#[derive(Clone)]
pub struct LogRepository {
    store: Store,
    feed: ChangeFeed,
    page_size: usize,
    image_storage: ImageStorage,
    today: fn() -> NaiveDate,
}

impl LogRepository {
    pub fn new(store: Store, feed: ChangeFeed) -> Self {
        Self {
            store,
            feed,
            page_size: gohanlog_core::DEFAULT_PAGE_SIZE,
            image_storage: ImageStorage::default(),
            today: local_today,
        }
    }

    pub fn with_config(store: Store, feed: ChangeFeed, config: &GohanConfig) -> Self {
        Self {
            page_size: config.page_size,
            image_storage: config.image_storage,
            ..Self::new(store, feed)
        }
    }

    /// Replace the clock used for `last_used` dates.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn prepare(&self, draft: LogDraft) -> Result<LogDraft, StoreError> {
        let mut draft = draft.normalized()?;
        if self.image_storage != ImageStorage::AsGiven {
            draft.photos = convert_all(self.image_storage, draft.photos)?;
            draft.thumbnails = convert_all(self.image_storage, draft.thumbnails)?;
        }
        Ok(draft)
    }

    /// Insert a log and bump its place and people. Returns the new log id.
    pub async fn create_log(&self, draft: LogDraft) -> Result<i64, StoreError> {
        let draft = self.prepare(draft)?;
        let today = (self.today)();

        let id = self
            .store
            .write(move |tx| {
                let id = logs::insert_log(tx, &draft)?;
                ledger::bump(tx, TagType::Place, &draft.place, today)?;
                for person in &draft.people {
                    ledger::bump(tx, TagType::Person, person, today)?;
                }
                Ok(id)
            })
            .await?;

        tracing::debug!("created log {}", id);
        self.feed.publish(Operation::LogCreated { log_id: id });
        Ok(id)
    }

    pub async fn get_log(&self, id: i64) -> Result<Log, StoreError> {
        self.store
            .read(move |conn| logs::get_log(conn, id)?.ok_or_else(|| StoreError::log_not_found(id)))
            .await
    }

    /// Replace a log's fields. Only names that were added or removed move tag
    /// counts; members present before and after are left alone.
    pub async fn update_log(&self, id: i64, draft: LogDraft) -> Result<(), StoreError> {
        let draft = self.prepare(draft)?;
        let today = (self.today)();

        self.store
            .write(move |tx| {
                let old = logs::get_summary(tx, id)?.ok_or_else(|| StoreError::log_not_found(id))?;
                logs::replace_log(tx, id, &draft)?;

                if old.place != draft.place {
                    ledger::release(tx, TagType::Place, &old.place)?;
                    ledger::bump(tx, TagType::Place, &draft.place, today)?;
                }

                let before: HashSet<&str> = old.people.iter().map(String::as_str).collect();
                let after: HashSet<&str> = draft.people.iter().map(String::as_str).collect();
                for removed in old.people.iter().filter(|p| !after.contains(p.as_str())) {
                    ledger::release(tx, TagType::Person, removed)?;
                }
                for added in draft.people.iter().filter(|p| !before.contains(p.as_str())) {
                    ledger::bump(tx, TagType::Person, added, today)?;
                }
                Ok(())
            })
            .await?;

        tracing::debug!("updated log {}", id);
        self.feed.publish(Operation::LogUpdated { log_id: id });
        Ok(())
    }

    /// Delete a log and release its place and people.
    pub async fn delete_log(&self, id: i64) -> Result<(), StoreError> {
        self.store
            .write(move |tx| {
                let old = logs::get_summary(tx, id)?.ok_or_else(|| StoreError::log_not_found(id))?;
                logs::delete_log(tx, id)?;
                ledger::release(tx, TagType::Place, &old.place)?;
                for person in &old.people {
                    ledger::release(tx, TagType::Person, person)?;
                }
                Ok(())
            })
            .await?;

        tracing::debug!("deleted log {}", id);
        self.feed.publish(Operation::LogDeleted { log_id: id });
        Ok(())
    }

    /// Remove every log and zero every tag count, keeping the tag catalog.
    pub async fn delete_all_logs(&self) -> Result<(), StoreError> {
        let (removed, reset) = self
            .store
            .write(|tx| {
                let removed = logs::delete_all_logs(tx)?;
                let reset = ledger::reset_all(tx)?;
                Ok((removed, reset))
            })
            .await?;

        tracing::info!("deleted all {} logs and reset {} tag counts", removed, reset);
        self.feed.publish(Operation::LogsCleared);
        Ok(())
    }

    /// Logs newest-first matching `filter`, capped at the filter's limit or the page size.
    pub async fn list_logs(&self, filter: LogFilter) -> Result<Vec<Log>, StoreError> {
        let limit = filter.limit.unwrap_or(self.page_size);
        self.store
            .read(move |conn| {
                let summaries =
                    logs::list_summaries(conn, filter.place.as_deref(), filter.person.as_deref())?;
                summaries
                    .into_iter()
                    .filter(|s| filter.matches(&s.place, &s.people))
                    .take(limit)
                    .map(|s| logs::hydrate(conn, s))
                    .collect()
            })
            .await
    }

    pub async fn count_logs(&self) -> Result<usize, StoreError> {
        self.store.read(logs::count_logs).await
    }

    /// Tags of one type, most used first.
    pub async fn list_tags(&self, tag_type: TagType) -> Result<Vec<Tag>, StoreError> {
        self.store
            .read(move |conn| ledger::list_by_type(conn, tag_type))
            .await
    }

    /// Add a suggestion with a zero count. Returns the existing id if the name is already known,
    /// giving it `emoji` only when it has none.
    pub async fn create_tag(
        &self,
        name: &str,
        tag_type: TagType,
        emoji: Option<&str>,
    ) -> Result<i64, StoreError> {
        let name = name.to_string();
        let emoji = emoji.map(str::to_string);
        let today = (self.today)();

        let id = self
            .store
            .write(move |tx| ledger::create(tx, &name, tag_type, emoji.as_deref(), today))
            .await?;

        self.feed.publish(Operation::TagCreated { tag_id: id });
        Ok(id)
    }

    /// Rename a tag across every log, merging into an existing tag on collision.
    /// `old_name` must match the tag's current name.
    pub async fn rename_tag(
        &self,
        id: i64,
        old_name: &str,
        new_name: &str,
        tag_type: TagType,
    ) -> Result<RenameOutcome, StoreError> {
        let old_name = old_name.to_string();
        let new_name = new_name.to_string();

        let outcome = self
            .store
            .write(move |tx| ledger::rename(tx, id, &old_name, &new_name, tag_type))
            .await?;

        let merged_into = match outcome {
            RenameOutcome::Unchanged => return Ok(outcome),
            RenameOutcome::Renamed { .. } => None,
            RenameOutcome::Merged { into, .. } => Some(into),
        };
        self.feed.publish(Operation::TagRenamed {
            tag_id: id,
            merged_into,
        });
        Ok(outcome)
    }

    /// Set or clear a tag's emoji without touching its name.
    pub async fn set_tag_emoji(&self, id: i64, emoji: Option<&str>) -> Result<(), StoreError> {
        let emoji = emoji.map(str::to_string);
        self.store
            .write(move |tx| ledger::set_emoji(tx, id, emoji.as_deref()))
            .await?;

        self.feed.publish(Operation::TagEmojiChanged { tag_id: id });
        Ok(())
    }

    /// Delete a tag row; logs keep their text.
    pub async fn delete_tag(&self, id: i64) -> Result<(), StoreError> {
        self.store.write(move |tx| ledger::remove(tx, id)).await?;

        self.feed.publish(Operation::TagDeleted { tag_id: id });
        Ok(())
    }
}

fn convert_all(
    storage: ImageStorage,
    payloads: Vec<gohanlog_core::ImagePayload>,
) -> Result<Vec<gohanlog_core::ImagePayload>, StoreError> {
    payloads
        .into_iter()
        .map(|p| storage.apply(p).map_err(StoreError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gohanlog_core::ImagePayload;

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn repo() -> LogRepository {
        let store = Store::open_in_memory().unwrap();
        LogRepository::new(store, ChangeFeed::default()).with_clock(fixed_today)
    }

    fn draft(date: &str, place: &str, people: &[&str]) -> LogDraft {
        LogDraft::new(
            date.parse().unwrap(),
            place,
            people.iter().map(|p| p.to_string()).collect(),
        )
    }

    async fn count(repo: &LogRepository, tag_type: TagType, name: &str) -> Option<u32> {
        repo.list_tags(tag_type)
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.count)
    }

    #[tokio::test]
    async fn create_bumps_place_and_people() {
        let repo = repo();
        let id = repo
            .create_log(draft("2024-06-30", "Sushi Dai", &["Ken", "Yui"]))
            .await
            .unwrap();

        let log = repo.get_log(id).await.unwrap();
        assert_eq!(log.place, "Sushi Dai");
        assert_eq!(count(&repo, TagType::Place, "Sushi Dai").await, Some(1));
        assert_eq!(count(&repo, TagType::Person, "Ken").await, Some(1));
        assert_eq!(count(&repo, TagType::Person, "Yui").await, Some(1));

        let tags = repo.list_tags(TagType::Place).await.unwrap();
        assert_eq!(tags[0].last_used, fixed_today());
    }

    #[tokio::test]
    async fn create_rejects_invalid_draft_without_writing() {
        let repo = repo();
        let err = repo.create_log(draft("2024-06-30", "  ", &["Ken"])).await.unwrap_err();

        assert!(matches!(err, StoreError::InvalidLog(_)));
        assert_eq!(repo.count_logs().await.unwrap(), 0);
        assert!(repo.list_tags(TagType::Person).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_moves_place_count() {
        let repo = repo();
        let id = repo
            .create_log(draft("2023-01-01", "Place A", &["Person A"]))
            .await
            .unwrap();

        repo.update_log(id, draft("2023-01-01", "Place B", &["Person A"]))
            .await
            .unwrap();

        assert_eq!(count(&repo, TagType::Place, "Place A").await, Some(0));
        assert_eq!(count(&repo, TagType::Place, "Place B").await, Some(1));
        assert_eq!(count(&repo, TagType::Person, "Person A").await, Some(1));
    }

    #[tokio::test]
    async fn update_people_touches_only_added_and_removed() {
        let repo = repo();
        let id = repo
            .create_log(draft("2023-01-01", "Place", &["A", "B"]))
            .await
            .unwrap();

        repo.update_log(id, draft("2023-01-01", "Place", &["B", "C"]))
            .await
            .unwrap();

        assert_eq!(count(&repo, TagType::Person, "A").await, Some(0));
        assert_eq!(count(&repo, TagType::Person, "B").await, Some(1));
        assert_eq!(count(&repo, TagType::Person, "C").await, Some(1));
        assert_eq!(count(&repo, TagType::Place, "Place").await, Some(1));
    }

    #[tokio::test]
    async fn update_and_delete_missing_log_are_not_found() {
        let repo = repo();

        let err = repo
            .update_log(41, draft("2023-01-01", "Nowhere", &["Ghost"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.delete_log(41).await.unwrap_err().is_not_found());
        assert!(repo.get_log(41).await.unwrap_err().is_not_found());

        assert!(repo.list_tags(TagType::Place).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_releases_all_references() {
        let repo = repo();
        let first = repo.create_log(draft("2024-01-01", "A", &["Ken"])).await.unwrap();
        repo.create_log(draft("2024-01-02", "A", &["Ken", "Yui"])).await.unwrap();

        repo.delete_log(first).await.unwrap();

        assert_eq!(count(&repo, TagType::Place, "A").await, Some(1));
        assert_eq!(count(&repo, TagType::Person, "Ken").await, Some(1));
        assert_eq!(count(&repo, TagType::Person, "Yui").await, Some(1));
    }

    #[tokio::test]
    async fn delete_all_resets_counts_but_keeps_catalog() {
        let repo = repo();
        repo.create_log(draft("2024-01-01", "A", &["Ken"])).await.unwrap();
        let seeded = repo.create_tag("Mio", TagType::Person, Some("🍙")).await.unwrap();

        repo.delete_all_logs().await.unwrap();

        assert_eq!(repo.count_logs().await.unwrap(), 0);
        let people = repo.list_tags(TagType::Person).await.unwrap();
        assert_eq!(people.len(), 2);
        assert!(people.iter().all(|t| t.count == 0));
        let mio = people.iter().find(|t| t.id == seeded).unwrap();
        assert_eq!(mio.emoji.as_deref(), Some("🍙"));
        assert_eq!(count(&repo, TagType::Place, "A").await, Some(0));
    }

    #[tokio::test]
    async fn list_filters_and_caps_results() {
        let repo = repo();
        for day in 1..=5 {
            repo.create_log(draft(&format!("2024-02-0{}", day), "Ramen Shop", &["Ken"]))
                .await
                .unwrap();
        }
        repo.create_log(draft("2024-03-01", "Sushi Dai", &["Yui"]))
            .await
            .unwrap();

        let all = repo.list_logs(LogFilter::default()).await.unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].place, "Sushi Dai");

        let ramen = repo.list_logs(LogFilter::search("ramen").with_limit(2)).await.unwrap();
        assert_eq!(ramen.len(), 2);
        assert_eq!(ramen[0].date.to_string(), "2024-02-05");

        let yui = repo.list_logs(LogFilter::person("Yui")).await.unwrap();
        assert_eq!(yui.len(), 1);

        let by_place = repo.list_logs(LogFilter::place("Ramen Shop")).await.unwrap();
        assert_eq!(by_place.len(), 5);
    }

    #[tokio::test]
    async fn base64_storage_mode_converts_images_before_writing() {
        let store = Store::open_in_memory().unwrap();
        let mut config = GohanConfig::with_home(std::env::temp_dir());
        config.image_storage = ImageStorage::Base64;
        let repo = LogRepository::with_config(store, ChangeFeed::default(), &config);

        let photo = ImagePayload::Binary(vec![0xFF, 0xD8, 0xFF, 0x42]);
        let id = repo
            .create_log(draft("2024-01-01", "A", &[]).with_photo(photo.clone(), photo.clone()))
            .await
            .unwrap();

        let log = repo.get_log(id).await.unwrap();
        assert!(matches!(log.photos[0], ImagePayload::Encoded(_)));
        assert_eq!(log.photos[0].to_bytes().unwrap(), photo.to_bytes().unwrap());
    }

    #[tokio::test]
    async fn mutations_publish_change_events() {
        let repo = repo();
        let mut rx = repo.feed().subscribe();

        let id = repo.create_log(draft("2024-01-01", "A", &[])).await.unwrap();
        repo.delete_log(id).await.unwrap();
        let _ = repo.delete_log(id).await;

        assert_eq!(rx.recv().await.unwrap().operation, Operation::LogCreated { log_id: id });
        assert_eq!(rx.recv().await.unwrap().operation, Operation::LogDeleted { log_id: id });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tag_curation_round() {
        let repo = repo();
        let id = repo.create_log(draft("2024-01-01", "Ichiran", &[])).await.unwrap();
        let tag_id = repo.list_tags(TagType::Place).await.unwrap()[0].id;

        repo.set_tag_emoji(tag_id, Some("🍜")).await.unwrap();
        let outcome = repo
            .rename_tag(tag_id, "Ichiran", "Ichiran Ramen", TagType::Place)
            .await
            .unwrap();
        assert_eq!(outcome, RenameOutcome::Renamed { logs_rewritten: 1 });
        assert_eq!(repo.get_log(id).await.unwrap().place, "Ichiran Ramen");

        repo.delete_tag(tag_id).await.unwrap();
        assert!(repo.list_tags(TagType::Place).await.unwrap().is_empty());
        assert_eq!(repo.get_log(id).await.unwrap().place, "Ichiran Ramen");
    }
}
