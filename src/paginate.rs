//! Page-walking over the API's three pagination styles.
//!
//! A feed is read page by page until the API returns an empty page. For
//! id-paginated feeds each next request asks for records older than the
//! oldest one seen so far (`max_id`). With [`PageStrategy::SinceId`] every
//! request is also bounded below by the stored watermark, and after a
//! successful walk the newest id seen becomes the new watermark, so the next
//! run only fetches what is new.

use crate::api::{Page, PageRequest};
use crate::error::Result;
use crate::model::{ApiTweet, ApiUser};
use crate::storage::Storage;
use std::future::Future;
use tracing::{debug, info, warn};

/// Where a feed's position comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStrategy {
    /// Walk back from the newest record down to the watermark stored under `setting`.
    SinceId { setting: String },
    /// Walk back from the newest record with no lower bound.
    MaxId,
    /// Follow `next_cursor` starting from `-1`.
    Cursor,
}

impl PageStrategy {
    #[must_use]
    pub fn since_id(setting: impl Into<String>) -> Self {
        Self::SinceId {
            setting: setting.into(),
        }
    }
}

/// A record with the external id pagination keys on.
pub trait Record {
    fn record_id(&self) -> &str;
}

impl Record for ApiTweet {
    fn record_id(&self) -> &str {
        &self.id_str
    }
}

impl Record for ApiUser {
    fn record_id(&self) -> &str {
        &self.id_str
    }
}

/// Called after every page with the feed label and the running record count.
pub type ProgressFn<'a> = dyn Fn(&str, usize) + 'a;

/// Drives one feed from first page to last.
pub struct Paginator<'a> {
    storage: &'a Storage,
    page_size: u32,
    progress: Option<&'a ProgressFn<'a>>,
}

impl<'a> Paginator<'a> {
    #[must_use]
    pub const fn new(storage: &'a Storage, page_size: u32) -> Self {
        Self {
            storage,
            page_size,
            progress: None,
        }
    }

    #[must_use]
    pub const fn with_progress(mut self, progress: &'a ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Fetch every page of a feed, handing each record to `on_record` in
    /// API order. Returns the number of records processed.
    ///
    /// The watermark of a [`PageStrategy::SinceId`] feed is written only
    /// after the whole walk succeeded.
    ///
    /// # Errors
    ///
    /// Propagates the first error from `fetch`, `on_record` or the settings store.
    pub async fn collect<R, F, Fut, H>(
        &self,
        label: &str,
        strategy: &PageStrategy,
        mut fetch: F,
        mut on_record: H,
    ) -> Result<usize>
    where
        R: Record,
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<R>>>,
        H: FnMut(R) -> Result<()>,
    {
        let watermark = match strategy {
            PageStrategy::SinceId { setting } => self.read_watermark(setting)?,
            PageStrategy::MaxId | PageStrategy::Cursor => None,
        };

        let mut request = PageRequest {
            count: self.page_size,
            since_id: watermark,
            max_id: None,
            cursor: matches!(strategy, PageStrategy::Cursor).then_some(-1),
        };
        let mut newest_id: Option<String> = None;
        let mut count = 0usize;

        loop {
            debug!(
                feed = label,
                since_id = ?request.since_id,
                max_id = ?request.max_id,
                cursor = ?request.cursor,
                "Fetching page"
            );
            let page = fetch(request.clone()).await?;
            if page.records.is_empty() {
                break;
            }

            let oldest_id = page.records.last().map(|r| r.record_id().to_string());
            for record in page.records {
                if newest_id.is_none() {
                    newest_id = Some(record.record_id().to_string());
                }
                on_record(record)?;
                count += 1;
            }

            info!(feed = label, count, "Analyzed {count} {label}");
            if let Some(progress) = self.progress {
                progress(label, count);
            }

            match strategy {
                PageStrategy::Cursor => match page.next_cursor {
                    Some(0) | None => break,
                    Some(cursor) => request.cursor = Some(cursor),
                },
                PageStrategy::SinceId { .. } | PageStrategy::MaxId => {
                    let Some(next_max) = oldest_id.as_deref().and_then(next_max_id) else {
                        warn!(feed = label, id = ?oldest_id, "Cannot page past record id");
                        break;
                    };
                    request.max_id = Some(next_max);
                }
            }
        }

        if let (PageStrategy::SinceId { setting }, Some(id)) = (strategy, newest_id) {
            self.storage.set_setting(setting, &id)?;
            debug!(feed = label, setting = %setting, id = %id, "Watermark advanced");
        }

        Ok(count)
    }

    fn read_watermark(&self, setting: &str) -> Result<Option<u64>> {
        let value = self.storage.get_setting(setting)?;
        Ok(value.and_then(|v| match v.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(setting, value = %v, "Ignoring non-numeric watermark");
                None
            }
        }))
    }
}

/// `max_id` for the page after one whose oldest record is `id`.
fn next_max_id(id: &str) -> Option<u64> {
    id.parse::<u64>().ok()?.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(String);

    impl Record for Item {
        fn record_id(&self) -> &str {
            &self.0
        }
    }

    fn items(ids: &[u64]) -> Vec<Item> {
        ids.iter().map(|id| Item(id.to_string())).collect()
    }

    /// Serves newest-first ids honoring `since_id`/`max_id`, recording each request.
    fn id_feed(
        all: &[u64],
        page_size: usize,
        requests: &RefCell<Vec<PageRequest>>,
        req: PageRequest,
    ) -> Page<Item> {
        requests.borrow_mut().push(req.clone());
        let ids: Vec<u64> = all
            .iter()
            .copied()
            .filter(|id| req.since_id.is_none_or(|s| *id > s))
            .filter(|id| req.max_id.is_none_or(|m| *id <= m))
            .take(page_size)
            .collect();
        Page::new(items(&ids))
    }

    #[tokio::test]
    async fn since_id_walks_back_and_sets_watermark() {
        let storage = Storage::open_memory().unwrap();
        let paginator = Paginator::new(&storage, 2);
        let requests = RefCell::new(Vec::new());
        let all = [50, 40, 30, 20, 10];
        let mut seen = Vec::new();

        let count = paginator
            .collect(
                "mentions",
                &PageStrategy::since_id("user-mentions-last-id"),
                |req| {
                    let page = id_feed(&all, 2, &requests, req);
                    async move { Ok(page) }
                },
                |item: Item| {
                    seen.push(item.0);
                    Ok(())
                },
            )
            .await
            .unwrap();

        assert_eq!(count, 5);
        assert_eq!(seen, ["50", "40", "30", "20", "10"]);
        assert_eq!(
            storage.get_setting("user-mentions-last-id").unwrap().as_deref(),
            Some("50")
        );

        let requests = requests.into_inner();
        assert_eq!(requests[0].max_id, None);
        assert_eq!(requests[1].max_id, Some(39));
        assert_eq!(requests[2].max_id, Some(19));
        assert!(requests.iter().all(|r| r.since_id.is_none() && r.count == 2));
    }

    #[tokio::test]
    async fn second_run_is_bounded_by_watermark() {
        let storage = Storage::open_memory().unwrap();
        storage.set_setting("home-last-id", "30").unwrap();
        let paginator = Paginator::new(&storage, 10);
        let requests = RefCell::new(Vec::new());
        let all = [60, 50, 40, 30, 20];

        let count = paginator
            .collect(
                "home",
                &PageStrategy::since_id("home-last-id"),
                |req| {
                    let page = id_feed(&all, 10, &requests, req);
                    async move { Ok(page) }
                },
                |_: Item| Ok(()),
            )
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert!(requests.borrow().iter().all(|r| r.since_id == Some(30)));
        assert_eq!(
            storage.get_setting("home-last-id").unwrap().as_deref(),
            Some("60")
        );
    }

    #[tokio::test]
    async fn empty_feed_keeps_watermark() {
        let storage = Storage::open_memory().unwrap();
        storage.set_setting("user-last-id", "77").unwrap();
        let paginator = Paginator::new(&storage, 10);

        let count = paginator
            .collect(
                "own tweets",
                &PageStrategy::since_id("user-last-id"),
                |_req| async { Ok(Page::<Item>::empty()) },
                |_: Item| Ok(()),
            )
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(
            storage.get_setting("user-last-id").unwrap().as_deref(),
            Some("77")
        );
    }

    #[tokio::test]
    async fn failed_walk_does_not_advance_watermark() {
        let storage = Storage::open_memory().unwrap();
        let paginator = Paginator::new(&storage, 2);
        let calls = RefCell::new(0);

        let result = paginator
            .collect(
                "favorites",
                &PageStrategy::since_id("favorites-last-id"),
                |_req| {
                    *calls.borrow_mut() += 1;
                    let n = *calls.borrow();
                    async move {
                        if n == 1 {
                            Ok(Page::new(items(&[9, 8])))
                        } else {
                            Err(crate::error::TanalyzerError::api(500, None, "boom"))
                        }
                    }
                },
                |_: Item| Ok(()),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(storage.get_setting("favorites-last-id").unwrap(), None);
    }

    #[tokio::test]
    async fn cursor_follows_next_cursor_until_empty() {
        let storage = Storage::open_memory().unwrap();
        let paginator = Paginator::new(&storage, 200);
        let cursors = RefCell::new(Vec::new());
        let mut seen = Vec::new();

        let count = paginator
            .collect(
                "followers",
                &PageStrategy::Cursor,
                |req| {
                    cursors.borrow_mut().push(req.cursor);
                    let page = match req.cursor {
                        Some(-1) => Page::with_cursor(items(&[1, 2, 3, 4, 5]), 111),
                        Some(111) => Page::with_cursor(items(&[6, 7, 8]), 222),
                        _ => Page::with_cursor(Vec::new(), 0),
                    };
                    async move { Ok(page) }
                },
                |item: Item| {
                    seen.push(item.0);
                    Ok(())
                },
            )
            .await
            .unwrap();

        assert_eq!(count, 8);
        assert_eq!(seen, ["1", "2", "3", "4", "5", "6", "7", "8"]);
        assert_eq!(*cursors.borrow(), [Some(-1), Some(111), Some(222)]);
        assert!(storage.watermarks().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cursor_zero_ends_walk() {
        let storage = Storage::open_memory().unwrap();
        let paginator = Paginator::new(&storage, 200);
        let calls = RefCell::new(0);

        let count = paginator
            .collect(
                "friends",
                &PageStrategy::Cursor,
                |_req| {
                    *calls.borrow_mut() += 1;
                    async { Ok(Page::with_cursor(items(&[1, 2]), 0)) }
                },
                |_: Item| Ok(()),
            )
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn progress_reports_running_total() {
        let storage = Storage::open_memory().unwrap();
        let reports = RefCell::new(Vec::new());
        let progress = |label: &str, n: usize| reports.borrow_mut().push((label.to_string(), n));
        let paginator = Paginator::new(&storage, 3).with_progress(&progress);
        let requests = RefCell::new(Vec::new());
        let all = [5, 4, 3, 2, 1];

        paginator
            .collect(
                "mentions",
                &PageStrategy::MaxId,
                |req| {
                    let page = id_feed(&all, 3, &requests, req);
                    async move { Ok(page) }
                },
                |_: Item| Ok(()),
            )
            .await
            .unwrap();

        assert_eq!(
            *reports.borrow(),
            [("mentions".to_string(), 3), ("mentions".to_string(), 5)]
        );
    }

    #[test]
    fn next_max_id_steps_below_oldest() {
        assert_eq!(next_max_id("100"), Some(99));
        assert_eq!(next_max_id("0"), None);
        assert_eq!(next_max_id("abc"), None);
    }
}
