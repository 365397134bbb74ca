//! One full `update` run: account, social graph, four tweet feeds, then the
//! profile backfill of every user seen only by reference.

use crate::api::{TweetFeed, TwitterApi, UserListFeed, UserLookup};
use crate::cache::UserCache;
use crate::error::Result;
use crate::ingest::{Ingestor, TweetOutcome};
use crate::logging::OperationGuard;
use crate::model::{ApiTweet, ApiUser};
use crate::paginate::{PageStrategy, Paginator, ProgressFn};
use crate::sentiment::SentimentScorer;
use crate::storage::Storage;
use serde::Serialize;
use tracing::{info, warn};

/// Counters of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Users received from the account and follower/friend lists.
    pub users: usize,
    /// Tweets received across all feeds.
    pub tweets: usize,
    /// Tweets stored for the first time.
    pub new_tweets: usize,
    /// Profiles fetched by the backfill.
    pub backfilled: usize,
    /// Users found to be suspended by the backfill.
    pub suspended: usize,
}

/// Runs the sync cycle against one API and one database.
pub struct SyncRunner<'a, A: TwitterApi> {
    api: &'a A,
    storage: &'a Storage,
    page_size: u32,
    cache_capacity: usize,
    progress: Option<&'a ProgressFn<'a>>,
}

impl<'a, A: TwitterApi> SyncRunner<'a, A> {
    #[must_use]
    pub const fn new(api: &'a A, storage: &'a Storage) -> Self {
        Self {
            api,
            storage,
            page_size: crate::api::DEFAULT_PAGE_SIZE,
            cache_capacity: crate::cache::DEFAULT_USER_CACHE_CAPACITY,
            progress: None,
        }
    }

    #[must_use]
    pub const fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn progress(mut self, progress: &'a ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn paginator(&self) -> Paginator<'a> {
        let paginator = Paginator::new(self.storage, self.page_size);
        match self.progress {
            Some(progress) => paginator.with_progress(progress),
            None => paginator,
        }
    }

    /// Run every step in order. Any error aborts the run; watermarks of the
    /// feeds completed before the failure are kept.
    ///
    /// # Errors
    ///
    /// Propagates API, decoding and database errors.
    pub async fn run(&self, scorer: &dyn SentimentScorer) -> Result<SyncReport> {
        let guard = OperationGuard::new("sync");
        let mut ingestor = Ingestor::new(
            self.storage,
            scorer,
            UserCache::new(self.cache_capacity),
        );
        let mut report = SyncReport::default();

        match self.run_steps(&mut ingestor, &mut report).await {
            Ok(()) => {
                let (hits, misses) = ingestor.cache().stats();
                info!(
                    users = report.users,
                    tweets = report.tweets,
                    new_tweets = report.new_tweets,
                    backfilled = report.backfilled,
                    suspended = report.suspended,
                    cache_hits = hits,
                    cache_misses = misses,
                    "Sync finished"
                );
                guard.complete();
                Ok(report)
            }
            Err(e) => {
                guard.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_steps(&self, ingestor: &mut Ingestor<'_>, report: &mut SyncReport) -> Result<()> {
        let mut me = self.api.verify_credentials().await?;
        me.me = true;
        me.analyzed = true;
        let me = ingestor.upsert_user(&me, true)?;
        info!(screen_name = %me.screen_name, "Authenticated");
        report.users += 1;

        report.users += self.sync_users(ingestor, UserListFeed::Followers).await?;
        report.users += self.sync_users(ingestor, UserListFeed::Friends).await?;

        for feed in TweetFeed::ALL {
            self.sync_tweets(ingestor, feed, report).await?;
        }

        self.backfill(ingestor, report).await
    }

    async fn sync_users(&self, ingestor: &mut Ingestor<'_>, feed: UserListFeed) -> Result<usize> {
        let api = self.api;
        self.paginator()
            .collect(
                feed.label(),
                &PageStrategy::Cursor,
                |request| async move { api.users(feed, &request).await },
                |mut user: ApiUser| {
                    user.analyzed = true;
                    user.follower = match feed {
                        UserListFeed::Followers => true,
                        // Mutual follows keep the flag the followers step wrote.
                        UserListFeed::Friends => ingestor
                            .known_user(&user.id_str)?
                            .is_some_and(|known| known.follower),
                    };
                    ingestor.upsert_user(&user, true).map(drop)
                },
            )
            .await
    }

    async fn sync_tweets(
        &self,
        ingestor: &mut Ingestor<'_>,
        feed: TweetFeed,
        report: &mut SyncReport,
    ) -> Result<()> {
        let api = self.api;
        let mut new_tweets = 0usize;
        let count = self
            .paginator()
            .collect(
                feed.label(),
                &PageStrategy::since_id(feed.watermark_setting()),
                |request| async move { api.tweets(feed, &request).await },
                |mut tweet: ApiTweet| {
                    tweet.my_favorite = feed == TweetFeed::Favorites;
                    if ingestor.upsert_tweet(&tweet)? == TweetOutcome::Inserted {
                        new_tweets += 1;
                    }
                    Ok(())
                },
            )
            .await?;
        report.tweets += count;
        report.new_tweets += new_tweets;
        Ok(())
    }

    async fn backfill(&self, ingestor: &mut Ingestor<'_>, report: &mut SyncReport) -> Result<()> {
        let pending = self.storage.unanalyzed_users()?;
        info!(count = pending.len(), "Fetching unanalyzed users");

        for user in pending {
            info!(screen_name = %user.screen_name, "Getting user");
            match self.api.lookup_user(&user.id).await? {
                UserLookup::Found(mut profile) => {
                    profile.analyzed = true;
                    ingestor.upsert_user(&profile, true)?;
                    report.backfilled += 1;
                }
                UserLookup::Suspended => {
                    warn!(screen_name = %user.screen_name, "User is suspended");
                    self.storage.mark_suspended(&user.id)?;
                    report.suspended += 1;
                }
            }
            if let Some(progress) = self.progress {
                progress("profiles", report.backfilled + report.suspended);
            }
        }
        Ok(())
    }
}
