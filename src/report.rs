//! Read-only queries over the collected data: substring search and the
//! troll report.

use crate::error::Result;
use crate::model::{StoredUrl, Troll, TweetMatch, User};
use crate::storage::{
    Storage, TWEET_COLUMN_COUNT, tweet_columns, tweet_from_row, user_columns, user_from_row,
};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A candidate survives the polarity stage only with more replies than this.
const MIN_REPLIES: i64 = 10;

/// Default average polarity below which a replier is suspicious.
pub const DEFAULT_POLARITY_THRESHOLD: f64 = -0.15;
/// Default average subjectivity above which a replier is suspicious.
pub const DEFAULT_SUBJECTIVITY_THRESHOLD: f64 = 0.5;

/// Which table a search runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchTarget {
    #[default]
    Tweets,
    Urls,
    Users,
}

/// Thresholds for [`find_trolls`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrollThresholds {
    pub polarity: f64,
    pub subjectivity: f64,
}

impl Default for TrollThresholds {
    fn default() -> Self {
        Self {
            polarity: DEFAULT_POLARITY_THRESHOLD,
            subjectivity: DEFAULT_SUBJECTIVITY_THRESHOLD,
        }
    }
}

/// Tweets whose text contains `query`, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn search_tweets(storage: &Storage, query: &str) -> Result<Vec<TweetMatch>> {
    let sql = format!(
        "SELECT {}, COALESCE(u.screen_name, '') FROM tweets t \
         LEFT JOIN users u ON u.id = t.user_id \
         WHERE t.text LIKE '%' || ?1 || '%' \
         ORDER BY t.created_at DESC",
        tweet_columns("t")
    );
    let mut stmt = storage.connection().prepare(&sql)?;
    let rows = stmt
        .query_map(params![query], |row| {
            Ok(TweetMatch {
                tweet: tweet_from_row(row)?,
                screen_name: row.get(TWEET_COLUMN_COUNT)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(query, hits = rows.len(), "Tweet search");
    Ok(rows)
}

/// Stored URLs containing `query`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn search_urls(storage: &Storage, query: &str) -> Result<Vec<StoredUrl>> {
    let mut stmt = storage.connection().prepare(
        "SELECT id, url, domain, tweet_id FROM urls \
         WHERE url LIKE '%' || ?1 || '%' ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![query], |row| {
            Ok(StoredUrl {
                id: row.get(0)?,
                url: row.get(1)?,
                domain: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                tweet_id: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(query, hits = rows.len(), "URL search");
    Ok(rows)
}

/// Users whose screen name or display name contains `query`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn search_users(storage: &Storage, query: &str) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users \
         WHERE screen_name LIKE '%' || ?1 || '%' OR name LIKE '%' || ?1 || '%' \
         ORDER BY screen_name",
        user_columns()
    );
    let mut stmt = storage.connection().prepare(&sql)?;
    let rows = stmt
        .query_map(params![query], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(query, hits = rows.len(), "User search");
    Ok(rows)
}

struct Candidate {
    user_id: String,
    screen_name: String,
    polarity: f64,
    subjectivity: Option<f64>,
}

/// Users who repeatedly reply to `me` with negative, subjective tweets.
///
/// Only authors who are not followed by `me` (or are muted) count, and
/// tweets `me` favorited are ignored. The result keeps the order of the
/// polarity ranking, most negative first.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn find_trolls(storage: &Storage, me: &User, thresholds: TrollThresholds) -> Result<Vec<Troll>> {
    let conn = storage.connection();

    let mut stmt = conn.prepare(
        "SELECT t.user_id, u.screen_name, AVG(t.polarity) AS avg_polarity \
         FROM tweets t JOIN users u ON u.id = t.user_id \
         WHERE t.polarity < 0 AND t.my_favorite = 0 AND u.me = 0 \
           AND (u.friend = 0 OR u.muting = 1) \
           AND t.in_reply_to_user_id_str = ?1 \
         GROUP BY t.user_id \
         HAVING AVG(t.polarity) < ?2 \
         ORDER BY avg_polarity ASC",
    )?;
    let negative = stmt
        .query_map(params![me.id, thresholds.polarity], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut candidates = Vec::new();
    for (user_id, screen_name, polarity) in negative {
        let replies = storage.count_replies(&user_id, &me.id)?;
        if replies > MIN_REPLIES {
            candidates.push(Candidate {
                user_id,
                screen_name,
                polarity,
                subjectivity: None,
            });
        }
    }
    debug!(candidates = candidates.len(), "Polarity stage");

    let mut stmt = conn.prepare(
        "SELECT t.user_id, AVG(t.subjectivity) AS avg_subjectivity \
         FROM tweets t JOIN users u ON u.id = t.user_id \
         WHERE t.subjectivity > 0.1 AND t.my_favorite = 0 AND u.me = 0 \
           AND (u.friend = 0 OR u.muting = 1) \
           AND t.in_reply_to_user_id_str = ?1 \
         GROUP BY t.user_id \
         HAVING AVG(t.subjectivity) > ?2 \
         ORDER BY avg_subjectivity ASC",
    )?;
    let subjective = stmt
        .query_map(params![me.id, thresholds.subjectivity], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (user_id, subjectivity) in subjective {
        let Some(index) = candidates.iter().position(|c| c.user_id == user_id) else {
            continue;
        };
        if storage.count_replies(&user_id, &me.id)? < MIN_REPLIES {
            candidates.remove(index);
        } else {
            candidates[index].subjectivity = Some(subjectivity);
        }
    }

    let trolls: Vec<Troll> = candidates
        .into_iter()
        .filter_map(|c| {
            c.subjectivity.map(|subjectivity| Troll {
                user_id: c.user_id,
                screen_name: c.screen_name,
                polarity: c.polarity,
                subjectivity,
            })
        })
        .collect();
    debug!(trolls = trolls.len(), "Subjectivity stage");
    Ok(trolls)
}
