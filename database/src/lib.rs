use sentimind_core::{
    CanonicalPost, CoreError, DatabaseError, PostWithSentiment, SentimentResult,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info, warn};

mod rows;

use rows::{join_list, post_from_row, post_with_sentiment_from_row, POST_COLUMNS};

/// Stay well below SQLite's bound-parameter limit.
const MAX_BINDS_PER_QUERY: usize = 500;

/// Idempotent store of canonical posts and their sentiment results.
#[allow(async_fn_in_trait)]
pub trait PostRepository {
    async fn post_exists(&self, id: &str) -> Result<bool, CoreError>;

    /// The subset of `ids` already stored.
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, CoreError>;

    /// Insert all posts in one transaction. Any conflict rolls back the whole batch.
    async fn insert_posts(&self, posts: &[CanonicalPost]) -> Result<usize, CoreError>;

    async fn get_post(&self, id: &str) -> Result<Option<CanonicalPost>, CoreError>;

    async fn count_posts(&self) -> Result<i64, CoreError>;

    /// Posts without a sentiment result, restricted to `ids` when given, otherwise up to `limit`.
    async fn unanalyzed_posts(
        &self,
        limit: usize,
        ids: Option<&[String]>,
    ) -> Result<Vec<CanonicalPost>, CoreError>;

    /// Insert results in one transaction; posts that already have a result keep it.
    async fn insert_sentiment_results(&self, results: &[SentimentResult])
        -> Result<usize, CoreError>;

    async fn recent_posts(&self, limit: usize) -> Result<Vec<PostWithSentiment>, CoreError>;
}

/// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes.
fn is_locked(db: &dyn sqlx::error::DatabaseError) -> bool {
    let primary = db
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| code & 0xff);
    matches!(primary, Some(5) | Some(6))
}

pub(crate) fn sql_error(e: sqlx::Error) -> CoreError {
    let Some(db) = e.as_database_error() else {
        return DatabaseError::Sql(e).into();
    };
    if is_locked(db) {
        warn!("Database is locked: {}", db.message());
        DatabaseError::DatabaseLocked.into()
    } else if db.is_unique_violation() {
        DatabaseError::ConstraintViolation {
            constraint: e.to_string(),
        }
        .into()
    } else {
        DatabaseError::Sql(e).into()
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        // Every connection to an in-memory database gets its own empty database
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        info!("Connected to database {}", database_url);
        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date.
    pub async fn open(database_url: &str) -> Result<Self, CoreError> {
        let db = Self::connect(database_url).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn in_memory() -> Result<Self, CoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: e.to_string(),
            })?;
        debug!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn unanalyzed_by_ids(&self, ids: &[String]) -> Result<Vec<CanonicalPost>, CoreError> {
        let mut posts = Vec::new();
        for chunk in ids.chunks(MAX_BINDS_PER_QUERY) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM posts p \
                 WHERE NOT EXISTS (SELECT 1 FROM sentiment_results s WHERE s.post_id = p.id) \
                 AND p.id IN (",
                POST_COLUMNS
            ));
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(") ORDER BY p.scraped_at, p.id");

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(sql_error)?;
            for row in &rows {
                posts.push(post_from_row(row).map_err(sql_error)?);
            }
        }
        Ok(posts)
    }
}

impl PostRepository for Database {
    async fn post_exists(&self, id: &str) -> Result<bool, CoreError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(found.is_some())
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, CoreError> {
        let mut existing = HashSet::new();
        for chunk in ids.chunks(MAX_BINDS_PER_QUERY) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT id FROM posts WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");

            let found: Vec<String> = builder
                .build_query_scalar()
                .fetch_all(&self.pool)
                .await
                .map_err(sql_error)?;
            existing.extend(found);
        }
        Ok(existing)
    }

    async fn insert_posts(&self, posts: &[CanonicalPost]) -> Result<usize, CoreError> {
        if posts.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(sql_error)?;
        for post in posts {
            let result = sqlx::query(
                "INSERT INTO posts (id, conversation_id, created_at, date, time, timezone, \
                 user_id, username, place, text, mentions, hashtags, cashtags, photos, link, \
                 quote_url, replies_count, retweets_count, likes_count, quote_count, retweet, \
                 video, lang, in_reply_to_screen_name, keyword_used, scraped_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&post.id)
            .bind(&post.conversation_id)
            .bind(post.created_at)
            .bind(post.date)
            .bind(post.time)
            .bind(&post.timezone)
            .bind(&post.user_id)
            .bind(&post.username)
            .bind(&post.place)
            .bind(&post.text)
            .bind(join_list(&post.mentions))
            .bind(join_list(&post.hashtags))
            .bind(&post.cashtags)
            .bind(&post.photos)
            .bind(&post.link)
            .bind(&post.quote_url)
            .bind(post.replies_count)
            .bind(post.retweets_count)
            .bind(post.likes_count)
            .bind(post.quote_count)
            .bind(post.retweet)
            .bind(post.video)
            .bind(&post.lang)
            .bind(&post.in_reply_to_screen_name)
            .bind(&post.keyword_used)
            .bind(post.scraped_at)
            .execute(&mut *tx)
            .await;

            if let Err(e) = result {
                warn!("Insert of post {} failed, rolling back {} posts", post.id, posts.len());
                if let Err(rollback_error) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_error);
                }
                return Err(sql_error(e));
            }
        }
        tx.commit().await.map_err(|e| DatabaseError::TransactionFailed {
            reason: e.to_string(),
        })?;

        debug!("Inserted {} posts", posts.len());
        Ok(posts.len())
    }

    async fn get_post(&self, id: &str) -> Result<Option<CanonicalPost>, CoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_error)?;
        row.as_ref()
            .map(post_from_row)
            .transpose()
            .map_err(sql_error)
    }

    async fn count_posts(&self) -> Result<i64, CoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(sql_error)
    }

    async fn unanalyzed_posts(
        &self,
        limit: usize,
        ids: Option<&[String]>,
    ) -> Result<Vec<CanonicalPost>, CoreError> {
        if let Some(ids) = ids {
            return self.unanalyzed_by_ids(ids).await;
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts p \
             WHERE NOT EXISTS (SELECT 1 FROM sentiment_results s WHERE s.post_id = p.id) \
             ORDER BY p.scraped_at, p.id LIMIT ?",
            POST_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(sql_error)?;

        rows.iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_error)
    }

    async fn insert_sentiment_results(
        &self,
        results: &[SentimentResult],
    ) -> Result<usize, CoreError> {
        if results.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(sql_error)?;
        let mut inserted = 0usize;
        for result in results {
            let outcome = sqlx::query(
                "INSERT OR IGNORE INTO sentiment_results (post_id, sentiment, analyzed_at) \
                 VALUES (?, ?, ?)",
            )
            .bind(&result.post_id)
            .bind(result.label.to_string())
            .bind(result.analyzed_at)
            .execute(&mut *tx)
            .await;

            match outcome {
                Ok(done) => inserted += done.rows_affected() as usize,
                Err(e) => {
                    warn!("Saving sentiment for {} failed, rolling back", result.post_id);
                    if let Err(rollback_error) = tx.rollback().await {
                        warn!("Rollback failed: {}", rollback_error);
                    }
                    return Err(sql_error(e));
                }
            }
        }
        tx.commit().await.map_err(|e| DatabaseError::TransactionFailed {
            reason: e.to_string(),
        })?;

        if inserted < results.len() {
            debug!(
                "{} sentiment results already existed and were kept",
                results.len() - inserted
            );
        }
        Ok(inserted)
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<PostWithSentiment>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {}, s.sentiment AS sentiment, s.analyzed_at AS sentiment_analyzed_at \
             FROM posts p LEFT JOIN sentiment_results s ON s.post_id = p.id \
             ORDER BY p.created_at DESC, p.scraped_at DESC LIMIT ?",
            POST_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(sql_error)?;

        rows.iter()
            .map(post_with_sentiment_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_error)
    }
}
