use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::config::MediaConfig;

/// A stored selector set, keyed by hostname.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Media {
    pub id: i64,
    pub hostname: String,
    pub feed_title_selector: String,
    pub feed_desc_selector: String,
    pub feed_last_updated_selector: String,
    pub item_selector: String,
    pub item_title_selector: String,
    pub item_link_selector: String,
    pub item_desc_selector: String,
    pub item_pubdate_selector: String,
}

/// The read side of the media store as seen by a feed run.
///
/// A run performs one `lookup` and finishes with exactly one `release`,
/// whatever the outcome.
#[allow(async_fn_in_trait)]
pub trait MediaStore {
    async fn lookup(&self, hostname: &str) -> Result<Option<Media>, sqlx::Error>;

    async fn release(&self);
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY,
                hostname TEXT NOT NULL UNIQUE,
                feed_title_selector TEXT NOT NULL,
                feed_desc_selector TEXT NOT NULL,
                feed_last_updated_selector TEXT NOT NULL,
                item_selector TEXT NOT NULL,
                item_title_selector TEXT NOT NULL,
                item_link_selector TEXT NOT NULL,
                item_desc_selector TEXT NOT NULL,
                item_pubdate_selector TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn sync_media(&self, configs: &[MediaConfig]) -> anyhow::Result<()> {
        for config in configs {
            sqlx::query(
                r#"
                INSERT INTO media (
                    hostname,
                    feed_title_selector,
                    feed_desc_selector,
                    feed_last_updated_selector,
                    item_selector,
                    item_title_selector,
                    item_link_selector,
                    item_desc_selector,
                    item_pubdate_selector
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(hostname) DO UPDATE SET
                    feed_title_selector = excluded.feed_title_selector,
                    feed_desc_selector = excluded.feed_desc_selector,
                    feed_last_updated_selector = excluded.feed_last_updated_selector,
                    item_selector = excluded.item_selector,
                    item_title_selector = excluded.item_title_selector,
                    item_link_selector = excluded.item_link_selector,
                    item_desc_selector = excluded.item_desc_selector,
                    item_pubdate_selector = excluded.item_pubdate_selector
                "#,
            )
            .bind(&config.hostname)
            .bind(&config.feed_title_selector)
            .bind(&config.feed_desc_selector)
            .bind(&config.feed_last_updated_selector)
            .bind(&config.item_selector)
            .bind(&config.item_title_selector)
            .bind(&config.item_link_selector)
            .bind(&config.item_desc_selector)
            .bind(&config.item_pubdate_selector)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Creates the schema and upserts `media`. On failure the pool is closed
    /// before the error is returned.
    pub async fn seed(&self, media: &[MediaConfig]) -> anyhow::Result<()> {
        let result = async {
            self.initialize().await?;
            self.sync_media(media).await
        }
        .await;

        if result.is_err() {
            self.close().await;
        }
        result
    }

    #[cfg(test)]
    pub async fn get_all_media(&self) -> anyhow::Result<Vec<Media>> {
        let media = sqlx::query_as::<_, Media>("SELECT * FROM media ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(media)
    }

    pub async fn find_media_by_hostname(&self, hostname: &str) -> Result<Option<Media>, sqlx::Error> {
        sqlx::query_as::<_, Media>("SELECT * FROM media WHERE hostname = ?")
            .bind(hostname)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

impl MediaStore for Database {
    async fn lookup(&self, hostname: &str) -> Result<Option<Media>, sqlx::Error> {
        self.find_media_by_hostname(hostname).await
    }

    async fn release(&self) {
        self.close().await;
    }
}
