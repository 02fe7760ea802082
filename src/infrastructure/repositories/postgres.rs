use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, Pool, Postgres, migrate::Migrator, postgres::PgPoolOptions};

use crate::domain::{
    models::{ChannelCredential, ChatId, RecipientStats},
    repositories::{ChannelRepository, RecipientStore},
};

pub type PgPool = Pool<Postgres>;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens the pool and applies pending migrations.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to postgres")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("failed to run database migrations")?;
    Ok(pool)
}

#[derive(Clone)]
pub struct PostgresRecipientStore {
    pool: PgPool,
}

impl PostgresRecipientStore {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl RecipientStore for PostgresRecipientStore {
    async fn add_recipient(&self, recipient: ChatId, channel_id: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recipients (user_id, channel_id, is_blocked, created_at, updated_at)
            VALUES ($1, $2, FALSE, NOW(), NOW())
            ON CONFLICT (user_id, channel_id) DO UPDATE
            SET is_blocked = FALSE,
                updated_at = NOW()
            "#,
        )
        .bind(recipient)
        .bind(channel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_active_recipients(&self, channel_id: &str) -> anyhow::Result<Vec<ChatId>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT user_id FROM recipients
            WHERE channel_id = $1 AND is_blocked = FALSE
            ORDER BY created_at, user_id
            "#,
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
    }

    async fn mark_unreachable(&self, recipient: ChatId, channel_id: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE recipients
            SET is_blocked = TRUE,
                updated_at = NOW()
            WHERE user_id = $1 AND channel_id = $2
            "#,
        )
        .bind(recipient)
        .bind(channel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stats(&self, channel_id: &str) -> anyhow::Result<RecipientStats> {
        let (total, blocked) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE is_blocked)
            FROM recipients
            WHERE channel_id = $1
            "#,
        )
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;
        let total = u64::try_from(total).context("negative recipient count")?;
        let blocked = u64::try_from(blocked).context("negative blocked count")?;
        Ok(RecipientStats {
            total,
            active: total.saturating_sub(blocked),
            blocked,
        })
    }
}

#[derive(Clone)]
pub struct PostgresChannelRepository {
    pool: PgPool,
}

impl PostgresChannelRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl ChannelRepository for PostgresChannelRepository {
    async fn upsert(&self, credential: ChannelCredential) -> anyhow::Result<ChannelCredential> {
        let record = sqlx::query_as::<_, ChannelRecord>(
            r#"
            INSERT INTO channels (channel_id, token, display_name, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (channel_id) DO UPDATE
            SET token = EXCLUDED.token,
                display_name = EXCLUDED.display_name,
                updated_at = NOW()
            RETURNING channel_id, token, display_name
            "#,
        )
        .bind(&credential.channel_id)
        .bind(&credential.token)
        .bind(&credential.display_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(record.into())
    }

    async fn find_credential(&self, channel_id: &str) -> anyhow::Result<Option<ChannelCredential>> {
        let record = sqlx::query_as::<_, ChannelRecord>(
            r#"SELECT channel_id, token, display_name FROM channels WHERE channel_id = $1"#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(ChannelCredential::from))
    }
}

#[derive(FromRow)]
struct ChannelRecord {
    channel_id: String,
    token: String,
    display_name: Option<String>,
}

impl From<ChannelRecord> for ChannelCredential {
    fn from(value: ChannelRecord) -> Self {
        Self {
            channel_id: value.channel_id,
            token: value.token,
            display_name: value.display_name,
        }
    }
}
