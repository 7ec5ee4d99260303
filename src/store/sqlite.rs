use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    bus::{BroadcastBus, ChangeEvent, EventKind},
    error::StoreError,
};

use super::{AuthorProfile, LocationRecord, LocationSink, MESSAGES, Message, MessageStore, NewMessage};

type MessageRow = (String, String, String, i64, Option<String>, Option<String>);

/// Message log in SQLite. Every committed insert is published on the bus.
///
/// Inserts are serialized so `inserted_at` strictly increases and bus order
/// matches commit order.
pub struct SqliteMessageStore {
    db_pool: SqlitePool,
    bus: BroadcastBus,
    last_inserted_at: Mutex<i64>,
}

impl SqliteMessageStore {
    pub async fn open(db_pool: SqlitePool, bus: BroadcastBus) -> Result<Self, StoreError> {
        let (last,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(inserted_at), 0) FROM messages")
            .fetch_one(&db_pool)
            .await?;

        Ok(Self {
            db_pool,
            bus,
            last_inserted_at: Mutex::new(last),
        })
    }

    async fn author(&self, user_id: Uuid) -> Result<Option<AuthorProfile>, StoreError> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT name,avatar_url FROM profiles WHERE user_id=?")
                .bind(user_id.to_string())
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(row.map(|(name, avatar_url)| AuthorProfile { name, avatar_url }))
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn query_ordered(&self) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT m.id,m.user_id,m.content,m.inserted_at,p.name,p.avatar_url
            FROM messages m LEFT JOIN profiles p ON p.user_id=m.user_id
            ORDER BY m.inserted_at ASC, m.seq ASC",
        )
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(message_from_row).collect()
    }

    async fn insert(&self, record: NewMessage) -> Result<Message, StoreError> {
        if record.content.is_empty() {
            return Err(StoreError::EmptyContent);
        }

        // everything fallible happens before the row is committed
        let author = self.author(record.user_id).await.unwrap_or_else(|err| {
            warn!(%err, user_id = %record.user_id, "author lookup failed");
            None
        });

        let mut last = self.last_inserted_at.lock().await;
        let inserted_at = unix_micros(OffsetDateTime::now_utc()).max(*last + 1);
        let sent_at = from_unix_micros(inserted_at)?;
        let id = Uuid::now_v7();

        sqlx::query("INSERT INTO messages (id,user_id,content,inserted_at) VALUES (?,?,?,?)")
            .bind(id.to_string())
            .bind(record.user_id.to_string())
            .bind(&record.content)
            .bind(inserted_at)
            .execute(&self.db_pool)
            .await?;
        *last = inserted_at;

        let message = Message {
            id,
            user_id: record.user_id,
            content: record.content,
            inserted_at: sent_at,
            author,
        };
        debug!(%id, user_id = %message.user_id, "message committed");

        self.bus.publish(ChangeEvent {
            collection: MESSAGES.to_owned(),
            kind: EventKind::Insert,
            record: message.clone(),
        });
        Ok(message)
    }
}

/// Secondary collection of raw coordinates sent as location messages.
pub struct SqliteLocationSink {
    db_pool: SqlitePool,
}

impl SqliteLocationSink {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl LocationSink for SqliteLocationSink {
    async fn record(&self, location: LocationRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO locations (user_id,latitude,longitude,recorded_at) VALUES (?,?,?,?)")
            .bind(location.user_id.to_string())
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(unix_micros(location.recorded_at))
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }
}

fn message_from_row(
    (id, user_id, content, inserted_at, name, avatar_url): MessageRow,
) -> Result<Message, StoreError> {
    let parse = |raw: &str| {
        Uuid::parse_str(raw).map_err(|e| StoreError::InvalidRecord(format!("{raw}: {e}")))
    };

    Ok(Message {
        id: parse(&id)?,
        user_id: parse(&user_id)?,
        content,
        inserted_at: from_unix_micros(inserted_at)?,
        author: name.map(|name| AuthorProfile { name, avatar_url }),
    })
}

fn unix_micros(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000) as i64
}

fn from_unix_micros(micros: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(micros as i128 * 1_000)
        .map_err(|e| StoreError::InvalidRecord(e.to_string()))
}
