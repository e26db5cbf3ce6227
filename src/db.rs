use anyhow::Context;
use serde::Serialize;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::chat::{Envelope, RoomId};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        room_id TEXT NOT NULL,
        sender TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        image TEXT
    )",
    "CREATE INDEX IF NOT EXISTS messages_room ON messages (room_id)",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

/// Rooms and message history. Nothing in the broadcast path depends on it.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Store> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .with_context(|| format!("connecting to {url}"))?;
        Ok(Store { pool })
    }

    pub async fn init(&self) -> sqlx::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn list_rooms(&self) -> sqlx::Result<Vec<Room>> {
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id,name,created_at FROM rooms ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(room_from_row).collect())
    }

    pub async fn create_room(&self, name: &str) -> anyhow::Result<Room> {
        let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let (id,): (i64,) = sqlx::query_as("INSERT INTO rooms (name,created_at) VALUES (?,?) RETURNING id")
            .bind(name)
            .bind(&created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(Room {
            id,
            name: name.to_owned(),
            created_at,
        })
    }

    pub async fn get_room(&self, id: i64) -> sqlx::Result<Option<Room>> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id,name,created_at FROM rooms WHERE id=?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(room_from_row))
    }

    pub async fn rename_room(&self, id: i64, name: &str) -> sqlx::Result<Option<Room>> {
        let updated = sqlx::query("UPDATE rooms SET name=? WHERE id=?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_room(id).await
    }

    pub async fn delete_room(&self, id: i64) -> sqlx::Result<bool> {
        let deleted = sqlx::query("DELETE FROM rooms WHERE id=?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    /// Whether a websocket room id names a persisted room.
    pub async fn room_exists(&self, room: &RoomId) -> sqlx::Result<bool> {
        let Ok(id) = room.as_str().parse::<i64>() else {
            return Ok(false);
        };
        Ok(self.get_room(id).await?.is_some())
    }

    pub async fn insert_message(&self, envelope: &Envelope) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO messages (id,room_id,sender,content,timestamp,image) VALUES (?,?,?,?,?,?)")
            .bind(envelope.id.to_string())
            .bind(envelope.room_id.as_str())
            .bind(&envelope.sender)
            .bind(&envelope.message)
            .bind(envelope.timestamp.format(&Rfc3339)?)
            .bind(envelope.image.as_deref())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Messages of `room`, newest first.
    pub async fn list_messages(&self, room: &RoomId) -> anyhow::Result<Vec<Envelope>> {
        let rows: Vec<(String, String, String, String, Option<String>)> =
            sqlx::query_as("SELECT id,sender,content,timestamp,image FROM messages WHERE room_id=? ORDER BY rowid DESC")
                .bind(room.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, sender, message, timestamp, image)| -> anyhow::Result<Envelope> {
                Ok(Envelope {
                    id: Uuid::parse_str(&id)?,
                    message,
                    sender,
                    timestamp: OffsetDateTime::parse(&timestamp, &Rfc3339)?,
                    room_id: room.clone(),
                    image,
                })
            })
            .collect()
    }
}

fn room_from_row((id, name, created_at): (i64, String, String)) -> Room {
    Room { id, name, created_at }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::chat::Identity;

    use super::*;

    pub(crate) async fn memory_store() -> Store {
        // One connection, or every checkout would see a fresh empty database.
        let store = Store::connect("sqlite::memory:", 1).await.unwrap();
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn room_crud() {
        let store = memory_store().await;

        let lobby = store.create_room("lobby").await.unwrap();
        let den = store.create_room("den").await.unwrap();
        assert_eq!(store.list_rooms().await.unwrap(), vec![lobby.clone(), den.clone()]);

        let renamed = store.rename_room(den.id, "study").await.unwrap().unwrap();
        assert_eq!(renamed.name, "study");
        assert_eq!(renamed.created_at, den.created_at);
        assert!(store.rename_room(999, "ghost").await.unwrap().is_none());

        assert!(store.delete_room(lobby.id).await.unwrap());
        assert!(!store.delete_room(lobby.id).await.unwrap());
        assert!(store.get_room(lobby.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn room_exists_needs_a_numeric_id() {
        let store = memory_store().await;
        let room = store.create_room("lobby").await.unwrap();

        assert!(store.room_exists(&RoomId::from(room.id.to_string())).await.unwrap());
        assert!(!store.room_exists(&RoomId::from("lobby")).await.unwrap());
        assert!(!store.room_exists(&RoomId::from("12345")).await.unwrap());
    }

    #[tokio::test]
    async fn messages_come_back_newest_first() {
        let store = memory_store().await;
        let general = RoomId::from("general");
        let alice = Identity::Authenticated { name: "alice".to_owned() };

        let first = Envelope::new(general.clone(), &alice, "first".to_owned());
        let second = Envelope::new(general.clone(), &Identity::Anonymous, "second".to_owned())
            .with_image("/media/chat_images/cat.png".to_owned());
        let elsewhere = Envelope::new(RoomId::from("random"), &alice, "elsewhere".to_owned());
        for envelope in [&first, &second, &elsewhere] {
            store.insert_message(envelope).await.unwrap();
        }

        let history = store.list_messages(&general).await.unwrap();
        let ids: Vec<_> = history.iter().map(|envelope| envelope.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(history[1].sender, "alice");
        assert_eq!(history[0].sender, "Anonymous");
        assert_eq!(history[1].message, "first");
        assert_eq!(history[0].image.as_deref(), Some("/media/chat_images/cat.png"));
        assert_eq!(history[1].image, None);
        assert!(store.list_messages(&RoomId::from("empty")).await.unwrap().is_empty());
    }
}
