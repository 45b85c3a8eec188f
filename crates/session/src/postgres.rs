//! PostgreSQL session backend.
//!
//! Stores one row per history message plus a single `machine_state` record.
//! The pool is capped at 5 connections to stay under serverless pooler
//! limits (Supabase transaction pooler and friends).
//!
//! # Feature gate
//!
//! This module is behind the `postgres` feature flag:
//!
//! ```toml
//! hermitclaw-session = { workspace = true, features = ["postgres"] }
//! ```

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use hermitclaw_core::error::SessionError;
use hermitclaw_core::message::{Message, Role};

use crate::backend::{MachineState, SessionBackend};

/// Maximum pooled connections. Serverless poolers reject large pools.
const MAX_CONNECTIONS: u32 = 5;

/// At most this many messages are loaded per session.
const LOAD_LIMIT: i64 = 100;

/// PostgreSQL-backed session persistence.
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Connect and run the schema bootstrap.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(|e| SessionError::Backend(format!("Connection failed: {e}")))?;

        let backend = Self { pool };
        backend.ensure_schema().await?;
        info!("PostgreSQL session backend connected");
        Ok(backend)
    }

    async fn ensure_schema(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id          BIGSERIAL PRIMARY KEY,
                session_key TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL DEFAULT '',
                payload     JSONB,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Backend(format!("Schema bootstrap failed: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages (session_key, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Backend(format!("Schema bootstrap failed: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS machine_state (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL DEFAULT '',
                data        JSONB NOT NULL DEFAULT '{}',
                preferences JSONB NOT NULL DEFAULT '{}',
                memory      JSONB NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Backend(format!("Schema bootstrap failed: {e}")))?;

        Ok(())
    }

    /// Load the machine state record, if one exists.
    pub async fn load_machine_state(&self, id: &str) -> Result<Option<MachineState>, SessionError> {
        let row = sqlx::query(
            "SELECT id, name, data, preferences, memory FROM machine_state WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionError::Backend(e.to_string()))?;

        Ok(row.map(|r| MachineState {
            id: r.get("id"),
            name: r.get("name"),
            data: r.get("data"),
            preferences: r.get("preferences"),
            memory: r.get("memory"),
        }))
    }

    /// Upsert the machine state record.
    pub async fn save_machine_state(&self, state: &MachineState) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            INSERT INTO machine_state (id, name, data, preferences, memory)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                data = EXCLUDED.data,
                preferences = EXCLUDED.preferences,
                memory = EXCLUDED.memory
            "#,
        )
        .bind(&state.id)
        .bind(&state.name)
        .bind(&state.data)
        .bind(&state.preferences)
        .bind(&state.memory)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SessionBackend for PostgresBackend {
    async fn load_session(&self, key: &str) -> Result<Vec<Message>, SessionError> {
        let rows = sqlx::query(
            r#"
            SELECT role, content, payload FROM messages
            WHERE session_key = $1
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(key)
        .bind(LOAD_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionError::Backend(e.to_string()))?;

        if rows.is_empty() {
            return Err(SessionError::Backend(format!("No stored session: {key}")));
        }

        let messages = rows
            .into_iter()
            .filter_map(|r| {
                // Full payload wins when present; bare role/content otherwise.
                let payload: Option<serde_json::Value> = r.get("payload");
                if let Some(value) = payload {
                    if let Ok(msg) = serde_json::from_value::<Message>(value) {
                        return Some(msg);
                    }
                }
                let role: String = r.get("role");
                let content: String = r.get("content");
                let role = match role.as_str() {
                    "user" => Role::User,
                    "assistant" => Role::Assistant,
                    "system" => Role::System,
                    "tool" => Role::Tool,
                    _ => return None,
                };
                Some(match role {
                    Role::User => Message::user(content),
                    Role::Assistant => Message::assistant(content),
                    Role::System => Message::system(content),
                    Role::Tool => Message::tool_result("", content),
                })
            })
            .collect::<Vec<_>>();

        debug!(key, count = messages.len(), "Session loaded from store");
        Ok(messages)
    }

    async fn save_session(&self, key: &str, messages: &[Message]) -> Result<(), SessionError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        sqlx::query("DELETE FROM messages WHERE session_key = $1")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        for msg in messages {
            let payload = serde_json::to_value(msg)
                .map_err(|e| SessionError::Backend(e.to_string()))?;
            sqlx::query(
                "INSERT INTO messages (session_key, role, content, payload) VALUES ($1, $2, $3, $4)",
            )
            .bind(key)
            .bind(msg.role.to_string())
            .bind(&msg.content)
            .bind(payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        debug!(key, count = messages.len(), "Session saved to store");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }
}
