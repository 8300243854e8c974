//! SQLite persistence layer for the village.
//!
//! One database file is shared by the simulation (the only writer) and the
//! dashboard feed (readers on their own connections). The schema:
//!
//! ```sql
//! agents           (id PK, name UNIQUE, personality, backstory, current_location)
//! long_term_memory (id PK, agent_name, memory)
//! interactions     (id PK, speaker_id, listener_id NULL, interaction_type, content, timestamp)
//! actions          (id PK, agent_id, location, action, timestamp)
//! ```
//!
//! - Every write is a single auto-committed statement, synced to disk
//!   before it returns (`synchronous = FULL` by default).
//! - WAL mode lets dashboard snapshots read while the simulation writes.
//! - Snapshots run inside one read transaction and see a consistent state.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::config::PersistenceConfig;
use crate::dashboard::{AgentRow, DashboardSnapshot};
use crate::error::Result;
use crate::records::{decode_timestamp, encode_timestamp, ActionRecord, InteractionRecord};
use crate::types::{AgentDefinition, AgentId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id               INTEGER PRIMARY KEY,
    name             TEXT NOT NULL UNIQUE,
    personality      TEXT NOT NULL,
    backstory        TEXT NOT NULL,
    current_location TEXT
);
CREATE TABLE IF NOT EXISTS long_term_memory (
    id         INTEGER PRIMARY KEY,
    agent_name TEXT NOT NULL,
    memory     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_long_term_memory_agent
    ON long_term_memory (agent_name, id);
CREATE TABLE IF NOT EXISTS interactions (
    id               INTEGER PRIMARY KEY,
    speaker_id       INTEGER NOT NULL REFERENCES agents (id),
    listener_id      INTEGER REFERENCES agents (id),
    interaction_type TEXT NOT NULL,
    content          TEXT NOT NULL,
    timestamp        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_interactions_timestamp ON interactions (timestamp, id);
CREATE TABLE IF NOT EXISTS actions (
    id        INTEGER PRIMARY KEY,
    agent_id  INTEGER NOT NULL REFERENCES agents (id),
    location  TEXT NOT NULL,
    action    TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_actions_timestamp ON actions (timestamp, id);
";

const RESET_LOGS: &str = "
DROP TABLE IF EXISTS interactions;
DROP TABLE IF EXISTS actions;
";

/// Handle to the village database.
///
/// Shared as `Arc<VillageStore>` between the agents, their memory stores
/// and the world map. The connection sits behind a mutex so the handle is
/// `Sync`; the tick loop itself is single-threaded.
pub struct VillageStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    read_only: bool,
}

impl std::fmt::Debug for VillageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VillageStore")
            .field("db_path", &self.db_path)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl VillageStore {
    /// Open (or create) the database at `path` for writing.
    ///
    /// Creates the schema if needed. When `config.reset_logs_on_start` is
    /// set, the interaction and action logs are dropped and recreated;
    /// agents and long-term memory survive.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch(&format!(
            "PRAGMA synchronous = {};",
            config.synchronous.as_pragma()
        ))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        if config.reset_logs_on_start {
            conn.execute_batch(RESET_LOGS)?;
        }
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            synchronous = config.synchronous.as_pragma(),
            reset_logs = config.reset_logs_on_start,
            "Village store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            read_only: false,
        })
    }

    /// Open an existing database for reading only (dashboard side).
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) if the file
    /// does not exist or cannot be opened.
    pub fn open_read_only<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        debug!(path = %db_path.display(), "Village store opened read-only");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            read_only: true,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
            read_only: false,
        })
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Insert the agent if its name is new, then return the stored row.
    ///
    /// An existing row wins: a restarted village keeps its agents' ids and
    /// locations.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn upsert_agent(&self, def: &AgentDefinition) -> Result<AgentRow> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO agents (name, personality, backstory, current_location)
             VALUES (?1, ?2, ?3, NULL)",
            params![def.name, def.personality, def.backstory],
        )?;
        let row = conn.query_row(
            "SELECT id, name, personality, backstory, current_location
             FROM agents WHERE name = ?1",
            params![def.name],
            agent_row,
        )?;
        debug!(agent = %row.name, id = %row.id, created = inserted > 0, "Agent row ready");
        Ok(row)
    }

    /// Persist an agent's new location.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite
    /// failures or if no agent has `id`.
    pub fn update_location(&self, id: AgentId, location: &str) -> Result<()> {
        let updated = self.conn.lock().execute(
            "UPDATE agents SET current_location = ?1 WHERE id = ?2",
            params![location, id.0],
        )?;
        if updated == 0 {
            return Err(rusqlite::Error::QueryReturnedNoRows.into());
        }
        Ok(())
    }

    /// Name of the agent with `id`, or `"Unknown"`.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn agent_name(&self, id: AgentId) -> Result<String> {
        let name: Option<String> = self
            .conn
            .lock()
            .query_row("SELECT name FROM agents WHERE id = ?1", params![id.0], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(name.unwrap_or_else(|| "Unknown".to_string()))
    }

    /// All agents, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn list_agents(&self) -> Result<Vec<AgentRow>> {
        query_agents(&self.conn.lock())
    }

    // ------------------------------------------------------------------
    // Long-term memory
    // ------------------------------------------------------------------

    /// Durably append one long-term memory entry.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn append_long_term(&self, agent_name: &str, memory: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO long_term_memory (agent_name, memory) VALUES (?1, ?2)",
            params![agent_name, memory],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Every long-term entry for `agent_name`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn load_long_term(&self, agent_name: &str) -> Result<Vec<String>> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT memory FROM long_term_memory WHERE agent_name = ?1 ORDER BY id",
        )?;
        let memories = stmt
            .query_map(params![agent_name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        debug!(
            agent = %agent_name,
            memories = memories.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded long-term memory"
        );
        Ok(memories)
    }

    // ------------------------------------------------------------------
    // Activity logs
    // ------------------------------------------------------------------

    /// Append an interaction record.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn append_interaction(&self, record: &InteractionRecord) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO interactions (speaker_id, listener_id, interaction_type, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.speaker_id.0,
                record.listener_id.map(|id| id.0),
                record.kind.as_str(),
                record.content,
                encode_timestamp(&record.timestamp),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Append an action record.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn append_action(&self, record: &ActionRecord) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO actions (agent_id, location, action, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.agent_id.0,
                record.location,
                record.action,
                encode_timestamp(&record.timestamp),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The `limit` most recent interactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failures or undecodable rows.
    pub fn recent_interactions(&self, limit: usize) -> Result<Vec<InteractionRecord>> {
        query_recent_interactions(&self.conn.lock(), limit)
    }

    /// The `limit` most recent actions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failures or undecodable rows.
    pub fn recent_actions(&self, limit: usize) -> Result<Vec<ActionRecord>> {
        query_recent_actions(&self.conn.lock(), limit)
    }

    /// Agents plus the `limit` most recent interactions and actions, all
    /// read inside one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failures or undecodable rows.
    pub fn snapshot(&self, limit: usize) -> Result<DashboardSnapshot> {
        let start = Instant::now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let snapshot = DashboardSnapshot {
            agents: query_agents(&tx)?,
            interactions: query_recent_interactions(&tx, limit)?,
            actions: query_recent_actions(&tx, limit)?,
        };
        tx.commit()?;
        debug!(
            agents = snapshot.agents.len(),
            interactions = snapshot.interactions.len(),
            actions = snapshot.actions.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Dashboard snapshot read"
        );
        Ok(snapshot)
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Column names of `table`, in declaration order. Empty if the table
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(columns)
    }

    /// Run an integrity check on the database.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) if the check query fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String =
            self.conn
                .lock()
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Whether this handle was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn agent_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRow> {
    Ok(AgentRow {
        id: AgentId(row.get(0)?),
        name: row.get(1)?,
        personality: row.get(2)?,
        backstory: row.get(3)?,
        current_location: row.get(4)?,
    })
}

fn query_agents(conn: &Connection) -> Result<Vec<AgentRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name, personality, backstory, current_location FROM agents ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], agent_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn query_recent_interactions(conn: &Connection, limit: usize) -> Result<Vec<InteractionRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, speaker_id, listener_id, interaction_type, content
         FROM interactions ORDER BY timestamp DESC, id DESC LIMIT ?1",
    )?;
    let raw = stmt
        .query_map(params![sql_limit(limit)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raw.into_iter()
        .map(|(timestamp, speaker, listener, kind, content)| -> Result<InteractionRecord> {
            Ok(InteractionRecord {
                timestamp: decode_timestamp(&timestamp)?,
                speaker_id: AgentId(speaker),
                listener_id: listener.map(AgentId),
                kind: kind.parse()?,
                content,
            })
        })
        .collect()
}

fn query_recent_actions(conn: &Connection, limit: usize) -> Result<Vec<ActionRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, agent_id, location, action
         FROM actions ORDER BY timestamp DESC, id DESC LIMIT ?1",
    )?;
    let raw = stmt
        .query_map(params![sql_limit(limit)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raw.into_iter()
        .map(|(timestamp, agent, location, action)| -> Result<ActionRecord> {
            Ok(ActionRecord {
                timestamp: decode_timestamp(&timestamp)?,
                agent_id: AgentId(agent),
                location,
                action,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
