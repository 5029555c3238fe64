//! Moving objects between folders.
//!
//! A move is copy-then-delete, which is not atomic, so every move is written
//! to the `moves` journal before anything touches the store:
//!
//! ```text
//! pending --copy+verify--> copied --delete source--> done
//! ```
//!
//! [`recover`] finishes whatever a previous run left behind, working only
//! from the journal and what currently exists in the bucket.

use rusqlite::{params, Connection};

use crate::error::{FlowError, Result};
use crate::models::{Folder, RouteOutcome};
use crate::store::{checksum, ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    Pending,
    Copied,
    Done,
    /// Neither a verified destination nor the original source is left, or
    /// the source was replaced with different content.
    Abandoned,
}

impl MoveState {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Copied => "copied",
            Self::Done => "done",
            Self::Abandoned => "abandoned",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "pending" => Some(Self::Pending),
            "copied" => Some(Self::Copied),
            "done" => Some(Self::Done),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: i64,
    pub source: String,
    pub destination: String,
    pub checksum: String,
    pub state: MoveState,
}

fn begin(conn: &Connection, source: &str, destination: &str, checksum: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO moves (source, destination, checksum, state) VALUES (?1, ?2, ?3, 'pending')",
        params![source, destination, checksum],
    )?;
    Ok(conn.last_insert_rowid())
}

fn set_state(conn: &Connection, id: i64, state: MoveState) -> Result<()> {
    let finished = matches!(state, MoveState::Done | MoveState::Abandoned);
    conn.execute(
        "UPDATE moves SET state = ?1, \
         finished_at = CASE WHEN ?2 = 1 THEN datetime('now') ELSE NULL END WHERE id = ?3",
        params![state.key(), finished as i32, id],
    )?;
    Ok(())
}

/// Journal entries that have not reached a final state, oldest first.
pub fn unfinished_moves(conn: &Connection) -> Result<Vec<JournalEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, source, destination, checksum, state FROM moves \
         WHERE state IN ('pending', 'copied') ORDER BY id",
    )?;
    let rows: Vec<(i64, String, String, String, String)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, source, destination, checksum, state)| {
            let state = MoveState::from_key(&state)
                .ok_or_else(|| FlowError::Other(format!("unknown move state: {state}")))?;
            Ok(JournalEntry {
                id,
                source,
                destination,
                checksum,
                state,
            })
        })
        .collect()
}

fn holds(store: &dyn ObjectStore, name: &str, expected: &str) -> Result<bool> {
    if !store.exists(name)? {
        return Ok(false);
    }
    Ok(checksum(&store.read(name)?) == expected)
}

fn copy_verify_delete(
    store: &dyn ObjectStore,
    conn: &Connection,
    id: i64,
    source: &str,
    destination: &str,
    expected: &str,
) -> Result<()> {
    store.copy(source, destination)?;
    if !holds(store, destination, expected)? {
        return Err(FlowError::ChecksumMismatch {
            source_name: source.to_string(),
            destination: destination.to_string(),
        });
    }
    set_state(conn, id, MoveState::Copied)?;
    store.delete(source)?;
    set_state(conn, id, MoveState::Done)?;
    Ok(())
}

/// Move `source` to `destination`. `expected` is the checksum of the bytes
/// the caller read from `source`; the source is only deleted once the
/// destination is known to hold exactly those bytes.
pub fn move_object(
    store: &dyn ObjectStore,
    conn: &Connection,
    source: &str,
    destination: &str,
    expected: &str,
) -> Result<()> {
    let id = begin(conn, source, destination, expected)?;
    copy_verify_delete(store, conn, id, source, destination, expected)?;
    tracing::debug!(source, destination, "moved object");
    Ok(())
}

/// Route a validated `input/` object to `error/` or `clean/`.
pub fn route(
    store: &dyn ObjectStore,
    conn: &Connection,
    name: &str,
    expected: &str,
    has_errors: bool,
) -> Result<RouteOutcome> {
    let to = if has_errors { Folder::Error } else { Folder::Clean };
    let destination = Folder::Input
        .relocate(name, to)
        .ok_or_else(|| FlowError::InvalidObjectName(name.to_string()))?;
    move_object(store, conn, name, &destination, expected)?;
    tracing::info!(file = name, destination = %destination, "routed");
    Ok(if has_errors {
        RouteOutcome::Error { destination }
    } else {
        RouteOutcome::Clean { destination }
    })
}

/// Drive every unfinished journal entry to `done` or `abandoned`.
/// Returns how many moves were completed.
pub fn recover(store: &dyn ObjectStore, conn: &Connection) -> Result<usize> {
    let mut completed = 0usize;
    for entry in unfinished_moves(conn)? {
        let JournalEntry {
            id,
            ref source,
            ref destination,
            ref checksum,
            state,
        } = entry;

        if holds(store, destination, checksum)? {
            if holds(store, source, checksum)? {
                store.delete(source)?;
            } else if store.exists(source)? {
                tracing::info!(source = %source, "source was replaced; left for the next scan");
            }
            set_state(conn, id, MoveState::Done)?;
            completed += 1;
            tracing::info!(source = %source, destination = %destination, was = state.key(), "recovered move");
        } else if holds(store, source, checksum)? {
            copy_verify_delete(store, conn, id, source, destination, checksum)?;
            completed += 1;
            tracing::info!(source = %source, destination = %destination, was = state.key(), "redid move");
        } else {
            set_state(conn, id, MoveState::Abandoned)?;
            tracing::warn!(
                source = %source,
                destination = %destination,
                "abandoned move: no copy with the journaled checksum is left"
            );
        }
    }
    Ok(completed)
}
