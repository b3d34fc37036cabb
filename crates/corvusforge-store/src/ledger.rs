// crates/corvusforge-store/src/ledger.rs
// ============================================================================
// Module: SQLite Run Ledger
// Description: Durable, hash-chained, append-only ledger backed by SQLite.
// Purpose: Persist ledger entries per run with a UNIQUE constraint on
// `entry_hash` as defense-in-depth against the chain ever silently
// duplicating an entry, and serialize appends per run.
// Dependencies: corvusforge-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Each run gets its own append-only sequence of rows in `ledger_entries`,
//! ordered by an auto-incrementing `seq` column. Appending takes a per-run
//! lock before touching the database, so two threads appending to different
//! runs never block each other, while two threads appending to the same run
//! serialize (spec §5: single-writer-per-run). The `entry_hash UNIQUE` index
//! is a second, storage-level line of defense: even a bug that let two
//! concurrent appends race past the in-process lock would still be rejected
//! by `SQLite`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use corvusforge_core::LedgerAnchor;
use corvusforge_core::LedgerEntry;
use corvusforge_core::LedgerEntryDraft;
use corvusforge_core::LedgerError;
use corvusforge_core::LedgerStore;
use corvusforge_core::RunId;
use corvusforge_core::Timestamp;
use corvusforge_core::hash_canonical_json;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;

/// `SQLite` schema version for the ledger store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// A durable [`LedgerStore`] backed by a single `SQLite` database file.
///
/// # Invariants
/// - Appends to the same run are serialized by a per-run in-process lock in
///   addition to `SQLite`'s own locking.
/// - `entry_hash` carries a `UNIQUE` index; a colliding append is rejected,
///   never silently overwritten.
pub struct SqliteLedgerStore {
    connection: Mutex<Connection>,
    run_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SqliteLedgerStore {
    /// Opens (creating if absent) a ledger store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the database cannot be opened or
    /// the schema cannot be initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(path.as_ref(), flags)
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
        apply_pragmas(&connection)?;
        initialize_schema(&connection)?;
        Ok(Self { connection: Mutex::new(connection), run_locks: Mutex::new(HashMap::new()) })
    }

    /// Opens an in-memory ledger store, primarily for tests.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the schema cannot be initialized.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let connection = Connection::open_in_memory().map_err(|err| LedgerError::Storage(err.to_string()))?;
        apply_pragmas(&connection)?;
        initialize_schema(&connection)?;
        Ok(Self { connection: Mutex::new(connection), run_locks: Mutex::new(HashMap::new()) })
    }

    /// Returns (creating if absent) the per-run lock serializing appends to
    /// `run_id`.
    fn run_lock(&self, run_id: &RunId) -> Arc<Mutex<()>> {
        let mut locks = self.run_locks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        locks.entry(run_id.as_str().to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Applies the durability pragmas the ledger store requires.
fn apply_pragmas(connection: &Connection) -> Result<(), LedgerError> {
    connection
        .execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL; PRAGMA foreign_keys = ON;")
        .map_err(|err| LedgerError::Storage(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
        .map_err(|err| LedgerError::Storage(err.to_string()))?;
    Ok(())
}

/// Creates the ledger schema if absent, or validates the stored version.
fn initialize_schema(connection: &Connection) -> Result<(), LedgerError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);
             CREATE TABLE IF NOT EXISTS runs (
                 run_id TEXT PRIMARY KEY
             );
             CREATE TABLE IF NOT EXISTS ledger_entries (
                 seq INTEGER PRIMARY KEY AUTOINCREMENT,
                 run_id TEXT NOT NULL,
                 entry_hash TEXT NOT NULL UNIQUE,
                 previous_entry_hash TEXT NOT NULL,
                 entry_json TEXT NOT NULL,
                 FOREIGN KEY (run_id) REFERENCES runs (run_id)
             );
             CREATE INDEX IF NOT EXISTS idx_ledger_entries_run_seq
                 ON ledger_entries (run_id, seq);",
        )
        .map_err(|err| LedgerError::Storage(err.to_string()))?;
    let version: Option<i64> = connection
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| LedgerError::Storage(err.to_string()))?;
    if version.is_none() {
        connection
            .execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
    }
    Ok(())
}

impl LedgerStore for SqliteLedgerStore {
    fn create_run(&self, run_id: &RunId) -> Result<(), LedgerError> {
        let connection = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let existing: Option<String> = connection
            .query_row("SELECT run_id FROM runs WHERE run_id = ?1", params![run_id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
        if existing.is_some() {
            return Err(LedgerError::RunAlreadyExists(run_id.clone()));
        }
        connection
            .execute("INSERT INTO runs (run_id) VALUES (?1)", params![run_id.as_str()])
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
        Ok(())
    }

    fn append(&self, run_id: &RunId, draft: LedgerEntryDraft) -> Result<LedgerEntry, LedgerError> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let connection = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let run_exists: Option<String> = connection
            .query_row("SELECT run_id FROM runs WHERE run_id = ?1", params![run_id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
        if run_exists.is_none() {
            return Err(LedgerError::RunNotFound(run_id.clone()));
        }

        let head: Option<(String, String)> = connection
            .query_row(
                "SELECT entry_hash, entry_json FROM ledger_entries WHERE run_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![run_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
        let previous_entry_hash = head.as_ref().map(|(hash, _)| hash.clone()).unwrap_or_default();
        let previous_timestamp = head
            .as_ref()
            .map(|(_, json)| serde_json::from_str::<LedgerEntry>(json))
            .transpose()
            .map_err(|err| LedgerError::Storage(err.to_string()))?
            .map(|entry| entry.timestamp_utc);

        let mut draft = draft;
        if let Some(floor) = previous_timestamp {
            draft.timestamp_utc = draft.timestamp_utc.clamp_after(floor);
        }
        let entry = draft.finalize(previous_entry_hash.clone())?;
        let entry_json = serde_json::to_string(&entry).map_err(|err| LedgerError::Storage(err.to_string()))?;

        let inserted = connection.execute(
            "INSERT INTO ledger_entries (run_id, entry_hash, previous_entry_hash, entry_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id.as_str(), entry.entry_hash, previous_entry_hash, entry_json],
        );
        match inserted {
            Ok(_) => Ok(entry),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LedgerError::DuplicateEntry(run_id.clone()))
            }
            Err(err) => Err(LedgerError::Storage(err.to_string())),
        }
    }

    fn entries(&self, run_id: &RunId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let connection = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let run_exists: Option<String> = connection
            .query_row("SELECT run_id FROM runs WHERE run_id = ?1", params![run_id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
        if run_exists.is_none() {
            return Err(LedgerError::RunNotFound(run_id.clone()));
        }

        let mut statement = connection
            .prepare("SELECT entry_json FROM ledger_entries WHERE run_id = ?1 ORDER BY seq ASC")
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
        let rows = statement
            .query_map(params![run_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| LedgerError::Storage(err.to_string()))?;
        let mut entries = Vec::new();
        for row in rows {
            let json = row.map_err(|err| LedgerError::Storage(err.to_string()))?;
            let entry: LedgerEntry =
                serde_json::from_str(&json).map_err(|err| LedgerError::Storage(err.to_string()))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn verify_chain(&self, run_id: &RunId) -> Result<(), LedgerError> {
        let entries = self.entries(run_id)?;
        let mut expected_previous = String::new();
        for entry in &entries {
            if entry.previous_entry_hash != expected_previous {
                return Err(LedgerError::ChainBroken(run_id.clone(), entry.entry_id.to_string()));
            }
            let recomputed = recompute_entry_hash(entry)?;
            if recomputed != entry.entry_hash {
                return Err(LedgerError::ChainBroken(run_id.clone(), entry.entry_id.to_string()));
            }
            expected_previous = entry.entry_hash.clone();
        }
        Ok(())
    }

    fn export_anchor(&self, run_id: &RunId) -> Result<LedgerAnchor, LedgerError> {
        let entries = self.entries(run_id)?;
        let entry_count = entries.len() as u64;
        let first_entry_hash = entries.first().map(|e| e.entry_hash.clone()).unwrap_or_default();
        let head_entry_hash = entries.last().map(|e| e.entry_hash.clone()).unwrap_or_default();
        let timestamp_utc = Timestamp::now();

        let root_hash = if entries.is_empty() {
            String::new()
        } else {
            hash_canonical_json(&(run_id.as_str(), entry_count, &head_entry_hash))?
        };

        let mut anchor = LedgerAnchor {
            run_id: run_id.clone(),
            entry_count,
            root_hash,
            first_entry_hash,
            timestamp_utc,
            anchor_hash: String::new(),
            signature: None,
        };
        anchor.anchor_hash = hash_canonical_json(&anchor.hashable_view())?;
        Ok(anchor)
    }

    fn verify_against_anchor(&self, run_id: &RunId, anchor: &LedgerAnchor) -> Result<(), LedgerError> {
        let recomputed_anchor_hash = hash_canonical_json(&anchor.hashable_view())?;
        if recomputed_anchor_hash != anchor.anchor_hash {
            return Err(LedgerError::AnchorMismatch(run_id.clone(), "anchor_hash does not recompute".to_string()));
        }

        let entries = self.entries(run_id)?;
        let current_count = entries.len() as u64;
        if current_count < anchor.entry_count {
            return Err(LedgerError::AnchorMismatch(run_id.clone(), "chain is shorter than anchor".to_string()));
        }

        if anchor.entry_count > 0 {
            let first_hash = entries.first().map(|entry| entry.entry_hash.as_str()).unwrap_or_default();
            if first_hash != anchor.first_entry_hash {
                return Err(LedgerError::AnchorMismatch(
                    run_id.clone(),
                    "first_entry_hash no longer matches".to_string(),
                ));
            }

            let checkpoint_index = (anchor.entry_count - 1) as usize;
            let checkpoint_hash = entries[checkpoint_index].entry_hash.clone();
            let expected_root_hash = hash_canonical_json(&(run_id.as_str(), anchor.entry_count, &checkpoint_hash))?;
            if expected_root_hash != anchor.root_hash {
                return Err(LedgerError::AnchorMismatch(run_id.clone(), "root_hash no longer matches".to_string()));
            }
        }

        self.verify_chain(run_id)
    }
}

/// Recomputes `entry`'s hash from its own fields, chained against its own
/// stored `previous_entry_hash`, for chain verification.
fn recompute_entry_hash(entry: &LedgerEntry) -> Result<String, LedgerError> {
    let draft = LedgerEntryDraft {
        entry_id: entry.entry_id.clone(),
        run_id: entry.run_id.clone(),
        stage_id: entry.stage_id,
        state_transition: entry.state_transition,
        timestamp_utc: entry.timestamp_utc,
        input_hash: entry.input_hash.clone(),
        output_hash: entry.output_hash.clone(),
        artifact_refs: entry.artifact_refs.clone(),
        pipeline_version: entry.pipeline_version.clone(),
        schema_version: entry.schema_version.clone(),
        toolchain_version: entry.toolchain_version.clone(),
        ruleset_versions: entry.ruleset_versions.clone(),
        waiver_refs: entry.waiver_refs.clone(),
        trust_context: entry.trust_context.clone(),
        trust_context_version: entry.trust_context_version.clone(),
        payload_hash: entry.payload_hash.clone(),
    };
    let finalized = draft.finalize(entry.previous_entry_hash.clone())?;
    Ok(finalized.entry_hash)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;
    use corvusforge_core::EntryId;
    use corvusforge_core::StageIdentifier;
    use corvusforge_core::StageState;
    use corvusforge_core::StateTransition;
    use corvusforge_core::TrustContext;
    use std::collections::BTreeMap;

    fn sample_draft(run_id: &RunId, entry_id: &str) -> LedgerEntryDraft {
        LedgerEntryDraft {
            entry_id: EntryId::new(entry_id),
            run_id: run_id.clone(),
            stage_id: StageIdentifier::S0Intake,
            state_transition: StateTransition { from: StageState::NotStarted, to: StageState::Running },
            timestamp_utc: Timestamp::now(),
            input_hash: String::new(),
            output_hash: String::new(),
            artifact_refs: Vec::new(),
            pipeline_version: "1.0.0".to_string(),
            schema_version: "1".to_string(),
            toolchain_version: "1.92".to_string(),
            ruleset_versions: BTreeMap::new(),
            waiver_refs: Vec::new(),
            trust_context: TrustContext::default(),
            trust_context_version: "1".to_string(),
            payload_hash: corvusforge_core::sha256_hex(b"{}"),
        }
    }

    #[test]
    fn append_to_unknown_run_is_rejected() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        let result = store.append(&run_id, sample_draft(&run_id, "e1"));
        assert!(matches!(result, Err(LedgerError::RunNotFound(_))));
    }

    #[test]
    fn first_entry_has_empty_previous_hash_and_chain_verifies() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        let entry = store.append(&run_id, sample_draft(&run_id, "e1")).unwrap();
        assert_eq!(entry.previous_entry_hash, "");
        assert!(store.verify_chain(&run_id).is_ok());
    }

    #[test]
    fn second_entry_chains_to_first() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        let first = store.append(&run_id, sample_draft(&run_id, "e1")).unwrap();
        let second = store.append(&run_id, sample_draft(&run_id, "e2")).unwrap();
        assert_eq!(second.previous_entry_hash, first.entry_hash);
        assert!(store.verify_chain(&run_id).is_ok());
    }

    #[test]
    fn duplicate_run_creation_is_rejected() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        assert!(matches!(store.create_run(&run_id), Err(LedgerError::RunAlreadyExists(_))));
    }

    #[test]
    fn export_anchor_reflects_head_and_count() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        store.append(&run_id, sample_draft(&run_id, "e1")).unwrap();
        let second = store.append(&run_id, sample_draft(&run_id, "e2")).unwrap();
        let anchor = store.export_anchor(&run_id).unwrap();
        assert_eq!(anchor.entry_count, 2);
        assert_eq!(anchor.first_entry_hash, store.entries(&run_id).unwrap()[0].entry_hash);
        assert_ne!(anchor.root_hash, "");
        let _ = second;
    }

    #[test]
    fn tampering_with_stored_entry_breaks_chain_verification() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        store.append(&run_id, sample_draft(&run_id, "e1")).unwrap();
        {
            let connection = store.connection.lock().unwrap();
            connection
                .execute(
                    "UPDATE ledger_entries SET entry_json = REPLACE(entry_json, 's0_intake', 's1_prerequisites')",
                    params![],
                )
                .unwrap();
        }
        assert!(matches!(store.verify_chain(&run_id), Err(LedgerError::ChainBroken(_, _))));
    }

    #[test]
    fn unmodified_chain_verifies_against_its_own_anchor() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        store.append(&run_id, sample_draft(&run_id, "e1")).unwrap();
        store.append(&run_id, sample_draft(&run_id, "e2")).unwrap();
        let anchor = store.export_anchor(&run_id).unwrap();
        assert!(store.verify_against_anchor(&run_id, &anchor).is_ok());
    }

    #[test]
    fn zero_entry_anchor_is_accepted() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        let anchor = store.export_anchor(&run_id).unwrap();
        assert_eq!(anchor.entry_count, 0);
        assert!(store.verify_against_anchor(&run_id, &anchor).is_ok());
    }

    #[test]
    fn truncated_chain_fails_anchor_verification() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        store.append(&run_id, sample_draft(&run_id, "e1")).unwrap();
        store.append(&run_id, sample_draft(&run_id, "e2")).unwrap();
        let anchor = store.export_anchor(&run_id).unwrap();
        {
            let connection = store.connection.lock().unwrap();
            connection
                .execute(
                    "DELETE FROM ledger_entries WHERE seq = (SELECT MAX(seq) FROM ledger_entries)",
                    params![],
                )
                .unwrap();
        }
        assert!(matches!(store.verify_against_anchor(&run_id, &anchor), Err(LedgerError::AnchorMismatch(_, _))));
    }

    #[test]
    fn tampering_after_anchor_export_fails_anchor_verification() {
        let store = SqliteLedgerStore::open_in_memory().unwrap();
        let run_id = RunId::new("run-1");
        store.create_run(&run_id).unwrap();
        store.append(&run_id, sample_draft(&run_id, "e1")).unwrap();
        let anchor = store.export_anchor(&run_id).unwrap();
        {
            let connection = store.connection.lock().unwrap();
            connection
                .execute(
                    "UPDATE ledger_entries SET entry_json = REPLACE(entry_json, 's0_intake', 's1_prerequisites')",
                    params![],
                )
                .unwrap();
        }
        assert!(store.verify_against_anchor(&run_id, &anchor).is_err());
    }
}
