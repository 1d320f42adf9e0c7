//! SQLite-backed metadata store.
//!
//! Owns the `File` table and its per-type companion tables. Records are only
//! ever created here; nothing in the ingestion core updates or deletes them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use thiserror::Error;

use super::schema;
use crate::domain::{ContentDigest, FileRecord, NewFileRecord, TypeCategory};

/// Errors that can occur in the metadata store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened. Fatal at startup.
    #[error("Failed to open metadata database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The database's parent directory could not be created. Fatal at startup.
    #[error("Failed to create database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A unique column collided on insert
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Category {0} cannot be stored")]
    InvalidCategory(TypeCategory),

    #[error("Corrupt row {id}: {message}")]
    Corrupt { id: i64, message: String },

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Handle to the metadata database
pub struct MetadataStore {
    conn: Connection,

    /// Categories whose companion table exists in this database
    companions: HashSet<TypeCategory>,
}

impl StoreError {
    /// Whether the process can keep running after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Open { .. } | StoreError::Directory { .. })
    }
}

impl MetadataStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let open_err = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };

        let conn = Connection::open(path).map_err(open_err)?;

        // SQLite opens lazily; touch the header so a non-database file fails here
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(open_err)?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open the database and make sure the schema exists
    pub fn bootstrap(path: &Path) -> Result<Self, StoreError> {
        let mut store = Self::open(path)?;
        store.ensure_schema()?;
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut store = Self {
            conn,
            companions: HashSet::new(),
        };
        store.refresh_companions()?;
        Ok(store)
    }

    /// Create the schema if the database has no tables.
    ///
    /// An existing non-empty schema is left untouched. Returns `true` when
    /// tables were created.
    pub fn ensure_schema(&mut self) -> Result<bool, StoreError> {
        let existing = self.table_names()?;
        if !existing.is_empty() {
            tracing::debug!("Metadata schema present ({} tables)", existing.len());
            self.refresh_companions()?;
            return Ok(false);
        }

        tracing::info!("Creating metadata schema");
        let tx = self.conn.transaction()?;
        tx.execute_batch(schema::CREATE_FILE_TABLE)?;
        for category in TypeCategory::STORABLE {
            if let Some(table) = category.companion_table() {
                tx.execute_batch(&schema::create_companion_table(table))?;
            }
        }
        tx.commit()?;

        self.refresh_companions()?;
        Ok(true)
    }

    /// True iff a record with this original checksum exists
    pub fn duplicate_exists(&self, original: &ContentDigest) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                r#"SELECT 1 FROM "File" WHERE "originalChecksum" = ?1 LIMIT 1"#,
                params![original.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// True iff some record points at `path`
    pub fn path_in_use(&self, path: &Path) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                r#"SELECT 1 FROM "File" WHERE "filePath" = ?1 LIMIT 1"#,
                params![path.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a record and its companion row in one transaction.
    ///
    /// Any unique-column collision is reported as [`StoreError::Constraint`].
    pub fn insert(&mut self, record: NewFileRecord) -> Result<FileRecord, StoreError> {
        if !record.file_type.is_storable() {
            return Err(StoreError::InvalidCategory(record.file_type));
        }

        let tx = self.conn.transaction()?;

        tx.execute(
            schema::INSERT_FILE,
            params![
                record.original_checksum.as_str(),
                record.converted_checksum.as_str(),
                record.file_path.to_string_lossy(),
                record.file_type.as_str(),
                record.created_on.to_rfc3339(),
                record.name,
                record.old_file_name,
            ],
        )
        .map_err(classify_write_error)?;

        let id = tx.last_insert_rowid();

        if self.companions.contains(&record.file_type) {
            if let Some(table) = record.file_type.companion_table() {
                tx.execute(&schema::insert_companion(table), params![id, record.name])
                    .map_err(classify_write_error)?;
            }
        }

        tx.commit()?;

        tracing::debug!(
            id,
            checksum = %record.converted_checksum,
            "Inserted {} record",
            record.file_type
        );

        Ok(record.into_record(id))
    }

    /// Look up a record by the digest of the uploaded bytes
    pub fn get_by_checksum(&self, original: &ContentDigest) -> Result<Option<FileRecord>, StoreError> {
        self.get_where(r#""originalChecksum" = ?1"#, original)
    }

    /// Look up a record by the digest of the stored bytes
    pub fn get_by_converted_checksum(
        &self,
        converted: &ContentDigest,
    ) -> Result<Option<FileRecord>, StoreError> {
        self.get_where(r#""convertedChecksum" = ?1"#, converted)
    }

    fn get_where(&self, clause: &str, digest: &ContentDigest) -> Result<Option<FileRecord>, StoreError> {
        let sql = format!("{} WHERE {} LIMIT 1", schema::SELECT_FILE, clause);
        let raw = self
            .conn
            .query_row(&sql, params![digest.as_str()], RawFileRow::from_row)
            .optional()?;
        raw.map(RawFileRow::into_record).transpose()
    }

    /// List records, newest first
    pub fn list(
        &self,
        file_type: Option<TypeCategory>,
        limit: Option<usize>,
    ) -> Result<Vec<FileRecord>, StoreError> {
        let sql = format!(
            r#"{} WHERE (?1 IS NULL OR "fileType" = ?1) ORDER BY "id" DESC LIMIT ?2"#,
            schema::SELECT_FILE
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![file_type.map(|t| t.as_str()), limit],
            RawFileRow::from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row(r#"SELECT count(*) FROM "File""#, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of rows in a category's companion table (0 if it doesn't exist)
    pub fn companion_count(&self, category: TypeCategory) -> Result<usize, StoreError> {
        match category.companion_table() {
            Some(table) if self.companions.contains(&category) => {
                let sql = format!(r#"SELECT count(*) FROM "{table}""#);
                let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
                Ok(count as usize)
            }
            _ => Ok(0),
        }
    }

    fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(schema::LIST_TABLES)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn refresh_companions(&mut self) -> Result<(), StoreError> {
        // SQLite table names are case-insensitive
        let tables: HashSet<String> = self
            .table_names()?
            .into_iter()
            .map(|n| n.to_lowercase())
            .collect();

        self.companions = TypeCategory::STORABLE
            .into_iter()
            .filter(|c| {
                c.companion_table()
                    .map(|t| tables.contains(&t.to_lowercase()))
                    .unwrap_or(false)
            })
            .collect();
        Ok(())
    }
}

fn classify_write_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Constraint(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => StoreError::Sqlite(err),
    }
}

/// Row as stored, before validation
struct RawFileRow {
    id: i64,
    original_checksum: String,
    converted_checksum: String,
    file_path: String,
    file_type: String,
    created_on: String,
    name: String,
    old_file_name: String,
}

impl RawFileRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            original_checksum: row.get(1)?,
            converted_checksum: row.get(2)?,
            file_path: row.get(3)?,
            file_type: row.get(4)?,
            created_on: text_or_number(row, 5)?,
            name: row.get(6)?,
            old_file_name: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<FileRecord, StoreError> {
        let id = self.id;
        let corrupt = |message: String| StoreError::Corrupt { id, message };

        let original_checksum = ContentDigest::parse(&self.original_checksum)
            .ok_or_else(|| corrupt(format!("bad originalChecksum {:?}", self.original_checksum)))?;
        let converted_checksum = ContentDigest::parse(&self.converted_checksum)
            .ok_or_else(|| corrupt(format!("bad convertedChecksum {:?}", self.converted_checksum)))?;
        let file_type: TypeCategory = self
            .file_type
            .parse()
            .map_err(|e: anyhow::Error| corrupt(e.to_string()))?;
        let created_on = parse_created_on(&self.created_on)
            .ok_or_else(|| corrupt(format!("bad createdOn {:?}", self.created_on)))?;

        Ok(FileRecord {
            id,
            original_checksum,
            converted_checksum,
            file_path: PathBuf::from(self.file_path),
            file_type,
            created_on,
            name: self.name,
            old_file_name: self.old_file_name,
        })
    }
}

/// `createdOn` is TEXT but older writers stored epoch milliseconds
fn text_or_number(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Integer(i) => Ok(i.to_string()),
        ValueRef::Real(f) => Ok((f as i64).to_string()),
        _ => row.get(idx),
    }
}

fn parse_created_on(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}
