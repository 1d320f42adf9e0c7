//! Relational schema of the metadata database.
//!
//! The `File` table layout is shared with other readers of the database file
//! and must not change.

/// Main table, one row per stored document
pub const CREATE_FILE_TABLE: &str = r#"
CREATE TABLE "File" (
    "id"                INTEGER PRIMARY KEY,
    "originalChecksum"  TEXT NOT NULL UNIQUE,
    "convertedChecksum" TEXT NOT NULL UNIQUE,
    "filePath"          TEXT NOT NULL UNIQUE,
    "fileType"          TEXT NOT NULL,
    "createdOn"         TEXT NOT NULL,
    "name"              TEXT NOT NULL,
    "oldFileName"       TEXT NOT NULL
);
"#;

/// DDL for a per-type companion table
pub fn create_companion_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE "{table}" (
    "id"     INTEGER PRIMARY KEY,
    "fileID" INTEGER NOT NULL UNIQUE REFERENCES "File"("id"),
    "name"   TEXT NOT NULL
);
"#
    )
}

pub const INSERT_FILE: &str = r#"
INSERT INTO "File" (
    "originalChecksum",
    "convertedChecksum",
    "filePath",
    "fileType",
    "createdOn",
    "name",
    "oldFileName"
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;

pub fn insert_companion(table: &str) -> String {
    format!(r#"INSERT INTO "{table}" ("fileID", "name") VALUES (?1, ?2)"#)
}

/// Column list shared by every `File` read
pub const SELECT_FILE: &str = r#"
SELECT "id", "originalChecksum", "convertedChecksum", "filePath",
       "fileType", "createdOn", "name", "oldFileName"
FROM "File"
"#;

/// User tables currently present (excludes SQLite internals)
pub const LIST_TABLES: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'";
