use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OpenFlags};

use super::server_interface::{ErrorDetails, ErrorLayer, Result, RowSource, ServerError};
use crate::file_format::join_row::JoinRow;

/// A locked or missing database may well sort itself out; a bad query or a
/// NULL where the schema promised a value won't.
impl From<rusqlite::Error> for ServerError {
    fn from(err: rusqlite::Error) -> ServerError {
        let layer = match &err {
            rusqlite::Error::SqliteFailure(inner, _) => match inner.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen => {
                    return ServerError::TransientProblem(ErrorDetails {
                        layer: ErrorLayer::ServerLayer,
                        message: err.to_string(),
                    });
                }
                _ => ErrorLayer::ServerLayer,
            },
            rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
                ErrorLayer::DataLayer
            }
            _ => ErrorLayer::ServerLayer,
        };
        ServerError::StickyProblem(ErrorDetails {
            layer,
            message: err.to_string(),
        })
    }
}

/// One row per file, walking customers down to files with `LEFT JOIN`s so
/// that childless nodes still show up.  Files attach either through a
/// process run's artifacts or as a part revision's geometry file; the latter
/// yields rows with a file but no process run when the revision hasn't been
/// trialed or a trial has no runs yet.
///
/// The rowid ordering keeps the output stable across requests, which keeps
/// the tree stable for the UI.
pub const FILE_TREE_QUERY: &str = "SELECT \
    customer.name AS customer_name, \
    part.name AS part_name, \
    part_revision.name AS part_revision_name, \
    trial.uuid AS trial_uuid, \
    trial.success AS trial_success, \
    process_run.type AS process_run_type, \
    file.location AS file_location, \
    file.type AS file_type \
    FROM customer \
    LEFT JOIN part ON customer.uuid = part.customer_uuid \
    LEFT JOIN part_revision ON part.uuid = part_revision.part_uuid \
    LEFT JOIN trial ON part_revision.uuid = trial.part_revision_uuid \
    LEFT JOIN process_run ON trial.uuid = process_run.trial_uuid \
    LEFT JOIN process_run_file_artifact ON process_run.uuid = process_run_file_artifact.process_run_uuid \
    LEFT JOIN file ON process_run_file_artifact.file_artifact_uuid = file.uuid \
        OR part_revision.geometry_file_uuid = file.uuid \
    ORDER BY customer.rowid, part.rowid, part_revision.rowid, trial.rowid, \
        process_run.rowid, file.rowid";

#[derive(Debug)]
pub struct SqliteRowSource {
    database_path: PathBuf,
}

impl SqliteRowSource {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        SqliteRowSource {
            database_path: database_path.into(),
        }
    }
}

fn query_rows(database_path: &Path) -> Result<Vec<JoinRow>> {
    let conn = Connection::open_with_flags(database_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(FILE_TREE_QUERY)?;
    let mapped = stmt.query_map([], |row| {
        Ok(JoinRow {
            customer_name: row.get(0)?,
            part_name: row.get(1)?,
            part_revision_name: row.get(2)?,
            trial_uuid: row.get(3)?,
            trial_success: row.get(4)?,
            process_run_type: row.get(5)?,
            file_location: row.get(6)?,
            file_type: row.get(7)?,
        })
    })?;
    let rows = mapped.collect::<rusqlite::Result<Vec<JoinRow>>>()?;
    Ok(rows)
}

#[async_trait]
impl RowSource for SqliteRowSource {
    async fn fetch_rows(&self) -> Result<Vec<JoinRow>> {
        let database_path = self.database_path.clone();
        let rows = tokio::task::spawn_blocking(move || query_rows(&database_path)).await??;
        debug!(rows = rows.len(), path = %self.database_path.display(), "queried file tree rows");
        Ok(rows)
    }
}
