use std::path::PathBuf;

use async_trait::async_trait;

use super::server_interface::{ErrorDetails, ErrorLayer, Result, RowSource, ServerError};
use crate::file_format::join_row::JoinRow;

/// Local IO failures are sticky; the file isn't going to fix itself.
impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::ServerLayer,
            message: err.to_string(),
        })
    }
}

/// Rows that were already pulled out of the database and saved as a JSON
/// array of objects keyed by column name.  Handy for reproducing a tree from a
/// captured query result without the database around.
#[derive(Debug)]
pub struct JsonRowSource {
    rows_path: PathBuf,
}

impl JsonRowSource {
    pub fn new(rows_path: impl Into<PathBuf>) -> Self {
        JsonRowSource {
            rows_path: rows_path.into(),
        }
    }
}

#[async_trait]
impl RowSource for JsonRowSource {
    async fn fetch_rows(&self) -> Result<Vec<JoinRow>> {
        let raw = tokio::fs::read_to_string(&self.rows_path).await?;
        let rows: Vec<JoinRow> = serde_json::from_str(&raw)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_rows_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(
            &path,
            r#"[
                {"customer_name": "A", "part_name": "P1", "trial_success": 1},
                {"customer_name": "B"}
            ]"#,
        )
        .unwrap();

        let rows = JsonRowSource::new(&path).fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].part_name.as_deref(), Some("P1"));
        assert_eq!(rows[0].trial_success, Some(true));
        assert_eq!(rows[1].customer_name, "B");
    }

    #[tokio::test]
    async fn test_malformed_rows_are_data_problems() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, r#"[{"part_name": "P1"}]"#).unwrap();

        let err = JsonRowSource::new(&path).fetch_rows().await.unwrap_err();
        assert_eq!(err.kind(), "data");
    }

    #[tokio::test]
    async fn test_missing_rows_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonRowSource::new(dir.path().join("missing.json"))
            .fetch_rows()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "server");
    }
}
