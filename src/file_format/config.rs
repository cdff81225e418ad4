use std::fs::File;
use std::io::BufReader;

use serde::Deserialize;

use crate::abstract_server::{
    ArchiveStore, ErrorDetails, ErrorLayer, JsonRowSource, Result, RowSource, ServerError,
    SqliteRowSource, ZipArchiveStore, DEFAULT_ENTRY_PREFIX,
};
use crate::hierarchy::{HierarchyBuilder, OrphanPolicy};

/// Schema for the server's config.json.  Every field has a default so an
/// empty object is a valid (if not very useful) config; the command line can
/// fill in the rest.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// SQLite database holding the customer/part/revision/trial/run/file
    /// tables.
    pub database_path: Option<String>,
    /// A JSON dump of already-joined rows to serve instead of querying the
    /// database.  Takes precedence over `database_path`.
    pub rows_path: Option<String>,
    /// Zip archive the `/file` endpoint reads from.
    pub archive_path: String,
    /// Directory inside the archive that file locations are relative to.
    pub archive_prefix: String,
    pub listen_addr: String,
    /// What to do with rows whose columns continue past a missing key.
    pub orphan_fields: OrphanPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            database_path: None,
            rows_path: None,
            archive_path: "files.zip".to_string(),
            archive_prefix: DEFAULT_ENTRY_PREFIX.to_string(),
            listen_addr: "0.0.0.0:3000".to_string(),
            orphan_fields: OrphanPolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn row_source(&self) -> Result<Box<dyn RowSource + Send + Sync>> {
        match (&self.rows_path, &self.database_path) {
            (Some(rows_path), _) => Ok(Box::new(JsonRowSource::new(rows_path))),
            (None, Some(database_path)) => Ok(Box::new(SqliteRowSource::new(database_path))),
            (None, None) => Err(ServerError::StickyProblem(ErrorDetails {
                layer: ErrorLayer::BadInput,
                message: "need either a database or a rows file to read from".to_string(),
            })),
        }
    }

    pub fn archive_store(&self) -> Box<dyn ArchiveStore + Send + Sync> {
        Box::new(ZipArchiveStore::new(
            &self.archive_path,
            &self.archive_prefix,
        ))
    }

    pub fn hierarchy_builder(&self) -> HierarchyBuilder {
        HierarchyBuilder::new(self.orphan_fields)
    }
}

pub fn load(config_path: &str) -> Result<ServerConfig> {
    let config_file = match File::open(config_path) {
        Ok(f) => f,
        Err(err) => {
            return Err(ServerError::StickyProblem(ErrorDetails {
                layer: ErrorLayer::BadInput,
                message: format!("can't open config {}: {}", config_path, err),
            }));
        }
    };
    let config: ServerConfig = serde_json::from_reader(BufReader::new(config_file))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.archive_prefix, "files/");
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.orphan_fields, OrphanPolicy::Skip);
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "database_path": "/srv/trials.sqlite",
                "archive_path": "/srv/files.zip",
                "orphan_fields": "truncate"
            }"#,
        )
        .unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.database_path.as_deref(), Some("/srv/trials.sqlite"));
        assert_eq!(config.archive_path, "/srv/files.zip");
        assert_eq!(config.orphan_fields, OrphanPolicy::Truncate);
        assert_eq!(config.hierarchy_builder().orphans, OrphanPolicy::Truncate);
        assert!(config.row_source().is_ok());
    }

    #[test]
    fn test_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"orphan_fields": "ignore"}"#).unwrap();
        assert_eq!(load(path.to_str().unwrap()).unwrap_err().kind(), "data");

        let missing = dir.path().join("missing.json");
        assert_eq!(load(missing.to_str().unwrap()).unwrap_err().kind(), "bad_input");
    }

    #[tokio::test]
    async fn test_rows_path_wins_over_database() {
        let dir = tempfile::tempdir().unwrap();
        let rows_path = dir.path().join("rows.json");
        std::fs::write(&rows_path, r#"[{"customer_name": "Acme"}]"#).unwrap();
        let config = ServerConfig {
            rows_path: Some(rows_path.to_str().unwrap().to_string()),
            database_path: Some(dir.path().join("absent.sqlite").to_str().unwrap().to_string()),
            ..Default::default()
        };

        let rows = config.row_source().unwrap().fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_name, "Acme");
    }

    #[test]
    fn test_row_source_required() {
        match ServerConfig::default().row_source() {
            Err(err) => assert_eq!(err.kind(), "bad_input"),
            Ok(_) => panic!("no row source was configured"),
        }
    }
}
