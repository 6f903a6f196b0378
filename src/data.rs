//! DuckDB-backed context data sources

use crate::config::ContextSpec;
use crate::context::{CancelToken, ContextDataSource, NamespaceData, RowData};
use crate::error::{ReconError, Result};
use duckdb::types::ValueRef;
use duckdb::{AccessMode, Config, Connection};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions tried, in order, when looking up a namespace in a directory context
pub const NAMESPACE_FILE_EXTENSIONS: &[&str] = &["csv", "parquet", "json"];

/// Rows between cancellation checks while reading
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Key column values are joined with this separator to form a row key
pub const KEY_SEPARATOR: &str = "|";

#[derive(Debug, Clone)]
enum Backing {
    Directory(PathBuf),
    Database(PathBuf),
}

/// Context reading namespaces through DuckDB, either from one file per
/// namespace or from tables of a DuckDB database file
#[derive(Debug, Clone)]
pub struct DuckDbContext {
    name: String,
    backing: Backing,
    key_columns: Vec<String>,
}

impl DuckDbContext {
    /// Open a context described by `spec`.
    ///
    /// Fails when the backing path does not exist.
    pub fn open(name: &str, spec: &ContextSpec) -> Result<Self> {
        let backing = match spec {
            ContextSpec::Directory { path, .. } => {
                if !path.is_dir() {
                    return Err(ReconError::context(format!(
                        "Directory not found for context '{}': {}",
                        name,
                        path.display()
                    )));
                }
                Backing::Directory(path.clone())
            }
            ContextSpec::Database { path, .. } => {
                if !path.is_file() {
                    return Err(ReconError::context(format!(
                        "Database not found for context '{}': {}",
                        name,
                        path.display()
                    )));
                }
                Backing::Database(path.clone())
            }
        };

        if spec.key_columns().is_empty() {
            return Err(ReconError::context(format!(
                "Context '{}' has no key columns",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            backing,
            key_columns: spec.key_columns().to_vec(),
        })
    }

    /// Open a connection and return the relation expression for `namespace`,
    /// or `None` when the namespace does not exist
    fn relation(&self, namespace: &str) -> Result<Option<(Connection, String)>> {
        match &self.backing {
            Backing::Directory(dir) => {
                let file = match find_namespace_file(dir, namespace) {
                    Some(file) => file,
                    None => return Ok(None),
                };
                let conn = open_in_memory()?;
                Ok(Some((conn, quote_literal(&file.to_string_lossy()))))
            }
            Backing::Database(db) => {
                let conn = open_database(db)?;
                let exists: i64 = conn
                    .prepare("SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?")?
                    .query_row([namespace], |row| row.get(0))?;
                if exists == 0 {
                    return Ok(None);
                }
                Ok(Some((conn, quote_identifier(namespace))))
            }
        }
    }

    fn read_rows(&self, conn: &Connection, relation: &str, cancel: &CancelToken) -> Result<NamespaceData> {
        conn.execute(
            &format!("CREATE OR REPLACE TEMP VIEW namespace_view AS SELECT * FROM {}", relation),
            [],
        )
        .map_err(|e| convert_duckdb_error(e, relation))?;

        let columns = column_names(conn)?;
        let key_positions = self
            .key_columns
            .iter()
            .map(|key| {
                columns.iter().position(|c| c == key).ok_or_else(|| {
                    ReconError::data_source(format!(
                        "Key column '{}' not found in {} (context '{}')",
                        key, relation, self.name
                    ))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        // Every value is compared as DuckDB's own text rendering
        let mut stmt = conn.prepare("SELECT COLUMNS(*)::VARCHAR FROM namespace_view")?;
        let mut rows = stmt.query([])?;
        let mut data = NamespaceData::new();
        let mut seen = 0usize;

        while let Some(row) = rows.next()? {
            seen += 1;
            if seen % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }

            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(value_to_string(row.get_ref(i)?, &columns[i])?);
            }

            let key = key_positions
                .iter()
                .map(|&i| values[i].as_str())
                .collect::<Vec<_>>()
                .join(KEY_SEPARATOR);

            let row_data: RowData = columns.iter().cloned().zip(values).collect();
            if data.insert(key.clone(), row_data).is_some() {
                log::warn!(
                    "Duplicate row key '{}' in {} (context '{}'), keeping the last row",
                    key,
                    relation,
                    self.name
                );
            }
        }

        Ok(data)
    }
}

impl ContextDataSource for DuckDbContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace_data(&self, namespace: &str, cancel: &CancelToken) -> Result<Option<NamespaceData>> {
        cancel.check()?;
        let (conn, relation) = match self.relation(namespace)? {
            Some(found) => found,
            None => return Ok(None),
        };
        log::debug!("Reading namespace '{}' from context '{}'", namespace, self.name);
        self.read_rows(&conn, &relation, cancel).map(Some)
    }
}

fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("SET enable_progress_bar=false", [])?;
    Ok(conn)
}

fn open_database(path: &Path) -> Result<Connection> {
    let config = Config::default().access_mode(AccessMode::ReadOnly)?;
    Ok(Connection::open_with_flags(path, config)?)
}

fn column_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("DESCRIBE namespace_view")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

/// Text of a VARCHAR-projected cell; NULL becomes the empty string
fn value_to_string(value: ValueRef<'_>, column: &str) -> Result<String> {
    match value {
        ValueRef::Null => Ok(String::new()),
        ValueRef::Text(s) => Ok(String::from_utf8_lossy(s).into_owned()),
        other => Err(ReconError::data_source(format!(
            "Column '{}' was not rendered as text (got {:?})",
            column, other
        ))),
    }
}

fn convert_duckdb_error(error: duckdb::Error, relation: &str) -> ReconError {
    let error_msg = error.to_string();

    if error_msg.contains("CSV Error")
        || error_msg.contains("Invalid CSV")
        || error_msg.contains("Unterminated quoted field")
    {
        ReconError::data_source(format!("Malformed CSV {}: {}", relation, error_msg))
    } else if error_msg.contains("Malformed JSON") {
        ReconError::data_source(format!("Malformed JSON {}: {}", relation, error_msg))
    } else if error_msg.contains("Permission denied") {
        ReconError::data_source(format!("Permission denied reading {}", relation))
    } else {
        ReconError::DuckDb(error)
    }
}

/// Locate `<namespace>.<ext>` inside `dir`
pub fn find_namespace_file(dir: &Path, namespace: &str) -> Option<PathBuf> {
    if namespace.is_empty() || namespace.contains('/') || namespace.contains('\\') || namespace == ".." {
        return None;
    }
    NAMESPACE_FILE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", namespace, ext)))
        .find(|path| path.is_file())
}

/// Namespaces backed by a data file directly inside `dir`
pub fn list_namespace_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| NAMESPACE_FILE_EXTENSIONS.contains(&e))
            .unwrap_or(false);
        if let (true, Some(stem)) = (supported, path.file_stem().and_then(|s| s.to_str())) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn quote_identifier(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
