// ABOUTME: MySQL connection management using sqlx
// ABOUTME: One method per administrative statement, plus frame read/write transfer

use log::{info, warn};
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Connection, Row};
use thiserror::Error;

use crate::frame::{ColumnDef, ColumnType, DataFrame, Value};

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Catalog query failed: {0}")]
    CatalogQuery(String),
    #[error("DDL statement failed: {0}")]
    Ddl(String),
    #[error("Bulk transfer failed: {0}")]
    BulkTransfer(String),
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),
}

/// Behavior when exporting a frame to a table that may already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Signal an error if the table is already present
    Fail,
    /// Drop and recreate the table from the frame's columns
    Replace,
    /// Insert rows without altering existing schema
    Append,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(ConflictPolicy::Fail),
            "replace" => Ok(ConflictPolicy::Replace),
            "append" => Ok(ConflictPolicy::Append),
            other => Err(format!("unknown conflict policy '{other}'")),
        }
    }
}

/// Validate and backtick-quote an identifier. MySQL identifiers are limited to
/// 64 characters; the accepted character set keeps quoting trivially safe.
pub fn quote_identifier(name: &str) -> Result<String, AdminError> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if !valid {
        return Err(AdminError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("`{name}`"))
}

/// Escape a string for inlining into a single-quoted literal. SHOW statements
/// do not accept placeholders, so LIKE patterns travel as escaped literals.
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "''")
}

fn render_create_table(table: &str, columns: &[ColumnDef]) -> Result<String, AdminError> {
    let mut specs = Vec::with_capacity(columns.len());
    for column in columns {
        specs.push(format!(
            "{} {}",
            quote_identifier(&column.name)?,
            column.ty.sql_type()
        ));
    }
    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table)?,
        specs.join(", ")
    ))
}

fn render_insert(table: &str, columns: &[ColumnDef]) -> Result<String, AdminError> {
    let mut names = Vec::with_capacity(columns.len());
    for column in columns {
        names.push(quote_identifier(&column.name)?);
    }
    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table)?,
        names.join(", "),
        placeholders
    ))
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Timestamp(ts) => query.bind(*ts),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Bytes(b) => query.bind(b.as_slice()),
    }
}

/// Read a text cell that the server may report as either a string or a
/// binary column, as SHOW output does depending on collation.
fn get_text(row: &MySqlRow, idx: usize) -> Option<String> {
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
        return Some(s);
    }
    row.try_get::<Option<Vec<u8>>, _>(idx)
        .ok()
        .flatten()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

fn read_value(row: &MySqlRow, idx: usize, ty: ColumnType) -> Value {
    match ty {
        ColumnType::Bool => match row.try_get::<Option<bool>, _>(idx) {
            Ok(Some(b)) => Value::Bool(b),
            Ok(None) => Value::Null,
            Err(_) => text_fallback(row, idx),
        },
        ColumnType::Int => match row.try_get::<Option<i64>, _>(idx) {
            Ok(Some(i)) => Value::Int(i),
            Ok(None) => Value::Null,
            Err(_) => text_fallback(row, idx),
        },
        ColumnType::Float => match row.try_get::<Option<f64>, _>(idx) {
            Ok(Some(f)) => Value::Float(f),
            Ok(None) => Value::Null,
            // DECIMAL values arrive as text on the wire
            Err(_) => match get_text(row, idx) {
                Some(s) => s.parse().map(Value::Float).unwrap_or(Value::Text(s)),
                None => Value::Null,
            },
        },
        ColumnType::Timestamp => match row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            Ok(Some(ts)) => Value::Timestamp(ts),
            Ok(None) => Value::Null,
            Err(_) => text_fallback(row, idx),
        },
        ColumnType::Bytes => match row.try_get::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(b)) => Value::Bytes(b),
            Ok(None) => Value::Null,
            Err(_) => text_fallback(row, idx),
        },
        ColumnType::Text => text_fallback(row, idx),
    }
}

fn text_fallback(row: &MySqlRow, idx: usize) -> Value {
    match get_text(row, idx) {
        Some(s) => Value::Text(s),
        None => Value::Null,
    }
}

/// A single open connection to a MySQL server, optionally scoped to a
/// database by the connection target it was opened with.
pub struct AdminConnection {
    inner: MySqlConnection,
}

impl AdminConnection {
    /// Open a connection to the given target string.
    pub async fn connect(target: &str) -> Result<Self, AdminError> {
        let inner = MySqlConnection::connect(target)
            .await
            .map_err(|e| AdminError::ConnectionFailed(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Gracefully shut the connection down. Consumes the handle, so a closed
    /// connection cannot be reused.
    pub async fn close(self) {
        if let Err(e) = self.inner.close().await {
            warn!("Error while closing connection: {}", e);
        } else {
            info!("Connection closed");
        }
    }

    /// Query the server version string.
    pub async fn server_version(&mut self) -> Result<String, AdminError> {
        let row = sqlx::raw_sql("SELECT VERSION()")
            .fetch_one(&mut self.inner)
            .await
            .map_err(|e| AdminError::CatalogQuery(e.to_string()))?;
        get_text(&row, 0).ok_or_else(|| AdminError::CatalogQuery("No version returned".to_string()))
    }

    /// Check whether a database with the given name exists on the server.
    pub async fn database_exists(&mut self, database: &str) -> Result<bool, AdminError> {
        let sql = format!("SHOW DATABASES LIKE '{}'", escape_literal(database));
        let rows = sqlx::raw_sql(&sql)
            .fetch_all(&mut self.inner)
            .await
            .map_err(|e| AdminError::CatalogQuery(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    /// List every database visible to the credentials.
    pub async fn list_databases(&mut self) -> Result<Vec<String>, AdminError> {
        let rows = sqlx::raw_sql("SHOW DATABASES")
            .fetch_all(&mut self.inner)
            .await
            .map_err(|e| AdminError::CatalogQuery(e.to_string()))?;
        Ok(rows.iter().filter_map(|row| get_text(row, 0)).collect())
    }

    /// Check whether a table exists in the connection's database scope.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool, AdminError> {
        let sql = format!("SHOW TABLES LIKE '{}'", escape_literal(table));
        let rows = sqlx::raw_sql(&sql)
            .fetch_all(&mut self.inner)
            .await
            .map_err(|e| AdminError::CatalogQuery(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    /// List the tables in the connection's database scope.
    pub async fn list_tables(&mut self) -> Result<Vec<String>, AdminError> {
        let rows = sqlx::raw_sql("SHOW TABLES")
            .fetch_all(&mut self.inner)
            .await
            .map_err(|e| AdminError::CatalogQuery(e.to_string()))?;
        Ok(rows.iter().filter_map(|row| get_text(row, 0)).collect())
    }

    pub async fn create_database(&mut self, database: &str) -> Result<(), AdminError> {
        let sql = format!("CREATE DATABASE {}", quote_identifier(database)?);
        sqlx::raw_sql(&sql)
            .execute(&mut self.inner)
            .await
            .map_err(|e| AdminError::Ddl(e.to_string()))?;
        Ok(())
    }

    pub async fn drop_database(&mut self, database: &str) -> Result<(), AdminError> {
        let sql = format!("DROP DATABASE {}", quote_identifier(database)?);
        sqlx::raw_sql(&sql)
            .execute(&mut self.inner)
            .await
            .map_err(|e| AdminError::Ddl(e.to_string()))?;
        Ok(())
    }

    pub async fn drop_table(&mut self, table: &str) -> Result<(), AdminError> {
        let sql = format!("DROP TABLE {}", quote_identifier(table)?);
        sqlx::raw_sql(&sql)
            .execute(&mut self.inner)
            .await
            .map_err(|e| AdminError::Ddl(e.to_string()))?;
        Ok(())
    }

    /// Drop every table in the connection's database scope. The first failed
    /// drop aborts the remaining ones.
    pub async fn drop_all_tables(&mut self) -> Result<usize, AdminError> {
        let tables = self.list_tables().await?;
        for table in &tables {
            self.drop_table(table).await?;
        }
        Ok(tables.len())
    }

    /// Write a frame into a table. Returns the number of rows inserted.
    pub async fn write_frame(
        &mut self,
        table: &str,
        frame: &DataFrame,
        policy: ConflictPolicy,
    ) -> Result<u64, AdminError> {
        if frame.column_count() == 0 {
            return Err(AdminError::BulkTransfer(
                "frame has no columns".to_string(),
            ));
        }

        match policy {
            ConflictPolicy::Fail => {
                if self.table_exists(table).await? {
                    return Err(AdminError::BulkTransfer(format!(
                        "table '{}' already exists",
                        table
                    )));
                }
                self.create_table(table, &frame.columns).await?;
            }
            ConflictPolicy::Replace => {
                let sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(table)?);
                sqlx::raw_sql(&sql)
                    .execute(&mut self.inner)
                    .await
                    .map_err(|e| AdminError::BulkTransfer(e.to_string()))?;
                self.create_table(table, &frame.columns).await?;
            }
            ConflictPolicy::Append => {
                if !self.table_exists(table).await? {
                    self.create_table(table, &frame.columns).await?;
                }
            }
        }

        let insert = render_insert(table, &frame.columns)?;
        let mut written = 0u64;
        for row in &frame.rows {
            let mut query = sqlx::query(&insert);
            for value in row {
                query = bind_value(query, value);
            }
            let result = query
                .execute(&mut self.inner)
                .await
                .map_err(|e| AdminError::BulkTransfer(e.to_string()))?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    async fn create_table(&mut self, table: &str, columns: &[ColumnDef]) -> Result<(), AdminError> {
        let sql = render_create_table(table, columns)?;
        sqlx::raw_sql(&sql)
            .execute(&mut self.inner)
            .await
            .map_err(|e| AdminError::BulkTransfer(e.to_string()))?;
        Ok(())
    }

    /// Read the full contents of a table into a frame. Column definitions come
    /// from the catalog, so a zero-row table still round-trips its columns.
    pub async fn read_frame(&mut self, table: &str) -> Result<DataFrame, AdminError> {
        let columns_sql = format!("SHOW COLUMNS FROM {}", quote_identifier(table)?);
        let column_rows = sqlx::raw_sql(&columns_sql)
            .fetch_all(&mut self.inner)
            .await
            .map_err(|e| AdminError::CatalogQuery(e.to_string()))?;

        let mut columns = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            let name = get_text(row, 0)
                .ok_or_else(|| AdminError::CatalogQuery("unnamed column in catalog".to_string()))?;
            let type_name = get_text(row, 1).unwrap_or_default();
            columns.push(ColumnDef::new(name, ColumnType::from_mysql(&type_name)));
        }

        let select_sql = format!("SELECT * FROM {}", quote_identifier(table)?);
        let data_rows = sqlx::raw_sql(&select_sql)
            .fetch_all(&mut self.inner)
            .await
            .map_err(|e| AdminError::BulkTransfer(e.to_string()))?;

        let mut frame = DataFrame::new(columns);
        for row in &data_rows {
            let values = frame
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| read_value(row, idx, column.ty))
                .collect();
            frame
                .push_row(values)
                .map_err(|e| AdminError::BulkTransfer(e.to_string()))?;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users").unwrap(), "`users`");
        assert_eq!(quote_identifier("tbl_2024$x").unwrap(), "`tbl_2024$x`");

        assert!(quote_identifier("").is_err());
        assert!(quote_identifier("users; DROP TABLE x").is_err());
        assert!(quote_identifier("na`me").is_err());
        assert!(quote_identifier(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("plain"), "plain");
        assert_eq!(escape_literal("o'brien"), "o''brien");
        assert_eq!(escape_literal(r"back\slash"), r"back\\slash");
    }

    #[test]
    fn test_render_create_table() {
        let columns = vec![
            ColumnDef::new("id", ColumnType::Int),
            ColumnDef::new("name", ColumnType::Text),
            ColumnDef::new("seen_at", ColumnType::Timestamp),
        ];
        let sql = render_create_table("events", &columns).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `events` (`id` BIGINT, `name` TEXT, `seen_at` DATETIME)"
        );
    }

    #[test]
    fn test_render_create_table_rejects_bad_column() {
        let columns = vec![ColumnDef::new("na me", ColumnType::Int)];
        assert!(matches!(
            render_create_table("events", &columns),
            Err(AdminError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_render_insert() {
        let columns = vec![
            ColumnDef::new("id", ColumnType::Int),
            ColumnDef::new("name", ColumnType::Text),
        ];
        let sql = render_insert("events", &columns).unwrap();
        assert_eq!(sql, "INSERT INTO `events` (`id`, `name`) VALUES (?, ?)");
    }

    #[test]
    fn test_conflict_policy_parsing() {
        assert_eq!("fail".parse::<ConflictPolicy>(), Ok(ConflictPolicy::Fail));
        assert_eq!(
            "REPLACE".parse::<ConflictPolicy>(),
            Ok(ConflictPolicy::Replace)
        );
        assert_eq!(
            "append".parse::<ConflictPolicy>(),
            Ok(ConflictPolicy::Append)
        );
        assert!("upsert".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn test_error_messages_name_the_category() {
        assert_eq!(
            AdminError::ConnectionFailed("refused".to_string()).to_string(),
            "Connection failed: refused"
        );
        assert_eq!(
            AdminError::InvalidIdentifier("a b".to_string()).to_string(),
            "Invalid identifier: 'a b'"
        );
    }
}
