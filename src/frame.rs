// ABOUTME: In-memory tabular payload exchanged with the bulk transfer operations
// ABOUTME: Typed column definitions plus dynamically typed rows, JSON-serializable

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Row has {got} values but the frame has {expected} columns")]
    ArityMismatch { expected: usize, got: usize },
}

/// A single cell value. Variant order matters for untagged deserialization:
/// timestamps are tried before plain text so ISO datetime strings keep their type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
    Bytes(Vec<u8>),
}

/// Column types supported by the transfer layer, with a two-way mapping
/// to MySQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
}

impl ColumnType {
    /// Declared type used when creating a table from a frame.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Int => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::Text => "TEXT",
            ColumnType::Bytes => "BLOB",
            ColumnType::Timestamp => "DATETIME",
        }
    }

    /// Map a MySQL column type (as reported by SHOW COLUMNS, e.g. `bigint(20)`
    /// or `varchar(255)`) back to a frame column type. Unrecognized types
    /// fall back to Text, matching how their values are read.
    pub fn from_mysql(type_name: &str) -> ColumnType {
        let base = type_name
            .split('(')
            .next()
            .unwrap_or(type_name)
            .trim()
            .to_ascii_lowercase();

        // MySQL reports BOOLEAN columns as tinyint(1)
        if type_name.to_ascii_lowercase().starts_with("tinyint(1)") {
            return ColumnType::Bool;
        }

        match base.as_str() {
            "bool" | "boolean" => ColumnType::Bool,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => ColumnType::Int,
            "float" | "double" | "decimal" | "numeric" => ColumnType::Float,
            "datetime" | "timestamp" => ColumnType::Timestamp,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                ColumnType::Bytes
            }
            _ => ColumnType::Text,
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An in-memory table: ordered typed columns and rows of values.
///
/// The frame is the payload of the bulk transfer operations; it does not
/// know anything about connections or SQL statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
}

impl DataFrame {
    /// Create an empty frame with the given column definitions.
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. The row must have exactly one value per column.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), FrameError> {
        if row.len() != self.columns.len() {
            return Err(FrameError::ArityMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_frame() -> DataFrame {
        let mut frame = DataFrame::new(vec![
            ColumnDef::new("id", ColumnType::Int),
            ColumnDef::new("name", ColumnType::Text),
            ColumnDef::new("score", ColumnType::Float),
        ]);
        frame
            .push_row(vec![
                Value::Int(1),
                Value::Text("alpha".to_string()),
                Value::Float(9.5),
            ])
            .unwrap();
        frame
            .push_row(vec![Value::Int(2), Value::Null, Value::Float(3.25)])
            .unwrap();
        frame
    }

    #[test]
    fn test_push_row_arity() {
        let mut frame = DataFrame::new(vec![ColumnDef::new("id", ColumnType::Int)]);
        assert!(frame.push_row(vec![Value::Int(1)]).is_ok());

        let err = frame.push_row(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(
            err,
            Err(FrameError::ArityMismatch {
                expected: 1,
                got: 2
            })
        ));
        assert_eq!(frame.row_count(), 1);
    }

    #[test]
    fn test_column_names() {
        let frame = sample_frame();
        assert_eq!(frame.column_names(), vec!["id", "name", "score"]);
        assert_eq!(frame.column_count(), 3);
        assert_eq!(frame.row_count(), 2);
    }

    #[test]
    fn test_json_round_trip() {
        let frame = sample_frame();
        let json = serde_json::to_string_pretty(&frame).unwrap();
        let parsed: DataFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_json_round_trip_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, 53)
            .unwrap();
        let mut frame = DataFrame::new(vec![ColumnDef::new("at", ColumnType::Timestamp)]);
        frame.push_row(vec![Value::Timestamp(ts)]).unwrap();

        let json = serde_json::to_string(&frame).unwrap();
        let parsed: DataFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rows[0][0], Value::Timestamp(ts));
    }

    #[test]
    fn test_sql_type_mapping() {
        assert_eq!(ColumnType::Int.sql_type(), "BIGINT");
        assert_eq!(ColumnType::Text.sql_type(), "TEXT");
        assert_eq!(ColumnType::Timestamp.sql_type(), "DATETIME");
    }

    #[test]
    fn test_from_mysql_type() {
        assert_eq!(ColumnType::from_mysql("bigint(20)"), ColumnType::Int);
        assert_eq!(ColumnType::from_mysql("tinyint(1)"), ColumnType::Bool);
        assert_eq!(ColumnType::from_mysql("tinyint(4)"), ColumnType::Int);
        assert_eq!(ColumnType::from_mysql("varchar(255)"), ColumnType::Text);
        assert_eq!(ColumnType::from_mysql("DOUBLE"), ColumnType::Float);
        assert_eq!(ColumnType::from_mysql("datetime"), ColumnType::Timestamp);
        assert_eq!(ColumnType::from_mysql("longblob"), ColumnType::Bytes);
        assert_eq!(ColumnType::from_mysql("enum('a','b')"), ColumnType::Text);
    }

    #[test]
    fn test_untagged_value_deserialization() {
        let frame: DataFrame = serde_json::from_str(
            r#"{
                "columns": [
                    {"name": "flag", "type": "bool"},
                    {"name": "n", "type": "int"},
                    {"name": "label", "type": "text"}
                ],
                "rows": [[true, 42, "plain text"], [null, 7, "2024-03-14T09:26:53"]]
            }"#,
        )
        .unwrap();

        assert_eq!(frame.rows[0][0], Value::Bool(true));
        assert_eq!(frame.rows[0][1], Value::Int(42));
        assert_eq!(frame.rows[0][2], Value::Text("plain text".to_string()));
        assert_eq!(frame.rows[1][0], Value::Null);
        // ISO datetime strings deserialize as timestamps, not text
        assert!(matches!(frame.rows[1][2], Value::Timestamp(_)));
    }
}
