use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypeError {
    #[error("column not found: {0}")]
    MissingColumn(String),
    #[error("source table not found: {0}")]
    MissingTable(String),
    #[error("row has {actual} values, expected {expected}")]
    RowWidthMismatch { expected: usize, actual: usize },
    #[error("cannot concatenate tables with different headers: {left:?} vs {right:?}")]
    ColumnMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },
    #[error("invalid value in column {column}: {value}")]
    InvalidValue { column: String, value: String },
}
