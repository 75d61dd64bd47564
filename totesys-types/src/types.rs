use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::errors::TypeError;

/// A single cell value. Numeric CSV columns are inferred the same way a
/// dataframe library would: integral text becomes `Int`, anything with a
/// fractional part becomes `Float`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Field {
    Int(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Null,
}

/// The inferred type of a whole column, used when a `TableData` has to be
/// lowered into a typed container (parquet arrays, SQL parameters).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Boolean,
    String,
    Date,
    Time,
    Timestamp,
}

impl Field {
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Field::Int(_) => Some(FieldKind::Int),
            Field::Float(_) => Some(FieldKind::Float),
            Field::Boolean(_) => Some(FieldKind::Boolean),
            Field::String(_) => Some(FieldKind::String),
            Field::Date(_) => Some(FieldKind::Date),
            Field::Time(_) => Some(FieldKind::Time),
            Field::Timestamp(_) => Some(FieldKind::Timestamp),
            Field::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Parses a CSV cell back into a value. Empty cells are nulls; numbers
    /// and booleans are recognised, everything else stays a string.
    pub fn from_csv_value(value: &str) -> Field {
        if value.is_empty() {
            return Field::Null;
        }
        if let Ok(i) = value.parse::<i64>() {
            return Field::Int(i);
        }
        if let Ok(f) = value.parse::<f64>() {
            return Field::Float(f);
        }
        match value {
            "true" | "True" => Field::Boolean(true),
            "false" | "False" => Field::Boolean(false),
            _ => Field::String(value.to_string()),
        }
    }

    /// The CSV rendering of this value. `from_csv_value` round-trips it,
    /// except that dates and times come back as strings until a derivation
    /// parses them.
    pub fn to_csv_value(&self) -> String {
        match self {
            Field::Int(i) => i.to_string(),
            Field::Float(f) => f.to_string(),
            Field::Boolean(b) => b.to_string(),
            Field::String(s) => s.clone(),
            Field::Date(d) => d.format("%Y-%m-%d").to_string(),
            Field::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Field::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Field::Null => String::new(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_csv_value())
    }
}

impl FieldKind {
    /// Widens two column types observed in the same column. Ints seen next
    /// to floats make the column a float column; otherwise disagreement
    /// falls back to strings.
    pub fn unify(self, other: FieldKind) -> FieldKind {
        if self == other {
            self
        } else if matches!(
            (self, other),
            (FieldKind::Int, FieldKind::Float) | (FieldKind::Float, FieldKind::Int)
        ) {
            FieldKind::Float
        } else {
            FieldKind::String
        }
    }
}

/// An in-memory relation: a header of column names and rows of values.
/// All operations return a new value; inputs are never mutated, so the same
/// source table can feed several derivations.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TableData {
    columns: Vec<String>,
    rows: Vec<Vec<Field>>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Field>>) -> Result<Self, TypeError> {
        for row in &rows {
            if row.len() != columns.len() {
                return Err(TypeError::RowWidthMismatch {
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: vec![],
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Field>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TypeError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TypeError::MissingColumn(name.to_string()))
    }

    pub fn value(&self, row: usize, column: &str) -> Result<&Field, TypeError> {
        let idx = self.column_index(column)?;
        Ok(&self.rows[row][idx])
    }

    /// Projects the named columns, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<TableData, TypeError> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(TableData {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }

    pub fn rename_column(&self, from: &str, to: &str) -> Result<TableData, TypeError> {
        let idx = self.column_index(from)?;
        let mut out = self.clone();
        out.columns[idx] = to.to_string();
        Ok(out)
    }

    pub fn drop_columns(&self, names: &[&str]) -> Result<TableData, TypeError> {
        let drop = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<HashSet<_>, _>>()?;
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|i| !drop.contains(i))
            .collect();
        let columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(TableData { columns, rows })
    }

    /// Prepends `prefix` to every column name.
    pub fn prefix_columns(&self, prefix: &str) -> TableData {
        let mut out = self.clone();
        for c in &mut out.columns {
            *c = format!("{prefix}{c}");
        }
        out
    }

    /// Appends a column. The number of values must match the row count.
    pub fn with_column(&self, name: &str, values: Vec<Field>) -> Result<TableData, TypeError> {
        if values.len() != self.rows.len() {
            return Err(TypeError::RowWidthMismatch {
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        let mut out = self.clone();
        out.columns.push(name.to_string());
        for (row, value) in out.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(out)
    }

    /// Vertically stacks another table with the same header onto this one.
    pub fn concat(&self, other: &TableData) -> Result<TableData, TypeError> {
        if self.columns != other.columns {
            return Err(TypeError::ColumnMismatch {
                left: self.columns.clone(),
                right: other.columns.clone(),
            });
        }
        let mut out = self.clone();
        out.rows.extend(other.rows.iter().cloned());
        Ok(out)
    }

    fn join(
        &self,
        other: &TableData,
        left_on: &str,
        right_on: &str,
        keep_unmatched_left: bool,
    ) -> Result<TableData, TypeError> {
        let left_idx = self.column_index(left_on)?;
        let right_idx = other.column_index(right_on)?;
        // Same-name keys collapse into one column, as a dataframe merge
        // with `on=` would; differently named keys are both kept.
        let same_key = left_on == right_on;
        let right_keep: Vec<usize> = (0..other.columns.len())
            .filter(|&i| !(same_key && i == right_idx))
            .collect();

        let mut columns = self.columns.clone();
        columns.extend(right_keep.iter().map(|&i| other.columns[i].clone()));

        let mut rows = Vec::new();
        for left_row in &self.rows {
            let key = &left_row[left_idx];
            let mut matched = false;
            if !key.is_null() {
                for right_row in &other.rows {
                    if &right_row[right_idx] == key {
                        matched = true;
                        let mut row = left_row.clone();
                        row.extend(right_keep.iter().map(|&i| right_row[i].clone()));
                        rows.push(row);
                    }
                }
            }
            if !matched && keep_unmatched_left {
                let mut row = left_row.clone();
                row.extend(right_keep.iter().map(|_| Field::Null));
                rows.push(row);
            }
        }
        Ok(TableData { columns, rows })
    }

    /// Left join: every left row survives, unmatched right columns are null.
    pub fn left_join(
        &self,
        other: &TableData,
        left_on: &str,
        right_on: &str,
    ) -> Result<TableData, TypeError> {
        self.join(other, left_on, right_on, true)
    }

    /// Inner join: only matching pairs survive.
    pub fn inner_join(
        &self,
        other: &TableData,
        left_on: &str,
        right_on: &str,
    ) -> Result<TableData, TypeError> {
        self.join(other, left_on, right_on, false)
    }

    /// Removes duplicate rows, keeping the first occurrence. Row order is
    /// otherwise preserved so repeated derivations stay deterministic.
    pub fn drop_duplicates(&self) -> TableData {
        let mut seen = HashSet::new();
        let rows = self
            .rows
            .iter()
            .filter(|row| seen.insert(format!("{row:?}")))
            .cloned()
            .collect();
        TableData {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Removes every row containing at least one null.
    pub fn drop_nulls(&self) -> TableData {
        let rows = self
            .rows
            .iter()
            .filter(|row| !row.iter().any(Field::is_null))
            .cloned()
            .collect();
        TableData {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Infers one `FieldKind` per column from the non-null values. Columns
    /// with no non-null values default to strings.
    pub fn column_kinds(&self) -> Vec<FieldKind> {
        (0..self.columns.len())
            .map(|i| {
                self.rows
                    .iter()
                    .filter_map(|row| row[i].kind())
                    .reduce(FieldKind::unify)
                    .unwrap_or(FieldKind::String)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff() -> TableData {
        TableData::new(
            vec!["staff_id".into(), "name".into(), "department_id".into()],
            vec![
                vec![
                    Field::Int(1),
                    Field::String("Jeremie".into()),
                    Field::Int(2),
                ],
                vec![Field::Int(2), Field::String("Deron".into()), Field::Int(6)],
                vec![Field::Int(3), Field::String("Jeanette".into()), Field::Null],
            ],
        )
        .unwrap()
    }

    fn departments() -> TableData {
        TableData::new(
            vec!["department_id".into(), "department_name".into()],
            vec![
                vec![Field::Int(2), Field::String("Purchasing".into())],
                vec![Field::Int(6), Field::String("Facilities".into())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = TableData::new(
            vec!["a".into(), "b".into()],
            vec![vec![Field::Int(1)]],
        )
        .unwrap_err();
        assert!(matches!(err, TypeError::RowWidthMismatch { .. }));
    }

    #[test]
    fn select_projects_in_given_order() {
        let out = staff().select(&["name", "staff_id"]).unwrap();
        assert_eq!(out.columns(), &["name".to_string(), "staff_id".to_string()]);
        assert_eq!(out.rows()[0][1], Field::Int(1));
    }

    #[test]
    fn select_unknown_column_fails() {
        assert!(matches!(
            staff().select(&["nope"]),
            Err(TypeError::MissingColumn(_))
        ));
    }

    #[test]
    fn rename_keeps_position() {
        let out = staff().rename_column("staff_id", "id").unwrap();
        assert_eq!(out.columns()[0], "id");
    }

    #[test]
    fn left_join_on_same_key_collapses_key_column() {
        let out = staff()
            .left_join(&departments(), "department_id", "department_id")
            .unwrap();
        assert_eq!(
            out.columns(),
            &[
                "staff_id".to_string(),
                "name".to_string(),
                "department_id".to_string(),
                "department_name".to_string(),
            ]
        );
        assert_eq!(out.num_rows(), 3);
        assert_eq!(out.rows()[0][3], Field::String("Purchasing".into()));
        // Null keys never match; the row survives with null right columns.
        assert_eq!(out.rows()[2][3], Field::Null);
    }

    #[test]
    fn inner_join_drops_unmatched() {
        let out = staff()
            .inner_join(&departments(), "department_id", "department_id")
            .unwrap();
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn join_with_distinct_key_names_keeps_both() {
        let other = departments()
            .rename_column("department_id", "dept_id")
            .unwrap();
        let out = staff()
            .inner_join(&other, "department_id", "dept_id")
            .unwrap();
        assert!(out.column_index("department_id").is_ok());
        assert!(out.column_index("dept_id").is_ok());
    }

    #[test]
    fn drop_duplicates_keeps_first() {
        let t = TableData::new(
            vec!["a".into()],
            vec![
                vec![Field::Int(1)],
                vec![Field::Int(2)],
                vec![Field::Int(1)],
            ],
        )
        .unwrap();
        let out = t.drop_duplicates();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.rows()[0][0], Field::Int(1));
        assert_eq!(out.rows()[1][0], Field::Int(2));
    }

    #[test]
    fn drop_nulls_removes_whole_rows() {
        assert_eq!(staff().drop_nulls().num_rows(), 2);
    }

    #[test]
    fn concat_requires_identical_header() {
        let a = staff();
        assert!(a.concat(&departments()).is_err());
        let out = a.concat(&staff()).unwrap();
        assert_eq!(out.num_rows(), 6);
    }

    #[test]
    fn column_kinds_widen_int_to_float() {
        let t = TableData::new(
            vec!["x".into(), "y".into()],
            vec![
                vec![Field::Int(1), Field::Null],
                vec![Field::Float(2.5), Field::Null],
            ],
        )
        .unwrap();
        assert_eq!(t.column_kinds(), vec![FieldKind::Float, FieldKind::String]);
    }

    #[test]
    fn csv_value_round_trip() {
        assert_eq!(Field::from_csv_value(""), Field::Null);
        assert_eq!(Field::from_csv_value("42"), Field::Int(42));
        assert_eq!(Field::from_csv_value("2.75"), Field::Float(2.75));
        assert_eq!(Field::from_csv_value("True"), Field::Boolean(true));
        assert_eq!(
            Field::from_csv_value("2022-11-03 14:20:52.186"),
            Field::String("2022-11-03 14:20:52.186".into())
        );
        assert_eq!(Field::Int(42).to_csv_value(), "42");
        assert_eq!(Field::Null.to_csv_value(), "");
    }
}
