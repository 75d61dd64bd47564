//! Star-schema derivations. Each function is a pure mapping from the
//! accumulated source tables to one fact or dimension table; inputs are
//! never mutated, so the same `SourceTables` can feed every derivation.

use totesys_types::chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use totesys_types::tables::{SourceTable, SourceTables};
use totesys_types::types::{Field, TableData};

use crate::currency::CurrencyNames;
use crate::{invalid, TransformError};

/// Interprets a cell as a timestamp. Snapshots carry timestamps as text,
/// so both the parsed and textual forms are accepted; nulls pass through.
fn parse_timestamp(field: &Field, column: &str) -> Result<Option<NaiveDateTime>, TransformError> {
    match field {
        Field::Null => Ok(None),
        Field::Timestamp(ts) => Ok(Some(*ts)),
        Field::String(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .map(Some)
            .map_err(|_| invalid(column, field)),
        other => Err(invalid(column, other)),
    }
}

fn parse_date(field: &Field, column: &str) -> Result<Option<NaiveDate>, TransformError> {
    match field {
        Field::Null => Ok(None),
        Field::Date(d) => Ok(Some(*d)),
        Field::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid(column, field)),
        other => Err(invalid(column, other)),
    }
}

fn map_column(
    table: &TableData,
    column: &str,
    f: impl Fn(&Field) -> Result<Field, TransformError>,
) -> Result<TableData, TransformError> {
    let idx = table.column_index(column)?;
    let mut rows = Vec::with_capacity(table.num_rows());
    for row in table.rows() {
        let mut row = row.clone();
        row[idx] = f(&row[idx])?;
        rows.push(row);
    }
    Ok(TableData::new(table.columns().to_vec(), rows)?)
}

/// Splits a timestamp column into a calendar-date column and a time-of-day
/// column floored to the second, appended under the given names.
fn split_timestamp(
    table: &TableData,
    source: &str,
    date_name: &str,
    time_name: &str,
) -> Result<TableData, TransformError> {
    let idx = table.column_index(source)?;
    let mut dates = Vec::with_capacity(table.num_rows());
    let mut times = Vec::with_capacity(table.num_rows());
    for row in table.rows() {
        match parse_timestamp(&row[idx], source)? {
            Some(ts) => {
                dates.push(Field::Date(ts.date()));
                let time = ts.time();
                times.push(Field::Time(time.with_nanosecond(0).unwrap_or(time)));
            }
            None => {
                dates.push(Field::Null);
                times.push(Field::Null);
            }
        }
    }
    Ok(table.with_column(date_name, dates)?.with_column(time_name, times)?)
}

fn parse_date_column(table: &TableData, column: &str) -> Result<TableData, TransformError> {
    map_column(table, column, |field| {
        Ok(parse_date(field, column)?.map_or(Field::Null, Field::Date))
    })
}

/// Drops rows with any null, then prepends a fresh 1-based record id. The
/// drop happens first so the ids come out gap-free.
fn with_record_ids(table: &TableData, id_name: &str) -> Result<TableData, TransformError> {
    let complete = table.drop_nulls();
    let mut columns = vec![id_name.to_string()];
    columns.extend(complete.columns().iter().cloned());
    let rows = complete
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut out = Vec::with_capacity(row.len() + 1);
            out.push(Field::Int(i as i64 + 1));
            out.extend(row.iter().cloned());
            out
        })
        .collect();
    Ok(TableData::new(columns, rows)?)
}

fn coerce_int(table: &TableData, column: &str) -> Result<TableData, TransformError> {
    map_column(table, column, |field| match field {
        Field::Int(i) => Ok(Field::Int(*i)),
        Field::Float(f) => Ok(Field::Int(*f as i64)),
        Field::String(s) => s
            .parse::<i64>()
            .map(Field::Int)
            .map_err(|_| invalid(column, field)),
        other => Err(invalid(column, other)),
    })
}

pub fn create_fact_sales_order(tables: &SourceTables) -> Result<TableData, TransformError> {
    let sales = tables
        .get(SourceTable::SalesOrder)?
        .rename_column("staff_id", "sales_staff_id")?;
    let sales = split_timestamp(&sales, "created_at", "created_date", "created_time")?;
    let sales = split_timestamp(&sales, "last_updated", "last_updated_date", "last_updated_time")?;
    let sales = parse_date_column(&sales, "agreed_delivery_date")?;
    let sales = parse_date_column(&sales, "agreed_payment_date")?;
    let fact = sales.select(&[
        "sales_order_id",
        "created_date",
        "created_time",
        "last_updated_date",
        "last_updated_time",
        "sales_staff_id",
        "counterparty_id",
        "units_sold",
        "unit_price",
        "currency_id",
        "design_id",
        "agreed_payment_date",
        "agreed_delivery_date",
        "agreed_delivery_location_id",
    ])?;
    with_record_ids(&fact, "sales_record_id")
}

pub fn create_fact_purchase_order(tables: &SourceTables) -> Result<TableData, TransformError> {
    let po = tables.get(SourceTable::PurchaseOrder)?;
    let po = split_timestamp(po, "created_at", "created_date", "created_time")?;
    let po = split_timestamp(&po, "last_updated", "last_updated_date", "last_updated_time")?;
    let po = parse_date_column(&po, "agreed_delivery_date")?;
    let po = parse_date_column(&po, "agreed_payment_date")?;
    let fact = po.select(&[
        "purchase_order_id",
        "created_date",
        "created_time",
        "last_updated_date",
        "last_updated_time",
        "staff_id",
        "counterparty_id",
        "item_code",
        "item_quantity",
        "item_unit_price",
        "currency_id",
        "agreed_delivery_date",
        "agreed_payment_date",
        "agreed_delivery_location_id",
    ])?;
    with_record_ids(&fact, "purchase_record_id")
}

pub fn create_fact_payment(tables: &SourceTables) -> Result<TableData, TransformError> {
    let payment = tables.get(SourceTable::Payment)?;
    let payment = split_timestamp(payment, "created_at", "created_date", "created_time")?;
    let payment = split_timestamp(
        &payment,
        "last_updated",
        "last_updated_date",
        "last_updated_time",
    )?;
    let payment = parse_date_column(&payment, "payment_date")?;
    let fact = payment.select(&[
        "payment_id",
        "created_date",
        "created_time",
        "last_updated_date",
        "last_updated_time",
        "transaction_id",
        "counterparty_id",
        "payment_amount",
        "currency_id",
        "payment_type_id",
        "paid",
        "payment_date",
    ])?;
    let fact = with_record_ids(&fact, "payment_record_id")?;
    let fact = coerce_int(&fact, "currency_id")?;
    coerce_int(&fact, "payment_id")
}

pub fn create_dim_transaction(tables: &SourceTables) -> Result<TableData, TransformError> {
    Ok(tables.get(SourceTable::Transaction)?.select(&[
        "transaction_id",
        "transaction_type",
        "sales_order_id",
        "purchase_order_id",
    ])?)
}

pub fn create_dim_location(tables: &SourceTables) -> Result<TableData, TransformError> {
    Ok(tables
        .get(SourceTable::Address)?
        .drop_columns(&["created_at", "last_updated"])?
        .rename_column("address_id", "location_id")?)
}

pub fn create_dim_counterparty(tables: &SourceTables) -> Result<TableData, TransformError> {
    let address = tables
        .get(SourceTable::Address)?
        .drop_columns(&["created_at", "last_updated"])?
        .rename_column("phone", "phone_number")?
        .prefix_columns("counterparty_legal_");
    let joined = tables.get(SourceTable::Counterparty)?.inner_join(
        &address,
        "legal_address_id",
        "counterparty_legal_address_id",
    )?;
    Ok(joined.drop_columns(&[
        "legal_address_id",
        "counterparty_legal_address_id",
        "created_at",
        "last_updated",
        "commercial_contact",
        "delivery_contact",
    ])?)
}

/// One row per distinct calendar date appearing in any `_date` column of
/// the fact tables in this batch, decomposed for calendar reporting.
/// Monday is day-of-week zero.
pub fn create_dim_date(facts: &[TableData]) -> Result<TableData, TransformError> {
    let mut dates = Vec::new();
    for fact in facts {
        for (idx, name) in fact.columns().iter().enumerate() {
            if !name.contains("_date") {
                continue;
            }
            for row in fact.rows() {
                dates.push(vec![row[idx].clone()]);
            }
        }
    }
    let distinct = TableData::new(vec!["date_id".to_string()], dates)?.drop_duplicates();

    let mut rows = Vec::with_capacity(distinct.num_rows());
    for row in distinct.rows() {
        let date = match &row[0] {
            Field::Date(d) => *d,
            other => return Err(invalid("date_id", other)),
        };
        rows.push(vec![
            Field::Date(date),
            Field::Int(date.year().into()),
            Field::Int(date.month().into()),
            Field::Int(date.day().into()),
            Field::Int(date.weekday().num_days_from_monday().into()),
            Field::String(date.format("%A").to_string()),
            Field::String(date.format("%B").to_string()),
            Field::Int((date.month0() / 3 + 1).into()),
        ]);
    }
    Ok(TableData::new(
        vec![
            "date_id".to_string(),
            "year".to_string(),
            "month".to_string(),
            "day".to_string(),
            "day_of_week".to_string(),
            "day_name".to_string(),
            "month_name".to_string(),
            "quarter".to_string(),
        ],
        rows,
    )?)
}

pub fn create_dim_currency(
    tables: &SourceTables,
    names: &dyn CurrencyNames,
) -> Result<TableData, TransformError> {
    let currency = tables
        .get(SourceTable::Currency)?
        .drop_columns(&["created_at", "last_updated"])?;
    let idx = currency.column_index("currency_code")?;
    let name_column = currency
        .rows()
        .iter()
        .map(|row| match &row[idx] {
            Field::String(code) => names.name_for(code).map_or(Field::Null, Field::String),
            _ => Field::Null,
        })
        .collect();
    Ok(currency
        .with_column("currency_name", name_column)?
        .drop_duplicates())
}

pub fn create_dim_payment_type(tables: &SourceTables) -> Result<TableData, TransformError> {
    Ok(tables
        .get(SourceTable::PaymentType)?
        .select(&["payment_type_id", "payment_type_name"])?)
}

pub fn create_dim_design(tables: &SourceTables) -> Result<TableData, TransformError> {
    Ok(tables.get(SourceTable::Design)?.select(&[
        "design_id",
        "design_name",
        "file_name",
        "file_location",
    ])?)
}

pub fn create_dim_staff(tables: &SourceTables) -> Result<TableData, TransformError> {
    let joined = tables.get(SourceTable::Staff)?.left_join(
        tables.get(SourceTable::Department)?,
        "department_id",
        "department_id",
    )?;
    Ok(joined.select(&[
        "staff_id",
        "first_name",
        "last_name",
        "department_name",
        "location",
        "email_address",
    ])?)
}
