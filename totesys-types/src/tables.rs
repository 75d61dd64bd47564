use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TypeError;
use crate::types::TableData;

/// The operational tables pulled out of Totesys. Reference tables carry no
/// audit timestamps and are extracted in full on every run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    SalesOrder,
    PurchaseOrder,
    Payment,
    Transaction,
    Counterparty,
    Address,
    Staff,
    Department,
    Currency,
    Design,
    PaymentType,
}

impl SourceTable {
    pub const ALL: [SourceTable; 11] = [
        SourceTable::SalesOrder,
        SourceTable::PurchaseOrder,
        SourceTable::Payment,
        SourceTable::Transaction,
        SourceTable::Counterparty,
        SourceTable::Address,
        SourceTable::Staff,
        SourceTable::Department,
        SourceTable::Currency,
        SourceTable::Design,
        SourceTable::PaymentType,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceTable::SalesOrder => "sales_order",
            SourceTable::PurchaseOrder => "purchase_order",
            SourceTable::Payment => "payment",
            SourceTable::Transaction => "transaction",
            SourceTable::Counterparty => "counterparty",
            SourceTable::Address => "address",
            SourceTable::Staff => "staff",
            SourceTable::Department => "department",
            SourceTable::Currency => "currency",
            SourceTable::Design => "design",
            SourceTable::PaymentType => "payment_type",
        }
    }

    /// Whether the table carries `created_at`/`last_updated` audit columns.
    /// Tables without them are static reference data.
    pub fn has_audit_columns(&self) -> bool {
        !matches!(
            self,
            SourceTable::Design | SourceTable::PaymentType | SourceTable::Department
        )
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceTable {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceTable::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| TypeError::MissingTable(s.to_string()))
    }
}

/// The star-schema tables produced by the transformer and appended into the
/// warehouse. Immutable dimensions are written once per name; mutable
/// tables get a fresh timestamped snapshot every run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseTable {
    DimCounterparty,
    DimDate,
    DimLocation,
    DimStaff,
    DimDesign,
    DimTransaction,
    DimPaymentType,
    FactSalesOrder,
    FactPurchaseOrder,
    FactPayment,
    DimCurrency,
}

impl WarehouseTable {
    pub const IMMUTABLE: [WarehouseTable; 7] = [
        WarehouseTable::DimCounterparty,
        WarehouseTable::DimDate,
        WarehouseTable::DimLocation,
        WarehouseTable::DimStaff,
        WarehouseTable::DimDesign,
        WarehouseTable::DimTransaction,
        WarehouseTable::DimPaymentType,
    ];

    pub const MUTABLE: [WarehouseTable; 4] = [
        WarehouseTable::FactSalesOrder,
        WarehouseTable::FactPurchaseOrder,
        WarehouseTable::FactPayment,
        WarehouseTable::DimCurrency,
    ];

    pub fn all() -> impl Iterator<Item = WarehouseTable> {
        Self::IMMUTABLE.into_iter().chain(Self::MUTABLE)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WarehouseTable::DimCounterparty => "dim_counterparty",
            WarehouseTable::DimDate => "dim_date",
            WarehouseTable::DimLocation => "dim_location",
            WarehouseTable::DimStaff => "dim_staff",
            WarehouseTable::DimDesign => "dim_design",
            WarehouseTable::DimTransaction => "dim_transaction",
            WarehouseTable::DimPaymentType => "dim_payment_type",
            WarehouseTable::FactSalesOrder => "fact_sales_order",
            WarehouseTable::FactPurchaseOrder => "fact_purchase_order",
            WarehouseTable::FactPayment => "fact_payment",
            WarehouseTable::DimCurrency => "dim_currency",
        }
    }

    pub fn is_mutable(&self) -> bool {
        Self::MUTABLE.contains(self)
    }
}

impl fmt::Display for WarehouseTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WarehouseTable {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WarehouseTable::all()
            .find(|t| t.name() == s)
            .ok_or_else(|| TypeError::MissingTable(s.to_string()))
    }
}

/// The transformer's input: one accumulated table per source table,
/// addressed by identifier rather than by raw string key.
#[derive(Clone, Debug, Default)]
pub struct SourceTables {
    tables: BTreeMap<SourceTable, TableData>,
}

impl SourceTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: SourceTable, data: TableData) {
        self.tables.insert(table, data);
    }

    pub fn get(&self, table: SourceTable) -> Result<&TableData, TypeError> {
        self.tables
            .get(&table)
            .ok_or_else(|| TypeError::MissingTable(table.name().to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceTable, &TableData)> {
        self.tables.iter().map(|(t, d)| (*t, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_and_mutable_sets_cover_all_tables() {
        assert_eq!(WarehouseTable::all().count(), 11);
        assert!(!WarehouseTable::DimDesign.is_mutable());
        assert!(WarehouseTable::DimCurrency.is_mutable());
        assert!(WarehouseTable::FactSalesOrder.is_mutable());
    }

    #[test]
    fn source_table_names_round_trip() {
        for table in SourceTable::ALL {
            assert_eq!(table.name().parse::<SourceTable>().unwrap(), table);
        }
        assert!("no_such_table".parse::<SourceTable>().is_err());
    }

    #[test]
    fn reference_tables_have_no_audit_columns() {
        assert!(!SourceTable::Design.has_audit_columns());
        assert!(!SourceTable::Department.has_audit_columns());
        assert!(!SourceTable::PaymentType.has_audit_columns());
        assert!(SourceTable::SalesOrder.has_audit_columns());
    }

    #[test]
    fn missing_source_table_is_an_error() {
        let tables = SourceTables::new();
        assert!(tables.get(SourceTable::Payment).is_err());
    }
}
