//! Schema catalog for the business dataset
//!
//! Holds the fixed four-table schema and picks the tables a question talks
//! about by keyword containment.

use lazy_static::lazy_static;
use std::collections::BTreeMap;

/// Table name -> ordered column list.
pub type TableSet = BTreeMap<&'static str, &'static [&'static str]>;

const CUSTOMERS: &[&str] = &["id", "name", "city", "age"];
const EMPLOYEES: &[&str] = &["id", "name", "department", "joining_date"];
const PRODUCTS: &[&str] = &["id", "name", "category", "price"];
const SALES: &[&str] = &[
    "id",
    "customer_id",
    "employee_id",
    "product_id",
    "quantity",
    "sale_amount",
    "sale_date",
];

/// Keywords that mark a table as relevant. Evaluated per table, so one
/// question can select several tables.
const TABLE_KEYWORDS: &[(&str, &[&str])] = &[
    ("customers", &["customer", "client"]),
    ("employees", &["employee", "staff"]),
    ("products", &["product", "item"]),
    ("sales", &["sale", "revenue", "orders"]),
];

lazy_static! {
    static ref CATALOG: SchemaCatalog = SchemaCatalog::new();
}

#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    tables: TableSet,
}

impl SchemaCatalog {
    fn new() -> Self {
        let mut tables = TableSet::new();
        tables.insert("customers", CUSTOMERS);
        tables.insert("employees", EMPLOYEES);
        tables.insert("products", PRODUCTS);
        tables.insert("sales", SALES);
        Self { tables }
    }

    /// Process-wide catalog, built on first use and never mutated.
    pub fn global() -> &'static SchemaCatalog {
        &CATALOG
    }

    pub fn full_schema(&self) -> &TableSet {
        &self.tables
    }

    pub fn columns(&self, table: &str) -> Option<&'static [&'static str]> {
        self.tables.get(table).copied()
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .map(|cols| cols.contains(&column))
            .unwrap_or(false)
    }

    /// Tables whose keywords appear in the question.
    ///
    /// Falls back to the whole catalog when nothing matches, so an empty
    /// result never comes back from here.
    pub fn relevant_tables(&self, question: &str) -> TableSet {
        let q = question.to_lowercase();
        let relevant: TableSet = TABLE_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| q.contains(k)))
            .filter_map(|(table, _)| self.tables.get_key_value(table))
            .map(|(table, cols)| (*table, *cols))
            .collect();

        if relevant.is_empty() {
            return self.tables.clone();
        }
        relevant
    }
}
