use std::collections::HashMap;
use std::fmt;

use crate::fmt::money;
use crate::models::normalize_code;
use crate::validation::{parse_decimal, parse_whole, ValidationResult};

/// Columns of the upload and review spreadsheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Name,
    CostType,
    UnitPrice,
    Amount,
    Project,
    Supplier,
    Pic,
    Notes,
    Currency,
    ExpenseCode,
    Status,
}

impl Column {
    /// Plan upload columns, in template order.
    pub const UPLOAD: [Column; 9] = [
        Column::Name,
        Column::CostType,
        Column::UnitPrice,
        Column::Amount,
        Column::Project,
        Column::Supplier,
        Column::Pic,
        Column::Notes,
        Column::Currency,
    ];

    pub const REVIEW: [Column; 2] = [Column::ExpenseCode, Column::Status];

    pub fn header(&self) -> &'static str {
        match self {
            Self::Name => "Expense",
            Self::CostType => "Cost Type",
            Self::UnitPrice => "Unit Price",
            Self::Amount => "Amount",
            Self::Project => "Project",
            Self::Supplier => "Supplier",
            Self::Pic => "PIC",
            Self::Notes => "Notes",
            Self::Currency => "Currency",
            Self::ExpenseCode => "Expense ID",
            Self::Status => "Status",
        }
    }

    /// Field name used in payloads and error maps.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CostType => "costType",
            Self::UnitPrice => "unitPrice",
            Self::Amount => "amount",
            Self::Project => "project",
            Self::Supplier => "supplier",
            Self::Pic => "pic",
            Self::Notes => "notes",
            Self::Currency => "currency",
            Self::ExpenseCode => "expenseCode",
            Self::Status => "status",
        }
    }

    pub fn from_header(raw: &str) -> Option<Self> {
        match normalize_code(raw).as_str() {
            "expense" | "expensename" | "name" => Some(Self::Name),
            "costtype" => Some(Self::CostType),
            "unitprice" | "price" => Some(Self::UnitPrice),
            "amount" | "quantity" | "qty" => Some(Self::Amount),
            "project" | "projectname" => Some(Self::Project),
            "supplier" | "suppliername" => Some(Self::Supplier),
            "pic" | "personincharge" => Some(Self::Pic),
            "notes" | "note" => Some(Self::Notes),
            "currency" => Some(Self::Currency),
            "expenseid" | "expensecode" | "id" => Some(Self::ExpenseCode),
            "status" | "statuscode" => Some(Self::Status),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// One parsed expense line. Cells keep the text read from the file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseRow {
    /// 1-based position in the uploaded file.
    pub id: i64,
    pub name: String,
    pub cost_type: String,
    pub unit_price: String,
    pub amount: String,
    pub project: String,
    pub supplier: String,
    pub pic: String,
    pub currency: String,
    pub notes: String,
    pub status: Option<String>,
    pub expense_code: Option<String>,
    pub validation: Option<ValidationResult>,
}

impl ExpenseRow {
    pub fn from_cells(id: i64, cells: &HashMap<Column, String>) -> Self {
        let get = |col: Column| cells.get(&col).map(|s| s.trim().to_string()).unwrap_or_default();
        let opt = |col: Column| cells.get(&col).map(|s| s.trim().to_string());
        Self {
            id,
            name: get(Column::Name),
            cost_type: get(Column::CostType),
            unit_price: get(Column::UnitPrice),
            amount: get(Column::Amount),
            project: get(Column::Project),
            supplier: get(Column::Supplier),
            pic: get(Column::Pic),
            currency: get(Column::Currency),
            notes: get(Column::Notes),
            status: opt(Column::Status),
            expense_code: opt(Column::ExpenseCode),
            validation: None,
        }
    }

    pub fn cell(&self, column: Column) -> &str {
        match column {
            Column::Name => &self.name,
            Column::CostType => &self.cost_type,
            Column::UnitPrice => &self.unit_price,
            Column::Amount => &self.amount,
            Column::Project => &self.project,
            Column::Supplier => &self.supplier,
            Column::Pic => &self.pic,
            Column::Notes => &self.notes,
            Column::Currency => &self.currency,
            Column::ExpenseCode => self.expense_code.as_deref().unwrap_or(""),
            Column::Status => self.status.as_deref().unwrap_or(""),
        }
    }

    /// Replace a cell. Any earlier validation result no longer applies.
    pub fn set_cell(&mut self, column: Column, value: &str) {
        let value = value.trim().to_string();
        match column {
            Column::Name => self.name = value,
            Column::CostType => self.cost_type = value,
            Column::UnitPrice => self.unit_price = value,
            Column::Amount => self.amount = value,
            Column::Project => self.project = value,
            Column::Supplier => self.supplier = value,
            Column::Pic => self.pic = value,
            Column::Notes => self.notes = value,
            Column::Currency => self.currency = value,
            Column::ExpenseCode => self.expense_code = Some(value),
            Column::Status => self.status = Some(value),
        }
        self.validation = None;
    }

    /// Rows that were never validated count as invalid.
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.is_valid)
    }

    pub fn total(&self) -> Option<f64> {
        let price = parse_decimal(&self.unit_price)?;
        let amount = parse_whole(&self.amount)?;
        Some(price * amount as f64)
    }

    pub fn display_total(&self) -> String {
        match self.total() {
            Some(total) => money(total, &self.currency),
            None => "\u{2014}".to_string(),
        }
    }

    /// First field error message, for one-line status displays.
    pub fn first_error(&self) -> Option<String> {
        let validation = self.validation.as_ref()?;
        validation
            .field_errors
            .iter()
            .next()
            .map(|(col, err)| format!("{}: {}", col.header(), err.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(pairs: &[(Column, &str)]) -> HashMap<Column, String> {
        pairs.iter().map(|(c, v)| (*c, v.to_string())).collect()
    }

    #[test]
    fn test_header_aliases() {
        assert_eq!(Column::from_header("Unit Price"), Some(Column::UnitPrice));
        assert_eq!(Column::from_header("unit_price"), Some(Column::UnitPrice));
        assert_eq!(Column::from_header("Project Name"), Some(Column::Project));
        assert_eq!(Column::from_header("Status Code"), Some(Column::Status));
        assert_eq!(Column::from_header("Expense ID"), Some(Column::ExpenseCode));
        assert_eq!(Column::from_header("Remarks"), None);
    }

    #[test]
    fn test_from_cells_trims_and_defaults() {
        let row = ExpenseRow::from_cells(
            3,
            &cells(&[(Column::Name, "  Laptop "), (Column::UnitPrice, "1,200")]),
        );
        assert_eq!(row.id, 3);
        assert_eq!(row.name, "Laptop");
        assert_eq!(row.unit_price, "1,200");
        assert_eq!(row.currency, "");
        assert_eq!(row.status, None);
        assert!(!row.is_valid());
    }

    #[test]
    fn test_total_and_display() {
        let row = ExpenseRow::from_cells(
            1,
            &cells(&[
                (Column::UnitPrice, "1,250.50"),
                (Column::Amount, "2"),
                (Column::Currency, "USD"),
            ]),
        );
        assert_eq!(row.total(), Some(2501.0));
        assert_eq!(row.display_total(), "2,501.00 USD");
    }

    #[test]
    fn test_total_missing_for_bad_numbers() {
        let row = ExpenseRow::from_cells(1, &cells(&[(Column::UnitPrice, "abc"), (Column::Amount, "2")]));
        assert_eq!(row.total(), None);
        assert_eq!(row.display_total(), "\u{2014}");
    }

    #[test]
    fn test_set_cell_clears_validation() {
        let mut row = ExpenseRow::from_cells(1, &cells(&[(Column::Name, "Laptop")]));
        row.validation = Some(ValidationResult::default());
        row.set_cell(Column::UnitPrice, " 99 ");
        assert_eq!(row.cell(Column::UnitPrice), "99");
        assert!(row.validation.is_none());
    }
}
