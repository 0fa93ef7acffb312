use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Term {
    pub id: i64,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub status: TermStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermStatus {
    New,
    InProgress,
    Closed,
}

impl TermStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }

    pub fn from_code(raw: &str) -> Option<Self> {
        match normalize_code(raw).as_str() {
            "new" => Some(Self::New),
            "inprogress" => Some(Self::InProgress),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn accepts_uploads(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for TermStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::New => "New",
            Self::InProgress => "In progress",
            Self::Closed => "Closed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub term_id: i64,
    pub term_name: String,
    pub version: i64,
    pub expense_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: i64,
    pub name: String,
    pub term_id: i64,
    pub term_name: String,
    pub expense_count: i64,
    pub created_at: String,
}

/// A stored expense joined with its reference names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub id: i64,
    pub plan_id: i64,
    pub report_id: Option<i64>,
    pub name: String,
    pub cost_type: String,
    pub unit_price: f64,
    pub amount: i64,
    pub project: String,
    pub supplier: String,
    pub pic: String,
    pub currency: String,
    pub notes: String,
    pub status: ExpenseStatus,
}

impl Expense {
    pub fn total(&self) -> f64 {
        self.unit_price * self.amount as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupKind {
    CostType,
    Currency,
    Project,
    Supplier,
    Department,
}

impl LookupKind {
    pub const ALL: [LookupKind; 5] = [
        LookupKind::CostType,
        LookupKind::Currency,
        LookupKind::Project,
        LookupKind::Supplier,
        LookupKind::Department,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Self::CostType => "cost_types",
            Self::Currency => "currencies",
            Self::Project => "projects",
            Self::Supplier => "suppliers",
            Self::Department => "departments",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CostType => "cost type",
            Self::Currency => "currency",
            Self::Project => "project",
            Self::Supplier => "supplier",
            Self::Department => "department",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub department: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    New,
    WaitingForApproval,
    Approved,
    Denied,
}

impl ExpenseStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::WaitingForApproval => "WAITING_FOR_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
        }
    }

    /// Parses `waiting_for_approval`, `Waiting for approval`, `WAITING-FOR-APPROVAL`, ...
    pub fn from_code(raw: &str) -> Option<Self> {
        match normalize_code(raw).as_str() {
            "new" => Some(Self::New),
            "waitingforapproval" => Some(Self::WaitingForApproval),
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::New => "New",
            Self::WaitingForApproval => "Waiting for approval",
            Self::Approved => "Approved",
            Self::Denied => "Denied",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Accountant,
    FinancialStaff,
}

impl Role {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Accountant => "accountant",
            Self::FinancialStaff => "financial_staff",
        }
    }

    pub fn from_code(raw: &str) -> Option<Self> {
        match normalize_code(raw).as_str() {
            "admin" => Some(Self::Admin),
            "accountant" => Some(Self::Accountant),
            "financialstaff" => Some(Self::FinancialStaff),
            _ => None,
        }
    }

    pub fn can_review(&self) -> bool {
        match self {
            Self::Admin | Self::Accountant => true,
            Self::FinancialStaff => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Admin => "Admin",
            Self::Accountant => "Accountant",
            Self::FinancialStaff => "Financial staff",
        };
        f.write_str(label)
    }
}

/// Lower-case and drop separators so `In_Progress`, `in progress` and
/// `IN-PROGRESS` compare equal.
pub fn normalize_code(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_parse_loosely() {
        assert_eq!(ExpenseStatus::from_code("APPROVED"), Some(ExpenseStatus::Approved));
        assert_eq!(
            ExpenseStatus::from_code("waiting_for_approval"),
            Some(ExpenseStatus::WaitingForApproval)
        );
        assert_eq!(
            ExpenseStatus::from_code(" Waiting for Approval "),
            Some(ExpenseStatus::WaitingForApproval)
        );
        assert_eq!(ExpenseStatus::from_code("deny"), None);
        assert_eq!(ExpenseStatus::from_code(""), None);
    }

    #[test]
    fn test_status_code_roundtrip() {
        for status in [
            ExpenseStatus::New,
            ExpenseStatus::WaitingForApproval,
            ExpenseStatus::Approved,
            ExpenseStatus::Denied,
        ] {
            assert_eq!(ExpenseStatus::from_code(status.code()), Some(status));
        }
    }

    #[test]
    fn test_roles() {
        assert_eq!(Role::from_code("Financial Staff"), Some(Role::FinancialStaff));
        assert!(Role::Accountant.can_review());
        assert!(!Role::FinancialStaff.can_review());
        assert_eq!(Role::from_code("guest"), None);
    }

    #[test]
    fn test_term_status() {
        assert_eq!(TermStatus::from_code("IN_PROGRESS"), Some(TermStatus::InProgress));
        assert!(!TermStatus::Closed.accepts_uploads());
    }
}
