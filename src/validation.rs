//! Row validation for uploaded expense spreadsheets.
//!
//! Every check is a pure function of one row and the reference data. A row is
//! valid when all enabled checks pass; failures are recorded per field.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::expense::{Column, ExpenseRow};
use crate::models::{ExpenseStatus, LookupKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Missing,
    NotNumeric,
    NotPositive,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FieldError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub field_errors: BTreeMap<Column, FieldError>,
}

/// Names and ids the referential checks resolve against.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    lookups: HashMap<LookupKind, HashMap<String, i64>>,
    users: HashMap<String, i64>,
    /// Expense ids a review file may touch; `None` skips the scope check.
    expense_scope: Option<HashSet<i64>>,
}

impl ReferenceData {
    pub fn insert(&mut self, kind: LookupKind, name: &str, id: i64) {
        self.lookups
            .entry(kind)
            .or_default()
            .insert(lookup_key(name), id);
    }

    pub fn insert_user(&mut self, username: &str, id: i64) {
        self.users.insert(lookup_key(username), id);
    }

    pub fn set_expense_scope(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.expense_scope = Some(ids.into_iter().collect());
    }

    pub fn resolve(&self, kind: LookupKind, name: &str) -> Option<i64> {
        self.lookups.get(&kind)?.get(&lookup_key(name)).copied()
    }

    pub fn resolve_user(&self, username: &str) -> Option<i64> {
        self.users.get(&lookup_key(username)).copied()
    }

    pub fn in_scope(&self, expense_id: i64) -> bool {
        self.expense_scope
            .as_ref()
            .map_or(true, |ids| ids.contains(&expense_id))
    }
}

fn lookup_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    RequireName,
    NumericUnitPrice,
    NumericAmount,
    KnownCostType,
    KnownCurrency,
    KnownProject,
    KnownSupplier,
    KnownPic,
    NumericExpenseId,
    KnownStatusCode,
    ExpenseInScope,
}

impl Check {
    pub const PLAN_UPLOAD: &'static [Check] = &[
        Check::RequireName,
        Check::NumericUnitPrice,
        Check::NumericAmount,
        Check::KnownCostType,
        Check::KnownCurrency,
        Check::KnownProject,
        Check::KnownSupplier,
        Check::KnownPic,
    ];

    pub const REVIEW: &'static [Check] = &[
        Check::NumericExpenseId,
        Check::KnownStatusCode,
        Check::ExpenseInScope,
    ];

    pub fn column(&self) -> Column {
        match self {
            Self::RequireName => Column::Name,
            Self::NumericUnitPrice => Column::UnitPrice,
            Self::NumericAmount => Column::Amount,
            Self::KnownCostType => Column::CostType,
            Self::KnownCurrency => Column::Currency,
            Self::KnownProject => Column::Project,
            Self::KnownSupplier => Column::Supplier,
            Self::KnownPic => Column::Pic,
            Self::NumericExpenseId | Self::ExpenseInScope => Column::ExpenseCode,
            Self::KnownStatusCode => Column::Status,
        }
    }

    /// Run this check against one row. `None` means the check passed.
    pub fn apply(&self, row: &ExpenseRow, refs: &ReferenceData) -> Option<FieldError> {
        let value = row.cell(self.column());
        match self {
            Self::RequireName => require(value, "Expense name is required").err(),
            Self::NumericUnitPrice => check_positive_decimal(value, "Unit price"),
            Self::NumericAmount => check_positive_whole(value, "Amount"),
            Self::KnownCostType => check_lookup(refs, LookupKind::CostType, value),
            Self::KnownCurrency => check_lookup(refs, LookupKind::Currency, value),
            Self::KnownProject => check_lookup(refs, LookupKind::Project, value),
            Self::KnownSupplier => check_lookup(refs, LookupKind::Supplier, value),
            Self::KnownPic => {
                if let Err(e) = require(value, "PIC is required") {
                    return Some(e);
                }
                refs.resolve_user(value).is_none().then(|| {
                    FieldError::new(ErrorKind::Unknown, format!("Unknown PIC: {value}"))
                })
            }
            Self::NumericExpenseId => check_positive_whole(value, "Expense ID"),
            Self::ExpenseInScope => match parse_whole(value) {
                Some(id) if refs.in_scope(id) => None,
                Some(id) => Some(FieldError::new(
                    ErrorKind::Unknown,
                    format!("Expense {id} is not part of this report"),
                )),
                None => Some(FieldError::new(ErrorKind::NotNumeric, "Expense ID must be a number")),
            },
            Self::KnownStatusCode => {
                if let Err(e) = require(value, "Status is required") {
                    return Some(e);
                }
                ExpenseStatus::from_code(value).is_none().then(|| {
                    FieldError::new(ErrorKind::Unknown, format!("Unknown status code: {value}"))
                })
            }
        }
    }
}

pub fn validate(row: &ExpenseRow, checks: &[Check], refs: &ReferenceData) -> ValidationResult {
    let mut field_errors = BTreeMap::new();
    for check in checks {
        if let Some(error) = check.apply(row, refs) {
            // First failure on a field wins.
            field_errors.entry(check.column()).or_insert(error);
        }
    }
    ValidationResult {
        is_valid: field_errors.is_empty(),
        field_errors,
    }
}

/// Validate every row in place and return how many are invalid.
pub fn validate_all(rows: &mut [ExpenseRow], checks: &[Check], refs: &ReferenceData) -> usize {
    let mut invalid = 0;
    for row in rows.iter_mut() {
        let result = validate(row, checks, refs);
        if !result.is_valid {
            invalid += 1;
        }
        row.validation = Some(result);
    }
    invalid
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(\d{1,3}(,\d{3})+|\d+)(\.\d+)?$").expect("number pattern compiles")
    })
}

/// Parse `1,234.50`-style numbers. Misplaced separators are rejected.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if !number_pattern().is_match(s) {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a whole number; `3.0` is accepted since spreadsheets store numbers as floats.
pub fn parse_whole(raw: &str) -> Option<i64> {
    let v = parse_decimal(raw)?;
    (v.fract() == 0.0 && v.abs() < i64::MAX as f64).then_some(v as i64)
}

fn require(value: &str, message: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        Err(FieldError::new(ErrorKind::Missing, message))
    } else {
        Ok(())
    }
}

fn check_positive_decimal(value: &str, label: &str) -> Option<FieldError> {
    if let Err(e) = require(value, &format!("{label} is required")) {
        return Some(e);
    }
    match parse_decimal(value) {
        None => Some(FieldError::new(
            ErrorKind::NotNumeric,
            format!("{label} must be a number, got \"{value}\""),
        )),
        Some(v) if v <= 0.0 => Some(FieldError::new(
            ErrorKind::NotPositive,
            format!("{label} must be greater than zero"),
        )),
        Some(_) => None,
    }
}

fn check_positive_whole(value: &str, label: &str) -> Option<FieldError> {
    if let Err(e) = require(value, &format!("{label} is required")) {
        return Some(e);
    }
    match parse_whole(value) {
        None => Some(FieldError::new(
            ErrorKind::NotNumeric,
            format!("{label} must be a whole number, got \"{value}\""),
        )),
        Some(v) if v <= 0 => Some(FieldError::new(
            ErrorKind::NotPositive,
            format!("{label} must be greater than zero"),
        )),
        Some(_) => None,
    }
}

fn check_lookup(refs: &ReferenceData, kind: LookupKind, value: &str) -> Option<FieldError> {
    let label = kind.label();
    let mut capitalized = label.to_string();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    if let Err(e) = require(value, &format!("{capitalized} is required")) {
        return Some(e);
    }
    refs.resolve(kind, value)
        .is_none()
        .then(|| FieldError::new(ErrorKind::Unknown, format!("Unknown {label}: {value}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn refs() -> ReferenceData {
        let mut refs = ReferenceData::default();
        refs.insert(LookupKind::CostType, "Hardware", 1);
        refs.insert(LookupKind::CostType, "Travel", 4);
        refs.insert(LookupKind::Currency, "USD", 2);
        refs.insert(LookupKind::Currency, "VND", 1);
        refs.insert(LookupKind::Project, "Apollo", 1);
        refs.insert(LookupKind::Supplier, "FPT Shop", 1);
        refs.insert_user("hoa.pt", 2);
        refs
    }

    pub(crate) fn good_row(id: i64) -> ExpenseRow {
        let mut row = ExpenseRow::from_cells(id, &Default::default());
        row.name = "Laptop".into();
        row.cost_type = "Hardware".into();
        row.unit_price = "1,200.00".into();
        row.amount = "2".into();
        row.project = "Apollo".into();
        row.supplier = "FPT Shop".into();
        row.pic = "hoa.pt".into();
        row.currency = "USD".into();
        row
    }

    #[test]
    fn test_good_row_is_valid() {
        let result = validate(&good_row(1), Check::PLAN_UPLOAD, &refs());
        assert!(result.is_valid);
        assert!(result.field_errors.is_empty());
    }

    #[test]
    fn test_non_numeric_price_or_amount_is_invalid() {
        for (price, amount) in [("abc", "2"), ("10", "two"), ("", "1"), ("1,2,3", "1"), ("10", "1.5")] {
            let mut row = good_row(1);
            row.unit_price = price.into();
            row.amount = amount.into();
            let result = validate(&row, Check::PLAN_UPLOAD, &refs());
            assert!(!result.is_valid, "price={price} amount={amount} should be invalid");
        }
    }

    #[test]
    fn test_parse_errors_are_distinguished_from_unknown_references() {
        let mut row = good_row(1);
        row.unit_price = "abc".into();
        row.supplier = "Nobody Ltd".into();
        let result = validate(&row, Check::PLAN_UPLOAD, &refs());
        assert_eq!(result.field_errors[&Column::UnitPrice].kind, ErrorKind::NotNumeric);
        assert_eq!(result.field_errors[&Column::Supplier].kind, ErrorKind::Unknown);
        assert_eq!(result.field_errors.len(), 2);
    }

    #[test]
    fn test_unknown_references_are_invalid() {
        let cases: [(Column, fn(&mut ExpenseRow)); 5] = [
            (Column::CostType, |r| r.cost_type = "Yachts".into()),
            (Column::Currency, |r| r.currency = "BTC".into()),
            (Column::Project, |r| r.project = "Hermes".into()),
            (Column::Supplier, |r| r.supplier = "Acme".into()),
            (Column::Pic, |r| r.pic = "ghost".into()),
        ];
        for (column, mutate) in cases {
            let mut row = good_row(1);
            mutate(&mut row);
            let result = validate(&row, Check::PLAN_UPLOAD, &refs());
            assert!(!result.is_valid, "{column} should be invalid");
            assert_eq!(result.field_errors[&column].kind, ErrorKind::Unknown);
        }
    }

    #[test]
    fn test_reference_matching_ignores_case_and_spaces() {
        let mut row = good_row(1);
        row.cost_type = " hardware ".into();
        row.currency = "usd".into();
        row.pic = "HOA.PT".into();
        assert!(validate(&row, Check::PLAN_UPLOAD, &refs()).is_valid);
    }

    #[test]
    fn test_non_positive_numbers() {
        let mut row = good_row(1);
        row.unit_price = "0".into();
        row.amount = "-3".into();
        let result = validate(&row, Check::PLAN_UPLOAD, &refs());
        assert_eq!(result.field_errors[&Column::UnitPrice].kind, ErrorKind::NotPositive);
        assert_eq!(result.field_errors[&Column::Amount].kind, ErrorKind::NotPositive);
    }

    #[test]
    fn test_only_enabled_checks_run() {
        let mut row = good_row(1);
        row.currency = "BTC".into();
        let result = validate(&row, &[Check::RequireName, Check::NumericAmount], &refs());
        assert!(result.is_valid);
    }

    #[test]
    fn test_review_checks() {
        let mut refs = refs();
        refs.set_expense_scope([10, 11]);

        let mut row = ExpenseRow::from_cells(1, &Default::default());
        row.expense_code = Some("10".into());
        row.status = Some("approved".into());
        assert!(validate(&row, Check::REVIEW, &refs).is_valid);

        row.expense_code = Some("E-10".into());
        let result = validate(&row, Check::REVIEW, &refs);
        assert_eq!(result.field_errors[&Column::ExpenseCode].kind, ErrorKind::NotNumeric);

        row.expense_code = Some("12".into());
        let result = validate(&row, Check::REVIEW, &refs);
        assert_eq!(result.field_errors[&Column::ExpenseCode].kind, ErrorKind::Unknown);

        row.expense_code = Some("11".into());
        row.status = Some("maybe".into());
        let result = validate(&row, Check::REVIEW, &refs);
        assert_eq!(result.field_errors[&Column::Status].kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_decimal("1,234.56"), Some(1234.56));
        assert_eq!(parse_decimal(" 42 "), Some(42.0));
        assert_eq!(parse_decimal("12,34"), None);
        assert_eq!(parse_decimal("1e5"), None);
        assert_eq!(parse_whole("3.0"), Some(3));
        assert_eq!(parse_whole("3.5"), None);
    }

    #[test]
    fn test_validate_all_counts_invalid() {
        let mut rows = vec![good_row(1), good_row(2), good_row(3)];
        rows[1].unit_price = "abc".into();
        let invalid = validate_all(&mut rows, Check::PLAN_UPLOAD, &refs());
        assert_eq!(invalid, 1);
        assert!(rows[0].is_valid());
        assert!(!rows[1].is_valid());
        assert!(rows[2].is_valid());
    }
}
