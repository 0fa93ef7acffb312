use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{FinplanError, Result};
use crate::expense::ExpenseRow;
use crate::models::{ExpenseStatus, LookupKind, TermStatus};
use crate::validation::{parse_decimal, parse_whole, ReferenceData};

pub const DEFAULT_PLAN_NAME: &str = "Plan";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePayload {
    pub name: String,
    pub cost_type_id: i64,
    pub unit_price: f64,
    pub amount: i64,
    pub project_id: i64,
    pub supplier_id: i64,
    pub pic_id: i64,
    pub notes: String,
    pub currency_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSubmission {
    pub term_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    pub expenses: Vec<ExpensePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub expense_id: i64,
    pub status_code: ExpenseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub report_id: i64,
    pub list_expenses: Vec<ReviewEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanReceipt {
    pub plan_id: i64,
    pub plan_name: String,
    pub version: i64,
    pub expense_count: usize,
}

/// Where finalized uploads are sent.
pub trait ExpenseSink {
    fn submit_plan(&self, submission: &PlanSubmission) -> Result<PlanReceipt>;
    fn submit_review(&self, submission: &ReviewSubmission) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

fn invalid_count(rows: &[ExpenseRow]) -> usize {
    rows.iter().filter(|r| !r.is_valid()).count()
}

/// Build the plan payload. Refused while any row is invalid or there are
/// no rows at all.
pub fn build_plan_submission(
    term_id: i64,
    plan_name: Option<&str>,
    rows: &[ExpenseRow],
    refs: &ReferenceData,
) -> Result<PlanSubmission> {
    if rows.is_empty() {
        return Err(FinplanError::EmptySubmission);
    }
    let invalid = invalid_count(rows);
    if invalid > 0 {
        return Err(FinplanError::SubmissionBlocked(invalid));
    }
    let expenses = rows
        .iter()
        .map(|row| expense_payload(row, refs).ok_or(FinplanError::SubmissionBlocked(1)))
        .collect::<Result<Vec<_>>>()?;
    Ok(PlanSubmission {
        term_id,
        plan_name: plan_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from),
        expenses,
    })
}

fn expense_payload(row: &ExpenseRow, refs: &ReferenceData) -> Option<ExpensePayload> {
    Some(ExpensePayload {
        name: row.name.clone(),
        cost_type_id: refs.resolve(LookupKind::CostType, &row.cost_type)?,
        unit_price: parse_decimal(&row.unit_price)?,
        amount: parse_whole(&row.amount)?,
        project_id: refs.resolve(LookupKind::Project, &row.project)?,
        supplier_id: refs.resolve(LookupKind::Supplier, &row.supplier)?,
        pic_id: refs.resolve_user(&row.pic)?,
        notes: row.notes.clone(),
        currency_id: refs.resolve(LookupKind::Currency, &row.currency)?,
    })
}

pub fn build_review_submission(report_id: i64, rows: &[ExpenseRow]) -> Result<ReviewSubmission> {
    let invalid = invalid_count(rows);
    if invalid > 0 {
        return Err(FinplanError::SubmissionBlocked(invalid));
    }
    let list_expenses = rows
        .iter()
        .map(|row| {
            let expense_id = parse_whole(row.expense_code.as_deref().unwrap_or(""));
            let status_code = row.status.as_deref().and_then(ExpenseStatus::from_code);
            match (expense_id, status_code) {
                (Some(expense_id), Some(status_code)) => Ok(ReviewEntry {
                    expense_id,
                    status_code,
                }),
                _ => Err(FinplanError::SubmissionBlocked(1)),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ReviewSubmission {
        report_id,
        list_expenses,
    })
}

// ---------------------------------------------------------------------------
// SQLite sink
// ---------------------------------------------------------------------------

pub struct SqliteSink<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSink<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ExpenseSink for SqliteSink<'_> {
    fn submit_plan(&self, submission: &PlanSubmission) -> Result<PlanReceipt> {
        let plan_name = submission
            .plan_name
            .clone()
            .unwrap_or_else(|| DEFAULT_PLAN_NAME.to_string());

        let tx = self.conn.unchecked_transaction()?;
        let status: Option<(String, String)> = tx
            .query_row(
                "SELECT name, status FROM terms WHERE id = ?1",
                [submission.term_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((term_name, status)) = status else {
            return Err(FinplanError::UnknownTerm(submission.term_id.to_string()));
        };
        let status = TermStatus::from_code(&status).unwrap_or(TermStatus::Closed);
        if !status.accepts_uploads() {
            return Err(FinplanError::Other(format!("Term {term_name} is closed")));
        }

        let version: i64 = tx.query_row(
            "SELECT coalesce(max(version), 0) + 1 FROM plans WHERE term_id = ?1 AND name = ?2",
            rusqlite::params![submission.term_id, plan_name],
            |r| r.get(0),
        )?;
        tx.execute(
            "INSERT INTO plans (name, term_id, version) VALUES (?1, ?2, ?3)",
            rusqlite::params![plan_name, submission.term_id, version],
        )?;
        let plan_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO expenses (plan_id, name, cost_type_id, unit_price, amount, project_id, \
                 supplier_id, pic_id, notes, currency_id, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for e in &submission.expenses {
                stmt.execute(rusqlite::params![
                    plan_id,
                    e.name,
                    e.cost_type_id,
                    e.unit_price,
                    e.amount,
                    e.project_id,
                    e.supplier_id,
                    e.pic_id,
                    e.notes,
                    e.currency_id,
                    ExpenseStatus::New.code(),
                ])?;
            }
        }

        if status == TermStatus::New {
            tx.execute(
                "UPDATE terms SET status = ?1 WHERE id = ?2",
                rusqlite::params![TermStatus::InProgress.code(), submission.term_id],
            )?;
        }
        tx.commit()?;

        log::info!(
            "plan {plan_name} v{version} submitted for term {term_name}: {} expenses",
            submission.expenses.len()
        );
        Ok(PlanReceipt {
            plan_id,
            plan_name,
            version,
            expense_count: submission.expenses.len(),
        })
    }

    fn submit_review(&self, submission: &ReviewSubmission) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0usize;
        for entry in &submission.list_expenses {
            let n = tx.execute(
                "UPDATE expenses SET status = ?1 WHERE id = ?2 AND report_id = ?3",
                rusqlite::params![entry.status_code.code(), entry.expense_id, submission.report_id],
            )?;
            if n == 0 {
                // Dropping the transaction rolls back earlier updates.
                return Err(FinplanError::Other(format!(
                    "Expense {} is not part of report {}",
                    entry.expense_id, submission.report_id
                )));
            }
            updated += n;
        }
        tx.commit()?;
        log::info!("review submitted for report {}: {updated} expenses", submission.report_id);
        Ok(updated)
    }
}
