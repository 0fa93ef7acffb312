//! The guided plan upload: pick a term, upload a spreadsheet, confirm the
//! parsed expenses and submit them.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{FinplanError, Result};
use crate::expense::{Column, ExpenseRow};
use crate::models::{Report, Term, User};
use crate::parser::{compute_checksum, parse_file};
use crate::selection::SelectionTracker;
use crate::stage::{Stage, StageController, StagePayload};
use crate::store::report_expense_ids;
use crate::submission::{build_plan_submission, ExpenseSink, PlanReceipt};
use crate::validation::{validate, validate_all, Check, ReferenceData};

#[derive(Debug, Clone, PartialEq)]
pub enum Toast {
    Success(String),
    Warning(String),
    Failure(String),
}

impl Toast {
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Warning(m) | Self::Failure(m) => m,
        }
    }
}

pub const SUBMIT_FAILED: &str = "Could not submit the plan. Please try again.";

pub struct SubmitOutcome {
    pub toast: Toast,
    pub receipt: Option<PlanReceipt>,
}

/// Where the file just loaded came from.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub checksum: String,
}

pub struct UploadSession {
    controller: StageController,
    refs: ReferenceData,
    page_size: usize,
    page: usize,
    selection: SelectionTracker,
    file: Option<UploadedFile>,
}

impl UploadSession {
    pub fn new(refs: ReferenceData, page_size: usize) -> Self {
        Self {
            controller: StageController::new(),
            refs,
            page_size: page_size.max(1),
            page: 0,
            selection: SelectionTracker::default(),
            file: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.controller.stage()
    }

    pub fn term(&self) -> Option<&Term> {
        self.controller.term()
    }

    pub fn rows(&self) -> &[ExpenseRow] {
        self.controller.rows()
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionTracker {
        &mut self.selection
    }

    pub fn open(&mut self) -> bool {
        self.controller.open()
    }

    /// Closed terms take no uploads and are ignored like a missing choice.
    pub fn choose_term(&mut self, term: Term) -> bool {
        if !term.status.accepts_uploads() {
            return false;
        }
        self.controller.advance(Some(StagePayload::Term(term)))
    }

    /// Parse and validate an uploaded file, then move on to confirmation.
    /// Returns the number of invalid rows.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        if self.stage() != Stage::UploadFile {
            return Err(FinplanError::Other("Choose a term before uploading a file".into()));
        }
        let mut rows = parse_file(path, &Column::UPLOAD)?;
        if rows.is_empty() {
            return Err(FinplanError::Other("The file contains no expense rows".into()));
        }
        let invalid = validate_all(&mut rows, Check::PLAN_UPLOAD, &self.refs);
        let file = UploadedFile {
            filename: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string(),
            checksum: compute_checksum(path)?,
        };
        log::info!(
            "loaded {} rows from {} ({invalid} invalid)",
            rows.len(),
            file.filename
        );
        self.controller.advance(Some(StagePayload::Rows(rows)));
        self.file = Some(file);
        self.set_page(0);
        Ok(invalid)
    }

    pub fn retreat(&mut self) -> bool {
        let moved = self.controller.retreat();
        if moved && self.stage() == Stage::UploadFile {
            self.file = None;
            self.set_page(0);
        }
        moved
    }

    pub fn close(&mut self) {
        self.controller.close();
        self.file = None;
        self.page = 0;
        self.selection = SelectionTracker::default();
    }

    // -----------------------------------------------------------------------
    // Paging
    // -----------------------------------------------------------------------

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.rows().len().div_ceil(self.page_size).max(1)
    }

    pub fn page_rows(&self) -> &[ExpenseRow] {
        let rows = self.rows();
        let start = (self.page * self.page_size).min(rows.len());
        let end = (start + self.page_size).min(rows.len());
        &rows[start..end]
    }

    fn page_ids(&self) -> Vec<i64> {
        self.page_rows().iter().map(|r| r.id).collect()
    }

    fn set_page(&mut self, page: usize) {
        self.page = page.min(self.page_count() - 1);
        let ids = self.page_ids();
        self.selection.set_page(ids);
    }

    pub fn next_page(&mut self) -> bool {
        if self.page + 1 >= self.page_count() {
            return false;
        }
        self.set_page(self.page + 1);
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page == 0 {
            return false;
        }
        self.set_page(self.page - 1);
        true
    }

    // -----------------------------------------------------------------------
    // Confirm-stage editing
    // -----------------------------------------------------------------------

    pub fn invalid_count(&self) -> usize {
        self.rows().iter().filter(|r| !r.is_valid()).count()
    }

    pub fn can_submit(&self) -> bool {
        self.stage() == Stage::ConfirmExpenses && !self.rows().is_empty() && self.invalid_count() == 0
    }

    /// Correct one cell and re-validate its row.
    pub fn update_cell(&mut self, id: i64, column: Column, value: &str) -> bool {
        if self.stage() != Stage::ConfirmExpenses {
            return false;
        }
        let refs = &self.refs;
        let Some(row) = self.controller.rows_mut().iter_mut().find(|r| r.id == id) else {
            return false;
        };
        row.set_cell(column, value);
        row.validation = Some(validate(row, Check::PLAN_UPLOAD, refs));
        true
    }

    pub fn remove_row(&mut self, id: i64) -> bool {
        self.remove_where(|row| row.id == id) > 0
    }

    pub fn remove_selected(&mut self) -> usize {
        let selected: Vec<i64> = self.selection.selected().collect();
        self.remove_where(|row| selected.contains(&row.id))
    }

    fn remove_where(&mut self, pred: impl Fn(&ExpenseRow) -> bool) -> usize {
        if self.stage() != Stage::ConfirmExpenses {
            return 0;
        }
        let rows = self.controller.rows_mut();
        let before = rows.len();
        rows.retain(|r| !pred(r));
        let removed = before - rows.len();
        if removed > 0 {
            self.page = self.page.min(self.page_count() - 1);
            let ids = self.page_ids();
            self.selection.retain_page(ids);
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Send the confirmed rows. On success the session closes; a failure
    /// leaves it on the confirm stage.
    pub fn submit(&mut self, sink: &dyn ExpenseSink, plan_name: Option<&str>) -> SubmitOutcome {
        let Some(term_id) = self.term().map(|t| t.id) else {
            return SubmitOutcome {
                toast: Toast::Warning("Choose a term first".into()),
                receipt: None,
            };
        };
        if self.stage() != Stage::ConfirmExpenses {
            return SubmitOutcome {
                toast: Toast::Warning("Upload a file first".into()),
                receipt: None,
            };
        }
        if self.rows().is_empty() {
            return SubmitOutcome {
                toast: Toast::Warning("No rows left to submit".into()),
                receipt: None,
            };
        }
        let submission = match build_plan_submission(term_id, plan_name, self.rows(), &self.refs) {
            Ok(s) => s,
            Err(e) => {
                return SubmitOutcome {
                    toast: Toast::Warning(format!("{e}. Fix or remove them first.")),
                    receipt: None,
                }
            }
        };
        match sink.submit_plan(&submission) {
            Ok(receipt) => {
                let toast = Toast::Success(format!(
                    "Plan {} v{} submitted with {} expenses",
                    receipt.plan_name, receipt.version, receipt.expense_count
                ));
                self.close();
                SubmitOutcome {
                    toast,
                    receipt: Some(receipt),
                }
            }
            Err(e) => {
                log::error!("plan submission failed: {e}");
                SubmitOutcome {
                    toast: Toast::Failure(SUBMIT_FAILED.into()),
                    receipt: None,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Review flow
// ---------------------------------------------------------------------------

pub fn ensure_reviewer(user: Option<&User>) -> Result<()> {
    match user {
        None => Err(FinplanError::PermissionDenied(
            "no acting user; run `finplan init --user <name>`".into(),
        )),
        Some(u) if !u.role.can_review() => Err(FinplanError::PermissionDenied(format!(
            "{} ({}) cannot review reports",
            u.username, u.role
        ))),
        Some(_) => Ok(()),
    }
}

/// Parse and validate a review spreadsheet against the expenses of `report`.
pub fn prepare_review(conn: &Connection, report: &Report, path: &Path) -> Result<Vec<ExpenseRow>> {
    let mut rows = parse_file(path, &Column::REVIEW)?;
    let mut refs = ReferenceData::default();
    refs.set_expense_scope(report_expense_ids(conn, report.id)?);
    let invalid = validate_all(&mut rows, Check::REVIEW, &refs);
    log::info!(
        "review file for report {}: {} rows ({invalid} invalid)",
        report.id,
        rows.len()
    );
    Ok(rows)
}
