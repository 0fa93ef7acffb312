use crate::expense::ExpenseRow;
use crate::models::Term;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    #[default]
    Closed = 0,
    SelectTerm = 1,
    UploadFile = 2,
    ConfirmExpenses = 3,
}

impl Stage {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Closed => "",
            Self::SelectTerm => "Select term",
            Self::UploadFile => "Upload file",
            Self::ConfirmExpenses => "Confirm expenses",
        }
    }
}

/// What a stage hands to the next one.
#[derive(Debug, Clone)]
pub enum StagePayload {
    Term(Term),
    Rows(Vec<ExpenseRow>),
}

/// Moves the upload wizard through its stages. Invalid transitions are
/// ignored and reported as `false`.
#[derive(Debug, Default)]
pub struct StageController {
    stage: Stage,
    highest: Stage,
    term: Option<Term>,
    rows: Vec<ExpenseRow>,
}

impl StageController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn highest_reached(&self) -> Stage {
        self.highest
    }

    pub fn term(&self) -> Option<&Term> {
        self.term.as_ref()
    }

    pub fn rows(&self) -> &[ExpenseRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<ExpenseRow> {
        &mut self.rows
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("upload wizard: {:?} -> {:?}", self.stage(), stage);
        self.stage = stage;
        self.highest = self.highest.max(stage);
    }

    pub fn open(&mut self) -> bool {
        if self.stage() != Stage::Closed {
            return false;
        }
        self.enter(Stage::SelectTerm);
        true
    }

    pub fn advance(&mut self, payload: Option<StagePayload>) -> bool {
        match (self.stage(), payload) {
            (Stage::SelectTerm, Some(StagePayload::Term(term))) => {
                self.term = Some(term);
                self.enter(Stage::UploadFile);
                true
            }
            (Stage::UploadFile, Some(StagePayload::Rows(rows))) if !rows.is_empty() => {
                self.rows = rows;
                self.enter(Stage::ConfirmExpenses);
                true
            }
            _ => false,
        }
    }

    pub fn retreat(&mut self) -> bool {
        match self.stage() {
            Stage::UploadFile => {
                self.enter(Stage::SelectTerm);
                true
            }
            Stage::ConfirmExpenses => {
                self.rows.clear();
                self.enter(Stage::UploadFile);
                true
            }
            Stage::Closed | Stage::SelectTerm => false,
        }
    }

    pub fn close(&mut self) {
        if self.stage() != Stage::Closed {
            log::debug!("upload wizard closed from {:?}", self.stage());
        }
        self.stage = Stage::Closed;
        self.highest = Stage::Closed;
        self.term = None;
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TermStatus;
    use crate::validation::tests::good_row;

    fn term() -> Term {
        Term {
            id: 1,
            name: "Q1 2025".into(),
            start_date: "2025-01-01".into(),
            end_date: "2025-03-31".into(),
            status: TermStatus::InProgress,
        }
    }

    #[test]
    fn test_happy_path() {
        let mut c = StageController::new();
        assert_eq!(c.stage(), Stage::Closed);
        assert!(c.open());
        assert_eq!(c.stage(), Stage::SelectTerm);
        assert!(c.advance(Some(StagePayload::Term(term()))));
        assert_eq!(c.stage(), Stage::UploadFile);
        assert!(c.advance(Some(StagePayload::Rows(vec![good_row(1)]))));
        assert_eq!(c.stage(), Stage::ConfirmExpenses);
        assert_eq!(c.rows().len(), 1);
        assert_eq!(c.term().map(|t| t.id), Some(1));
    }

    #[test]
    fn test_advance_without_payload_is_rejected() {
        let mut c = StageController::new();
        c.open();
        assert!(!c.advance(None));
        assert_eq!(c.stage(), Stage::SelectTerm);
        // Rows are not what stage 1 needs.
        assert!(!c.advance(Some(StagePayload::Rows(vec![good_row(1)]))));
        assert_eq!(c.stage(), Stage::SelectTerm);
        c.advance(Some(StagePayload::Term(term())));
        assert!(!c.advance(Some(StagePayload::Rows(vec![]))));
        assert_eq!(c.stage(), Stage::UploadFile);
    }

    #[test]
    fn test_advance_past_last_stage_or_while_closed_is_noop() {
        let mut c = StageController::new();
        assert!(!c.advance(Some(StagePayload::Term(term()))));
        assert_eq!(c.stage(), Stage::Closed);
        c.open();
        c.advance(Some(StagePayload::Term(term())));
        c.advance(Some(StagePayload::Rows(vec![good_row(1)])));
        assert!(!c.advance(Some(StagePayload::Rows(vec![good_row(2)]))));
        assert_eq!(c.stage(), Stage::ConfirmExpenses);
        assert_eq!(c.rows()[0].id, 1);
    }

    #[test]
    fn test_retreat_rules() {
        let mut c = StageController::new();
        assert!(!c.retreat());
        c.open();
        assert!(!c.retreat());
        assert_eq!(c.stage(), Stage::SelectTerm);
        c.advance(Some(StagePayload::Term(term())));
        c.advance(Some(StagePayload::Rows(vec![good_row(1)])));
        assert!(c.retreat());
        assert_eq!(c.stage(), Stage::UploadFile);
        assert!(c.rows().is_empty());
        assert!(c.retreat());
        assert_eq!(c.stage(), Stage::SelectTerm);
    }

    #[test]
    fn test_stage_never_exceeds_highest_reached() {
        let mut c = StageController::new();
        c.open();
        c.advance(Some(StagePayload::Term(term())));
        c.retreat();
        assert!(c.stage() <= c.highest_reached());
        assert_eq!(c.highest_reached(), Stage::UploadFile);
        c.advance(Some(StagePayload::Term(term())));
        c.advance(Some(StagePayload::Rows(vec![good_row(1)])));
        assert!(c.stage() <= c.highest_reached());
    }

    #[test]
    fn test_close_resets_from_any_stage() {
        let mut c = StageController::new();
        c.open();
        c.advance(Some(StagePayload::Term(term())));
        c.advance(Some(StagePayload::Rows(vec![good_row(1)])));
        c.close();
        assert_eq!(c.stage(), Stage::Closed);
        assert!(c.term().is_none());
        assert!(c.rows().is_empty());
        assert_eq!(c.highest_reached(), Stage::Closed);
    }
}
