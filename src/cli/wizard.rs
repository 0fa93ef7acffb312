use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table},
    Frame,
};
use rusqlite::Connection;

use crate::cache::{QueryCache, SubscriptionId, Tag};
use crate::error::Result;
use crate::expense::Column;
use crate::settings::{load_settings, shellexpand_path};
use crate::stage::Stage;
use crate::store::{is_duplicate_upload, load_reference_data, record_upload, term_summaries, TermSummary};
use crate::submission::SqliteSink;
use crate::tui::{
    self, toast_span, Screen, ScreenAction, CURSOR_STYLE, FOOTER_STYLE, HEADER_STYLE, INVALID_STYLE,
    SELECTED_STYLE,
};
use crate::workflow::{Toast, UploadSession};

const TERMS_KEY: &str = "terms/summaries";

enum InputMode {
    Normal,
    PlanName,
    EditCell { id: i64, column: Column, buffer: String },
}

pub struct UploadWizard<'a> {
    conn: &'a Connection,
    session: UploadSession,
    terms: QueryCache<Vec<TermSummary>>,
    terms_sub: SubscriptionId,
    term_idx: usize,
    file_input: String,
    plan_name: String,
    cursor: usize,
    mode: InputMode,
    toast: Option<Toast>,
}

impl<'a> UploadWizard<'a> {
    pub fn new(conn: &'a Connection, page_size: usize) -> Result<Self> {
        let mut session = UploadSession::new(load_reference_data(conn)?, page_size);
        session.open();
        let mut terms = QueryCache::new();
        let terms_sub = terms.subscribe(TERMS_KEY);
        Ok(Self {
            conn,
            session,
            terms,
            terms_sub,
            term_idx: 0,
            file_input: String::new(),
            plan_name: String::new(),
            cursor: 0,
            mode: InputMode::Normal,
            toast: None,
        })
    }

    fn term_list(&mut self) -> Vec<TermSummary> {
        if self.terms.take_notification(self.terms_sub) {
            self.term_idx = 0;
        }
        let conn = self.conn;
        match self
            .terms
            .get_or_fetch(TERMS_KEY, &[Tag::Terms, Tag::Plans], || term_summaries(conn))
        {
            Ok(list) => list.clone(),
            Err(e) => {
                self.toast = Some(Toast::Failure(format!("Could not load terms: {e}")));
                Vec::new()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn draw_stage_bar(&self, frame: &mut Frame, area: Rect) {
        let current = self.session.stage();
        let mut spans = vec![Span::raw(" ")];
        for stage in [Stage::SelectTerm, Stage::UploadFile, Stage::ConfirmExpenses] {
            let style = if stage == current {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else if stage < current {
                Style::default().fg(Color::Green)
            } else {
                FOOTER_STYLE
            };
            spans.push(Span::styled(format!("{}. {}", stage.number(), stage.title()), style));
            if stage != Stage::ConfirmExpenses {
                spans.push(Span::styled("  \u{203a}  ", FOOTER_STYLE));
            }
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_select_term(&mut self, frame: &mut Frame, area: Rect) -> &'static str {
        let terms = self.term_list();
        let mut lines = vec![Line::from("")];
        if terms.is_empty() {
            lines.push(Line::from("   No terms found. Add one with `finplan terms add`."));
        }
        for (i, summary) in terms.iter().enumerate() {
            let t = &summary.term;
            let marker = if i == self.term_idx { "\u{25b8} " } else { "  " };
            let style = if !t.status.accepts_uploads() {
                FOOTER_STYLE
            } else if i == self.term_idx {
                CURSOR_STYLE
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!(
                    "   {marker}{:<20} {} \u{2192} {}   {:<12} {} plan(s)",
                    t.name, t.start_date, t.end_date, t.status.to_string(), summary.plan_count
                ),
                style,
            )));
        }
        frame.render_widget(Paragraph::new(lines), area);
        " Up/Down=term  Enter=next  Esc=quit"
    }

    fn draw_upload(&self, frame: &mut Frame, area: Rect) -> &'static str {
        let term = self.session.term().map(|t| t.name.as_str()).unwrap_or("");
        let lines = vec![
            Line::from(""),
            Line::from(format!("   Term           {term}")),
            Line::from(vec![
                Span::styled("   File path      ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(format!("{}_", self.file_input), CURSOR_STYLE),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                "   CSV or Excel with columns: Expense, Cost Type, Unit Price, Amount, Project, Supplier, PIC, Notes, Currency",
                FOOTER_STYLE,
            )),
        ];
        frame.render_widget(Paragraph::new(lines), area);
        " Enter=upload  Esc=back"
    }

    fn draw_confirm(&self, frame: &mut Frame, area: Rect) -> &'static str {
        let [summary_area, table_area, detail_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        let invalid = self.session.invalid_count();
        let plan_name = match &self.mode {
            InputMode::PlanName => format!("{}_", self.plan_name),
            _ if self.plan_name.is_empty() => "(default)".to_string(),
            _ => self.plan_name.clone(),
        };
        let summary = vec![
            Line::from(vec![
                Span::raw(format!(
                    "   {} rows, page {}/{}, {} selected   ",
                    self.session.rows().len(),
                    self.session.page() + 1,
                    self.session.page_count(),
                    self.session.selection().len()
                )),
                if invalid > 0 {
                    Span::styled(format!("{invalid} invalid"), INVALID_STYLE)
                } else {
                    Span::styled("all rows valid", tui::SUCCESS_STYLE)
                },
            ]),
            Line::from(format!("   Plan name: {plan_name}")),
        ];
        frame.render_widget(Paragraph::new(summary), summary_area);

        let notes_width = table_area.width.saturating_sub(2 + 4 + 20 + 12 + 14 + 6 + 18 + 12 + 8) as usize;
        let rows: Vec<Row> = self
            .session
            .page_rows()
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mark = if self.session.selection().is_selected(r.id) { "\u{25cf}" } else { " " };
                let (notes, height) = tui::wrap_text(&r.notes, notes_width.max(8));
                let mut style = if r.is_valid() { Style::default() } else { INVALID_STYLE };
                if i == self.cursor {
                    style = style.patch(SELECTED_STYLE);
                }
                Row::new(vec![
                    Cell::from(mark),
                    Cell::from(r.id.to_string()),
                    Cell::from(r.name.clone()),
                    Cell::from(r.cost_type.clone()),
                    Cell::from(r.unit_price.clone()),
                    Cell::from(r.amount.clone()),
                    Cell::from(r.display_total()),
                    Cell::from(r.pic.clone()),
                    Cell::from(r.project.clone()),
                    Cell::from(notes),
                ])
                .height(height)
                .style(style)
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Length(2),
                Constraint::Length(4),
                Constraint::Length(20),
                Constraint::Length(12),
                Constraint::Length(14),
                Constraint::Length(6),
                Constraint::Length(18),
                Constraint::Length(12),
                Constraint::Length(8),
                Constraint::Fill(1),
            ],
        )
        .header(
            Row::new(vec!["", "#", "Expense", "Cost Type", "Unit Price", "Qty", "Total", "PIC", "Project", "Notes"])
                .style(HEADER_STYLE)
                .bottom_margin(1),
        );
        frame.render_widget(table, table_area);

        let detail = match &self.mode {
            InputMode::EditCell { id, column, buffer } => Paragraph::new(format!(
                "   Row {id} {}: {buffer}_",
                column.header()
            ))
            .style(CURSOR_STYLE),
            _ => Paragraph::new(
                self.session
                    .page_rows()
                    .get(self.cursor)
                    .and_then(|r| r.first_error().map(|e| format!("   Row {}: {e}", r.id)))
                    .unwrap_or_default(),
            )
            .style(INVALID_STYLE),
        };
        frame.render_widget(detail, detail_area);

        match self.mode {
            InputMode::PlanName => " Type plan name  Enter=done  Esc=cancel",
            InputMode::EditCell { .. } => " Type value  Tab=apply+next field  Enter=apply  Esc=cancel",
            InputMode::Normal => {
                " Space=select  X=range  a=all  e=edit  d=remove  PgUp/PgDn=page  n=plan name  Enter=submit  Esc=back"
            }
        }
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    fn handle_select_term(&mut self, code: KeyCode) -> ScreenAction {
        let terms = self.term_list();
        match code {
            KeyCode::Esc | KeyCode::Char('q') => return ScreenAction::Close,
            KeyCode::Up => self.term_idx = self.term_idx.saturating_sub(1),
            KeyCode::Down => {
                if self.term_idx + 1 < terms.len() {
                    self.term_idx += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(summary) = terms.get(self.term_idx) {
                    if !self.session.choose_term(summary.term.clone()) {
                        self.toast = Some(Toast::Warning(format!(
                            "Term {} is closed for uploads",
                            summary.term.name
                        )));
                    }
                }
            }
            _ => {}
        }
        ScreenAction::Continue
    }

    fn handle_upload(&mut self, code: KeyCode) -> ScreenAction {
        match code {
            KeyCode::Esc => {
                self.session.retreat();
            }
            KeyCode::Char(c) => self.file_input.push(c),
            KeyCode::Backspace => {
                self.file_input.pop();
            }
            KeyCode::Enter => {
                let raw = self.file_input.trim();
                if raw.is_empty() {
                    self.toast = Some(Toast::Warning("File path is required".into()));
                    return ScreenAction::Continue;
                }
                let path = PathBuf::from(shellexpand_path(raw));
                if !path.exists() {
                    self.toast = Some(Toast::Warning(format!("File not found: {}", path.display())));
                    return ScreenAction::Continue;
                }
                match self.session.load_file(&path) {
                    Err(e) => self.toast = Some(Toast::Failure(format!("Upload failed: {e}"))),
                    Ok(invalid) => {
                        self.cursor = 0;
                        self.toast = Some(self.loaded_toast(invalid));
                    }
                }
            }
            _ => {}
        }
        ScreenAction::Continue
    }

    fn loaded_toast(&self, invalid: usize) -> Toast {
        let duplicate = match (self.session.term(), self.session.file()) {
            (Some(term), Some(file)) => match is_duplicate_upload(self.conn, term.id, &file.checksum) {
                Ok(duplicate) => duplicate,
                Err(e) => {
                    log::warn!("could not check upload history: {e}");
                    false
                }
            },
            _ => false,
        };
        if duplicate {
            Toast::Warning("This file was already uploaded for this term".into())
        } else if invalid > 0 {
            Toast::Warning(format!("{invalid} row(s) need attention before submitting"))
        } else {
            Toast::Success(format!("{} rows ready", self.session.rows().len()))
        }
    }

    /// Start editing the cursor row at its first invalid field.
    fn begin_edit(&mut self) {
        let Some(row) = self.session.page_rows().get(self.cursor) else {
            return;
        };
        let column = row
            .validation
            .as_ref()
            .and_then(|v| v.field_errors.keys().next().copied())
            .unwrap_or(Column::Name);
        self.mode = InputMode::EditCell {
            id: row.id,
            column,
            buffer: row.cell(column).to_string(),
        };
    }

    fn handle_edit(&mut self, code: KeyCode) {
        let InputMode::EditCell { id, column, buffer } = &mut self.mode else {
            return;
        };
        match code {
            KeyCode::Esc => self.mode = InputMode::Normal,
            KeyCode::Enter => {
                let (id, column, value) = (*id, *column, buffer.clone());
                self.mode = InputMode::Normal;
                if self.session.update_cell(id, column, &value) {
                    let fixed = self
                        .session
                        .rows()
                        .iter()
                        .find(|r| r.id == id)
                        .is_some_and(|r| r.is_valid());
                    if fixed {
                        self.toast = Some(Toast::Success(format!("Row {id} is valid")));
                    }
                }
            }
            KeyCode::Tab => {
                let pos = Column::UPLOAD.iter().position(|c| *c == *column).unwrap_or(0);
                let next = Column::UPLOAD[(pos + 1) % Column::UPLOAD.len()];
                let (id, column, typed) = (*id, *column, buffer.clone());
                self.session.update_cell(id, column, &typed);
                let value = self
                    .session
                    .rows()
                    .iter()
                    .find(|r| r.id == id)
                    .map(|r| r.cell(next).to_string())
                    .unwrap_or_default();
                self.mode = InputMode::EditCell {
                    id,
                    column: next,
                    buffer: value,
                };
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            _ => {}
        }
    }

    fn handle_confirm(&mut self, key: KeyEvent) -> ScreenAction {
        if let InputMode::EditCell { .. } = self.mode {
            self.handle_edit(key.code);
            return ScreenAction::Continue;
        }
        if let InputMode::PlanName = self.mode {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.mode = InputMode::Normal,
                KeyCode::Char(c) => self.plan_name.push(c),
                KeyCode::Backspace => {
                    self.plan_name.pop();
                }
                _ => {}
            }
            return ScreenAction::Continue;
        }

        let page_len = self.session.page_rows().len();
        let cursor_id = self.session.page_rows().get(self.cursor).map(|r| r.id);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Esc => {
                if !self.session.selection().is_empty() {
                    self.session.selection_mut().clear();
                } else {
                    self.session.retreat();
                }
            }
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.cursor + 1 < page_len {
                    self.cursor += 1;
                }
            }
            KeyCode::Char(' ') => {
                if let Some(id) = cursor_id {
                    self.session.selection_mut().click(id, shift);
                }
            }
            KeyCode::Char('X') => {
                if let Some(id) = cursor_id {
                    self.session.selection_mut().click(id, true);
                }
            }
            KeyCode::Char('a') => self.session.selection_mut().select_all(),
            KeyCode::Char('d') | KeyCode::Delete => {
                let removed = if self.session.selection().is_empty() {
                    cursor_id.map_or(0, |id| usize::from(self.session.remove_row(id)))
                } else {
                    self.session.remove_selected()
                };
                if removed > 0 {
                    self.toast = Some(Toast::Success(format!("Removed {removed} row(s)")));
                }
                if self.session.rows().is_empty() {
                    self.session.retreat();
                }
                self.cursor = self.cursor.min(self.session.page_rows().len().saturating_sub(1));
            }
            KeyCode::PageDown => {
                if self.session.next_page() {
                    self.cursor = 0;
                }
            }
            KeyCode::PageUp => {
                if self.session.prev_page() {
                    self.cursor = 0;
                }
            }
            KeyCode::Char('n') => self.mode = InputMode::PlanName,
            KeyCode::Char('e') => self.begin_edit(),
            KeyCode::Enter => self.submit(),
            _ => {}
        }
        ScreenAction::Continue
    }

    fn submit(&mut self) {
        let term_id = self.session.term().map(|t| t.id);
        let file = self.session.file().cloned();
        let row_count = self.session.rows().len();
        let sink = SqliteSink::new(self.conn);
        let plan_name = Some(self.plan_name.as_str());
        let outcome = self.session.submit(&sink, plan_name);

        if let (Some(receipt), Some(term_id), Some(file)) = (&outcome.receipt, term_id, file) {
            if let Err(e) = record_upload(
                self.conn,
                &file.filename,
                term_id,
                receipt.plan_id,
                row_count,
                &file.checksum,
            ) {
                log::warn!("could not record upload history: {e}");
            }
            self.terms.invalidate(Tag::Plans);
            self.file_input.clear();
            self.plan_name.clear();
            self.cursor = 0;
            self.session.open();
        }
        self.toast = Some(outcome.toast);
    }
}

impl Screen for UploadWizard<'_> {
    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);

        let [header_area, stage_area, sep, content_area, toast_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(" Upload expense plan").style(HEADER_STYLE),
            header_area,
        );
        self.draw_stage_bar(frame, stage_area);

        let sep_line = "\u{2501}".repeat(area.width as usize);
        frame.render_widget(Paragraph::new(sep_line.as_str()).style(border_style), sep);

        let hints = match self.session.stage() {
            Stage::Closed | Stage::SelectTerm => self.draw_select_term(frame, content_area),
            Stage::UploadFile => self.draw_upload(frame, content_area),
            Stage::ConfirmExpenses => self.draw_confirm(frame, content_area),
        };

        if let Some(toast) = &self.toast {
            frame.render_widget(Paragraph::new(Line::from(toast_span(toast))), toast_area);
        }
        frame.render_widget(Paragraph::new(hints).style(FOOTER_STYLE), hints_area);
    }

    fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        if matches!(self.mode, InputMode::Normal) {
            self.toast = None;
        }
        match self.session.stage() {
            Stage::Closed => ScreenAction::Close,
            Stage::SelectTerm => self.handle_select_term(key.code),
            Stage::UploadFile => self.handle_upload(key.code),
            Stage::ConfirmExpenses => self.handle_confirm(key),
        }
    }
}

pub fn run() -> Result<()> {
    let settings = load_settings();
    let conn = super::open_db()?;
    let mut wizard = UploadWizard::new(&conn, settings.page_size)?;
    tui::run_screen(&mut wizard)
}
