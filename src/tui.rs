use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::Frame;

use crate::error::Result;
use crate::workflow::Toast;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

pub const CURSOR_STYLE: Style = Style::new().fg(Color::Cyan);

pub const INVALID_STYLE: Style = Style::new().fg(Color::Red);

pub const SUCCESS_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));

pub const WARNING_STYLE: Style = Style::new().fg(Color::Yellow);

pub fn toast_span(toast: &Toast) -> Span<'static> {
    let style = match toast {
        Toast::Success(_) => SUCCESS_STYLE,
        Toast::Warning(_) => WARNING_STYLE,
        Toast::Failure(_) => INVALID_STYLE,
    };
    Span::styled(format!(" {}", toast.message()), style)
}

/// Wrap text to a given width. Returns (wrapped_string, line_count).
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    if width == 0 {
        return (text.to_string(), 1);
    }
    let wrapped = textwrap::fill(text, width);
    let lines = wrapped.lines().count().max(1) as u16;
    (wrapped, lines)
}

pub enum ScreenAction {
    Continue,
    Close,
}

pub trait Screen {
    fn draw(&mut self, frame: &mut Frame);
    fn handle_key(&mut self, key: KeyEvent) -> ScreenAction;
}

/// Run an interactive screen. Sets up the terminal, event loop and panic
/// hook, then restores the terminal on exit.
pub fn run_screen(screen: &mut dyn Screen) -> Result<()> {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));

    let mut terminal = ratatui::init();

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| screen.draw(frame)) {
            break Err(e.into());
        }

        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c')
                {
                    break Ok(());
                }
                match screen.handle_key(key) {
                    ScreenAction::Close => break Ok(()),
                    ScreenAction::Continue => {}
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    result
}
