//! Terminal User Interface (TUI) rendering and management.
//!
//! This module handles initializing the terminal in raw mode, restoring it on exit,
//! handing it to an external editor and back, and drawing the application state using
//! `ratatui`.

use std::io::{self, Stdout};

use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;

use crate::app::{App, InputMode, StatusLevel};
use crate::output::EntryLevel;
use crate::process::WorkerStatus;

/// Type alias for the specific terminal backend used.
pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const HELP: &str =
    "Tab/1-5 panel | Up/Down action | Enter run | s stop | y copy output | q quit";

/// Enables raw mode, enters the alternate screen, and creates a `ratatui` Terminal instance.
pub fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restores the terminal to its original state.
pub fn restore_terminal(mut terminal: TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Hands the terminal to a child program (the sidecar editor).
pub fn suspend(terminal: &mut TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

/// Takes the terminal back after `suspend`.
pub fn resume(terminal: &mut TuiTerminal) -> io::Result<()> {
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)?;
    terminal.clear()
}

/// Draws the current application state to the terminal.
pub fn draw(app: &App, terminal: &mut TuiTerminal) -> io::Result<()> {
    let title = format!("pycreator - {}", app.selected_panel().kind.title());
    execute!(terminal.backend_mut(), SetTitle(title))?;
    terminal.draw(|frame| {
        let area = frame.size();
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(8),
                Constraint::Length(4),
            ])
            .split(area);
        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
            .split(vertical[0]);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(app.panels.len() as u16 + 2),
                Constraint::Min(1),
            ])
            .split(main[0]);

        let border_style = Style::default().fg(Color::DarkGray);
        let block = |title: String| {
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style)
        };

        let panel_items: Vec<ListItem> = app
            .panels
            .iter()
            .enumerate()
            .map(|(index, panel)| {
                let selected = index == app.selected;
                let status = panel.worker.status();
                let name_style = if selected {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        if selected { "▶ " } else { "  " },
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::styled(format!("[{}] ", status_char(status)), worker_style(status)),
                    Span::styled(format!("{} {}", index + 1, panel.kind.title()), name_style),
                ]))
            })
            .collect();
        let panels = List::new(panel_items).block(block("Panels".to_string()));
        frame.render_stateful_widget(
            panels,
            left[0],
            &mut list_state(app.selected, app.panels.len()),
        );

        let current = app.selected_panel();
        let action_width = left[1].width.saturating_sub(4) as usize;
        let action_items: Vec<ListItem> = current
            .kind
            .actions()
            .iter()
            .map(|action| {
                let label = if action.prompt.is_some() {
                    format!("{}...", action.label)
                } else {
                    action.label.to_string()
                };
                ListItem::new(Line::from(truncate(&label, action_width)))
            })
            .collect();
        let actions = List::new(action_items)
            .block(block("Actions".to_string()))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
            .highlight_symbol("> ");
        frame.render_stateful_widget(
            actions,
            left[1],
            &mut list_state(current.selected, current.kind.actions().len()),
        );

        let details = app.details(current.kind);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(details.len() as u16 + 2),
                Constraint::Min(1),
            ])
            .split(main[1]);
        let detail_lines: Vec<Line> = details
            .into_iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::styled(format!("{:>14}: ", label), Style::default().fg(Color::DarkGray)),
                    Span::raw(value),
                ])
            })
            .collect();
        frame.render_widget(
            Paragraph::new(detail_lines).block(block(current.kind.title().to_string())),
            right[0],
        );

        let output_block = block(output_title(
            current.last_command.as_deref(),
            current.last_success,
        ));
        let output_height = output_block.inner(right[1]).height as usize;
        let skip = current.output.len().saturating_sub(output_height);
        let output_style = match current.last_success {
            Some(false) => Style::default().fg(Color::Red),
            _ => Style::default(),
        };
        let output_lines: Vec<Line> = current
            .output
            .iter()
            .skip(skip)
            .map(|line| Line::from(Span::styled(line.clone(), output_style)))
            .collect();
        frame.render_widget(
            Paragraph::new(output_lines)
                .block(output_block)
                .wrap(Wrap { trim: false }),
            right[1],
        );

        let log_block = block("Log".to_string());
        let log_height = log_block.inner(vertical[1]).height as usize;
        let skip = app.log.len().saturating_sub(log_height);
        let log_lines: Vec<Line> = app
            .log
            .iter()
            .skip(skip)
            .map(|entry| {
                let prefix = entry
                    .panel
                    .map(|panel| format!("[{}] ", panel))
                    .unwrap_or_default();
                let style = match entry.level {
                    EntryLevel::Error => Style::default().fg(Color::Red),
                    EntryLevel::Info => Style::default().fg(Color::Gray),
                    EntryLevel::Output => Style::default(),
                };
                Line::from(vec![
                    Span::styled(prefix, Style::default().fg(Color::DarkGray)),
                    Span::styled(entry.text.clone(), style),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(log_lines).block(log_block), vertical[1]);

        let (help_line, help_style) = if app.input_mode == InputMode::Prompt {
            (
                format!(
                    "{}: {}| Enter to confirm | Esc to cancel",
                    app.prompt_label().unwrap_or("Input"),
                    app.input
                ),
                Style::default().fg(Color::Yellow),
            )
        } else {
            match app.status_message() {
                Some((text, StatusLevel::Error)) => {
                    (text.to_string(), Style::default().fg(Color::Red))
                }
                Some((text, StatusLevel::Info)) => {
                    (text.to_string(), Style::default().fg(Color::Green))
                }
                None => (HELP.to_string(), Style::default().fg(Color::DarkGray)),
            }
        };
        let status = Paragraph::new(Text::from(vec![
            Line::from(Span::raw(app.status_line())),
            Line::from(Span::styled(help_line, help_style)),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border_style),
        );
        frame.render_widget(status, vertical[2]);
    })?;
    Ok(())
}

fn output_title(command: Option<&str>, success: Option<bool>) -> String {
    match (command, success) {
        (Some(name), Some(true)) => format!("Output: {} (ok)", name),
        (Some(name), Some(false)) => format!("Output: {} (failed)", name),
        (Some(name), None) => format!("Output: {} (running)", name),
        (None, _) => "Output".to_string(),
    }
}

fn list_state(selected: usize, len: usize) -> ListState {
    let mut state = ListState::default();
    if len > 0 {
        state.select(Some(selected.min(len - 1)));
    }
    state
}

fn status_char(status: WorkerStatus) -> char {
    match status {
        WorkerStatus::Idle => ' ',
        WorkerStatus::Running => '*',
        WorkerStatus::Cancelled => 'x',
    }
}

fn worker_style(status: WorkerStatus) -> Style {
    match status {
        WorkerStatus::Idle => Style::default().fg(Color::DarkGray),
        WorkerStatus::Running => Style::default().fg(Color::Green),
        WorkerStatus::Cancelled => Style::default().fg(Color::Yellow),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out = text.chars().take(max.saturating_sub(1)).collect::<String>();
    out.push('~');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("Install PyInstaller", 7), "Instal~");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("anything", 0), "");
    }

    #[test]
    fn list_state_clamps_selection() {
        assert_eq!(list_state(9, 3).selected(), Some(2));
        assert_eq!(list_state(0, 0).selected(), None);
    }

    #[test]
    fn output_title_reflects_result() {
        assert_eq!(output_title(Some("pip_list"), Some(false)), "Output: pip_list (failed)");
        assert_eq!(output_title(None, None), "Output");
    }
}
