//! Terminal front end: one tab per feature, an input box, a read-only results
//! pane, a status line for warnings and popups for errors.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{execute, terminal};
use ratatui::prelude::*;
use ratatui::widgets::*;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::app::{App, Completion, Job, NotificationLevel, Tab};

const SCROLL_STEP: u16 = 5;

/// What the event loop should do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Submit,
    Quit,
}

pub fn handle_key(app: &mut App, key: KeyEvent) -> Control {
    if app.popup().is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.dismiss_popup();
        }
        return Control::Continue;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Char('c') if ctrl => return Control::Quit,
        KeyCode::Char('u') if ctrl => app.clear_input(),
        KeyCode::Esc => return Control::Quit,
        KeyCode::Tab => app.next_tab(),
        KeyCode::BackTab => app.prev_tab(),
        KeyCode::F(n) => {
            if let Some(tab) = Tab::from_index(n.saturating_sub(1) as usize) {
                app.select_tab(tab);
            }
        }
        KeyCode::Enter if alt => app.insert_char('\n'),
        KeyCode::Enter => return Control::Submit,
        KeyCode::Backspace => app.backspace(),
        KeyCode::PageUp => app.current_mut().output.scroll_up(SCROLL_STEP),
        KeyCode::PageDown => app.current_mut().output.scroll_down(SCROLL_STEP),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        _ => {}
    }
    Control::Continue
}

/// Run the UI until the user quits. Model calls go to `runtime`'s blocking pool.
pub fn run(mut app: App, runtime: Handle) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut term = Terminal::new(backend)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let result = event_loop(&mut term, &mut app, &runtime, tx, rx);

    terminal::disable_raw_mode()?;
    execute!(term.backend_mut(), terminal::LeaveAlternateScreen)?;
    term.show_cursor()?;
    result
}

fn event_loop<B: Backend>(
    term: &mut Terminal<B>,
    app: &mut App,
    runtime: &Handle,
    tx: UnboundedSender<Completion>,
    mut rx: UnboundedReceiver<Completion>,
) -> anyhow::Result<()> {
    loop {
        while let Ok(completion) = rx.try_recv() {
            app.complete(completion);
        }

        term.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match handle_key(app, key) {
                Control::Quit => break,
                Control::Submit => {
                    if let Some(job) = app.submit() {
                        dispatch(runtime, job, tx.clone());
                    }
                }
                Control::Continue => {}
            }
        }
    }
    Ok(())
}

fn dispatch(runtime: &Handle, job: Job, tx: UnboundedSender<Completion>) {
    tracing::debug!(job = job.id, tab = ?job.tab, "dispatching job");
    runtime.spawn_blocking(move || {
        let completion = job.run();
        // Receiver is gone only when the UI has exited
        let _ = tx.send(completion);
    });
}

pub fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Min(6),
            Constraint::Length(3),
        ])
        .split(f.size());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "🌿 Multi-Task NLP Professional Suite",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            "Advanced Natural Language Processing & AI Tools",
            Style::default().fg(Color::Gray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| Line::raw(format!("F{} {}", i + 1, t.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.active.index())
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[1]);

    render_input(f, app, chunks[2]);
    render_output(f, app, chunks[3]);
    render_status(f, app, chunks[4]);

    if let Some(note) = app.popup() {
        let area = centered_rect(60, 30, f.size());
        let color = match note.level {
            NotificationLevel::Error => Color::Red,
            NotificationLevel::Warning => Color::Yellow,
            NotificationLevel::Info => Color::Blue,
        };
        let popup = Paragraph::new(vec![
            Line::raw(note.message.clone()),
            Line::raw(""),
            Line::styled("Enter/Esc to dismiss", Style::default().fg(Color::Gray)),
        ])
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(note.title.clone()),
        );
        f.render_widget(Clear, area);
        f.render_widget(popup, area);
    }
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let tab = app.active;
    let state = app.current();
    let title = format!("{} (Enter: {})", tab.input_title(), tab.action_label());

    let body: Vec<Line> = if state.input.is_empty() {
        vec![Line::styled(
            placeholder(tab, app.mask_token()),
            Style::default().fg(Color::DarkGray),
        )]
    } else {
        let mut lines: Vec<Line> = state.input.split('\n').map(Line::raw).collect();
        if let Some(last) = lines.last_mut() {
            last.spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
        }
        lines
    };

    let input = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(input, area);
}

fn render_output(f: &mut Frame, app: &App, area: Rect) {
    let tab = app.active;
    let state = app.current();
    let mut title = format!("{} (PgUp/PgDn)", tab.output_title());
    if app.is_busy(tab) {
        title.push_str(" running…");
    }

    let body = if state.output.is_empty() && tab == Tab::Image {
        Text::styled(
            "Generated image will appear here",
            Style::default().fg(Color::DarkGray),
        )
    } else {
        Text::raw(state.output.content())
    };

    let output = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .scroll((state.output.scroll(), 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(output, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.status() {
        Some(note) => Line::styled(
            format!("{}: {}", note.title, note.message),
            Style::default().fg(Color::Yellow),
        ),
        None => Line::raw(
            "Keys: Tab/F1-F4 switch • Enter run • Alt+Enter newline • Ctrl+U clear • Esc quit",
        ),
    };
    let status = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn placeholder(tab: Tab, mask_token: &str) -> String {
    match tab {
        Tab::Environment => "Type text to check for environmental topics".to_string(),
        Tab::Image => "Describe the image you want".to_string(),
        Tab::Entities => "Type text to find people, places and organisations".to_string(),
        Tab::FillMask => format!(
            "Enter text with {mask_token} tokens (e.g., 'The earth is {mask_token}.')"
        ),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
