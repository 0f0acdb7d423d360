use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::models::PoRecord;
use crate::views;

enum RowKind {
    Month,
    Candidate,
    Record(usize),
}

struct Row {
    text: String,
    kind: RowKind,
}

struct AppState {
    records: Vec<PoRecord>,
    rows: Vec<Row>,
    selected: usize,
    scroll_offset: u16,
}

impl AppState {
    fn new(records: &[PoRecord], query: &str) -> Self {
        let buckets = views::month_buckets(records, query);
        let mut flat: Vec<PoRecord> = Vec::new();
        let mut rows: Vec<Row> = Vec::new();

        for bucket in &buckets {
            rows.push(Row {
                text: format!("{} ({})", bucket.label, bucket.key),
                kind: RowKind::Month,
            });
            for group in &bucket.groups {
                let deduped = views::dedup_by_company(group);
                rows.push(Row {
                    text: format!("  {} ({})", group.display, deduped.len()),
                    kind: RowKind::Candidate,
                });
                for record in deduped {
                    let company = views::company_key(&record);
                    let received = if record.received.is_empty() {
                        "no date"
                    } else {
                        record.received.as_str()
                    };
                    rows.push(Row {
                        text: format!("    {} | {}", received, company),
                        kind: RowKind::Record(flat.len()),
                    });
                    flat.push(record);
                }
            }
        }

        Self {
            records: flat,
            rows,
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn current_record(&self) -> Option<&PoRecord> {
        match self.rows.get(self.selected)?.kind {
            RowKind::Record(idx) => self.records.get(idx),
            _ => None,
        }
    }

    fn next(&mut self) {
        if !self.rows.is_empty() && self.selected < self.rows.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run_browse(records: &[PoRecord], query: &str) -> Result<()> {
    let mut state = AppState::new(records, query);
    if state.rows.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                _ => {}
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(60),
        ])
        .split(frame.area());

    // Left panel: month / candidate / record tree
    let items: Vec<ListItem> = state
        .rows
        .iter()
        .map(|row| {
            let style = match row.kind {
                RowKind::Month => Style::default().add_modifier(Modifier::BOLD),
                RowKind::Candidate => Style::default().fg(Color::Cyan),
                RowKind::Record(_) => Style::default(),
            };
            ListItem::new(row.text.clone()).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Purchase Orders ({}) ",
            state.records.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: record detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = Paragraph::new(" j/k:navigate  J/K:scroll  q:quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area[1]);
}

fn build_detail<'a>(state: &'a AppState) -> Text<'a> {
    let Some(record) = state.current_record() else {
        return Text::raw("Select a record");
    };

    let mut lines: Vec<Line> = Vec::new();

    // Header
    lines.push(Line::from(Span::styled(
        record.subject.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));

    if let Some(from) = &record.from {
        lines.push(Line::from(format!("From: {} <{}>", from.name, from.address)));
    }
    if !record.received.is_empty() {
        lines.push(Line::from(format!("Received: {}", record.received)));
    }
    if !record.web_link.is_empty() {
        lines.push(Line::from(format!("Link: {}", record.web_link)));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Extracted",
        Style::default().add_modifier(Modifier::BOLD),
    )));

    let extracted = &record.extracted;
    let fields = [
        ("Candidate", &extracted.candidate_name),
        ("Phone", &extracted.phone_number),
        ("Email", &extracted.email),
        ("Location", &extracted.location),
        ("Position", &extracted.position_applied),
        ("Job Location", &extracted.job_location),
        ("End Client", &extracted.end_client),
        ("Rate", &extracted.rate),
        ("Support By", &extracted.interview_support_by),
        ("Team Lead", &extracted.team_lead),
        ("Manager", &extracted.manager),
    ];
    for (label, value) in &fields {
        lines.push(Line::from(format!(
            "  {:<14}{}",
            format!("{}:", label),
            value.as_deref().unwrap_or("-")
        )));
    }

    if !record.body_preview.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Preview",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(&record.body_preview, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}
