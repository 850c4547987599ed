use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::events;
use crate::jobs::JobsStore;
use crate::kv::KvStore;
use crate::models::{Job, JobStatus, User};

struct BoardState {
    jobs: Vec<Job>,
    stage_idx: usize,
    selected: usize,
    scroll_offset: u16,
}

impl BoardState {
    fn new(jobs: Vec<Job>) -> Self {
        Self {
            jobs,
            stage_idx: 0,
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn stage(&self) -> JobStatus {
        JobStatus::ALL[self.stage_idx]
    }

    fn stage_jobs(&self) -> Vec<&Job> {
        self.jobs
            .iter()
            .filter(|j| j.status == self.stage())
            .collect()
    }

    fn current_job(&self) -> Option<&Job> {
        self.stage_jobs().into_iter().nth(self.selected)
    }

    fn next(&mut self) {
        let count = self.stage_jobs().len();
        if count > 0 && self.selected < count - 1 {
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

    fn next_stage(&mut self) {
        self.stage_idx = (self.stage_idx + 1) % JobStatus::ALL.len();
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn prev_stage(&mut self) {
        self.stage_idx = (self.stage_idx + JobStatus::ALL.len() - 1) % JobStatus::ALL.len();
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run_board(kv: &KvStore, user: &User) -> Result<()> {
    let store = JobsStore::new(kv);
    let jobs = store.all();
    if jobs.is_empty() {
        println!("No jobs to show.");
        return Ok(());
    }

    let mut state = BoardState::new(jobs);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, kv, user);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut BoardState,
    kv: &KvStore,
    user: &User,
) -> Result<()> {
    let store = JobsStore::new(kv);
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let mut move_to: Option<JobStatus> = None;
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Right | KeyCode::Char('l') => state.next_stage(),
                KeyCode::Left | KeyCode::Char('h') => state.prev_stage(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('o') => move_to = Some(JobStatus::Open),
                KeyCode::Char('a') => move_to = Some(JobStatus::Applied),
                KeyCode::Char('g') => move_to = Some(JobStatus::Assigned),
                KeyCode::Char('i') => move_to = Some(JobStatus::InProgress),
                KeyCode::Char('c') => move_to = Some(JobStatus::Completed),
                KeyCode::Char('p') => move_to = Some(JobStatus::Paid),
                KeyCode::Char('d') => move_to = Some(JobStatus::Disputed),
                _ => {}
            }

            if let Some(status) = move_to {
                if let Some(job) = state.current_job() {
                    let id = job.id.clone();
                    if let Ok((_, evts)) = store.update_job_status(&id, status, &user.name) {
                        let _ = events::dispatch(kv, &evts);
                    }
                    state.jobs = store.all();
                    let count = state.stage_jobs().len();
                    if count == 0 {
                        state.selected = 0;
                    } else if state.selected >= count {
                        state.selected = count - 1;
                    }
                }
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn stage_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Open => Style::default().fg(Color::Green),
        JobStatus::Applied => Style::default().fg(Color::Cyan),
        JobStatus::Assigned => Style::default().fg(Color::Blue),
        JobStatus::InProgress => Style::default().fg(Color::Yellow),
        JobStatus::Completed => Style::default().fg(Color::Magenta),
        JobStatus::Paid => Style::default().fg(Color::DarkGray),
        JobStatus::Disputed => Style::default().fg(Color::Red),
    }
}

fn draw(frame: &mut Frame, state: &BoardState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(frame.area());

    // Left panel: jobs in the selected stage
    let items: Vec<ListItem> = state
        .stage_jobs()
        .iter()
        .map(|job| {
            let title = crate::truncate(&job.title, 30);
            let live = if job.is_published { "+" } else { " " };
            ListItem::new(format!("{} {} | {}", live, title, job.advertiser_name))
        })
        .collect();

    let counts: Vec<String> = JobStatus::ALL
        .iter()
        .map(|s| {
            let n = state.jobs.iter().filter(|j| j.status == *s).count();
            if *s == state.stage() {
                format!("[{s}:{n}]")
            } else {
                format!(" {s}:{n} ")
            }
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", counts.join(""))),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: job detail
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

    let help = Paragraph::new(
        " h/l:stage  j/k:job  J/K:scroll  o/a/g/i/c/p/d:move to stage  q:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area[1]);
}

fn build_detail<'a>(state: &'a BoardState) -> Text<'a> {
    let Some(job) = state.current_job() else {
        return Text::raw("No job in this stage");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &*job.title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("posted by {}", job.advertiser_name)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", job.status),
        stage_style(job.status),
    )));
    lines.push(Line::from(format!(
        "Published: {}   Category: {}",
        if job.is_published { "yes" } else { "no" },
        job.category
    )));

    match (job.technician_earnings(), job.advertiser_earnings()) {
        (Some(tech), Some(adv)) => {
            lines.push(Line::from(format!(
                "Tech earns ${tech:.2}  /  Advertiser earns ${adv:.2}"
            )));
        }
        (Some(tech), None) => lines.push(Line::from(format!("Tech earns ${tech:.2}"))),
        _ => {}
    }

    if let Some(name) = &job.assigned_technician_name {
        lines.push(Line::from(format!("Assigned to {name}")));
    }
    if !job.applicants.is_empty() {
        lines.push(Line::from(format!("{} applicant(s)", job.applicants.len())));
    }

    lines.push(Line::from(""));
    if !job.description.is_empty() {
        for line in textwrap::fill(&job.description, 70).lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::from(""));
    }

    if !job.activity_log.is_empty() {
        lines.push(Line::from(Span::styled(
            "ACTIVITY",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for entry in &job.activity_log {
            let details = entry.details.as_deref().unwrap_or("");
            lines.push(Line::from(format!(
                "  {} {} {} {}",
                entry.timestamp, entry.user, entry.action, details
            )));
        }
    }

    Text::from(lines)
}
