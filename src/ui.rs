use crate::config::PlannerConfig;
use crate::planner::{build_grid, hour_note, set_hour_note, toggle_block, BlockCell, PlannerGrid};
use crate::schedule::format_hour_label;
use crate::settings::{save_sleep_settings, SleepSettings};
use crate::storage::FileStore;
use anyhow::Result;
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

pub fn run(store: FileStore, config: PlannerConfig) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(store, config);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    store: FileStore,
    config: PlannerConfig,
    grid: PlannerGrid,
    cursor_row: usize,
    cursor_col: usize,
    row_offset: usize,
    last_refresh: Instant,
    last_save: Option<Instant>,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    Settings(SettingsForm),
    Note { hour: u32, field: FieldValue },
}

struct SettingsForm {
    start: FieldValue,
    end: FieldValue,
    field: SettingsField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum SettingsField {
    Start,
    End,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }

    /// Shared key handling for single-line fields. Returns false if the key was not
    /// an editing key.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.len(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert_char(c)
            }
            _ => return false,
        }
        true
    }
}

impl SettingsForm {
    fn new(raw: SleepSettings) -> Self {
        SettingsForm {
            start: FieldValue::new(&raw.start),
            end: FieldValue::new(&raw.end),
            field: SettingsField::Start,
        }
    }

    fn switch_field(&mut self) {
        self.field = match self.field {
            SettingsField::Start => SettingsField::End,
            SettingsField::End => SettingsField::Start,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            SettingsField::Start => &mut self.start,
            SettingsField::End => &mut self.end,
        }
    }
}

impl App {
    fn new(store: FileStore, config: PlannerConfig) -> Self {
        let grid = build_grid(&store, &config, &Local::now());
        let (cursor_row, cursor_col) = grid.current_position().unwrap_or((0, 0));
        let status = format!("Loaded planner from {}", store.location().path.display());
        App {
            store,
            config,
            grid,
            cursor_row,
            cursor_col,
            row_offset: 0,
            last_refresh: Instant::now(),
            last_save: None,
            status,
            mode: Mode::Normal,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            if self.refresh_due(Instant::now()) {
                self.refresh();
            }
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn refresh_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_refresh) >= self.config.refresh_interval()
    }

    /// Rebuilds the grid from the store and the live clock.
    fn refresh(&mut self) {
        let previous_current = self.grid.current_position();
        let on_current = previous_current == Some((self.cursor_row, self.cursor_col));
        self.grid = build_grid(&self.store, &self.config, &Local::now());
        self.last_refresh = Instant::now();
        if on_current {
            self.jump_to_current();
        }
        self.clamp_cursor();
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Settings(_) => {
                self.handle_settings_key(key);
                false
            }
            Mode::Note { .. } => {
                self.handle_note_key(key);
                false
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Left | KeyCode::Char('h') => {
                self.cursor_col = self.cursor_col.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') => self.cursor_col += 1,
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor_row = self.cursor_row.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => self.cursor_row += 1,
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(),
            KeyCode::Char('g') => {
                self.jump_to_current();
                self.status = "Jumped to the current block".into();
            }
            KeyCode::Char('r') => {
                self.refresh();
                self.status = "Refreshed".into();
            }
            KeyCode::Char('s') => {
                let raw = SleepSettings::load(&self.store, &self.config);
                self.mode = Mode::Settings(SettingsForm::new(raw));
                self.status = "Editing sleep window (Tab switch, Enter save, Esc cancel)".into();
            }
            KeyCode::Char('n') => {
                if let Some(row) = self.grid.rows.get(self.cursor_row) {
                    let hour = row.hour;
                    let existing = hour_note(&self.store, hour).unwrap_or_default();
                    self.mode = Mode::Note {
                        hour,
                        field: FieldValue::new(&existing),
                    };
                    self.status = format!("Note for {} (Enter save, Esc cancel)", row.label);
                }
            }
            _ => {}
        }
        self.clamp_cursor();
        false
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let mut close = false;
        if let Mode::Settings(form) = &mut mode {
            match key.code {
                KeyCode::Esc => {
                    close = true;
                    self.status = "Canceled".into();
                }
                KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                    form.switch_field()
                }
                KeyCode::Enter => {
                    match save_sleep_settings(&mut self.store, &form.start.value, &form.end.value) {
                        Ok(window) => {
                            close = true;
                            self.last_save = Some(Instant::now());
                            self.refresh();
                            self.jump_to_current();
                            self.status = format!(
                                "Sleep window saved: {}-{}",
                                format_hour_label(window.start),
                                format_hour_label(window.end)
                            );
                        }
                        Err(err) => {
                            tracing::warn!("rejected sleep settings: {:#}", err);
                            self.status = format!("Could not save: {}", err);
                        }
                    }
                }
                _ => {
                    form.active_field_mut().handle_key(key);
                }
            }
        }
        self.mode = if close { Mode::Normal } else { mode };
    }

    fn handle_note_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let mut close = false;
        if let Mode::Note { hour, field } = &mut mode {
            match key.code {
                KeyCode::Esc => {
                    close = true;
                    self.status = "Canceled".into();
                }
                KeyCode::Enter => match set_hour_note(&mut self.store, *hour, &field.value) {
                    Ok(()) => {
                        close = true;
                        self.last_save = Some(Instant::now());
                        self.refresh();
                        self.status = format!("Saved note for {}", format_hour_label(*hour));
                    }
                    Err(err) => {
                        tracing::error!("saving note failed: {:#}", err);
                        self.status = format!("Could not save note: {}", err);
                    }
                },
                _ => {
                    field.handle_key(key);
                }
            }
        }
        self.mode = if close { Mode::Normal } else { mode };
    }

    fn toggle_selected(&mut self) {
        let key = match self.selected_cell() {
            Some(cell) => cell.key,
            None => return,
        };
        match toggle_block(&mut self.store, key) {
            Ok(active) => {
                self.last_save = Some(Instant::now());
                self.refresh();
                self.status = format!("{} {}", key, if active { "planned" } else { "cleared" });
            }
            Err(err) => {
                tracing::error!("toggle failed: {:#}", err);
                self.status = format!("Toggle failed: {}", err);
            }
        }
    }

    fn selected_cell(&self) -> Option<&BlockCell> {
        self.grid.cell(self.cursor_row, self.cursor_col)
    }

    fn jump_to_current(&mut self) {
        if let Some((row, col)) = self.grid.current_position() {
            self.cursor_row = row;
            self.cursor_col = col;
        }
    }

    fn clamp_cursor(&mut self) {
        let rows = self.grid.rows.len();
        let cols = self.grid.blocks_per_hour as usize;
        self.cursor_row = self.cursor_row.min(rows.saturating_sub(1));
        self.cursor_col = self.cursor_col.min(cols.saturating_sub(1));
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_grid(f, layout[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Settings(form) => self.draw_settings(f, form),
            Mode::Note { hour, field } => self.draw_note(f, *hour, field),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let location = self.store.location();
        let saved = self
            .last_save
            .map(|t| format!("saved {}", format_elapsed(t)))
            .unwrap_or_else(|| "no changes".into());
        let title = Line::from(vec![
            Span::styled(
                "dayplan ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                Local::now().format("%H:%M").to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!(
                    "sleep {}-{}",
                    format_hour_label(self.grid.sleep.start),
                    format_hour_label(self.grid.sleep.end)
                ),
                Style::default().fg(Color::LightBlue),
            ),
            Span::raw("  •  "),
            Span::styled(location.scope.label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", location.path.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(saved, Style::default().fg(Color::Gray)),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_grid(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                format!(
                    "{} blocks of {} min  •  {} planned",
                    self.grid.blocks_per_hour,
                    self.config.minutes_per_block(),
                    self.grid.active_count()
                ),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
        let viewport = area.height.saturating_sub(2) as usize;
        self.row_offset = adjust_offset(
            self.cursor_row,
            self.row_offset,
            viewport,
            2,
            self.grid.rows.len(),
        );

        let lines = self
            .grid
            .rows
            .iter()
            .enumerate()
            .skip(self.row_offset)
            .take(viewport)
            .map(|(row_idx, row)| {
                let label_style = if row_idx == self.cursor_row {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                let mut spans = vec![Span::styled(format!("{} ", row.label), label_style)];
                for (col_idx, cell) in row.blocks.iter().enumerate() {
                    let selected = row_idx == self.cursor_row && col_idx == self.cursor_col;
                    spans.push(block_span(cell, selected));
                    spans.push(Span::raw(" "));
                }
                if let Some(note) = &row.note {
                    spans.push(Span::styled(
                        format!(" {}", note),
                        Style::default().fg(Color::LightYellow),
                    ));
                }
                Line::from(spans)
            })
            .collect::<Vec<_>>();

        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::LightCyan));
        let help = Line::from(vec![
            key("space"),
            Span::raw(" toggle  "),
            key("g"),
            Span::raw(" now  "),
            key("s"),
            Span::raw(" sleep  "),
            key("n"),
            Span::raw(" note  "),
            key("r"),
            Span::raw(" refresh  "),
            key("q"),
            Span::raw(" quit"),
        ]);
        let help_bar = Paragraph::new(help).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail = Paragraph::new(self.selection_detail())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title("Selected"),
            );
        f.render_widget(detail, bottom[1]);
    }

    fn selection_detail(&self) -> Line<'static> {
        let cell = match self.selected_cell() {
            Some(cell) => cell,
            None => return Line::from("nothing selected"),
        };
        let minutes = self.config.minutes_per_block();
        let start = cell.key.block * minutes;
        let mut tags = Vec::new();
        if cell.flags.current {
            tags.push("now");
        }
        if cell.flags.past {
            tags.push("past");
        }
        if cell.flags.sleep {
            tags.push("sleep");
        }
        if cell.flags.active {
            tags.push("planned");
        }
        Line::from(vec![
            Span::styled(
                format!(
                    "{:02}:{:02}-{:02}:{:02}",
                    cell.key.hour,
                    start,
                    (cell.key.hour + (start + minutes) / 60) % 24,
                    (start + minutes) % 60
                ),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  #{}  ", cell.index)),
            Span::styled(tags.join(" "), Style::default().fg(Color::Gray)),
        ])
    }

    fn draw_settings(&self, f: &mut ratatui::Frame<'_>, form: &SettingsForm) {
        let area = centered_rect(50, 35, f.size());
        let mut lines = Vec::new();
        lines.push(field_line(
            "Sleep start (HH:MM)",
            &form.start,
            form.field == SettingsField::Start,
        ));
        lines.push(field_line(
            "Sleep end   (HH:MM)",
            &form.end,
            form.field == SettingsField::End,
        ));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter to save • Esc to cancel • Tab to switch field",
            Style::default().fg(Color::Gray),
        )));
        f.render_widget(Clear, area);
        f.render_widget(dialog(lines, "Settings", Color::Cyan), area);
    }

    fn draw_note(&self, f: &mut ratatui::Frame<'_>, hour: u32, field: &FieldValue) {
        let area = centered_rect(60, 25, f.size());
        let lines = vec![
            field_line("Note", field, true),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to save (empty clears) • Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        let title = format!("Note for {}", format_hour_label(hour));
        f.render_widget(Clear, area);
        f.render_widget(dialog(lines, &title, Color::LightYellow), area);
    }
}

fn block_span(cell: &BlockCell, selected: bool) -> Span<'static> {
    let glyph = if cell.flags.current { "▶▶" } else { "  " };
    let text = if selected {
        format!("[{}]", glyph)
    } else {
        format!(" {} ", glyph)
    };
    let bg = if cell.flags.active {
        Color::Green
    } else if cell.flags.sleep {
        Color::Blue
    } else {
        Color::DarkGray
    };
    let mut style = Style::default().bg(bg).fg(Color::White);
    if cell.flags.current {
        style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
    }
    if cell.flags.past {
        style = style.add_modifier(Modifier::DIM);
    }
    if selected {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(text, style)
}

fn dialog<'a>(lines: Vec<Line<'a>>, title: &'a str, accent: Color) -> Paragraph<'a> {
    Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(
                    title,
                    Style::default().fg(accent).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent)),
        )
        .wrap(Wrap { trim: true })
}

fn field_line(label: &str, field: &FieldValue, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    Line::from(vec![
        Span::styled(format!("{}: ", label), label_style),
        Span::styled(text, value_style),
    ])
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
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
        .split(popup_layout[1])[1]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
