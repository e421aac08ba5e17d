use std::{cmp, io, path::Path, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use gtanext_core::{
    api::{AddGameRequest, ApiResponse, Backend, InstallPrerequisitesRequest, UpdateGameRequest},
    launch::can_launch_directly,
    loaders::LoaderStatus,
    metadata::AppMetadata,
    models::{GameRecord, GameRef},
    prerequisites::PrerequisiteReport,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_FIELD_LEN: usize = 260;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Library,
    RecycleBin,
}

impl Screen {
    fn title(self) -> &'static str {
        match self {
            Screen::Library => "Library",
            Screen::RecycleBin => "Recycle Bin",
        }
    }

    fn toggled(self) -> Self {
        match self {
            Screen::Library => Screen::RecycleBin,
            Screen::RecycleBin => Screen::Library,
        }
    }
}

/// Single-line editor; `cursor` counts characters, not bytes.
#[derive(Debug, Clone, Default)]
struct TextInput {
    input: String,
    cursor: usize,
}

impl TextInput {
    fn new(value: &str) -> Self {
        Self {
            input: value.to_string(),
            cursor: value.chars().count(),
        }
    }

    fn len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self, position: usize) -> usize {
        self.input
            .char_indices()
            .nth(position)
            .map(|(idx, _)| idx)
            .unwrap_or(self.input.len())
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.len() as isize;
        let next = (self.cursor as isize + delta).clamp(0, len);
        self.cursor = next as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.len();
    }

    fn insert(&mut self, ch: char) {
        if self.len() >= MAX_FIELD_LEN || ch.is_control() {
            return;
        }
        let idx = self.byte_index(self.cursor);
        self.input.insert(idx, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = self.byte_index(self.cursor);
            self.input.remove(idx);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let idx = self.byte_index(self.cursor);
            self.input.remove(idx);
        }
    }

    fn set(&mut self, value: &str) {
        *self = Self::new(value);
    }

    fn value(&self) -> &str {
        self.input.trim()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    GameType,
    Directory,
    Name,
    Executable,
}

impl FormField {
    const ALL: [FormField; 4] = [
        FormField::GameType,
        FormField::Directory,
        FormField::Name,
        FormField::Executable,
    ];

    fn label(self) -> &'static str {
        match self {
            FormField::GameType => "Type",
            FormField::Directory => "Directory",
            FormField::Name => "Name",
            FormField::Executable => "Executable",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            FormField::GameType => "GTA3, GTAVC or GTASA (Ctrl-d detects)",
            FormField::Directory => "installation folder",
            FormField::Name => "blank uses the type name",
            FormField::Executable => "blank uses the default (Ctrl-e picks)",
        }
    }
}

/// Add/edit dialog. `editing` is `None` when registering a new game.
#[derive(Debug, Clone)]
struct GameForm {
    editing: Option<GameRecord>,
    fields: [TextInput; 4],
    focus: usize,
}

impl GameForm {
    fn new_game() -> Self {
        Self {
            editing: None,
            fields: Default::default(),
            focus: 1,
        }
    }

    fn edit(record: &GameRecord) -> Self {
        Self {
            editing: Some(record.clone()),
            fields: [
                TextInput::new(record.game_type.as_str()),
                TextInput::new(&record.directory.display().to_string()),
                TextInput::new(&record.name),
                TextInput::new(record.custom_executable.as_deref().unwrap_or_default()),
            ],
            focus: 2,
        }
    }

    fn title(&self) -> String {
        match &self.editing {
            Some(record) => format!("Edit {}", record.name),
            None => "Add Game".to_string(),
        }
    }

    fn focused(&self) -> FormField {
        FormField::ALL[self.focus]
    }

    fn input(&self, field: FormField) -> &TextInput {
        &self.fields[field as usize]
    }

    fn input_mut(&mut self, field: FormField) -> &mut TextInput {
        &mut self.fields[field as usize]
    }

    fn focused_input_mut(&mut self) -> &mut TextInput {
        &mut self.fields[self.focus]
    }

    fn value(&self, field: FormField) -> &str {
        self.input(field).value()
    }

    fn cycle_focus(&mut self, delta: isize) {
        let len = FormField::ALL.len() as isize;
        self.focus = (self.focus as isize + delta).rem_euclid(len) as usize;
    }

    fn optional(&self, field: FormField) -> Option<String> {
        let value = self.value(field);
        (!value.is_empty()).then(|| value.to_string())
    }

    fn add_request(&self) -> AddGameRequest {
        AddGameRequest {
            game_type: self.value(FormField::GameType).to_string(),
            directory: self.value(FormField::Directory).to_string(),
            name: self.optional(FormField::Name),
        }
    }

    /// Full update; an empty executable field clears the override.
    fn update_request(&self, id: u64) -> UpdateGameRequest {
        UpdateGameRequest {
            id: Some(json!(id)),
            index: None,
            game_type: self.value(FormField::GameType).to_string(),
            directory: self.value(FormField::Directory).to_string(),
            name: self.optional(FormField::Name),
            custom_executable: Some(self.value(FormField::Executable).to_string()),
            status: None,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingPurge {
    id: u64,
    name: String,
}

#[derive(Debug, Clone)]
struct PrerequisiteView {
    game: GameRecord,
    report: PrerequisiteReport,
    loaders: Option<LoaderStatus>,
}

enum AppEvent {
    Input(Event),
    Tick,
}

/// Terminal front-end over the launcher backend.
pub struct LauncherApp {
    backend: Backend,
    state: UiState,
    screen: Screen,
    form: Option<GameForm>,
    purge: Option<PendingPurge>,
    prerequisites: Option<PrerequisiteView>,
    app_info: Option<AppMetadata>,
    environment_warning: Option<String>,
    theme: Theme,
}

impl LauncherApp {
    pub fn new(backend: Backend, environment_warning: Option<String>) -> Self {
        Self {
            backend,
            state: UiState::default(),
            screen: Screen::Library,
            form: None,
            purge: None,
            prerequisites: None,
            app_info: None,
            environment_warning,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.reload_games()?;
        self.app_info = match self.backend.app_info() {
            Ok(info) => Some(info),
            Err(err) => {
                warn!(error = %err, "Failed to read application metadata");
                None
            }
        };
        let status = match &self.environment_warning {
            Some(message) => message.clone(),
            None => format!("Loaded {} games", self.state.filtered.len()),
        };
        self.state.set_status(status);

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let result = self.event_loop(&mut terminal, &mut event_rx).await;
        restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        event_rx: &mut mpsc::Receiver<AppEvent>,
    ) -> Result<()> {
        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) || self.state.should_quit {
                break;
            }
        }
        Ok(())
    }

    fn reload_games(&mut self) -> Result<()> {
        let registry = self.backend.registry();
        let games = match self.screen {
            Screen::Library => registry.list_active()?,
            Screen::RecycleBin => registry.list_deleted()?,
        };
        let cursor = self.state.cursor;
        self.state.set_games(games);
        self.state.apply_filter();
        self.state.move_to(cursor);
        info!(
            screen = self.screen.title(),
            total = self.state.all_games.len(),
            "Games reloaded"
        );
        Ok(())
    }

    fn handle_tick(&mut self) {
        if self.state.mode == Mode::Filter {
            self.state
                .set_status(format!("Filter: {}", self.state.filter));
        }
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                if let Err(err) = self.handle_key(key) {
                    self.state.set_status(format!("Error: {err}"));
                }
                true
            }
            Some(AppEvent::Input(_)) => true,
            Some(AppEvent::Tick) => {
                self.handle_tick();
                true
            }
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.form.is_some() {
            return self.handle_form_key(key);
        }
        if self.purge.is_some() {
            return self.handle_purge_key(key);
        }
        if self.prerequisites.is_some() {
            match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('p') => {
                    self.prerequisites = None;
                }
                KeyCode::Char('i') => self.install_prerequisites(),
                _ => {}
            }
            return Ok(());
        }
        match self.state.mode {
            Mode::Filter => self.handle_filter_key(key),
            Mode::Browse => self.handle_browse_key(key),
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.state.mode = Mode::Browse;
                self.state.filter.clear();
                self.state.apply_filter();
                self.state.set_status("Filter cancelled".to_string());
            }
            KeyCode::Enter => {
                self.state.mode = Mode::Browse;
                self.state
                    .set_status(format!("Filter applied: {}", self.state.filter));
            }
            KeyCode::Backspace => {
                self.state.filter.pop();
                self.state.apply_filter();
            }
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.state.filter.push(c);
                    self.state.apply_filter();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                match self.reload_games() {
                    Ok(()) => self
                        .state
                        .set_status(format!("Reloaded {} games", self.state.filtered.len())),
                    Err(err) => self.state.set_status(format!("Reload failed: {err}")),
                }
            }
            KeyCode::Char('q') if key.modifiers.is_empty() => self.state.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.state.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_cursor(-1),
            KeyCode::Char('g') if key.modifiers.is_empty() => self.state.move_to(0),
            KeyCode::Char('G') => self.state.move_to_end(),
            KeyCode::Home => self.state.move_to(0),
            KeyCode::End => self.state.move_to_end(),
            KeyCode::PageDown => self.state.page_down(),
            KeyCode::PageUp => self.state.page_up(),
            KeyCode::Char('/') => {
                self.state.mode = Mode::Filter;
                self.state.set_status("Enter filter text".to_string());
            }
            KeyCode::Tab => {
                self.screen = self.screen.toggled();
                self.state.cursor = 0;
                self.reload_games()?;
                self.state.set_status(format!(
                    "{}: {} games",
                    self.screen.title(),
                    self.state.filtered.len()
                ));
            }
            _ => match self.screen {
                Screen::Library => self.handle_library_key(key)?,
                Screen::RecycleBin => self.handle_recycle_bin_key(key)?,
            },
        }
        Ok(())
    }

    fn handle_library_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Enter | KeyCode::Char('l') => self.launch_selected(),
            KeyCode::Char('a') => {
                self.form = Some(GameForm::new_game());
            }
            KeyCode::Char('e') => {
                if let Some(game) = self.state.current_game() {
                    self.form = Some(GameForm::edit(game));
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.state.current_game().map(|game| game.id) {
                    let response = self.backend.soft_delete_game(id);
                    self.apply_response(response)?;
                }
            }
            KeyCode::Char('p') => self.show_prerequisites(),
            KeyCode::Char('o') => {
                let directory = self.state.current_game().map(|game| game.directory.clone());
                if let Some(directory) = directory {
                    let response = self.backend.open_game_folder(&directory);
                    self.state.set_status(response.message);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_recycle_bin_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('r') | KeyCode::Enter => {
                if let Some(id) = self.state.current_game().map(|game| game.id) {
                    let response = self.backend.restore_game(id);
                    self.apply_response(response)?;
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some(game) = self.state.current_game() {
                    self.purge = Some(PendingPurge {
                        id: game.id,
                        name: game.name.clone(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_purge_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(pending) = self.purge.take() {
                    debug!(id = pending.id, "Purging game");
                    let response = self.backend.delete_game(GameRef::Id(pending.id));
                    self.apply_response(response)?;
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.purge = None;
                self.state.set_status("Deletion cancelled".to_string());
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('d') => self.detect_into_form(),
                KeyCode::Char('e') => self.pick_executable_into_form(),
                _ => {}
            }
            return Ok(());
        }
        let Some(form) = self.form.as_mut() else {
            return Ok(());
        };
        match key.code {
            KeyCode::Esc => {
                self.form = None;
                self.state.set_status("Edit cancelled".to_string());
            }
            KeyCode::Enter => self.submit_form()?,
            KeyCode::Tab | KeyCode::Down => form.cycle_focus(1),
            KeyCode::BackTab | KeyCode::Up => form.cycle_focus(-1),
            KeyCode::Left => form.focused_input_mut().move_cursor(-1),
            KeyCode::Right => form.focused_input_mut().move_cursor(1),
            KeyCode::Home => form.focused_input_mut().move_home(),
            KeyCode::End => form.focused_input_mut().move_end(),
            KeyCode::Backspace => form.focused_input_mut().backspace(),
            KeyCode::Delete => form.focused_input_mut().delete(),
            KeyCode::Char(ch) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    form.focused_input_mut().insert(ch);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn detect_into_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let directory = form.value(FormField::Directory).to_string();
        if directory.is_empty() {
            self.state
                .set_status("Enter a directory first".to_string());
            return;
        }
        match self.backend.detect_game(Path::new(&directory)) {
            Some(detected) => {
                form.input_mut(FormField::GameType)
                    .set(detected.game_type.as_str());
                self.state.set_status(format!(
                    "Detected {} ({})",
                    detected.game_name, detected.executable
                ));
            }
            None => self
                .state
                .set_status("No known game executable in that directory".to_string()),
        }
    }

    fn pick_executable_into_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let directory = form.value(FormField::Directory).to_string();
        let picked = self.backend.select_game_executable(Path::new(&directory));
        let file_name = picked.as_deref().and_then(|path| {
            Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        });
        match file_name {
            Some(name) => {
                form.input_mut(FormField::Executable).set(&name);
                self.state.set_status(format!("Selected {name}"));
            }
            None => self
                .state
                .set_status("No executable found in that directory".to_string()),
        }
    }

    fn submit_form(&mut self) -> Result<()> {
        let Some(form) = self.form.take() else {
            return Ok(());
        };
        let (response, keep_open) = match &form.editing {
            Some(record) => {
                let response = self.backend.update_game(form.update_request(record.id));
                let keep_open = !response.success;
                (response, keep_open)
            }
            None => {
                let added = self.backend.add_game(form.add_request());
                match added.id {
                    None => (added, true),
                    Some(id) if !form.value(FormField::Executable).is_empty() => {
                        let follow_up = self.backend.update_game(form.update_request(id));
                        if follow_up.success {
                            (added, false)
                        } else {
                            let message = format!(
                                "{}, executable not saved: {}",
                                added.message, follow_up.message
                            );
                            (ApiResponse::ok(message).with_id(id), false)
                        }
                    }
                    Some(_) => (added, false),
                }
            }
        };
        if keep_open {
            self.form = Some(form);
            self.state.set_status(response.message);
            return Ok(());
        }
        self.apply_response(response)
    }

    fn apply_response(&mut self, response: ApiResponse) -> Result<()> {
        if response.success {
            self.reload_games()?;
        }
        self.state.set_status(response.message);
        Ok(())
    }

    fn launch_selected(&mut self) {
        let Some(game) = self.state.current_game().cloned() else {
            self.state.set_status("No game selected".to_string());
            return;
        };
        let response = self.backend.launch_record(&game);
        self.state.set_status(response.message);
    }

    fn show_prerequisites(&mut self) {
        let Some(game) = self.state.current_game().cloned() else {
            return;
        };
        self.prerequisites = Some(self.prerequisite_view(game));
    }

    fn prerequisite_view(&self, game: GameRecord) -> PrerequisiteView {
        let report = self.backend.detect_prerequisite_mods(&game.directory);
        let loaders = match self.backend.check_mod_loaders(&game.directory) {
            Ok(status) => Some(status),
            Err(err) => {
                debug!(error = %err, "loader check unavailable");
                None
            }
        };
        PrerequisiteView {
            game,
            report,
            loaders,
        }
    }

    /// Install the default loaders into the game shown in the popup.
    fn install_prerequisites(&mut self) {
        let Some(game) = self.prerequisites.as_ref().map(|view| view.game.clone()) else {
            return;
        };
        let request = InstallPrerequisitesRequest {
            directory: game.directory.display().to_string(),
            game_type: game.game_type.to_string(),
            components: None,
        };
        let message = match self.backend.install_mod_prerequisites(request) {
            Ok(result) => {
                info!(files = ?result.installed_files, "prerequisites installed");
                format!("Installed {}", result.installed_files.join(", "))
            }
            Err(err) => {
                warn!(error = %err, "prerequisite install failed");
                err.to_string()
            }
        };
        self.state.set_status(message);
        self.prerequisites = Some(self.prerequisite_view(game));
    }

    fn draw(&mut self, frame: &mut Frame) {
        self.draw_browse(frame);
        if let Some(form) = &self.form {
            self.render_form(frame, form);
        }
        if let Some(pending) = &self.purge {
            self.render_purge_confirm(frame, pending);
        }
        if let Some(view) = &self.prerequisites {
            self.render_prerequisites(frame, view);
        }
    }

    fn draw_browse(&mut self, frame: &mut Frame) {
        let size = frame.size();

        let mut constraints = Vec::new();
        if self.environment_warning.is_some() {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(8));
        constraints.push(Constraint::Length(4));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(size);

        let mut chunk_iter = chunks.iter();
        let warning_chunk = if self.environment_warning.is_some() {
            chunk_iter.next().copied()
        } else {
            None
        };
        let body_chunk = chunk_iter.next().copied().unwrap_or(size);
        let status_chunk = chunk_iter.next().copied().unwrap_or(size);

        let body_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(body_chunk);

        if let (Some(area), Some(message)) = (warning_chunk, self.environment_warning.as_ref()) {
            let paragraph = Paragraph::new(Span::styled(
                message.clone(),
                Style::default().fg(self.theme.warning),
            ))
            .block(Block::default().borders(Borders::ALL).title("Environment"))
            .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
        }
        self.render_game_list(frame, body_chunks[0]);
        self.render_game_details(frame, body_chunks[1]);
        self.render_status(frame, status_chunk);
    }

    fn render_game_list(&mut self, frame: &mut Frame, area: Rect) {
        self.state.list_height = area.height.saturating_sub(2) as usize;
        self.state.clamp_cursor();
        self.state.ensure_cursor_visible();

        let mut list_state = ListState::default();
        let height = area.height.saturating_sub(2) as usize;
        let games = self.state.visible_games(height);
        if !games.is_empty() {
            let selected = self
                .state
                .cursor
                .saturating_sub(self.state.offset)
                .min(games.len().saturating_sub(1));
            list_state.select(Some(selected));
        }
        let items: Vec<ListItem> = if games.is_empty() {
            let message = match self.screen {
                Screen::Library => "  No games yet, press a to add one",
                Screen::RecycleBin => "  Recycle bin is empty",
            };
            vec![ListItem::new(Line::from(Span::styled(
                message,
                Style::default().fg(self.theme.muted),
            )))]
        } else {
            games
                .iter()
                .enumerate()
                .map(|(idx, game)| {
                    let global_index = self.state.offset + idx;
                    let marker = if self.state.cursor == global_index {
                        Span::styled(
                            "▶ ",
                            Style::default()
                                .fg(self.theme.accent)
                                .add_modifier(Modifier::BOLD),
                        )
                    } else {
                        Span::raw("  ")
                    };
                    let title = Span::styled(
                        game.name.clone(),
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    );
                    let tag = Span::styled(
                        format!(" · {}", game.game_type),
                        Style::default().fg(self.theme.muted),
                    );
                    ListItem::new(Line::from(vec![marker, title, tag]))
                })
                .collect()
        };

        let title = format!("{} ({})", self.screen.title(), self.state.filtered.len());
        let block = Block::default().borders(Borders::ALL).title(title);
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_game_details(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Game Details");
        let Some(game) = self.state.current_game() else {
            let paragraph = Paragraph::new("No game selected").block(block);
            frame.render_widget(paragraph, area);
            return;
        };

        let mut lines = vec![Line::from(Span::styled(
            game.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        lines.push(Line::from(format!(
            "Type: {} ({})",
            game.game_type.display_name(),
            game.game_type
        )));
        lines.push(Line::from(format!("Directory: {}", game.directory.display())));
        lines.push(Line::from(format!("Id: {}", game.id)));
        if let Some(added) = game.added_time {
            lines.push(Line::from(format!("Added: {}", format_time(added))));
        }
        if let Some(deleted) = game.deleted_time {
            lines.push(Line::from(Span::styled(
                format!("Deleted: {}", format_time(deleted)),
                Style::default().fg(self.theme.danger),
            )));
        }
        let executable = match (&game.custom_executable, game.game_type.default_executable()) {
            (Some(custom), _) => custom.clone(),
            (None, Some(default)) => format!("{default} (default)"),
            (None, None) => "none configured".to_string(),
        };
        lines.push(Line::from(format!("Executable: {executable}")));

        if !game.is_deleted() {
            let (text, color) = if game.custom_executable.is_some()
                || can_launch_directly(&game.game_type, &game.directory)
            {
                ("Ready to launch", self.theme.success)
            } else {
                ("Default executable not found", self.theme.warning)
            };
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(text, Style::default().fg(color))));
        }

        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let title = match &self.app_info {
            Some(info) => format!("{} by {}", info.name, info.author),
            None => "Status".to_string(),
        };
        let block = Block::default().borders(Borders::ALL).title(title);
        let primary = if self.state.mode == Mode::Filter {
            format!("Filter: {}", self.state.filter)
        } else {
            self.state.status.clone()
        };
        let keys = match self.screen {
            Screen::Library => {
                "Enter launch  a add  e edit  d recycle  o open folder  p prerequisites  / filter  Tab recycle bin  q quit"
            }
            Screen::RecycleBin => "r restore  x delete permanently  / filter  Tab library  q quit",
        };
        let paragraph = Paragraph::new(vec![
            Line::from(primary),
            Line::from(Span::styled(keys, Style::default().fg(self.theme.muted))),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_form(&self, frame: &mut Frame, form: &GameForm) {
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(72_u16, frame_area.width.saturating_sub(4)), 30_u16);
        let height = 14_u16.min(frame_area.height.saturating_sub(2)).max(8_u16);
        let area = centered_rect(width, height, frame_area);

        frame.render_widget(Clear, area);

        let mut lines = Vec::new();
        let mut cursor_line = 0_u16;
        let mut cursor_column = 0_u16;
        for field in FormField::ALL {
            let focused = field == form.focused();
            let label_style = if focused {
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.primary_fg)
            };
            let label = format!("{:<11}", field.label());
            let input = form.input(field);
            if focused {
                cursor_line = lines.len() as u16;
                cursor_column = (label.chars().count() + 2 + input.cursor) as u16;
            }
            lines.push(Line::from(vec![
                Span::styled(if focused { "▶ " } else { "  " }, label_style),
                Span::styled(label, label_style),
                Span::raw(input.input.clone()),
            ]));
            lines.push(Line::from(Span::styled(
                format!("             {}", field.hint()),
                Style::default().fg(self.theme.muted),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" save  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" next field  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(form.title()));
        frame.render_widget(paragraph, area);

        let cursor_x = (area.x + 1 + cursor_column).min(area.x + area.width.saturating_sub(2));
        let cursor_y = (area.y + 1 + cursor_line).min(area.y + area.height.saturating_sub(2));
        frame.set_cursor(cursor_x, cursor_y);
    }

    fn render_purge_confirm(&self, frame: &mut Frame, pending: &PendingPurge) {
        let area = centered_rect(52, 6, frame.size());
        frame.render_widget(Clear, area);
        let paragraph = Paragraph::new(vec![
            Line::from(format!("Permanently delete {}?", pending.name)),
            Line::from(Span::styled(
                "This cannot be undone.",
                Style::default().fg(self.theme.danger),
            )),
            Line::from(vec![
                Span::styled("y", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" delete  "),
                Span::styled("n", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" keep"),
            ]),
        ])
        .block(Block::default().borders(Borders::ALL).title("Confirm"))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_prerequisites(&self, frame: &mut Frame, view: &PrerequisiteView) {
        let frame_area = frame.size();
        let width = cmp::min(80_u16, frame_area.width.saturating_sub(4));
        let height = 22_u16.min(frame_area.height.saturating_sub(2));
        let area = centered_rect(width, height, frame_area);
        frame.render_widget(Clear, area);

        let report = &view.report;
        let (summary, color) = if report.all_required_found {
            ("All prerequisite mods are installed", self.theme.success)
        } else if report.has_prerequisite {
            ("Some prerequisite mods are missing", self.theme.warning)
        } else {
            ("No prerequisite mods found", self.theme.danger)
        };
        let mut lines = vec![
            Line::from(Span::styled(
                summary,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        for detail in &report.found_mods_details {
            lines.push(Line::from(vec![
                Span::styled("✔ ", Style::default().fg(self.theme.success)),
                Span::raw(format!("{} in {}", detail.mod_file, detail.directory_name)),
            ]));
        }
        for missing in &report.missing_mods {
            lines.push(Line::from(vec![
                Span::styled("✘ ", Style::default().fg(self.theme.danger)),
                Span::raw(format!("{missing} not found")),
            ]));
        }
        if let Some(loaders) = &view.loaders {
            lines.push(Line::from(""));
            for found in &loaders.found_loaders {
                lines.push(Line::from(vec![
                    Span::styled("✔ ", Style::default().fg(self.theme.success)),
                    Span::raw(found.clone()),
                ]));
            }
            for missing in &loaders.missing_loaders {
                lines.push(Line::from(vec![
                    Span::styled("✘ ", Style::default().fg(self.theme.warning)),
                    Span::raw(format!("{missing} not installed")),
                ]));
            }
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Checked: {}", report.checked_directories.join(", ")),
            Style::default().fg(self.theme.muted),
        )));
        lines.push(Line::from(Span::styled(
            "i install dinput8 + CLEO  Esc close",
            Style::default().fg(self.theme.muted),
        )));

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Prerequisites - {}", view.game.name)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    all_games: Vec<GameRecord>,
    filtered: Vec<GameRecord>,
    cursor: usize,
    offset: usize,
    list_height: usize,
    filter: String,
    status: String,
    mode: Mode,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            all_games: Vec::new(),
            filtered: Vec::new(),
            cursor: 0,
            offset: 0,
            list_height: 1,
            filter: String::new(),
            status: "Ready".to_string(),
            mode: Mode::Browse,
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_games(&mut self, games: Vec<GameRecord>) {
        self.all_games = games;
    }

    fn apply_filter(&mut self) {
        if self.filter.trim().is_empty() {
            self.filtered = self.all_games.clone();
        } else {
            let needle = self.filter.to_lowercase();
            self.filtered = self
                .all_games
                .iter()
                .filter(|game| game_matches(game, &needle))
                .cloned()
                .collect();
        }
        self.cursor = 0;
        self.offset = 0;
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.filtered.is_empty() {
            return;
        }
        let len = self.filtered.len() as isize;
        let idx = (self.cursor as isize + delta).clamp(0, len - 1);
        self.cursor = idx as usize;
        self.ensure_cursor_visible();
    }

    fn move_to(&mut self, index: usize) {
        if self.filtered.is_empty() {
            return;
        }
        self.cursor = index.min(self.filtered.len() - 1);
        self.ensure_cursor_visible();
    }

    fn move_to_end(&mut self) {
        if self.filtered.is_empty() {
            return;
        }
        self.cursor = self.filtered.len() - 1;
        self.ensure_cursor_visible();
    }

    fn page_down(&mut self) {
        if self.filtered.is_empty() || self.list_height == 0 {
            return;
        }
        let delta = self.list_height.min(self.filtered.len());
        self.move_cursor(delta as isize);
    }

    fn page_up(&mut self) {
        if self.filtered.is_empty() || self.list_height == 0 {
            return;
        }
        let delta = self.list_height.min(self.filtered.len());
        self.move_cursor(-(delta as isize));
    }

    fn visible_games(&self, height: usize) -> &[GameRecord] {
        if self.filtered.is_empty() {
            return &[];
        }
        let end = (self.offset + height).min(self.filtered.len());
        &self.filtered[self.offset..end]
    }

    fn current_game(&self) -> Option<&GameRecord> {
        self.filtered.get(self.cursor)
    }

    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn clamp_cursor(&mut self) {
        if self.filtered.is_empty() {
            self.cursor = 0;
            self.offset = 0;
        } else if self.cursor >= self.filtered.len() {
            self.cursor = self.filtered.len() - 1;
        }
    }

    fn ensure_cursor_visible(&mut self) {
        if self.filtered.is_empty() || self.list_height == 0 {
            self.offset = 0;
            return;
        }
        let height = self.list_height;
        let max_offset = self.filtered.len().saturating_sub(height);

        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }

        if self.offset > max_offset {
            self.offset = max_offset;
        }
    }
}

fn game_matches(game: &GameRecord, needle: &str) -> bool {
    let candidates = [
        game.name.to_lowercase(),
        game.game_type.as_str().to_lowercase(),
        game.game_type.display_name().to_lowercase(),
        game.directory.display().to_string().to_lowercase(),
    ];
    candidates.iter().any(|value| value.contains(needle))
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtanext_core::models::GameType;

    fn record() -> GameRecord {
        serde_json::from_value(json!({
            "id": 4,
            "type": "GTAVC",
            "directory": "/games/Vice City",
            "name": "Vice",
            "addedTime": 1_700_000_000,
            "status": "active",
            "customExecutable": "gta-vc-mp.exe"
        }))
        .expect("valid record")
    }

    #[test]
    fn text_input_edits_multibyte_characters() {
        let mut input = TextInput::new("Vicé");
        input.backspace();
        assert_eq!(input.input, "Vic");
        input.move_home();
        input.insert('é');
        assert_eq!(input.input, "éVic");
        input.delete();
        assert_eq!(input.input, "éic");
        input.move_cursor(10);
        assert_eq!(input.cursor, 3);
    }

    #[test]
    fn edit_form_builds_full_update() {
        let mut form = GameForm::edit(&record());
        assert_eq!(form.focused(), FormField::Name);
        form.input_mut(FormField::Executable).set("");

        let request = form.update_request(4);
        assert_eq!(request.id, Some(json!(4)));
        assert_eq!(request.game_type, "GTAVC");
        assert_eq!(request.name.as_deref(), Some("Vice"));
        assert_eq!(request.custom_executable.as_deref(), Some(""));
    }

    #[test]
    fn new_form_leaves_blank_name_unset() {
        let mut form = GameForm::new_game();
        form.input_mut(FormField::GameType).set("gtasa");
        form.input_mut(FormField::Directory).set("  /games/sa ");
        form.cycle_focus(-2);
        assert_eq!(form.focused(), FormField::Executable);

        let request = form.add_request();
        assert_eq!(request.directory, "/games/sa");
        assert_eq!(request.name, None);
        assert_eq!(GameType::parse(&request.game_type), GameType::GtaSa);
    }

    #[test]
    fn filter_matches_name_type_and_directory() {
        let game = record();
        assert!(game_matches(&game, "vice"));
        assert!(game_matches(&game, "gtavc"));
        assert!(game_matches(&game, "/games/"));
        assert!(!game_matches(&game, "liberty"));
    }
}
