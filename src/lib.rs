use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::time::Duration;
use tracing::{info, warn};

pub mod cache;
pub mod cleaning;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod dashboard;
pub mod dataset;
pub mod error;
pub mod error_display;
pub mod filter;
pub mod logging;
pub mod pipeline;
mod render;
pub mod session;
pub mod summary;
pub mod widgets;

pub use cache::CacheManager;
pub use cli::Args;
pub use config::{AppConfig, ColorParser, ConfigManager, Theme};
pub use error::DashboardError;

use credentials::{CredentialStore, DEFAULT_DB_FILE};
use dashboard::{DashboardSession, Tab};
use dataset::{LoadOptions, SheetSelection, Upload};
use error_display::user_message;
use pipeline::{DashboardSettings, Role};
use render::context::RenderContext;
use render::layout::{app_layout, centered_rect_fixed, dashboard_layout};
use session::AuthChoice;
use widgets::controls::Controls;
use widgets::login::{render_login, FormMessage, LoginAction, LoginField, LoginForm};
use widgets::text_input::{TextInput, TextInputEvent};

/// Application name used for the config and cache directories
pub const APP_NAME: &str = "txdash";

const PAGE_ROWS: isize = 20;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    /// Upload the file at this path, replacing the current dataset.
    Open(PathBuf),
    Exit,
    Resize(u16, u16),
}

/// Startup choices resolved from the command line over the config file.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub path: Option<PathBuf>,
    pub selection: Option<SheetSelection>,
    pub load: LoadOptions,
    pub settings: DashboardSettings,
    pub credentials_db: Option<PathBuf>,
    pub table_row_limit: usize,
    pub event_poll_interval_ms: u64,
    pub debug: bool,
}

impl LaunchOptions {
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Self {
        let defaults = LoadOptions::default();
        let load = LoadOptions {
            delimiter: args
                .delimiter
                .or(config.file_loading.delimiter)
                .unwrap_or(defaults.delimiter),
            infer_schema_length: args
                .infer_schema_length
                .or(config.file_loading.infer_schema_length)
                .unwrap_or(defaults.infer_schema_length),
        };

        let selection = args.sheet.clone().map(|primary| match &args.merge_with {
            Some(secondary) => SheetSelection::Merge {
                primary,
                secondary: secondary.clone(),
                on: args.on.clone().unwrap_or_default(),
            },
            None => SheetSelection::Single(primary),
        });

        let mut settings = DashboardSettings {
            currency: args.currency.unwrap_or(config.dashboard.currency),
            age_bins: args
                .age_bins
                .clone()
                .unwrap_or_else(|| config.dashboard.age_bins.clone()),
            age_labels: args
                .age_labels
                .clone()
                .unwrap_or_else(|| config.dashboard.age_labels.clone()),
            filter_mode: args.filter_mode.unwrap_or(config.filters.mode),
            histogram_bins: config.chart.histogram_bins,
            ..DashboardSettings::default()
        };
        for (role, column) in [
            (Role::Date, &args.date_col),
            (Role::Amount, &args.amount_col),
            (Role::Gender, &args.gender_col),
            (Role::Age, &args.age_col),
            (Role::Segment, &args.segment_col),
        ] {
            if column.is_some() {
                settings = settings.with_role(role, column.clone());
            }
        }

        Self {
            path: args.path.clone(),
            selection,
            load,
            settings,
            credentials_db: args
                .credentials_db
                .clone()
                .or_else(|| config.auth.database_path.as_ref().map(PathBuf::from)),
            table_row_limit: config.chart.table_row_limit,
            event_poll_interval_ms: config.performance.event_poll_interval_ms,
            debug: args.debug,
        }
    }
}

pub struct App {
    ctx: RenderContext,
    store: CredentialStore,
    cache: Option<CacheManager>,
    gate: session::SessionGate,
    login: LoginForm,
    session: Option<DashboardSession>,
    upload_prompt: Option<TextInput>,
    status: Option<String>,
    options: LaunchOptions,
}

impl App {
    pub fn new(
        theme: &Theme,
        store: CredentialStore,
        cache: Option<CacheManager>,
        options: LaunchOptions,
    ) -> Self {
        Self {
            ctx: RenderContext::from_theme(theme),
            store,
            cache,
            gate: session::SessionGate::new(),
            login: LoginForm::new(),
            session: None,
            upload_prompt: None,
            status: None,
            options,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.gate.is_logged_in()
    }

    pub fn username(&self) -> Option<&str> {
        self.gate.username()
    }

    pub fn login_form(&self) -> &LoginForm {
        &self.login
    }

    pub fn dashboard(&self) -> Option<&DashboardSession> {
        self.session.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        match event {
            AppEvent::Key(key) => {
                if self.gate.is_logged_in() {
                    self.dashboard_key(key)
                } else {
                    self.login_key(key)
                }
            }
            AppEvent::Open(path) => {
                if self.gate.is_logged_in() {
                    self.open(path);
                }
                None
            }
            AppEvent::Resize(..) => None,
            AppEvent::Exit => None,
        }
    }

    fn login_key(&mut self, key: &KeyEvent) -> Option<AppEvent> {
        match self.login.handle_key(key) {
            LoginAction::None => None,
            LoginAction::Quit => Some(AppEvent::Exit),
            LoginAction::Toggle => {
                let choice = self.login.choice().toggled();
                self.gate.set_choice(choice);
                self.login.set_choice(choice);
                self.login.message = None;
                None
            }
            LoginAction::Submit(AuthChoice::Login) => {
                let username = self.login.value(LoginField::Username);
                let password = self.login.value(LoginField::Password);
                match self.gate.login(&self.store, username.trim(), &password) {
                    Ok(()) => {
                        self.login.reset();
                        self.status = None;
                        self.options.path.clone().map(AppEvent::Open)
                    }
                    Err(e) => {
                        self.login.message = Some(FormMessage::Error(user_message(&e)));
                        None
                    }
                }
            }
            LoginAction::Submit(AuthChoice::SignUp) => {
                let name = self.login.value(LoginField::Name);
                let username = self.login.value(LoginField::Username);
                let password = self.login.value(LoginField::Password);
                let confirm = self.login.value(LoginField::Confirm);
                match self.gate.sign_up(
                    &self.store,
                    name.trim(),
                    username.trim(),
                    &password,
                    &confirm,
                ) {
                    Ok(()) => {
                        self.login.set_choice(AuthChoice::Login);
                        self.login.message = Some(FormMessage::Info(
                            "Account created. Log in to continue.".to_string(),
                        ));
                    }
                    Err(e) => {
                        self.login.message = Some(FormMessage::Error(user_message(&e)));
                    }
                }
                None
            }
        }
    }

    fn dashboard_key(&mut self, key: &KeyEvent) -> Option<AppEvent> {
        if let Some(prompt) = self.upload_prompt.as_mut() {
            match prompt.handle_key(key) {
                TextInputEvent::Submit => {
                    let value = prompt.value();
                    self.upload_prompt = None;
                    let path = value.trim();
                    if !path.is_empty() {
                        return Some(AppEvent::Open(PathBuf::from(path)));
                    }
                }
                TextInputEvent::Cancel => self.upload_prompt = None,
                TextInputEvent::None => {}
            }
            return None;
        }
        if let Some(session) = self.session.as_mut() {
            if session.handle_editor_key(key) {
                return None;
            }
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(AppEvent::Exit);
        }
        match key.code {
            KeyCode::Char('q') => return Some(AppEvent::Exit),
            KeyCode::Char('o') => self.open_upload_prompt(),
            KeyCode::Char('L') => self.logout(),
            _ => {}
        }

        let session = self.session.as_mut()?;
        match key.code {
            KeyCode::Tab => session.tab = session.tab.next(),
            KeyCode::BackTab => session.tab = session.tab.prev(),
            KeyCode::Up | KeyCode::Char('k') => session.move_cursor(false),
            KeyCode::Down | KeyCode::Char('j') => session.move_cursor(true),
            KeyCode::Left | KeyCode::Char('h') => session.cycle(false),
            KeyCode::Right | KeyCode::Char('l') => session.cycle(true),
            KeyCode::Enter => session.activate(),
            KeyCode::PageDown if session.tab == Tab::Data => session.scroll_table(PAGE_ROWS),
            KeyCode::PageUp if session.tab == Tab::Data => session.scroll_table(-PAGE_ROWS),
            _ => {}
        }
        None
    }

    fn open_upload_prompt(&mut self) {
        let mut input = TextInput::new().with_text_color(self.ctx.text_primary);
        if let Some(recent) = self.cache.as_ref().and_then(|c| c.most_recent_upload()) {
            input.set_value(&recent);
        }
        input.set_focused(true);
        self.upload_prompt = Some(input);
    }

    /// Upload `path`. A failed upload keeps the current dataset.
    fn open(&mut self, path: &Path) {
        // CLI sheet and role choices apply to the file named on the command line.
        let launch_file = self.options.path.as_deref() == Some(path);
        let selection = if launch_file {
            self.options.selection.as_ref()
        } else {
            None
        };
        let settings = self.options.settings.clone();

        let opened = Upload::from_path(path).and_then(|upload| {
            DashboardSession::open(upload, self.options.load.clone(), selection, settings)
        });
        match opened {
            Ok(session) => {
                info!(path = %path.display(), "upload opened");
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.record_upload(path) {
                        warn!(error = %e, "could not record recent upload");
                    }
                }
                self.session = Some(session);
                self.status = None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "upload failed");
                self.status = Some(format!("{}: {}", path.display(), user_message(&e)));
            }
        }
    }

    /// Back to the login form. Session-scoped data is dropped.
    fn logout(&mut self) {
        self.gate.logout();
        self.session = None;
        self.upload_prompt = None;
        self.status = None;
        self.login.reset();
    }

    fn render_title(&self, area: Rect, buf: &mut Buffer) {
        let mut spans = vec![Span::styled(
            " txdash ",
            Style::default()
                .fg(self.ctx.keybind_hints)
                .add_modifier(Modifier::BOLD),
        )];
        if let Some(user) = self.gate.username() {
            spans.push(Span::styled(
                format!("| {} ", user),
                Style::default().fg(self.ctx.text_secondary),
            ));
        }
        if let Some(session) = &self.session {
            spans.push(Span::styled(
                format!("| {} ", session.file_name()),
                Style::default().fg(self.ctx.text_primary),
            ));
        }
        Paragraph::new(Line::from(spans)).render(area, buf);
    }

    fn render_upload_prompt(&self, area: Rect, buf: &mut Buffer) {
        let Some(prompt) = &self.upload_prompt else {
            return;
        };
        let rect = centered_rect_fixed(area, 70, 3);
        Clear.render(rect, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.ctx.focused_border))
            .title(" Upload file (csv, txt, xlsx, xls, xlsm, xlsb, ods) ");
        let inner = block.inner(rect);
        block.render(rect, buf);
        prompt.render(inner, buf);
    }

    fn controls(&self) -> Controls {
        let controls = Controls::from_context(&self.ctx);
        if !self.gate.is_logged_in() {
            return controls.with_controls(&[
                ("Tab", "Login/Sign up"),
                ("↑↓", "Field"),
                ("Enter", "Submit"),
                ("Esc", "Quit"),
            ]);
        }
        if self.upload_prompt.is_some() {
            return controls.with_controls(&[("Enter", "Upload"), ("Esc", "Cancel")]);
        }
        let controls = controls.with_controls(&[
            ("↑↓", "Select"),
            ("←→", "Change"),
            ("Enter", "Edit"),
            ("Tab", "View"),
            ("o", "Open"),
            ("L", "Logout"),
            ("q", "Quit"),
        ]);
        let editing = self
            .session
            .as_ref()
            .is_some_and(|s| s.editor.is_some());
        let status = match (&self.status, &self.session) {
            (Some(status), _) => Some(status.clone()),
            (None, Some(session)) => session.notice.clone().or_else(|| {
                session.view().map(|v| {
                    format!("Rows: {} of {}", v.filtered.height(), v.table.height())
                })
            }),
            (None, None) => None,
        };
        let controls = controls.with_dimmed(editing);
        match status {
            Some(status) => controls.with_status(status),
            None => controls,
        }
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let layout = app_layout(area);
        self.render_title(layout.title, buf);

        if !self.gate.is_logged_in() {
            render_login(layout.main_view, buf, &self.login, &self.ctx);
        } else if let Some(session) = &self.session {
            let (sidebar, body) = dashboard_layout(layout.main_view);
            let focused = session.editor.is_none() && self.upload_prompt.is_none();
            widgets::sidebar::render_sidebar(sidebar, buf, session, &self.ctx, focused);
            widgets::dashboard::render_dashboard(
                body,
                buf,
                session,
                &self.ctx,
                self.options.table_row_limit,
            );
            widgets::sidebar::render_editor(layout.main_view, buf, session, &self.ctx);
        } else {
            Paragraph::new("Press o to upload a spreadsheet or CSV file.")
                .style(Style::default().fg(self.ctx.dimmed))
                .centered()
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .border_style(Style::default().fg(self.ctx.sidebar_border)),
                )
                .render(layout.main_view, buf);
        }
        self.render_upload_prompt(layout.main_view, buf);

        (&self.controls()).render(layout.control_bar, buf);
    }
}

/// Run the TUI until the user quits.
pub fn run(options: LaunchOptions, config: AppConfig) -> Result<()> {
    let theme = Theme::from_config(&config.theme)
        .or_else(|e| Theme::from_config(&AppConfig::default().theme).map_err(|_| e))?;

    let db_path = match &options.credentials_db {
        Some(path) => path.clone(),
        None => {
            let manager = ConfigManager::new(APP_NAME)?;
            manager.ensure_config_dir()?;
            manager.config_path(DEFAULT_DB_FILE)
        }
    };
    let store = CredentialStore::open(&db_path)?;
    info!(db = %db_path.display(), "credential store ready");
    let cache = CacheManager::new(APP_NAME).ok();
    let poll_interval = Duration::from_millis(options.event_poll_interval_ms);

    let mut terminal = ratatui::try_init().map_err(|e| {
        color_eyre::eyre::eyre!(
            "txdash requires an interactive terminal (TTY). No terminal detected: {}",
            e
        )
    })?;
    let (tx, rx) = mpsc::channel::<AppEvent>();
    let mut app = App::new(&theme, store, cache, options);
    let result = event_loop(&mut terminal, &mut app, &tx, &rx, poll_interval);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    app: &mut App,
    tx: &Sender<AppEvent>,
    rx: &mpsc::Receiver<AppEvent>,
    poll_interval: Duration,
) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(&mut *app, frame.area()))?;

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => {
                    if key.is_press() {
                        tx.send(AppEvent::Key(key))?
                    }
                }
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    event => {
                        if let Some(next) = app.event(&event) {
                            tx.send(next)?;
                        }
                    }
                }
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => false,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            terminal.draw(|frame| frame.render_widget(&mut *app, frame.area()))?;
        }
    }
    Ok(())
}
