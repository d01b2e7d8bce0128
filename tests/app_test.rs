mod common;

use common::{write_file, TRANSACTIONS_CSV};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;
use std::path::PathBuf;
use tempfile::TempDir;
use txdash::credentials::CredentialStore;
use txdash::dashboard::Tab;
use txdash::dataset::LoadOptions;
use txdash::pipeline::{DashboardSettings, Role};
use txdash::widgets::login::FormMessage;
use txdash::{App, AppEvent, LaunchOptions, Theme};

fn options(path: Option<PathBuf>) -> LaunchOptions {
    LaunchOptions {
        path,
        selection: None,
        load: LoadOptions::default(),
        settings: DashboardSettings::default()
            .with_role(Role::Date, Some("transaction_date".into()))
            .with_role(Role::Amount, Some("amount".into()))
            .with_role(Role::Gender, Some("gender".into())),
        credentials_db: None,
        table_row_limit: 1000,
        event_poll_interval_ms: 25,
        debug: false,
    }
}

fn app(dir: &TempDir, path: Option<PathBuf>) -> App {
    let store = CredentialStore::open(dir.path().join("users.db")).unwrap();
    App::new(&Theme::default(), store, None, options(path))
}

fn press(app: &mut App, code: KeyCode) -> Option<AppEvent> {
    app.event(&AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
}

fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        press(app, KeyCode::Char(c));
    }
}

fn screen(app: &mut App) -> String {
    let area = Rect::new(0, 0, 120, 36);
    let mut buf = Buffer::empty(area);
    app.render(area, &mut buf);
    (0..area.height)
        .map(|y| {
            (0..area.width)
                .map(|x| buf[(x, y)].symbol().to_string())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn sign_up(app: &mut App, name: &str, username: &str, password: &str) {
    press(app, KeyCode::Tab);
    type_text(app, name);
    press(app, KeyCode::Enter);
    type_text(app, username);
    press(app, KeyCode::Enter);
    type_text(app, password);
    press(app, KeyCode::Enter);
    type_text(app, password);
    press(app, KeyCode::Enter);
}

/// Log in from a fresh login form that already holds `username`.
fn login_with_password(app: &mut App, password: &str) -> Option<AppEvent> {
    press(app, KeyCode::Down);
    type_text(app, password);
    press(app, KeyCode::Enter)
}

#[test]
fn sign_up_then_login_opens_launch_file() {
    let dir = TempDir::new().unwrap();
    let csv = write_file(dir.path(), "transactions.csv", TRANSACTIONS_CSV);
    let mut app = app(&dir, Some(csv.clone()));
    assert!(screen(&mut app).contains("Username"));

    sign_up(&mut app, "Alice Doe", "alice", "pw");
    assert!(!app.is_logged_in());
    assert_eq!(
        app.login_form().message,
        Some(FormMessage::Info("Account created. Log in to continue.".into()))
    );

    let next = login_with_password(&mut app, "pw");
    assert!(app.is_logged_in());
    assert_eq!(app.username(), Some("alice"));
    let Some(AppEvent::Open(path)) = next else {
        panic!("expected the launch file to open");
    };
    assert_eq!(path, csv);
    app.event(&AppEvent::Open(path));

    let session = app.dashboard().unwrap();
    assert_eq!(session.view().unwrap().table.height(), 6);
    let text = screen(&mut app);
    assert!(text.contains("transactions.csv"));
    assert!(text.contains("alice"));
    assert!(text.contains("Rows: 6 of 6"));
    assert!(text.contains("$805.75"));
}

#[test]
fn wrong_password_stays_on_login_form() {
    let dir = TempDir::new().unwrap();
    let mut app = app(&dir, None);
    sign_up(&mut app, "Bob", "bob", "right");

    let next = login_with_password(&mut app, "wrong");
    assert!(next.is_none());
    assert!(!app.is_logged_in());
    assert!(matches!(
        app.login_form().message,
        Some(FormMessage::Error(ref m)) if m.contains("Invalid username or password")
    ));
    assert!(screen(&mut app).contains("Invalid username or password"));
}

#[test]
fn escape_on_login_form_exits() {
    let dir = TempDir::new().unwrap();
    let mut app = app(&dir, None);
    assert!(matches!(press(&mut app, KeyCode::Esc), Some(AppEvent::Exit)));
}

#[test]
fn dashboard_keys_switch_tabs_and_logout_clears_session() {
    let dir = TempDir::new().unwrap();
    let csv = write_file(dir.path(), "transactions.csv", TRANSACTIONS_CSV);
    let mut app = app(&dir, Some(csv));
    sign_up(&mut app, "Carol", "carol", "pw");
    if let Some(event) = login_with_password(&mut app, "pw") {
        app.event(&event);
    }
    assert_eq!(app.dashboard().unwrap().tab, Tab::Overview);

    press(&mut app, KeyCode::Tab);
    assert_eq!(app.dashboard().unwrap().tab, Tab::Gender);
    press(&mut app, KeyCode::BackTab);
    press(&mut app, KeyCode::BackTab);
    assert_eq!(app.dashboard().unwrap().tab, Tab::Data);
    assert!(screen(&mut app).contains("Cleaned data"));

    press(&mut app, KeyCode::Char('L'));
    assert!(!app.is_logged_in());
    assert!(app.dashboard().is_none());
    assert!(screen(&mut app).contains("Username"));
}

#[test]
fn failed_upload_keeps_current_dataset() {
    let dir = TempDir::new().unwrap();
    let csv = write_file(dir.path(), "transactions.csv", TRANSACTIONS_CSV);
    let pdf = write_file(dir.path(), "notes.pdf", "%PDF-1.4");
    let mut app = app(&dir, Some(csv));
    sign_up(&mut app, "Dave", "dave", "pw");
    if let Some(event) = login_with_password(&mut app, "pw") {
        app.event(&event);
    }

    app.event(&AppEvent::Open(pdf));
    assert!(app.status().unwrap().contains("notes.pdf"));
    assert_eq!(app.dashboard().unwrap().file_name(), "transactions.csv");
}

#[test]
fn upload_prompt_opens_typed_path() {
    let dir = TempDir::new().unwrap();
    let csv = write_file(dir.path(), "transactions.csv", TRANSACTIONS_CSV);
    let mut app = app(&dir, None);
    sign_up(&mut app, "Erin", "erin", "pw");
    assert!(login_with_password(&mut app, "pw").is_none());
    assert!(screen(&mut app).contains("Press o"));

    press(&mut app, KeyCode::Char('o'));
    type_text(&mut app, csv.to_str().unwrap());
    let Some(AppEvent::Open(path)) = press(&mut app, KeyCode::Enter) else {
        panic!("expected an upload");
    };
    app.event(&AppEvent::Open(path));
    assert!(app.dashboard().is_some());
    assert!(matches!(press(&mut app, KeyCode::Char('q')), Some(AppEvent::Exit)));
}
