//! Login / sign-up form shown while the session gate is logged out.

use super::text_input::{TextInput, TextInputEvent};
use crate::render::context::RenderContext;
use crate::render::layout::centered_rect_fixed;
use crate::session::AuthChoice;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Tabs, Widget, Wrap};

const FORM_WIDTH: u16 = 52;
const PASSWORD_MASK: char = '•';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Name,
    Username,
    Password,
    Confirm,
}

impl LoginField {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Full name",
            Self::Username => "Username",
            Self::Password => "Password",
            Self::Confirm => "Confirm password",
        }
    }

    pub fn for_choice(choice: AuthChoice) -> &'static [LoginField] {
        match choice {
            AuthChoice::Login => &[Self::Username, Self::Password],
            AuthChoice::SignUp => &[Self::Name, Self::Username, Self::Password, Self::Confirm],
        }
    }
}

/// Result of a key press on the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAction {
    None,
    /// Switch to the other form.
    Toggle,
    Submit(AuthChoice),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMessage {
    Error(String),
    Info(String),
}

pub struct LoginForm {
    choice: AuthChoice,
    focus: usize,
    name: TextInput,
    username: TextInput,
    password: TextInput,
    confirm: TextInput,
    pub message: Option<FormMessage>,
}

impl LoginForm {
    pub fn new() -> Self {
        let mut form = Self {
            choice: AuthChoice::Login,
            focus: 0,
            name: TextInput::new(),
            username: TextInput::new(),
            password: TextInput::new().masked(PASSWORD_MASK),
            confirm: TextInput::new().masked(PASSWORD_MASK),
            message: None,
        };
        form.sync_focus();
        form
    }

    pub fn choice(&self) -> AuthChoice {
        self.choice
    }

    /// Show the given form. Passwords are cleared; the username carries over.
    pub fn set_choice(&mut self, choice: AuthChoice) {
        self.choice = choice;
        self.focus = 0;
        self.password.clear();
        self.confirm.clear();
        self.sync_focus();
    }

    pub fn focused_field(&self) -> LoginField {
        let fields = LoginField::for_choice(self.choice);
        fields[self.focus.min(fields.len() - 1)]
    }

    fn input(&self, field: LoginField) -> &TextInput {
        match field {
            LoginField::Name => &self.name,
            LoginField::Username => &self.username,
            LoginField::Password => &self.password,
            LoginField::Confirm => &self.confirm,
        }
    }

    fn input_mut(&mut self, field: LoginField) -> &mut TextInput {
        match field {
            LoginField::Name => &mut self.name,
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
            LoginField::Confirm => &mut self.confirm,
        }
    }

    pub fn value(&self, field: LoginField) -> String {
        self.input(field).value()
    }

    pub fn set_value(&mut self, field: LoginField, value: &str) {
        self.input_mut(field).set_value(value);
    }

    /// Clear every field, e.g. after logout.
    pub fn reset(&mut self) {
        for input in [&mut self.name, &mut self.username, &mut self.password, &mut self.confirm] {
            input.clear();
        }
        self.message = None;
        self.set_choice(AuthChoice::Login);
    }

    fn sync_focus(&mut self) {
        let focused = self.focused_field();
        for field in [
            LoginField::Name,
            LoginField::Username,
            LoginField::Password,
            LoginField::Confirm,
        ] {
            self.input_mut(field).set_focused(field == focused);
        }
    }

    fn move_focus(&mut self, forward: bool) {
        let count = LoginField::for_choice(self.choice).len();
        self.focus = if forward {
            (self.focus + 1) % count
        } else {
            (self.focus + count - 1) % count
        };
        self.sync_focus();
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> LoginAction {
        if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char('c') {
            return LoginAction::Quit;
        }
        match event.code {
            KeyCode::Tab | KeyCode::BackTab => LoginAction::Toggle,
            KeyCode::Down => {
                self.move_focus(true);
                LoginAction::None
            }
            KeyCode::Up => {
                self.move_focus(false);
                LoginAction::None
            }
            _ => {
                let field = self.focused_field();
                match self.input_mut(field).handle_key(event) {
                    TextInputEvent::Submit => {
                        if self.focus + 1 < LoginField::for_choice(self.choice).len() {
                            self.move_focus(true);
                            LoginAction::None
                        } else {
                            LoginAction::Submit(self.choice)
                        }
                    }
                    TextInputEvent::Cancel => LoginAction::Quit,
                    TextInputEvent::None => LoginAction::None,
                }
            }
        }
    }
}

impl Default for LoginForm {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the form centered in `area`.
pub fn render_login(area: Rect, buf: &mut Buffer, form: &LoginForm, ctx: &RenderContext) {
    let fields = LoginField::for_choice(form.choice);
    // tabs + one bordered box per field + message + outer border
    let height = 2 + 2 + fields.len() as u16 * 3 + 2;
    let rect = centered_rect_fixed(area, FORM_WIDTH, height);

    Clear.render(rect, buf);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ctx.focused_border))
        .title(" txdash ");
    let inner = block.inner(rect);
    block.render(rect, buf);

    let mut constraints = vec![Constraint::Length(2)];
    constraints.extend(fields.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Min(1));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    let selected = match form.choice {
        AuthChoice::Login => 0,
        AuthChoice::SignUp => 1,
    };
    Tabs::new([AuthChoice::Login.as_str(), AuthChoice::SignUp.as_str()])
        .select(selected)
        .style(Style::default().fg(ctx.text_secondary))
        .highlight_style(
            Style::default()
                .fg(ctx.keybind_hints)
                .add_modifier(Modifier::BOLD),
        )
        .render(rows[0], buf);

    let focused = form.focused_field();
    for (i, field) in fields.iter().enumerate() {
        let field_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ctx.border(*field == focused)))
            .title(field.label());
        let field_inner = field_block.inner(rows[i + 1]);
        field_block.render(rows[i + 1], buf);
        form.input(*field).render(field_inner, buf);
    }

    let message_area = rows[fields.len() + 1];
    let message = match &form.message {
        Some(FormMessage::Error(msg)) => {
            Line::styled(msg.as_str(), Style::default().fg(ctx.error))
        }
        Some(FormMessage::Info(msg)) => {
            Line::styled(msg.as_str(), Style::default().fg(ctx.success))
        }
        None => Line::styled(
            "Tab: switch form  Enter: next / submit  Esc: quit",
            Style::default().fg(ctx.dimmed),
        ),
    };
    Paragraph::new(message)
        .wrap(Wrap { trim: true })
        .render(message_area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Theme;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(form: &mut LoginForm, s: &str) {
        for c in s.chars() {
            form.handle_key(&key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn enter_advances_then_submits() {
        let mut form = LoginForm::new();
        type_str(&mut form, "alice");
        assert_eq!(form.handle_key(&key(KeyCode::Enter)), LoginAction::None);
        assert_eq!(form.focused_field(), LoginField::Password);
        type_str(&mut form, "pw1");
        assert_eq!(
            form.handle_key(&key(KeyCode::Enter)),
            LoginAction::Submit(AuthChoice::Login)
        );
        assert_eq!(form.value(LoginField::Username), "alice");
        assert_eq!(form.value(LoginField::Password), "pw1");
    }

    #[test]
    fn switching_forms_clears_passwords() {
        let mut form = LoginForm::new();
        type_str(&mut form, "alice");
        form.handle_key(&key(KeyCode::Down));
        type_str(&mut form, "secret");
        assert_eq!(form.handle_key(&key(KeyCode::Tab)), LoginAction::Toggle);

        form.set_choice(AuthChoice::SignUp);
        assert_eq!(form.focused_field(), LoginField::Name);
        assert_eq!(form.value(LoginField::Username), "alice");
        assert!(form.value(LoginField::Password).is_empty());
    }

    #[test]
    fn focus_wraps_around() {
        let mut form = LoginForm::new();
        form.handle_key(&key(KeyCode::Up));
        assert_eq!(form.focused_field(), LoginField::Password);
        form.handle_key(&key(KeyCode::Down));
        assert_eq!(form.focused_field(), LoginField::Username);
    }

    #[test]
    fn escape_and_ctrl_c_quit() {
        let mut form = LoginForm::new();
        assert_eq!(form.handle_key(&key(KeyCode::Esc)), LoginAction::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(form.handle_key(&ctrl_c), LoginAction::Quit);
    }

    #[test]
    fn renders_error_without_showing_password() {
        let mut form = LoginForm::new();
        form.set_value(LoginField::Username, "alice");
        form.set_value(LoginField::Password, "hunter2");
        form.message = Some(FormMessage::Error("Username/password is incorrect".into()));

        let area = Rect::new(0, 0, 80, 24);
        let mut buf = Buffer::empty(area);
        render_login(area, &mut buf, &form, &RenderContext::from_theme(&Theme::default()));
        let text: String = (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.contains("alice"));
        assert!(text.contains("incorrect"));
        assert!(!text.contains("hunter2"));
    }
}
