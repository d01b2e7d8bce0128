//! Login / sign-up gate in front of the dashboard.

use crate::credentials::CredentialStore;
use crate::error::{DashboardError, Result};
use tracing::{info, warn};

/// Which form is shown while logged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthChoice {
    #[default]
    Login,
    SignUp,
}

impl AuthChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::SignUp => "Sign Up",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Login => Self::SignUp,
            Self::SignUp => Self::Login,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut { choice: AuthChoice },
    LoggedIn { username: String },
}

impl Default for SessionState {
    fn default() -> Self {
        Self::LoggedOut {
            choice: AuthChoice::Login,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionGate {
    state: SessionState,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.state, SessionState::LoggedIn { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::LoggedIn { username } => Some(username),
            SessionState::LoggedOut { .. } => None,
        }
    }

    /// Switch between the login and sign-up forms. Ignored while logged in.
    pub fn set_choice(&mut self, choice: AuthChoice) {
        if let SessionState::LoggedOut { .. } = self.state {
            self.state = SessionState::LoggedOut { choice };
        }
    }

    pub fn login(&mut self, store: &CredentialStore, username: &str, password: &str) -> Result<()> {
        if self.is_logged_in() {
            return Ok(());
        }
        match store.authenticate(username, password)? {
            Some(record) => {
                info!(username = %record.username, "login succeeded");
                self.state = SessionState::LoggedIn {
                    username: record.username,
                };
                Ok(())
            }
            None => {
                warn!(username, "login rejected");
                Err(DashboardError::Authentication)
            }
        }
    }

    /// Create an account. On success the gate shows the login form; the new user
    /// still has to log in.
    pub fn sign_up(
        &mut self,
        store: &CredentialStore,
        name: &str,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        if password != confirm_password {
            return Err(DashboardError::PasswordMismatch);
        }
        if username.trim().is_empty() || name.trim().is_empty() {
            return Err(DashboardError::Processing(
                "Username and full name are required".to_string(),
            ));
        }
        store.register(username, name, password)?;
        info!(username, "account created");
        self.state = SessionState::LoggedOut {
            choice: AuthChoice::Login,
        };
        Ok(())
    }

    pub fn logout(&mut self) {
        if let Some(username) = self.username() {
            info!(username, "logged out");
        }
        self.state = SessionState::default();
    }
}
