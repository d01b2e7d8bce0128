pub mod controls;
pub mod dashboard;
pub mod login;
pub mod sidebar;
pub mod text_input;
