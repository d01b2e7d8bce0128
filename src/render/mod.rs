pub mod context;
pub mod layout;
