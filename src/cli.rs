//! Command-line definitions live in the `txdash-cli` crate so `build.rs` can render
//! the man page from them.

pub use txdash_cli::{render_options_markdown, Args, Currency, FilterMode};
