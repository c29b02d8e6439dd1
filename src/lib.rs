#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod bookmarks;
pub mod codec;
pub mod config;
pub mod debounce;
pub mod inference;
pub mod preferences;
pub mod rewriter;
pub mod session;
pub mod subscriptions;
pub mod tabs;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
