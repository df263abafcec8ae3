//! Repository activity watcher
//!
//! # Overview
//!
//! Keeps an eye on a single hosted repository: who commits the most and how many pull requests and issues are
//! open, stale or closed.
//! Data comes from a [`api::Provider`] polled on a fixed period, while the screen is redrawn on a much shorter one,
//! so a slow or rate limited API never freezes the display.
//! Each refresh cycle derives the whole picture again from the configured `since`/`until` window and the branch, and
//! publishes it at once, so the screen never shows a half counted cycle.

pub mod aggregate;
pub mod api;
pub mod config;
#[cfg(feature = "watcher")]
pub mod display;
#[cfg(feature = "watcher")]
mod scheduler;

pub use config::Config;
#[cfg(feature = "watcher")]
pub use scheduler::Watcher;
