//! Core library for pkgflow.
//!
//! Install and removal requests for Flatpak, Snap and AppImage packages are
//! serialized by [`queue::QueueManager`] into jobs that run one at a time.
//! Progress and completion are published through an [`events::Notifier`].

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod job;
pub mod package;
pub mod process;
pub mod queue;
pub mod release;
