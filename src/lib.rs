//! Single-flight coordination for automated job applications.
//!
//! A [`coordinator::Coordinator`] guarantees that at most one application is
//! in progress, recovers stuck applications through a periodic health check,
//! and remembers which items have been processed. The [`runner::Runner`]
//! drives it over an [`source::ItemSource`] with an [`action::ApplyAction`].

pub mod action;
pub mod backend;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod runner;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod ui;
