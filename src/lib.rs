//! # Quizlobby
//!
//! This library provides the core engine for a single shared live trivia
//! session. It owns the round lifecycle (timed question rounds separated by
//! short intermissions), the participant registry with per-round answer
//! eligibility, and the event fan-out that keeps every connected client's
//! view consistent.
//!
//! The engine is transport-agnostic and timer-agnostic: hosts feed it client
//! commands ([`lobby::IncomingMessage`]) and expired alarms
//! ([`events::AlarmMessage`]), and it talks back through [`session::Tunnel`]
//! implementations and a scheduling callback. Question storage, session
//! token resolution, and durable scores sit behind the traits in [`store`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod config;
pub mod constants;
pub mod events;
pub mod lobby;
pub mod registry;
pub mod session;
pub mod store;

pub use config::LobbyConfig;
pub use lobby::{IncomingMessage, Lobby};
pub use session::{Broadcaster, ConnectionId, Tunnel};
