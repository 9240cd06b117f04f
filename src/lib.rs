//! tunetube: a headless music client that plays songs from a video
//! platform.
//!
//! The heart of the crate is the [`player::Player`] playback controller. It
//! owns the current track, the queue and the intended play state, commands
//! a black-box [`adapter::Widget`] that does the actual playback, and
//! reconciles what the widget reports back. Around it:
//!
//! * [`store`] persists the current track and queue between runs
//! * [`media_session`] mirrors playback into the host's "now playing"
//!   surface and forwards its transport controls
//! * [`history`] records played tracks in the background
//! * [`api`] talks to the backend for search, video details and history
//! * [`mpv`] provides a widget backed by an external `mpv` process
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod adapter;
pub mod api;
pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod http;
pub mod media_session;
#[cfg(unix)]
pub mod mpv;
pub mod player;
pub mod protocol;
pub mod signal;
pub mod store;
pub mod token;
pub mod track;
pub mod util;
