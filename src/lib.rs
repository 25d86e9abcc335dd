//! Plugin-driven mention-reply bot for Twitter-style platforms.
//!
//! The bot polls the mentions timeline on an interval, strips the leading
//! mention block off each new mention and dispatches the payload to a set of
//! registered plugins, which reply through a rate-limit-aware sender.

pub mod addressing;
pub mod api;
pub mod bot;
pub mod commands;
pub mod config;
pub mod cursor;
pub mod error_utils;
pub mod mention;
pub mod plugin;
pub mod plugins;
pub mod reply;
pub mod twitter;
