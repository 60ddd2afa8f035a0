//! Core module - Configuration, events, and the settings store

pub mod config;
pub mod events;
pub mod store;
