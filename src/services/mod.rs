//! Domain services used by the websocket route.
//!
//! Service modules own room state so route handlers can stay focused on
//! protocol translation.

pub mod room;
