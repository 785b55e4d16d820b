//! API handlers

pub mod chat;
pub mod collection;
pub mod health;
