//! API handlers module

pub mod attachments;
pub mod events;
pub mod health;
pub mod papers;
