mod connection;
pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

#[cfg(test)]
mod tests;

pub use connection::Database;
pub use repositories::{GoalRefresh, SipEventFilter};
