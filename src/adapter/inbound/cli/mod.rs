//! Operator CLI.

pub mod catalog;
pub mod check;
pub mod command;
pub mod messages;
pub mod output;
