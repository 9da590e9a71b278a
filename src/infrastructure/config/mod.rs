//! Infrastructure configuration modules.

pub mod env;
pub mod limiter;
pub mod logging;
pub mod lots;
pub mod order;
pub mod recovery;
pub mod session;
pub mod settings;
