//! User-facing messages of the command line front end.

pub mod display;
pub mod macros;
pub mod types;

pub use types::Message;
