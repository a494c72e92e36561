pub mod error;
pub mod registry;
pub mod session;
