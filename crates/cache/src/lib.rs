pub mod mem;
pub mod session;
