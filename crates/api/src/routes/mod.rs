pub mod chat;
pub mod compare;
pub mod health;
pub mod report;
pub mod session;
pub mod stock;
