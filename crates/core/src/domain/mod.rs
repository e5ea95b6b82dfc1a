pub mod chat;
pub mod field;
pub mod session;
pub mod vehicle;
