pub mod chat;
pub mod collections;
pub mod health;
pub mod profile;
pub mod sse;
pub mod validation;
pub mod workflow;
