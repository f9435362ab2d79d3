// QueueCTL core - domain model, application services, and ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;
