use std::sync::Arc;

pub mod model;
pub mod service;

pub type Service = Arc<dyn service::EventService + Send + Sync>;
