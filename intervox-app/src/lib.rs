pub mod adapters;
pub mod config;
pub mod service;

pub use config::ClientConfig;
pub use service::InterviewService;
