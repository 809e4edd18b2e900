pub mod api_types;
pub mod client;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod service;
pub mod types;

pub use client::HttpDocumentService;
pub use error::ApiError;
pub use service::DocumentService;
