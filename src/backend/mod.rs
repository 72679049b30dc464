pub mod client;
pub mod error;
pub mod types;

pub use client::BackendClient;
pub use error::BackendError;
pub use types::{ApplicationReceipt, ApplicationRequest};
