pub mod client;
pub mod errors;
pub mod json;
pub mod retry;

pub use client::build_client;
pub use errors::HttpError;
pub use json::{fetch_json, fetch_text};
pub use retry::{get_with_retries, send_with_retries};
