use reqwest::Client;
use std::time::Duration;

use super::errors::HttpError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Builds the client shared by every component of one launcher context.
pub fn build_client(user_agent: &str) -> Result<Client, HttpError> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(HttpError::Request)
}
