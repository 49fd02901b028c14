use reqwest::Client;
use serde::de::DeserializeOwned;

use super::errors::HttpError;
use super::retry::get_with_retries;

pub async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, HttpError> {
    let body = fetch_text(client, url).await?;
    serde_json::from_str::<T>(&body).map_err(|err| HttpError::Parse { source: err, body })
}

pub async fn fetch_text(client: &Client, url: &str) -> Result<String, HttpError> {
    let response = get_with_retries(client, url).await?;
    response.text().await.map_err(HttpError::Request)
}
