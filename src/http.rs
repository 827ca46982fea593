//! Blocking `ureq` requests run on tokio's blocking pool.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const USER_AGENT: &str = concat!("nearcare/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HttpError {
    /// Non-2xx answer; carries the `error` field of a JSON body when present.
    #[error("HTTP {0}: {1}")]
    Status(u16, String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("undecodable response: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// GET `url` with `query` and decode the JSON body.
pub async fn get_json<T>(
    agent: ureq::Agent,
    url: String,
    query: Vec<(&'static str, String)>,
) -> Result<T, HttpError>
where
    T: DeserializeOwned + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut request = agent.get(&url);
        for (key, value) in &query {
            request = request.query(key, value);
        }

        let response = request.call().map_err(|e| match e {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&body)
                    .map(|b| b.error)
                    .unwrap_or(body);
                HttpError::Status(code, message)
            }
            ureq::Error::Transport(t) => HttpError::Transport(t.to_string()),
        })?;

        response
            .into_json::<T>()
            .map_err(|e| HttpError::Decode(e.to_string()))
    })
    .await
    .map_err(|e| HttpError::Transport(format!("request task failed: {}", e)))?
}
