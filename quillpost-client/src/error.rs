use quillpost_common::model::ErrorResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Server replied with {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Could not decode the response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Builds the error for a non-success reply from its raw body.
    pub(crate) fn from_reply(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorResponse>(body).map_or_else(
            |_| String::from_utf8_lossy(body).trim().to_owned(),
            |response| response.message,
        );

        ClientError::Api { status, message }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status().map(|status| status.as_u16()),
            ClientError::Decode(_) => None,
        }
    }

    /// A message that can be shown to a person as is.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) => {
                "Could not reach the server. Check your connection and try again.".to_owned()
            }
            ClientError::Api { status: 401, .. } => "Please log in again.".to_owned(),
            ClientError::Api { status, .. } if *status >= 500 => {
                "Something went wrong on our side. Please try again later.".to_owned()
            }
            ClientError::Api { message, .. } if !message.is_empty() => message.clone(),
            ClientError::Api { .. } | ClientError::Decode(_) => {
                "The server sent an unexpected response.".to_owned()
            }
        }
    }
}
