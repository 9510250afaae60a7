use std::{error::Error, fmt};

/// The comms module's result type.
pub type Result<T> = std::result::Result<T, CommsErr>;

/// Failures while talking to the remote registry.
#[derive(Debug)]
pub enum CommsErr {
    /// The request could not be sent or the response could not be read, timeouts included.
    Transport(reqwest::Error),
    /// The registry answered with a non success status code.
    Status(u16),
    /// The response body is not valid json.
    Parse(serde_json::Error),
    /// The response json lacks the given numeric key.
    MissingKey(&'static str),
    /// The outgoing payload could not be serialized.
    Encode(serde_json::Error),
}

impl fmt::Display for CommsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommsErr::Transport(e) => write!(f, "transport error: {e}"),
            CommsErr::Status(code) => write!(f, "registry answered with status {code}"),
            CommsErr::Parse(e) => write!(f, "malformed registry response: {e}"),
            CommsErr::MissingKey(key) => write!(f, "registry response has no numeric `{key}`"),
            CommsErr::Encode(e) => write!(f, "could not encode payload: {e}"),
        }
    }
}

impl Error for CommsErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CommsErr::Transport(e) => Some(e),
            CommsErr::Parse(e) | CommsErr::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CommsErr {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}
