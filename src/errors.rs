use std::fmt;
use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Which part of the pipeline was talking to the network.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Listing,
    Indice,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Phase::Listing => write!(f, "fetching directory listing"),
            Phase::Indice => write!(f, "fetching contents indice"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("couldn't reach server")]
    Unreachable(#[source] reqwest::Error),

    #[error("server responded with {0}")]
    Status(StatusCode),

    #[error("reading response body")]
    Body(#[source] reqwest::Error),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout | TransportError::Unreachable(_) => true,
            TransportError::Status(status) => status.is_server_error(),
            TransportError::Body(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no contents indices found at {url}")]
    DiscoveryEmpty { url: Url },

    #[error(
        "{arch} was not found in the given repository. Available architectures are: {}",
        .available.join(", ")
    )]
    ArchitectureNotFound { arch: String, available: Vec<String> },

    #[error("{phase} {url}")]
    Transport {
        phase: Phase,
        url: Url,
        #[source]
        source: TransportError,
    },

    #[error("decompressing {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{action} {path:?}")]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid url {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("building http client")]
    Client(#[source] reqwest::Error),

    #[error("{url} isn't a gzip compressed contents indice")]
    UnsupportedCompression { url: Url },
}

impl Error {
    pub(crate) fn fs<P: Into<PathBuf>>(action: &'static str, path: P, source: io::Error) -> Self {
        Error::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn architecture_not_found_lists_alternatives() {
        let err = Error::ArchitectureNotFound {
            arch: "sparc".to_string(),
            available: vec!["amd64".to_string(), "armel".to_string()],
        };
        assert_eq!(
            "sparc was not found in the given repository. Available architectures are: amd64, armel",
            err.to_string()
        );
    }

    #[test]
    fn retryable() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Status(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!TransportError::Status(StatusCode::NOT_FOUND).is_retryable());
    }
}
