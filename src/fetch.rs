use std::env;
use std::thread;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use log::debug;
use log::warn;
use reqwest::blocking::Client;
use reqwest::header;
use url::Url;

use crate::errors::Error;
use crate::errors::TransportError;

/// The whole body of a successful `GET`.
#[derive(Clone, Debug)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Fetched {
    pub fn from_bytes<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Fetched {
            bytes: bytes.into(),
            last_modified: None,
        }
    }
}

/// Fetch the bytes behind a URL.
///
/// Implementations must be usable from several download threads at once.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<Fetched, TransportError>;
}

pub struct HttpFetcher {
    client: Client,
    retries: u32,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, retries: u32) -> Result<Self, Error> {
        let mut builder = Client::builder().timeout(timeout);

        if let Ok(proxy) = env::var("http_proxy") {
            builder = builder.proxy(reqwest::Proxy::http(proxy.as_str()).map_err(Error::Client)?);
        }

        Ok(HttpFetcher {
            client: builder.build().map_err(Error::Client)?,
            retries,
        })
    }

    fn fetch_once(&self, url: &Url) -> Result<Fetched, TransportError> {
        let resp = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| classify(e, TransportError::Unreachable))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        let last_modified = resp
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|modified| modified.to_str().ok())
            .and_then(|modified| DateTime::parse_from_rfc2822(modified).ok())
            .map(|date| date.with_timezone(&Utc));

        let bytes = resp
            .bytes()
            .map_err(|e| classify(e, TransportError::Body))?
            .to_vec();

        debug!("fetched {} bytes from {}", bytes.len(), url);

        Ok(Fetched {
            bytes,
            last_modified,
        })
    }
}

fn classify(e: reqwest::Error, otherwise: fn(reqwest::Error) -> TransportError) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        otherwise(e)
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Fetched, TransportError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url) {
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "{} failed: {}, retrying ({}/{})",
                        url, e, attempt, self.retries
                    );
                    thread::sleep(Duration::from_secs(u64::from(attempt)));
                }
                other => return other,
            }
        }
    }
}
