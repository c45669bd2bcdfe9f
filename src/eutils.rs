use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::GeneFetchError;
use crate::session::SearchSession;

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DATABASE: &str = "nucleotide";
pub const SEARCH_RETMAX: u32 = 1000;

/// The two E-utilities endpoints used by a fetch. Each method performs
/// exactly one remote call; throttling and retries belong to the caller.
pub trait EutilsClient: Send + Sync {
    /// Runs esearch with history retention and returns the raw response text.
    fn esearch(&self, term: &str) -> Result<String, GeneFetchError>;

    /// Runs efetch against a history session and returns the FASTA payload
    /// exactly as received, which may be empty.
    fn efetch(&self, session: &SearchSession) -> Result<Vec<u8>, GeneFetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct EutilsCredentials {
    pub api_key: Option<String>,
    pub email: Option<String>,
}

impl EutilsCredentials {
    pub fn from_env() -> Self {
        Self {
            api_key: non_blank_env("NCBI_API_KEY"),
            email: non_blank_env("NCBI_EMAIL"),
        }
    }
}

#[derive(Clone)]
pub struct EutilsHttpClient {
    client: Client,
    base_url: String,
    credentials: EutilsCredentials,
}

impl EutilsHttpClient {
    pub fn new() -> Result<Self, GeneFetchError> {
        let base_url =
            non_blank_env("GENEFETCH_EUTILS_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(base_url, EutilsCredentials::from_env())
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        credentials: EutilsCredentials,
    ) -> Result<Self, GeneFetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("genefetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GeneFetchError::Transport {
                    message: err.to_string(),
                    retryable: false,
                })?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GeneFetchError::Transport {
                message: err.to_string(),
                retryable: false,
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.credentials.api_key.is_some()
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<Response, GeneFetchError> {
        let mut request = self.client.get(url).query(params).query(&[("tool", "genefetch")]);
        if let Some(api_key) = &self.credentials.api_key {
            request = request.query(&[("api_key", api_key.as_str())]);
        }
        if let Some(email) = &self.credentials.email {
            request = request.query(&[("email", email.as_str())]);
        }

        let response = request.send().map_err(transport_error)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "E-utilities request failed".to_string());
            return Err(GeneFetchError::Status { status, message });
        }
        Ok(response)
    }
}

impl EutilsClient for EutilsHttpClient {
    fn esearch(&self, term: &str) -> Result<String, GeneFetchError> {
        let retmax = SEARCH_RETMAX.to_string();
        self.get(
            &self.endpoint("esearch.fcgi"),
            &[
                ("db", DATABASE),
                ("term", term),
                ("usehistory", "y"),
                ("retmax", retmax.as_str()),
            ],
        )?
        .text()
        .map_err(transport_error)
    }

    fn efetch(&self, session: &SearchSession) -> Result<Vec<u8>, GeneFetchError> {
        let payload = self
            .get(
                &self.endpoint("efetch.fcgi"),
                &[
                    ("db", DATABASE),
                    ("query_key", session.query_key()),
                    ("WebEnv", session.web_env()),
                    ("rettype", "fasta"),
                    ("retmode", "text"),
                ],
            )?
            .bytes()
            .map_err(transport_error)?;
        Ok(payload.to_vec())
    }
}

fn transport_error(err: reqwest::Error) -> GeneFetchError {
    GeneFetchError::Transport {
        retryable: is_retryable_error(&err),
        message: err.to_string(),
    }
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
