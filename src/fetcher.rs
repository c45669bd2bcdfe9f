use std::fmt;
use std::sync::Arc;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::Query;
use crate::error::GeneFetchError;
use crate::eutils::EutilsClient;
use crate::rate_gate::RateGate;
use crate::session::{SearchSession, parse_search_response, server_messages};
use crate::sink::SequenceSink;

/// Step of the search-then-fetch protocol a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Searching,
    Fetching,
    Persisting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Searching => write!(f, "searching"),
            Phase::Fetching => write!(f, "fetching"),
            Phase::Persisting => write!(f, "persisting"),
        }
    }
}

/// Terminal state of one species. Only `Failed` carries an error; the two
/// skips are expected outcomes.
#[derive(Debug)]
pub enum FetchOutcome {
    Written { path: Utf8PathBuf, bytes: usize },
    NoResults,
    EmptyPayload,
    Failed { phase: Phase, error: GeneFetchError },
}

impl FetchOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            FetchOutcome::Written { .. } => "written",
            FetchOutcome::NoResults => "no-results",
            FetchOutcome::EmptyPayload => "empty-payload",
            FetchOutcome::Failed { .. } => "failed",
        }
    }
}

/// Runs esearch, extracts the history session, runs efetch and persists the
/// payload. Each remote call, including every retry, passes through the gate.
pub struct SequenceFetcher<C: EutilsClient, S: SequenceSink> {
    client: C,
    sink: S,
    gate: Arc<dyn RateGate>,
    max_retries: usize,
}

impl<C: EutilsClient, S: SequenceSink> SequenceFetcher<C, S> {
    pub fn new(client: C, sink: S, gate: Arc<dyn RateGate>) -> Self {
        Self {
            client,
            sink,
            gate,
            max_retries: 0,
        }
    }

    pub fn with_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn fetch(&self, query: &Query) -> FetchOutcome {
        let session = match self.search(query) {
            Ok(Some(session)) => session,
            Ok(None) => return FetchOutcome::NoResults,
            Err(error) => {
                return FetchOutcome::Failed {
                    phase: Phase::Searching,
                    error,
                };
            }
        };

        let payload = match self.gated(|| self.client.efetch(&session)) {
            Ok(payload) => payload,
            Err(error) => {
                return FetchOutcome::Failed {
                    phase: Phase::Fetching,
                    error,
                };
            }
        };
        if payload.is_empty() {
            return FetchOutcome::EmptyPayload;
        }

        match self.sink.persist(query, &payload) {
            Ok(path) => FetchOutcome::Written {
                path,
                bytes: payload.len(),
            },
            Err(error) => FetchOutcome::Failed {
                phase: Phase::Persisting,
                error,
            },
        }
    }

    /// `Ok(None)` when the server reports zero hits.
    fn search(&self, query: &Query) -> Result<Option<SearchSession>, GeneFetchError> {
        let term = query.search_term();
        debug!(term = %term, "esearch");
        let body = self.gated(|| self.client.esearch(&term))?;

        let session = parse_search_response(&body).inspect_err(|_| {
            for message in server_messages(&body) {
                warn!(species = %query.species, "esearch reported: {message}");
            }
        })?;
        debug!(
            web_env = session.web_env(),
            query_key = session.query_key(),
            count = session.count(),
            "search session"
        );

        Ok(session.has_results().then_some(session))
    }

    fn gated<T, F>(&self, mut call: F) -> Result<T, GeneFetchError>
    where
        F: FnMut() -> Result<T, GeneFetchError>,
    {
        let mut attempt = 0usize;
        loop {
            self.gate.acquire();
            match call() {
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    attempt += 1;
                    debug!(attempt, error = %err, "retrying E-utilities call");
                }
                result => return result,
            }
        }
    }
}
