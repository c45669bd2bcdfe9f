use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::GeneFetchError;

// Tags are located independently; esearch does not promise an order.
static WEB_ENV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<WebEnv>(\S+)</WebEnv>").expect("WebEnv pattern is valid"));
static QUERY_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<QueryKey>(\d+)</QueryKey>").expect("QueryKey pattern is valid")
});
static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Count>([^<]+)</Count>").expect("Count pattern is valid"));
static SERVER_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:ERROR|OutputMessage)>(.*?)</(?:ERROR|OutputMessage)>")
        .expect("error pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionField {
    WebEnv,
    QueryKey,
    Count,
}

impl fmt::Display for SessionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionField::WebEnv => write!(f, "WebEnv"),
            SessionField::QueryKey => write!(f, "QueryKey"),
            SessionField::Count => write!(f, "Count"),
        }
    }
}

/// History-server handle returned by esearch and consumed by efetch.
///
/// Only constructed by [`parse_search_response`], so `web_env` and
/// `query_key` are always non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSession {
    web_env: String,
    query_key: String,
    count: String,
}

impl SearchSession {
    pub fn web_env(&self) -> &str {
        &self.web_env
    }

    pub fn query_key(&self) -> &str {
        &self.query_key
    }

    /// Raw count text as reported by the server.
    pub fn count(&self) -> &str {
        &self.count
    }

    /// Only the literal text `"0"` means no hits. Anything else, including
    /// a malformed count, is treated as results present.
    pub fn has_results(&self) -> bool {
        self.count != "0"
    }
}

pub fn parse_search_response(body: &str) -> Result<SearchSession, GeneFetchError> {
    let web_env = capture(&WEB_ENV, body).ok_or(GeneFetchError::MissingField(SessionField::WebEnv))?;
    let query_key =
        capture(&QUERY_KEY, body).ok_or(GeneFetchError::MissingField(SessionField::QueryKey))?;
    let count = capture(&COUNT, body).ok_or(GeneFetchError::MissingField(SessionField::Count))?;
    Ok(SearchSession {
        web_env,
        query_key,
        count,
    })
}

/// Messages the server embeds when it rejects or cannot run a search.
pub fn server_messages(body: &str) -> Vec<String> {
    SERVER_ERROR
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|message| !message.is_empty())
        .collect()
}

fn capture(pattern: &Regex, body: &str) -> Option<String> {
    pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
