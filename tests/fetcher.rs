use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use genefetch::domain::Query;
use genefetch::error::GeneFetchError;
use genefetch::eutils::EutilsClient;
use genefetch::fetcher::{FetchOutcome, Phase, SequenceFetcher};
use genefetch::rate_gate::UnthrottledGate;
use genefetch::session::{SearchSession, SessionField};
use genefetch::sink::{DirectorySink, SequenceSink};

struct MockEutils {
    search_body: String,
    fetch_body: Vec<u8>,
    efetch_calls: Mutex<usize>,
    sessions: Mutex<Vec<(String, String)>>,
}

impl MockEutils {
    fn new(search_body: &str, fetch_body: &[u8]) -> Self {
        Self {
            search_body: search_body.to_string(),
            fetch_body: fetch_body.to_vec(),
            efetch_calls: Mutex::new(0),
            sessions: Mutex::new(Vec::new()),
        }
    }
}

impl EutilsClient for MockEutils {
    fn esearch(&self, _term: &str) -> Result<String, GeneFetchError> {
        Ok(self.search_body.clone())
    }

    fn efetch(&self, session: &SearchSession) -> Result<Vec<u8>, GeneFetchError> {
        *self.efetch_calls.lock().unwrap() += 1;
        self.sessions
            .lock()
            .unwrap()
            .push((session.web_env().to_string(), session.query_key().to_string()));
        Ok(self.fetch_body.clone())
    }
}

fn fetcher_in(
    temp: &tempfile::TempDir,
    client: MockEutils,
) -> SequenceFetcher<MockEutils, DirectorySink> {
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    SequenceFetcher::new(client, DirectorySink::new(dir), Arc::new(UnthrottledGate))
}

fn query(species: &str, gene: &str) -> Query {
    Query::new(species.parse().unwrap(), gene.parse().unwrap())
}

const SEARCH_OK: &str =
    "<eSearchResult><Count>5</Count><RetMax>5</RetMax><QueryKey>2</QueryKey><WebEnv>XYZ</WebEnv></eSearchResult>";

#[test]
fn writes_payload_byte_for_byte() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = fetcher_in(&temp, MockEutils::new(SEARCH_OK, b">seq1\nACGT\n"));

    let outcome = fetcher.fetch(&query("Panthera leo (lion)", "rbcL"));
    let expected = temp.path().join("Panthera_leo_lion_rbcL.txt");
    assert_matches!(outcome, FetchOutcome::Written { ref path, .. } if path.as_std_path() == expected);
    assert_eq!(std::fs::read(&expected).unwrap(), b">seq1\nACGT\n");
}

#[test]
fn non_utf8_payload_is_written_unchanged() {
    let temp = tempfile::tempdir().unwrap();
    let payload = b">X1 Abies alba caf\xe9\nACGT\n";
    let fetcher = fetcher_in(&temp, MockEutils::new(SEARCH_OK, payload));

    let outcome = fetcher.fetch(&query("Abies alba", "rbcL"));
    assert_matches!(outcome, FetchOutcome::Written { bytes, .. } if bytes == payload.len());
    assert_eq!(
        std::fs::read(temp.path().join("Abies_alba_rbcL.txt")).unwrap(),
        payload
    );
}

#[test]
fn session_tokens_are_forwarded_to_efetch() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = fetcher_in(&temp, MockEutils::new(SEARCH_OK, b">seq1\nACGT\n"));
    fetcher.fetch(&query("Abies alba", "matK"));

    assert_eq!(
        *fetcher.client().sessions.lock().unwrap(),
        vec![("XYZ".to_string(), "2".to_string())]
    );
    assert!(
        fetcher
            .sink()
            .destination(&query("Abies alba", "matK"))
            .as_std_path()
            .exists()
    );
}

#[test]
fn empty_payload_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = fetcher_in(&temp, MockEutils::new(SEARCH_OK, b""));

    assert_matches!(
        fetcher.fetch(&query("Abies alba", "rbcL")),
        FetchOutcome::EmptyPayload
    );
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn zero_count_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = fetcher_in(
        &temp,
        MockEutils::new(
            "<Count>0</Count><QueryKey>1</QueryKey><WebEnv>XYZ</WebEnv>",
            b">unexpected\n",
        ),
    );

    assert_matches!(
        fetcher.fetch(&query("Abies alba", "rbcL")),
        FetchOutcome::NoResults
    );
    assert_eq!(*fetcher.client().efetch_calls.lock().unwrap(), 0);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn each_missing_field_fails_without_efetch() {
    let cases = [
        ("<Count>5</Count><QueryKey>1</QueryKey>", SessionField::WebEnv),
        ("<Count>5</Count><WebEnv>XYZ</WebEnv>", SessionField::QueryKey),
        ("<QueryKey>1</QueryKey><WebEnv>XYZ</WebEnv>", SessionField::Count),
    ];

    for (body, missing) in cases {
        let temp = tempfile::tempdir().unwrap();
        let fetcher = fetcher_in(&temp, MockEutils::new(body, b">seq\nA\n"));
        let outcome = fetcher.fetch(&query("Abies alba", "rbcL"));
        assert_matches!(
            outcome,
            FetchOutcome::Failed {
                phase: Phase::Searching,
                error: GeneFetchError::MissingField(field),
            } if field == missing
        );
        assert_eq!(*fetcher.client().efetch_calls.lock().unwrap(), 0);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}

#[test]
fn persistence_failure_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().join("missing")).unwrap();
    let fetcher = SequenceFetcher::new(
        MockEutils::new(SEARCH_OK, b">seq\nA\n"),
        DirectorySink::new(dir),
        Arc::new(UnthrottledGate),
    );

    assert_matches!(
        fetcher.fetch(&query("Abies alba", "rbcL")),
        FetchOutcome::Failed {
            phase: Phase::Persisting,
            error: GeneFetchError::Persistence { .. },
        }
    );
}
