use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::{GeneName, Query, SpeciesName};
use crate::error::GeneFetchError;
use crate::eutils::EutilsClient;
use crate::fetcher::{FetchOutcome, Phase, SequenceFetcher};
use crate::sink::SequenceSink;

/// Where species names come from. A file holds one name per line; blank
/// lines are skipped and surrounding whitespace is trimmed. Bytes that are not
/// valid UTF-8 are replaced rather than rejecting the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeciesSource {
    Single(String),
    File(PathBuf),
}

impl SpeciesSource {
    pub fn load(&self) -> Result<Vec<SpeciesName>, GeneFetchError> {
        match self {
            SpeciesSource::Single(name) => Ok(vec![name.parse()?]),
            SpeciesSource::File(path) => {
                let content = fs::read(path).map_err(|err| GeneFetchError::SpeciesFile {
                    path: path.clone(),
                    message: err.to_string(),
                })?;
                Ok(parse_species_list(&String::from_utf8_lossy(&content)))
            }
        }
    }
}

pub fn parse_species_list(content: &str) -> Vec<SpeciesName> {
    content
        .lines()
        .filter_map(|line| line.parse::<SpeciesName>().ok())
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeciesReport {
    pub species: String,
    pub status: String,
    pub path: Option<String>,
    pub bytes: Option<usize>,
    pub phase: Option<Phase>,
    pub error: Option<String>,
}

impl SpeciesReport {
    fn new(species: &SpeciesName, outcome: &FetchOutcome) -> Self {
        let mut report = Self {
            species: species.to_string(),
            status: outcome.status().to_string(),
            path: None,
            bytes: None,
            phase: None,
            error: None,
        };
        match outcome {
            FetchOutcome::Written { path, bytes } => {
                report.path = Some(path.to_string());
                report.bytes = Some(*bytes);
            }
            FetchOutcome::Failed { phase, error } => {
                report.phase = Some(*phase);
                report.error = Some(error.to_string());
            }
            FetchOutcome::NoResults | FetchOutcome::EmptyPayload => {}
        }
        report
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub gene: String,
    pub started_at: String,
    pub finished_at: String,
    pub written: usize,
    pub no_results: usize,
    pub empty_payload: usize,
    pub failed: usize,
    pub items: Vec<SpeciesReport>,
}

/// Drives a [`SequenceFetcher`] over a species list. Species are isolated:
/// a failure is recorded and the run moves on.
pub struct BatchRunner<'a, C: EutilsClient, S: SequenceSink> {
    fetcher: &'a SequenceFetcher<C, S>,
    jobs: usize,
}

impl<'a, C: EutilsClient, S: SequenceSink> BatchRunner<'a, C, S> {
    pub fn new(fetcher: &'a SequenceFetcher<C, S>) -> Self {
        Self { fetcher, jobs: 1 }
    }

    /// Number of worker threads. All workers share the fetcher's gate, so the
    /// global call rate is unchanged.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn run(&self, species: &[SpeciesName], gene: &GeneName) -> BatchSummary {
        let started_at = chrono::Utc::now().to_rfc3339();
        let queries = species
            .iter()
            .map(|name| Query::new(name.clone(), gene.clone()))
            .collect::<Vec<_>>();
        for (first, later, file_name) in colliding_names(&queries) {
            warn!(
                species = %later,
                other = %first,
                file = %file_name,
                "species map to the same output file; the later write wins"
            );
        }

        let items: Vec<SpeciesReport> = if self.jobs == 1 || queries.len() <= 1 {
            queries.iter().map(|query| self.process(query)).collect()
        } else {
            self.run_parallel(&queries)
        };

        let count = |status: &str| items.iter().filter(|item| item.status == status).count();
        BatchSummary {
            gene: gene.to_string(),
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            written: count("written"),
            no_results: count("no-results"),
            empty_payload: count("empty-payload"),
            failed: count("failed"),
            items,
        }
    }

    fn run_parallel(&self, queries: &[Query]) -> Vec<SpeciesReport> {
        let next = AtomicUsize::new(0);
        let next = &next;
        let workers = self.jobs.min(queries.len());

        let mut indexed = thread::scope(|scope| {
            let handles = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(query) = queries.get(index) else {
                                break;
                            };
                            done.push((index, self.process(query)));
                        }
                        done
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(done) => done,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect::<Vec<_>>()
        });

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, report)| report).collect()
    }

    fn process(&self, query: &Query) -> SpeciesReport {
        info!(species = %query.species, gene = %query.gene, "Processing species");
        let outcome = self.fetcher.fetch(query);
        log_outcome(query, &outcome);
        SpeciesReport::new(&query.species, &outcome)
    }
}

/// Pairs of species whose sanitized output names coincide, as
/// `(first, later, file_name)` in input order.
pub fn colliding_names(queries: &[Query]) -> Vec<(SpeciesName, SpeciesName, String)> {
    let mut seen = HashMap::<String, &SpeciesName>::new();
    let mut collisions = Vec::new();
    for query in queries {
        let file_name = query.output_file_name();
        match seen.get(&file_name) {
            Some(first) => {
                collisions.push(((*first).clone(), query.species.clone(), file_name));
            }
            None => {
                seen.insert(file_name, &query.species);
            }
        }
    }
    collisions
}

fn log_outcome(query: &Query, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Written { path, bytes } => {
            info!(species = %query.species, bytes = *bytes, "Results written to '{path}'");
        }
        FetchOutcome::NoResults => {
            info!(
                species = %query.species,
                "No records found for species '{}' and gene '{}'",
                query.species,
                query.gene
            );
        }
        FetchOutcome::EmptyPayload => {
            warn!(
                species = %query.species,
                "Search matched but no FASTA sequences were returned for species '{}' and gene '{}'",
                query.species,
                query.gene
            );
        }
        FetchOutcome::Failed { phase, error } => {
            error!(species = %query.species, phase = %phase, "Error processing species: {error}");
        }
    }
}
