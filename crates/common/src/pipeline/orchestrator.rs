//! Query → terms → hits → documents → candidates → ranked results

use super::fan_out::{fan_out, BatchLimits};
use super::ranker::rank;
use super::report::{PipelineReport, StageStats};
use crate::config::{AppConfig, PipelineConfig};
use crate::errors::{AppError, Result};
use crate::fetch::{ContentFetcher, HttpContentFetcher};
use crate::generation::{AnswerExtractor, LlmClient, TermGenerator};
use crate::metrics;
use crate::model::{Candidate, Document, Hit, RankedResultSet, Settled};
use crate::search::{create_search_provider, SearchProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Tunables for one orchestrator
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    /// Hits kept per search term, in engine order
    pub hits_per_term: usize,

    /// Truncate the ranked set; `None` returns everything
    pub max_results: Option<usize>,

    /// Bound for each collaborator call
    pub call_timeout: Duration,

    /// Concurrency cap inside a fan-out stage
    pub max_in_flight: Option<usize>,
}

impl OrchestratorOptions {
    pub fn limits(&self) -> BatchLimits {
        BatchLimits {
            call_timeout: self.call_timeout,
            max_in_flight: self.max_in_flight,
        }
    }
}

impl From<&PipelineConfig> for OrchestratorOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            hits_per_term: config.hits_per_term,
            max_results: config.max_results,
            call_timeout: config.call_timeout(),
            max_in_flight: config.max_in_flight,
        }
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// Drives the four pipeline stages for a query
///
/// Holds no per-request state, so one instance serves all requests.
#[derive(Clone)]
pub struct Orchestrator {
    terms: Arc<dyn TermGenerator>,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn ContentFetcher>,
    extractor: Arc<dyn AnswerExtractor>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(
        terms: Arc<dyn TermGenerator>,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn ContentFetcher>,
        extractor: Arc<dyn AnswerExtractor>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            terms,
            search,
            fetcher,
            extractor,
            options,
        }
    }

    /// Wire the production collaborators from configuration
    ///
    /// Term generation and answer extraction share one [`LlmClient`].
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let llm = Arc::new(LlmClient::from_config(&config.generation)?);
        let search = create_search_provider(&config.search)?;
        let fetcher = Arc::new(HttpContentFetcher::new(&config.fetch)?);

        info!(
            generation = llm.backend().provider(),
            model = llm.backend().model_name(),
            search = search.provider(),
            "Pipeline collaborators ready"
        );

        Ok(Self::new(
            llm.clone(),
            search,
            fetcher,
            llm,
            OrchestratorOptions::from(&config.pipeline),
        ))
    }

    pub fn search_provider(&self) -> &'static str {
        self.search.provider()
    }

    /// Answer a query with candidates ranked by confidence
    pub async fn run(&self, query: &str) -> Result<RankedResultSet> {
        self.run_with_report(query).await.0
    }

    /// Like [`Orchestrator::run`], also returning per-stage counts
    #[instrument(skip_all, fields(query_chars = query.len()))]
    pub async fn run_with_report(&self, query: &str) -> (Result<RankedResultSet>, PipelineReport) {
        let started = Instant::now();
        let mut report = PipelineReport::default();

        let result = self.execute(query, &mut report).await;
        report.elapsed_ms = elapsed_ms(started);

        let outcome = match &result {
            Ok(_) => "success",
            Err(AppError::NoResults) => "no_results",
            Err(_) => "error",
        };
        metrics::record_pipeline(outcome, started.elapsed().as_secs_f64(), report.candidates);

        info!(
            outcome,
            terms = report.terms,
            hits = report.hits,
            documents = report.fetch.succeeded,
            candidates = report.candidates,
            discarded = report.discarded,
            elapsed_ms = report.elapsed_ms,
            "Pipeline finished"
        );

        (result, report)
    }

    async fn execute(&self, query: &str, report: &mut PipelineReport) -> Result<RankedResultSet> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("query must not be empty", Some("query")));
        }

        let terms = self.generate_terms(query).await?;
        report.terms = terms.len();
        if terms.is_empty() {
            return Err(AppError::NoResults);
        }

        let hits = self.search_all(terms, report).await;
        report.hits = hits.len();

        let documents = self.fetch_all(hits, report).await;
        let candidates = self.extract_all(documents, query, report).await;
        report.candidates = candidates.len();

        if candidates.is_empty() {
            return Err(AppError::NoResults);
        }

        Ok(rank(candidates, self.options.max_results))
    }

    /// Stage 1: failure here is fatal for the request
    async fn generate_terms(&self, query: &str) -> Result<Vec<String>> {
        let call_timeout = self.options.call_timeout;
        let terms = tokio::time::timeout(call_timeout, self.terms.generate_terms(query))
            .await
            .map_err(|_| AppError::Timeout {
                operation: "generate".to_string(),
                timeout_ms: call_timeout.as_millis() as u64,
            })??;

        debug!(?terms, "Generated search terms");
        Ok(terms)
    }

    /// Stage 2: one search per term, each truncated to `hits_per_term`, concatenated in term order
    async fn search_all(&self, terms: Vec<String>, report: &mut PipelineReport) -> Vec<Hit> {
        let started = Instant::now();
        let settled = fan_out("search", terms, self.options.limits(), |term: String| {
            let search = Arc::clone(&self.search);
            (term.clone(), async move { search.search(&term).await })
        })
        .await;

        report.search = StageStats::from_settled(&settled, elapsed_ms(started));
        metrics::record_stage("search", &report.search);

        flatten_hits(settled, self.options.hits_per_term)
    }

    /// Stage 3: fetch every hit; failed URLs are dropped
    async fn fetch_all(&self, hits: Vec<Hit>, report: &mut PipelineReport) -> Vec<Document> {
        let started = Instant::now();
        let settled = fan_out("fetch", hits, self.options.limits(), |hit: Hit| {
            let fetcher = Arc::clone(&self.fetcher);
            let url = hit.url;
            (url.clone(), async move {
                fetcher.fetch(&url).await.map(|text| Document { url, text })
            })
        })
        .await;

        report.fetch = StageStats::from_settled(&settled, elapsed_ms(started));
        metrics::record_stage("fetch", &report.fetch);

        settled
            .into_iter()
            .filter_map(|item| match item.outcome {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(url = %item.key, error = %e, "Fetch failed; skipping page");
                    None
                }
            })
            .collect()
    }

    /// Stage 4: extract an answer from every document against the user query
    async fn extract_all(
        &self,
        documents: Vec<Document>,
        query: &str,
        report: &mut PipelineReport,
    ) -> Vec<Candidate> {
        let started = Instant::now();
        let settled = fan_out("extract", documents, self.options.limits(), |doc: Document| {
            let extractor = Arc::clone(&self.extractor);
            (doc.url.clone(), async move { extractor.analyze(&doc.text, query).await })
        })
        .await;

        report.extract = StageStats::from_settled(&settled, elapsed_ms(started));
        metrics::record_stage("extract", &report.extract);

        let mut candidates = Vec::with_capacity(settled.len());
        for item in settled {
            match item.outcome {
                Ok(extraction) => match extraction.into_candidate(&item.key) {
                    Some(candidate) => candidates.push(candidate),
                    None => {
                        debug!(url = %item.key, "Extraction had no usable answer");
                        report.discarded += 1;
                    }
                },
                Err(e) => warn!(url = %item.key, error = %e, "Extraction failed; skipping page"),
            }
        }

        candidates
    }
}

fn flatten_hits(settled: Vec<Settled<String, Vec<Hit>>>, hits_per_term: usize) -> Vec<Hit> {
    let mut hits = Vec::new();
    for item in settled {
        match item.outcome {
            Ok(term_hits) => hits.extend(term_hits.into_iter().take(hits_per_term)),
            Err(e) => warn!(term = %item.key, error = %e, "Search failed; term contributes no hits"),
        }
    }
    hits
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
