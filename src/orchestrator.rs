//! Multi-collection retrieval orchestrator.
//!
//! One request runs: plan → (self-query profiles) structured query →
//! embed → fan-out of per-collection search and rerank → weighted fusion.
//!
//! The planning and structured-query calls gate the fan-out. Each planned
//! collection then runs in its own task with its own failure boundary; a
//! failed or timed-out collection is dropped and its siblings continue.
//! Fusion depends only on scores, ranks and weights, never on the order in
//! which tasks finish.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::agent::planner::CollectionPlanner;
use crate::agent::prompt::PromptSet;
use crate::agent::self_query::SelfQueryAgent;
use crate::config::AssistantConfig;
use crate::core::catalog::REPORT_NAMES;
use crate::core::{
    Candidate, CollectionCatalog, CollectionDescriptor, CollectionPlan, FusedCandidate,
    QueryContext, RetrievalStrategy,
};
use crate::error::{ConfigError, RetrievalError};
use crate::retrieval::{
    CollectionRetriever, FilterPlan, FusionMethod, FusionWeightTable, MetadataFilter,
    ReportCatalog, ReportCatalogCache, RetrieverRegistry, SearchQuery, fuse, rerank_candidates,
};
use crate::services::Services;

/// Result of one retrieval request.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    /// The plan that was executed.
    pub plan: CollectionPlan,
    /// Fused candidates, best first.
    pub fused: Vec<FusedCandidate>,
    /// Collections dropped because retrieval or reranking failed.
    pub failed: Vec<String>,
    /// Filter values applied by the self-query strategy.
    pub filters: Option<FilterPlan>,
    /// Wall-clock time of the request.
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl RetrievalOutcome {
    /// Returns `true` when no usable candidate came out of fusion.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fused.is_empty()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::trivially_copy_pass_by_ref, clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Per-collection work item handed to a fan-out task.
struct CollectionJob {
    retriever: Arc<dyn CollectionRetriever>,
    depth: usize,
    filter: Option<MetadataFilter>,
}

/// Coordinates planning, retrieval, reranking and fusion.
pub struct Orchestrator {
    services: Services,
    catalog: Arc<CollectionCatalog>,
    weights: FusionWeightTable,
    registry: RetrieverRegistry,
    planner: CollectionPlanner,
    self_query: SelfQueryAgent,
    reports: ReportCatalogCache,
    fusion: FusionMethod,
    search_timeout: Duration,
    rerank_timeout: Duration,
    max_concurrency: usize,
}

impl Orchestrator {
    /// Creates an orchestrator with one vector retriever per catalog
    /// collection.
    ///
    /// Prompt templates are loaded from [`AssistantConfig::prompt_dir`],
    /// falling back to the compiled-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCollection`] if the catalog lacks the
    /// `report_names` collection the report catalog is read from.
    pub fn new(
        services: Services,
        catalog: CollectionCatalog,
        weights: FusionWeightTable,
        config: &AssistantConfig,
    ) -> Result<Self, ConfigError> {
        let registry =
            RetrieverRegistry::for_catalog(&catalog, &services.store, config.search_timeout);
        Self::with_registry(services, catalog, weights, registry, config)
    }

    /// Creates an orchestrator with a caller-supplied retriever registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRetriever`] if a catalog collection has
    /// no retriever, or [`ConfigError::UnknownCollection`] if the catalog
    /// lacks `report_names`.
    pub fn with_registry(
        services: Services,
        catalog: CollectionCatalog,
        weights: FusionWeightTable,
        registry: RetrieverRegistry,
        config: &AssistantConfig,
    ) -> Result<Self, ConfigError> {
        registry.validate(&catalog)?;
        let report_store_name = catalog
            .get(REPORT_NAMES)
            .map(|d| d.store_name.clone())
            .ok_or_else(|| ConfigError::UnknownCollection {
                name: REPORT_NAMES.to_string(),
            })?;

        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let reports = ReportCatalogCache::new(
            Arc::clone(&services.store),
            report_store_name,
            config.search_timeout,
        );

        Ok(Self {
            planner: CollectionPlanner::new(config, prompts.planner),
            self_query: SelfQueryAgent::new(config, prompts.self_query),
            services,
            catalog: Arc::new(catalog),
            weights,
            registry,
            reports,
            fusion: config.fusion,
            search_timeout: config.search_timeout,
            rerank_timeout: config.rerank_timeout,
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    /// The collection catalog.
    #[must_use]
    pub fn catalog(&self) -> &CollectionCatalog {
        &self.catalog
    }

    /// The fusion weights.
    #[must_use]
    pub const fn weights(&self) -> &FusionWeightTable {
        &self.weights
    }

    /// Valid report identifiers, fetched once and shared.
    pub async fn report_catalog(&self) -> ReportCatalog {
        self.reports.get().await
    }

    /// Plans `ctx` without retrieving anything.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for configuration defects only.
    pub async fn plan(&self, ctx: &QueryContext) -> Result<CollectionPlan, ConfigError> {
        self.planner
            .plan(self.services.llm.as_deref(), ctx, &self.catalog)
            .await
    }

    /// Runs the full retrieval pipeline for `ctx`.
    ///
    /// An empty plan, or a plan whose collections all fail, yields an
    /// outcome with no candidates rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for configuration defects only.
    #[instrument(
        name = "retrieve",
        skip(self, ctx),
        fields(profile = ctx.profile.label, report = ctx.report_filter.report())
    )]
    pub async fn retrieve(&self, ctx: &QueryContext) -> Result<RetrievalOutcome, ConfigError> {
        let start = Instant::now();
        let plan = self.plan(ctx).await?;

        let mut jobs: Vec<(String, CollectionJob)> = Vec::with_capacity(plan.len());
        for entry in plan.entries() {
            let retriever =
                self.registry
                    .get(&entry.collection)
                    .ok_or_else(|| ConfigError::MissingRetriever {
                        collection: entry.collection.clone(),
                    })?;
            jobs.push((
                entry.collection.clone(),
                CollectionJob {
                    retriever,
                    depth: entry.depth,
                    filter: None,
                },
            ));
        }

        if jobs.is_empty() {
            info!("no usable collections in plan");
            return Ok(RetrievalOutcome {
                plan,
                fused: Vec::new(),
                failed: Vec::new(),
                filters: None,
                elapsed: start.elapsed(),
            });
        }

        let question = ctx.augmented_query();
        let (search_text, filters) = match ctx.profile.strategy {
            RetrievalStrategy::Plain => (question.clone(), None),
            RetrievalStrategy::SelfQuery => {
                let descriptors: Vec<&CollectionDescriptor> =
                    jobs.iter().map(|(_, job)| job.retriever.descriptor()).collect();
                self.structure(ctx, &question, &descriptors).await
            }
        };

        if let Some(filters) = &filters {
            for (_, job) in &mut jobs {
                job.filter = filters.for_collection(job.retriever.descriptor());
            }
        }

        let query = match self.embed(&search_text).await {
            Ok(vector) => SearchQuery::new(search_text, vector),
            Err(e) => {
                warn!(error = %e, "query embedding failed; no collection can be searched");
                return Ok(RetrievalOutcome {
                    plan,
                    fused: Vec::new(),
                    failed: jobs.into_iter().map(|(name, _)| name).collect(),
                    filters,
                    elapsed: start.elapsed(),
                });
            }
        };

        let results = self.fan_out(ctx, &question, query, jobs).await;

        let mut per_collection: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        let mut failed = Vec::new();
        for (collection, result) in results {
            match result {
                Ok(candidates) => {
                    per_collection.insert(collection, candidates);
                }
                Err(e) => {
                    warn!(collection = %collection, error = %e, "dropping collection");
                    failed.push(collection);
                }
            }
        }

        let fused = fuse(&per_collection, &self.weights, self.fusion);
        debug_assert!(fused.len() <= plan.total_depth());

        let elapsed = start.elapsed();
        info!(
            plan = %plan,
            fused = fused.len(),
            failed = failed.len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "retrieval complete"
        );

        Ok(RetrievalOutcome {
            plan,
            fused,
            failed,
            filters,
            elapsed,
        })
    }

    /// Runs the structured-query step for the self-query strategy.
    ///
    /// Returns the search text and the validated filter values. Skipped
    /// when no planned collection is filterable.
    async fn structure(
        &self,
        ctx: &QueryContext,
        question: &str,
        descriptors: &[&CollectionDescriptor],
    ) -> (String, Option<FilterPlan>) {
        if !descriptors.iter().any(|d| d.is_filterable()) {
            return (question.to_string(), None);
        }

        let reports = self.reports.get().await;
        let structured = match self.services.llm.as_deref() {
            Some(provider) => match self
                .self_query
                .structure(provider, question, &reports, descriptors)
                .await
            {
                Ok(sq) => Some(sq),
                Err(e) => {
                    warn!(error = %e, "structured query failed; using the selected report only");
                    None
                }
            },
            None => None,
        };

        let filters = FilterPlan::resolve(&ctx.report_filter, structured.as_ref(), &reports);
        let search_text = structured
            .map(|sq| sq.query)
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| question.to_string());

        debug!(search_text = %search_text, filters = ?filters, "self-query resolved");
        (search_text, (!filters.is_empty()).then_some(filters))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let embedder = Arc::clone(&self.services.embedder);
        let text = text.to_string();
        let task = tokio::task::spawn_blocking(move || embedder.embed(&text));

        match tokio::time::timeout(self.search_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RetrievalError::Embedding {
                message: format!("embedding task failed: {e}"),
            }),
            Err(_) => Err(RetrievalError::Embedding {
                message: format!(
                    "embedding timed out after {}s",
                    self.search_timeout.as_secs()
                ),
            }),
        }
    }

    /// Retrieves and reranks every planned collection concurrently.
    ///
    /// Results come back in plan order.
    #[instrument(name = "fan_out", skip_all, fields(collections = jobs.len()))]
    async fn fan_out(
        &self,
        ctx: &QueryContext,
        question: &str,
        query: SearchQuery,
        jobs: Vec<(String, CollectionJob)>,
    ) -> Vec<(String, Result<Vec<Candidate>, RetrievalError>)> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let query = Arc::new(query);
        let question: Arc<str> = Arc::from(question);
        let strategy = ctx.profile.strategy;
        let model = ctx.profile.reranker_model;
        let max_length = ctx.profile.max_passage_length;

        let mut handles = Vec::with_capacity(jobs.len());
        for (collection, job) in jobs {
            let sem = Arc::clone(&semaphore);
            let query = Arc::clone(&query);
            let question = Arc::clone(&question);
            let pool = Arc::clone(&self.services.rerankers);
            let rerank_timeout = self.rerank_timeout;
            let name = collection.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| RetrievalError::TaskFailed {
                        collection: name.clone(),
                        message: format!("semaphore closed: {e}"),
                    })?;

                if job.depth == 0 {
                    debug!(collection = %name, "depth 0, skipping");
                    return Ok(Vec::new());
                }

                let candidates = job
                    .retriever
                    .retrieve(&query, strategy, job.depth, job.filter.as_ref())
                    .await?;

                let depth = job.depth;
                let rerank = tokio::task::spawn_blocking(move || {
                    let reranker = pool.get(model, max_length)?;
                    rerank_candidates(&*reranker, &question, candidates, depth, max_length)
                });

                match tokio::time::timeout(rerank_timeout, rerank).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => Err(RetrievalError::TaskFailed {
                        collection: name,
                        message: format!("rerank task failed: {e}"),
                    }),
                    Err(_) => Err(RetrievalError::Timeout {
                        collection: name,
                        stage: "rerank",
                        seconds: rerank_timeout.as_secs(),
                    }),
                }
            });
            handles.push((collection, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (collection, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(RetrievalError::TaskFailed {
                    collection: collection.clone(),
                    message: format!("task join failed: {e}"),
                }),
            };
            results.push((collection, result));
        }
        results
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("services", &self.services)
            .field("collections", &self.catalog.len())
            .field("registry", &self.registry)
            .field("fusion", &self.fusion)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}
