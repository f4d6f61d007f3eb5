//! In-memory fakes of every external capability.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use pbi_context::agent::message::{ChatRequest, ChatResponse};
use pbi_context::agent::prompt::PLANNER_SYSTEM_PROMPT;
use pbi_context::agent::provider::LlmProvider;
use pbi_context::core::RerankerModel;
use pbi_context::error::{AgentError, RetrievalError};
use pbi_context::retrieval::{
    Embedder, MetadataFilter, Reranker, RerankerPool, VectorStore,
};
use pbi_context::{
    AssistantConfig, Candidate, CollectionCatalog, FusionWeightTable, Orchestrator, Services,
    ToolAdapter,
};

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

/// Answers planner and structured-query calls from fixed scripts.
///
/// `None` for a script makes that call fail at the transport level.
#[derive(Default)]
pub struct ScriptedLlm {
    planner: Option<String>,
    self_query: Option<String>,
    planner_calls: AtomicUsize,
    self_query_calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(planner: Option<&str>, self_query: Option<&str>) -> Self {
        Self {
            planner: planner.map(str::to_string),
            self_query: self_query.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn planner_calls(&self) -> usize {
        self.planner_calls.load(Ordering::SeqCst)
    }

    pub fn self_query_calls(&self) -> usize {
        self.self_query_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.planner_calls() + self.self_query_calls()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let is_planner = request
            .messages
            .first()
            .is_some_and(|m| m.content == PLANNER_SYSTEM_PROMPT);
        let reply = if is_planner {
            self.planner_calls.fetch_add(1, Ordering::SeqCst);
            &self.planner
        } else {
            self.self_query_calls.fetch_add(1, Ordering::SeqCst);
            &self.self_query
        };
        reply
            .clone()
            .map(ChatResponse::text)
            .ok_or_else(|| AgentError::ApiRequest {
                message: "scripted failure".to_string(),
                status: Some(503),
            })
    }
}

// ---------------------------------------------------------------------------
// Vector store
// ---------------------------------------------------------------------------

/// One recorded search call.
#[derive(Debug, Clone)]
pub struct SearchRecord {
    pub collection: String,
    pub k: usize,
    pub filter: Option<MetadataFilter>,
}

/// Collections held in memory; stored order is similarity order.
#[derive(Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Candidate>>,
    report_ids: Vec<String>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    searches: Mutex<Vec<SearchRecord>>,
    payload_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, store_name: &str, candidates: Vec<Candidate>) -> Self {
        self.collections.insert(store_name.to_string(), candidates);
        self
    }

    pub fn with_reports(mut self, ids: &[&str]) -> Self {
        self.report_ids = ids.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn failing(mut self, store_name: &str) -> Self {
        self.failing.insert(store_name.to_string());
        self
    }

    pub fn delayed(mut self, store_name: &str, delay: Duration) -> Self {
        self.delays.insert(store_name.to_string(), delay);
        self
    }

    pub fn searches(&self) -> Vec<SearchRecord> {
        self.searches.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn searched(&self) -> Vec<String> {
        let mut names: Vec<String> = self.searches().into_iter().map(|s| s.collection).collect();
        names.sort();
        names
    }

    pub fn payload_reads(&self) -> usize {
        self.payload_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn search(
        &self,
        collection: &str,
        _vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(SearchRecord {
                collection: collection.to_string(),
                k,
                filter: filter.cloned(),
            });
        }
        if let Some(delay) = self.delays.get(collection) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(collection) {
            return Err(RetrievalError::Store {
                collection: collection.to_string(),
                message: "connection refused".to_string(),
            });
        }
        let Some(points) = self.collections.get(collection) else {
            return Err(RetrievalError::Store {
                collection: collection.to_string(),
                message: "collection not found".to_string(),
            });
        };
        Ok(points
            .iter()
            .filter(|c| filter.is_none_or(|f| f.matches(c)))
            .take(k)
            .cloned()
            .collect())
    }

    async fn first_payload(
        &self,
        collection: &str,
    ) -> Result<Option<Map<String, Value>>, RetrievalError> {
        self.payload_reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(collection) {
            return Err(RetrievalError::Store {
                collection: collection.to_string(),
                message: "connection refused".to_string(),
            });
        }
        if self.report_ids.is_empty() {
            return Ok(None);
        }
        let mut payload = Map::new();
        payload.insert("page_content".to_string(), json!(self.report_ids));
        Ok(Some(payload))
    }
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

/// Deterministic bag-of-bytes embedding.
#[derive(Default)]
pub struct HashEmbedder {
    pub fail: bool,
    texts: Mutex<Vec<String>>,
}

impl HashEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Texts embedded so far, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
        if self.fail {
            return Err(RetrievalError::Embedding {
                message: "model unavailable".to_string(),
            });
        }
        let mut v = vec![0.0_f32; 16];
        for b in text.bytes() {
            v[usize::from(b) % 16] += 1.0;
        }
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Reranker
// ---------------------------------------------------------------------------

/// Scores passages by how many query words they contain.
pub struct KeywordReranker {
    model: RerankerModel,
    calls: Arc<AtomicUsize>,
}

impl Reranker for KeywordReranker {
    fn model_id(&self) -> &str {
        self.model.id()
    }

    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .filter(|w| w.len() > 2)
            .collect();
        Ok(passages
            .iter()
            .map(|p| {
                let p = p.to_lowercase();
                #[allow(clippy::cast_precision_loss)]
                let hits = words.iter().filter(|w| p.contains(w.as_str())).count() as f32;
                hits
            })
            .collect())
    }
}

/// Hands out keyword rerankers and records what was asked for.
#[derive(Default)]
pub struct KeywordPool {
    calls: Arc<AtomicUsize>,
    requested: Mutex<Vec<(RerankerModel, usize)>>,
}

impl KeywordPool {
    /// Number of `score` calls across all rerankers.
    pub fn score_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<(RerankerModel, usize)> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl RerankerPool for KeywordPool {
    fn get(
        &self,
        model: RerankerModel,
        max_length: usize,
    ) -> Result<Arc<dyn Reranker>, RetrievalError> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push((model, max_length));
        }
        Ok(Arc::new(KeywordReranker {
            model,
            calls: Arc::clone(&self.calls),
        }))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Handles to the fakes behind one orchestrator.
pub struct Harness {
    pub llm: Arc<ScriptedLlm>,
    pub store: Arc<MemoryStore>,
    pub embedder: Arc<HashEmbedder>,
    pub rerankers: Arc<KeywordPool>,
    pub adapter: ToolAdapter,
}

impl Harness {
    pub fn orchestrator(&self) -> &Orchestrator {
        self.adapter.orchestrator()
    }
}

/// Configuration that ignores any prompt overrides on the machine.
pub fn test_config() -> AssistantConfig {
    AssistantConfig::builder()
        .prompt_dir("/nonexistent/pbi-context-test-prompts")
        .search_timeout(Duration::from_millis(500))
        .rerank_timeout(Duration::from_secs(5))
        .llm_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| unreachable!())
}

pub fn harness(llm: ScriptedLlm, store: MemoryStore) -> Harness {
    harness_with(llm, store, HashEmbedder::default(), &test_config())
}

pub fn harness_with(
    llm: ScriptedLlm,
    store: MemoryStore,
    embedder: HashEmbedder,
    config: &AssistantConfig,
) -> Harness {
    let llm = Arc::new(llm);
    let store = Arc::new(store);
    let embedder = Arc::new(embedder);
    let rerankers = Arc::new(KeywordPool::default());

    let services = Services::new(
        Arc::clone(&store) as Arc<dyn VectorStore>,
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        Arc::clone(&rerankers) as Arc<dyn RerankerPool>,
    )
    .with_llm(Arc::clone(&llm) as Arc<dyn LlmProvider>);

    let orchestrator = Orchestrator::new(
        services,
        CollectionCatalog::power_bi(),
        FusionWeightTable::power_bi(),
        config,
    )
    .unwrap_or_else(|_| unreachable!());

    Harness {
        llm,
        store,
        embedder,
        rerankers,
        adapter: ToolAdapter::new(Arc::new(orchestrator)),
    }
}

/// A detailed-element candidate belonging to `report`.
pub fn element(id: &str, text: &str, report: &str) -> Candidate {
    Candidate::new(id, text, 0.5)
        .with_metadata("Id", report)
        .with_metadata("insertion_year", "2024")
        .with_metadata("insertion_month", "03")
        .with_metadata("insertion_day", "15")
        .with_metadata("page", 2)
}

/// The store used by most tests.
pub fn power_bi_store() -> MemoryStore {
    MemoryStore::new()
        .with_reports(&["Ventas", "Finanzas", "Recursos Humanos"])
        .with_collection(
            "report_names",
            vec![
                Candidate::new("r1", "Ventas", 0.9),
                Candidate::new("r2", "Finanzas", 0.8),
                Candidate::new("r3", "Recursos Humanos", 0.7),
            ],
        )
        .with_collection(
            "element_names",
            vec![
                Candidate::new("n1", "Ventas: Revenue KPI, Margin table", 0.9)
                    .with_metadata("report_id", "Ventas"),
                Candidate::new("n2", "Finanzas: Cash flow chart", 0.8)
                    .with_metadata("report_id", "Finanzas"),
            ],
        )
        .with_collection(
            "upload_dates",
            vec![
                Candidate::new("d1", "Ventas updated 2024-03-15", 0.9)
                    .with_metadata("report_id", "Ventas"),
                Candidate::new("d2", "Finanzas updated 2024-02-01", 0.8)
                    .with_metadata("report_id", "Finanzas"),
            ],
        )
        .with_collection(
            "report_sum",
            vec![
                Candidate::new("s1", "Ventas summary: revenue grew in March", 0.9)
                    .with_metadata("Report_Id", "Ventas")
                    .with_metadata("insertion_year", "2024"),
            ],
        )
        .with_collection(
            "table_elements",
            vec![
                element("e1", "Revenue KPI: 1.2M euros in March", "Ventas"),
                element("e2", "Margin table by region", "Ventas"),
                element("e3", "Cash flow chart quarterly", "Finanzas"),
                element("e4", "Headcount KPI 340 employees", "Recursos Humanos"),
                element("e5", "Revenue by region bar chart", "Ventas"),
                element("e6", "Operating expenses table", "Finanzas"),
                element("e7", "Attrition rate KPI", "Recursos Humanos"),
            ],
        )
        .with_collection(
            "text_pages",
            vec![
                Candidate::new("t1", "Page 1 of Ventas: revenue overview", 0.9)
                    .with_metadata("Report_Id", "Ventas"),
                Candidate::new("t2", "Page 3 of Finanzas: cash position", 0.8)
                    .with_metadata("Report_Id", "Finanzas"),
            ],
        )
}
