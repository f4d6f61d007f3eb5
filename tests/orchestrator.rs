//! End-to-end retrieval through in-memory fakes.

#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{HashEmbedder, MemoryStore, ScriptedLlm, harness, harness_with, power_bi_store, test_config};
use pbi_context::core::RerankerModel;
use pbi_context::core::catalog::{ELEMENTS, REPORT_NAMES, TEXT_PAGES};
use pbi_context::retrieval::{FieldCondition, RerankerPool, VectorStore, Embedder};
use pbi_context::{
    CollectionCatalog, CollectionPlan, ConfigError, FusionWeightTable, Orchestrator, ProfileName,
    QueryContext, ReportFilter, RetrievalProfile, Services,
};

fn ctx(query: &str, report: Option<&str>, profile: ProfileName) -> QueryContext {
    QueryContext::new(query, ReportFilter::parse(report), profile.profile())
}

fn assert_non_increasing(scores: &[f32]) {
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1], "scores not sorted: {scores:?}");
    }
}

#[tokio::test]
async fn test_max_speed_uses_fixed_plan_without_llm() {
    let h = harness(ScriptedLlm::new(Some("{}"), None), power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("revenue KPI", None, ProfileName::MaxSpeed))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(outcome.plan, CollectionPlan::single(ELEMENTS, 3));
    assert_eq!(h.llm.total_calls(), 0);
    assert!(outcome.fused.len() <= 3);
    assert!(!outcome.fused.is_empty());
    assert_eq!(h.rerankers.requested(), [(RerankerModel::TinyBertL2, 128)]);
}

#[tokio::test]
async fn test_efficient_uses_fixed_plan_without_llm() {
    let h = harness(ScriptedLlm::new(Some("{}"), Some("{}")), power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("anything at all", None, ProfileName::Efficient))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(outcome.plan, CollectionPlan::single(ELEMENTS, 5));
    assert_eq!(h.llm.total_calls(), 0);
    assert_eq!(outcome.fused.len(), 5);
    assert_eq!(h.rerankers.requested(), [(RerankerModel::MiniLmL12, 256)]);
}

#[tokio::test]
async fn test_high_precision_forces_depth_six() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Elements","n":3},{"name":"Text Pages","n":1}]}"#),
        Some(r#"{"query": "revenue", "report_ids": []}"#),
    );
    let h = harness(llm, power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("revenue by region", None, ProfileName::HighPrecision))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(outcome.plan.depth_of(ELEMENTS), Some(6));
    assert_eq!(outcome.plan.depth_of(TEXT_PAGES), Some(6));
    let from_elements = outcome.fused.iter().filter(|f| f.collection == ELEMENTS).count();
    assert_eq!(from_elements, 6);
}

#[tokio::test]
async fn test_max_accuracy_forces_depth_twelve() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Elements","n":2}]}"#),
        Some(r#"{"query": "revenue"}"#),
    );
    let h = harness(llm, power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("revenue", None, ProfileName::MaxAccuracy))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(outcome.plan.entries().len(), 1);
    assert_eq!(outcome.plan.depth_of(ELEMENTS), Some(12));
    // Only seven elements are indexed.
    assert_eq!(outcome.fused.len(), 7);
    let searches = h.store.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].k, 20);
}

#[tokio::test]
async fn test_unparseable_plan_retrieves_nothing() {
    let h = harness(ScriptedLlm::new(Some("not json"), None), power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("q", None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert!(outcome.plan.is_empty());
    assert!(outcome.is_empty());
    assert!(h.store.searches().is_empty());
    assert_eq!(h.llm.self_query_calls(), 0);
}

#[tokio::test]
async fn test_report_names_scenario_skips_filter() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"report_names","n":8}]}"#),
        Some(r#"{"query": "reports", "report_ids": ["Ventas"]}"#),
    );
    let h = harness(llm, power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("What reports are available?", None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(outcome.plan, CollectionPlan::single(REPORT_NAMES, 8));
    // report_names carries no report-id field: no structured query, no predicate.
    assert_eq!(h.llm.self_query_calls(), 0);
    let searches = h.store.searches();
    assert_eq!(searches.len(), 1);
    assert!(searches[0].filter.is_none());

    assert!(outcome.fused.len() <= 8);
    let ids: Vec<&str> = outcome.fused.iter().map(|f| f.candidate.id.as_str()).collect();
    // One collection and equal rerank scores: rerank order is kept.
    assert_eq!(ids, ["r1", "r2", "r3"]);
    let scores: Vec<f32> = outcome.fused.iter().map(|f| f.candidate.score).collect();
    assert_non_increasing(&scores);
}

#[tokio::test]
async fn test_efficient_report_filter_is_query_augmentation() {
    let h = harness(ScriptedLlm::new(None, None), power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("When was it last updated?", Some("Ventas"), ProfileName::Efficient))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(outcome.plan, CollectionPlan::single(ELEMENTS, 5));
    assert_eq!(h.llm.total_calls(), 0);
    assert!(outcome.filters.is_none());

    let searches = h.store.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].collection, "table_elements");
    assert_eq!(searches[0].k, 10);
    assert!(searches[0].filter.is_none());

    assert_eq!(
        h.embedder.texts(),
        ["When was it last updated? filter results for the report Ventas"]
    );
    assert!(outcome.fused.iter().all(|f| f.collection == ELEMENTS));
    assert_eq!(outcome.fused.len(), 5);
}

#[tokio::test]
async fn test_self_query_builds_validated_predicate() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Elements","n":3}]}"#),
        Some(
            r#"{"query": "revenue", "report_ids": ["Ventas", "Marketing"],
                "insertion_year": "2024", "insertion_month": "13"}"#,
        ),
    );
    let h = harness(llm, power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("revenue in Ventas during 2024", None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(h.llm.self_query_calls(), 1);
    let searches = h.store.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].k, 20);
    let filter = searches[0]
        .filter
        .clone()
        .unwrap_or_else(|| panic!("expected a metadata filter"));
    assert_eq!(
        filter.conditions(),
        [
            FieldCondition::Equals {
                field: "Id".to_string(),
                value: "Ventas".to_string(),
            },
            FieldCondition::Equals {
                field: "insertion_year".to_string(),
                value: "2024".to_string(),
            },
        ]
    );
    assert_eq!(h.embedder.texts(), ["revenue"]);
    assert!(outcome.fused.iter().all(|f| f.candidate.metadata["Id"] == "Ventas"));

    // The structured-query prompt lists the valid reports.
    let requests = h.llm.requests();
    let self_query = requests
        .iter()
        .find(|r| r.messages[1].content.contains("<valid_report_ids>"))
        .unwrap_or_else(|| panic!("no structured-query request"));
    assert!(
        self_query.messages[1]
            .content
            .contains("<valid_report_ids>Finanzas,Recursos Humanos,Ventas</valid_report_ids>")
    );
}

#[tokio::test]
async fn test_selected_report_overrides_model_choice() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Elements","n":3}]}"#),
        Some(r#"{"query": "cash", "report_ids": ["Ventas"]}"#),
    );
    let h = harness(llm, power_bi_store());
    h.orchestrator()
        .retrieve(&ctx("cash flow", Some("Finanzas"), ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    let filter = h.store.searches()[0].filter.clone().unwrap_or_default();
    assert_eq!(
        filter.conditions(),
        [FieldCondition::Equals {
            field: "Id".to_string(),
            value: "Finanzas".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_structured_query_failure_falls_back_to_selected_report() {
    let llm = ScriptedLlm::new(Some(r#"{"collections":[{"name":"Elements","n":3}]}"#), None);
    let h = harness(llm, power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("cash flow", Some("Finanzas"), ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(h.llm.self_query_calls(), 1);
    let filter = h.store.searches()[0].filter.clone().unwrap_or_default();
    assert_eq!(filter.conditions().len(), 1);
    assert!(!outcome.is_empty());
    assert!(
        outcome
            .fused
            .iter()
            .all(|f| f.candidate.metadata["Id"] == "Finanzas")
    );
    // Search text falls back to the augmented question.
    assert_eq!(
        h.embedder.texts(),
        ["cash flow filter results for the report Finanzas"]
    );
}

#[tokio::test]
async fn test_failed_collection_is_dropped() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Elements","n":3},{"name":"Text Pages","n":2}]}"#),
        Some(r#"{"query": "revenue"}"#),
    );
    let h = harness(llm, power_bi_store().failing("text_pages"));
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("revenue", None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(outcome.failed, [TEXT_PAGES]);
    assert_eq!(outcome.fused.len(), 3);
    assert!(outcome.fused.iter().all(|f| f.collection == ELEMENTS));
}

#[tokio::test]
async fn test_timed_out_collection_does_not_cancel_siblings() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Elements","n":3},{"name":"Text Pages","n":2}]}"#),
        Some(r#"{"query": "revenue"}"#),
    );
    let store = power_bi_store().delayed("text_pages", Duration::from_secs(3));
    let h = harness(llm, store);
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("revenue", None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(outcome.failed, [TEXT_PAGES]);
    assert_eq!(outcome.fused.len(), 3);
}

#[tokio::test]
async fn test_every_collection_failing_is_empty() {
    let h = harness(
        ScriptedLlm::new(None, None),
        power_bi_store().failing("table_elements"),
    );
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("revenue", None, ProfileName::MaxSpeed))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert!(outcome.is_empty());
    assert_eq!(outcome.failed, [ELEMENTS]);
}

#[tokio::test]
async fn test_embedding_failure_is_empty() {
    let h = harness_with(
        ScriptedLlm::new(None, None),
        power_bi_store(),
        HashEmbedder::failing(),
        &test_config(),
    );
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("revenue", None, ProfileName::Efficient))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert!(outcome.is_empty());
    assert!(h.store.searches().is_empty());
}

#[tokio::test]
async fn test_zero_depth_collection_skips_search_and_rerank() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Elements","n":0},{"name":"report_names","n":2}]}"#),
        Some(r#"{"query": "q"}"#),
    );
    let h = harness(llm, power_bi_store());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("Ventas reports", None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    assert_eq!(h.store.searched(), ["report_names"]);
    assert_eq!(h.rerankers.score_calls(), 1);
    assert_eq!(outcome.fused.len(), 2);
    assert!(outcome.failed.is_empty());
}

#[tokio::test]
async fn test_fusion_order_ignores_completion_order() {
    let plan = r#"{"collections":[{"name":"Elements","n":3},{"name":"Text Pages","n":2},{"name":"report_names","n":2}]}"#;
    let query = "revenue Ventas overview";

    let fast = harness(ScriptedLlm::new(Some(plan), Some(r#"{"query": "revenue"}"#)), power_bi_store());
    let slow_store = power_bi_store()
        .delayed("table_elements", Duration::from_millis(150))
        .delayed("report_names", Duration::from_millis(50));
    let slow = harness(ScriptedLlm::new(Some(plan), Some(r#"{"query": "revenue"}"#)), slow_store);

    let a = fast
        .orchestrator()
        .retrieve(&ctx(query, None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));
    let b = slow
        .orchestrator()
        .retrieve(&ctx(query, None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    let ids = |o: &pbi_context::RetrievalOutcome| -> Vec<String> {
        o.fused
            .iter()
            .map(|f| format!("{}/{}", f.collection, f.candidate.id))
            .collect()
    };
    assert_eq!(ids(&a), ids(&b));
    assert!(a.fused.len() <= a.plan.total_depth());
}

#[tokio::test]
async fn test_higher_weight_wins_ties_across_collections() {
    // Both passages match the query equally; Elements weighs 0.3, Text Pages 0.2.
    let store = MemoryStore::new()
        .with_reports(&["Ventas"])
        .with_collection("report_names", Vec::new())
        .with_collection(
            "table_elements",
            vec![pbi_context::Candidate::new("e", "margin detail", 0.1)],
        )
        .with_collection(
            "text_pages",
            vec![pbi_context::Candidate::new("t", "margin page", 0.1)],
        );
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Text Pages","n":1},{"name":"Elements","n":1}]}"#),
        Some(r#"{"query": "margin"}"#),
    );
    let h = harness(llm, store);
    let outcome = h
        .orchestrator()
        .retrieve(&ctx("margin", None, ProfileName::Optimized))
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));

    let order: Vec<&str> = outcome.fused.iter().map(|f| f.collection.as_str()).collect();
    assert_eq!(order, [ELEMENTS, TEXT_PAGES]);
}

#[tokio::test]
async fn test_report_catalog_fetched_once() {
    let llm = ScriptedLlm::new(
        Some(r#"{"collections":[{"name":"Elements","n":3}]}"#),
        Some(r#"{"query": "revenue"}"#),
    );
    let h = harness(llm, power_bi_store());
    for _ in 0..3 {
        h.orchestrator()
            .retrieve(&ctx("revenue", None, ProfileName::Optimized))
            .await
            .unwrap_or_else(|e| panic!("retrieve failed: {e}"));
    }
    assert_eq!(h.store.payload_reads(), 1);
    assert_eq!(h.orchestrator().report_catalog().await.len(), 3);
}

#[tokio::test]
async fn test_llm_profile_without_provider_is_config_error() {
    let store = Arc::new(power_bi_store());
    let services = Services::new(
        store as Arc<dyn VectorStore>,
        Arc::new(HashEmbedder::default()) as Arc<dyn Embedder>,
        Arc::new(common::KeywordPool::default()) as Arc<dyn RerankerPool>,
    );
    let orchestrator = Orchestrator::new(
        services,
        CollectionCatalog::power_bi(),
        FusionWeightTable::power_bi(),
        &test_config(),
    )
    .unwrap_or_else(|_| unreachable!());

    let result = orchestrator
        .retrieve(&ctx("q", None, ProfileName::Optimized))
        .await;
    assert!(matches!(result, Err(ConfigError::ApiKeyMissing)));

    // Fixed profiles still work without one.
    let fixed = orchestrator
        .retrieve(&ctx("revenue", None, ProfileName::MaxSpeed))
        .await;
    assert!(matches!(fixed, Ok(o) if !o.is_empty()));
}

#[tokio::test]
async fn test_catalog_without_report_names_is_config_error() {
    let catalog = CollectionCatalog::new(
        CollectionCatalog::power_bi()
            .iter()
            .filter(|d| d.name != REPORT_NAMES)
            .cloned()
            .collect(),
    );
    let services = Services::new(
        Arc::new(power_bi_store()) as Arc<dyn VectorStore>,
        Arc::new(HashEmbedder::default()) as Arc<dyn Embedder>,
        Arc::new(common::KeywordPool::default()) as Arc<dyn RerankerPool>,
    );
    let result = Orchestrator::new(
        services,
        catalog,
        FusionWeightTable::power_bi(),
        &test_config(),
    );
    assert!(matches!(
        result,
        Err(ConfigError::UnknownCollection { name }) if name == REPORT_NAMES
    ));
}

#[tokio::test]
async fn test_origin_profile_plan() {
    let h = harness(ScriptedLlm::new(None, None), power_bi_store());
    let ctx = QueryContext::new("Revenue KPI", ReportFilter::All, RetrievalProfile::origin());
    let outcome = h
        .orchestrator()
        .retrieve(&ctx)
        .await
        .unwrap_or_else(|e| panic!("retrieve failed: {e}"));
    assert_eq!(outcome.plan, CollectionPlan::single(ELEMENTS, 3));
    assert_eq!(outcome.fused.len(), 3);
    assert_eq!(h.llm.total_calls(), 0);
}
