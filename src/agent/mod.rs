//! Language-model agents for collection planning and structured queries.
//!
//! Uses a pluggable provider abstraction backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! QueryContext
//!   ├── CollectionPlanner (fixed profiles: no call)
//!   │     └── {"collections": [{"name", "n"}]} → CollectionPlan
//!   └── SelfQueryAgent (self-query profiles, filterable collections only)
//!         └── {"query", "report_ids", "insertion_*"} → StructuredQuery
//! ```
//!
//! Both agents run before retrieval fans out. Model failures never cross
//! the agent boundary as errors: the planner degrades to an empty plan and
//! the orchestrator falls back to the selected report when the structured
//! query fails.

pub mod client;
pub mod message;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod self_query;
pub mod traits;

// Re-export key types
pub use client::create_provider;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use planner::CollectionPlanner;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use self_query::SelfQueryAgent;
pub use traits::{Agent, AgentResponse};
