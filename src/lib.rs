//! # pbi-context
//!
//! Multi-collection retrieval orchestrator for Power BI report assistants.
//!
//! A question about a set of indexed reports is answered from several
//! vector collections (report names, element index, upload dates, report
//! summaries, detailed elements, page text). Per request the crate:
//!
//! 1. resolves a [`RetrievalProfile`](core::RetrievalProfile) (reranker,
//!    passage length, planning mode);
//! 2. plans which collections to query and how many results each returns,
//!    either fixed or chosen by a planner model;
//! 3. for self-query profiles, turns the question into report and date
//!    filters validated against the real report catalog;
//! 4. searches and reranks every planned collection concurrently;
//! 5. fuses the lists with per-collection weights;
//! 6. hands the fragments plus fixed instructions to the calling agent
//!    through the Context and Origin tools.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pbi_context::{AssistantConfig, CollectionCatalog, FusionWeightTable, Orchestrator,
//!     ProfileName, Services, ToolAdapter};
//!
//! let config = AssistantConfig::from_env()?;
//! let services = Services::from_config(&config)?;
//! let orchestrator = Orchestrator::new(
//!     services,
//!     CollectionCatalog::power_bi(),
//!     FusionWeightTable::power_bi(),
//!     &config,
//! )?;
//! let tools = ToolAdapter::new(Arc::new(orchestrator));
//! let output = tools.context("What reports are available?", None, ProfileName::Optimized).await?;
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod orchestrator;
pub mod retrieval;
pub mod services;
pub mod tools;

pub use config::AssistantConfig;
pub use core::{
    Candidate, CollectionCatalog, CollectionDescriptor, CollectionPlan, FusedCandidate,
    PlanEntry, ProfileName, QueryContext, ReportFilter, RetrievalProfile, RetrievalStrategy,
};
pub use error::{ConfigError, Error, Result};
pub use orchestrator::{Orchestrator, RetrievalOutcome};
pub use retrieval::{FusionMethod, FusionWeightTable};
pub use services::Services;
pub use tools::{ToolAdapter, ToolExecutor, ToolOutput};
