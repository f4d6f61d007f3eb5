//! MCP (Model Context Protocol) server for pbi-context.
//!
//! Exposes the Context and Origin tools to MCP clients.
//!
//! # Feature Gate
//!
//! This module requires the `mcp` feature flag:
//! ```toml
//! [dependencies]
//! pbi-context = { version = "...", features = ["mcp"] }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP Client (answering agent)
//!   ↓ context(query, report_filter, profile) | origin(query)
//! PbiMcpServer
//!   ↓
//! ToolAdapter → Orchestrator
//!   ├── CollectionPlanner (fixed plan or planner model)
//!   ├── SelfQueryAgent (report/date filters)
//!   ├── Fan-out → per-collection search + rerank
//!   └── Weighted fusion
//!   ↓
//! Text fragments → MCP Client
//! ```

pub mod params;
pub mod server;
pub mod transport;

pub use params::{ContextParams, OriginParams};
pub use server::PbiMcpServer;
pub use transport::{serve_http, serve_stdio};
