//! Core domain types shared by planning, retrieval and the tool surface.
//!
//! Everything here is plain data: profiles, the collection catalog, plans,
//! per-request query context and candidates. No I/O.

pub mod candidate;
pub mod catalog;
pub mod plan;
pub mod profile;
pub mod query;

pub use candidate::{Candidate, FusedCandidate};
pub use catalog::{
    CollectionCatalog, CollectionDescriptor, ContentKind, FieldRole, FieldType, MetadataField,
};
pub use plan::{CollectionPlan, PlanEntry};
pub use profile::{PlanningMode, ProfileName, RerankerModel, RetrievalProfile, RetrievalStrategy};
pub use query::{QueryContext, ReportFilter};
