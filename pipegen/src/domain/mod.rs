//! Domain types shared across generation, validation and transport

mod metadata;
mod request;

pub use metadata::{DomainMetadata, Lakehouse, MetadataSource, TableRef, Workspace};
pub use request::{ConversationTurn, GenerationRequest, RequestContext, Role};
