//! # dw-model
//!
//! Draftable items for draftwork: the datastore they live in, the lifecycle
//! that turns their saves and deletes into drafts, and the orchestration that
//! publishes or reverts those drafts.
//!
//! Items are plain [`Record`]s with dirty tracking. Each item type is
//! registered in a [`TypeRegistry`] with its columns, relationship
//! descriptors, and [`DraftableOptions`]. A [`DraftEngine`] owns the tables
//! and runs every operation in a transaction committed to a [`Backend`].
//!
//! ## Key operations
//!
//! - [`DraftEngine::save_draft`] / [`DraftEngine::draft_destruction`] —
//!   record `create`, `update`, and `destroy` drafts
//! - [`DraftEngine::publish`] / [`DraftEngine::revert`] — resolve a draft,
//!   cascading to dependency drafts all-or-nothing
//! - [`DraftEngine::reify`] — an item as of a draft
//! - [`DraftEngine::scope`] — drafted, published, trashed, live items
//!
//! Who made a change and whether drafting is on for a request travel in an
//! explicit [`DraftContext`].

pub mod config;
pub mod context;
pub mod database;
mod dependencies;
pub mod engine;
pub mod error;
mod lifecycle;
mod orchestrator;
pub mod record;
pub mod registry;
pub mod scopes;

pub use config::{SchemaConfig, Settings};
pub use context::DraftContext;
pub use database::{Backend, Database, ItemTable, JsonFileBackend, MemoryBackend, Tables};
pub use engine::DraftEngine;
pub use error::ModelError;
pub use record::Record;
pub use registry::{
    Dependent, DraftableOptions, ItemType, MetaValue, Relationship, RelationshipKind, Target,
    TypeRegistry,
};
pub use scopes::Scope;
