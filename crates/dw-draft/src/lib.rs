//! # dw-draft
//!
//! The draft record and its table for draftwork.
//!
//! A [`Draft`] is one pending change to an item: a `create`, `update`, or
//! `destroy` event plus whatever is needed to rebuild the drafted state —
//! a full snapshot (`object`), a changeset (`object_changes`), and for
//! destroy-over-draft chains the superseded draft (`previous_draft`).
//!
//! ## Key components
//!
//! - [`Draft`] / [`DraftData`] — the persisted row and the partial data used
//!   to create or update one
//! - [`DraftSchema`] — per draft class column layout (json vs text columns,
//!   optional `object_changes`, declared meta columns)
//! - [`DraftFormat`] — encodes and decodes draft columns for one item type
//! - [`DraftStore`] / [`DraftTable`] — validated CRUD plus event and item
//!   queries
//! - [`reify`] — rebuilds an item's attributes as of a draft

pub mod draft;
pub mod error;
pub mod format;
pub mod reify;
pub mod schema;
pub mod store;

pub use draft::{ChangesetRead, Draft, DraftData, DraftEvent, DraftId, ItemId, ItemRef};
pub use error::DraftError;
pub use format::{DraftFields, DraftFormat};
pub use reify::{reify, reify_previous_draft};
pub use schema::DraftSchema;
pub use store::{DraftStore, DraftTable};
