//! # dw-changeset
//!
//! Attribute-level diffing and snapshot encoding for draftwork.
//!
//! A record's drafted change is described as a [`Changes`] map of
//! `attribute -> [old, new]` pairs. This crate knows nothing about drafts or
//! datastores; it only answers two questions:
//!
//! - what changed between a record's persisted state and its working state
//!   ([`compute_changes`], subject to an [`AttributeFilter`]), and
//! - how an attribute map is written into a draft column and read back
//!   ([`SnapshotCodec`], with per-attribute [`AttributeCoder`]s).

pub mod attributes;
pub mod codec;
pub mod engine;
pub mod error;
pub mod filter;

pub use attributes::{AttributeChange, AttributeMap, Changes};
pub use codec::{
    codec_for, AttributeCoder, CoderRegistry, ColumnType, DelimitedListCoder, NativeCodec,
    Serializer, SnapshotCodec, TextCodec,
};
pub use engine::{compute_changes, ChangeBasis, Tracked};
pub use error::ChangesetError;
pub use filter::AttributeFilter;
