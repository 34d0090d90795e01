#![forbid(unsafe_code)]

//! Translation catalog tooling for the Qt Linguist TS format.
//!
//! A TS file is a catalog of source strings and their translations for a
//! toolkit's dialogs and widgets, grouped by originating component
//! ("context"). This crate provides the in-memory model, a strict
//! event-driven parser, a byte-stable canonical serializer, exact-key
//! lookup, and the reports translation-coverage tooling needs (unfinished
//! messages, duplicate keys, placeholder mismatches).

pub mod catalog;
pub mod reader;
pub mod writer;

pub use catalog::{
    Catalog, Context, ContextCoverage, CoverageReport, DuplicateContext, DuplicateKey,
    FormatError, Message, PlaceholderMismatch, Translation, Unfinished,
};
