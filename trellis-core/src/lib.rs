//! Trellis Core
//!
//! Core types and abstractions for the Trellis pipeline backend.
//!
//! This crate contains:
//! - Domain types: Core business entities (Recipe, BlobReference, etc.)
//! - Resource locator: composite resource identifier parsing

pub mod domain;
pub mod resource;
