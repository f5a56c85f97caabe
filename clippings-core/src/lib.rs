//! Clippings Core
//!
//! Core types and abstractions for the Clippings digest system.
//!
//! This crate contains:
//! - Domain types: Core business entities (DigestJob, Record, EnrichmentJob, etc.)
//! - DTOs: Data transfer objects for the HTTP API and external collaborators

pub mod domain;
pub mod dto;
