//! Data Transfer Objects
//!
//! DTOs used at the HTTP API boundary and on the wire to the external
//! enrichment service. Lightweight representations of domain entities.

pub mod digest;
pub mod enrichment;
