//! Govspine Core - Request context, domain types and store ports
//!
//! This crate contains the pieces every governance component shares:
//! - **Context** - the ambient [`domain::RequestContext`] carried through a call chain
//! - **Domain entities** - `AuditEntry`, `EntityVersion`, `Tombstone`, `SystemEvent`
//! - **Port definitions** - storage traits implemented by `govspine-store`
//! - **Configuration** - the YAML-backed [`config::GovernanceConfig`]
//! - **Logging** - tracing subscriber setup
//!
//! # Architecture
//!
//! Services in the audit, versions, soft-delete and transaction crates depend
//! on the ports defined here, never on a concrete adapter.

pub mod config;
pub mod context;
pub mod domain;
pub mod logging;
pub mod ports;
