//! mdb - studio media archive
//!
//! Tracks file lineage across the studio pipeline and reconciles the archive
//! metadata (content units, collections, derivations) as operations arrive.

pub mod cit;
pub mod config;
pub mod derivation;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod lineage;
pub mod reconcile;
pub mod registry;
pub mod requests;
pub mod units;
