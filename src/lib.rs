//! Resumable batch URL downloads.
//!
//! Every URL in a list is fetched concurrently into a path derived from the
//! URL, and each outcome (success, already present, failure) is appended to
//! plain-text ledgers so a later run over the same list only redoes what is
//! missing.

pub mod app;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod output;
pub mod resolver;
pub mod task;
pub mod transport;
