//! Household MAC device registry with OPNsense firewall reconciliation.
//!
//! A household operator keeps a list of named devices (by MAC address) and
//! pushes that list onto a firewall appliance as an enforceable block rule.
//! Local truth lives in a line-oriented store file; the appliance's truth
//! lives in its XML configuration document. This library owns both sides
//! and the reconciliation between them.
//!
//! # Architecture
//!
//! ## Local registry
//!
//! - [`device`] — device record, MAC/name canonicalization
//! - [`store`] — line-oriented persistence with backup-before-write
//! - [`registry`] — CRUD, duplicate checks, import/export
//!
//! ## Firewall side
//!
//! - [`transport`] — remote command execution and file transfer over SSH,
//!   bounded by timeouts; the only place that touches process APIs
//! - [`configdoc`] — tree model of the appliance configuration; alias and
//!   block-rule lookup/upsert
//! - [`reconciler`] — one-pass orchestration: fetch, backup, patch, push,
//!   and a graduated chain of reload strategies
//!
//! ## Process plumbing
//!
//! - [`settings`] — TOML settings with embedded defaults
//! - [`context`] — per-process wiring of registry + reconciler
//! - [`report`] — terminal rendering for the CLI
//!
//! # Consistency model
//!
//! Every registry read re-parses the store file and every reconciliation
//! pass re-fetches the whole remote document; nothing is cached, so there
//! is no cache to invalidate. Validation and conflict errors are raised
//! before any mutation. Persist and remote failures can leave the two sides
//! disagreeing; the status operation exists so an operator can detect the
//! divergence and re-run a sync, and nothing retries automatically.
//!
//! # Built on conftree
//!
//! Generic XML parsing, mutation, and writing live in the `conftree` crate;
//! everything firewall-specific is here.

pub mod configdoc;
pub mod context;
pub mod device;
pub mod reconciler;
pub mod registry;
pub mod report;
pub mod settings;
pub mod store;
pub mod transport;
