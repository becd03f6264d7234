//! # Storeforge
//!
//! Resumable provisioning of commerce storefronts on top of the external
//! platform CLI (`sfdx`).
//!
//! ## Usage
//!
//! ```bash
//! storeforge store create --hub-org hub@devhub -u admin@scratch -s Basket
//! ```
//!
//! Every multi-step command records each completed step in a shared
//! status file; re-running a failed command picks up at the first step
//! that has no success marker.
//!
//! ## Modules
//!
//! - `commands` - Provisioning command implementations (org, store, setup, products, extension, payments, search)
//! - `config` - Tool configuration loaded from `~/.storeforge/config.toml`
//! - `metadata` - Example-metadata templating
//! - `progress` - The durable, lock-guarded progress store
//! - `record` - Typed record CRUD over the platform CLI
//! - `sfcli` - Platform CLI execution, JSON envelope handling, retry
//! - `subprocess` - Unified subprocess abstraction layer for testing
//! - `workflow` - The step-gating helper every command shares

pub mod commands;
pub mod config;
pub mod error;
pub mod metadata;
pub mod progress;
pub mod record;
pub mod sfcli;
pub mod subprocess;
pub mod workflow;
