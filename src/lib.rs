//! # Nex Core Library
//!
//! This crate contains the core logic and building blocks of the `nex` tool – a
//! cross-platform package manager for shell-runnable tools distributed through
//! a remote registry.
//!
//! `nex` resolves human-friendly names to namespaced package ids, installs
//! packages into a per-user directory (`~/.nex`), keeps a durable record of
//! what is installed, and runs a package's declared commands through the right
//! language runtime – installing that runtime first when the user agrees.
//!
//! This library is built for the `nex` CLI, but you can also reuse it as a
//! backend in other tools.
//!
//! ## Modules Overview
//! - [`manifest`] – Registry index and package manifest types
//! - [`registry`] – Registry client and name resolution
//! - [`ledger`] – The installed-package ledger (`installed.json`)
//! - [`links`] – Local development overrides (`links.json`)
//! - [`installer`] – Materialization and install/update/remove orchestration
//! - [`runtime`] – Runtime detection, prompting and acquisition
//! - [`runner`] – Building and running package command processes
//! - [`lock`] – `nex.lock` snapshot generation
//! - [`util`] – Shared utilities (paths, atomic writes, terminal output)

pub mod error;
pub mod installer;
pub mod ledger;
pub mod links;
pub mod lock;
pub mod manifest;
pub mod registry;
pub mod runner;
pub mod runtime;
pub mod util;

pub use error::*;
pub use installer::*;
pub use ledger::*;
pub use links::*;
pub use lock::*;
pub use manifest::*;
pub use registry::*;
pub use runner::*;
pub use runtime::*;
pub use util::*;
