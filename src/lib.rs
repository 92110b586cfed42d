//! # springbok
//!
//! **Build-file generator for Bazel-style workspaces** - scan a source tree,
//! emit and maintain declarative build rules, and keep every hand edit.
//!
//! springbok walks a repository, inspects source files per language, and
//! produces `BUILD.bazel` files with targets, sources, and cross-package
//! dependencies. Re-running it updates generated attributes while leaving
//! comments, hand-written attributes, and `# keep` blocks untouched.
//!
//! ## Features
//!
//! - **Edit-preserving merges** - `# keep` pins rules, attributes, or single
//!   list elements through regeneration
//! - **Two-pass resolution** - a repository-wide rule index maps import
//!   strings to labels, with vendor shadowing and override directives
//! - **Platform-aware Go rules** - build constraints become
//!   `select(...)`-conditional sources and deps
//! - **Directive configuration** - `# springbok:<key>` comments configure
//!   whole subtrees by inheritance
//! - **Concurrent walking** - the tree is read in parallel, then processed
//!   in a deterministic post-order pass
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,no_run
//! use springbok::resolve::NoRemoteCache;
//! use springbok::runner::{RunOptions, run};
//! use std::path::Path;
//!
//! let report = run(Path::new("."), &RunOptions::new(), &NoRemoteCache).unwrap();
//! println!("updated {} files", report.files_written.len());
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! sbok                 # update build files for the whole tree
//! sbok pkg/api         # update one subtree
//! sbok -n --json       # show what would change, as JSON
//! ```

// ============================================================================
// Core Modules
// ============================================================================

/// Command-line parsing and the shared binary entry point.
pub mod args;

/// Parser and canonical printer for the build-file dialect.
pub mod bzl;

/// Per-directory configuration, cloned on descent, mutated by directives.
pub mod config;

/// Repository-wide `(language, import) -> label` index.
pub mod index;

/// Build target labels: parse, format, shorten.
pub mod label;

/// Language front ends and their registry.
///
/// - [`language::golang`] - Go: file inspection, platform bucketing,
///   rule generation, dependency resolution
/// - [`language::proto`] - protobuf: `proto_library` generation and
///   well-known import handling
pub mod language;

/// Merging freshly generated rules into existing files with keep semantics.
pub mod merger;

/// Platform-conditional string carriers (`select` shapes).
pub mod platform;

/// Import specs, resolve-directive overrides, remote metadata interface.
pub mod resolve;

/// Edit-preserving rule/file model on top of [`bzl`].
pub mod rules;

/// The two-pass pipeline driver.
pub mod runner;

/// Concurrent repository traversal with per-directory config snapshots.
pub mod walk;

// ============================================================================
// Re-exports for convenience
// ============================================================================

/// Build target identity.
pub use label::Label;

/// Per-directory configuration.
pub use config::Config;

/// A parsed build file with rules, loads, and directives.
pub use rules::File;

/// One rule call.
pub use rules::Rule;

/// Run the whole pipeline.
pub use runner::run;

/// Options for a pipeline run.
pub use runner::RunOptions;

/// Machine-readable run summary.
pub use runner::RunReport;

/// Walker modes.
pub use walk::Mode;
