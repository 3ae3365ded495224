//! # netfuse - Network Fusion Gene Ranking
//!
//! Ranks the genes of an organism by how related they are to a small set of
//! query genes, using many weighted interaction networks and gene attribute
//! sets as evidence.
//!
//! ## Overview
//!
//! Every network is stored as a normalized Laplacian kernel over the
//! organism's genes. For a query the engine
//!
//! 1. builds a label vector from the query (positive) and optional negative
//!    genes,
//! 2. learns one non-negative weight per network and attribute with the
//!    requested combining method,
//! 3. sums the weighted kernels into a single combined kernel,
//! 4. solves a regularized label propagation system for a per-gene
//!    discriminant,
//! 5. ranks the non-query genes by the requested scoring method.
//!
//! Node indices, kernels and attribute matrices are loaded once per process
//! and shared by all concurrent queries through a single-flight cache.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netfuse_core::data::FileDataset;
//! use netfuse_core::{FusionEngine, NullProgress, OrganismRef, Request};
//!
//! let dataset = FileDataset::open("data")?;
//! let engine = FusionEngine::new(Arc::new(dataset));
//!
//! let request = Request::new(OrganismRef::core(4), vec![101, 102, 103]);
//! if let Some(response) = engine.find_related(&request, &NullProgress)?.into_response() {
//!     for node in &response.ranked_nodes {
//!         println!("{}\t{:.4}", node.node_id, node.score);
//!     }
//! }
//! # Ok::<(), netfuse_core::types::FusionError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: Engine configuration
//! - [`engine`]: Query pipeline
//! - [`pool`]: Worker threads running whole queries
//! - [`request`]: Query and response types
//! - [`types`]: Identifiers, metadata and errors
//! - [`data`]: Dataset trait with file and in-memory implementations
//! - [`cache`]: Single-flight artifact cache
//! - [`node_index`]: Gene id to row mapping
//! - [`matrix`]: Sparse symmetric kernels and attribute matrices
//! - [`labels`]: Label vectors and biasing
//! - [`methods`]: Combining and scoring method selectors
//! - [`weights`]: Feature weight learning
//! - [`combine`]: Weighted kernel combination
//! - [`solver`]: Discriminant solve
//! - [`scoring`]: Ranking and thresholds
//! - [`progress`]: Stage notifications and cancellation
//!
//! ## Error Handling
//!
//! All fallible operations return [`FusionResult<T>`](types::FusionResult).
//! Cancellation is not an error; a cancelled query completes with
//! [`QueryOutcome::Cancelled`].

pub mod cache;
pub mod combine;
pub mod config;
pub mod constants;
pub mod data;
pub mod engine;
pub mod labels;
pub mod matrix;
pub mod methods;
pub mod node_index;
pub mod pool;
pub mod progress;
pub mod request;
pub mod scoring;
pub mod solver;
pub mod types;
pub mod weights;

pub use config::EngineConfig;
pub use engine::FusionEngine;
pub use methods::{CombiningMethod, ResultPolicy, ScoringMethod};
pub use progress::{CancellationToken, NullProgress, ProgressReporter, Stage};
pub use request::{CombinedNetwork, Interaction, QueryOutcome, QueryTask, RankedNode, Request, Response};
pub use types::{Feature, FusionError, FusionResult, OrganismRef};
