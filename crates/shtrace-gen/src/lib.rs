//! Deterministic synthetic chain for simulations, benches, and tests.
//!
//! Produces, block by block, what the execution engine would hand to the
//! trace history: applied `(trace, packed transaction)` pairs and the
//! accepted-block descriptor listing the block's transaction ids.
//!
//! - `params`: knobs controlling block shape (serde, so they can live in a
//!   TOML profile).
//! - `generator`: the seeded block generator.
//!
//! Callers import stable paths like `shtrace_gen::generator::ChainGenerator`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

/// Seeded block generator.
pub mod generator;
/// Block-shape parameters.
pub mod params;
