//! Operation implementations
//!
//! Each user-facing operation lives in its own file as an `impl
//! Repository` block; the CLI in `main.rs` is a thin dispatcher over
//! these.

pub mod porcelain;
