//! readme-pilot — generate a README.md for a public GitHub repository by
//! streaming an LLM text-completion endpoint with multi-pass continuation.
//!
//! The interesting part lives in [`continuation`]: the model's output is
//! capped per request, so a single pass often cuts off before the document
//! is finished. The streamer stitches sequential passes into one coherent,
//! non-duplicated document bounded by an end marker, tolerating providers
//! that resend overlapping or cumulative text instead of clean deltas.

pub mod constants;
pub mod continuation;
pub mod github;
pub mod keys;
pub mod llms;
pub mod prompt;
pub mod reconcile;
pub mod settings;
