//! # CRISK pipeline
//!
//! The change risk check as a linear state machine:
//!
//! ```text
//! Init ─> ExtractChange ─┬─> (NoChange)
//!                        └─> BuildSnapshot ─> RankRelated ─┬─> (NoneRelated)
//!                                                          └─> ResolveOwners ─> GenerateDraft ─> Done
//! ```
//!
//! Draft generation is gated by an injected [`Confirm`] capability, so interactive
//! and flag-driven runs go through the same states.

mod error;
mod hooks;
mod inquiry;
mod orchestrator;
mod ownership;
mod report;

pub use error::{PipelineError, Result};
pub use hooks::{AutoConfirm, Confirm, PipelineObserver, SilentObserver, Stage};
pub use inquiry::{ask_question, code_snippet, inspect_line, LineInquiry, SNIPPET_RADIUS};
pub use orchestrator::{Orchestrator, Outcome, PipelineConfig, DRAFT_QUESTION};
pub use ownership::{
    dominant_owner, OwnershipResolver, DEFAULT_OWNER_CONCURRENCY, MAX_OWNER_CONCURRENCY,
};
pub use report::{render_draft, render_related};
