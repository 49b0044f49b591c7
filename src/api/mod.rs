//! Shared API plumbing: response envelopes and pagination.

pub mod pagination;
pub mod response;
