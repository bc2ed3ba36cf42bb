//! Report rendering: the markdown report and the machine-readable
//! JSON summary. Both are produced on every run; the markdown doubles
//! as the PR review body.

pub mod markdown;
pub mod summary;
