//! Message moderation: word lists and exemption roles.

pub mod exemption;
pub mod filter;

pub use filter::{Verdict, WordFilter};
