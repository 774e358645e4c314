//! Built-in capability sets.

pub mod code_review;

pub use code_review::{code_review_definition, register_code_review};
