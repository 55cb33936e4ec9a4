//! Submission Validation Module
//!
//! This module checks caller input before it reaches the scheduler.
//! Both key and value must be present and non-empty.

mod validator;
pub use validator::validate_submission;
