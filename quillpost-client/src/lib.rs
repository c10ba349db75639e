//! Client side of the post listing: HTTP calls, error messages fit for display
//! and the request sequencing that keeps a list view consistent.

pub mod api;
pub mod error;
pub mod feed;
pub mod state;
