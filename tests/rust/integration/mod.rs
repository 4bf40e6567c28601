//! Integration tests - the whole pipeline from query text to hydrated objects
//!
//! These tests run prepared statements against an in-memory store that
//! replays canned rows, so no database is needed.

mod hydration_tests;
mod pipeline_tests;
mod support;
