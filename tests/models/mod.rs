//! Tests for the line-shape registry

mod area_tests;
mod registry_tests;
