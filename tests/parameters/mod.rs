//! Tests for the parameter graph

mod graph_tests;
mod mapping_tests;
