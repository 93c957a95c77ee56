//! End-to-end fits

mod global_tests;
mod pseudovoigt_tests;
