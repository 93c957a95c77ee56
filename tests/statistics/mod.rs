//! Tests for the post-fit statistics

mod statistics_tests;
