//! Tests for the JSON report

mod report_tests;
