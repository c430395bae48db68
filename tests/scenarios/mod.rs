//! Scenario-based tests for md-pipeline

mod failure_handling;
mod submission;
mod success_chain;
mod task_entry;
