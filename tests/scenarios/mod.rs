//! Scenario-based tests for stepgen

mod context_chain;
mod end_to_end;
mod generation_failures;
mod initialization;
