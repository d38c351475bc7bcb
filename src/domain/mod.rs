pub mod profile;
pub mod solution;
pub mod task;
pub mod vm;
pub mod workflow;

#[cfg(test)]
mod workflow_tests;
