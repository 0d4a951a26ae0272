//! Process execution and filesystem helpers shared by the pipelines.

pub mod exec;
pub mod fs;
