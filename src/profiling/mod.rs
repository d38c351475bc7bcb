pub mod classifier;
pub mod profiler;
