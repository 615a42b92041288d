pub mod aggregator;
pub mod execute;
mod progress;
pub mod runner;
pub mod show_result_with_table;
pub mod transport;
