pub mod args;
pub mod error;
pub mod iteration_result;
pub mod order;
pub mod request_spec;
pub mod result;
pub mod test_config;
