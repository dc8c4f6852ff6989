mod monitor_tests;
mod store_tests;
pub mod utils;
