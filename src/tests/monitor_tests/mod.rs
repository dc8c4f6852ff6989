mod pacing_tests;
mod paging_tests;
