mod check_tests;
mod common;
mod device_tests;
mod run_tests;
