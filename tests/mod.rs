mod backend_tests;
mod common;
mod config_tests;
