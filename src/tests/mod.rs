
mod client_tests;
