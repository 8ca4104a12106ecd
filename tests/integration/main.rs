//! Integration tests

mod arbitrage_test;
mod e2e_test;
mod movement_test;
mod source_test;
mod support;
