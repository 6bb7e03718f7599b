//! # StateDB Testkit
//!
//! Test utilities for StateDB: deterministic wallets, signed fixture
//! transactions, pre-wired in-memory engines, and a fault-injecting store
//! wrapper for exercising partial-failure paths.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fault;
mod fixtures;

pub use fault::FaultStore;
pub use fixtures::{encode_payload, new_state_tx, test_engine, TestWallet};
