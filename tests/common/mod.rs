//! Common test utilities for colloc.
//!
//! This module provides shared dataset builders and assertions.

#![allow(dead_code)]

pub mod assertions;
pub mod test_data;
