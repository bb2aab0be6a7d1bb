//! Burrow server library
//!
//! This crate wires the persistence layer to the gRPC surface:
//! - `config`: file/env/CLI configuration
//! - `auth`: static token interceptor
//! - `service`: the gRPC handler
//! - `startup`: logging, transport and shutdown plumbing
//! - `cert`: self-signed certificate generation

pub mod auth;
pub mod cert;
pub mod config;
pub mod service;
pub mod startup;
