//! Burrow API - gRPC service and message definitions
//!
//! This crate provides:
//! - gRPC service definitions (generated from proto/burrow.proto)
//! - Conversions between prost well-known types and chrono

pub mod convert;
pub mod grpc;

pub use grpc::*;
