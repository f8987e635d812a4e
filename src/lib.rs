//! Core library for the mockrelay interception proxy.
//!
//! This crate is split into the normalized HTTP value model, the on-disk
//! interaction/scenario format, the service registry and dispatch logic, the
//! control-plane management service, and the callback executor. `main.rs`
//! wires these together with a small hyper-based runtime harness that stands
//! in for the intercepting proxy runtime (see `runtime`).
#![allow(dead_code)]

pub mod callback;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod http;
pub mod interaction;
pub mod management;
pub mod registry;
pub mod runtime;
pub mod scenario_store;
pub mod service;
