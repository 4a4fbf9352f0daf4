// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transport layer: one bidirectional pair of long-lived HTTP
//! streams kept alive against a control plane.

pub mod client;
pub mod keepalive;
pub mod reader;
pub mod writer;

pub use client::Endpoint;
pub use keepalive::{keep_alive, KeepAliveContext};
