// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The generational closer: a single-use broadcast "done" signal paired
//! with a once-guard.
//!
//! A new generation is allocated each reconnection cycle; closing it
//! signals every task bound to that generation to exit. Closing is
//! idempotent and a closer can never be reopened — [`tokio_util`]'s
//! [`CancellationToken`] already has exactly this contract, so `Closer`
//! is a thin, intention-revealing wrapper around it rather than a
//! hand-rolled broadcast/once pair.

use tokio_util::sync::CancellationToken;

/// One generation's lifetime fuse.
#[derive(Debug, Clone, Default)]
pub struct Closer(CancellationToken);

impl Closer {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    /// Close this generation. Harmless to call more than once.
    pub fn close(&self) {
        self.0.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once this generation has been closed.
    pub async fn closed(&self) {
        self.0.cancelled().await
    }

    /// A child token that inherits this generation's cancellation, for
    /// wiring into per-request deadlines: cancelling it propagates to
    /// all in-flight handlers.
    pub fn child_token(&self) -> CancellationToken {
        self.0.child_token()
    }
}

#[cfg(test)]
#[path = "closer_tests.rs"]
mod tests;
