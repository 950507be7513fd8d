// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Signature verification primitives for the transaction workflows.
//!
//! Verification requests are packed into per-scheme [`batch::BatchBuffer`]s
//! and handed to a [`engine::CryptoEngine`], which fulfils one
//! [`engine::CryptoJob`] per signature on a worker pool. Callers never block
//! here; waiting (with a deadline) happens at the consumer.

pub mod batch;
pub mod ed25519;
pub mod engine;
pub mod secp256k1;

#[cfg(any(test, feature = "fuzzing"))]
pub mod test_utils;
