// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

//! The typed handlers registered with the engine. Service business logic at
//! large lives outside this crate; these two are the handlers the engine
//! itself ships: value transfer, and the operational freeze flow.

pub mod crypto_transfer;
pub mod freeze;
