// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

mod common;
mod handle_test;
