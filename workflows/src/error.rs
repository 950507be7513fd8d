// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use canopy_types::response_code::ResponseCode;
use thiserror::Error;

/// A syntactic or semantic rejection raised before a transaction is allowed
/// to execute: by the transaction checker or by a typed handler's pre-handle.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("pre-check failed: {code:?}")]
pub struct PreCheckError {
    pub code: ResponseCode,
}

impl PreCheckError {
    pub fn new(code: ResponseCode) -> Self {
        Self { code }
    }
}

/// A business failure raised by a typed handler during dispatch. The state
/// scope is discarded and the code lands in the emitted record. A code of
/// [`ResponseCode::Unknown`] marks a failure the handler could not classify;
/// the engine then treats the dispatch like any other unexpected error.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("handler failed: {code:?}")]
pub struct HandleError {
    pub code: ResponseCode,
}

impl HandleError {
    pub fn new(code: ResponseCode) -> Self {
        Self { code }
    }
}
