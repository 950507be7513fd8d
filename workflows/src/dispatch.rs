// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    context::HandleContext,
    error::{HandleError, PreCheckError},
    handlers::{crypto_transfer::CryptoTransferHandler, freeze::FreezeHandler},
    pre_handle::PreHandleContext,
};
use canopy_config::FreezeConfig;
use canopy_types::{response_code::ResponseCode, transaction::PayloadKind};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::error;

/// What a dispatched handler call amounted to. The engine switches on this
/// variant alone; no exception-shaped control flow crosses the dispatch
/// boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandlerOutcome {
    Ok,
    Failed(ResponseCode),
    Unknown,
}

/// The capability interface every transaction kind registers with the
/// engine. `pre_handle` runs off-order and may only read state and record
/// signing requirements; `handle` runs in consensus order inside a
/// transactional scope.
pub trait TransactionHandler: Send + Sync {
    fn pre_handle(&self, ctx: &mut PreHandleContext<'_>) -> Result<(), PreCheckError>;

    fn handle(&self, ctx: &mut HandleContext<'_>) -> Result<(), HandleError>;
}

/// Static routing table from payload kind to its typed handler.
pub struct TransactionDispatcher {
    crypto_transfer: CryptoTransferHandler,
    freeze: FreezeHandler,
}

impl TransactionDispatcher {
    pub fn new(freeze_config: FreezeConfig) -> Self {
        Self {
            crypto_transfer: CryptoTransferHandler,
            freeze: FreezeHandler::new(freeze_config),
        }
    }

    fn handler_for(&self, kind: PayloadKind) -> &dyn TransactionHandler {
        match kind {
            PayloadKind::CryptoTransfer => &self.crypto_transfer,
            PayloadKind::Freeze => &self.freeze,
        }
    }

    pub fn dispatch_pre_handle(&self, ctx: &mut PreHandleContext<'_>) -> Result<(), PreCheckError> {
        self.handler_for(ctx.body().payload.kind()).pre_handle(ctx)
    }

    /// Runs the typed handler and folds its result (including a panic) into
    /// a [`HandlerOutcome`]. A handler signalling [`ResponseCode::Unknown`]
    /// is treated exactly like an unclassified failure.
    pub fn dispatch_handle(&self, ctx: &mut HandleContext<'_>) -> HandlerOutcome {
        let kind = ctx.body().payload.kind();
        let handler = self.handler_for(kind);
        match catch_unwind(AssertUnwindSafe(|| handler.handle(ctx))) {
            Ok(Ok(())) => HandlerOutcome::Ok,
            Ok(Err(HandleError {
                code: ResponseCode::Unknown,
            })) => HandlerOutcome::Unknown,
            Ok(Err(failure)) => HandlerOutcome::Failed(failure.code),
            Err(_) => {
                error!(?kind, "transaction handler panicked during dispatch");
                HandlerOutcome::Unknown
            },
        }
    }
}
