// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    context::HandleContext,
    dispatch::TransactionHandler,
    error::{HandleError, PreCheckError},
    pre_handle::PreHandleContext,
};
use canopy_config::FreezeConfig;
use canopy_types::{
    response_code::ResponseCode,
    state::FreezeSchedule,
    timestamp::Timestamp,
    transaction::{FreezeBody, TransactionPayload},
};
use std::{fs, io, path::PathBuf};
use tracing::info;

pub const FREEZE_MARKER_FILE: &str = "freeze_scheduled.mf";

/// Operational side effects of the freeze flow: a marker file the node
/// operator tooling watches, dropped next to the node artifacts.
pub struct FreezeActions {
    artifacts_dir: PathBuf,
}

impl FreezeActions {
    pub fn new(config: &FreezeConfig) -> Self {
        Self {
            artifacts_dir: config.artifacts_dir.clone(),
        }
    }

    fn marker_path(&self) -> PathBuf {
        self.artifacts_dir.join(FREEZE_MARKER_FILE)
    }

    pub fn write_marker(&self, start_time: Timestamp) -> io::Result<()> {
        fs::write(self.marker_path(), start_time.to_string())
    }

    pub fn remove_marker(&self) -> io::Result<()> {
        match fs::remove_file(self.marker_path()) {
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Schedules or aborts a network freeze. The schedule itself lives in
/// replicated state (and so commits or rolls back with the scope); the
/// marker file is node-local and written as the handler runs, which is safe
/// because the engine commits immediately after a clean dispatch.
pub struct FreezeHandler {
    actions: FreezeActions,
}

impl FreezeHandler {
    pub fn new(config: FreezeConfig) -> Self {
        Self {
            actions: FreezeActions::new(&config),
        }
    }
}

fn freeze_body(payload: &TransactionPayload) -> Result<&FreezeBody, ResponseCode> {
    match payload {
        TransactionPayload::Freeze(body) => Ok(body),
        _ => Err(ResponseCode::InvalidFreezeTransactionBody),
    }
}

impl TransactionHandler for FreezeHandler {
    fn pre_handle(&self, ctx: &mut PreHandleContext<'_>) -> Result<(), PreCheckError> {
        freeze_body(&ctx.body().payload).map_err(PreCheckError::new)?;
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext<'_>) -> Result<(), HandleError> {
        let body = freeze_body(&ctx.body().payload)
            .map_err(HandleError::new)?
            .clone();
        match body {
            FreezeBody::Schedule { start_time } => {
                if start_time <= ctx.consensus_now() {
                    return Err(HandleError::new(ResponseCode::FreezeStartTimeMustBeFuture));
                }
                ctx.set_freeze_schedule(Some(FreezeSchedule { start_time }));
                self.actions
                    .write_marker(start_time)
                    .map_err(|_| HandleError::new(ResponseCode::Unknown))?;
                info!(%start_time, "network freeze scheduled");
            },
            FreezeBody::Abort => {
                ctx.set_freeze_schedule(None);
                self.actions
                    .remove_marker()
                    .map_err(|_| HandleError::new(ResponseCode::Unknown))?;
                info!("pending network freeze aborted");
            },
        }
        Ok(())
    }
}
