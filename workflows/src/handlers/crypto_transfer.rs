// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    context::HandleContext,
    dispatch::TransactionHandler,
    error::{HandleError, PreCheckError},
    pre_handle::PreHandleContext,
};
use canopy_types::{
    account::Account,
    response_code::ResponseCode,
    transaction::{TransactionPayload, TransferList},
};

/// Multi-party value transfer. Every debited account other than the payer
/// must have signed; credited accounts need no authorization.
pub struct CryptoTransferHandler;

fn transfer_list(payload: &TransactionPayload) -> Result<&TransferList, ResponseCode> {
    match payload {
        TransactionPayload::CryptoTransfer(list) => Ok(list),
        _ => Err(ResponseCode::InvalidTransaction),
    }
}

/// Structural validation shared by both phases: no zero amounts, and the
/// list must net out to zero.
fn check_amounts(list: &TransferList) -> Result<(), ResponseCode> {
    let mut net: i128 = 0;
    for entry in &list.account_amounts {
        if entry.amount == 0 {
            return Err(ResponseCode::InvalidAccountAmounts);
        }
        net += entry.amount as i128;
    }
    if net != 0 {
        return Err(ResponseCode::InvalidAccountAmounts);
    }
    Ok(())
}

impl TransactionHandler for CryptoTransferHandler {
    fn pre_handle(&self, ctx: &mut PreHandleContext<'_>) -> Result<(), PreCheckError> {
        let list = transfer_list(&ctx.body().payload)
            .map_err(PreCheckError::new)?
            .clone();
        check_amounts(&list).map_err(PreCheckError::new)?;

        for entry in &list.account_amounts {
            if entry.amount >= 0 || entry.account == ctx.payer() {
                continue;
            }
            let account = ctx
                .store()
                .resolve(&entry.account)
                .ok_or(PreCheckError::new(ResponseCode::InvalidTransferAccountId))?;
            match (&account.key, &account.alias) {
                (Some(key), _) => ctx.require_key(key.clone()),
                (None, Some(alias)) => ctx.require_signature_for_hollow_account(*alias),
                (None, None) => {
                    return Err(PreCheckError::new(ResponseCode::InvalidTransferAccountId));
                },
            }
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext<'_>) -> Result<(), HandleError> {
        let list = transfer_list(&ctx.body().payload)
            .map_err(HandleError::new)?
            .clone();
        check_amounts(&list).map_err(HandleError::new)?;

        // Read-modify-write through the scope: repeated accounts see their
        // own earlier adjustments, and a failure discards the whole scope.
        for entry in &list.account_amounts {
            let mut account: Account = ctx
                .account(&entry.account)
                .ok_or(HandleError::new(ResponseCode::InvalidTransferAccountId))?;
            if account.deleted {
                return Err(HandleError::new(ResponseCode::AccountDeleted));
            }
            if entry.amount < 0 {
                let debit = entry.amount.unsigned_abs();
                if account.balance < debit {
                    return Err(HandleError::new(ResponseCode::InsufficientAccountBalance));
                }
                // Debits by hollow accounts are authorized by the alias
                // signature; the payer itself was settled by the engine.
                if account.is_hollow() && entry.account != ctx.payer() {
                    let alias = account
                        .alias
                        .ok_or(HandleError::new(ResponseCode::InvalidSignature))?;
                    if !ctx.verification_for_alias(&alias).passed {
                        return Err(HandleError::new(ResponseCode::InvalidSignature));
                    }
                }
                account.balance -= debit;
            } else {
                account.balance = account
                    .balance
                    .checked_add(entry.amount.unsigned_abs())
                    .ok_or(HandleError::new(ResponseCode::InvalidAccountAmounts))?;
            }
            let id = account.id;
            ctx.put_account(account);
            ctx.note_transfer(id, entry.amount);
        }
        Ok(())
    }
}
