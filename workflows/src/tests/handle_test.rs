// Copyright © Canopy Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    handlers::freeze::FREEZE_MARKER_FILE,
    pre_handle::PreHandleStatus,
    tests::common::{
        ALICE, CAROL_HOLLOW, ERIN, FRANK_ABSENT, FUNDING, NODE, TestHarness, account_id,
        alice_signer, bad_ed_pair, carol_signer, ed_key, envelope_of, erin_signer, freeze_tx_body,
        raw_with_pairs, round_of, signed_by_carol, signed_by_ed, transfer_body,
    },
};
use canopy_config::{FreezeConfig, NodeConfig};
use canopy_crypto::{engine::StalledCryptoEngine, test_utils::Ed25519Signer};
use canopy_types::{
    key::Key,
    response_code::ResponseCode,
    state::{LedgerReader, LedgerWriter},
    timestamp::Timestamp,
    transaction::{FreezeBody, TransactionId},
};
use claims::{assert_none, assert_some};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use std::sync::Arc;

const SERVICE_FEE: u64 = 100;
const NODE_PENALTY: u64 = 10;

fn statuses(harness: &TestHarness) -> Vec<ResponseCode> {
    harness
        .stream
        .records()
        .iter()
        .map(|record| record.status())
        .collect()
}

#[test]
fn happy_path_transfer_commits_and_charges_the_payer() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
    );
    let envelope = envelope_of(signed_by_ed(&body, &[&alice_signer()]), now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::Ok]);
    assert_eq!(harness.balance(ALICE), 100_000 - 1000 - SERVICE_FEE);
    assert_eq!(harness.balance(ERIN), 5_000 + 1000);
    assert_eq!(harness.balance(FUNDING), SERVICE_FEE);

    let tx_id = TransactionId::new(account_id(ALICE), now);
    assert!(harness.dedup.contains(&tx_id));
    let record = assert_some!(harness.record_cache.get(&tx_id));
    assert_eq!(record.transaction_fee, SERVICE_FEE);
    assert_eq!(
        harness.record_cache.records_for(&account_id(ALICE)).len(),
        1
    );
    assert_eq!(harness.stream.rounds_ended(), 1);
}

#[test]
fn handle_reruns_pre_handle_when_the_envelope_arrives_bare() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
    );
    let envelope = envelope_of(signed_by_ed(&body, &[&alice_signer()]), now);
    let round = round_of(vec![envelope.clone()]);

    // No pre-handle pass at all: the handle thread runs it synchronously.
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::Ok]);
    let result = assert_some!(envelope.metadata());
    assert_eq!(result.status(), PreHandleStatus::SoFarSoGood);
    assert_none!(result.inner_result());
}

#[test]
fn invalid_bytes_charge_the_submitting_node() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let mut raw = vec![0u8; 123];
    StdRng::seed_from_u64(42).fill_bytes(&mut raw);
    let round = round_of(vec![envelope_of(raw, now)]);

    harness.handle.handle_round(&mut harness.ledger, &round);

    let records = harness.stream.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status(), ResponseCode::InvalidTransaction);
    assert_eq!(records[0].transaction_id.payer, account_id(NODE));
    assert_eq!(harness.balance(NODE), 10_000 - NODE_PENALTY);
    assert_eq!(harness.balance(FUNDING), NODE_PENALTY);
    assert_eq!(harness.balance(ALICE), 100_000);
}

#[test]
fn missing_payer_charges_the_node_and_still_deduplicates() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(FRANK_ABSENT),
        now,
        &[(account_id(FRANK_ABSENT), -10), (account_id(ERIN), 10)],
    );
    let envelope = envelope_of(signed_by_ed(&body, &[&alice_signer()]), now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::PayerAccountNotFound]);
    assert_eq!(harness.balance(NODE), 10_000 - NODE_PENALTY);
    assert!(harness
        .dedup
        .contains(&TransactionId::new(account_id(FRANK_ABSENT), now)));
    assert_eq!(harness.balance(ERIN), 5_000);
}

#[test]
fn a_failing_payer_signature_surfaces_at_handle_time() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
    );
    let raw = raw_with_pairs(&body, |_| vec![bad_ed_pair(&alice_signer())]);
    let envelope = envelope_of(raw, now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    // Pre-handle cannot see the failure; it is asynchronous.
    assert_eq!(
        assert_some!(envelope.metadata()).status(),
        PreHandleStatus::SoFarSoGood
    );

    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::InvalidSignature]);
    assert_eq!(harness.balance(ALICE), 100_000 - SERVICE_FEE);
    assert_eq!(harness.balance(ERIN), 5_000);
}

#[test]
fn threshold_payer_key_passes_with_enough_signers() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let offline = Ed25519Signer::from_seed([0x0F; 32]);
    let threshold_key = Key::Threshold {
        threshold: 2,
        keys: vec![
            ed_key(&alice_signer()),
            ed_key(&offline),
            ed_key(&erin_signer()),
        ],
    };
    let mut alice = harness.ledger.account(&account_id(ALICE)).expect("seeded");
    alice.key = Some(threshold_key);
    harness.ledger.put_account(alice);

    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
    );
    // Two of the three threshold children sign.
    let envelope = envelope_of(signed_by_ed(&body, &[&alice_signer(), &erin_signer()]), now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::Ok]);
    assert_eq!(harness.balance(ERIN), 5_000 + 1000);
}

#[test]
fn hollow_payer_is_materialized_by_its_first_transaction() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(CAROL_HOLLOW),
        now,
        &[(account_id(CAROL_HOLLOW), -100), (account_id(ERIN), 100)],
    );
    let envelope = envelope_of(signed_by_carol(&body), now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::Ok]);
    assert_eq!(harness.balance(CAROL_HOLLOW), 50_000 - 100 - SERVICE_FEE);
    assert_eq!(harness.balance(ERIN), 5_000 + 100);

    let carol = assert_some!(harness.ledger.account(&account_id(CAROL_HOLLOW)));
    assert_eq!(
        carol.key,
        Some(Key::EcdsaSecp256k1(carol_signer().public_key_compressed()))
    );
    assert!(!carol.is_hollow());
}

#[test]
fn duplicates_are_rejected_after_the_first_record() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
    );
    let raw = signed_by_ed(&body, &[&alice_signer()]);
    let first = envelope_of(raw.clone(), now);
    let second = envelope_of(raw, now.saturating_add_nanos(1));
    let round = round_of(vec![first.clone(), second.clone()]);

    harness
        .pre_handle
        .pre_handle_all(&harness.ledger, &[first, second]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(
        statuses(&harness),
        vec![ResponseCode::Ok, ResponseCode::DuplicateTransaction]
    );
    // The transfer applied once; the payer paid the fee twice.
    assert_eq!(harness.balance(ALICE), 100_000 - 1000 - 2 * SERVICE_FEE);
    assert_eq!(harness.balance(ERIN), 5_000 + 1000);
}

#[test]
fn a_missing_required_signature_blocks_dispatch() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(ALICE),
        now,
        &[
            (account_id(ALICE), -500),
            (account_id(ERIN), -500),
            (account_id(CAROL_HOLLOW), 1000),
        ],
    );
    // Erin is debited but only Alice signs.
    let envelope = envelope_of(signed_by_ed(&body, &[&alice_signer()]), now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::InvalidSignature]);
    assert_eq!(harness.balance(ALICE), 100_000 - SERVICE_FEE);
    assert_eq!(harness.balance(ERIN), 5_000);
    assert_eq!(harness.balance(CAROL_HOLLOW), 50_000);
}

#[test]
fn handler_failures_roll_the_scope_back_but_charge_the_payer() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -200_000), (account_id(ERIN), 200_000)],
    );
    let envelope = envelope_of(signed_by_ed(&body, &[&alice_signer()]), now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(
        statuses(&harness),
        vec![ResponseCode::InsufficientAccountBalance]
    );
    assert_eq!(harness.balance(ALICE), 100_000 - SERVICE_FEE);
    assert_eq!(harness.balance(ERIN), 5_000);
}

#[test]
fn verification_timeouts_downgrade_to_invalid_signature() {
    let mut node_config = NodeConfig::default();
    node_config.workflow.verification_timeout_ms = 25;
    let mut harness = TestHarness::with_parts(
        Arc::new(StalledCryptoEngine::pending()),
        node_config,
    );
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
    );
    let envelope = envelope_of(signed_by_ed(&body, &[&alice_signer()]), now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::InvalidSignature]);
    assert_eq!(harness.balance(ERIN), 5_000);
}

#[test]
fn stale_results_are_rerun_and_keep_their_predecessor() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
    );
    let envelope = envelope_of(signed_by_ed(&body, &[&alice_signer()]), now);
    let round = round_of(vec![envelope.clone()]);

    harness.pre_handle.pre_handle_all(&harness.ledger, &[envelope.clone()]);
    assert_eq!(assert_some!(envelope.metadata()).config_version(), 1);

    harness.bump_config(NodeConfig::default());
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::Ok]);
    let result = assert_some!(envelope.metadata());
    assert_eq!(result.config_version(), 2);
    let inner = assert_some!(result.inner_result());
    assert_eq!(inner.config_version(), 1);
}

#[test]
fn system_transactions_produce_no_records() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let envelope = Arc::new(crate::envelope::TransactionEnvelope::system(
        vec![0xFF; 8],
        account_id(NODE),
        now,
    ));
    let round = round_of(vec![envelope.clone()]);

    harness.handle.handle_round(&mut harness.ledger, &round);

    assert!(harness.stream.records().is_empty());
    assert_none!(envelope.metadata());
    assert_eq!(harness.stream.rounds_ended(), 1);
}

#[test]
fn freeze_schedules_and_aborts_with_marker_files() {
    let artifacts = tempfile::tempdir().expect("tempdir");
    let node_config = NodeConfig {
        freeze: FreezeConfig {
            artifacts_dir: artifacts.path().to_path_buf(),
        },
        ..NodeConfig::default()
    };
    let mut harness = TestHarness::with_node_config(node_config);
    let now = Timestamp::now();
    let marker = artifacts.path().join(FREEZE_MARKER_FILE);

    let schedule = freeze_tx_body(
        account_id(ALICE),
        now,
        FreezeBody::Schedule {
            start_time: now.saturating_add_secs(60),
        },
    );
    let round = round_of(vec![envelope_of(signed_by_ed(&schedule, &[&alice_signer()]), now)]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::Ok]);
    assert_eq!(
        harness.ledger.freeze_schedule().map(|s| s.start_time),
        Some(now.saturating_add_secs(60))
    );
    assert!(marker.exists());

    let abort = freeze_tx_body(
        account_id(ALICE),
        now.saturating_add_nanos(1),
        FreezeBody::Abort,
    );
    let round = round_of(vec![envelope_of(signed_by_ed(&abort, &[&alice_signer()]), now)]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(harness.ledger.freeze_schedule(), None);
    assert!(!marker.exists());
}

#[test]
fn freeze_start_must_lie_in_the_future() {
    let artifacts = tempfile::tempdir().expect("tempdir");
    let node_config = NodeConfig {
        freeze: FreezeConfig {
            artifacts_dir: artifacts.path().to_path_buf(),
        },
        ..NodeConfig::default()
    };
    let mut harness = TestHarness::with_node_config(node_config);
    let now = Timestamp::now();

    let stale = freeze_tx_body(
        account_id(ALICE),
        now,
        FreezeBody::Schedule {
            start_time: now.saturating_sub_secs(1),
        },
    );
    let round = round_of(vec![envelope_of(signed_by_ed(&stale, &[&alice_signer()]), now)]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(
        statuses(&harness),
        vec![ResponseCode::FreezeStartTimeMustBeFuture]
    );
    assert_eq!(harness.ledger.freeze_schedule(), None);
    assert!(!artifacts.path().join(FREEZE_MARKER_FILE).exists());
    // A handler failure still costs the payer its fee.
    assert_eq!(harness.balance(ALICE), 100_000 - SERVICE_FEE);
}

#[test]
fn unclassifiable_handler_errors_charge_no_one() {
    // Point the artifacts directory at a regular file so the marker write
    // fails with an I/O error the handler cannot classify.
    let blocker = tempfile::NamedTempFile::new().expect("tempfile");
    let node_config = NodeConfig {
        freeze: FreezeConfig {
            artifacts_dir: blocker.path().to_path_buf(),
        },
        ..NodeConfig::default()
    };
    let mut harness = TestHarness::with_node_config(node_config);
    let now = Timestamp::now();

    let schedule = freeze_tx_body(
        account_id(ALICE),
        now,
        FreezeBody::Schedule {
            start_time: now.saturating_add_secs(60),
        },
    );
    let round = round_of(vec![envelope_of(signed_by_ed(&schedule, &[&alice_signer()]), now)]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    assert_eq!(statuses(&harness), vec![ResponseCode::Unknown]);
    assert_eq!(harness.balance(ALICE), 100_000);
    assert_eq!(harness.ledger.freeze_schedule(), None);
}

#[test]
fn fees_never_drive_a_balance_negative() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let mut alice = harness.ledger.account(&account_id(ALICE)).expect("seeded");
    alice.balance = 30;
    harness.ledger.put_account(alice);

    let body = transfer_body(
        account_id(ALICE),
        now,
        &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
    );
    let round = round_of(vec![envelope_of(signed_by_ed(&body, &[&alice_signer()]), now)]);
    harness.handle.handle_round(&mut harness.ledger, &round);

    // The transfer fails on balance; the fee collects only what exists.
    let records = harness.stream.records();
    assert_eq!(records[0].status(), ResponseCode::InsufficientAccountBalance);
    assert_eq!(records[0].transaction_fee, 30);
    assert_eq!(harness.balance(ALICE), 0);
    assert_eq!(harness.balance(FUNDING), 30);
}

#[test]
fn per_payer_record_history_is_bounded_across_rounds() {
    let mut harness = TestHarness::new();
    let now = Timestamp::now();
    let depth = harness
        .config
        .load()
        .workflow()
        .records_max_queryable_by_account;

    for index in 0..(depth as u64 + 3) {
        let body = transfer_body(
            account_id(ALICE),
            now.saturating_add_nanos(index),
            &[(account_id(ALICE), -1), (account_id(ERIN), 1)],
        );
        let round = round_of(vec![envelope_of(
            signed_by_ed(&body, &[&alice_signer()]),
            now.saturating_add_nanos(index),
        )]);
        harness.handle.handle_round(&mut harness.ledger, &round);
    }

    let history = harness.record_cache.records_for(&account_id(ALICE));
    assert_eq!(history.len(), depth);
    // The eldest records were evicted; the survivors are the newest, still
    // in consensus order.
    assert_eq!(
        history[0].transaction_id.valid_start,
        now.saturating_add_nanos(3)
    );
    assert!(history.iter().all(|record| record.status() == ResponseCode::Ok));
}

#[test]
fn identical_rounds_produce_identical_records_and_state() {
    let now = Timestamp::now();
    let build_round = || {
        let transfer = transfer_body(
            account_id(ALICE),
            now,
            &[(account_id(ALICE), -1000), (account_id(ERIN), 1000)],
        );
        let missing = transfer_body(
            account_id(FRANK_ABSENT),
            now.saturating_add_nanos(5),
            &[(account_id(FRANK_ABSENT), -10), (account_id(ERIN), 10)],
        );
        round_of(vec![
            envelope_of(signed_by_ed(&transfer, &[&alice_signer()]), now),
            envelope_of(
                signed_by_ed(&missing, &[&alice_signer()]),
                now.saturating_add_nanos(1),
            ),
        ])
    };

    let mut left = TestHarness::new();
    let mut right = TestHarness::new();
    left.handle.handle_round(&mut left.ledger, &build_round());
    right.handle.handle_round(&mut right.ledger, &build_round());

    assert_eq!(left.stream.records(), right.stream.records());
    for num in [NODE, FUNDING, ALICE, ERIN, CAROL_HOLLOW] {
        assert_eq!(left.balance(num), right.balance(num));
    }
}
