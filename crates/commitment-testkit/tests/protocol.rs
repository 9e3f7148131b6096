//! End-to-end protocol scenarios over simulated chains.

use commitment_core::{CommitmentState, Network, SignatureCheck};
use commitment_engine::{EngineError, EngineSettings, ErrorCategory, ProtocolViolation};
use commitment_testkit::fixtures::{TestNetwork, ALICE, BOB, TED};

#[tokio::test]
async fn test_issue_transfer_complete() {
    let net = TestNetwork::new();
    let engine = &net.engine;

    // 1. Issue
    let (cpid, cp) = engine.issue(ALICE, "art", "tok-1", Network::Bsv).await.unwrap();
    assert_eq!(cp.previous_packet, None);
    assert!(engine.can_transfer(&cpid, BOB, false).await.unwrap());
    assert!(!engine.can_transfer(&cpid, ALICE, false).await.unwrap());

    // 2. Propose
    let (cpid2, cp2) = engine.propose_transfer(cpid, BOB, Network::Bsv).await.unwrap();
    assert_eq!(cp2.previous_packet, Some(cpid));
    assert!(cp2.signature.is_none());
    assert!(engine.can_complete(&cpid2, ALICE).await.unwrap());
    assert!(!engine.can_complete(&cpid2, BOB).await.unwrap());

    // 3. Complete
    let (cpid3, cp3) = engine.complete_transfer(cpid2, ALICE).await.unwrap();
    assert_eq!(cpid3, cpid2);
    let prev = engine.record(&cpid).await.unwrap().unwrap();
    assert_eq!(prev.state, CommitmentState::Transferred);
    assert!(prev.spending_tx.is_some());

    let signature = cp3.signature.expect("completed packet is signed");
    cp.public_key
        .verify(cp.signature_scheme, &cp3.digest(), &signature)
        .unwrap();
    assert!(!engine.can_transfer(&cpid3, BOB, false).await.unwrap());
    assert!(engine.can_transfer(&cpid3, ALICE, false).await.unwrap());

    // 4. The predecessor is spent
    let err = engine
        .propose_transfer(cpid, TED, Network::Bsv)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Protocol(ProtocolViolation::AlreadyTransferred(c)) if c == cpid
    ));
    assert_eq!(err.category(), ErrorCategory::Protocol);
}

#[tokio::test]
async fn test_transfer_signature_belongs_to_outgoing_owner() {
    let net = TestNetwork::new();
    let engine = &net.engine;

    let (root, _) = engine.issue(ALICE, "art", "tok-1", Network::Eth).await.unwrap();
    let (template, _) = engine.propose_transfer(root, BOB, Network::Eth).await.unwrap();
    let (_, packet) = engine.complete_transfer(template, ALICE).await.unwrap();
    let signature = packet.signature.unwrap();

    for (actor, verifies) in [(ALICE, true), (BOB, false), (TED, false)] {
        let key = net.token_key(actor).unwrap();
        let result = key
            .public_key()
            .verify(key.scheme(), &packet.digest(), &signature);
        assert_eq!(result.is_ok(), verifies, "{actor}");
    }
}

#[tokio::test]
async fn test_single_ownership_through_lineage() {
    let net = TestNetwork::new();
    let engine = &net.engine;
    let live = || net.live_records("art", "tok-2", Network::Bsv);

    let (root, _) = engine.issue(BOB, "art", "tok-2", Network::Bsv).await.unwrap();
    assert_eq!(live().await.unwrap().len(), 1);

    let (template, _) = engine.propose_transfer(root, TED, Network::Bsv).await.unwrap();
    assert_eq!(live().await.unwrap().len(), 1);
    assert!(!engine.is_unique("art", "tok-2", Network::Bsv).await.unwrap());

    engine.complete_transfer(template, BOB).await.unwrap();
    let after = live().await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].owner, TED);
}

#[tokio::test]
async fn test_no_self_transfer() {
    let net = TestNetwork::new();
    let (root, _) = net
        .engine
        .issue(ALICE, "art", "tok-1", Network::Bsv)
        .await
        .unwrap();

    let err = net
        .engine
        .propose_transfer(root, ALICE, Network::Bsv)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Protocol(ProtocolViolation::NotTransferable { .. })
    ));
    // Rejected before any backend call: only the issuance minted.
    assert_eq!(net.utxo_chain.funding_requests(), 1);
}

#[tokio::test]
async fn test_completion_requires_prior_ownership() {
    let net = TestNetwork::new();
    let engine = &net.engine;

    let (root, _) = engine.issue(ALICE, "art", "tok-1", Network::Eth).await.unwrap();
    let (template, _) = engine.propose_transfer(root, BOB, Network::Eth).await.unwrap();

    assert!(!engine.can_complete(&template, TED).await.unwrap());
    let err = engine.complete_transfer(template, TED).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Protocol(ProtocolViolation::NotAuthorized { .. })
    ));
    assert_eq!(net.contract.spends(), 0);
    assert_eq!(
        engine.verify_signature(template).await.unwrap(),
        SignatureCheck::Unsigned
    );
}

#[tokio::test]
async fn test_reverification_is_stable() {
    let net = TestNetwork::new();
    let (root, _) = net
        .engine
        .issue(TED, "art", "tok-3", Network::Bsv)
        .await
        .unwrap();
    let done = net.transfer(root, TED, ALICE, Network::Bsv).await.unwrap();

    let first = net.engine.verify_signature(done).await.unwrap();
    let second = net.engine.verify_signature(done).await.unwrap();
    assert_eq!(first, SignatureCheck::Valid);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_mixed_curve_provenance() {
    let net = TestNetwork::new();
    let engine = &net.engine;

    // P-256 root, Ed25519 middle hop, P-256 head.
    let (root, _) = engine.issue(ALICE, "music", "tok-1", Network::Eth).await.unwrap();
    let to_ted = net.transfer(root, ALICE, TED, Network::Eth).await.unwrap();
    let to_bob = net.transfer(to_ted, TED, BOB, Network::Eth).await.unwrap();

    let report = engine.verify_provenance(to_bob).await.unwrap();
    assert!(report.is_verified());
    let hops: Vec<_> = report.hops.iter().map(|(c, _)| *c).collect();
    assert_eq!(hops, vec![to_bob, to_ted, root]);

    let status = engine.commitment_status(to_bob).await.unwrap();
    let owners: Vec<_> = status
        .hops
        .iter()
        .map(|h| h.public_key_owner.as_deref())
        .collect();
    assert_eq!(owners, vec![Some(BOB), Some(TED), Some(ALICE)]);
    assert_eq!(
        engine.finalizing_tx(to_bob).await.unwrap(),
        engine.record(&to_ted).await.unwrap().unwrap().spending_tx
    );
}

#[tokio::test]
async fn test_lineage_is_network_scoped() {
    let net = TestNetwork::new();
    let engine = &net.engine;

    let (bsv_root, _) = engine.issue(ALICE, "art", "tok-1", Network::Bsv).await.unwrap();
    // The token is now assigned, so the same instance cannot start on ETH.
    let err = engine
        .issue(BOB, "art", "tok-1", Network::Eth)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);

    // A transfer template may move the lineage to another network.
    let (template, packet) = engine
        .propose_transfer(bsv_root, BOB, Network::Eth)
        .await
        .unwrap();
    assert_eq!(packet.blockchain_id, Network::Eth);
    assert!(packet.blockchain_outpoint.starts_with("0x"));
    engine.complete_transfer(template, ALICE).await.unwrap();
    assert_eq!(net.utxo_chain.spends(), 1);
    assert_eq!(net.contract.spends(), 0);
}

#[tokio::test]
async fn test_backend_reconnects_once() {
    let net = TestNetwork::new();

    net.utxo_chain.disconnect();
    let (root, _) = net
        .engine
        .issue(ALICE, "art", "tok-1", Network::Bsv)
        .await
        .unwrap();
    assert!(net.engine.record(&root).await.unwrap().is_some());

    net.contract.disconnect();
    net.contract.refuse_reconnect(true);
    let err = net
        .engine
        .issue(BOB, "art", "tok-2", Network::Eth)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::BackendUnavailable {
            network: Network::Eth,
            ..
        }
    ));
    assert_eq!(err.category(), ErrorCategory::Backend);
    assert_eq!(net.engine.status().await.unwrap().records, 1);
    assert!(net.engine.is_unique("art", "tok-2", Network::Eth).await.unwrap());
}

#[tokio::test]
async fn test_anchor_check_passes_live_anchor() {
    let net = TestNetwork::with_settings(EngineSettings {
        check_anchor_status: true,
        ..EngineSettings::default()
    });
    let engine = &net.engine;

    let (root, _) = engine.issue(ALICE, "art", "tok-1", Network::Eth).await.unwrap();
    let done = net.transfer(root, ALICE, BOB, Network::Eth).await.unwrap();

    // Bob's anchor is live; proposing onward still works.
    let (next, _) = engine.propose_transfer(done, TED, Network::Eth).await.unwrap();
    assert!(engine.can_complete(&next, BOB).await.unwrap());

    // The template waits on Bob, not on Ted who will own it.
    let awaiting_bob = engine.pending_transfers_into(BOB).await.unwrap();
    assert_eq!(awaiting_bob.len(), 1);
    assert_eq!(awaiting_bob[0].cpid(), next);
    assert!(engine.pending_transfers_into(TED).await.unwrap().is_empty());
}
