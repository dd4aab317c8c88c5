use std::sync::Arc;

use ledger_bank::{
    Currency, Ledger, LedgerService, MemoryLedger, NewAccount, Page, RequestContext,
    TransferEngine, TransferError, TransferParams,
};

/// Engine and service over one fresh in-memory ledger
fn setup() -> (TransferEngine, LedgerService) {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    (
        TransferEngine::new(ledger.clone()),
        LedgerService::new(ledger),
    )
}

#[tokio::test]
async fn transfer_moves_money_and_records_both_sides() {
    let (engine, service) = setup();
    let alice = service
        .create_account(NewAccount::new("alice", 100, Currency::Usd))
        .await
        .unwrap();
    let bob = service
        .create_account(NewAccount::new("bob", 50, Currency::Usd))
        .await
        .unwrap();

    let ctx = RequestContext::new().with_correlation_id("it-1");
    let result = engine
        .transfer_money(TransferParams::new(alice.id, bob.id, 30), &ctx)
        .await
        .unwrap();

    assert_eq!(result.transfer.amount, 30);
    assert_eq!(result.from_entry.amount, -30);
    assert_eq!(result.to_entry.amount, 30);
    assert_eq!(result.from_account.balance, 70);
    assert_eq!(result.to_account.balance, 80);

    // Sum of entries per account equals its balance change
    let alice_entries = service.list_entries(alice.id, Page::default()).await.unwrap();
    let bob_entries = service.list_entries(bob.id, Page::default()).await.unwrap();
    assert_eq!(alice_entries.iter().map(|e| e.amount).sum::<i64>(), -30);
    assert_eq!(bob_entries.iter().map(|e| e.amount).sum::<i64>(), 30);

    let history = service
        .list_transfers(alice.id, alice.id, Page::default())
        .await
        .unwrap();
    assert_eq!(history, vec![result.transfer]);
}

#[tokio::test]
async fn rejected_transfers_leave_balances_alone() {
    let (engine, service) = setup();
    let alice = service
        .create_account(NewAccount::new("alice", 10, Currency::Eur))
        .await
        .unwrap();
    let bob = service
        .create_account(NewAccount::new("bob", 0, Currency::Eur))
        .await
        .unwrap();
    let ctx = RequestContext::new();

    let cases = [
        (TransferParams::new(alice.id, alice.id, 5), "INVALID_ARGUMENT"),
        (TransferParams::new(alice.id, bob.id, 0), "INVALID_ARGUMENT"),
        (TransferParams::new(alice.id, 12_345, 5), "NOT_FOUND"),
        (TransferParams::new(alice.id, bob.id, 11), "INSUFFICIENT_FUNDS"),
    ];
    for (params, code) in cases {
        let err: TransferError = engine.transfer_money(params, &ctx).await.unwrap_err();
        assert_eq!(err.code(), code, "{:?}", params);
    }

    assert_eq!(service.get_account(alice.id).await.unwrap().balance, 10);
    assert_eq!(service.get_account(bob.id).await.unwrap().balance, 0);
    assert!(
        service
            .list_transfers(alice.id, bob.id, Page::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_across_three_accounts_conserve_total() {
    let (engine, service) = setup();
    let engine = Arc::new(engine);

    let mut ids = Vec::new();
    for owner in ["a", "b", "c"] {
        let account = service
            .create_account(NewAccount::new(owner, 1_000, Currency::Cad))
            .await
            .unwrap();
        ids.push(account.id);
    }

    let mut handles = Vec::new();
    for i in 0..30 {
        let engine = engine.clone();
        let from = ids[i % 3];
        let to = ids[(i + 1) % 3];
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::new();
            engine
                .transfer_money(TransferParams::new(from, to, 7), &ctx)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut total = 0;
    for id in &ids {
        let balance = service.get_account(*id).await.unwrap().balance;
        // 10 out, 10 in for each account
        assert_eq!(balance, 1_000);
        total += balance;
    }
    assert_eq!(total, 3_000);
}
