use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bank_ledger::ledger::{CreateAccountParams, MemoryLedger, TransferEngine, TransferTxParams};

/// Engine over a fresh in-memory store plus two funded USD accounts
async fn setup(balance1: i64, balance2: i64) -> (MemoryLedger, Arc<TransferEngine>, i64, i64) {
    let ledger = MemoryLedger::new();
    let engine = Arc::new(TransferEngine::new(Arc::new(ledger.clone())));

    let mut ids = Vec::new();
    for (owner, balance) in [("alice", balance1), ("bob", balance2)] {
        let account = engine
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance,
                currency: "USD".to_string(),
            })
            .await
            .unwrap();
        ids.push(account.id);
    }
    (ledger, engine, ids[0], ids[1])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_serialize_on_the_source_row() {
    let (ledger, engine, a, b) = setup(1000, 700).await;
    let n = 5;
    let amount = 10;

    let handles: Vec<_> = (0..n)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .transfer(TransferTxParams {
                        from_account_id: a,
                        to_account_id: b,
                        amount,
                    })
                    .await
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();

        assert_eq!(result.transfer.from_account_id, a);
        assert_eq!(result.transfer.to_account_id, b);
        assert_eq!(result.from_entry.amount, -amount);
        assert_eq!(result.to_entry.amount, amount);
        assert_eq!(result.from_entry.account_id, a);
        assert_eq!(result.to_entry.account_id, b);

        // Each transfer sees a distinct multiple of the amount
        let diff1 = 1000 - result.from_account.balance;
        let diff2 = result.to_account.balance - 700;
        assert_eq!(diff1, diff2);
        assert!(diff1 > 0);
        assert_eq!(diff1 % amount, 0);

        let k = diff1 / amount;
        assert!((1..=n).contains(&k));
        assert!(seen.insert(k), "balance step {k} observed twice");
    }

    assert_eq!(ledger.account(a).unwrap().balance, 1000 - n * amount);
    assert_eq!(ledger.account(b).unwrap().balance, 700 + n * amount);
    assert_eq!(ledger.transfers().len(), n as usize);
    assert_eq!(ledger.entries().len(), 2 * n as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_direction_transfers_do_not_deadlock() {
    let (ledger, engine, a, b) = setup(1000, 700).await;
    let n = 10;
    let amount = 10;

    let tasks = (0..n).map(|i| {
        let engine = engine.clone();
        let (from, to) = if i % 2 == 1 { (b, a) } else { (a, b) };
        async move {
            engine
                .transfer(TransferTxParams {
                    from_account_id: from,
                    to_account_id: to,
                    amount,
                })
                .await
        }
    });
    let handles: Vec<_> = tasks.map(tokio::spawn).collect();

    let results = tokio::time::timeout(Duration::from_secs(10), futures::future::join_all(handles))
        .await
        .expect("transfers deadlocked");
    for result in results {
        result.unwrap().unwrap();
    }

    assert_eq!(ledger.account(a).unwrap().balance, 1000);
    assert_eq!(ledger.account(b).unwrap().balance, 700);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn money_is_conserved_across_random_transfers() {
    let ledger = MemoryLedger::new();
    let engine = Arc::new(TransferEngine::new(Arc::new(ledger.clone())));

    let mut ids = Vec::new();
    for i in 0..4 {
        let account = engine
            .create_account(CreateAccountParams {
                owner: format!("owner-{i}"),
                balance: 10_000,
                currency: "EUR".to_string(),
            })
            .await
            .unwrap();
        ids.push(account.id);
    }

    let pairs: Vec<(i64, i64, i64)> = {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..40)
            .map(|_| {
                let from = ids[rng.gen_range(0..ids.len())];
                let mut to = ids[rng.gen_range(0..ids.len())];
                while to == from {
                    to = ids[rng.gen_range(0..ids.len())];
                }
                (from, to, rng.gen_range(1..=50))
            })
            .collect()
    };

    let handles: Vec<_> = pairs
        .iter()
        .map(|&(from, to, amount)| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .transfer(TransferTxParams {
                        from_account_id: from,
                        to_account_id: to,
                        amount,
                    })
                    .await
            })
        })
        .collect();

    let results = tokio::time::timeout(Duration::from_secs(10), futures::future::join_all(handles))
        .await
        .expect("transfers deadlocked");
    for result in results {
        result.unwrap().unwrap();
    }

    let total: i64 = ids
        .iter()
        .map(|&id| ledger.account(id).unwrap().balance)
        .sum();
    assert_eq!(total, 4 * 10_000);

    // Every balance equals its opening amount plus its entries
    let entries = ledger.entries();
    for &id in &ids {
        let delta: i64 = entries
            .iter()
            .filter(|e| e.account_id == id)
            .map(|e| e.amount)
            .sum();
        assert_eq!(ledger.account(id).unwrap().balance, 10_000 + delta);
    }
    assert_eq!(entries.len(), 2 * pairs.len());
}

#[tokio::test]
async fn lock_order_is_ascending_in_both_directions() {
    let (ledger, engine, a, b) = setup(100, 100).await;
    assert!(a < b);

    for (from, to) in [(a, b), (b, a)] {
        ledger.clear_balance_calls();
        engine
            .transfer(TransferTxParams {
                from_account_id: from,
                to_account_id: to,
                amount: 1,
            })
            .await
            .unwrap();
        assert_eq!(ledger.balance_calls(), vec![a, b]);
    }
}
