// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::AtomicU32;
use std::time::Duration;

use tokio::sync::oneshot;

use super::*;

#[tokio::test]
async fn concurrent_callers_share_one_flight() {
    let group: Arc<SingleFlight<String, String>> = Arc::new(SingleFlight::new());
    let calls = Arc::new(AtomicU32::new(0));
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let release_rx = Arc::new(Mutex::new(Some(release_rx)));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let group = Arc::clone(&group);
        let calls = Arc::clone(&calls);
        let release_rx = Arc::clone(&release_rx);
        handles.push(tokio::spawn(async move {
            group
                .run(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let rx = release_rx.lock().take();
                    async move {
                        if let Some(rx) = rx {
                            let _ = rx.await;
                        }
                        Ok("T2".to_owned())
                    }
                })
                .await
        }));
    }

    // Let every task join before releasing the flight.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(group.in_flight());
    let _ = release_tx.send(());

    let mut leaders = 0;
    for h in handles {
        let (result, leader) = h.await.unwrap_or((Err("join".into()), false));
        assert_eq!(result.as_deref(), Ok("T2"));
        leaders += usize::from(leader);
    }
    assert_eq!(leaders, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(group.started(), 1);
    assert!(!group.in_flight());
}

#[tokio::test]
async fn failure_is_shared_by_every_waiter() {
    let group: Arc<SingleFlight<String, String>> = Arc::new(SingleFlight::new());
    let slow = || async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Err::<String, String>("refresh down".to_owned())
    };

    let (a, b) = tokio::join!(group.run(slow), group.run(slow));
    assert_eq!(a.0, Err("refresh down".to_owned()));
    assert_eq!(b.0, Err("refresh down".to_owned()));
    assert!(a.1 ^ b.1);
    assert_eq!(group.started(), 1);
}

#[tokio::test]
async fn settled_flight_is_not_reused() {
    let group: SingleFlight<u32, ()> = SingleFlight::new();
    let (first, _) = group.run(|| async { Ok(1) }).await;
    let (second, leader) = group.run(|| async { Ok(2) }).await;
    assert_eq!(first, Ok(1));
    assert_eq!(second, Ok(2));
    assert!(leader);
    assert_eq!(group.started(), 2);
}

#[tokio::test]
async fn abandoned_leader_does_not_wedge_followers() {
    let group: Arc<SingleFlight<u32, ()>> = Arc::new(SingleFlight::new());

    let leader = {
        let group = Arc::clone(&group);
        tokio::spawn(async move {
            group
                .run(|| async {
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    Ok(7)
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    leader.abort();

    let (result, joined_as_leader) = group.run(|| async { Ok(99) }).await;
    assert_eq!(result, Ok(7));
    assert!(!joined_as_leader);
}
