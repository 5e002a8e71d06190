use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use storage_node::Dispatcher;
use storage_node::error::DispatchError;

#[tokio::test]
async fn submit_returns_closure_result() {
    let dispatcher = Dispatcher::start(2, 4).unwrap();
    let value = dispatcher.submit(|| 6 * 7).await.unwrap();
    assert_eq!(value, 42);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn zero_sized_pool_is_rejected() {
    assert!(matches!(
        Dispatcher::start(0, 4),
        Err(DispatchError::InvalidConfig(_))
    ));
    assert!(matches!(
        Dispatcher::start(4, 0),
        Err(DispatchError::InvalidConfig(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded_by_worker_count() {
    let dispatcher = Arc::new(Dispatcher::start(2, 16).unwrap());
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..12 {
        let dispatcher = Arc::clone(&dispatcher);
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            dispatcher
                .submit(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                    i
                })
                .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    results.sort();
    assert_eq!(results, (0..12).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 2);

    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_queue_blocks_submitters_without_dropping_work() {
    let dispatcher = Arc::new(Dispatcher::start(1, 1).unwrap());
    let (release_tx, release_rx) = std_mpsc::channel::<()>();
    let release_rx = Arc::new(std::sync::Mutex::new(release_rx));
    let started = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..3 {
        let dispatcher = Arc::clone(&dispatcher);
        let release_rx = Arc::clone(&release_rx);
        let started = Arc::clone(&started);
        handles.push(tokio::spawn(async move {
            dispatcher
                .submit(move || {
                    started.fetch_add(1, Ordering::SeqCst);
                    release_rx.lock().unwrap().recv().unwrap();
                    i
                })
                .await
        }));
        // Keep submission order deterministic.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // One item running, one queued, the third submitter is waiting for a slot.
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.queued(), 1);
    assert!(handles.iter().all(|h| !h.is_finished()));

    for _ in 0..3 {
        release_tx.send(()).unwrap();
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    assert_eq!(results, vec![0, 1, 2]);
    assert_eq!(started.load(Ordering::SeqCst), 3);

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn panicking_work_does_not_kill_worker() {
    let dispatcher = Dispatcher::start(1, 4).unwrap();

    let err = dispatcher
        .submit(|| -> u32 { panic!("boom") })
        .await
        .unwrap_err();
    match err {
        DispatchError::Panicked(message) => assert!(message.contains("boom")),
        other => panic!("unexpected error: {other:?}"),
    }

    // The single worker is still serving.
    assert_eq!(dispatcher.submit(|| "still alive").await.unwrap(), "still alive");
    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_drains_in_flight_and_queued_work() {
    let dispatcher = Arc::new(Dispatcher::start(1, 8).unwrap());

    let mut handles = Vec::new();
    for i in 0..4u64 {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            dispatcher
                .submit(move || {
                    std::thread::sleep(Duration::from_millis(50));
                    i * 10
                })
                .await
        }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    dispatcher.shutdown().await;
    assert!(!dispatcher.is_accepting());

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    results.sort();
    assert_eq!(results, vec![0, 10, 20, 30]);
}

#[tokio::test]
async fn submissions_after_shutdown_are_rejected() {
    let dispatcher = Dispatcher::start(2, 4).unwrap();
    dispatcher.shutdown().await;

    let err = dispatcher.submit(|| 1).await.unwrap_err();
    assert!(matches!(err, DispatchError::ShuttingDown));
    // Shutting down twice is harmless.
    dispatcher.shutdown().await;
}
