use release_mirror_core::watch::{debounce, ConfigWatcher, WatchError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

const DELAY: Duration = Duration::from_millis(300);

fn recorder() -> (Arc<Mutex<Vec<Instant>>>, impl FnMut() -> std::future::Ready<()>) {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = fired.clone();
    let on_settled = move || {
        sink.lock().unwrap().push(Instant::now());
        std::future::ready(())
    };
    (fired, on_settled)
}

#[tokio::test(start_paused = true)]
async fn burst_of_writes_triggers_exactly_one_reload_after_the_delay() {
    let (tx, rx) = mpsc::unbounded_channel();
    let (fired, on_settled) = recorder();
    let handle = tokio::spawn(debounce(rx, DELAY, on_settled));

    let mut last_event = Instant::now();
    for _ in 0..5 {
        tx.send(()).unwrap();
        last_event = Instant::now();
        sleep(Duration::from_millis(10)).await;
    }
    sleep(Duration::from_secs(2)).await;
    drop(tx);
    handle.await.unwrap();

    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), 1);
    assert!(fired[0] >= last_event + DELAY);
}

#[tokio::test(start_paused = true)]
async fn separate_bursts_trigger_separate_reloads() {
    let (tx, rx) = mpsc::unbounded_channel();
    let (fired, on_settled) = recorder();
    let handle = tokio::spawn(debounce(rx, DELAY, on_settled));

    tx.send(()).unwrap();
    tx.send(()).unwrap();
    sleep(Duration::from_secs(1)).await;
    tx.send(()).unwrap();
    sleep(Duration::from_secs(1)).await;
    drop(tx);
    handle.await.unwrap();

    assert_eq!(fired.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn pending_burst_still_waits_for_the_delay_when_events_stop_for_good() {
    let (tx, rx) = mpsc::unbounded_channel();
    let (fired, on_settled) = recorder();

    let start = Instant::now();
    tx.send(()).unwrap();
    drop(tx);
    debounce(rx, DELAY, on_settled).await;

    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), 1);
    assert!(fired[0] >= start + DELAY);
}

#[tokio::test(start_paused = true)]
async fn no_events_means_no_reload() {
    let (tx, rx) = mpsc::unbounded_channel::<()>();
    let (fired, on_settled) = recorder();
    drop(tx);
    debounce(rx, DELAY, on_settled).await;
    assert!(fired.lock().unwrap().is_empty());
}

#[tokio::test]
async fn watching_a_missing_config_file_fails_setup() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = ConfigWatcher::new(dir.path().join("config.yaml"), DELAY);

    let err = watcher
        .run(|| async {})
        .await
        .expect_err("setup should fail");
    assert!(matches!(err, WatchError::ConfigUnavailable { .. }));
}

#[tokio::test]
async fn writing_the_config_file_triggers_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "releases: [\"22.04\"]\n").unwrap();
    std::fs::write(dir.path().join("other.txt"), "x").unwrap();

    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = reloads.clone();
    let watcher = ConfigWatcher::new(&config, Duration::from_millis(100));

    let driver = async {
        sleep(Duration::from_millis(300)).await;
        for i in 0..3 {
            std::fs::write(&config, format!("releases: [\"22.04\"]\n# edit {i}\n")).unwrap();
            sleep(Duration::from_millis(10)).await;
        }
        sleep(Duration::from_millis(1500)).await;
    };

    tokio::select! {
        res = watcher.run(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }) => panic!("watcher stopped unexpectedly: {res:?}"),
        _ = driver => {}
    }

    assert!(reloads.load(Ordering::SeqCst) >= 1);
}
