use super::*;
use crate::util::test::trace_init;
use futures_util::FutureExt;
use std::sync::{
    atomic::{AtomicUsize, Ordering::SeqCst},
    Arc,
};
use tokio::task::JoinSet;

#[test]
fn acquire_completes_immediately_with_tokens() {
    let sem = CountingSemaphore::new(2);
    assert_eq!(sem.acquire(2).now_or_never(), Some(()));
    assert!(sem.acquire(1).now_or_never().is_none());
    assert_eq!(sem.release(2).now_or_never(), Some(()));
    assert!(sem.release(1).now_or_never().is_none());
    assert_eq!(sem.available(), 2);
}

#[test]
fn dropped_acquire_takes_nothing() {
    let sem = CountingSemaphore::new(1);
    assert!(sem.try_acquire(1));
    assert!(sem.acquire(1).now_or_never().is_none());

    assert!(sem.try_release(1));
    assert_eq!(sem.available(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn limits_running_tasks() {
    const TASKS: usize = 64;
    const LIMIT: usize = 3;
    let _trace = trace_init();

    let sem = Arc::new(CountingSemaphore::new(LIMIT));
    let running = Arc::new(AtomicUsize::new(0));
    let max_running = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    for _ in 0..TASKS {
        let sem = sem.clone();
        let running = running.clone();
        let max_running = max_running.clone();
        tasks.spawn(async move {
            sem.acquire(1).await;
            let now = running.fetch_add(1, SeqCst) + 1;
            assert!(now <= LIMIT, "{now} tasks running with a limit of {LIMIT}");
            max_running.fetch_max(now, SeqCst);

            tokio::task::yield_now().await;

            running.fetch_sub(1, SeqCst);
            sem.release(1).await;
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    assert_eq!(sem.available(), LIMIT);
    assert!(max_running.load(SeqCst) <= LIMIT);
}

#[tokio::test]
async fn countdown() {
    const WORKERS: usize = 5;
    let _trace = trace_init();

    // every worker returns a token when it finishes; the main task waits
    // until all of them have.
    let done = Arc::new(CountingSemaphore::new(WORKERS));
    assert!(done.try_acquire(WORKERS));

    for i in 0..WORKERS {
        let done = done.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(i as u64)).await;
            done.release(1).await;
        });
    }

    done.acquire(WORKERS).await;
    assert_eq!(done.available(), 0);
}

#[tokio::test]
async fn waiting_release_makes_progress() {
    let sem = Arc::new(CountingSemaphore::new(1));

    let releaser = tokio::spawn({
        let sem = sem.clone();
        async move { sem.release(1).await }
    });
    tokio::task::yield_now().await;
    assert!(!releaser.is_finished());

    sem.acquire(1).await;
    releaser.await.unwrap();
    assert_eq!(sem.available(), 1);
}

#[tokio::test]
async fn acquire_over_capacity_never_completes() {
    let sem = CountingSemaphore::new(2);
    let res = tokio::time::timeout(std::time::Duration::from_millis(10), sem.acquire(3)).await;
    assert!(res.is_err());
    assert_eq!(sem.available(), 2);
}

#[test]
fn blocking_across_threads() {
    const THREADS: usize = 8;
    let _trace = trace_init();

    let sem = Arc::new(CountingSemaphore::new(2));
    let running = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..THREADS)
        .map(|_| {
            let sem = sem.clone();
            let running = running.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    sem.acquire_blocking(1);
                    assert!(running.fetch_add(1, SeqCst) < 2);
                    std::thread::yield_now();
                    running.fetch_sub(1, SeqCst);
                    sem.release_blocking(1);
                }
            })
        })
        .collect();

    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(sem.available(), 2);
}

#[test]
fn spin_across_threads() {
    let sem = Arc::new(CountingSemaphore::new(1));
    assert!(sem.try_acquire(1));

    let thread = std::thread::spawn({
        let sem = sem.clone();
        move || sem.acquire_spin(1)
    });

    std::thread::sleep(std::time::Duration::from_millis(5));
    sem.release_spin(1);
    thread.join().unwrap();
    assert_eq!(sem.available(), 0);
}
