use super::*;
use crate::loom::{
    self, future,
    sync::{
        atomic::{AtomicUsize, Ordering::SeqCst},
        Arc,
    },
    thread,
};

#[test]
fn bounds_concurrency() {
    const THREADS: usize = 2;

    async fn task((ref sem, ref running): &(CountingSemaphore, AtomicUsize)) {
        sem.acquire(1).await;
        let actual = running.fetch_add(1, SeqCst);
        assert!(actual < 1, "only one task may hold the token");

        running.fetch_sub(1, SeqCst);
        sem.release(1).await;
    }

    loom::model(|| {
        let sem = Arc::new((CountingSemaphore::new(1), AtomicUsize::new(0)));
        let threads = (0..THREADS)
            .map(|_| {
                let sem = sem.clone();
                thread::spawn(move || future::block_on(task(&sem)))
            })
            .collect::<Vec<_>>();

        future::block_on(task(&sem));

        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(sem.0.available(), 1);
    })
}

#[test]
fn release_wakes_acquire() {
    loom::model(|| {
        let sem = Arc::new(CountingSemaphore::new(1));
        assert!(sem.try_acquire(1));

        let thread = thread::spawn({
            let sem = sem.clone();
            move || future::block_on(sem.acquire(1))
        });

        assert!(sem.try_release(1));
        thread.join().unwrap();
        assert_eq!(sem.available(), 0);
    })
}

#[test]
fn acquire_wakes_release() {
    loom::model(|| {
        let sem = Arc::new(CountingSemaphore::new(1));

        let thread = thread::spawn({
            let sem = sem.clone();
            move || future::block_on(sem.release(1))
        });

        assert!(sem.try_acquire(1));
        thread.join().unwrap();
        assert_eq!(sem.available(), 1);
    })
}

#[test]
fn try_ops_stay_in_bounds() {
    loom::model(|| {
        let sem = Arc::new(CountingSemaphore::new(2));
        assert!(sem.try_acquire(1));

        let acquirer = thread::spawn({
            let sem = sem.clone();
            move || sem.try_acquire(2)
        });
        let releaser = thread::spawn({
            let sem = sem.clone();
            move || sem.try_release(1)
        });

        let acquired = acquirer.join().unwrap();
        let released = releaser.join().unwrap();
        let available = sem.available();
        assert!(available <= sem.size());

        // the releaser always has room: at most one token is ever out.
        assert!(released);
        let expected = if acquired { 0 } else { 2 };
        assert_eq!(available, expected);
    })
}
