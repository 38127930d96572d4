#![cfg(feature = "std")]

mod util;
use spore::{Broadcast, BroadcastFuture, CountingSemaphore, ImmediateFuture, Outcome};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering::SeqCst},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

const WORKERS: usize = if cfg!(miri) { 4 } else { 16 };
const ITEMS: usize = if cfg!(miri) { 8 } else { 200 };
const IN_FLIGHT: usize = 3;

/// Many worker threads pull items from a shared queue, but at most
/// `IN_FLIGHT` of them may process an item at once. Workers do not start
/// until the pipeline's configuration is published.
#[test]
fn bounded_worker_pool() {
    util::trace_init();

    let config = Arc::new(BroadcastFuture::<Outcome<usize, String>>::new());
    let sem = Arc::new(CountingSemaphore::new(IN_FLIGHT));
    let queue = Arc::new(Mutex::new((0..ITEMS).collect::<Vec<_>>()));
    let done = Arc::new(Mutex::new(Vec::with_capacity(ITEMS)));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let mut config = config.get();
            let sem = sem.clone();
            let queue = queue.clone();
            let done = done.clone();
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            thread::spawn(move || {
                let (multiplier, error) = config
                    .recv_blocking()
                    .expect("configuration must be published")
                    .unwrap();
                assert_eq!(error, None);

                loop {
                    let Some(item) = queue.lock().unwrap().pop() else {
                        return;
                    };

                    sem.acquire_blocking(1);
                    let now = in_flight.fetch_add(1, SeqCst) + 1;
                    assert!(now <= IN_FLIGHT, "{now} items in flight");
                    max_in_flight.fetch_max(now, SeqCst);

                    thread::yield_now();
                    done.lock().unwrap().push(item * multiplier);

                    in_flight.fetch_sub(1, SeqCst);
                    sem.release_blocking(1);
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    assert!(config.set(Outcome::value(2)));
    assert!(!config.set(Outcome::error("too late".to_string())));

    for worker in workers {
        worker.join().unwrap();
    }

    let mut done = Arc::try_unwrap(done).unwrap().into_inner().unwrap();
    done.sort_unstable();
    assert_eq!(done, (0..ITEMS).map(|i| i * 2).collect::<Vec<_>>());
    assert!(max_in_flight.load(SeqCst) <= IN_FLIGHT);
    assert_eq!(sem.available(), IN_FLIGHT);
    assert_eq!(config.listeners(), WORKERS);
    assert_eq!(config.notified(), WORKERS);
}

/// A failed producer broadcasts its error to every consumer.
#[test]
fn broadcast_failure() {
    util::trace_init();

    let result = Arc::new(BroadcastFuture::<Outcome<Vec<u8>, &'static str>>::new());
    let consumers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let mut rx = result.get();
            thread::spawn(move || rx.recv_blocking())
        })
        .collect();

    thread::spawn({
        let result = result.clone();
        move || result.set(Outcome::error("connection reset"))
    })
    .join()
    .unwrap();

    for consumer in consumers {
        let outcome = consumer.join().unwrap().expect("a value was set");
        assert!(outcome.is_error());
        assert_eq!(outcome.unwrap(), (Vec::new(), Some("connection reset")));
    }
}

fn first_value<B: Broadcast<u32>>(sources: &[B]) -> Vec<u32> {
    sources
        .iter()
        .filter_map(|source| source.get().recv_blocking())
        .collect()
}

#[test]
fn generic_sources() {
    let immediate = [ImmediateFuture::new(1u32), ImmediateFuture::new(2)];
    assert_eq!(first_value(&immediate), [1, 2]);

    let deferred = [BroadcastFuture::<u32>::new(), BroadcastFuture::new()];
    deferred[0].set(3);
    deferred[1].set(4);
    assert_eq!(first_value(&deferred), [3, 4]);
}
