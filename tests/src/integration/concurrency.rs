//! # Concurrency
//!
//! Parallel callers on shared channels, resolution races, and registry
//! identity under contention.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{standalone, Loopback};
    use bytes::Bytes;
    use exchange_core::{
        ChannelRegistry, ExchangeConfig, ExchangeError, MemoryChannel, PendingTable, RawChannel,
    };
    use exchange_types::{RequestId, Response};
    use futures::future::join_all;
    use rand::Rng;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_parallel_requests_get_distinct_ids_and_own_responses() {
        let net = Arc::new(Loopback::new());
        let threads = 8;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let net = Arc::clone(&net);
                thread::spawn(move || {
                    let channel = net.client.channel();
                    let mut ids = Vec::with_capacity(per_thread);
                    for i in 0..per_thread {
                        let payload = Bytes::from(format!("{t}-{i}"));
                        let future = channel.request(payload.clone(), None).unwrap();
                        let response = future.wait_timeout(WAIT).unwrap().unwrap();
                        assert_eq!(response.result(), &payload);
                        ids.push(future.request_id());
                    }
                    ids
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "request id {id} issued twice");
            }
        }
        assert_eq!(seen.len(), threads * per_thread);
        assert_eq!(net.client.pending().pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_awaiting_many_requests() {
        let net = Loopback::new();
        let channel = net.client.channel();

        let futures: Vec<_> = (0..100u32)
            .map(|i| {
                channel
                    .request(Bytes::from(i.to_be_bytes().to_vec()), None)
                    .unwrap()
            })
            .collect();

        let outcomes = tokio::time::timeout(WAIT, join_all(futures)).await.unwrap();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let response = outcome.unwrap();
            assert_eq!(response.result().as_ref(), &(i as u32).to_be_bytes());
        }
    }

    #[test]
    fn test_responses_in_any_order_match_by_id() {
        let endpoint = standalone(ExchangeConfig::default());
        let channel = endpoint.channel();

        let futures: Vec<_> = (0..32)
            .map(|_| channel.request(Bytes::new(), None).unwrap())
            .collect();

        let mut ids: Vec<RequestId> = futures.iter().map(|f| f.request_id()).collect();
        let mut rng = rand::thread_rng();
        for i in (1..ids.len()).rev() {
            ids.swap(i, rng.gen_range(0..=i));
        }

        for id in ids {
            let body = Bytes::from(id.to_string());
            endpoint.memory.deliver(Response::ok(id, body).into()).unwrap();
        }

        for future in futures {
            let response = future.wait().unwrap();
            assert_eq!(response.result().as_ref(), future.request_id().to_string().as_bytes());
        }
    }

    #[test]
    fn test_response_racing_close_resolves_exactly_once() {
        for _ in 0..50 {
            let endpoint = standalone(ExchangeConfig::default());
            let channel = endpoint.channel();
            let future = channel.request(Bytes::new(), None).unwrap();
            let request_id = future.request_id();

            let resolutions = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&resolutions);
            future.on_complete(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

            let barrier = Arc::new(Barrier::new(2));
            let responder = {
                let memory = Arc::clone(&endpoint.memory);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    memory
                        .deliver(Response::ok(request_id, Bytes::new()).into())
                        .unwrap();
                })
            };
            let closer = {
                let channel = Arc::clone(&channel);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    channel.close();
                })
            };
            responder.join().unwrap();
            closer.join().unwrap();

            let outcome = future.wait();
            assert!(outcome.is_ok() || outcome.unwrap_err().is_channel_inactive());
            assert_eq!(resolutions.load(Ordering::SeqCst), 1);
            assert_eq!(endpoint.pending().pending_count(), 0);
        }
    }

    #[test]
    fn test_requests_racing_close_never_leak_entries() {
        let endpoint = standalone(ExchangeConfig::default());
        let channel = endpoint.channel();
        let barrier = Arc::new(Barrier::new(5));

        let callers: Vec<_> = (0..4)
            .map(|_| {
                let channel = Arc::clone(&channel);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut futures = Vec::new();
                    for _ in 0..100 {
                        match channel.request(Bytes::new(), None) {
                            Ok(future) => futures.push(future),
                            // Closed before registering, or the transport was already down.
                            Err(err) => assert!(
                                err.is_channel_closed()
                                    || matches!(err, ExchangeError::Transport(_))
                            ),
                        }
                    }
                    futures
                })
            })
            .collect();

        barrier.wait();
        channel.close();

        for caller in callers {
            for future in caller.join().unwrap() {
                // Registered before the close: failed by it.
                let err = future.wait_timeout(WAIT).unwrap().unwrap_err();
                assert!(err.is_channel_inactive());
            }
        }
        assert_eq!(endpoint.pending().pending_count(), 0);
        assert_eq!(channel.outstanding(), 0);
    }

    #[test]
    fn test_registry_identity_under_contention() {
        let registry =
            ChannelRegistry::new(Arc::new(PendingTable::new()), ExchangeConfig::default());
        let raws: Vec<Arc<dyn RawChannel>> = (0..16)
            .map(|_| Arc::new(MemoryChannel::new()) as Arc<dyn RawChannel>)
            .collect();
        let raws = Arc::new(raws);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let raws = Arc::clone(&raws);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    raws.iter()
                        .map(|raw| registry.get_or_add_channel(Some(raw)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for result in &results[1..] {
            for (a, b) in results[0].iter().zip(result) {
                assert!(Arc::ptr_eq(a, b));
            }
        }
        assert_eq!(registry.len(), raws.len());
    }

    #[test]
    fn test_graceful_close_waits_for_parallel_responders() {
        let endpoint = standalone(ExchangeConfig::default());
        let channel = endpoint.channel();
        let futures: Vec<_> = (0..10)
            .map(|_| channel.request(Bytes::new(), None).unwrap())
            .collect();
        let ids: Vec<RequestId> = futures.iter().map(|f| f.request_id()).collect();

        let responders: Vec<_> = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let memory = Arc::clone(&endpoint.memory);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * i as u64));
                    memory.deliver(Response::ok(id, Bytes::new()).into()).unwrap();
                })
            })
            .collect();

        let started = Instant::now();
        channel.close_with_timeout(WAIT);
        assert!(started.elapsed() < WAIT);

        for future in futures {
            assert!(future.wait().is_ok());
        }
        for responder in responders {
            responder.join().unwrap();
        }
    }
}
