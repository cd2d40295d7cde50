//! # Exchange Flows
//!
//! End-to-end request/response and lifecycle flows over a loopback pair:
//!
//! 1. **Request → reply**: client request, server upstream reply, response
//!    matched by ID on the client.
//! 2. **Error replies**: upstream failures arrive as non-OK responses, not
//!    as invocation errors.
//! 3. **Close and drain**: closed channels reject work; graceful close waits
//!    for outstanding requests up to its budget.
//! 4. **Timeouts**: the sweeper fails expired invocations; late responses
//!    are dropped.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{standalone, Loopback};
    use bytes::Bytes;
    use exchange_core::{
        spawn_timeout_sweeper, ChannelHandler, ChannelPhase, ExchangeChannel, ExchangeConfig,
        ExchangeError, RawChannel, READONLY_ATTRIBUTE,
    };
    use exchange_types::{Message, Request, Response, Status};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    // =========================================================================
    // REQUEST / RESPONSE
    // =========================================================================

    #[test]
    fn test_request_reply_over_loopback() {
        let net = Loopback::new();
        let channel = net.client.channel();

        let future = channel
            .request(Bytes::from_static(b"ping"), None)
            .unwrap();
        let response = future.wait_timeout(WAIT).unwrap().unwrap();

        assert_eq!(response.id(), future.request_id());
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.result().as_ref(), b"ping");
        assert_eq!(net.client.pending().pending_count(), 0);
        assert_eq!(channel.outstanding(), 0);
    }

    #[test]
    fn test_upstream_failure_is_non_ok_response() {
        let net = Loopback::new();
        let channel = net.client.channel();

        let refused = channel.request(Bytes::from_static(b"fail"), None).unwrap();
        let response = refused.wait_timeout(WAIT).unwrap().unwrap();
        assert_eq!(response.status(), Status::ServiceError);
        assert_eq!(response.error_message(), Some("echo refused"));

        let missing = channel.request(Bytes::from_static(b"missing"), None).unwrap();
        let response = missing.wait_timeout(WAIT).unwrap().unwrap();
        assert_eq!(response.status(), Status::ServiceNotFound);
    }

    #[test]
    fn test_one_way_send_reaches_server_upstream() {
        let net = Loopback::new();
        let channel = net.client.channel();

        channel.send(Bytes::from_static(b"notify")).unwrap();
        channel.send("hello").unwrap();

        assert_eq!(
            net.server.upstream.received_messages(),
            vec![
                Message::Payload(Bytes::from_static(b"notify")),
                Message::Text("hello".into()),
            ]
        );
        // Nothing was answered.
        assert!(net.server.memory.sent_messages().is_empty());
    }

    #[test]
    fn test_heartbeat_round_trip() {
        let net = Loopback::new();
        let probe = Request::heartbeat();
        net.client.channel().send(probe.clone()).unwrap();

        let replies = net.server.memory.sent_messages();
        assert_eq!(replies.len(), 1);
        match &replies[0].0 {
            Message::Response(response) => {
                assert!(response.is_heartbeat());
                assert_eq!(response.id(), probe.id());
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        // The client consumed the heartbeat answer without counting it late.
        let stats = net.client.pending().stats();
        assert_eq!(stats.total_late_responses.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_readonly_event_marks_peer_channel() {
        let net = Loopback::new();
        net.server.channel().send(Request::readonly()).unwrap();

        let channel = net.client.channel();
        let flag = channel.get_attribute(READONLY_ATTRIBUTE).unwrap();
        assert_eq!(flag.downcast_ref::<bool>(), Some(&true));
    }

    // =========================================================================
    // CLOSE AND DRAIN
    // =========================================================================

    #[test]
    fn test_send_and_request_after_close_fail_with_channel_closed() {
        let net = Loopback::new();
        let channel = net.client.channel();
        channel.close();

        let err = channel.send(Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, ExchangeError::ChannelClosed { kind: "message", .. }));

        let err = channel.request(Bytes::new(), None).unwrap_err();
        assert!(matches!(err, ExchangeError::ChannelClosed { kind: "request", .. }));
        assert_eq!(err.status(), Status::ClientError);
    }

    #[test]
    fn test_close_twice_is_noop() {
        let net = Loopback::new();
        let channel = net.client.channel();

        channel.close();
        channel.close();

        assert_eq!(channel.phase(), ChannelPhase::Closed);
        assert!(net.client.memory.is_closed());
        assert!(net.client.registry.is_empty());
    }

    #[test]
    fn test_start_close_keeps_connection_and_invocations() {
        let endpoint = standalone(ExchangeConfig::default());
        let channel = endpoint.channel();
        let future = channel.request(Bytes::new(), None).unwrap();

        channel.start_close();

        assert_eq!(channel.phase(), ChannelPhase::Closing);
        assert!(endpoint.memory.is_closing());
        assert!(channel.is_connected());
        assert!(channel.send("x").unwrap_err().is_channel_closed());

        // An invocation issued before start_close still completes.
        endpoint
            .memory
            .deliver(Response::ok(future.request_id(), Bytes::from_static(b"done")).into())
            .unwrap();
        assert_eq!(future.wait().unwrap().result().as_ref(), b"done");
    }

    #[test]
    fn test_close_with_timeout_returns_once_drained() {
        let endpoint = standalone(ExchangeConfig::default());
        let channel = endpoint.channel();
        let future = channel.request(Bytes::new(), None).unwrap();
        let request_id = future.request_id();

        let memory = Arc::clone(&endpoint.memory);
        let responder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            memory
                .deliver(Response::ok(request_id, Bytes::from_static(b"late-ok")).into())
                .unwrap();
        });

        let started = Instant::now();
        channel.close_with_timeout(Duration::from_secs(10));
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_secs(10));
        assert_eq!(future.wait().unwrap().result().as_ref(), b"late-ok");
        assert_eq!(channel.phase(), ChannelPhase::Closed);
        responder.join().unwrap();
    }

    #[test]
    fn test_close_with_timeout_expires_and_fails_outstanding() {
        let endpoint = standalone(ExchangeConfig::default());
        let channel = endpoint.channel();
        let future = channel
            .request(Bytes::new(), Some(Duration::from_secs(60)))
            .unwrap();

        let started = Instant::now();
        channel.close_with_timeout(Duration::from_millis(50));

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(1), "drain overran its budget: {elapsed:?}");
        let err = future.wait().unwrap_err();
        assert!(err.is_channel_inactive());
        assert_eq!(err.status(), Status::ChannelInactive);
    }

    #[test]
    fn test_close_only_fails_own_invocations() {
        let a = standalone(ExchangeConfig::default());
        let b = standalone(ExchangeConfig::default());
        // Share one pending table between both wrappers.
        let shared = Arc::clone(a.pending());
        let channel_a = ExchangeChannel::with_table(
            a.raw.clone(),
            Arc::clone(&shared),
            ExchangeConfig::default(),
        );
        let channel_b = ExchangeChannel::with_table(
            b.raw.clone(),
            Arc::clone(&shared),
            ExchangeConfig::default(),
        );

        let fa = channel_a.request(Bytes::new(), None).unwrap();
        let fb = channel_b.request(Bytes::new(), None).unwrap();

        channel_a.close();

        assert!(fa.wait().unwrap_err().is_channel_inactive());
        assert!(!fb.is_done());
        assert_eq!(shared.pending_count_for(channel_b.id()), 1);
    }

    #[test]
    fn test_disconnect_fails_pending_and_drops_wrapper() {
        let endpoint = standalone(ExchangeConfig::default());
        let channel = endpoint.channel();
        let future = channel.request(Bytes::new(), None).unwrap();

        endpoint.memory.disconnect();
        endpoint.handler.disconnected(&endpoint.raw).unwrap();

        assert!(future.wait().unwrap_err().is_channel_inactive());
        assert!(endpoint.registry.get_channel(endpoint.raw.id()).is_none());
    }

    // =========================================================================
    // TIMEOUTS
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sweeper_times_out_unanswered_request() {
        let endpoint = standalone(ExchangeConfig::default());
        let sweeper =
            spawn_timeout_sweeper(Arc::clone(endpoint.pending()), Duration::from_millis(10));

        let channel = endpoint.channel();
        let future = channel
            .request(Bytes::new(), Some(Duration::from_millis(20)))
            .unwrap();
        let request_id = future.request_id();

        let outcome = tokio::time::timeout(WAIT, future).await.unwrap();
        match outcome {
            Err(ExchangeError::Timeout { request_id: id, timeout, elapsed, .. }) => {
                assert_eq!(id, request_id);
                assert_eq!(timeout, Duration::from_millis(20));
                assert!(elapsed >= timeout);
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        // A response that shows up afterwards is dropped.
        endpoint
            .memory
            .deliver(Response::ok(request_id, Bytes::new()).into())
            .unwrap();
        let stats = endpoint.pending().stats();
        assert_eq!(stats.total_late_responses.load(Ordering::Relaxed), 1);
        assert_eq!(stats.total_timeouts.load(Ordering::Relaxed), 1);

        sweeper.abort();
    }

    #[test]
    fn test_default_timeout_from_config() {
        let config = ExchangeConfig::default().with_default_timeout(Duration::from_millis(10));
        let endpoint = standalone(config);
        let future = endpoint.channel().request(Bytes::new(), None).unwrap();

        thread::sleep(Duration::from_millis(30));
        assert_eq!(endpoint.pending().fail_timeouts(Instant::now()), 1);
        assert_eq!(future.wait().unwrap_err().status(), Status::ClientTimeout);
    }
}
