//! Concurrent batches built from ordinary calls.
//!
//! `run_batch` runs the callback once in capture mode: every call it makes is
//! encoded and bound to a fresh connection handle, queued, and answered with
//! `Null`. The queued requests are then driven together by a [`MultiDriver`].
//! As each one finishes, its original call is replayed with the finished
//! exchange forced in as the response, so decoding, fault mapping and header
//! extraction behave exactly as for a call made outside a batch. Results come
//! back in capture order and one call failing never affects another.

use crate::client::SoapClient;
use crate::state::EngineMode;
use serde_json::Value;
use soapcall_core::SoapError;
use soapcall_transport::MultiDriver;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl SoapClient {
    /// Run `capture` in batch mode and return one result per call it made, in call order.
    ///
    /// Calls issued inside `capture` return `Ok(Null)` immediately. A call that
    /// fails before it can be queued returns its error and keeps its slot, so
    /// the result list always has one entry per call. An error from `capture`
    /// itself aborts the batch before anything is sent. Calling
    /// `run_batch` again before this one returns fails with [`SoapError::Nesting`].
    ///
    /// There is no overall deadline; each request is bounded by its own timeout.
    pub async fn run_batch<F, Fut>(
        &self,
        capture: F,
    ) -> Result<Vec<Result<Value, SoapError>>, SoapError>
    where
        F: FnOnce(SoapClient) -> Fut,
        Fut: Future<Output = Result<(), SoapError>>,
    {
        let engine = self.engine();

        let captured = {
            let _capturing = engine.enter(EngineMode::Capturing)?;
            if let Err(err) = capture(self.clone()).await {
                warn!(error = %err, discarded = engine.queued(), "batch capture failed");
                return Err(err);
            }
            engine.take_capture()
        };

        let total = captured.total;
        if total == 0 {
            debug!("batch captured no calls");
            return Ok(Vec::new());
        }

        let mut slots: Vec<Option<Result<Value, SoapError>>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        for (position, err) in captured.failed {
            slots[position] = Some(Err(err));
        }

        let _executing = engine.enter(EngineMode::Executing)?;
        let mut driver = MultiDriver::new(Arc::clone(self.transport()));
        for entry in captured.queue.values() {
            driver.register(Arc::clone(&entry.request));
        }
        info!(calls = total, queued = captured.queue.len(), "executing batch");

        let mut pending = captured.queue;
        while let Some(done) = driver.next_completed().await {
            let Some(entry) = pending.shift_remove(&done.id) else {
                warn!(request = %done.id, "completion for unknown request");
                continue;
            };
            let outcome = {
                let _forced = engine.force(Arc::clone(&entry.request), done.result);
                self.invoke(entry.call).await
            };
            debug!(
                request = %done.id,
                position = entry.position,
                ok = outcome.is_ok(),
                "batch call finished"
            );
            slots[entry.position] = Some(outcome);
        }

        Ok(slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(SoapError::Transport("request never completed".into())))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedTransport};
    use soapcall_core::{CallOptions, Fault, LogicalCall, OutputHeaders};
    use soapcall_transport::TransportError;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    async fn client_with(transport: Arc<ScriptedTransport>) -> SoapClient {
        SoapClient::builder()
            .location("http://calc.test/soap")
            .uri("urn:calc")
            .transport(transport)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_call_order_not_finish_order() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("slow", 30, Reply::Value(json!("slow")))
                .route("fast", 10, Reply::Value(json!("fast")))
                .route("middle", 20, Reply::Value(json!("middle"))),
        );
        let client = client_with(transport).await;

        let results = client
            .run_batch(|c| async move {
                for method in ["slow", "fast", "middle"] {
                    assert_eq!(c.call(method, vec![]).await?, Value::Null);
                }
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();

        let values: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![json!("slow"), json!("fast"), json!("middle")]);
        assert_eq!(client.mode(), EngineMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_run_concurrently() {
        let transport = Arc::new(ScriptedTransport::new().route("wait", 100, Reply::Value(json!(1))));
        let client = client_with(transport).await;

        let started = tokio::time::Instant::now();
        let results = client
            .run_batch(|c| async move {
                for _ in 0..3 {
                    c.call("wait", vec![]).await?;
                }
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("a", 0, Reply::Value(json!(1)))
                .route("b", 0, Reply::Fault(Fault::new("Server", "b failed")))
                .route("c", 0, Reply::Fail(TransportError::Connect("refused".into())))
                .route("d", 0, Reply::Fail(TransportError::Timeout("deadline".into())))
                .route("e", 0, Reply::Value(json!(5))),
        );
        let client = client_with(transport).await;

        let results = client
            .run_batch(|c| async move {
                for method in ["a", "b", "c", "d", "e"] {
                    c.call(method, vec![]).await?;
                }
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(results[0], Ok(json!(1)));
        assert_eq!(results[1].as_ref().unwrap_err().fault_code(), "Server");
        assert!(matches!(results[2], Err(SoapError::Transport(_))));
        assert!(results[3].as_ref().unwrap_err().is_timeout());
        assert_eq!(results[4], Ok(json!(5)));
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;

        let results = client.run_batch(|_| async { Ok::<(), SoapError>(()) }).await.unwrap();
        assert!(results.is_empty());
        assert!(transport.sent().is_empty());
        assert_eq!(client.mode(), EngineMode::Idle);
    }

    #[tokio::test]
    async fn test_nested_batch_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;

        let err = client
            .run_batch(|c| async move {
                c.call("echo", vec![json!(1)]).await?;
                c.run_batch(|_| async { Ok::<(), SoapError>(()) }).await?;
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap_err();

        assert_eq!(err, SoapError::Nesting);
        assert!(transport.sent().is_empty());
        assert_eq!(client.mode(), EngineMode::Idle);

        // the engine is usable again
        let results = client
            .run_batch(|c| async move {
                c.call("echo", vec![json!(2)]).await?;
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();
        assert_eq!(results, vec![Ok(json!(2))]);
    }

    #[tokio::test]
    async fn test_capture_error_aborts_before_sending() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;

        let err = client
            .run_batch(|c| async move {
                c.call("echo", vec![json!(1)]).await?;
                Err(SoapError::client("changed my mind"))
            })
            .await
            .unwrap_err();

        assert_eq!(err, SoapError::client("changed my mind"));
        assert!(transport.sent().is_empty());
        assert_eq!(client.engine().queued(), 0);
        assert_eq!(client.mode(), EngineMode::Idle);
    }

    #[tokio::test]
    async fn test_call_failing_at_capture_keeps_its_slot() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;

        let results = client
            .run_batch(|c| async move {
                c.call("echo", vec![json!("a")]).await?;
                let bad = LogicalCall::new("echo", vec![json!("b")])
                    .with_options(CallOptions::default().with_location("not a url"));
                assert!(c.invoke(bad).await.is_err());
                c.call("echo", vec![json!("c")]).await?;
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(json!("a")));
        assert!(results[1].is_err());
        assert_eq!(results[2], Ok(json!("c")));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_of_only_failed_calls_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;

        let results = client
            .run_batch(|c| async move {
                let bad = LogicalCall::new("echo", vec![])
                    .with_options(CallOptions::default().with_location("not a url"));
                let _ = c.invoke(bad).await;
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
        assert!(transport.sent().is_empty());
        assert_eq!(client.mode(), EngineMode::Idle);
    }

    #[tokio::test]
    async fn test_batched_calls_use_distinct_connections() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;

        client
            .run_batch(|c| async move {
                for i in 0..3 {
                    c.call("echo", vec![json!(i)]).await?;
                }
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();

        let connections: HashSet<_> = transport.sent().iter().map(|s| s.connection).collect();
        assert_eq!(connections.len(), 3);
    }

    #[tokio::test]
    async fn test_replay_fills_output_headers_and_cookies() {
        const ENVELOPE: &str = concat!(
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">"#,
            r#"<SOAP-ENV:Header><Session>s-9</Session></SOAP-ENV:Header>"#,
            r#"<SOAP-ENV:Body><getResponse><return>ok</return></getResponse></SOAP-ENV:Body>"#,
            r#"</SOAP-ENV:Envelope>"#
        );
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("get", 0, Reply::Raw(200, ENVELOPE))
                .with_response_header("get", "Set-Cookie", "sid=xyz"),
        );
        let client = client_with(Arc::clone(&transport)).await;
        let slot = OutputHeaders::new();

        let capture_slot = slot.clone();
        let results = client
            .run_batch(|c| async move {
                c.invoke(LogicalCall::new("get", vec![]).with_output_headers(capture_slot))
                    .await?;
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();

        assert_eq!(results, vec![Ok(json!("ok"))]);
        assert_eq!(slot.get(), vec![json!({"Session": "s-9"})]);
        assert_eq!(client.cookies().get("sid"), Some(&vec!["xyz".to_string()]));
        assert!(String::from_utf8_lossy(&client.last_response().unwrap()).contains("s-9"));
    }

    #[tokio::test]
    async fn test_calls_after_batch_run_normally() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_with(Arc::clone(&transport)).await;

        client
            .run_batch(|c| async move {
                c.call("echo", vec![json!("batched")]).await?;
                Ok::<(), SoapError>(())
            })
            .await
            .unwrap();
        let value = client.call("echo", vec![json!("direct")]).await.unwrap();
        assert_eq!(value, json!("direct"));
        assert_eq!(transport.sent().len(), 2);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn results_always_follow_capture_order(delays in prop::collection::vec(0u64..50, 0..8)) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();
                let mut transport = ScriptedTransport::new();
                for (i, delay) in delays.iter().enumerate() {
                    transport = transport.route(&format!("m{}", i), *delay, Reply::Value(json!(i)));
                }
                let transport = Arc::new(transport);
                let count = delays.len();

                let results = runtime.block_on(async {
                    let client = client_with(transport).await;
                    client
                        .run_batch(|c| async move {
                            for i in 0..count {
                                c.call(&format!("m{}", i), vec![]).await?;
                            }
                            Ok::<(), SoapError>(())
                        })
                        .await
                        .unwrap()
                });

                let expected: Vec<_> = (0..count).map(|i| Ok(json!(i))).collect();
                prop_assert_eq!(results, expected);
            }
        }
    }
}
