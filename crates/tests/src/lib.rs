//! # Integration Tests
//!
//! End-to-end tests over the mock transport and render backend.
//!
//! Covers:
//! - Full ingest -> validate -> partition -> dispatch flows
//! - Item accounting invariants (nothing lost, nothing double-counted)
//! - Cooperative cancellation draining
//! - Retry classification end to end

#[cfg(test)]
mod helpers {
    use std::sync::Arc;

    use contracts::{
        AttachmentSpec, CampaignConfig, DeliveryConfig, MessageTemplate, Recipient, RenderConfig,
        SmtpIdentity,
    };

    pub fn template() -> MessageTemplate {
        MessageTemplate {
            subject: "Monthly invoice".to_string(),
            sender_name: "Billing".to_string(),
            plain_body: Some("Please see attached.".to_string()),
            html_body: Some("<p>Please see attached.</p>".to_string()),
            attachment: AttachmentSpec::None,
        }
    }

    pub fn campaign(concurrency: u32) -> CampaignConfig {
        CampaignConfig {
            message: template(),
            delivery: DeliveryConfig {
                concurrency,
                inter_item_delay_ms: 0,
                retry_max: 2,
                retry_backoff_ms: 100,
            },
            render: RenderConfig::default(),
        }
    }

    pub fn identities(n: usize) -> Vec<Arc<SmtpIdentity>> {
        (0..n)
            .map(|i| {
                Arc::new(SmtpIdentity::new(
                    "mx.example.com",
                    format!("sender{i}@example.com"),
                    "pw",
                ))
            })
            .collect()
    }

    pub fn recipients(n: usize) -> Vec<Recipient> {
        (0..n)
            .map(|i| Recipient::new(format!("r{i}@example.com")))
            .collect()
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use contracts::{AttachmentSpec, Recipient, RenderFormat};
    use dispatch::{DispatchEngine, DispatchError};
    use observability::RunTelemetry;
    use render_pool::{MockBackend, RenderPool, RenderPoolConfig};
    use transport::{MockTransport, ScriptedFailure, TransportPool};

    use crate::helpers::{campaign, identities, recipients};

    fn engine(transport: MockTransport) -> DispatchEngine<MockTransport, MockBackend> {
        DispatchEngine::new(
            TransportPool::new(transport),
            None,
            Arc::new(RunTelemetry::new()),
        )
    }

    /// End-to-end flow: CSV rows -> recipients -> full dispatch.
    #[tokio::test]
    async fn test_e2e_csv_to_dispatch() {
        let csv = "email,name\n\
                   ann@example.com,Ann\n\
                   bob@example.com,Bob\n\
                   cee@example.com,\n";
        let rows = ingestion::read_rows_from(csv.as_bytes(), "inline").unwrap();
        let recipients: Vec<Recipient> = rows.iter().filter_map(Recipient::from_row).collect();
        assert_eq!(recipients.len(), 3);

        let transport = MockTransport::new();
        let counters = transport.counters();
        let engine = engine(transport);

        let stats = engine
            .run(&identities(1), recipients, &campaign(5))
            .await
            .unwrap();

        assert_eq!(stats.items_succeeded, 3);
        assert!(stats.is_complete());

        let sent = counters.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent
            .iter()
            .all(|r| r.identity_key == "mx.example.com:587:sender0@example.com"));
    }

    /// Every item from every partition lands on the identity its partition
    /// belongs to, with ceiling-based sizes.
    #[tokio::test]
    async fn test_partition_assignment_across_identities() {
        let transport = MockTransport::new();
        let counters = transport.counters();
        let engine = engine(transport);

        let stats = engine
            .run(&identities(3), recipients(10), &campaign(30))
            .await
            .unwrap();
        assert_eq!(stats.items_succeeded, 10);

        let sent = counters.sent();
        let count_for = |i: usize| {
            sent.iter()
                .filter(|r| r.identity_key == format!("mx.example.com:587:sender{i}@example.com"))
                .count()
        };
        assert_eq!(count_for(0), 4);
        assert_eq!(count_for(1), 4);
        assert_eq!(count_for(2), 2);
    }

    /// Mixed outcomes still settle every item exactly once.
    #[tokio::test(start_paused = true)]
    async fn test_conservation_with_mixed_outcomes() {
        let transport = MockTransport::new();
        // r2 recovers after one transient failure, r5 exhausts retries,
        // r7 fails permanently on the first attempt
        transport.script_send_failures(
            "r2@example.com",
            vec![ScriptedFailure::Transient("ECONNRESET".to_string())],
        );
        transport.script_send_failures(
            "r5@example.com",
            vec![
                ScriptedFailure::Transient("connection lost".to_string()),
                ScriptedFailure::Transient("connection lost".to_string()),
                ScriptedFailure::Transient("connection lost".to_string()),
            ],
        );
        transport.script_send_failures(
            "r7@example.com",
            vec![ScriptedFailure::Permanent("550 user unknown".to_string())],
        );

        let engine = engine(transport);
        let stats = engine
            .run(&identities(2), recipients(10), &campaign(10))
            .await
            .unwrap();

        assert_eq!(stats.items_succeeded, 8);
        assert_eq!(stats.items_failed, 2);
        assert_eq!(stats.items_settled(), stats.total_items);
        assert!(stats.is_complete());

        let failed: Vec<&str> = stats
            .failed_sends
            .iter()
            .map(|f| f.recipient.as_str())
            .collect();
        assert!(failed.contains(&"r5@example.com"));
        assert!(failed.contains(&"r7@example.com"));
        assert!(!failed.contains(&"r2@example.com"));
    }

    /// A failing identity shifts its share of items onto nobody; the run
    /// only uses identities that validated.
    #[tokio::test]
    async fn test_partial_identity_failure_still_covers_items() {
        let transport = MockTransport::new();
        transport.fail_verify_host("bad.example.com");
        let counters = transport.counters();

        let mut ids = identities(2);
        ids.push(Arc::new(contracts::SmtpIdentity::new(
            "bad.example.com",
            "dead@example.com",
            "pw",
        )));

        let engine = engine(transport);
        let stats = engine.run(&ids, recipients(6), &campaign(10)).await.unwrap();

        assert_eq!(stats.identities_validated, 2);
        assert_eq!(stats.identities_failed, 1);
        assert_eq!(stats.items_succeeded, 6);
        assert_eq!(counters.sent_count(), 6);
    }

    /// Zero valid identities: hard error, but every item gets a terminal
    /// failure record first.
    #[tokio::test]
    async fn test_total_validation_failure_is_hard_error() {
        let transport = MockTransport::new();
        transport.fail_verify_host("mx.example.com");
        let engine = engine(transport);

        let err = engine
            .run(&identities(3), recipients(4), &campaign(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoValidIdentities));

        let stats = engine.telemetry().snapshot();
        assert_eq!(stats.items_failed, 4);
        assert_eq!(stats.failed_identities.len(), 3);
        assert!(stats.is_complete());
    }

    /// Rendered attachments flow through the worker pool into the sent
    /// messages; a render failure is terminal for its item.
    #[tokio::test]
    async fn test_e2e_with_rendered_attachment() {
        let transport = MockTransport::new();
        let counters = transport.counters();
        let render = RenderPool::start(
            MockBackend::new(),
            RenderPoolConfig {
                workers: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let engine = DispatchEngine::new(
            TransportPool::new(transport),
            Some(render.clone()),
            Arc::new(RunTelemetry::new()),
        );

        let mut campaign = campaign(5);
        campaign.message.attachment = AttachmentSpec::Render {
            format: RenderFormat::Pdf,
            html: "<h1>Invoice</h1>".to_string(),
            filename: Some("invoice".to_string()),
        };

        let stats = engine
            .run(&identities(2), recipients(6), &campaign)
            .await
            .unwrap();

        assert_eq!(stats.items_succeeded, 6);
        assert!(counters.sent().iter().all(|r| r.has_attachment));

        render.shutdown();
    }
}

#[cfg(test)]
mod cancellation_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dispatch::{DispatchEngine, RunController};
    use observability::RunTelemetry;
    use render_pool::MockBackend;
    use transport::{MockTransport, TransportPool};

    use crate::helpers::{campaign, identities, recipients};

    fn controller(transport: MockTransport) -> RunController<MockTransport, MockBackend> {
        RunController::new(DispatchEngine::new(
            TransportPool::new(transport),
            None,
            Arc::new(RunTelemetry::new()),
        ))
    }

    /// Stop mid-run: in-flight items finish, unstarted ones settle as
    /// terminal failures, and the run reaches a complete final state.
    #[tokio::test]
    async fn test_stop_drains_and_settles_everything() {
        let transport = MockTransport::new().with_send_delay(Duration::from_millis(30));
        let counters = transport.counters();
        let controller = controller(transport);

        let mut updates = controller.subscribe();
        controller
            .start(identities(2), recipients(20), campaign(2))
            .unwrap();

        while updates.borrow_and_update().items_settled() < 2 {
            updates.changed().await.unwrap();
        }
        controller.stop().unwrap();

        let stats = controller.wait().await.unwrap();
        assert!(stats.is_complete());
        assert_eq!(stats.items_settled(), 20);
        // everything that was actually sent is counted as success
        assert_eq!(stats.items_succeeded as usize, counters.sent_count());
        // at least the unstarted tail failed terminally
        assert!(stats.items_failed > 0);
    }

    /// A stopped run can be followed by a fresh one with clean counters.
    #[tokio::test]
    async fn test_run_after_stop_starts_clean() {
        let transport = MockTransport::new().with_send_delay(Duration::from_millis(20));
        let controller = controller(transport);

        let mut updates = controller.subscribe();
        controller
            .start(identities(1), recipients(10), campaign(1))
            .unwrap();
        while updates.borrow_and_update().items_settled() == 0 {
            updates.changed().await.unwrap();
        }
        controller.stop().unwrap();
        controller.wait().await.unwrap();

        controller
            .start(identities(1), recipients(3), campaign(1))
            .unwrap();
        let stats = controller.wait().await.unwrap();
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.items_succeeded, 3);
        assert!(stats.failed_sends.is_empty());
    }

    /// The validation-complete event fires once per run with the final
    /// identity tallies.
    #[tokio::test]
    async fn test_validation_event_observable() {
        let transport = MockTransport::new();
        transport.fail_verify_host("bad.example.com");
        let controller = controller(transport);

        let mut ids = identities(1);
        ids.push(Arc::new(contracts::SmtpIdentity::new(
            "bad.example.com",
            "dead@example.com",
            "pw",
        )));

        let mut events = controller.validation_events();
        controller.start(ids, recipients(2), campaign(5)).unwrap();

        loop {
            events.changed().await.unwrap();
            if events.borrow().is_some() {
                break;
            }
        }
        let summary = events.borrow().clone().unwrap();
        assert_eq!(summary.valid_count, 1);
        assert_eq!(summary.invalid_count, 1);
        assert_eq!(summary.failures.len(), 1);

        controller.wait().await.unwrap();
    }
}

#[cfg(test)]
mod config_tests {
    use contracts::AttachmentSpec;

    /// A campaign written to TOML reloads identically and drives a run.
    #[test]
    fn test_campaign_roundtrip() {
        let toml = r#"
[message]
subject = "Hello"
sender_name = "Ops"
plain_body = "hi"

[message.attachment]
type = "render"
format = "png"
html = "<p>chart</p>"

[delivery]
concurrency = 25
retry_max = 1
"#;
        let campaign =
            config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
                .unwrap();
        assert_eq!(campaign.delivery.concurrency, 25);
        assert!(matches!(
            campaign.message.attachment,
            AttachmentSpec::Render { .. }
        ));

        let serialized = config_loader::ConfigLoader::to_toml(&campaign).unwrap();
        let reloaded = config_loader::ConfigLoader::load_from_str(
            &serialized,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(reloaded, campaign);
    }

    #[test]
    fn test_invalid_concurrency_rejected() {
        let toml = r#"
[message]
subject = "Hello"
sender_name = "Ops"
plain_body = "hi"

[delivery]
concurrency = 500
"#;
        assert!(config_loader::ConfigLoader::load_from_str(
            toml,
            config_loader::ConfigFormat::Toml
        )
        .is_err());
    }
}
