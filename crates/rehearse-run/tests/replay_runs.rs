//! End-to-end replay runs over the in-memory document

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rehearse_core_types::{EventType, LocatorBundle, Step, StepStatus, ValueSource};
use rehearse_dom::{ActionDescriptor, DocumentView, MemoryDocument, MemoryTransport, NodeHandle, NodeSpec};
use rehearse_run::{RunConfig, RunOrchestrator, RunStatus};
use rehearse_step::{StepExecutor, StepOptions};

fn login_page() -> Arc<MemoryDocument> {
    let doc = Arc::new(MemoryDocument::new());
    doc.insert(
        NodeSpec::new("user", "input")
            .with_attr("id", "username")
            .with_attr("placeholder", "Username")
            .in_form(),
    );
    doc.insert(
        NodeSpec::new("pass", "input")
            .with_attr("name", "password")
            .in_form(),
    );
    doc.insert(
        NodeSpec::new("login", "button")
            .with_attr("id", "login")
            .with_text("Log in")
            .in_form(),
    );
    doc
}

fn input_step(label: &str, id: Option<&str>, name: Option<&str>, recorded: &str) -> Step {
    Step {
        event: EventType::Input,
        path: String::new(),
        bundle: LocatorBundle {
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            tag: Some("input".to_string()),
            ..Default::default()
        },
        value: Some(recorded.to_string()),
        label: label.to_string(),
        x: 0.0,
        y: 0.0,
    }
}

fn click_step(label: &str, id: &str) -> Step {
    Step {
        event: EventType::Click,
        path: String::new(),
        bundle: LocatorBundle {
            id: Some(id.to_string()),
            tag: Some("button".to_string()),
            ..Default::default()
        },
        value: None,
        label: label.to_string(),
        x: 0.0,
        y: 0.0,
    }
}

fn wiring(
    doc: Arc<MemoryDocument>,
    config: RunConfig,
) -> (Arc<MemoryTransport>, RunOrchestrator) {
    let transport = Arc::new(MemoryTransport::new(doc.clone()));
    let executor = Arc::new(StepExecutor::new(doc, transport.clone()));
    let orchestrator = RunOrchestrator::new(executor, transport.clone(), config);
    (transport, orchestrator)
}

fn fast_config() -> RunConfig {
    RunConfig::default()
        .with_base_delay(Duration::ZERO)
        .with_step_options(
            StepOptions::default()
                .with_find_timeout(Duration::from_millis(200))
                .with_retry_interval(Duration::from_millis(20)),
        )
}

#[tokio::test]
async fn data_driven_login_replays_each_row() {
    let doc = login_page();
    let (transport, orchestrator) = wiring(doc.clone(), fast_config());

    let steps = vec![
        input_step("Username", Some("username"), None, "recorded-user"),
        input_step("Password", None, Some("password"), "recorded-pass"),
        click_step("Log in", "login"),
    ];
    let rows = vec![
        HashMap::from([
            ("Username".to_string(), "ada".to_string()),
            ("pw_col".to_string(), "lovelace".to_string()),
        ]),
        HashMap::from([
            ("Username".to_string(), "grace".to_string()),
            ("pw_col".to_string(), "hopper".to_string()),
        ]),
    ];
    let mappings = HashMap::from([("pw_col".to_string(), "Password".to_string())]);

    let export = orchestrator.run(steps, rows, mappings).await.unwrap();

    assert_eq!(export.status, RunStatus::Completed);
    assert_eq!(export.passed, 6);
    assert_eq!(export.failed, 0);
    assert_eq!(export.row_results.len(), 2);

    // The second row's values are the ones left on the document.
    let user = doc
        .snapshot(&NodeHandle("user".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.value.as_deref(), Some("grace"));
    let pass = doc
        .snapshot(&NodeHandle("pass".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pass.value.as_deref(), Some("hopper"));

    // Direct label match and mapped column both reported faithfully.
    let sources: Vec<Option<ValueSource>> = export
        .step_results
        .iter()
        .map(|r| r.value_source)
        .collect();
    assert_eq!(sources[0], Some(ValueSource::CsvDirect));
    assert_eq!(sources[1], Some(ValueSource::CsvMapped));
    assert_eq!(sources[2], None);

    // Three dispatches per row: input, input, click.
    assert_eq!(transport.dispatched().len(), 6);
    assert!(matches!(
        transport.dispatched()[2].action,
        ActionDescriptor::Click
    ));
}

#[tokio::test]
async fn missing_element_skips_and_keeps_the_run_alive() {
    let doc = login_page();
    let config = RunConfig::default()
        .with_base_delay(Duration::ZERO)
        .stop_on_error()
        .with_step_options(
            StepOptions::default()
                .with_find_timeout(Duration::from_millis(100))
                .with_retry_interval(Duration::from_millis(20))
                .skip_on_not_found(),
        );
    let (_transport, orchestrator) = wiring(doc, config);

    let steps = vec![
        click_step("Ghost button", "does-not-exist"),
        click_step("Log in", "login"),
    ];
    let export = orchestrator
        .run(steps, Vec::new(), HashMap::new())
        .await
        .unwrap();

    // Skip takes precedence over fail: no failure counter increment and
    // stop-on-error never trips.
    assert_eq!(export.status, RunStatus::Completed);
    assert_eq!(export.skipped, 1);
    assert_eq!(export.failed, 0);
    assert_eq!(export.passed, 1);
    assert_eq!(export.step_results[0].status, StepStatus::Skipped);
}

#[tokio::test]
async fn missing_element_with_stop_on_error_halts() {
    let doc = login_page();
    let config = fast_config().stop_on_error();
    let (_transport, orchestrator) = wiring(doc, config);

    let steps = vec![
        click_step("Ghost button", "does-not-exist"),
        click_step("Log in", "login"),
    ];
    let export = orchestrator
        .run(steps, Vec::new(), HashMap::new())
        .await
        .unwrap();

    assert_eq!(export.status, RunStatus::Stopped);
    assert_eq!(export.step_results.len(), 1);
    assert_eq!(export.failed, 1);
    assert_eq!(export.passed, 0);
}

#[tokio::test]
async fn open_steps_auto_pass_with_dead_transport_but_clicks_fail() {
    let doc = login_page();
    // A deterministic inter-step gap so the transport can be killed
    // between the open and the click.
    let mut config = fast_config();
    config.base_delay = Duration::from_millis(80);
    config.jitter_factor = 0.0;
    let (transport, orchestrator) = wiring(doc, config);

    let open = Step {
        event: EventType::Open,
        path: "document".to_string(),
        bundle: LocatorBundle::default(),
        value: Some("https://example.com/login".to_string()),
        label: "Open login page".to_string(),
        x: 0.0,
        y: 0.0,
    };
    let steps = vec![open, click_step("Log in", "login")];

    // Transport dies after the preflight probe.
    let orchestrator = Arc::new(orchestrator);
    let saboteur = transport.clone();
    let runner = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run(steps, Vec::new(), HashMap::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    saboteur.set_available(false);

    let export = runner.await.unwrap().unwrap();
    assert_eq!(export.status, RunStatus::Completed);
    assert_eq!(export.passed, 1, "open still auto-passes");
    assert_eq!(export.failed, 1, "the click needs the transport");
    let failed = &export.step_results[1];
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .contains("Transport unavailable"));
}

#[tokio::test]
async fn export_serializes_with_logs_and_rows() {
    let doc = login_page();
    let (_transport, orchestrator) = wiring(doc, fast_config());

    let export = orchestrator
        .run(
            vec![click_step("Log in", "login")],
            Vec::new(),
            HashMap::new(),
        )
        .await
        .unwrap();

    let json = serde_json::to_value(&export).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["passed"], 1);
    assert!(json["run_id"].is_string());
    assert!(json["step_results"].is_array());
    assert!(json["row_results"].is_array());
    assert!(
        json["logs"].as_array().unwrap().len() >= 3,
        "start, step and finish entries at minimum"
    );
    assert_eq!(json["step_results"][0]["strategy"], "id");
}

#[tokio::test]
async fn late_appearing_element_is_awaited_within_budget() {
    let doc = Arc::new(MemoryDocument::new());
    let (_transport, orchestrator) = wiring(
        doc.clone(),
        RunConfig::default()
            .with_base_delay(Duration::ZERO)
            .with_step_options(
                StepOptions::default()
                    .with_find_timeout(Duration::from_secs(2))
                    .with_retry_interval(Duration::from_millis(25)),
            ),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        doc.insert(
            NodeSpec::new("late", "button")
                .with_attr("id", "confirm")
                .with_text("Confirm"),
        );
    });

    let export = orchestrator
        .run(
            vec![click_step("Confirm", "confirm")],
            Vec::new(),
            HashMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(export.status, RunStatus::Completed);
    assert_eq!(export.passed, 1);
    assert!(export.step_results[0].timings.locate_ms >= 75);
}
