//! The api-security pipeline through the scheduler, including cascade
//! delete of its artefacts.

use crate::prelude::*;
use pal_storage::TaskStore;
use pal_adapters::http::HttpResponse;
use pal_core::{Target, TaskSpec, TaskState, TaskType};

fn api_spec() -> TaskSpec {
    TaskSpec::builder("api audit", TaskType::ApiSecurity)
        .target(Target::parse("https://app.example.com/").unwrap())
        .build()
}

fn script_target(platform: &Platform) {
    platform.http.respond(
        "https://app.example.com/",
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: r#"<script src="/main.js"></script>"#.to_string(),
        },
    );
    platform.http.respond(
        "https://app.example.com/main.js",
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: r#"fetch("/api/user/list"); fetch("/api/user/health");"#.to_string(),
        },
    );
    platform.http.respond(
        "https://app.example.com/api/user/list",
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: r#"[{"email":"ops@example.com"}]"#.to_string(),
        },
    );
    platform.http.fallback(HttpResponse {
        status: 404,
        ..HttpResponse::default()
    });
}

#[tokio::test]
async fn api_security_task_persists_artefacts() {
    let platform = Platform::new();
    script_target(&platform);
    platform.start();
    let sub = platform.scheduler.subscribe();

    let task_id = platform.scheduler.submit(&alice(), api_spec()).await.unwrap();
    await_state(&sub, TaskState::Completed).await;
    platform.scheduler.shutdown().await;

    let results = platform.scheduler.results(&alice(), &task_id).unwrap();
    assert_eq!(results.task.state, TaskState::Completed);
    assert_eq!(results.js_resources.len(), 1);
    assert!(!results.endpoints.is_empty());
    assert!(!results.issues.is_empty());

    // /api/user/list is open and private-looking; /api/user/health is
    // filtered as intentionally public.
    assert!(results
        .issues
        .iter()
        .any(|i| i.target_url.ends_with("/api/user/list")));
    assert!(!results
        .issues
        .iter()
        .any(|i| i.target_url.ends_with("/health")));
}

#[tokio::test]
async fn cascade_delete_removes_every_artefact() {
    let platform = Platform::new();
    script_target(&platform);
    platform.start();
    let sub = platform.scheduler.subscribe();

    let task_id = platform.scheduler.submit(&alice(), api_spec()).await.unwrap();
    await_state(&sub, TaskState::Completed).await;
    platform.scheduler.shutdown().await;

    platform.scheduler.delete(&alice(), &task_id).unwrap();

    assert!(platform.store.get_task(&task_id).is_err());
    assert!(platform.store.js_resources(&task_id).unwrap().is_empty());
    assert!(platform.store.api_endpoints(&task_id).unwrap().is_empty());
    assert!(platform.store.microservices(&task_id).unwrap().is_empty());
    assert!(platform.store.issues(&task_id).unwrap().is_empty());
    assert!(platform.store.findings(&task_id).unwrap().is_empty());
}
