use forum_client::testing::MockTransport;
use forum_client::{ClientConfig, Forum, Preload, SessionPayload, WireResponse};
use forum_stream::DiscussionPage;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn post(number: u64) -> serde_json::Value {
    json!({
        "type": "posts",
        "id": (100 + number).to_string(),
        "attributes": {"number": number},
        "relationships": {"discussion": {"data": {"type": "discussions", "id": "1"}}}
    })
}

#[tokio::test]
async fn page_runs_against_the_json_api_client() {
    let transport = MockTransport::with_responder(|request| {
        let body = if request.url.contains("/api/discussions/hello") {
            json!({
                "data": {
                    "type": "discussions",
                    "id": "1",
                    "attributes": {"slug": "hello", "lastPostNumber": 40, "lastReadPostNumber": 2}
                },
                "included": [post(1), post(2)]
            })
        } else if request.url.contains("/api/posts") {
            json!({"data": [post(19), post(20), post(21)]})
        } else if request.url.ends_with("/api/discussions/1") {
            json!({"data": {"type": "discussions", "id": "1", "attributes": {"lastReadPostNumber": 21}}})
        } else {
            return None;
        };
        Some(WireResponse::new(200, body.to_string()).with_header("X-CSRF-Token", "next"))
    });
    let preload = Preload {
        session: Some(SessionPayload {
            user_id: Some("7".to_string()),
            csrf_token: "first".to_string(),
        }),
        documents: Vec::new(),
    };
    let forum = Forum::boot_with_transport(ClientConfig::default(), preload, transport.clone())
        .expect("boot");

    let page = DiscussionPage::open_with_page_size(
        Arc::new(forum.api().clone()),
        forum.session().clone(),
        "hello",
        Some(20),
        forum.config().page_size,
    )
    .await
    .expect("open");
    // The page near 20 is far from the included posts and replaces them.
    assert_eq!(page.stream().loaded_numbers(), vec![19, 20, 21]);

    assert!(page.on_position_change(19, 21).await.expect("mark read"));

    let sent = transport.requests();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].url.contains("bySlug=true"));
    assert!(sent[1].url.contains("page%5Bnear%5D=20"));
    assert_eq!(sent[2].method, "POST");
    assert_eq!(sent[2].header("X-HTTP-Method-Override"), Some("PATCH"));
    assert_eq!(sent[2].header("X-CSRF-Token"), Some("next"));

    let discussion = forum.store().get_by_id("discussions", "1").expect("discussion");
    assert_eq!(discussion.attribute("lastReadPostNumber"), Some(&json!(21)));
}
