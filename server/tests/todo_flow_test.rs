//! End-to-end tests of the todo list pages.
//!
//! These tests drive the full router the way a browser would:
//! - The session cookie issued on the first response is sent back on every
//!   following request
//! - Forms are posted URL-encoded and redirects are inspected, not followed
//! - Session contents are read back through the shared session store

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{request, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use todolists_server::config::Config;
use todolists_server::routes::{create_router, AppState};
use todolists_server::session::SESSION_COOKIE;
use todolists_server::types::TodoLists;

// ============================================================================
// Test Helpers
// ============================================================================

/// A browser stand-in holding one session cookie.
struct Browser {
    state: AppState,
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let state = AppState::new(config).expect("state");
        let app = create_router(state.clone());
        Self {
            state,
            app,
            cookie: None,
        }
    }

    /// A second visitor of the same server, without a cookie.
    fn stranger(&self) -> Self {
        Self {
            state: self.state.clone(),
            app: self.app.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, builder: request::Builder, body: Body) -> Response {
        let builder = match &self.cookie {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        };
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response.headers().get(SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri), Body::empty()).await
    }

    async fn page(&mut self, uri: &str) -> String {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        body_text(response).await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Response {
        let builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(builder, Body::from(form.to_string())).await
    }

    async fn post_xhr(&mut self, uri: &str) -> Response {
        let builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("X-Requested-With", "XMLHttpRequest");
        self.send(builder, Body::empty()).await
    }

    fn token(&self) -> &str {
        self.cookie
            .as_deref()
            .and_then(|c| c.split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, token)| token)
            .expect("session cookie")
    }

    fn lists(&self) -> TodoLists {
        let data = self.state.sessions.resume(self.token()).expect("live session");
        let lists = data.try_lock().unwrap().lists.clone();
        lists
    }
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn assert_redirect(response: &Response, to: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), to);
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn groceries_walkthrough() {
    let mut browser = Browser::new();

    let html = browser.page("/lists").await;
    assert!(html.contains("You don't have any lists yet."));

    assert_redirect(&browser.post("/lists", "list_name=Groceries").await, "/lists");
    let html = browser.page("/lists").await;
    assert!(html.contains("The list has been created."));
    assert!(html.contains("0 / 0"));

    assert_redirect(&browser.post("/lists/0/todos", "todo=Milk").await, "/lists/0");
    assert_redirect(&browser.post("/lists/0/todos", "todo=Eggs").await, "/lists/0");
    let html = browser.page("/lists/0").await;
    assert!(html.contains("The todo was added."));
    assert!(html.contains("2 / 2"));

    assert_redirect(
        &browser.post("/lists/0/todos/0", "completed=true").await,
        "/lists/0",
    );
    let html = browser.page("/lists/0").await;
    assert!(html.contains("The todo has been updated."));
    assert!(html.contains("1 / 2"));
    // Outstanding todos come first.
    assert!(html.find("Eggs").unwrap() < html.find("Milk").unwrap());

    assert_redirect(&browser.post("/lists/0/complete_all", "").await, "/lists/0");
    let html = browser.page("/lists").await;
    assert!(html.contains(r#"<li class="complete">"#));
    assert!(html.contains("0 / 2"));

    let lists = browser.lists();
    let list = lists.get(0).unwrap();
    assert!(list.is_complete());
    assert_eq!(list.css_class(), Some("complete"));
}

#[tokio::test]
async fn complete_lists_are_listed_last() {
    let mut browser = Browser::new();
    browser.post("/lists", "list_name=Alpha").await;
    browser.post("/lists", "list_name=Beta").await;
    browser.post("/lists/0/todos", "todo=One").await;
    browser.post("/lists/0/complete_all", "").await;

    let html = browser.page("/lists").await;
    assert!(html.find("Beta").unwrap() < html.find("Alpha").unwrap());
}

#[tokio::test]
async fn missing_list_keeps_collection_unchanged() {
    let mut browser = Browser::new();
    browser.post("/lists", "list_name=Work").await;
    browser.page("/lists").await;
    let before = browser.lists();

    assert_redirect(&browser.get("/lists/999").await, "/lists");
    assert_redirect(&browser.post("/lists/999", "list_name=X").await, "/lists");
    assert_redirect(&browser.post("/lists/999/delete", "").await, "/lists");
    assert_redirect(&browser.post("/lists/999/complete_all", "").await, "/lists");

    let html = browser.page("/lists").await;
    assert!(html.contains("The specified list was not found."));
    assert_eq!(browser.lists(), before);
}

#[tokio::test]
async fn overlong_list_name_is_rejected() {
    let mut browser = Browser::new();
    let name = "x".repeat(101);

    let response = browser.post("/lists", &format!("list_name={name}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("List name must be between 1 and 100 characters."));
    // Nothing was kept, so no session was stored.
    assert!(browser.cookie.is_none());
    assert!(browser.state.sessions.is_empty());

    let name = "x".repeat(100);
    assert_redirect(
        &browser.post("/lists", &format!("list_name={name}")).await,
        "/lists",
    );
    assert_eq!(browser.lists().len(), 1);
}

#[tokio::test]
async fn names_are_trimmed() {
    let mut browser = Browser::new();
    browser.post("/lists", "list_name=++Groceries++").await;
    browser.post("/lists/0/todos", "todo=%20Milk%20").await;

    let lists = browser.lists();
    let list = lists.get(0).unwrap();
    assert_eq!(list.name, "Groceries");
    assert_eq!(list.todos[0].name, "Milk");
}

#[tokio::test]
async fn duplicate_after_trimming_is_rejected() {
    let mut browser = Browser::new();
    browser.post("/lists", "list_name=Groceries").await;

    let html = body_text(browser.post("/lists", "list_name=+Groceries+").await).await;
    assert!(html.contains("List name must be unique."));
    assert_eq!(browser.lists().len(), 1);
}

#[tokio::test]
async fn renaming_to_own_name_is_rejected() {
    let mut browser = Browser::new();
    browser.post("/lists", "list_name=Work").await;

    let response = browser.post("/lists/0", "list_name=Work").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("List name must be unique."));
}

#[tokio::test]
async fn list_ids_are_not_reused_after_delete() {
    let mut browser = Browser::new();
    browser.post("/lists", "list_name=A").await;
    browser.post("/lists", "list_name=B").await;
    browser.post("/lists/1/delete", "").await;
    browser.post("/lists", "list_name=C").await;

    let ids: Vec<u64> = browser.lists().iter().map(|list| list.id).collect();
    assert_eq!(ids, vec![0, 2]);
    assert!(browser.page("/lists/2").await.contains("<h2>C</h2>"));
}

#[tokio::test]
async fn programmatic_deletes() {
    let mut browser = Browser::new();
    browser.post("/lists", "list_name=Groceries").await;
    browser.post("/lists/0/todos", "todo=Milk").await;
    browser.page("/lists/0").await;

    let response = browser.post_xhr("/lists/0/todos/0/delete").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(browser.lists().get(0).unwrap().is_empty());

    let response = browser.post_xhr("/lists/0/delete").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "/lists");
    assert!(browser.lists().is_empty());

    // No flash was left behind by either call.
    let html = browser.page("/lists").await;
    assert!(!html.contains("flash success"));
}

#[tokio::test]
async fn missing_todo_redirects_to_its_list() {
    let mut browser = Browser::new();
    browser.post("/lists", "list_name=Groceries").await;
    browser.post("/lists/0/todos", "todo=Milk").await;
    browser.page("/lists/0").await;

    assert_redirect(&browser.post("/lists/0/todos/5/delete", "").await, "/lists/0");
    assert_redirect(&browser.post("/lists/0/todos/x", "completed=true").await, "/lists/0");

    let html = browser.page("/lists/0").await;
    assert!(html.contains("The specified todo was not found."));
    assert_eq!(browser.lists().get(0).unwrap().todos_count(), 1);
}

#[tokio::test]
async fn markup_in_names_is_escaped() {
    let mut browser = Browser::new();
    browser
        .post("/lists", "list_name=%3Cb%3Ebold%3C%2Fb%3E")
        .await;

    let html = browser.page("/lists").await;
    assert!(!html.contains("<b>bold"));
    assert!(html.contains("&lt;b&gt;bold"));
}

#[tokio::test]
async fn visitors_are_isolated() {
    let mut alice = Browser::new();
    alice.post("/lists", "list_name=Secret").await;

    let mut bob = alice.stranger();
    assert!(!bob.page("/lists").await.contains("Secret"));
    assert_redirect(&bob.get("/lists/0").await, "/lists");
    assert_ne!(alice.token(), bob.token());
}

#[tokio::test]
async fn unknown_cookie_starts_a_fresh_session() {
    let mut browser = Browser::new();
    browser.cookie = Some(format!("{SESSION_COOKIE}=not-a-real-token"));

    let response = browser.get("/lists").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(browser.token(), "not-a-real-token");

    browser.post("/lists", "list_name=Work").await;
    assert_ne!(browser.token(), "not-a-real-token");
    assert_eq!(browser.lists().len(), 1);
}

#[tokio::test]
async fn expired_session_is_replaced() {
    let config = Config {
        session_ttl: Duration::from_millis(20),
        ..Config::default()
    };
    let mut browser = Browser::with_config(config);
    browser.post("/lists", "list_name=Short-lived").await;
    let first = browser.token().to_string();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let html = browser.page("/lists").await;
    assert!(!html.contains("Short-lived"));

    browser.post("/lists", "list_name=Fresh").await;
    assert_ne!(browser.token(), first);
    assert_eq!(browser.lists().len(), 1);
}

#[tokio::test]
async fn reading_pages_does_not_use_up_sessions() {
    let config = Config {
        max_sessions: 3,
        ..Config::default()
    };
    let crawler = Browser::with_config(config);

    for _ in 0..5 {
        let mut visit = crawler.stranger();
        let response = visit.get("/lists").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
        visit.get("/lists/new").await;
    }
    assert!(crawler.state.sessions.is_empty());

    let mut visitor = crawler.stranger();
    assert_redirect(&visitor.post("/lists", "list_name=Groceries").await, "/lists");
    assert_eq!(visitor.lists().len(), 1);
}

#[tokio::test]
async fn full_store_answers_service_unavailable() {
    let config = Config {
        max_sessions: 1,
        ..Config::default()
    };
    let mut first = Browser::with_config(config);
    assert_redirect(&first.post("/lists", "list_name=Work").await, "/lists");

    let mut second = first.stranger();
    let html = second.page("/lists").await;
    assert!(html.contains("You don't have any lists yet."));

    let response = second.post("/lists", "list_name=Home").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(second.cookie.is_none());

    // The stored visitor is unaffected.
    assert_redirect(&first.post("/lists/0/todos", "todo=Mail").await, "/lists/0");
}
