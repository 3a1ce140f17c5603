use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use quill::rest::BLOG_CREATE_REJECTED;
use quill_core::handlers::Provisioning;
use serde_json::{json, Value};

mod common;
use common::{test_config, TestApp};

fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized() {
    let app = TestApp::new();
    for uri in ["/api/blogs/", "/api/posts/", "/api/tags/", "/api/users/me/"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["detail"].is_string());
    }
    let (status, _) = app.get("/api/posts/", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_log_in() {
    let app = TestApp::new();
    let (status, user) = app
        .post(
            "/api/register/",
            None,
            json!({ "username": "carol", "email": "carol@example.com", "password": "long enough" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["username"], "carol");
    assert_eq!(user["is_staff"], true);
    assert_eq!(user["permissions"].as_array().unwrap().len(), 12);
    assert!(user.get("password_hash").is_none());

    let (status, _) = app
        .post(
            "/api/register/",
            None,
            json!({ "username": "carol", "password": "long enough" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .post(
            "/api/token/",
            None,
            json!({ "username": "carol", "password": "wrong one" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    let (status, pair) = app
        .post(
            "/api/token/",
            None,
            json!({ "username": "carol", "password": "long enough" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = pair["access"].as_str().unwrap();
    let refresh = pair["refresh"].as_str().unwrap();

    let (status, me) = app.get("/api/users/me/", Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "carol");

    // A refresh token is not an access token and vice versa.
    let (status, _) = app.get("/api/users/me/", Some(refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .post("/api/token/refresh/", None, json!({ "refresh": access }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, renewed) = app
        .post("/api/token/refresh/", None, json!({ "refresh": refresh }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .get("/api/users/me/", renewed["access"].as_str())
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_registration_is_a_bad_request() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/register/",
            None,
            json!({ "username": "dave", "email": "nope", "password": "long enough" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("email:"));

    let (status, _) = app
        .post("/api/register/", None, json!({ "username": "dave" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blog_creation_is_always_rejected() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let token = app.token(&alice);
    let (status, body) = app
        .post("/api/blogs/", Some(&token), json!({ "title": "Mine" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], BLOG_CREATE_REJECTED);
    let (status, _) = app.post("/api/blogs/", None, json!({ "title": "Mine" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn first_post_provisions_the_blog() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let token = app.token(&alice);

    let (status, first) = app
        .post(
            "/api/posts/",
            Some(&token),
            json!({ "title": "Hello", "content": "World" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    let (status, second) = app
        .post(
            "/api/posts/",
            Some(&token),
            json!({ "title": "Again", "content": "World" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["blog"], second["blog"]);

    let (_, blogs) = app.get("/api/blogs/", Some(&token)).await;
    assert_eq!(ids(&blogs), vec![first["blog"].as_i64().unwrap()]);
    assert_eq!(blogs[0]["title"], "alice's blog");
    assert_eq!(blogs[0]["user"]["username"], "alice");

    let (_, posts) = app.get("/api/posts/", Some(&token)).await;
    assert_eq!(
        ids(&posts),
        vec![second["id"].as_i64().unwrap(), first["id"].as_i64().unwrap()]
    );
}

#[tokio::test]
async fn explicit_provisioning_denies_posts_without_a_blog() {
    let mut config = test_config();
    config.provisioning = Provisioning::Explicit;
    let app = TestApp::with_config(config);
    let alice = app.user("alice");
    let token = app.token(&alice);
    let (status, body) = app
        .post(
            "/api/posts/",
            Some(&token),
            json!({ "title": "Hello", "content": "World" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "You must create a blog before continuing");
}

#[tokio::test]
async fn objects_of_other_users_are_forbidden() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let alice_token = app.token(&alice);
    let bob_token = app.token(&bob);

    let (_, post) = app
        .post(
            "/api/posts/",
            Some(&alice_token),
            json!({ "title": "Hello", "content": "World" }),
        )
        .await;
    let post_uri = format!("/api/posts/{}/", post["id"]);
    let blog_uri = format!("/api/blogs/{}/", post["blog"]);

    let (status, _) = app.get(&post_uri, Some(&bob_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(
            Method::PATCH,
            &post_uri,
            Some(&bob_token),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::DELETE, &blog_uri, Some(&bob_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .get(&format!("/api/users/{}/", alice.id), Some(&bob_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/posts/999/", Some(&bob_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, bobs_posts) = app.get("/api/posts/", Some(&bob_token)).await;
    assert_eq!(bobs_posts, json!([]));

    let (status, patched) = app
        .send(
            Method::PATCH,
            &post_uri,
            Some(&alice_token),
            Some(json!({ "title": "Edited" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["title"], "Edited");
    assert_eq!(patched["content"], "World");

    let (status, replaced) = app
        .send(
            Method::PUT,
            &blog_uri,
            Some(&alice_token),
            json!({ "title": "Cats" }).into(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["title"], "Cats");
    assert_eq!(replaced["description"], "");

    let (status, _) = app
        .send(Method::DELETE, &post_uri, Some(&alice_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn superuser_sees_everything() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let root = app.superuser("root");
    for (actor, title) in [(&alice, "A"), (&bob, "B")] {
        let (status, _) = app
            .post(
                "/api/posts/",
                Some(&app.token(actor)),
                json!({ "title": title, "content": "x" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let root_token = app.token(&root);
    let (_, posts) = app.get("/api/posts/", Some(&root_token)).await;
    assert_eq!(posts.as_array().unwrap().len(), 2);
    let (_, blogs) = app.get("/api/blogs/", Some(&root_token)).await;
    assert_eq!(blogs.as_array().unwrap().len(), 2);
    let (status, user) = app
        .get(&format!("/api/users/{}/", alice.id), Some(&root_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["username"], "alice");
}

#[tokio::test]
async fn tag_rules() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let alice_token = app.token(&alice);
    let bob_token = app.token(&bob);
    let (_, p1) = app
        .post(
            "/api/posts/",
            Some(&alice_token),
            json!({ "title": "P1", "content": "x" }),
        )
        .await;
    let (_, p2) = app
        .post(
            "/api/posts/",
            Some(&bob_token),
            json!({ "title": "P2", "content": "x" }),
        )
        .await;

    let (status, body) = app
        .post("/api/tags/", Some(&alice_token), json!({ "name": "x", "posts": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "posts: You must provide at least one post to tag.");

    let (status, body) = app
        .post(
            "/api/tags/",
            Some(&bob_token),
            json!({ "name": "x", "posts": [p1["id"]] }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "No posts were found with those ids.");

    let (status, tag) = app
        .post(
            "/api/tags/",
            Some(&alice_token),
            json!({ "name": "Django ", "posts": [p1["id"]] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tag["name"], "django");
    assert_eq!(tag["posts"], json!([p1["id"]]));

    let (status, _) = app
        .post(
            "/api/tags/",
            Some(&alice_token),
            json!({ "name": "django", "posts": [p1["id"]] }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, assigned) = app
        .post(
            "/api/tags/assign/",
            Some(&alice_token),
            json!({ "name": "DJANGO", "posts": [p1["id"]] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["id"], tag["id"]);

    let (status, bob_tag) = app
        .post(
            "/api/tags/",
            Some(&bob_token),
            json!({ "name": "django", "posts": [p2["id"]] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(bob_tag["id"], tag["id"]);

    let (_, alice_tags) = app.get("/api/tags/", Some(&alice_token)).await;
    assert_eq!(ids(&alice_tags), vec![tag["id"].as_i64().unwrap()]);

    let tag_uri = format!("/api/tags/{}/", tag["id"]);
    let (status, _) = app
        .send(Method::DELETE, &tag_uri, Some(&bob_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, renamed) = app
        .send(
            Method::PATCH,
            &tag_uri,
            Some(&alice_token),
            Some(json!({ "name": "Python" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "python");
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let token = app.token(&alice);
    let (status, body) = app
        .post("/api/posts/", Some(&token), json!({ "title": 42 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("body:"));
}
