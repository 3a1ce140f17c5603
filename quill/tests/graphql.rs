use pretty_assertions::assert_eq;
use quill::graphql::LOGIN_REQUIRED;
use serde_json::{json, Value};

mod common;
use common::TestApp;

fn create_post(title: &str) -> String {
    format!(
        r#"mutation {{ createPost(title: "{title}", content: "Body of {title}") {{
            data {{ id blogId title }} errors message
        }} }}"#
    )
}

fn post_id(response: &Value) -> i64 {
    response["data"]["createPost"]["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn queries_require_login() {
    let app = TestApp::new();
    let response = app.graphql(None, "{ allPosts { id } }").await;
    assert_eq!(response["data"], Value::Null);
    assert_eq!(response["errors"][0]["message"], LOGIN_REQUIRED);

    // An unverifiable token counts as no token.
    let response = app.graphql(Some("garbage"), "{ allBlogs { id } }").await;
    assert_eq!(response["errors"][0]["message"], LOGIN_REQUIRED);
}

#[tokio::test]
async fn mutations_report_failures_in_the_payload() {
    let app = TestApp::new();
    let response = app.graphql(None, &create_post("Anonymous")).await;
    assert!(response.get("errors").is_none(), "{response}");
    let payload = &response["data"]["createPost"];
    assert_eq!(payload["data"], Value::Null);
    assert_eq!(
        payload["errors"],
        json!(["Authentication credentials were not provided or are invalid."])
    );
}

#[tokio::test]
async fn create_post_then_list() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let token = app.token(&alice);

    let first = app.graphql(Some(&token), &create_post("One")).await;
    let payload = &first["data"]["createPost"];
    assert_eq!(payload["errors"], json!([]));
    assert_eq!(payload["message"], "Post created.");
    let second = app.graphql(Some(&token), &create_post("Two")).await;
    assert_eq!(
        first["data"]["createPost"]["data"]["blogId"],
        second["data"]["createPost"]["data"]["blogId"]
    );

    let listed = app
        .graphql(Some(&token), "{ allPosts { id title } allBlogs { title user { username } } }")
        .await;
    assert_eq!(
        listed["data"]["allPosts"],
        json!([
            { "id": post_id(&second), "title": "Two" },
            { "id": post_id(&first), "title": "One" },
        ])
    );
    assert_eq!(
        listed["data"]["allBlogs"],
        json!([{ "title": "alice's blog", "user": { "username": "alice" } }])
    );
}

#[tokio::test]
async fn create_tag_on_someone_elses_post_fails() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let root = app.superuser("root");
    let p1 = post_id(&app.graphql(Some(&app.token(&alice)), &create_post("P1")).await);
    app.graphql(Some(&app.token(&bob)), &create_post("P2")).await;

    let query = format!(
        r#"mutation {{ createTag(name: "x", postIds: [{p1}]) {{ data {{ id }} errors }} }}"#
    );
    let response = app.graphql(Some(&app.token(&bob)), &query).await;
    let payload = &response["data"]["createTag"];
    assert_eq!(payload["data"], Value::Null);
    assert_eq!(
        payload["errors"],
        json!(["No posts were found with those ids."])
    );

    let tags = app
        .graphql(Some(&app.token(&root)), "{ allTags { id } }")
        .await;
    assert_eq!(tags["data"]["allTags"], json!([]));
}

#[tokio::test]
async fn tags_are_normalized_and_unique_per_blog() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let token = app.token(&alice);
    let p1 = post_id(&app.graphql(Some(&token), &create_post("P1")).await);

    let create = |name: &str| {
        format!(
            r#"mutation {{ createTag(name: "{name}", postIds: [{p1}]) {{ data {{ id name postIds }} errors }} }}"#
        )
    };
    let first = app.graphql(Some(&token), &create("Django ")).await;
    assert_eq!(
        first["data"]["createTag"]["data"]["name"],
        "django"
    );
    assert_eq!(first["data"]["createTag"]["data"]["postIds"], json!([p1]));

    let second = app.graphql(Some(&token), &create("django")).await;
    assert_eq!(second["data"]["createTag"]["data"], Value::Null);
    assert_eq!(
        second["data"]["createTag"]["errors"],
        json!(["A tag named 'django' already exists in this blog."])
    );

    let empty = app
        .graphql(
            Some(&token),
            r#"mutation { createTag(name: "y", postIds: []) { errors } }"#,
        )
        .await;
    assert_eq!(
        empty["data"]["createTag"]["errors"],
        json!(["posts: You must provide at least one post to tag."])
    );
}

#[tokio::test]
async fn superuser_lists_every_post() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let root = app.superuser("root");
    app.graphql(Some(&app.token(&alice)), &create_post("A")).await;
    app.graphql(Some(&app.token(&bob)), &create_post("B")).await;

    let mine = app
        .graphql(Some(&app.token(&alice)), "{ allPosts { title } }")
        .await;
    assert_eq!(mine["data"]["allPosts"], json!([{ "title": "A" }]));
    let all = app
        .graphql(Some(&app.token(&root)), "{ allPosts { title } }")
        .await;
    assert_eq!(
        all["data"]["allPosts"],
        json!([{ "title": "B" }, { "title": "A" }])
    );
}

#[tokio::test]
async fn create_blog_enforces_one_per_user() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let token = app.token(&alice);
    let create = r#"mutation { createBlog(title: "Cats") { data { title description } errors } }"#;
    let first = app.graphql(Some(&token), create).await;
    assert_eq!(
        first["data"]["createBlog"]["data"],
        json!({ "title": "Cats", "description": "Blog" })
    );
    let second = app.graphql(Some(&token), create).await;
    assert_eq!(
        second["data"]["createBlog"]["errors"],
        json!(["You already have a blog."])
    );
}

#[tokio::test]
async fn register_login_refresh() {
    let app = TestApp::new();
    let registered = app
        .graphql(
            None,
            r#"mutation { registerUser(username: "erin", email: "erin@example.com", password: "long enough") {
                data { username isStaff permissions } errors
            } }"#,
        )
        .await;
    let user = &registered["data"]["registerUser"]["data"];
    assert_eq!(user["username"], "erin");
    assert_eq!(user["isStaff"], true);
    assert_eq!(user["permissions"].as_array().unwrap().len(), 12);

    let bad = app
        .graphql(
            None,
            r#"mutation { loginTokenAuth(username: "erin", password: "nope") { data { access } errors } }"#,
        )
        .await;
    assert_eq!(bad["data"]["loginTokenAuth"]["data"], Value::Null);
    assert_eq!(
        bad["data"]["loginTokenAuth"]["errors"].as_array().unwrap().len(),
        1
    );

    let login = app
        .graphql(
            None,
            r#"mutation { loginTokenAuth(username: "erin", password: "long enough") { data { access refresh } } }"#,
        )
        .await;
    let tokens = &login["data"]["loginTokenAuth"]["data"];
    let access = tokens["access"].as_str().unwrap();
    let refresh = tokens["refresh"].as_str().unwrap();

    let me = app.graphql(Some(access), "{ me { username } }").await;
    assert_eq!(me["data"]["me"]["username"], "erin");

    let refreshed = app
        .graphql(
            None,
            &format!(r#"mutation {{ refreshToken(refresh: "{refresh}") {{ data {{ access }} errors }} }}"#),
        )
        .await;
    let renewed = refreshed["data"]["refreshToken"]["data"]["access"]
        .as_str()
        .unwrap();
    let me = app.graphql(Some(renewed), "{ me { username } }").await;
    assert_eq!(me["data"]["me"]["username"], "erin");
}

#[tokio::test]
async fn update_and_delete_post() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let token = app.token(&alice);
    let id = post_id(&app.graphql(Some(&token), &create_post("Draft")).await);

    let update = format!(
        r#"mutation {{ updatePost(id: {id}, title: "Final") {{ data {{ title content }} errors }} }}"#
    );
    let denied = app.graphql(Some(&app.token(&bob)), &update).await;
    assert_eq!(
        denied["data"]["updatePost"]["errors"],
        json!(["You do not have permission to perform this action."])
    );
    let updated = app.graphql(Some(&token), &update).await;
    assert_eq!(
        updated["data"]["updatePost"]["data"],
        json!({ "title": "Final", "content": "Body of Draft" })
    );

    let delete = format!(r#"mutation {{ deletePost(id: {id}) {{ data {{ id }} errors }} }}"#);
    let deleted = app.graphql(Some(&token), &delete).await;
    assert_eq!(deleted["data"]["deletePost"]["data"], json!({ "id": id }));
    let again = app.graphql(Some(&token), &delete).await;
    assert_eq!(
        again["data"]["deletePost"]["errors"],
        json!(["Post not found."])
    );
}

#[tokio::test]
async fn blog_and_tag_mutations() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let token = app.token(&alice);
    let bob_token = app.token(&bob);
    let created = app.graphql(Some(&token), &create_post("P1")).await;
    let p1 = post_id(&created);
    let blog_id = created["data"]["createPost"]["data"]["blogId"].as_i64().unwrap();
    app.graphql(Some(&bob_token), &create_post("P2")).await;

    let rename_blog = format!(
        r#"mutation {{ updateBlog(id: {blog_id}, title: "Alice writes") {{ data {{ title }} errors message }} }}"#
    );
    let denied = app.graphql(Some(&bob_token), &rename_blog).await;
    assert_eq!(
        denied["data"]["updateBlog"]["errors"],
        json!(["You do not have permission to perform this action."])
    );
    let renamed = app.graphql(Some(&token), &rename_blog).await;
    assert_eq!(
        renamed["data"]["updateBlog"],
        json!({ "data": { "title": "Alice writes" }, "errors": [], "message": "Blog updated." })
    );

    let assign = format!(
        r#"mutation {{ assignTag(name: "Rust", postIds: [{p1}]) {{ data {{ id name postIds }} errors }} }}"#
    );
    let first = app.graphql(Some(&token), &assign).await;
    let tag = &first["data"]["assignTag"]["data"];
    assert_eq!(tag["name"], "rust");
    assert_eq!(tag["postIds"], json!([p1]));
    let tag_id = tag["id"].as_i64().unwrap();
    let again = app.graphql(Some(&token), &assign).await;
    assert_eq!(again["data"]["assignTag"]["data"]["id"], json!(tag_id));

    let update = format!(
        r#"mutation {{ updateTag(id: {tag_id}, name: " Go ") {{ data {{ name postIds }} errors }} }}"#
    );
    let delete = format!(r#"mutation {{ deleteTag(id: {tag_id}) {{ data {{ id }} errors }} }}"#);
    for (name, query) in [("updateTag", &update), ("deleteTag", &delete)] {
        let response = app.graphql(Some(&bob_token), query).await;
        assert_eq!(response["data"][name]["data"], Value::Null);
        assert_eq!(
            response["data"][name]["errors"],
            json!(["You do not have permission to perform this action."])
        );
    }

    let updated = app.graphql(Some(&token), &update).await;
    assert_eq!(
        updated["data"]["updateTag"]["data"],
        json!({ "name": "go", "postIds": [p1] })
    );
    let deleted = app.graphql(Some(&token), &delete).await;
    assert_eq!(deleted["data"]["deleteTag"]["data"], json!({ "id": tag_id }));
    let tags = app.graphql(Some(&token), "{ allTags { id } }").await;
    assert_eq!(tags["data"]["allTags"], json!([]));
}
