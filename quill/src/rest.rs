//! REST adapter.
//!
//! Collection routes list the caller's scoped view; item routes apply the
//! resource's policy through the handlers in [`quill_core::handlers`].
//! Every failure is answered with `{"detail": "<message>"}` and a status
//! code chosen from the error's [`ErrorKind`].

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use quill_core::handlers;
use quill_core::models::{
    BlogChanges, NewBlog, NewPost, NewTag, NewUser, PostChanges, TagChanges,
};
use quill_core::{Blog, Error, ErrorKind, Id, Policy, Post, Tag, User};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{Identity, TokenPair};
use crate::state::AppState;

pub const BLOG_CREATE_REJECTED: &str = "A blog already exists for this user.";

/// A [`quill_core::Error`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {}", self.0);
            "A server error occurred.".to_string()
        } else {
            self.0.to_string()
        };
        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// JSON request body whose rejections are reported like any other
/// validation failure.
pub struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> ApiResult<Self> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Body(value)),
            Err(rejection) => Err(ApiError(Error::Validation {
                field: "body".to_string(),
                message: rejection.body_text(),
            })),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/blogs/", get(list_blogs).post(create_blog))
        .route(
            "/blogs/{id}/",
            get(get_blog)
                .put(replace_blog)
                .patch(update_blog)
                .delete(delete_blog),
        )
        .route("/posts/", get(list_posts).post(create_post))
        .route(
            "/posts/{id}/",
            get(get_post)
                .put(replace_post)
                .patch(update_post)
                .delete(delete_post),
        )
        .route("/tags/", get(list_tags).post(create_tag))
        .route("/tags/assign/", post(assign_tag))
        .route(
            "/tags/{id}/",
            get(get_tag)
                .put(replace_tag)
                .patch(update_tag)
                .delete(delete_tag),
        )
        .route("/register/", post(register))
        .route("/token/", post(obtain_token))
        .route("/token/refresh/", post(refresh_token))
        .route("/users/me/", get(me))
        .route("/users/{id}/", get(get_user))
}

/// Log one line per request.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    log::info!(
        "{method} {path} {} {}ms",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_blogs(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Blog>>> {
    let actor = identity.actor_for(Policy::OwnerOrAdmin)?;
    let blogs = state
        .store
        .run(move |conn| handlers::list_blogs(conn, &actor))
        .await?;
    Ok(Json(blogs))
}

/// Blogs are provisioned with the first post, never through this route.
async fn create_blog(identity: Identity) -> ApiResult<Response> {
    identity.actor_for(Policy::OwnerOrAdmin)?;
    Err(Error::PermissionDenied(BLOG_CREATE_REJECTED.to_string()).into())
}

async fn get_blog(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
) -> ApiResult<Json<Blog>> {
    let actor = identity.actor_for(Policy::OwnerOrAdmin)?;
    let blog = state
        .store
        .run(move |conn| handlers::get_blog(conn, &actor, id))
        .await?;
    Ok(Json(blog))
}

async fn replace_blog(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
    Body(input): Body<NewBlog>,
) -> ApiResult<Json<Blog>> {
    let changes = BlogChanges {
        title: Some(input.title),
        description: Some(input.description.unwrap_or_default()),
    };
    blog_changes(state, identity, id, changes).await
}

async fn update_blog(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
    Body(changes): Body<BlogChanges>,
) -> ApiResult<Json<Blog>> {
    blog_changes(state, identity, id, changes).await
}

async fn blog_changes(
    state: AppState,
    identity: Identity,
    id: Id,
    changes: BlogChanges,
) -> ApiResult<Json<Blog>> {
    let actor = identity.actor_for(Policy::OwnerOrAdmin)?;
    let blog = state
        .store
        .run(move |conn| handlers::update_blog(conn, &actor, id, changes))
        .await?;
    Ok(Json(blog))
}

async fn delete_blog(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    let actor = identity.actor_for(Policy::OwnerOrAdmin)?;
    state
        .store
        .run(move |conn| handlers::delete_blog(conn, &actor, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_posts(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Post>>> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let posts = state
        .store
        .run(move |conn| handlers::list_posts(conn, &actor))
        .await?;
    Ok(Json(posts))
}

async fn create_post(
    State(state): State<AppState>,
    identity: Identity,
    Body(input): Body<NewPost>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let provisioning = state.provisioning;
    let post = state
        .store
        .run(move |conn| handlers::create_post(conn, &actor, input, provisioning))
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
) -> ApiResult<Json<Post>> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let post = state
        .store
        .run(move |conn| handlers::get_post(conn, &actor, id))
        .await?;
    Ok(Json(post))
}

async fn replace_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
    Body(input): Body<NewPost>,
) -> ApiResult<Json<Post>> {
    let changes = PostChanges {
        title: Some(input.title),
        content: Some(input.content),
        image: Some(input.image.unwrap_or_default()),
        tag_ids: input.tag_ids,
    };
    post_changes(state, identity, id, changes).await
}

async fn update_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
    Body(changes): Body<PostChanges>,
) -> ApiResult<Json<Post>> {
    post_changes(state, identity, id, changes).await
}

async fn post_changes(
    state: AppState,
    identity: Identity,
    id: Id,
    changes: PostChanges,
) -> ApiResult<Json<Post>> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let post = state
        .store
        .run(move |conn| handlers::update_post(conn, &actor, id, changes))
        .await?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    state
        .store
        .run(move |conn| handlers::delete_post(conn, &actor, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tags(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Tag>>> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let tags = state
        .store
        .run(move |conn| handlers::list_tags(conn, &actor))
        .await?;
    Ok(Json(tags))
}

async fn create_tag(
    State(state): State<AppState>,
    identity: Identity,
    Body(input): Body<NewTag>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let provisioning = state.provisioning;
    let tag = state
        .store
        .run(move |conn| handlers::create_tag(conn, &actor, input, provisioning))
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn assign_tag(
    State(state): State<AppState>,
    identity: Identity,
    Body(input): Body<NewTag>,
) -> ApiResult<Json<Tag>> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let provisioning = state.provisioning;
    let tag = state
        .store
        .run(move |conn| handlers::assign_tag(conn, &actor, input, provisioning))
        .await?;
    Ok(Json(tag))
}

async fn get_tag(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
) -> ApiResult<Json<Tag>> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let tag = state
        .store
        .run(move |conn| handlers::get_tag(conn, &actor, id))
        .await?;
    Ok(Json(tag))
}

async fn replace_tag(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
    Body(input): Body<NewTag>,
) -> ApiResult<Json<Tag>> {
    let changes = TagChanges {
        name: Some(input.name),
        posts: Some(input.posts),
    };
    tag_changes(state, identity, id, changes).await
}

async fn update_tag(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
    Body(changes): Body<TagChanges>,
) -> ApiResult<Json<Tag>> {
    tag_changes(state, identity, id, changes).await
}

async fn tag_changes(
    state: AppState,
    identity: Identity,
    id: Id,
    changes: TagChanges,
) -> ApiResult<Json<Tag>> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    let tag = state
        .store
        .run(move |conn| handlers::update_tag(conn, &actor, id, changes))
        .await?;
    Ok(Json(tag))
}

async fn delete_tag(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    let actor = identity.actor_for(Policy::BlogOwnerOrAdmin)?;
    state
        .store
        .run(move |conn| handlers::delete_tag(conn, &actor, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn register(
    State(state): State<AppState>,
    Body(input): Body<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state
        .store
        .run(move |conn| handlers::register(conn, input))
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn obtain_token(
    State(state): State<AppState>,
    Body(credentials): Body<Credentials>,
) -> ApiResult<Json<TokenPair>> {
    let actor = state
        .store
        .run(move |conn| {
            handlers::authenticate(conn, &credentials.username, &credentials.password)
        })
        .await?;
    Ok(Json(state.tokens.issue_pair(&actor)?))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh: String,
}

#[derive(Serialize)]
struct AccessToken {
    access: String,
}

async fn refresh_token(
    State(state): State<AppState>,
    Body(request): Body<RefreshRequest>,
) -> ApiResult<Json<AccessToken>> {
    let access = state.tokens.refresh(&request.refresh)?;
    Ok(Json(AccessToken { access }))
}

async fn me(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<User>> {
    let actor = identity.actor_for(Policy::AuthenticatedOrReadOnlyOwner)?;
    let user = state
        .store
        .run(move |conn| handlers::get_user(conn, &actor, actor.id))
        .await?;
    Ok(Json(user))
}

async fn get_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Id>,
) -> ApiResult<Json<User>> {
    let actor = identity.actor_for(Policy::AuthenticatedOrReadOnlyOwner)?;
    let user = state
        .store
        .run(move |conn| handlers::get_user(conn, &actor, id))
        .await?;
    Ok(Json(user))
}
