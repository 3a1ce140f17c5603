//! GraphQL adapter.
//!
//! Queries require a logged-in caller and fail with a GraphQL error
//! otherwise. Mutations never fail for business reasons: they return a
//! payload of `{ data, errors, message }` where `errors` holds the
//! human-readable failures. Only unexpected faults surface as GraphQL
//! errors.

use async_graphql::{
    Context, EmptySubscription, Object, OutputType, Result as GqlResult, Schema, SimpleObject,
};
use chrono::{DateTime, Utc};
use quill_core::db::Connection;
use quill_core::handlers;
use quill_core::models::{
    BlogChanges, NewBlog, NewPost, NewTag, NewUser, PostChanges, TagChanges, UserRef,
};
use quill_core::{Actor, Blog, Error, Id, Post, Tag, TagRef, User};

use crate::auth::Identity;
use crate::state::AppState;

pub const LOGIN_REQUIRED: &str = "You must be logged in to use GraphQL.";

pub type QuillSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(state: AppState) -> QuillSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(state)
        .finish()
}

#[derive(SimpleObject)]
#[graphql(name = "UserRef")]
pub struct UserRefNode {
    pub id: Id,
    pub username: String,
}

impl From<UserRef> for UserRefNode {
    fn from(user: UserRef) -> Self {
        UserRefNode {
            id: user.id,
            username: user.username,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Blog")]
pub struct BlogNode {
    pub id: Id,
    pub user: UserRefNode,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Blog> for BlogNode {
    fn from(blog: Blog) -> Self {
        BlogNode {
            id: blog.id,
            user: blog.user.into(),
            title: blog.title,
            description: blog.description,
            created_at: blog.created_at,
            updated_at: blog.updated_at,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "TagRef")]
pub struct TagRefNode {
    pub id: Id,
    pub name: String,
}

impl From<TagRef> for TagRefNode {
    fn from(tag: TagRef) -> Self {
        TagRefNode {
            id: tag.id,
            name: tag.name,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Post")]
pub struct PostNode {
    pub id: Id,
    pub blog_id: Id,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<TagRefNode>,
}

impl From<Post> for PostNode {
    fn from(post: Post) -> Self {
        PostNode {
            id: post.id,
            blog_id: post.blog_id,
            title: post.title,
            content: post.content,
            image: post.image,
            created_at: post.created_at,
            updated_at: post.updated_at,
            tags: post.tags.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Tag")]
pub struct TagNode {
    pub id: Id,
    pub blog_id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub post_ids: Vec<Id>,
}

impl From<Tag> for TagNode {
    fn from(tag: Tag) -> Self {
        TagNode {
            id: tag.id,
            blog_id: tag.blog_id,
            name: tag.name,
            created_at: tag.created_at,
            updated_at: tag.updated_at,
            post_ids: tag.posts,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "User")]
pub struct UserNode {
    pub id: Id,
    pub username: String,
    pub email: Option<String>,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub permissions: Vec<String>,
}

impl From<User> for UserNode {
    fn from(user: User) -> Self {
        UserNode {
            id: user.id,
            username: user.username,
            email: user.email,
            is_superuser: user.is_superuser,
            is_staff: user.is_staff,
            date_joined: user.created_at,
            permissions: user.permissions,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Deleted")]
pub struct DeletedNode {
    pub id: Id,
}

#[derive(SimpleObject)]
#[graphql(name = "Tokens")]
pub struct TokensNode {
    pub access: String,
    pub refresh: String,
}

#[derive(SimpleObject)]
#[graphql(name = "AccessToken")]
pub struct AccessTokenNode {
    pub access: String,
}

/// Result of a mutation.
#[derive(SimpleObject)]
#[graphql(concrete(name = "BlogPayload", params(BlogNode)))]
#[graphql(concrete(name = "PostPayload", params(PostNode)))]
#[graphql(concrete(name = "TagPayload", params(TagNode)))]
#[graphql(concrete(name = "UserPayload", params(UserNode)))]
#[graphql(concrete(name = "DeletePayload", params(DeletedNode)))]
#[graphql(concrete(name = "TokenPayload", params(TokensNode)))]
#[graphql(concrete(name = "RefreshPayload", params(AccessTokenNode)))]
pub struct Payload<T: OutputType> {
    pub data: Option<T>,
    pub errors: Vec<String>,
    pub message: Option<String>,
}

impl<T: OutputType> Payload<T> {
    fn ok(data: T, message: &str) -> Self {
        Payload {
            data: Some(data),
            errors: Vec::new(),
            message: Some(message.to_string()),
        }
    }

    fn failed(err: Error) -> Self {
        Payload {
            data: None,
            errors: vec![err.to_string()],
            message: None,
        }
    }
}

/// Business failures go into the payload; anything else is a fault.
fn payload<T, N>(result: quill_core::Result<T>, message: &str) -> GqlResult<Payload<N>>
where
    N: OutputType + From<T>,
{
    match result {
        Ok(value) => Ok(Payload::ok(value.into(), message)),
        Err(err) if err.is_business() => Ok(Payload::failed(err)),
        Err(err) => {
            log::error!("mutation failed: {err}");
            Err(err.into())
        }
    }
}

fn caller(ctx: &Context<'_>) -> Option<Actor> {
    ctx.data_opt::<Identity>().and_then(|identity| identity.0.clone())
}

fn logged_in(ctx: &Context<'_>) -> GqlResult<Actor> {
    caller(ctx).ok_or_else(|| LOGIN_REQUIRED.into())
}

/// Run `f` as the caller, or fail with authentication-required.
async fn as_caller<T, F>(ctx: &Context<'_>, f: F) -> quill_core::Result<T>
where
    F: FnOnce(&mut Connection, &Actor) -> quill_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = ctx
        .data::<AppState>()
        .map_err(|e| Error::Internal(e.message))?;
    let actor = caller(ctx).ok_or(Error::AuthenticationRequired)?;
    state.store.run(move |conn| f(conn, &actor)).await
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn all_blogs(&self, ctx: &Context<'_>) -> GqlResult<Vec<BlogNode>> {
        let state = ctx.data::<AppState>()?;
        let actor = logged_in(ctx)?;
        let blogs = state
            .store
            .run(move |conn| handlers::list_blogs(conn, &actor))
            .await?;
        Ok(blogs.into_iter().map(Into::into).collect())
    }

    async fn all_posts(&self, ctx: &Context<'_>) -> GqlResult<Vec<PostNode>> {
        let state = ctx.data::<AppState>()?;
        let actor = logged_in(ctx)?;
        let posts = state
            .store
            .run(move |conn| handlers::list_posts(conn, &actor))
            .await?;
        Ok(posts.into_iter().map(Into::into).collect())
    }

    async fn all_tags(&self, ctx: &Context<'_>) -> GqlResult<Vec<TagNode>> {
        let state = ctx.data::<AppState>()?;
        let actor = logged_in(ctx)?;
        let tags = state
            .store
            .run(move |conn| handlers::list_tags(conn, &actor))
            .await?;
        Ok(tags.into_iter().map(Into::into).collect())
    }

    async fn me(&self, ctx: &Context<'_>) -> GqlResult<UserNode> {
        let state = ctx.data::<AppState>()?;
        let actor = logged_in(ctx)?;
        let user = state
            .store
            .run(move |conn| handlers::get_user(conn, &actor, actor.id))
            .await?;
        Ok(user.into())
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_blog(
        &self,
        ctx: &Context<'_>,
        title: String,
        description: Option<String>,
    ) -> GqlResult<Payload<BlogNode>> {
        let input = NewBlog { title, description };
        let result = as_caller(ctx, move |conn, actor| {
            handlers::create_blog(conn, actor, input)
        })
        .await;
        payload(result, "Blog created.")
    }

    async fn update_blog(
        &self,
        ctx: &Context<'_>,
        id: Id,
        title: Option<String>,
        description: Option<String>,
    ) -> GqlResult<Payload<BlogNode>> {
        let changes = BlogChanges { title, description };
        let result = as_caller(ctx, move |conn, actor| {
            handlers::update_blog(conn, actor, id, changes)
        })
        .await;
        payload(result, "Blog updated.")
    }

    async fn create_post(
        &self,
        ctx: &Context<'_>,
        title: String,
        content: String,
        image: Option<String>,
        tag_ids: Option<Vec<Id>>,
    ) -> GqlResult<Payload<PostNode>> {
        let provisioning = ctx.data::<AppState>()?.provisioning;
        let input = NewPost {
            title,
            content,
            image,
            tag_ids,
        };
        let result = as_caller(ctx, move |conn, actor| {
            handlers::create_post(conn, actor, input, provisioning)
        })
        .await;
        payload(result, "Post created.")
    }

    async fn update_post(
        &self,
        ctx: &Context<'_>,
        id: Id,
        title: Option<String>,
        content: Option<String>,
        image: Option<String>,
        tag_ids: Option<Vec<Id>>,
    ) -> GqlResult<Payload<PostNode>> {
        let changes = PostChanges {
            title,
            content,
            image,
            tag_ids,
        };
        let result = as_caller(ctx, move |conn, actor| {
            handlers::update_post(conn, actor, id, changes)
        })
        .await;
        payload(result, "Post updated.")
    }

    async fn delete_post(&self, ctx: &Context<'_>, id: Id) -> GqlResult<Payload<DeletedNode>> {
        let result = as_caller(ctx, move |conn, actor| {
            handlers::delete_post(conn, actor, id).map(|()| DeletedNode { id })
        })
        .await;
        payload(result, "Post deleted.")
    }

    async fn create_tag(
        &self,
        ctx: &Context<'_>,
        name: String,
        post_ids: Vec<Id>,
    ) -> GqlResult<Payload<TagNode>> {
        let provisioning = ctx.data::<AppState>()?.provisioning;
        let input = NewTag {
            name,
            posts: post_ids,
        };
        let result = as_caller(ctx, move |conn, actor| {
            handlers::create_tag(conn, actor, input, provisioning)
        })
        .await;
        payload(result, "Tag created.")
    }

    async fn assign_tag(
        &self,
        ctx: &Context<'_>,
        name: String,
        post_ids: Vec<Id>,
    ) -> GqlResult<Payload<TagNode>> {
        let provisioning = ctx.data::<AppState>()?.provisioning;
        let input = NewTag {
            name,
            posts: post_ids,
        };
        let result = as_caller(ctx, move |conn, actor| {
            handlers::assign_tag(conn, actor, input, provisioning)
        })
        .await;
        payload(result, "Tag assigned.")
    }

    async fn update_tag(
        &self,
        ctx: &Context<'_>,
        id: Id,
        name: Option<String>,
        post_ids: Option<Vec<Id>>,
    ) -> GqlResult<Payload<TagNode>> {
        let changes = TagChanges {
            name,
            posts: post_ids,
        };
        let result = as_caller(ctx, move |conn, actor| {
            handlers::update_tag(conn, actor, id, changes)
        })
        .await;
        payload(result, "Tag updated.")
    }

    async fn delete_tag(&self, ctx: &Context<'_>, id: Id) -> GqlResult<Payload<DeletedNode>> {
        let result = as_caller(ctx, move |conn, actor| {
            handlers::delete_tag(conn, actor, id).map(|()| DeletedNode { id })
        })
        .await;
        payload(result, "Tag deleted.")
    }

    async fn register_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        email: Option<String>,
        password: String,
    ) -> GqlResult<Payload<UserNode>> {
        let state = ctx.data::<AppState>()?;
        let input = NewUser {
            username,
            email,
            password,
        };
        let result = state
            .store
            .run(move |conn| handlers::register(conn, input))
            .await;
        payload(result, "User registered.")
    }

    async fn login_token_auth(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> GqlResult<Payload<TokensNode>> {
        let state = ctx.data::<AppState>()?;
        let result = state
            .store
            .run(move |conn| handlers::authenticate(conn, &username, &password))
            .await
            .and_then(|actor| state.tokens.issue_pair(&actor))
            .map(|pair| TokensNode {
                access: pair.access,
                refresh: pair.refresh,
            });
        payload(result, "Logged in.")
    }

    async fn refresh_token(
        &self,
        ctx: &Context<'_>,
        refresh: String,
    ) -> GqlResult<Payload<AccessTokenNode>> {
        let state = ctx.data::<AppState>()?;
        let result = state
            .tokens
            .refresh(&refresh)
            .map(|access| AccessTokenNode { access });
        payload(result, "Token refreshed.")
    }
}
