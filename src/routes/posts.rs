use askama::Template;
use axum::extract::{Form, Path, State};
use axum::response::{IntoResponse, Response};

use crate::db::models::PostWithAuthor;
use crate::db::posts;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, PageContext};
use crate::flash::{self, Category};
use crate::forms::{self, FieldErrors, PostForm};
use crate::routes::{Html, Layout};
use crate::state::AppState;

/// Shared by the create and edit pages.
#[derive(Template)]
#[template(path = "pages/create_post.html")]
pub struct PostFormTemplate {
    pub layout: Layout,
    pub legend: &'static str,
    pub action: String,
    pub form: PostForm,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub layout: Layout,
    pub post: PostWithAuthor,
    pub is_author: bool,
}

fn new_post_page(ctx: &PageContext, form: PostForm, errors: FieldErrors) -> PostFormTemplate {
    PostFormTemplate {
        layout: ctx.layout("New Post"),
        legend: "New Post",
        action: "/post/new".to_string(),
        form,
        errors,
    }
}

fn edit_post_page(
    ctx: &PageContext,
    id: i64,
    form: PostForm,
    errors: FieldErrors,
) -> PostFormTemplate {
    PostFormTemplate {
        layout: ctx.layout("Update Post"),
        legend: "Update Post",
        action: format!("/post/{}/update", id),
        form,
        errors,
    }
}

/// Load a post the caller is allowed to change.
fn owned_post(state: &AppState, id: i64, user: &CurrentUser) -> AppResult<PostWithAuthor> {
    let post = posts::find_post(&state.db, id)?;
    if post.user_id != user.id {
        tracing::warn!(post_id = id, user_id = user.id, "refused change to another author's post");
        return Err(AppError::Forbidden);
    }
    Ok(post)
}

pub async fn new_page(ctx: PageContext) -> Html<PostFormTemplate> {
    Html(new_post_page(&ctx, PostForm::default(), FieldErrors::new()))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: PageContext,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let errors = forms::validate_post(&form);
    if !errors.is_empty() {
        return Ok(Html(new_post_page(&ctx, form, errors)).into_response());
    }

    let post = posts::create_post(&state.db, user.id, &form.title, &form.content)?;
    tracing::info!(post_id = post.id, user_id = user.id, "post created");
    Ok(flash::redirect("/", Category::Success, "Your post has been created"))
}

pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<i64>,
) -> AppResult<Html<PostTemplate>> {
    let post = posts::find_post(&state.db, id)?;
    let is_author = ctx.user.as_ref().is_some_and(|u| u.id == post.user_id);
    Ok(Html(PostTemplate {
        layout: ctx.layout(post.title.clone()),
        post,
        is_author,
    }))
}

pub async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: PageContext,
    Path(id): Path<i64>,
) -> AppResult<Html<PostFormTemplate>> {
    let post = owned_post(&state, id, &user)?;
    let form = PostForm {
        title: post.title,
        content: post.content,
    };
    Ok(Html(edit_post_page(&ctx, id, form, FieldErrors::new())))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: PageContext,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    owned_post(&state, id, &user)?;

    let errors = forms::validate_post(&form);
    if !errors.is_empty() {
        return Ok(Html(edit_post_page(&ctx, id, form, errors)).into_response());
    }

    posts::update_post(&state.db, id, &form.title, &form.content)?;
    tracing::info!(post_id = id, user_id = user.id, "post updated");
    Ok(flash::redirect(
        &format!("/post/{}", id),
        Category::Success,
        "Your post has been updated!",
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    owned_post(&state, id, &user)?;
    posts::delete_post(&state.db, id)?;
    tracing::info!(post_id = id, user_id = user.id, "post deleted");
    Ok(flash::redirect("/", Category::Success, "Your post has been deleted!"))
}
