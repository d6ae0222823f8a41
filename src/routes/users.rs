use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};

use crate::db::models::{PostWithAuthor, User};
use crate::db::pagination::{Page, PageLink};
use crate::db::{posts, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, PageContext};
use crate::flash::{self, Category};
use crate::forms::{self, AccountForm, FieldErrors};
use crate::routes::home::PageQuery;
use crate::routes::{Html, Layout};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/account.html")]
pub struct AccountTemplate {
    pub layout: Layout,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub form: AccountForm,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "pages/user_posts.html")]
pub struct UserPostsTemplate {
    pub layout: Layout,
    pub username: String,
    pub posts: Page<PostWithAuthor>,
    pub links: Vec<PageLink>,
}

pub fn picture_url(image_file: &str) -> String {
    format!("/static/profile_pics/{}", image_file)
}

fn account_page_with(
    ctx: &PageContext,
    user: &CurrentUser,
    form: AccountForm,
    errors: FieldErrors,
) -> AccountTemplate {
    AccountTemplate {
        layout: ctx.layout("Account"),
        username: user.username.clone(),
        email: user.email.clone(),
        image_url: picture_url(&user.image_file),
        form,
        errors,
    }
}

pub async fn account_page(user: CurrentUser, ctx: PageContext) -> Html<AccountTemplate> {
    let form = AccountForm {
        username: user.username.clone(),
        email: user.email.clone(),
        picture: None,
    };
    Html(account_page_with(&ctx, &user, form, FieldErrors::new()))
}

/// Collect the multipart account form. An empty file input counts as no picture.
async fn read_account_form(mut multipart: Multipart) -> AppResult<AccountForm> {
    let mut form = AccountForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" | "email" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if name == "username" {
                    form.username = value.trim().to_string();
                } else {
                    form.email = value.trim().to_string();
                }
            }
            "picture" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !file_name.is_empty() && !data.is_empty() {
                    form.picture = Some((file_name, data.to_vec()));
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Field errors for a username or email already held by someone else.
fn taken_errors(state: &AppState, user: &CurrentUser, form: &AccountForm) -> AppResult<FieldErrors> {
    let mut errors = FieldErrors::new();
    if form.username != user.username
        && users::find_by_username(&state.db, &form.username)?.is_some()
    {
        errors.add("username", forms::USERNAME_TAKEN);
    }
    if form.email != user.email && users::find_by_email(&state.db, &form.email)?.is_some() {
        errors.add("email", forms::EMAIL_TAKEN);
    }
    Ok(errors)
}

pub async fn update_account(
    State(state): State<AppState>,
    user: CurrentUser,
    ctx: PageContext,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut form = read_account_form(multipart).await?;

    let mut errors = forms::validate_account(&form);
    if errors.is_empty() {
        errors = taken_errors(&state, &user, &form)?;
    }
    if !errors.is_empty() {
        form.picture = None;
        return Ok(Html(account_page_with(&ctx, &user, form, errors)).into_response());
    }

    let mut image_file = user.image_file.clone();
    if let Some((file_name, data)) = form.picture.take() {
        match state.pictures.save(&file_name, data).await {
            Ok(stored) => image_file = stored,
            Err(AppError::Image(e)) => {
                tracing::warn!(user_id = user.id, error = %e, "unreadable profile picture");
                errors.add("picture", "The file could not be read as an image.");
                return Ok(Html(account_page_with(&ctx, &user, form, errors)).into_response());
            }
            Err(e) => return Err(e),
        }
    }

    match apply_profile(&state, &user, &form, &image_file).await {
        Ok(_) => {}
        Err(err @ (AppError::DuplicateUsername | AppError::DuplicateEmail)) => {
            let (field, message) = match err {
                AppError::DuplicateUsername => ("username", forms::USERNAME_TAKEN),
                _ => ("email", forms::EMAIL_TAKEN),
            };
            errors.add(field, message);
            return Ok(Html(account_page_with(&ctx, &user, form, errors)).into_response());
        }
        Err(e) => return Err(e),
    }

    tracing::info!(user_id = user.id, "account updated");
    Ok(flash::redirect(
        "/account",
        Category::Success,
        "Your account has been updated!",
    ))
}

/// Store the new profile, then remove whichever picture is no longer referenced:
/// the old one on success, the freshly saved one on any failure.
async fn apply_profile(
    state: &AppState,
    user: &CurrentUser,
    form: &AccountForm,
    image_file: &str,
) -> AppResult<User> {
    match users::update_profile(&state.db, user.id, &form.username, &form.email, image_file) {
        Ok(updated) => {
            if updated.image_file != user.image_file {
                discard_picture(state, &user.image_file).await;
            }
            Ok(updated)
        }
        Err(e) => {
            if image_file != user.image_file {
                discard_picture(state, image_file).await;
            }
            Err(e)
        }
    }
}

/// The profile row is authoritative; a leftover file is only logged.
async fn discard_picture(state: &AppState, name: &str) {
    if let Err(e) = state.pictures.delete(name).await {
        tracing::warn!(picture = name, error = %e, "failed to remove profile picture");
    }
}

pub async fn user_posts(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<UserPostsTemplate>> {
    let author = users::find_by_username(&state.db, &username)?.ok_or(AppError::NotFound)?;
    let posts = posts::list_posts_by_author(&state.db, author.id, query.number())?;
    let links = posts.links();
    Ok(Html(UserPostsTemplate {
        layout: ctx.layout(author.username.clone()),
        username: author.username,
        posts,
        links,
    }))
}
