use askama::Template;
use axum::extract::{Form, Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::auth::guard::{login_location, safe_next};
use crate::auth::session;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie_value, MaybeUser, PageContext};
use crate::flash::{self, Category, Flash};
use crate::forms::{
    self, FieldErrors, LoginForm, RegistrationForm, RequestResetForm, ResetPasswordForm,
};
use crate::mail;
use crate::routes::{Html, Layout};
use crate::state::AppState;

const LOGIN_FAILED: &str = "Unable to log in. Please check your email and password.";
const BAD_TOKEN: &str = "The token is invalid or has expired. Please reset your password again.";

// -- Templates --

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub form: RegistrationForm,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub action: String,
    pub email: String,
    pub remember: bool,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "pages/reset_request.html")]
pub struct ResetRequestTemplate {
    pub layout: Layout,
    pub email: String,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "pages/reset_token.html")]
pub struct ResetTokenTemplate {
    pub layout: Layout,
    pub action: String,
    pub errors: FieldErrors,
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

impl NextQuery {
    fn target(&self) -> Option<&str> {
        safe_next(self.next.as_deref())
    }
}

// -- Cookie helpers --

/// Without `max_age_hours` the cookie ends with the browser session.
fn session_cookie(name: &str, token: &str, max_age_hours: Option<u64>) -> String {
    let mut cookie = format!("{}={}; HttpOnly; SameSite=Strict; Path=/", name, token);
    if let Some(hours) = max_age_hours {
        cookie.push_str(&format!("; Max-Age={}", hours * 3600));
    }
    cookie
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

/// Base URL for links in outgoing mail: the configured public URL, else the request's host.
fn public_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = state.config.server.public_url.as_deref() {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("localhost:{}", state.config.server.port));
    format!("http://{}", host)
}

// -- Registration --

pub async fn register_page(ctx: PageContext) -> Html<RegisterTemplate> {
    Html(RegisterTemplate {
        layout: ctx.layout("Register"),
        form: RegistrationForm::default(),
        errors: FieldErrors::new(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    ctx: PageContext,
    Form(mut form): Form<RegistrationForm>,
) -> AppResult<Response> {
    form.username = form.username.trim().to_string();
    form.email = form.email.trim().to_string();

    let mut errors = forms::validate_registration(&form);
    if users::find_by_username(&state.db, &form.username)?.is_some() {
        errors.add("username", forms::USERNAME_TAKEN);
    }
    if users::find_by_email(&state.db, &form.email)?.is_some() {
        errors.add("email", forms::EMAIL_TAKEN);
    }

    if errors.is_empty() {
        let hash = state.hasher.hash_blocking(form.password.clone()).await?;
        match users::create_user(&state.db, &form.username, &form.email, &hash) {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "account created");
                return Ok(flash::redirect(
                    "/login",
                    Category::Success,
                    format!("Account created for {}.", user.username),
                ));
            }
            Err(AppError::DuplicateUsername) => errors.add("username", forms::USERNAME_TAKEN),
            Err(AppError::DuplicateEmail) => errors.add("email", forms::EMAIL_TAKEN),
            Err(e) => return Err(e),
        }
    }

    form.password.clear();
    form.confirm_password.clear();
    Ok(Html(RegisterTemplate {
        layout: ctx.layout("Register"),
        form,
        errors,
    })
    .into_response())
}

// -- Login / logout --

fn login_action(query: &NextQuery) -> String {
    match query.target() {
        Some(next) => login_location(next),
        None => "/login".to_string(),
    }
}

pub async fn login_page(ctx: PageContext, Query(query): Query<NextQuery>) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        layout: ctx.layout("Login"),
        action: login_action(&query),
        email: String::new(),
        remember: false,
        errors: FieldErrors::new(),
    })
}

pub async fn login(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let email = form.email.trim().to_string();
    let errors = forms::validate_login(&LoginForm {
        email: email.clone(),
        ..form.clone()
    });

    let render = |layout: Layout, errors: FieldErrors| {
        Html(LoginTemplate {
            layout,
            action: login_action(&query),
            email: email.clone(),
            remember: form.remember(),
            errors,
        })
        .into_response()
    };

    if !errors.is_empty() {
        return Ok(render(ctx.layout("Login"), errors));
    }

    let user = users::find_by_email(&state.db, &email)?;
    let authenticated = match &user {
        Some(user) => {
            state
                .hasher
                .verify_blocking(user.password_hash.clone(), form.password.clone())
                .await
        }
        None => false,
    };

    let Some(user) = user.filter(|_| authenticated) else {
        tracing::warn!(%email, "login failed");
        let mut layout = ctx.layout("Login");
        layout.flashes.push(Flash::new(Category::Danger, LOGIN_FAILED));
        return Ok(render(layout, FieldErrors::new()));
    };

    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, user.id, hours)?;
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        form.remember().then_some(hours),
    );
    tracing::info!(user_id = user.id, remember = form.remember(), "logged in");

    let target = query.target().unwrap_or("/").to_string();
    let notice = Flash::new(Category::Success, "Successfully logged in");
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, cookie),
            (header::SET_COOKIE, flash::set_cookie(&[notice])),
        ]),
        Redirect::to(&target),
    )
        .into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = cookie_value(&headers, cookie_name) {
        session::delete_session(&state.db, token)?;
    }
    Ok((
        [(header::SET_COOKIE, clear_session_cookie(cookie_name))],
        Redirect::to("/"),
    )
        .into_response())
}

// -- Password reset --

pub async fn reset_request_page(
    MaybeUser(user): MaybeUser,
    ctx: PageContext,
) -> Response {
    if user.is_some() {
        return flash::redirect(
            "/",
            Category::Warning,
            "Log out before requesting a password reset.",
        );
    }
    Html(ResetRequestTemplate {
        layout: ctx.layout("Reset Password"),
        email: String::new(),
        errors: FieldErrors::new(),
    })
    .into_response()
}

pub async fn reset_request(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    ctx: PageContext,
    headers: HeaderMap,
    Form(form): Form<RequestResetForm>,
) -> AppResult<Response> {
    if current.is_some() {
        return Ok(flash::redirect(
            "/",
            Category::Warning,
            "Log out before requesting a password reset.",
        ));
    }

    let email = form.email.trim().to_string();
    let mut errors = forms::validate_reset_request(&RequestResetForm {
        email: email.clone(),
    });
    let user = if errors.is_empty() {
        users::find_by_email(&state.db, &email)?
    } else {
        None
    };

    let Some(user) = user else {
        if errors.is_empty() {
            errors.add("email", forms::NO_SUCH_ACCOUNT);
        }
        return Ok(Html(ResetRequestTemplate {
            layout: ctx.layout("Reset Password"),
            email,
            errors,
        })
        .into_response());
    };

    let token = state.tokens.issue(user.id, state.tokens.default_ttl());
    let reset_url = format!("{}/reset_password/{}", public_base(&state, &headers), token);
    mail::send_detached(
        state.mailer.clone(),
        mail::reset_email(&user.username, &user.email, &reset_url)?,
    );
    tracing::info!(user_id = user.id, "password reset requested");

    Ok(flash::redirect(
        "/login",
        Category::Info,
        "An email has been sent with instructions to reset your password",
    ))
}

pub async fn reset_token_page(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    ctx: PageContext,
    Path(token): Path<String>,
) -> AppResult<Response> {
    if current.is_some() {
        return Ok(flash::redirect(
            "/",
            Category::Warning,
            "Log out before resetting your password.",
        ));
    }
    if state.tokens.verify(&state.db, &token)?.is_none() {
        return Ok(flash::redirect("/reset_password", Category::Warning, BAD_TOKEN));
    }
    Ok(Html(ResetTokenTemplate {
        layout: ctx.layout("Reset Password"),
        action: format!("/reset_password/{}", token),
        errors: FieldErrors::new(),
    })
    .into_response())
}

pub async fn reset_token(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    ctx: PageContext,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> AppResult<Response> {
    if current.is_some() {
        return Ok(flash::redirect(
            "/",
            Category::Warning,
            "Log out before resetting your password.",
        ));
    }
    let Some(user) = state.tokens.verify(&state.db, &token)? else {
        tracing::warn!("password reset attempted with a bad token");
        return Ok(flash::redirect("/reset_password", Category::Warning, BAD_TOKEN));
    };

    let errors = forms::validate_reset_password(&form);
    if !errors.is_empty() {
        return Ok(Html(ResetTokenTemplate {
            layout: ctx.layout("Reset Password"),
            action: format!("/reset_password/{}", token),
            errors,
        })
        .into_response());
    }

    let hash = state.hasher.hash_blocking(form.password).await?;
    users::update_password(&state.db, user.id, &hash)?;
    tracing::info!(user_id = user.id, "password reset");

    Ok(flash::redirect(
        "/login",
        Category::Success,
        "Your password has been successfully reset",
    ))
}
