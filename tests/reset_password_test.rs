mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Duration;
use common::*;
use inkpost::flash::{Category, Flash};

const NEW_PASSWORD: &str = "N3w(pass";

/// Pull the reset path out of the mailed link.
fn reset_path(html: &str) -> String {
    let start = html.find("http://inkpost.test").expect("link in mail") + "http://inkpost.test".len();
    let end = html[start..].find('"').unwrap() + start;
    html[start..end].to_string()
}

#[tokio::test]
async fn request_for_unknown_email_shows_field_error() {
    let app = TestApp::new();

    let response = app
        .post_form("/reset_password", &[("email", "ghost@example.com")], None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("There is no account with that email. Please register first."));
    assert!(app.wait_for_mail(1).await.is_empty());
}

#[tokio::test]
async fn full_reset_round_trip() {
    let app = TestApp::new();
    app.create_user("ana", "ana@example.com", PASSWORD);

    let response = app
        .post_form("/reset_password", &[("email", "ana@example.com")], None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(
        flashes(&response),
        vec![Flash::new(
            Category::Info,
            "An email has been sent with instructions to reset your password"
        )]
    );

    let mail = app.wait_for_mail(1).await;
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].to, "ana@example.com");
    assert_eq!(mail[0].subject, "Request to Reset Password");
    let path = reset_path(&mail[0].html);
    assert!(path.starts_with("/reset_password/"), "{path}");

    let response = app.get(&path, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_form(
            &path,
            &[("password", NEW_PASSWORD), ("confirm_password", NEW_PASSWORD)],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(
        flashes(&response),
        vec![Flash::new(
            Category::Success,
            "Your password has been successfully reset"
        )]
    );

    // Only the new password works now.
    let response = app
        .post_form(
            "/login",
            &[("email", "ana@example.com"), ("password", PASSWORD)],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    app.login("ana@example.com", NEW_PASSWORD).await;
}

#[tokio::test]
async fn weak_new_password_is_rejected() {
    let app = TestApp::new();
    let user = app.create_user("ana", "ana@example.com", PASSWORD);
    let token = app.state.tokens.issue(user.id, Duration::minutes(30));
    let path = format!("/reset_password/{}", token);

    let response = app
        .post_form(
            &path,
            &[("password", "weakpass"), ("confirm_password", "weakpass")],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_form(
            &path,
            &[("password", NEW_PASSWORD), ("confirm_password", "N3w(pasS")],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response)
        .await
        .contains("Field must be equal to password."));

    app.login("ana@example.com", PASSWORD).await;
}

#[tokio::test]
async fn bad_or_expired_tokens_send_user_back() {
    let app = TestApp::new();
    let user = app.create_user("ana", "ana@example.com", PASSWORD);
    let expired = app.state.tokens.issue(user.id, Duration::seconds(-1));

    let mut forged = app.state.tokens.issue(user.id, Duration::minutes(30));
    let last = forged.pop().unwrap();
    forged.push(if last == 'A' { 'B' } else { 'A' });

    for token in [expired.as_str(), forged.as_str(), "garbage"] {
        let path = format!("/reset_password/{}", token);
        for response in [
            app.get(&path, None).await,
            app.post_form(
                &path,
                &[("password", NEW_PASSWORD), ("confirm_password", NEW_PASSWORD)],
                None,
            )
            .await,
        ] {
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), "/reset_password");
            assert_eq!(
                flashes(&response),
                vec![Flash::new(
                    Category::Warning,
                    "The token is invalid or has expired. Please reset your password again."
                )]
            );
        }
    }

    app.login("ana@example.com", PASSWORD).await;
}

#[tokio::test]
async fn signed_in_users_cannot_reset() {
    let app = TestApp::new();
    let user = app.create_user("ana", "ana@example.com", PASSWORD);
    let cookie = app.login("ana@example.com", PASSWORD).await;
    let token = app.state.tokens.issue(user.id, Duration::minutes(30));

    let response = app.get("/reset_password", Some(&cookie)).await;
    assert_eq!(location(&response), "/");
    assert_eq!(
        flashes(&response),
        vec![Flash::new(
            Category::Warning,
            "Log out before requesting a password reset."
        )]
    );

    let response = app
        .get(&format!("/reset_password/{}", token), Some(&cookie))
        .await;
    assert_eq!(location(&response), "/");
    assert_eq!(
        flashes(&response),
        vec![Flash::new(
            Category::Warning,
            "Log out before resetting your password."
        )]
    );
}

#[tokio::test]
async fn mail_failure_does_not_fail_the_request() {
    let recorder = Arc::new(RecordingMailer::default());
    let app = TestApp::with_mailer(Arc::new(FailingMailer), recorder);
    app.create_user("ana", "ana@example.com", PASSWORD);

    let response = app
        .post_form("/reset_password", &[("email", "ana@example.com")], None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}
