//! Login, session restore and expiry, registration and profile.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use tempfile::TempDir;

use tienda_integration_tests::{MockBackend, TAZA, USER_EMAIL, USER_PASSWORD, USER_TOKEN};
use tienda_storefront::api::{PasswordChange, ProfileUpdate, Registration};
use tienda_storefront::notify::keys as notice;
use tienda_storefront::{ApiError, NoticeLog, StorefrontError};

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

#[tokio::test]
async fn test_login_persists_session() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();
    let notices = NoticeLog::new();

    let mut storefront = backend.storefront(dir.path(), &notices);
    let user = storefront
        .login(USER_EMAIL, secret(USER_PASSWORD))
        .await
        .unwrap();

    assert_eq!(user.name, "Ana");
    assert!(storefront.session().is_signed_in());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("token.json")).unwrap(),
        USER_TOKEN
    );
    assert_eq!(notices.keys(), vec![notice::SIGNED_IN]);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();
    let notices = NoticeLog::new();

    let mut storefront = backend.storefront(dir.path(), &notices);
    let err = storefront
        .login(USER_EMAIL, secret("incorrecta"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorefrontError::Network(ApiError::Unauthorized(ref message)) if message == "Credenciales inválidas"
    ));
    assert!(!storefront.session().is_signed_in());
    assert_eq!(notices.keys(), vec![notice::LOGIN_ERROR]);
    assert!(backend.requests_to("/api/carts").is_empty());
}

#[tokio::test]
async fn test_start_with_revoked_token_falls_back_to_local_cart() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();

    {
        let mut storefront = backend.storefront(dir.path(), &NoticeLog::new());
        storefront
            .login(USER_EMAIL, secret(USER_PASSWORD))
            .await
            .unwrap();
    }
    backend.revoke(USER_TOKEN);

    let notices = NoticeLog::new();
    let mut storefront = backend.storefront(dir.path(), &notices);
    let user = storefront.start().await.unwrap();

    assert!(user.is_none());
    assert!(!storefront.session().is_signed_in());
    assert!(storefront.cart().phase().is_anonymous());
    assert!(!dir.path().join("token.json").exists());
    assert_eq!(notices.keys(), vec![notice::SESSION_EXPIRED]);
}

#[tokio::test]
async fn test_rejected_token_ends_session_mid_use() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();
    let notices = NoticeLog::new();

    let mut storefront = backend.storefront(dir.path(), &notices);
    storefront
        .login(USER_EMAIL, secret(USER_PASSWORD))
        .await
        .unwrap();
    backend.revoke(USER_TOKEN);
    let _ = notices.drain();

    let err = storefront.orders().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!storefront.session().is_signed_in());
    assert!(storefront.cart().phase().is_anonymous());
    assert_eq!(notices.keys(), vec![notice::SESSION_EXPIRED]);
}

#[tokio::test]
async fn test_rejected_token_on_cart_change_ends_session() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();
    let notices = NoticeLog::new();

    let mut storefront = backend.storefront(dir.path(), &notices);
    storefront
        .login(USER_EMAIL, secret(USER_PASSWORD))
        .await
        .unwrap();
    let taza = storefront.api().product(TAZA).await.unwrap();
    backend.revoke(USER_TOKEN);
    let _ = notices.drain();

    let err = storefront.add_to_cart(taza, 1).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!storefront.session().is_signed_in());
    assert!(storefront.cart().phase().is_anonymous());
    assert!(!dir.path().join("token.json").exists());
    assert_eq!(
        notices.keys(),
        vec![notice::ADD_ERROR, notice::SESSION_EXPIRED]
    );
}

#[tokio::test]
async fn test_register_then_login() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();

    let mut storefront = backend.storefront(dir.path(), &NoticeLog::new());
    let registration = Registration::new(
        "Luis",
        "luis@example.com",
        secret("clave-segura"),
        Some("600123123"),
        None,
    )
    .unwrap();
    let message = storefront.register(&registration).await.unwrap();
    assert_eq!(message, "Usuario registrado correctamente");

    let user = storefront
        .login("luis@example.com", secret("clave-segura"))
        .await
        .unwrap();
    assert_eq!(user.name, "Luis");
    assert_eq!(user.phone.as_deref(), Some("600123123"));
}

#[tokio::test]
async fn test_duplicate_registration_is_reported() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();
    let notices = NoticeLog::new();

    let mut storefront = backend.storefront(dir.path(), &notices);
    let registration =
        Registration::new("Ana", USER_EMAIL, secret("otra-clave"), None, None).unwrap();
    let err = storefront.register(&registration).await.unwrap_err();

    assert!(matches!(
        err,
        StorefrontError::Network(ApiError::Status { status: 400, .. })
    ));
    assert_eq!(notices.keys(), vec![notice::REGISTER_ERROR]);
}

#[tokio::test]
async fn test_update_profile_returns_fresh_profile() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();

    let mut storefront = backend.storefront(dir.path(), &NoticeLog::new());
    storefront
        .login(USER_EMAIL, secret(USER_PASSWORD))
        .await
        .unwrap();

    let update = ProfileUpdate::new("Ana María", Some("600111222"), Some("Calle Sol 3")).unwrap();
    let user = storefront.update_profile(&update).await.unwrap();

    assert_eq!(user.name, "Ana María");
    assert_eq!(user.phone.as_deref(), Some("600111222"));
    assert_eq!(user.address.as_deref(), Some("Calle Sol 3"));
    assert_eq!(storefront.current_user().await.unwrap().name, "Ana María");
}

#[tokio::test]
async fn test_change_password() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();
    let notices = NoticeLog::new();

    let mut storefront = backend.storefront(dir.path(), &notices);
    storefront
        .login(USER_EMAIL, secret(USER_PASSWORD))
        .await
        .unwrap();
    let _ = notices.drain();

    let wrong =
        PasswordChange::new(secret("no-es-esta"), secret("nueva-clave"), &secret("nueva-clave"))
            .unwrap();
    let err = storefront.change_password(&wrong).await.unwrap_err();
    assert!(matches!(
        err,
        StorefrontError::Network(ApiError::Status { status: 400, .. })
    ));
    assert!(storefront.session().is_signed_in());

    let change = PasswordChange::new(
        secret(USER_PASSWORD),
        secret("nueva-clave"),
        &secret("nueva-clave"),
    )
    .unwrap();
    storefront.change_password(&change).await.unwrap();
    assert_eq!(
        notices.keys(),
        vec![notice::PASSWORD_ERROR, notice::PASSWORD_CHANGED]
    );

    storefront.logout().unwrap();
    storefront
        .login(USER_EMAIL, secret("nueva-clave"))
        .await
        .unwrap();
}
