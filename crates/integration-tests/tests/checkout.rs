//! Order placement and history.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use tempfile::TempDir;

use tienda_core::{OrderStatus, PaymentMethod, ProductId};
use tienda_integration_tests::{CUENCO, MockBackend, TAZA, USER_EMAIL, USER_PASSWORD, USER_TOKEN};
use tienda_storefront::notify::keys as notice;
use tienda_storefront::{NoticeLog, Storefront, StorefrontError, ValidationError};

async fn signed_in(backend: &MockBackend, dir: &TempDir, notices: &NoticeLog) -> Storefront {
    let mut storefront = backend.storefront(dir.path(), notices);
    storefront
        .login(USER_EMAIL, SecretString::from(USER_PASSWORD.to_string()))
        .await
        .unwrap();
    storefront
}

async fn add(storefront: &mut Storefront, id: ProductId, quantity: i64) {
    let product = storefront.api().product(id).await.unwrap();
    storefront.add_to_cart(product, quantity).await.unwrap();
}

#[tokio::test]
async fn test_checkout_places_order_and_empties_cart() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();
    let notices = NoticeLog::new();

    let mut storefront = signed_in(&backend, &dir, &notices).await;
    add(&mut storefront, TAZA, 2).await;
    add(&mut storefront, CUENCO, 1).await;
    let _ = notices.drain();

    let order = storefront
        .checkout("Calle Mayor 1", PaymentMethod::Paypal)
        .await
        .unwrap();

    assert_eq!(order.total.to_string(), "$31.75");
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.payment_method, PaymentMethod::Paypal);
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(storefront.cart().items().is_empty());
    assert!(backend.cart_of(USER_TOKEN).is_empty());
    assert_eq!(
        notices.keys(),
        vec![notice::ORDER_PLACED, notice::CLEAR_SUCCESS]
    );

    let orders = storefront.orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders.first().map(|o| o.id), Some(order.id));
}

#[tokio::test]
async fn test_empty_cart_is_refused_before_any_request() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();
    let notices = NoticeLog::new();

    let mut storefront = signed_in(&backend, &dir, &notices).await;
    let err = storefront
        .checkout("Calle Mayor 1", PaymentMethod::Card)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorefrontError::Validation(ValidationError::EmptyCart)
    ));
    assert!(backend.requests_to("/api/pedidos").is_empty());
    assert_eq!(backend.order_count(USER_TOKEN), 0);
}

#[tokio::test]
async fn test_anonymous_checkout_requires_login() {
    let backend = MockBackend::spawn().await;
    let dir = TempDir::new().unwrap();

    let mut storefront = backend.storefront(dir.path(), &NoticeLog::new());
    storefront.start().await.unwrap();
    add(&mut storefront, TAZA, 1).await;

    let err = storefront
        .checkout("Calle Mayor 1", PaymentMethod::Cash)
        .await
        .unwrap_err();

    assert!(matches!(err, StorefrontError::NotSignedIn));
    assert_eq!(storefront.cart().total_units(), 1);
    assert!(backend.requests_to("/api/pedidos").is_empty());
}
