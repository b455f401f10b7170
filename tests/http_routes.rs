use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use shopping_cart_api::{routes::create_router, state::AppState};
use tower::ServiceExt;

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, location, json)
}

async fn seed(app: &Router) -> (String, String, String) {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/user/",
        Some(json!({
            "name": "ferris",
            "email": "ferris@example.com",
            "pwd": "crab-secret",
            "address": [{
                "street": "1 Crab Lane",
                "zipcode": "10001",
                "district": "Harbor",
                "city": "Rustville",
                "state": "RS"
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"].get("pwd").is_none());
    let user_id = body["data"]["_id"].as_str().expect("user id").to_string();

    let (status, _, body) = send(
        app,
        Method::POST,
        "/products/",
        Some(json!({ "name": "Ferris Mug", "description": "mug", "price": 9.99 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = body["data"]["_id"].as_str().expect("product id").to_string();

    let (status, _, body) = send(app, Method::POST, &format!("/cart/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], json!(0.0));
    assert_eq!(body["data"]["address"]["is_delivery"], json!(true));
    let cart_id = body["data"]["_id"].as_str().expect("cart id").to_string();

    (user_id, product_id, cart_id)
}

#[tokio::test]
async fn cart_lifecycle_over_http() {
    let app = create_router(AppState::in_memory());
    let (user_id, product_id, cart_id) = seed(&app).await;

    // Junk quantities count as one.
    let (status, _, body) = send(
        &app,
        Method::PUT,
        &format!("/cart/{cart_id}/item/"),
        Some(json!({ "product_id": product_id, "quantity": "lots" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], json!(1));

    let (status, _, body) = send(
        &app,
        Method::PUT,
        &format!("/cart/{cart_id}/item"),
        Some(json!({ "product_id": product_id, "quantity": 20 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], json!(21));
    assert_eq!(body["data"]["item_price"], json!(209.79));

    let (status, _, body) = send(&app, Method::GET, &format!("/cart/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items_quantity"], json!(21));
    assert_eq!(body["data"]["price"], json!(209.79));

    let (status, _, body) = send(
        &app,
        Method::DELETE,
        &format!("/cart/{cart_id}/item/{product_id}?quantity=4"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], json!(17));

    let (status, location, _) = send(
        &app,
        Method::DELETE,
        &format!("/cart/{cart_id}/item/{product_id}?quantity=99"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some(format!("/cart/{user_id}").as_str()));

    let (status, _, body) = send(
        &app,
        Method::GET,
        &format!("/cart/{cart_id}/item/{product_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["error_type"], json!("not_found"));

    let (status, _, body) = send(&app, Method::DELETE, &format!("/cart/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("success"));
    assert_eq!(body["data"]["msg"], json!("Deleted the user cart"));
}

#[tokio::test]
async fn unknown_cart_is_reported() {
    let app = create_router(AppState::in_memory());
    let (_, product_id, _) = seed(&app).await;

    let (status, _, body) = send(
        &app,
        Method::PUT,
        "/cart/no-such-cart/item/",
        Some(json!({ "product_id": product_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["error_type"], json!("unknown_cart"));

    let (status, _, body) = send(&app, Method::GET, "/cart/no-such-cart/item/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["error_type"], json!("unknown_cart"));
}

#[tokio::test]
async fn deleting_user_redirects_and_cascades() {
    let app = create_router(AppState::in_memory());
    let (user_id, product_id, cart_id) = seed(&app).await;
    send(
        &app,
        Method::PUT,
        &format!("/cart/{cart_id}/item/"),
        Some(json!({ "product_id": product_id, "quantity": 2 })),
    )
    .await;

    let (status, location, _) = send(&app, Method::DELETE, &format!("/user/{user_id}"), None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/user/"));

    let (status, _, _) = send(&app, Method::GET, &format!("/cart/{user_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, body) = send(&app, Method::GET, &format!("/cart/{cart_id}/item/"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["error_type"], json!("unknown_cart"));
}

#[tokio::test]
async fn user_updates_and_addresses_redirect() {
    let app = create_router(AppState::in_memory());
    let (user_id, _, _) = seed(&app).await;

    let (status, location, _) = send(
        &app,
        Method::PUT,
        &format!("/user/{user_id}"),
        Some(json!({ "name": "corro" })),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = location.expect("location");
    assert_eq!(location, format!("/user/{user_id}/"));

    let (status, _, body) = send(&app, Method::GET, &location, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("corro"));

    let office = json!({
        "street": "2 Borrow Street",
        "zipcode": "10002",
        "district": "Heap",
        "city": "Rustville",
        "state": "RS",
        "is_delivery": false
    });
    let (status, location, _) = send(
        &app,
        Method::PUT,
        &format!("/user/{user_id}/address/"),
        Some(office.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location, Some(format!("/user/{user_id}/address")));

    let (status, _, body) = send(
        &app,
        Method::PUT,
        &format!("/user/{user_id}/address/"),
        Some(office.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["error_type"], json!("validation_error"));

    let (_, _, body) = send(&app, Method::GET, &format!("/user/{user_id}/address"), None).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let (status, _, _) = send(
        &app,
        Method::DELETE,
        &format!("/user/{user_id}/address/"),
        Some(office),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let (_, _, body) = send(&app, Method::GET, &format!("/user/{user_id}/address/"), None).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn products_accept_batches_and_redirect_on_delete() {
    let app = create_router(AppState::in_memory());

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/products",
        Some(json!([
            { "name": "Axum Hoodie", "description": "warm", "price": 55.0 },
            { "name": "Sticker Pack", "price": 4.5 }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = body["data"].as_array().expect("batch response").clone();
    assert_eq!(created.len(), 2);

    let (status, _, body) = send(&app, Method::GET, "/products/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let id = created[0]["_id"].as_str().expect("id");
    let (status, location, _) = send(&app, Method::DELETE, &format!("/products/{id}"), None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/products/"));

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/products/",
        Some(json!({ "name": "Refund", "price": -1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["data"]["error_type"], json!("validation_error"));
}

#[tokio::test]
async fn emails_by_domain_and_fallback() {
    let app = create_router(AppState::in_memory());
    seed(&app).await;

    let (status, _, body) = send(
        &app,
        Method::GET,
        "/user/emails/?domain_name=@example.com",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["emails_count"], json!(1));
    assert_eq!(body["data"]["emails_list"], json!(["ferris@example.com"]));

    let (status, _, _) = send(&app, Method::GET, "/user/emails/?domain_name=example", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _, body) = send(&app, Method::GET, "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], json!("/nowhere"));
}
