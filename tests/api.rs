//! End-to-end tests driving the router in memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use came_storefront::app::{AppState, router};
use came_storefront::config::Config;
use came_storefront::mailer::{MailError, ResetMailer};

const ADMIN_TOKEN: &str = "op-secret";
const PASSWORD: &str = "Secret1";

/// Keeps reset codes instead of mailing them.
#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingMailer {
    fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }
}

impl ResetMailer for CapturingMailer {
    fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), reset_code.to_string()));
        Ok(())
    }
}

struct TestApp {
    app: Router,
    mailer: Arc<CapturingMailer>,
    dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::open(dir)
    }

    fn open(dir: TempDir) -> Self {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            admin_token: Some(ADMIN_TOKEN.to_string()),
            ..Config::default()
        };
        let mailer = Arc::new(CapturingMailer::default());
        let state = AppState::with_mailer(config, mailer.clone()).unwrap();

        TestApp {
            app: router(Arc::new(state)),
            mailer,
            dir,
        }
    }

    fn client(&self) -> Client<'_> {
        Client {
            app: self,
            cookies: HashMap::new(),
            bearer: None,
        }
    }

    async fn call(&self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        Reply {
            status,
            set_cookies,
            body,
        }
    }

    async fn operator(&self, order_id: &str, status: &str, token: Option<&str>) -> Reply {
        let mut builder = Request::builder()
            .method(Method::PUT)
            .uri(format!("/api/admin/orders/{order_id}/status"))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header("x-admin-token", token);
        }

        self.call(
            builder
                .body(Body::from(json!({ "status": status }).to_string()))
                .unwrap(),
        )
        .await
    }
}

struct Reply {
    status: StatusCode,
    set_cookies: Vec<(String, String)>,
    body: Value,
}

impl Reply {
    fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// A browser: remembers cookies between requests.
struct Client<'a> {
    app: &'a TestApp,
    cookies: HashMap<String, String>,
    bearer: Option<String>,
}

impl Client<'_> {
    async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);

        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(token) = &self.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let reply = self.app.call(request).await;
        for (name, value) in &reply.set_cookies {
            if value.is_empty() {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.clone(), value.clone());
            }
        }
        reply
    }

    async fn get(&mut self, uri: &str) -> Reply {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&mut self, uri: &str, body: Value) -> Reply {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn register(&mut self, email: &str) -> Reply {
        let reply = self
            .post(
                "/api/auth/register",
                json!({ "email": email, "password": PASSWORD, "username": "Ana" }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply
    }

    async fn add_latte(&mut self, quantity: u32) -> Reply {
        let reply = self
            .post(
                "/api/cart/items",
                json!({ "product_id": 2, "option": "Vanilla", "size": "Medium", "quantity": quantity }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply
    }

    async fn place_store_order(&mut self) -> String {
        self.add_latte(1).await;
        let reply = self
            .post("/api/orders", json!({ "delivery_option": "store" }))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["id"].as_str().unwrap().to_string()
    }

    async fn pay(&mut self, order_id: &str) -> Reply {
        self.post(
            &format!("/api/orders/{order_id}/pay"),
            json!({
                "full_name": "Ana Lima",
                "phone_number": "555-0100",
                "email": "ana@example.com",
                "payment_method": "cash"
            }),
        )
        .await
    }
}

#[tokio::test]
async fn menu_is_browsable() {
    let app = TestApp::new();
    let mut client = app.client();

    let health = client.get("/api/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");

    let menu = client.get("/api/menu").await;
    assert_eq!(menu.body.as_array().unwrap().len(), 6);

    let coffee = client.get("/api/menu?category=Coffee").await;
    assert_eq!(coffee.body.as_array().unwrap().len(), 1);
    assert_eq!(coffee.body[0]["name"], "Drip Coffee");

    let categories = client.get("/api/menu/categories").await;
    assert!(categories.body.as_array().unwrap().contains(&json!("Merchandise")));

    let latte = client.get("/api/menu/2").await;
    assert_eq!(latte.body["base_price"], 450);

    let missing = client.get("/api/menu/99").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["status"], "error");
    assert_eq!(missing.message(), "Product 99 not found");
}

#[tokio::test]
async fn product_quotes_include_option_and_size() {
    let app = TestApp::new();
    let mut client = app.client();

    let quote = client
        .post(
            "/api/menu/2/quote",
            json!({ "option": "Vanilla", "size": "Medium", "quantity": 2 }),
        )
        .await;
    assert_eq!(quote.status, StatusCode::OK);
    assert_eq!(quote.body["unit_price"], 625);
    assert_eq!(quote.body["total"], 1250);

    let bad = client
        .post("/api/menu/2/quote", json!({ "size": "Venti" }))
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.message(), "Latte has no size named 'Venti'");
}

#[tokio::test]
async fn guest_cart_merges_lines_and_persists() {
    let app = TestApp::new();
    let mut client = app.client();

    let first = client.add_latte(1).await;
    assert!(client.cookies.contains_key("guest"));
    let line_id = first.body["line_id"].as_str().unwrap().to_string();

    let second = client.add_latte(2).await;
    assert_eq!(second.body["line_id"], line_id.as_str());
    assert_eq!(second.body["cart"]["lines"].as_array().unwrap().len(), 1);
    assert_eq!(second.body["cart"]["item_count"], 3);

    let cart = client.get("/api/cart").await;
    assert_eq!(cart.body["subtotal"], 1875);
    assert_eq!(cart.body["tax"], 188);
    assert_eq!(cart.body["total"], 2063);

    let updated = client
        .send(
            Method::PATCH,
            &format!("/api/cart/items/{line_id}"),
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["lines"].as_array().unwrap().len(), 0);

    let missing = client
        .send(Method::DELETE, &format!("/api/cart/items/{line_id}"), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_quote_prices_delivery() {
    let app = TestApp::new();
    let mut client = app.client();
    client.add_latte(2).await;

    let store = client
        .post("/api/checkout/quote", json!({ "delivery_option": "store" }))
        .await;
    assert_eq!(store.body["delivery_fee"], 0);
    assert_eq!(store.body["total"], 1375);

    let delivery = client
        .post(
            "/api/checkout/quote",
            json!({ "delivery_option": "delivery", "tip": 100 }),
        )
        .await;
    assert_eq!(delivery.body["subtotal"], 1250);
    assert_eq!(delivery.body["tax"], 125);
    assert_eq!(delivery.body["delivery_fee"], 200);
    assert_eq!(delivery.body["total"], 1675);
}

#[tokio::test]
async fn oversized_tips_are_rejected() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("ana@example.com").await;
    client.add_latte(1).await;

    let quote = client
        .post(
            "/api/checkout/quote",
            json!({ "delivery_option": "delivery", "tip": u64::MAX }),
        )
        .await;
    assert_eq!(quote.status, StatusCode::BAD_REQUEST);
    assert_eq!(quote.message(), "Tips are limited to $1000.00");

    let order = client
        .post(
            "/api/orders",
            json!({ "delivery_option": "store", "tip": u64::MAX }),
        )
        .await;
    assert_eq!(order.status, StatusCode::BAD_REQUEST);

    assert_eq!(client.get("/api/orders").await.body, json!([]));
    assert_eq!(client.get("/api/cart").await.body["item_count"], 1);

    let generous = client
        .post(
            "/api/orders",
            json!({ "delivery_option": "store", "tip": 100_000 }),
        )
        .await;
    assert_eq!(generous.status, StatusCode::CREATED, "{}", generous.body);
    assert_eq!(generous.body["total"], 625 + 63 + 100_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_guest_adds_all_count() {
    let app = TestApp::new();
    let mut client = app.client();
    client.add_latte(1).await;
    let guest = client.cookies["guest"].clone();

    let adds: Vec<_> = (0..40)
        .map(|_| {
            let router = app.app.clone();
            let request = Request::builder()
                .method(Method::POST)
                .uri("/api/cart/items")
                .header(header::COOKIE, format!("guest={guest}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "product_id": 2, "option": "Vanilla", "size": "Medium" }).to_string(),
                ))
                .unwrap();
            tokio::spawn(async move { router.oneshot(request).await.unwrap().status() })
        })
        .collect();

    for add in adds {
        assert_eq!(add.await.unwrap(), StatusCode::CREATED);
    }

    let cart = client.get("/api/cart").await;
    assert_eq!(cart.body["lines"].as_array().unwrap().len(), 1);
    assert_eq!(cart.body["item_count"], 41);
}

#[tokio::test]
async fn ordering_requires_a_session() {
    let app = TestApp::new();
    let mut client = app.client();
    client.add_latte(1).await;

    let reply = client
        .post("/api/orders", json!({ "delivery_option": "store" }))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.message(), "You must be logged in");
}

#[tokio::test]
async fn login_adopts_the_guest_cart() {
    let app = TestApp::new();
    let mut client = app.client();

    client.add_latte(1).await;
    client.register("ana@example.com").await;
    assert!(client.cookies.contains_key("session"));
    assert!(!client.cookies.contains_key("guest"));
    let leftover = std::fs::read_dir(app.dir.path().join("guests")).unwrap().count();
    assert_eq!(leftover, 0);

    let cart = client.get("/api/cart").await;
    assert_eq!(cart.body["item_count"], 1);

    let logout = client.post("/api/auth/logout", json!({})).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert!(!client.cookies.contains_key("session"));

    // A new guest session, then log back in.
    client.add_latte(2).await;
    let login = client
        .post(
            "/api/auth/login",
            json!({ "email": "ana@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["email"], "ana@example.com");

    let cart = client.get("/api/cart").await;
    assert_eq!(cart.body["lines"].as_array().unwrap().len(), 1);
    assert_eq!(cart.body["item_count"], 3);
}

#[tokio::test]
async fn registration_is_validated() {
    let app = TestApp::new();
    let mut client = app.client();

    let weak = client
        .post(
            "/api/auth/register",
            json!({ "email": "ana@example.com", "password": "secret", "username": "Ana" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        weak.message(),
        "Password must contain at least one uppercase letter"
    );

    client.register("ana@example.com").await;

    let mut other = app.client();
    let taken = other
        .post(
            "/api/auth/register",
            json!({ "email": "ANA@example.com", "password": PASSWORD, "username": "Ana" }),
        )
        .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);

    let wrong = other
        .post(
            "/api/auth/login",
            json!({ "email": "ana@example.com", "password": "Wrong1" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.message(), "Invalid login credentials");
}

#[tokio::test]
async fn order_lifecycle_with_notifications_and_feedback() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("ana@example.com").await;
    client.add_latte(2).await;

    let no_address = client
        .post(
            "/api/orders",
            json!({ "delivery_option": "delivery", "delivery_time": "18:30" }),
        )
        .await;
    assert_eq!(no_address.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_address.message(), "Please enter a delivery address");

    let placed = client
        .post(
            "/api/orders",
            json!({
                "delivery_option": "delivery",
                "delivery_address": "12 Bean St",
                "delivery_time": "18:30",
                "tip": 100
            }),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert_eq!(placed.body["status"], "pending");
    assert_eq!(placed.body["total"], 1250 + 125 + 200 + 100);
    assert_eq!(placed.body["items"][0]["product_name"], "Latte");
    assert_eq!(placed.body["items"][0]["price"], 625);
    let order_id = placed.body["id"].as_str().unwrap().to_string();

    let cart = client.get("/api/cart").await;
    assert_eq!(cart.body["item_count"], 0);

    let incomplete = client
        .post(
            &format!("/api/orders/{order_id}/pay"),
            json!({ "full_name": "", "phone_number": "1", "email": "a@b.co", "payment_method": "cash" }),
        )
        .await;
    assert_eq!(incomplete.status, StatusCode::BAD_REQUEST);

    let paid = client.pay(&order_id).await;
    assert_eq!(paid.status, StatusCode::OK);
    assert_eq!(paid.body["status"], "preparing");

    let again = client.pay(&order_id).await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    assert_eq!(
        app.operator(&order_id, "packing", None).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.operator(&order_id, "packing", Some("guess")).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.operator(&order_id, "teleported", Some(ADMIN_TOKEN)).await.status,
        StatusCode::BAD_REQUEST
    );

    let delivering = app
        .operator(&order_id, "delivering", Some(ADMIN_TOKEN))
        .await;
    assert_eq!(delivering.status, StatusCode::OK);
    assert_eq!(delivering.body["steps"][3]["current"], true);

    let back = app.operator(&order_id, "preparing", Some(ADMIN_TOKEN)).await;
    assert_eq!(back.status, StatusCode::CONFLICT);

    let cancel = client
        .post(&format!("/api/orders/{order_id}/cancel"), json!({}))
        .await;
    assert_eq!(cancel.status, StatusCode::CONFLICT);

    let early = client
        .post(&format!("/api/orders/{order_id}/feedback"), json!({ "rating": 5 }))
        .await;
    assert_eq!(early.status, StatusCode::CONFLICT);

    let completed = app.operator(&order_id, "completed", Some(ADMIN_TOKEN)).await;
    assert_eq!(completed.body["status"], "completed");

    let bad_rating = client
        .post(&format!("/api/orders/{order_id}/feedback"), json!({ "rating": 6 }))
        .await;
    assert_eq!(bad_rating.status, StatusCode::BAD_REQUEST);

    let feedback = client
        .post(
            &format!("/api/orders/{order_id}/feedback"),
            json!({ "rating": 5, "comment": "Perfect latte" }),
        )
        .await;
    assert_eq!(feedback.status, StatusCode::CREATED);

    let twice = client
        .post(&format!("/api/orders/{order_id}/feedback"), json!({ "rating": 4 }))
        .await;
    assert_eq!(twice.status, StatusCode::CONFLICT);

    let order = client.get(&format!("/api/orders/{order_id}")).await;
    assert_eq!(order.body["feedback"]["rating"], 5);

    let notifications = client.get("/api/notifications").await;
    let messages: Vec<&str> = notifications
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages.len(), 5);
    assert!(messages.iter().any(|m| m.starts_with("Your order has been placed.")));
    assert!(messages.iter().any(|m| m.starts_with("Your order is now being prepared.")));
    assert!(messages.iter().any(|m| m.starts_with("Your order has been delivered.")));
    assert!(messages.iter().any(|m| m.starts_with("Thank you for your feedback")));

    let first_id = notifications.body[0]["id"].as_str().unwrap().to_string();
    let read = client
        .post(&format!("/api/notifications/{first_id}/read"), json!({}))
        .await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body["read"], true);
}

#[tokio::test]
async fn pending_orders_can_be_cancelled() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("ana@example.com").await;
    let order_id = client.place_store_order().await;

    let cancelled = client
        .post(&format!("/api/orders/{order_id}/cancel"), json!({}))
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.body["status"], "cancelled");
    assert!(
        cancelled.body["steps"]
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["done"] == false)
    );

    let pay = client.pay(&order_id).await;
    assert_eq!(pay.status, StatusCode::CONFLICT);

    let expected = format!(
        "Your order has been cancelled. Order #{}",
        &order_id.replace('-', "")[..8]
    );
    let notifications = client.get("/api/notifications").await;
    assert!(
        notifications
            .body
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["message"] == expected.as_str())
    );
}

#[tokio::test]
async fn orders_are_private_and_listed_newest_first() {
    let app = TestApp::new();
    let mut ana = app.client();
    ana.register("ana@example.com").await;
    let first = ana.place_store_order().await;
    let second = ana.place_store_order().await;

    let history = ana.get("/api/orders").await;
    let ids: Vec<&str> = history
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    let mut bob = app.client();
    bob.register("bob@example.com").await;
    assert_eq!(
        bob.get(&format!("/api/orders/{first}")).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        bob.post(&format!("/api/orders/{first}/cancel"), json!({}))
            .await
            .status,
        StatusCode::NOT_FOUND
    );
    assert!(bob.get("/api/orders").await.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_cart_cannot_be_ordered() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("ana@example.com").await;

    let reply = client
        .post("/api/orders", json!({ "delivery_option": "store" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.message(),
        "Your cart is empty. Add some items before placing an order."
    );
}

#[tokio::test]
async fn support_tickets() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("ana@example.com").await;

    let blank = client
        .post("/api/support/tickets", json!({ "issue_description": "  " }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let created = client
        .post(
            "/api/support/tickets",
            json!({ "issue_description": "My latte was cold" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "open");
    let ticket_id = created.body["id"].as_str().unwrap().to_string();

    let list = client.get("/api/support/tickets").await;
    assert_eq!(list.body.as_array().unwrap().len(), 1);

    let one = client.get(&format!("/api/support/tickets/{ticket_id}")).await;
    assert_eq!(one.body["issue_description"], "My latte was cold");

    let mut bob = app.client();
    bob.register("bob@example.com").await;
    assert_eq!(
        bob.get(&format!("/api/support/tickets/{ticket_id}")).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn campaigns_are_listed() {
    let app = TestApp::new();
    let mut client = app.client();

    let campaigns = client.get("/api/campaigns").await;
    let list = campaigns.body.as_array().unwrap();
    assert_eq!(list.len(), 2);

    let id = list[0]["id"].as_str().unwrap().to_string();
    let one = client.get(&format!("/api/campaigns/{id}")).await;
    assert_eq!(one.body["title"], list[0]["title"]);

    let missing = client
        .get("/api/campaigns/00000000-0000-4000-8000-000000000000")
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_and_password_change() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("ana@example.com").await;

    let profile = client
        .send(
            Method::PUT,
            "/api/auth/profile",
            Some(json!({ "username": "Ana L", "avatar_url": "https://cdn.example.com/ana.png" })),
        )
        .await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["username"], "Ana L");
    assert!(profile.body.get("password_hash").is_none());

    let me = client.get("/api/auth/me").await;
    assert_eq!(me.body["avatar_url"], "https://cdn.example.com/ana.png");

    let mismatch = client
        .post(
            "/api/auth/password/change",
            json!({ "current_password": PASSWORD, "new_password": "Better2", "confirm_password": "Better3" }),
        )
        .await;
    assert_eq!(mismatch.status, StatusCode::BAD_REQUEST);

    let wrong = client
        .post(
            "/api/auth/password/change",
            json!({ "current_password": "Nope12", "new_password": "Better2", "confirm_password": "Better2" }),
        )
        .await;
    assert_eq!(wrong.message(), "Current password is incorrect");

    let changed = client
        .post(
            "/api/auth/password/change",
            json!({ "current_password": PASSWORD, "new_password": "Better2", "confirm_password": "Better2" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);

    let notifications = client.get("/api/notifications").await;
    assert_eq!(
        notifications.body[0]["message"],
        "Your password has been successfully updated."
    );
    assert_eq!(notifications.body[0]["type"], "system");
}

#[tokio::test]
async fn password_reset_by_code() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("ana@example.com").await;
    assert_eq!(client.get("/api/auth/me").await.status, StatusCode::OK);

    let mut anonymous = app.client();
    let unknown = anonymous
        .post("/api/auth/password/forgot", json!({ "email": "ghost@example.com" }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.message(), "Email not found");

    let sent = anonymous
        .post("/api/auth/password/forgot", json!({ "email": "ana@example.com" }))
        .await;
    assert_eq!(sent.status, StatusCode::OK);
    let code = app.mailer.last_code().unwrap();
    assert_eq!(code.len(), 8);

    let wrong = anonymous
        .post(
            "/api/auth/password/reset",
            json!({ "email": "ana@example.com", "reset_code": "ZZZZZZZZ", "new_password": "Fresh3" }),
        )
        .await;
    assert_eq!(wrong.message(), "Invalid reset code");

    let reset = anonymous
        .post(
            "/api/auth/password/reset",
            json!({ "email": "ana@example.com", "reset_code": code, "new_password": "Fresh3" }),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);

    // Old sessions end with the reset.
    assert_eq!(client.get("/api/auth/me").await.status, StatusCode::UNAUTHORIZED);

    let login = anonymous
        .post(
            "/api/auth/login",
            json!({ "email": "ana@example.com", "password": "Fresh3" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn repeated_wrong_reset_codes_void_the_code() {
    let app = TestApp::new();
    app.client().register("ana@example.com").await;
    let mut anonymous = app.client();

    anonymous
        .post("/api/auth/password/forgot", json!({ "email": "ana@example.com" }))
        .await;
    let code = app.mailer.last_code().unwrap();

    for _ in 0..5 {
        let wrong = anonymous
            .post(
                "/api/auth/password/reset",
                json!({ "email": "ana@example.com", "reset_code": "ZZZZZZZZ", "new_password": "Fresh3" }),
            )
            .await;
        assert_eq!(wrong.message(), "Invalid reset code");
    }

    let late = anonymous
        .post(
            "/api/auth/password/reset",
            json!({ "email": "ana@example.com", "reset_code": code, "new_password": "Fresh3" }),
        )
        .await;
    assert_eq!(late.status, StatusCode::BAD_REQUEST);
    assert_eq!(late.message(), "No reset code found");
}

#[tokio::test]
async fn bearer_tokens_work_like_cookies() {
    let app = TestApp::new();
    let mut browser = app.client();
    browser.register("ana@example.com").await;
    let token = browser.cookies["session"].clone();

    let mut api = app.client();
    api.bearer = Some(token);
    let me = api.get("/api/auth/me").await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "ana@example.com");

    api.bearer = Some("not-a-session".to_string());
    assert_eq!(api.get("/api/auth/me").await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn data_survives_a_restart() {
    let app = TestApp::new();
    let mut client = app.client();
    client.register("ana@example.com").await;
    let order_id = client.place_store_order().await;

    let TestApp { dir, .. } = app;
    let restarted = TestApp::open(dir);
    let mut client = restarted.client();

    let login = client
        .post(
            "/api/auth/login",
            json!({ "email": "ana@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);

    let order = client.get(&format!("/api/orders/{order_id}")).await;
    assert_eq!(order.status, StatusCode::OK);
    assert_eq!(order.body["status"], "pending");
}
