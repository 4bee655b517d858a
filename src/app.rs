use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{
        HeaderMap, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
    },
    routing::{get, patch, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::campaign::Campaign;
use crate::cart::{Cart, CartAction, CartLine};
use crate::catalog::{Catalog, Cents, Product};
use crate::config::Config;
use crate::database::{Database, Tables};
use crate::error::AppError;
use crate::login::{self, AuthError, SessionStore};
use crate::mailer::{LogMailer, ResetMailer, SmtpMailer};
use crate::notification::{self, Notification, NotificationKind};
use crate::order::{
    CheckoutRequest, DeliveryOption, FeedbackRequest, Order, OrderError, OrderFeedback, OrderItem,
    OrderStatus, PaymentDetails, StepView, tracking_steps,
};
use crate::pricing::{OrderTotals, PricingRules, quote};
use crate::saving::GuestCarts;
use crate::support::{NewTicket, SupportError, SupportTicket};

pub const SESSION_COOKIE: &str = "session";
pub const GUEST_COOKIE: &str = "guest";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub guests: GuestCarts,
    pub catalog: Catalog,
    pub sessions: SessionStore,
    pub mailer: Arc<dyn ResetMailer>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Open the data directory and pick a mailer from the configuration.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let mailer: Arc<dyn ResetMailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => Arc::new(LogMailer),
        };

        Self::with_mailer(config, mailer)
    }

    pub fn with_mailer(config: Config, mailer: Arc<dyn ResetMailer>) -> Result<Self, AppError> {
        let db = Database::open(config.data_dir.clone())?;
        let guests = GuestCarts::open(&config.data_dir, Duration::days(config.guest_cart_days))?;
        let sessions = SessionStore::new(Duration::hours(config.session_hours));

        Ok(AppState {
            config,
            db,
            guests,
            catalog: Catalog::seeded(),
            sessions,
            mailer,
        })
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl StatusResponse {
    pub fn ok(message: &str) -> Self {
        StatusResponse {
            status: "ok".to_string(),
            message: Some(message.to_string()),
        }
    }
}

/// The signed-in user behind a request.
///
/// Rejects with `401` when there is no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AuthError::Unauthenticated)?;
        let id = state
            .sessions
            .validate(&token)
            .ok_or(AuthError::Unauthenticated)?;

        if state.db.read(|t| t.user(id).is_none()) {
            return Err(AuthError::Unauthenticated.into());
        }

        Ok(CurrentUser { id, token })
    }
}

/// Bearer token first, then the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
    })
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

fn guest_cookie(guest_id: Uuid) -> Cookie<'static> {
    Cookie::build((GUEST_COOKIE, guest_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn guest_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(GUEST_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

/// Merge the cart named by the `guest` cookie into a user's cart.
///
/// The guest file and cookie are dropped only once the merge is saved.
pub fn adopt_guest_cart(
    state: &AppState,
    jar: CookieJar,
    user_id: Uuid,
) -> Result<CookieJar, AppError> {
    let Some(guest_id) = guest_id(&jar) else {
        return Ok(jar);
    };

    let merged = state.guests.adopt(guest_id, |guest_cart| {
        if guest_cart.is_empty() {
            return Ok(false);
        }

        state.db.write(|t| {
            t.cart_mut(user_id, Utc::now()).merge(guest_cart);
            Ok::<_, AppError>(true)
        })
    })?;

    if merged {
        info!("Merged guest cart {guest_id} into cart of user {user_id}");
    }

    Ok(jar.remove(Cookie::build(GUEST_COOKIE).path("/")))
}

enum CartOwner {
    User(Uuid),
    Guest(Uuid),
}

/// Guests without a cookie get a fresh guest id.
fn cart_owner(user: Option<CurrentUser>, jar: CookieJar) -> (CartOwner, CookieJar) {
    if let Some(user) = user {
        return (CartOwner::User(user.id), jar);
    }

    match guest_id(&jar) {
        Some(id) => (CartOwner::Guest(id), jar),
        None => {
            let id = Uuid::new_v4();
            (CartOwner::Guest(id), jar.add(guest_cookie(id)))
        }
    }
}

fn load_cart(state: &AppState, owner: &CartOwner) -> Result<Cart, AppError> {
    match owner {
        CartOwner::User(id) => Ok(state.db.read(|t| t.cart_for(*id).cloned().unwrap_or_default())),
        CartOwner::Guest(id) => Ok(state.guests.load(*id)?),
    }
}

fn update_cart(state: &AppState, owner: &CartOwner, action: CartAction) -> Result<Cart, AppError> {
    match owner {
        CartOwner::User(id) => state.db.write(|t| {
            let cart = t.cart_mut(*id, Utc::now());
            cart.apply(action)?;
            Ok(cart.clone())
        }),
        CartOwner::Guest(id) => state.guests.update(*id, |cart| {
            cart.apply(action)?;
            Ok::<_, AppError>(cart.clone())
        }),
    }
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub subtotal: Cents,
    pub tax: Cents,
    pub total: Cents,
}

impl CartView {
    fn new(cart: Cart, rules: &PricingRules) -> Result<Self, OrderError> {
        let totals = quote(cart.subtotal(), DeliveryOption::Store, 0, rules)?;

        Ok(CartView {
            item_count: cart.item_count(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            lines: cart.lines,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub short_id: String,
    pub items: Vec<OrderItem>,
    pub steps: Vec<StepView>,
    pub feedback: Option<OrderFeedback>,
}

fn order_view(tables: &Tables, order: Order) -> OrderView {
    OrderView {
        short_id: order.short_id(),
        items: tables.items_for_order(order.id),
        steps: tracking_steps(order.status),
        feedback: tables.feedback_for_order(order.id).cloned(),
        order,
    }
}

fn notify_status(tables: &mut Tables, order: &Order) {
    tables.notifications.push(Notification::new(
        order.user_id,
        NotificationKind::OrderStatus,
        notification::status_changed(&order.short_id(), order.status),
    ));
}

fn owned_order_mut(tables: &mut Tables, user_id: Uuid, order_id: Uuid) -> Result<&mut Order, OrderError> {
    tables
        .order_mut(order_id)
        .filter(|o| o.user_id == user_id)
        .ok_or(OrderError::NotFound(order_id))
}

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/menu", get(list_menu))
        .route("/api/menu/categories", get(list_categories))
        .route("/api/menu/:id", get(get_product))
        .route("/api/menu/:id/quote", post(quote_product))
        .route("/api/campaigns", get(list_campaigns))
        .route("/api/campaigns/:id", get(get_campaign))
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_cart_item))
        .route(
            "/api/cart/items/:line_id",
            patch(update_cart_item).delete(remove_cart_item),
        )
        .route("/api/checkout/quote", post(checkout_quote))
        .route("/api/orders", get(list_orders).post(place_order))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/pay", post(pay_order))
        .route("/api/orders/:id/cancel", post(cancel_order))
        .route("/api/orders/:id/feedback", post(leave_feedback))
        .route("/api/admin/orders/:id/status", put(update_order_status))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:id/read", post(mark_notification_read))
        .route(
            "/api/support/tickets",
            get(list_tickets).post(create_ticket),
        )
        .route("/api/support/tickets/:id", get(get_ticket))
        .route("/api/auth/register", post(login::handle_register))
        .route("/api/auth/login", post(login::handle_login))
        .route("/api/auth/logout", post(login::handle_logout))
        .route("/api/auth/me", get(login::handle_me))
        .route("/api/auth/profile", put(login::handle_update_profile))
        .route(
            "/api/auth/password/change",
            post(login::handle_change_password),
        )
        .route(
            "/api/auth/password/forgot",
            post(login::handle_forgot_password),
        )
        .route(
            "/api/auth/password/reset",
            post(login::handle_reset_password),
        )
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let address = config.address();
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        message: None,
    })
}

#[derive(Deserialize)]
struct MenuQuery {
    category: Option<String>,
}

async fn list_menu(
    State(state): State<SharedState>,
    Query(query): Query<MenuQuery>,
) -> Json<Vec<Product>> {
    let products = match query.category {
        Some(category) => state
            .catalog
            .products_in_category(&category)
            .into_iter()
            .cloned()
            .collect(),
        None => state.catalog.products().to_vec(),
    };

    Json(products)
}

async fn list_categories(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.catalog.categories().to_vec())
}

async fn get_product(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.require(id)?.clone()))
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
struct Configuration {
    #[serde(default)]
    option: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default = "one")]
    quantity: u32,
}

#[derive(Serialize)]
struct ProductQuote {
    unit_price: Cents,
    quantity: u32,
    total: Cents,
}

async fn quote_product(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
    Json(config): Json<Configuration>,
) -> Result<Json<ProductQuote>, AppError> {
    let line = state.catalog.require(id)?.configure(
        config.option.as_deref(),
        config.size.as_deref(),
        config.quantity,
    )?;

    Ok(Json(ProductQuote {
        unit_price: line.unit_price,
        quantity: line.quantity,
        total: line.unit_price * Cents::from(line.quantity),
    }))
}

async fn list_campaigns(State(state): State<SharedState>) -> Json<Vec<Campaign>> {
    Json(state.db.read(|t| t.active_campaigns(Utc::now())))
}

async fn get_campaign(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    state
        .db
        .read(|t| t.campaign(id).cloned())
        .map(Json)
        .ok_or(AppError::NotFound("Campaign"))
}

async fn get_cart(
    State(state): State<SharedState>,
    user: Option<CurrentUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CartView>), AppError> {
    let (owner, jar) = cart_owner(user, jar);
    let cart = load_cart(&state, &owner)?;

    Ok((jar, Json(CartView::new(cart, &state.config.pricing)?)))
}

#[derive(Deserialize)]
struct AddItemRequest {
    product_id: u32,
    #[serde(flatten)]
    configuration: Configuration,
}

#[derive(Serialize)]
struct AddItemResponse {
    line_id: Uuid,
    cart: CartView,
}

async fn add_cart_item(
    State(state): State<SharedState>,
    user: Option<CurrentUser>,
    jar: CookieJar,
    Json(request): Json<AddItemRequest>,
) -> Result<(StatusCode, CookieJar, Json<AddItemResponse>), AppError> {
    let config = request.configuration;
    let line = state.catalog.require(request.product_id)?.configure(
        config.option.as_deref(),
        config.size.as_deref(),
        config.quantity,
    )?;
    let key = (line.product_id, line.options.clone(), line.size.clone());

    let (owner, jar) = cart_owner(user, jar);
    let cart = update_cart(&state, &owner, CartAction::AddItem(line))?;

    let line_id = cart
        .lines
        .iter()
        .find(|l| (l.product_id, &l.options, &l.size) == (key.0, &key.1, &key.2))
        .map(|l| l.id)
        .ok_or(AppError::NotFound("Cart line"))?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AddItemResponse {
            line_id,
            cart: CartView::new(cart, &state.config.pricing)?,
        }),
    ))
}

#[derive(Deserialize)]
struct QuantityUpdate {
    quantity: i64,
}

async fn update_cart_item(
    State(state): State<SharedState>,
    user: Option<CurrentUser>,
    jar: CookieJar,
    Path(line_id): Path<Uuid>,
    Json(update): Json<QuantityUpdate>,
) -> Result<(CookieJar, Json<CartView>), AppError> {
    let (owner, jar) = cart_owner(user, jar);
    let cart = update_cart(
        &state,
        &owner,
        CartAction::UpdateQuantity {
            id: line_id,
            quantity: update.quantity,
        },
    )?;

    Ok((jar, Json(CartView::new(cart, &state.config.pricing)?)))
}

async fn remove_cart_item(
    State(state): State<SharedState>,
    user: Option<CurrentUser>,
    jar: CookieJar,
    Path(line_id): Path<Uuid>,
) -> Result<(CookieJar, Json<CartView>), AppError> {
    let (owner, jar) = cart_owner(user, jar);
    let cart = update_cart(&state, &owner, CartAction::RemoveItem(line_id))?;

    Ok((jar, Json(CartView::new(cart, &state.config.pricing)?)))
}

async fn clear_cart(
    State(state): State<SharedState>,
    user: Option<CurrentUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CartView>), AppError> {
    let (owner, jar) = cart_owner(user, jar);
    let cart = update_cart(&state, &owner, CartAction::Clear)?;

    Ok((jar, Json(CartView::new(cart, &state.config.pricing)?)))
}

#[derive(Deserialize)]
struct QuoteRequest {
    delivery_option: DeliveryOption,
    #[serde(default)]
    tip: Cents,
}

async fn checkout_quote(
    State(state): State<SharedState>,
    user: Option<CurrentUser>,
    jar: CookieJar,
    Json(request): Json<QuoteRequest>,
) -> Result<(CookieJar, Json<OrderTotals>), AppError> {
    let (owner, jar) = cart_owner(user, jar);
    let cart = load_cart(&state, &owner)?;
    let totals = quote(
        cart.subtotal(),
        request.delivery_option,
        request.tip,
        &state.config.pricing,
    )?;

    Ok((jar, Json(totals)))
}

async fn place_order(
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderView>), AppError> {
    let now = Utc::now();
    let rules = state.config.pricing;

    let view = state.db.write(|t| {
        let cart = t.cart_for(user.id).cloned().unwrap_or_default();
        let (order, items) = Order::from_cart(user.id, &cart, &request, &rules, now)?;

        t.orders.push(order.clone());
        t.order_items.extend(items);
        t.cart_mut(user.id, now).clear();
        t.notifications.push(Notification::new(
            user.id,
            NotificationKind::OrderStatus,
            notification::order_placed(&order.short_id()),
        ));

        Ok::<_, AppError>(order_view(t, order))
    })?;

    info!(
        "Order {} placed by user {} ({} cents)",
        view.order.id, user.id, view.order.total
    );
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_orders(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Json<Vec<OrderView>> {
    Json(state.db.read(|t| {
        t.orders_for_user(user.id)
            .into_iter()
            .map(|order| order_view(t, order))
            .collect()
    }))
}

async fn get_order(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let view = state.db.read(|t| {
        t.order(id)
            .filter(|o| o.user_id == user.id)
            .cloned()
            .map(|order| order_view(t, order))
    });

    Ok(Json(view.ok_or(OrderError::NotFound(id))?))
}

async fn pay_order(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(details): Json<PaymentDetails>,
) -> Result<Json<OrderView>, AppError> {
    let view = state.db.write(|t| {
        let order = owned_order_mut(t, user.id, id)?;
        order.pay(&details, Utc::now())?;
        let order = order.clone();

        notify_status(t, &order);
        Ok::<_, AppError>(order_view(t, order))
    })?;

    info!("Order {id} paid by {:?}", details.payment_method);
    Ok(Json(view))
}

async fn cancel_order(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let view = state.db.write(|t| {
        let order = owned_order_mut(t, user.id, id)?;
        order.cancel(Utc::now())?;
        let order = order.clone();

        notify_status(t, &order);
        Ok::<_, AppError>(order_view(t, order))
    })?;

    info!("Order {id} cancelled by user {}", user.id);
    Ok(Json(view))
}

async fn leave_feedback(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<OrderFeedback>), AppError> {
    let feedback = state.db.write(|t| {
        let order = t
            .order(id)
            .filter(|o| o.user_id == user.id)
            .cloned()
            .ok_or(OrderError::NotFound(id))?;

        if t.feedback_for_order(id).is_some() {
            return Err(OrderError::FeedbackExists.into());
        }
        request.validate(&order)?;

        let feedback = OrderFeedback {
            id: Uuid::new_v4(),
            order_id: id,
            user_id: user.id,
            rating: request.rating,
            comment: request.comment.trim().to_string(),
            created_at: Utc::now(),
        };
        t.feedback.push(feedback.clone());
        t.notifications.push(Notification::new(
            user.id,
            NotificationKind::System,
            notification::feedback_thanks(&order.short_id()),
        ));

        Ok::<_, AppError>(feedback)
    })?;

    Ok((StatusCode::CREATED, Json(feedback)))
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: String,
}

fn require_operator(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = state
        .config
        .admin_token
        .as_deref()
        .ok_or(AppError::Forbidden)?;
    let given = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if given == Some(expected) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

async fn update_order_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<OrderView>, AppError> {
    require_operator(&state, &headers)?;
    let next: OrderStatus = update.status.parse()?;

    let view = state.db.write(|t| {
        let order = t.order_mut(id).ok_or(OrderError::NotFound(id))?;
        let now = Utc::now();
        if next == OrderStatus::Cancelled {
            order.cancel(now)?;
        } else {
            order.advance(next, now)?;
        }
        let order = order.clone();

        notify_status(t, &order);
        Ok::<_, AppError>(order_view(t, order))
    })?;

    info!("Order {id} moved to {next}");
    Ok(Json(view))
}

async fn list_notifications(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Json<Vec<Notification>> {
    Json(state.db.read(|t| t.notifications_for_user(user.id)))
}

async fn mark_notification_read(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state.db.write(|t| {
        let notification = t
            .notification_mut(id)
            .filter(|n| n.user_id == user.id)
            .ok_or(AppError::NotFound("Notification"))?;
        notification.mark_read();
        Ok::<_, AppError>(notification.clone())
    })?;

    Ok(Json(notification))
}

async fn create_ticket(
    State(state): State<SharedState>,
    user: CurrentUser,
    Json(request): Json<NewTicket>,
) -> Result<(StatusCode, Json<SupportTicket>), AppError> {
    let ticket = SupportTicket::open(user.id, &request.issue_description)?;

    state.db.write(|t| {
        t.tickets.push(ticket.clone());
        Ok::<_, AppError>(())
    })?;

    info!("Support ticket {} opened by user {}", ticket.id, user.id);
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn list_tickets(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Json<Vec<SupportTicket>> {
    Json(state.db.read(|t| t.tickets_for_user(user.id)))
}

async fn get_ticket(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SupportTicket>, AppError> {
    let ticket = state.db.read(|t| {
        t.ticket(id)
            .filter(|ticket| ticket.user_id == user.id)
            .cloned()
    });

    Ok(Json(ticket.ok_or(SupportError::NotFound(id))?))
}
