use std::env;
use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agrimarket_backend::handlers::notification_ws::AlertBroadcaster;
use agrimarket_backend::handlers::{market_price, notification, notification_ws, price_alert};
use agrimarket_backend::jobs::alert_evaluation_sync::start_alert_evaluation_job;
use agrimarket_backend::services::alert_evaluator::AlertEvaluator;
use agrimarket_backend::services::notification_dispatcher::NotificationDispatcher;
use agrimarket_backend::services::store::DbStore;
use agrimarket_backend::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agrimarket_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let store = Arc::new(DbStore::new(db.clone()));
    let alert_broadcaster = AlertBroadcaster::new();

    // Wire up the alert pipeline and start the evaluation job
    let evaluator = Arc::new(AlertEvaluator::new(store.clone(), store.clone()));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        store.clone(),
        store.clone(),
        alert_broadcaster.clone(),
    ));
    start_alert_evaluation_job(evaluator, dispatcher).await;

    let state = AppState {
        db,
        notifications: store,
        alert_broadcaster,
    };

    // Build router
    let app = Router::new()
        .route(
            "/api/market-prices",
            get(market_price::get_market_prices).post(market_price::submit_market_price),
        )
        .route(
            "/api/market-prices/{id}/status",
            put(market_price::moderate_market_price),
        )
        .route(
            "/api/price-alerts",
            get(price_alert::get_price_alerts).post(price_alert::create_price_alert),
        )
        .route(
            "/api/price-alerts/{id}",
            put(price_alert::update_price_alert).delete(price_alert::delete_price_alert),
        )
        .route(
            "/api/notifications",
            get(notification::get_notifications)
                .put(notification::update_notifications)
                .post(notification::update_notifications),
        )
        .route(
            "/api/notifications/ws",
            get(notification_ws::notifications_websocket),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind HTTP listener");

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
