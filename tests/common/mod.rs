// Shared across test binaries; not every binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use deliber_api::{
    auth::{hash_password, AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{user, ActorRole},
    events::{self, EventSender},
    notifications::{
        Notification, NotificationBuilder, NotificationError, NotificationService,
    },
    services::AppServices,
    AppState,
};

/// In-memory notification store so notification endpoints can be exercised
/// without a running Redis.
#[derive(Default)]
pub struct InMemoryNotificationService {
    store: std::sync::Mutex<Vec<Notification>>,
}

#[async_trait::async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        self.store.lock().unwrap().push(notification);
        Ok(())
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, NotificationError> {
        let mut items: Vec<Notification> = self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        Ok(items)
    }

    async fn get_notification(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<Notification>, NotificationError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == notification_id)
            .cloned())
    }

    async fn mark_as_read(&self, notification_id: Uuid) -> Result<(), NotificationError> {
        let mut store = self.store.lock().unwrap();
        match store.iter_mut().find(|n| n.id == notification_id) {
            Some(notification) => {
                notification.read = true;
                Ok(())
            }
            None => Err(NotificationError::NotFound(notification_id)),
        }
    }
}

/// Test harness backed by a throwaway SQLite database. Each instance gets its
/// own file so tests can run in parallel; the file is removed on drop.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub customer: user::Model,
    pub supplier: user::Model,
    pub courier: user::Model,
    pub admin: user::Model,
    auth_service: Arc<AuthService>,
    db_file: String,
    event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_file = format!("deliber_test_{}.db", Uuid::new_v4());

        let mut cfg = AppConfig::new(
            format!("sqlite://{db_file}?mode=rwc"),
            "redis://127.0.0.1:6379".to_string(),
            "integration_test_secret_key_with_plenty_of_entropy_0123456789abcd".to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        // No notification sink in tests; events are drained and logged.
        let event_task = tokio::spawn(events::process_events(event_rx, None));

        let redis_client = Arc::new(
            redis::Client::open(cfg.redis_url.clone()).expect("invalid redis url for tests"),
        );
        let notification_service: Arc<dyn NotificationService> =
            Arc::new(InMemoryNotificationService::default());

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
            Duration::from_secs(cfg.refresh_token_expiration as u64),
        );
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            notification_service,
            dec!(0.10),
            dec!(0.20),
        );

        let state = AppState {
            db: db_arc.clone(),
            config: cfg.clone(),
            event_sender,
            services,
            redis: redis_client,
        };

        let password_hash = hash_password("password123").expect("hash test password");
        let customer = seed_user(&db_arc, ActorRole::Customer, "customer@test.dev", &password_hash).await;
        let supplier = seed_user(&db_arc, ActorRole::Supplier, "supplier@test.dev", &password_hash).await;
        let courier = seed_user(&db_arc, ActorRole::Courier, "courier@test.dev", &password_hash).await;
        let admin = seed_user(&db_arc, ActorRole::Admin, "admin@test.dev", &password_hash).await;

        let auth_service_for_layer = auth_service.clone();
        let api_router = deliber_api::api_v1_routes().layer(middleware::from_fn_with_state(
            auth_service_for_layer,
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: Request<Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ));

        let router = Router::new()
            .nest("/api/v1", api_router)
            .nest(
                "/auth",
                deliber_api::auth::auth_routes().with_state(auth_service.clone()),
            )
            .with_state(state.clone());

        Self {
            router,
            state,
            customer,
            supplier,
            courier,
            admin,
            auth_service,
            db_file,
            event_task,
        }
    }

    /// Mint an access token for any seeded user.
    pub async fn token_for(&self, user: &user::Model) -> String {
        self.auth_service
            .generate_token(user)
            .await
            .expect("generate test token")
            .access_token
    }

    /// Store a notification for a user directly, bypassing the event loop.
    pub async fn seed_notification(&self, user: &user::Model) -> Notification {
        let notification =
            NotificationBuilder::order_status(user.id, Uuid::new_v4(), "EN_ROUTE");
        self.state
            .services
            .notifications
            .send(notification.clone())
            .await
            .expect("seed notification");
        notification
    }

    /// Seed an additional user beyond the four defaults.
    pub async fn seed_extra_user(&self, role: ActorRole, email: &str) -> user::Model {
        let password_hash = hash_password("password123").expect("hash test password");
        seed_user(&self.state.db, role, email, &password_hash).await
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for requests on behalf of a seeded user.
    pub async fn request_as(
        &self,
        user: &user::Model,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let token = self.token_for(user).await;
        self.request(method, uri, body, Some(&token)).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.event_task.abort();
        let _ = std::fs::remove_file(&self.db_file);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_file));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_file));
    }
}

async fn seed_user(
    db: &sea_orm::DatabaseConnection,
    role: ActorRole,
    email: &str,
    password_hash: &str,
) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test {}", role.as_str())),
        email: Set(email.to_string()),
        role: Set(role),
        password_hash: Set(password_hash.to_string()),
        active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed test user")
}
