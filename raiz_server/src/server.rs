use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use log::*;
use raiz_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    search::{default_sources, SearchOrchestrator},
    traits::PaymentGateway,
    AccountApi,
    AuthApi,
    OrderFlowApi,
    SqliteDatabase,
};
use tokio::sync::Notify;

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    integrations::{Mailer, StripeGateway},
    middleware::{ApiKeyMiddlewareFactory, CorsMiddlewareFactory},
    routes::{
        health,
        CreateCheckoutSessionRoute,
        CreateOrderRoute,
        ForgotPasswordRoute,
        LoginRoute,
        MyOrdersRoute,
        MyProfileRoute,
        OrderByIdRoute,
        RefreshRoute,
        RegisterRoute,
        ResetPasswordRoute,
        StripeWebhookRoute,
        SubmitSearchResultRoute,
        UpdateMyProfileRoute,
    },
    workers::{start_mail_worker, start_search_workers},
};

const EVENT_BUFFER_SIZE: usize = 64;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database migrations are up to date");

    let wake_workers = Arc::new(Notify::new());
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks(Arc::clone(&wake_workers)));
    let producers = handlers.producers();
    handlers.start_handlers();

    let sources = default_sources(config.workers.source_delay);
    let orchestrator =
        SearchOrchestrator::new(db.clone(), producers.clone(), sources, config.workers.source_timeout);
    info!("🚀️ Starting {} search workers. {orchestrator:?}", config.workers.search_workers);
    let _search_workers =
        start_search_workers(db.clone(), Arc::new(orchestrator), &config.workers, Arc::clone(&wake_workers));
    let mailer = Mailer::new(&config.mail).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let _mail_worker = start_mail_worker(db.clone(), mailer, config.workers.poll_interval, wake_workers);

    let gateway = StripeGateway::new(config.stripe.clone(), &config.frontend_base_url)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db, Arc::new(gateway), producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Wakes the workers as soon as an order is paid, rather than on their next poll.
pub fn create_event_hooks(wake_workers: Arc<Notify>) -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_processing(move |ev| {
        let wake = Arc::clone(&wake_workers);
        Box::pin(async move {
            debug!("📬️ Order #{} is processing. Waking workers", ev.order.id);
            wake.notify_waiters();
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_order_completed(|ev| {
        Box::pin(async move {
            info!("📬️ Order #{} completed with status {}", ev.order.id, ev.order.status);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: Arc<dyn PaymentGateway>,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let gateway = web::Data::from(gateway);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let accounts_api = AccountApi::new(db.clone());
        let auth_api = AuthApi::new(db.clone(), config.frontend_base_url.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let api_key = ApiKeyMiddlewareFactory::new(config.internal_api_key.clone())
            .with_forwarding(config.use_x_forwarded_for, config.use_forwarded);
        App::new()
            .wrap(CorsMiddlewareFactory::new(&config.cors_origins))
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("raiz::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(jwt_signer))
            .app_data(gateway.clone())
            .configure(|cfg| configure_routes(cfg, api_key))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every route of the API.
///
/// The API objects, the [`TokenIssuer`] and the payment gateway must already have been added to the app data.
pub fn configure_routes(cfg: &mut ServiceConfig, api_key: ApiKeyMiddlewareFactory) {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into());
    let internal_scope =
        web::scope("/internal").wrap(api_key).service(SubmitSearchResultRoute::<SqliteDatabase>::new());
    cfg.app_data(json_config)
        .service(health)
        .service(RegisterRoute::<SqliteDatabase>::new())
        .service(LoginRoute::<SqliteDatabase>::new())
        .service(ForgotPasswordRoute::<SqliteDatabase>::new())
        .service(ResetPasswordRoute::<SqliteDatabase>::new())
        .service(RefreshRoute::<SqliteDatabase>::new())
        .service(MyProfileRoute::<SqliteDatabase>::new())
        .service(UpdateMyProfileRoute::<SqliteDatabase>::new())
        .service(CreateOrderRoute::<SqliteDatabase>::new())
        .service(MyOrdersRoute::<SqliteDatabase>::new())
        .service(OrderByIdRoute::<SqliteDatabase>::new())
        .service(CreateCheckoutSessionRoute::<SqliteDatabase>::new())
        .service(StripeWebhookRoute::<SqliteDatabase>::new())
        .service(internal_scope);
}
