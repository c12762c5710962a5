//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Password hashing and anything else CPU-heavy happens in the engine
//! on the blocking thread pool; everything else here is async I/O.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use raiz_engine::{
    api::{
        order_objects::{NewOrderRequest, OrderWithResults, PaymentConfirmation, SearchResultSubmission},
        user_objects::{NewUserRequest, ProfileUpdateRequest, UserProfile},
    },
    traits::{AuthManagement, JobQueue, OrderLifecycleDatabase, OrderManagement, PaymentGateway, UserManagement},
    AccountApi,
    AuthApi,
    OrderFlowApi,
};
use stripe_tools::SIGNATURE_HEADER;

use crate::{
    auth::{AuthenticatedUser, TokenIssuer, TokenType},
    data_objects::{
        CheckoutSessionRequest,
        DetailResponse,
        ForgotPasswordRequest,
        LoginRequest,
        RefreshQuery,
        RefreshRequest,
        ResetPasswordRequest,
        StatusResponse,
    },
    errors::{AuthError, ServerError},
};

pub const FORGOT_PASSWORD_REPLY: &str = "Se o e-mail estiver registrado, enviaremos instruções de redefinição";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
route!(register => Post "/auth/register" impl UserManagement, AuthManagement, JobQueue);
/// Creates a new account. The new user is sent a welcome email.
pub async fn register<B>(
    body: web::Json<NewUserRequest>,
    api: web::Data<AuthApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: UserManagement + AuthManagement + JobQueue,
{
    trace!("💻️ Received registration request");
    let user = api.register(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(UserProfile::from(user)))
}

route!(login => Post "/auth/login" impl UserManagement, AuthManagement, JobQueue);
/// Exchanges an email and password for an access and refresh token pair.
///
/// The credentials may be sent as an HTML form (`username` and `password` fields, as OAuth2 password-flow clients do)
/// or as JSON.
pub async fn login<B>(
    body: web::Either<web::Form<LoginRequest>, web::Json<LoginRequest>>,
    api: web::Data<AuthApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError>
where
    B: UserManagement + AuthManagement + JobQueue,
{
    let credentials = match body {
        web::Either::Left(form) => form.into_inner(),
        web::Either::Right(json) => json.into_inner(),
    };
    trace!("💻️ Received login request");
    let user = api.authenticate(&credentials.username, &credentials.password).await?;
    let tokens = signer.issue_token_pair(user.id)?;
    debug!("💻️ Issued tokens for user #{}", user.id);
    Ok(HttpResponse::Ok().json(tokens))
}

route!(forgot_password => Post "/auth/forgot-password" impl UserManagement, AuthManagement, JobQueue);
/// Always replies with the same message, so that the endpoint cannot be used to discover registered emails.
pub async fn forgot_password<B>(
    body: web::Json<ForgotPasswordRequest>,
    api: web::Data<AuthApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: UserManagement + AuthManagement + JobQueue,
{
    trace!("💻️ Received forgot password request");
    if let Err(e) = api.request_password_reset(&body.email).await {
        error!("💻️ Could not issue password reset token. {e}");
    }
    Ok(HttpResponse::Ok().json(DetailResponse::new(FORGOT_PASSWORD_REPLY)))
}

route!(reset_password => Post "/auth/reset-password" impl UserManagement, AuthManagement, JobQueue);
pub async fn reset_password<B>(
    body: web::Json<ResetPasswordRequest>,
    api: web::Data<AuthApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: UserManagement + AuthManagement + JobQueue,
{
    trace!("💻️ Received password reset");
    let ResetPasswordRequest { token, new_password } = body.into_inner();
    api.reset_password(&token, &new_password).await?;
    Ok(HttpResponse::Ok().json(DetailResponse::new("Password has been reset")))
}

route!(refresh => Post "/auth/refresh" impl UserManagement, AuthManagement, JobQueue);
/// Issues a new token pair in exchange for a valid refresh token.
///
/// The refresh token can be given as the `token` query parameter or as `refresh_token` in a JSON body.
pub async fn refresh<B>(
    query: web::Query<RefreshQuery>,
    body: Option<web::Json<RefreshRequest>>,
    api: web::Data<AuthApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError>
where
    B: UserManagement + AuthManagement + JobQueue,
{
    let token = query
        .into_inner()
        .token
        .or_else(|| body.map(|b| b.into_inner().refresh_token))
        .filter(|t| !t.trim().is_empty())
        .ok_or(AuthError::MissingToken)?;
    let claims = signer.validate(token.trim(), TokenType::Refresh)?;
    let user_id = claims.user_id()?;
    let user = api.fetch_user(user_id).await?.ok_or(AuthError::AccountNotFound)?;
    debug!("💻️ Refreshing tokens for user #{}", user.id);
    let tokens = signer.issue_token_pair(user.id)?;
    Ok(HttpResponse::Ok().json(tokens))
}

//----------------------------------------------   Users  ----------------------------------------------------
route!(my_profile => Get "/users/me" impl OrderManagement, UserManagement);
pub async fn my_profile<B>(
    user: AuthenticatedUser,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + UserManagement,
{
    debug!("💻️ GET profile for user #{}", user.user_id);
    let profile = api.profile(user.user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

route!(update_my_profile => Put "/users/me" impl OrderManagement, UserManagement);
pub async fn update_my_profile<B>(
    user: AuthenticatedUser,
    body: web::Json<ProfileUpdateRequest>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + UserManagement,
{
    debug!("💻️ PUT profile for user #{}", user.user_id);
    let profile = api.update_profile(user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderLifecycleDatabase);
/// Creates a new order for the caller. The order must be paid for via `/checkout/create-session` before the search
/// starts.
pub async fn create_order<B: OrderLifecycleDatabase>(
    user: AuthenticatedUser,
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST new order for user #{}", user.user_id);
    let order = api.create_order(user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(OrderWithResults::new(order, vec![])))
}

route!(my_orders => Get "/orders" impl OrderManagement, UserManagement);
/// The caller's orders, newest first, each with its search results.
pub async fn my_orders<B>(user: AuthenticatedUser, api: web::Data<AccountApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + UserManagement {
    debug!("💻️ GET orders for user #{}", user.user_id);
    let orders = api.orders_for_user(user.user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement, UserManagement);
pub async fn order_by_id<B>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + UserManagement,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order #{order_id} for user #{}", user.user_id);
    let order = api.order_for_user(user.user_id, order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(create_checkout_session => Post "/checkout/create-session" impl OrderLifecycleDatabase);
/// Opens a hosted checkout for one of the caller's unpaid orders and returns the session id and payment URL.
pub async fn create_checkout_session<B: OrderLifecycleDatabase>(
    user: AuthenticatedUser,
    body: web::Json<CheckoutSessionRequest>,
    api: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<dyn PaymentGateway>,
) -> Result<HttpResponse, ServerError> {
    let order_id = body.order_id;
    debug!("💻️ Checkout requested for order #{order_id} by user #{}", user.user_id);
    let session = api.begin_checkout(gateway.get_ref(), order_id, Some(user.user_id)).await?;
    Ok(HttpResponse::Ok().json(session))
}

route!(stripe_webhook => Post "/webhooks/stripe" impl OrderLifecycleDatabase);
/// Payment provider callback.
///
/// The signature covers the raw body, so the body is taken as bytes and handed to the gateway untouched.
pub async fn stripe_webhook<B: OrderLifecycleDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<dyn PaymentGateway>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received Stripe webhook");
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::InvalidSignature(format!("Missing {SIGNATURE_HEADER} header")))?;
    match api.on_payment_confirmed(gateway.get_ref(), &body, signature).await? {
        PaymentConfirmation::Started(order) => info!("💻️ Order #{} is now {}", order.id, order.status),
        PaymentConfirmation::AlreadyProcessed(id) => debug!("💻️ Duplicate payment confirmation for order #{id}"),
        PaymentConfirmation::Ignored(event) => trace!("💻️ Ignored Stripe event {event}"),
    }
    Ok(HttpResponse::Ok().json(StatusResponse::success()))
}

//----------------------------------------------   Internal  ----------------------------------------------------
route!(submit_search_result => Post "/search_results" impl OrderLifecycleDatabase);
/// Stores a search result reported by an external robot. Mounted under `/internal`, behind the API key check.
pub async fn submit_search_result<B: OrderLifecycleDatabase>(
    body: web::Json<SearchResultSubmission>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let submission = body.into_inner();
    debug!("💻️ External result from '{}' for order #{}", submission.source_name, submission.order_id);
    api.submit_result(submission).await?;
    Ok(HttpResponse::Created().json(DetailResponse::new("Result saved")))
}
