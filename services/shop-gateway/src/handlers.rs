use crate::errors::GatewayError;
use crate::models::{AuthRequest, AuthResponse, SendCoinRequest};
use crate::security_middleware::{Claims, JwtAuth, TokenIssuer};
use crate::services::ShopService;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::warn;

/// Health check endpoint
pub async fn health_check(service: web::Data<ShopService>) -> HttpResponse {
    match service.ledger().store().health_check().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "shop-gateway",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => {
            warn!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "service": "shop-gateway"
            }))
        }
    }
}

/// Login endpoint; unknown usernames are registered
pub async fn authenticate(
    service: web::Data<ShopService>,
    request: web::Json<AuthRequest>,
) -> Result<HttpResponse, GatewayError> {
    let token = service.authenticate(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AuthResponse { token }))
}

/// Balance, inventory and coin history of the caller
pub async fn get_info(
    service: web::Data<ShopService>,
    claims: Claims,
) -> Result<HttpResponse, GatewayError> {
    let info = service.get_info(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(info))
}

/// Send coins endpoint
pub async fn send_coin(
    service: web::Data<ShopService>,
    claims: Claims,
    request: web::Json<SendCoinRequest>,
) -> Result<HttpResponse, GatewayError> {
    service
        .send_coin(claims.user_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().finish())
}

/// Buy item endpoint
pub async fn buy_item(
    service: web::Data<ShopService>,
    claims: Claims,
    item: web::Path<String>,
) -> Result<HttpResponse, GatewayError> {
    service.buy_item(claims.user_id, &item).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(service: web::Data<ShopService>) -> HttpResponse {
    match service.ledger().metrics().render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Malformed JSON bodies become `400 {"error": "invalid request body"}`
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Rejected request body: {}", err);
        GatewayError::InvalidRequest(err.to_string()).into()
    })
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig, tokens: TokenIssuer) {
    cfg.app_data(json_config())
        .route("/api/auth", web::post().to(authenticate))
        .service(
            web::scope("/api")
                .wrap(JwtAuth::new(tokens))
                .route("/info", web::get().to(get_info))
                .route("/sendCoin", web::post().to(send_coin))
                .route("/buy/{item}", web::get().to(buy_item)),
        )
        .route("/metrics", web::get().to(metrics_endpoint))
        .route("/health", web::get().to(health_check));
}
