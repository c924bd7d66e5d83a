use std::sync::Arc;

use actix_web::{
    HttpResponse, ResponseError,
    http::StatusCode,
    web::{self, Json, Path},
};
use derive_more::derive::{Display, Error};
use infrastructure::HttpClientConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::station::{
    DEFAULT_SCAN_INTERVAL_SECS, PollError, Registration, StationClient, StationRegistry, StationSettings, StationStatus, ValidationError, validate_host,
    validate_scan_interval, validate_timezone_update,
};

pub fn routes(registry: Arc<StationRegistry>, http_client: HttpClientConfig) -> actix_web::Scope {
    web::scope("/api/stations")
        .route("", web::get().to(list_stations))
        .route("", web::post().to(add_station))
        .route("/{host}", web::get().to(get_snapshot))
        .route("/{host}", web::delete().to(remove_station))
        .route("/{host}/status", web::get().to(get_status))
        .route("/{host}/last-rain", web::get().to(get_last_rain))
        .route("/{host}/refresh", web::post().to(refresh))
        .route("/{host}/reboot", web::post().to(reboot))
        .route("/{host}/timezone", web::post().to(set_timezone))
        .app_data(web::Data::from(registry))
        .app_data(web::Data::new(http_client))
}

type StationResponse = Result<HttpResponse, StationApiError>;

#[derive(Debug, Error, Display)]
enum StationApiError {
    #[display("Station not found")]
    NotFound,

    #[display("No data received from station yet")]
    NoData,

    #[display("Invalid input")]
    Invalid(ValidationError),

    #[display("Error polling station")]
    PollFailed(PollError),

    #[display("Internal error")]
    InternalError(anyhow::Error),
}

impl ResponseError for StationApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            StationApiError::NotFound => StatusCode::NOT_FOUND,
            StationApiError::NoData => StatusCode::SERVICE_UNAVAILABLE,
            StationApiError::Invalid(ValidationError::AlreadyConfigured) => StatusCode::CONFLICT,
            StationApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            StationApiError::PollFailed(PollError::Stopped) => StatusCode::SERVICE_UNAVAILABLE,
            StationApiError::PollFailed(_) => StatusCode::BAD_GATEWAY,
            StationApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        tracing::warn!("StationApiError: {:?}", self);

        let body = match self {
            StationApiError::Invalid(e) => json!({ "error": e.to_string(), "message": e.message() }),
            StationApiError::PollFailed(e) => json!({ "error": self.to_string(), "message": e.to_string() }),
            _ => json!({ "error": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

async fn station(registry: &StationRegistry, host: &str) -> Result<StationClient, StationApiError> {
    registry.get(host).await.ok_or(StationApiError::NotFound)
}

#[derive(Debug, Serialize)]
struct StationOverview {
    host: String,
    status: StationStatus,
    is_raining: Option<bool>,
}

async fn overview(client: &StationClient) -> StationOverview {
    StationOverview {
        host: client.host().to_owned(),
        status: client.status().await,
        is_raining: client.snapshot().await.and_then(|s| s.is_raining()),
    }
}

async fn list_stations(registry: web::Data<StationRegistry>) -> StationResponse {
    let mut stations = vec![];
    for client in registry.clients().await {
        stations.push(overview(&client).await);
    }

    Ok(HttpResponse::Ok().json(stations))
}

#[derive(Debug, Deserialize)]
struct AddStationRequest {
    host: String,
    #[serde(default)]
    scan_interval: Option<u64>,
}

async fn add_station(
    registry: web::Data<StationRegistry>,
    http_client: web::Data<HttpClientConfig>,
    request: Json<AddStationRequest>,
) -> StationResponse {
    let scan_interval = validate_scan_interval(request.scan_interval.unwrap_or(DEFAULT_SCAN_INTERVAL_SECS))
        .map_err(StationApiError::Invalid)?;

    let host = validate_host(&request.host, &http_client)
        .await
        .map_err(StationApiError::Invalid)?;

    let registration = registry
        .register(&StationSettings { host, scan_interval })
        .await
        .map_err(StationApiError::InternalError)?;

    match registration {
        Registration::Created(client) => Ok(HttpResponse::Created().json(overview(&client).await)),
        Registration::Existing(_) => Err(StationApiError::Invalid(ValidationError::AlreadyConfigured)),
    }
}

async fn remove_station(registry: web::Data<StationRegistry>, host: Path<String>) -> StationResponse {
    if registry.remove(&host).await {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(StationApiError::NotFound)
    }
}

async fn get_snapshot(registry: web::Data<StationRegistry>, host: Path<String>) -> StationResponse {
    let client = station(&registry, &host).await?;
    let snapshot = client.snapshot().await.ok_or(StationApiError::NoData)?;

    Ok(HttpResponse::Ok().json(snapshot.as_ref()))
}

async fn get_status(registry: web::Data<StationRegistry>, host: Path<String>) -> StationResponse {
    let client = station(&registry, &host).await?;

    Ok(HttpResponse::Ok().json(overview(&client).await))
}

async fn get_last_rain(registry: web::Data<StationRegistry>, host: Path<String>) -> StationResponse {
    let client = station(&registry, &host).await?;

    Ok(HttpResponse::Ok().json(client.last_rain().await))
}

async fn refresh(registry: web::Data<StationRegistry>, host: Path<String>) -> StationResponse {
    let client = station(&registry, &host).await?;
    let snapshot = client.refresh().await.map_err(StationApiError::PollFailed)?;

    Ok(HttpResponse::Ok().json(snapshot.as_ref()))
}

async fn reboot(registry: web::Data<StationRegistry>, host: Path<String>) -> StationResponse {
    let client = station(&registry, &host).await?;
    let success = client.reboot().await;

    Ok(HttpResponse::Ok().json(json!({ "success": success })))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DstInput {
    Flag(bool),
    Code(u8),
    Text(String),
}

impl DstInput {
    fn as_text(&self) -> String {
        match self {
            DstInput::Flag(true) => "on".to_string(),
            DstInput::Flag(false) => "off".to_string(),
            DstInput::Code(code) => code.to_string(),
            DstInput::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimezoneRequest {
    timezone: f64,
    dst: DstInput,
}

async fn set_timezone(
    registry: web::Data<StationRegistry>,
    host: Path<String>,
    request: Json<TimezoneRequest>,
) -> StationResponse {
    let client = station(&registry, &host).await?;
    let update = validate_timezone_update(request.timezone, &request.dst.as_text()).map_err(StationApiError::Invalid)?;

    //outcome is published as station event
    tokio::spawn(async move {
        client.set_timezone(update).await;
    });

    Ok(HttpResponse::Accepted().json(json!({
        "host": host.as_str(),
        "timezone": update.timezone,
        "dst": update.dst,
    })))
}
