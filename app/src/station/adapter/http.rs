use derive_more::derive::{Display, Error};
use infrastructure::HttpClientConfig;
use reqwest_middleware::ClientWithMiddleware;

const LIVE_DATA_PATH: &str = "/livedata.htm";
const STATION_PATH: &str = "/station.htm";
const REBOOT_PATH: &str = "/msgreboot.htm";

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum FetchError {
    #[display("Request timed out")]
    Timeout,

    #[display("Connection refused: {message}")]
    ConnectionRefused { message: String },

    #[display("Unexpected HTTP status {status}")]
    HttpStatus { status: u16 },

    #[display("Transport error: {message}")]
    Transport { message: String },
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::ConnectionRefused { .. } => "connection_refused",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::Transport { .. } => "transport",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::ConnectionRefused { message: e.to_string() }
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus { status: status.as_u16() }
        } else {
            FetchError::Transport { message: e.to_string() }
        }
    }
}

impl From<reqwest_middleware::Error> for FetchError {
    fn from(e: reqwest_middleware::Error) -> Self {
        match e {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => FetchError::Transport { message: format!("{:#}", e) },
        }
    }
}

/// Talks to the embedded web server of one station.
#[derive(Debug, Clone)]
pub struct StationHttpClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl StationHttpClient {
    pub fn new(host: &str, config: &HttpClientConfig) -> anyhow::Result<Self> {
        let client = config.new_tracing_client()?;

        Ok(Self {
            client,
            base_url: format!("http://{}", host),
        })
    }

    pub async fn fetch_live_data(&self) -> Result<String, FetchError> {
        self.get_text(LIVE_DATA_PATH).await
    }

    pub async fn fetch_station_page(&self) -> Result<String, FetchError> {
        self.get_text(STATION_PATH).await
    }

    //any 2xx counts as accepted, the body is irrelevant
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn reboot(&self) -> Result<(), FetchError> {
        self.get_text(REBOOT_PATH).await.map(|_| ())
    }

    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn post_clock_settings(&self, timezone: f64, dst: bool) -> Result<(), FetchError> {
        let form = [
            ("timezone", timezone.to_string()),
            ("dst", if dst { "1" } else { "0" }.to_string()),
            ("Apply", "Apply".to_string()),
        ];

        let response = self
            .client
            .post(format!("{}{}", self.base_url, STATION_PATH))
            .form(&form)
            .send()
            .await?;

        response.error_for_status()?;
        Ok(())
    }

    async fn get_text(&self, path: &str) -> Result<String, FetchError> {
        let response = self.client.get(format!("{}{}", self.base_url, path)).send().await?;
        let text = response.error_for_status()?.text().await?;

        Ok(text)
    }
}
