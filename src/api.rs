use std::time::Duration;

use chrono::{Days, Local, NaiveDate};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::model::{DailyMetricSet, parse_daily_data};

/// Source of "today" for the polling window.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Yesterday through today.
pub fn date_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    (start, today)
}

pub fn request_url(base: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{}/?&start_date={}&end_date={}",
        base.trim_end_matches('/'),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let mut auth = HeaderValue::from_str(token)
            .map_err(|_| Error::Config("API_TOKEN is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(concat!("daily-metrics-poller/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    /// Fetches the two-day window ending at `today`.
    #[instrument(skip(self))]
    pub async fn fetch(&self, today: NaiveDate) -> Result<Vec<DailyMetricSet>> {
        let (start, end) = date_range(today);
        let url = request_url(&self.base_url, start, end);
        debug!(%url, "polling api");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }

        let bytes = resp.bytes().await?;
        let body: JsonValue = serde_json::from_slice(&bytes)?;
        let sets = parse_daily_data(&body);
        debug!(days = sets.len(), "api response parsed");
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        http::{HeaderMap as AxumHeaders, StatusCode, Uri},
        routing::get,
    };
    use std::sync::{Arc, Mutex};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/daily_trend")
    }

    #[test]
    fn range_spans_yesterday_to_today() {
        assert_eq!(date_range(date(2024, 3, 1)), (date(2024, 2, 29), date(2024, 3, 1)));
    }

    #[test]
    fn url_carries_both_dates() {
        let url = request_url(
            "https://example.test/api/daily_trend/",
            date(2024, 1, 1),
            date(2024, 1, 2),
        );
        assert_eq!(
            url,
            "https://example.test/api/daily_trend/?&start_date=2024-01-01&end_date=2024-01-02"
        );
    }

    #[tokio::test]
    async fn fetch_sends_token_and_parses_days() {
        let seen: Arc<Mutex<Option<(String, String)>>> = Arc::default();
        let seen_in = seen.clone();
        let app = Router::new().route(
            "/daily_trend/",
            get(move |uri: Uri, headers: AxumHeaders| {
                let seen = seen_in.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *seen.lock().unwrap() = Some((uri.query().unwrap_or_default().to_string(), auth));
                    r#"{"data":{"daily_data":{"2024-01-01":{"steps":1000,"sleep_score":null}}}}"#
                }
            }),
        );
        let base = serve(app).await;
        let client = ApiClient::new(&base, "secret-token", Duration::from_secs(5)).unwrap();

        let sets = client.fetch(date(2024, 1, 2)).await.unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].date, date(2024, 1, 1));

        let (query, auth) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(query, "&start_date=2024-01-01&end_date=2024-01-02");
        assert_eq!(auth, "secret-token");
    }

    #[tokio::test]
    async fn server_error_is_a_fetch_error_with_body() {
        let app = Router::new().route(
            "/daily_trend/",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") }),
        );
        let base = serve(app).await;
        let client = ApiClient::new(&base, "t", Duration::from_secs(5)).unwrap();

        let err = client.fetch(date(2024, 1, 2)).await.unwrap_err();
        match err {
            Error::Status { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_a_parse_error() {
        let app = Router::new().route("/daily_trend/", get(|| async { "<html>maintenance</html>" }));
        let base = serve(app).await;
        let client = ApiClient::new(&base, "t", Duration::from_secs(5)).unwrap();

        let err = client.fetch(date(2024, 1, 2)).await.unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn refused_connection_is_an_http_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client =
            ApiClient::new(&format!("http://{addr}/daily_trend"), "t", Duration::from_secs(5)).unwrap();

        let err = client.fetch(date(2024, 1, 2)).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert_eq!(err.kind(), "http");
    }

    #[tokio::test]
    async fn missing_daily_data_is_empty() {
        let app = Router::new().route("/daily_trend/", get(|| async { r#"{"data":{}}"# }));
        let base = serve(app).await;
        let client = ApiClient::new(&base, "t", Duration::from_secs(5)).unwrap();

        assert!(client.fetch(date(2024, 1, 2)).await.unwrap().is_empty());
    }
}
