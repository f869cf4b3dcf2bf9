use std::time::Duration;

use chrono::SecondsFormat;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::InfluxSettings;
use crate::error::{Error, Result};
use crate::model::{DayWindow, TimeSeriesPoint};

/// The two backend operations the upserter relies on.
pub trait SeriesStore {
    /// Removes every point of `measurement` inside `window`. Deleting nothing succeeds.
    async fn delete_range(&self, measurement: &str, window: DayWindow) -> Result<()>;

    /// Writes one point and returns once the backend has accepted it.
    async fn write_point(&self, point: &TimeSeriesPoint) -> Result<()>;
}

#[derive(Clone)]
pub struct InfluxStore {
    http: reqwest::Client,
    base: Url,
    org: String,
    bucket: String,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    start: String,
    stop: String,
    predicate: &'a str,
}

impl InfluxStore {
    pub fn new(settings: &InfluxSettings, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(&settings.url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut auth = HeaderValue::from_str(&format!("Token {}", settings.token))
            .map_err(|_| Error::Config("INFLUX_TOKEN is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(concat!("daily-metrics-poller/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base,
            org: settings.org.clone(),
            bucket: settings.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base.join(path)?;
        url.query_pairs_mut()
            .append_pair("org", &self.org)
            .append_pair("bucket", &self.bucket);
        Ok(url)
    }

    /// Checks that the server answers its health endpoint.
    pub async fn ping(&self) -> Result<()> {
        let resp = self.http.get(self.base.join("health")?).send().await?;
        check("ping", resp).await
    }
}

impl SeriesStore for InfluxStore {
    #[instrument(skip(self), fields(bucket = %self.bucket, start = %window.start))]
    async fn delete_range(&self, measurement: &str, window: DayWindow) -> Result<()> {
        let predicate = format!("_measurement=\"{measurement}\"");
        // The delete API includes `stop`; back off one nanosecond to keep the window half-open.
        let stop = window.end - chrono::Duration::nanoseconds(1);
        let body = DeleteRequest {
            start: window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            stop: stop.to_rfc3339_opts(SecondsFormat::Nanos, true),
            predicate: &predicate,
        };
        let resp = self
            .http
            .post(self.endpoint("api/v2/delete")?)
            .json(&body)
            .send()
            .await?;
        check("delete", resp).await?;
        debug!("deleted existing points");
        Ok(())
    }

    #[instrument(skip_all, fields(bucket = %self.bucket, ts = %point.timestamp))]
    async fn write_point(&self, point: &TimeSeriesPoint) -> Result<()> {
        let mut url = self.endpoint("api/v2/write")?;
        url.query_pairs_mut().append_pair("precision", "s");
        let line = point.to_line_protocol();
        debug!(fields = point.fields.len(), bytes = line.len(), "writing point");
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await?;
        check("write", resp).await
    }
}

async fn check(op: &'static str, resp: reqwest::Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Store { op, status, body })
}
