use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

/// Series every daily point is written to.
pub const MEASUREMENT: &str = "daily_metrics";

/// Metrics reported by the API for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMetricSet {
    pub date: NaiveDate,
    pub metrics: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub measurement: &'static str,
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Half-open interval `[start, end)` covering one UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn for_date(date: NaiveDate) -> Self {
        let start = midnight(date);
        let end = date
            .checked_add_days(Days::new(1))
            .map(midnight)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    #[cfg(test)]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

pub fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

impl FieldValue {
    /// Scalar view of a JSON value. Nulls, objects and arrays have none.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(b) => Some(FieldValue::Boolean(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Some(FieldValue::Integer(i)),
                None => n.as_f64().map(FieldValue::Float),
            },
            JsonValue::String(s) => Some(FieldValue::String(s.clone())),
            JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldValue::Integer(_) | FieldValue::Float(_))
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::String(s) => f.write_str(s),
        }
    }
}

impl DailyMetricSet {
    /// Non-null scalar fields in metric-name order.
    pub fn fields(&self) -> BTreeMap<String, FieldValue> {
        let mut fields = BTreeMap::new();
        for (name, value) in &self.metrics {
            match FieldValue::from_json(value) {
                Some(field) => {
                    fields.insert(name.clone(), field);
                }
                None if value.is_null() => {}
                None => {
                    warn!(date = %self.date, metric = %name, "dropping non-scalar metric")
                }
            }
        }
        fields
    }

    /// The point to store for this day, or `None` when no field survives.
    pub fn to_point(&self) -> Option<TimeSeriesPoint> {
        let fields = self.fields();
        if fields.is_empty() {
            return None;
        }
        Some(TimeSeriesPoint {
            measurement: MEASUREMENT,
            timestamp: midnight(self.date),
            fields,
        })
    }
}

/// Extracts `data.daily_data` from an API response, sorted by date.
pub fn parse_daily_data(body: &JsonValue) -> Vec<DailyMetricSet> {
    let Some(daily) = body
        .get("data")
        .and_then(|d| d.get("daily_data"))
        .and_then(JsonValue::as_object)
    else {
        debug!("no daily data found in API response");
        return Vec::new();
    };

    let mut sets = Vec::with_capacity(daily.len());
    for (key, value) in daily {
        let date = match NaiveDate::parse_from_str(key, "%Y-%m-%d") {
            Ok(date) => date,
            Err(err) => {
                warn!(key = %key, error = %err, "skipping entry with invalid date key");
                continue;
            }
        };
        let Some(metrics) = value.as_object() else {
            warn!(%date, "skipping day whose metrics are not an object");
            continue;
        };
        sets.push(DailyMetricSet {
            date,
            metrics: metrics.clone(),
        });
    }
    sets.sort_by_key(|s| s.date);
    sets
}

impl TimeSeriesPoint {
    /// InfluxDB line protocol with a seconds-precision timestamp.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(self.measurement, &[',', ' ']);
        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            match value {
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{v}i");
                }
                FieldValue::Float(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Boolean(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::String(v) => {
                    line.push('"');
                    line.push_str(&escape(v, &['"', '\\']));
                    line.push('"');
                }
            }
        }
        let _ = write!(line, " {}", self.timestamp.timestamp());
        line
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn scenario_drops_null_metrics() {
        let body = json!({"data":{"daily_data":{"2024-01-01":{"steps":1000,"sleep_score":null}}}});
        let sets = parse_daily_data(&body);
        assert_eq!(sets.len(), 1);

        let point = sets[0].to_point().unwrap();
        assert_eq!(point.measurement, "daily_metrics");
        assert_eq!(point.timestamp.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(point.fields.len(), 1);
        assert_eq!(point.fields["steps"], FieldValue::Integer(1000));
    }

    #[test]
    fn field_count_matches_non_null_metrics() {
        let body = json!({"data":{"daily_data":{"2024-03-02":{
            "steps": 8000,
            "hrv": 41.5,
            "recovery": "good",
            "nap": false,
            "vo2": null,
            "temp": null
        }}}});
        let point = parse_daily_data(&body)[0].to_point().unwrap();
        assert_eq!(point.fields.len(), 4);
        assert_eq!(point.fields["hrv"], FieldValue::Float(41.5));
        assert_eq!(point.fields["recovery"], FieldValue::String("good".into()));
        assert_eq!(point.fields["nap"], FieldValue::Boolean(false));
    }

    #[test]
    fn all_null_day_has_no_point() {
        let body = json!({"data":{"daily_data":{"2024-01-01":{"steps":null}, "2024-01-02":{}}}});
        let sets = parse_daily_data(&body);
        assert_eq!(sets.len(), 2);
        assert!(sets.iter().all(|s| s.to_point().is_none()));
    }

    #[test]
    fn nested_values_are_not_fields() {
        let body = json!({"data":{"daily_data":{"2024-01-01":{"zones":[1,2], "steps": 5}}}});
        let fields = parse_daily_data(&body)[0].fields();
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["steps"]);
    }

    #[test]
    fn missing_path_means_no_data() {
        assert!(parse_daily_data(&json!({})).is_empty());
        assert!(parse_daily_data(&json!({"data": {}})).is_empty());
        assert!(parse_daily_data(&json!({"data": {"daily_data": []}})).is_empty());
        assert!(parse_daily_data(&json!(null)).is_empty());
    }

    #[test]
    fn bad_keys_are_skipped_and_days_sorted() {
        let body = json!({"data":{"daily_data":{
            "2024-01-03": {"steps": 3},
            "yesterday": {"steps": 0},
            "2024-01-01": {"steps": 1},
            "2024-01-02": 7
        }}});
        let dates: Vec<_> = parse_daily_data(&body).iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 3)]);
    }

    #[test]
    fn day_window_is_half_open() {
        let window = DayWindow::for_date(date(2024, 2, 28));
        assert_eq!(window.start, midnight(date(2024, 2, 28)));
        assert_eq!(window.end, midnight(date(2024, 2, 29)));
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
    }

    #[test]
    fn line_protocol_escapes_and_types() {
        let mut fields = BTreeMap::new();
        fields.insert("steps".to_string(), FieldValue::Integer(1000));
        fields.insert("hrv avg".to_string(), FieldValue::Float(41.5));
        fields.insert("note".to_string(), FieldValue::String(r#"said "hi""#.into()));
        fields.insert("nap".to_string(), FieldValue::Boolean(true));
        let point = TimeSeriesPoint {
            measurement: MEASUREMENT,
            timestamp: midnight(date(2024, 1, 1)),
            fields,
        };
        assert_eq!(
            point.to_line_protocol(),
            r#"daily_metrics hrv\ avg=41.5,nap=true,note="said \"hi\"",steps=1000i 1704067200"#
        );
    }
}
