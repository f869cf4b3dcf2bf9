use std::fmt::Write as _;

use crate::model::{DailyMetricSet, MEASUREMENT, midnight};

const RULE: &str = "--------------------------------------------------";

/// Human-readable rendering of what a cycle is about to store.
pub fn render(sets: &[DailyMetricSet]) -> String {
    if sets.is_empty() {
        return "No daily data found in API response".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Data to be stored in InfluxDB:");
    let _ = writeln!(out, "{RULE}");
    for set in sets {
        let width = set.metrics.keys().map(|k| k.len()).max().unwrap_or(0);
        let _ = writeln!(out);
        let _ = writeln!(out, "Measurement: {MEASUREMENT}");
        let _ = writeln!(out, "Timestamp  : {}", midnight(set.date).format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Fields     :");
        for (name, value) in set.fields() {
            if value.is_numeric() {
                let _ = writeln!(out, "  {name:<width$} = {:>8}", value.to_string());
            } else {
                let _ = writeln!(out, "  {name:<width$} = {value}");
            }
        }
    }
    out.push_str(RULE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_daily_data;
    use serde_json::json;

    #[test]
    fn aligns_names_and_numbers() {
        let body = json!({"data":{"daily_data":{"2024-01-01":{
            "steps": 1000,
            "sleep_score": null,
            "mood": "calm"
        }}}});
        let text = render(&parse_daily_data(&body));
        assert!(text.starts_with("Data to be stored in InfluxDB:\n"));
        assert!(text.contains("Timestamp  : 2024-01-01 00:00:00\n"));
        assert!(text.contains("  steps       =     1000\n"));
        assert!(text.contains("  mood        = calm\n"));
        assert!(!text.contains("sleep_score ="));
        assert!(text.ends_with(RULE));
    }

    #[test]
    fn empty_input_says_so() {
        assert_eq!(render(&[]), "No daily data found in API response");
    }
}
