use tracing::{debug, error, info, instrument};

use crate::error::{Error, Result};
use crate::influx::SeriesStore;
use crate::metrics;
use crate::model::{DailyMetricSet, DayWindow, MEASUREMENT, TimeSeriesPoint};

/// A store error tagged with the operation that produced it.
type Tagged<T> = std::result::Result<T, (&'static str, Error)>;

/// Per-cycle outcome, counted in days.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Replaces the stored point of every day in `sets`.
///
/// Each day is handled on its own: the day's window is cleared, then one point
/// is written. A failure is logged and the next day is still processed. Days
/// without any non-null metric are left untouched. Without a store this is a
/// no-op.
#[instrument(skip_all, fields(days = sets.len()))]
pub async fn upsert<S: SeriesStore>(store: Option<&S>, sets: &[DailyMetricSet]) -> UpsertReport {
    let mut report = UpsertReport::default();
    let Some(store) = store else {
        return report;
    };

    for set in sets {
        let Some(point) = set.to_point() else {
            debug!(date = %set.date, "no non-null metrics; skipping day");
            report.skipped += 1;
            continue;
        };

        match replace_day(store, set, &point).await {
            Ok(()) => {
                info!(date = %set.date, fields = point.fields.len(), "stored data point");
                metrics::inc_points_written(1);
                report.written += 1;
            }
            Err((op, err)) => {
                error!(date = %set.date, op, error = %err, "failed to store data point");
                metrics::inc_store_error(op);
                report.failed += 1;
            }
        }
    }
    report
}

async fn replace_day<S: SeriesStore>(
    store: &S,
    set: &DailyMetricSet,
    point: &TimeSeriesPoint,
) -> Tagged<()> {
    let window = DayWindow::for_date(set.date);
    tag("delete", store.delete_range(MEASUREMENT, window).await)?;
    debug!(date = %set.date, "deleted existing data points");
    tag("write", store.write_point(point).await)
}

fn tag<T>(op: &'static str, res: Result<T>) -> Tagged<T> {
    res.map_err(|err| (op, err))
}
