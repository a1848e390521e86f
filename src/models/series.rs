use crate::domain::Bar;

/// What `apply_update` did with an incoming bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The bar keyed the same bucket as the stored last bar and replaced it
    /// in place. Series length unchanged.
    PatchedLast,
    /// The bar opened a new bucket and was pushed as the new last element.
    Appended,
    /// The bar keyed a bucket older than the stored last bar. The series is
    /// untouched; the upstream bucket clock is assumed monotonic, so this
    /// only happens on late or replayed events.
    RejectedOutOfOrder,
}

/// The ordered bar series backing one chart.
///
/// Invariant: `open_time` is strictly increasing across the stored bars.
/// The series is replaced wholesale by the periodic bulk refresh and patched
/// incrementally by stream events; it never grows anywhere but at the end.
#[derive(Debug, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self { bars: Vec::new() }
    }

    /// Install a full, caller-sorted series. Insertion order is trusted;
    /// the backend returns bars ascending by `open_time`.
    pub fn replace(&mut self, bars: Vec<Bar>) {
        self.bars = bars;
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }

    /// Merge one live bar into the series: same bucket as the last bar means
    /// an in-place patch, a newer bucket means an append, an older bucket is
    /// rejected untouched.
    pub fn apply_update(&mut self, bar: &Bar) -> ApplyOutcome {
        let Some(last) = self.bars.last_mut() else {
            self.bars.push(*bar);
            return ApplyOutcome::Appended;
        };

        if bar.open_time == last.open_time {
            *last = *bar;
            ApplyOutcome::PatchedLast
        } else if bar.open_time > last.open_time {
            self.bars.push(*bar);
            ApplyOutcome::Appended
        } else {
            ApplyOutcome::RejectedOutOfOrder
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open_time: i64, close: f64) -> Bar {
        Bar {
            open_time,
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn update_on_empty_series_appends_sole_element() {
        let mut series = BarSeries::new();

        assert_eq!(series.apply_update(&bar(100, 5.0)), ApplyOutcome::Appended);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn same_bucket_patches_in_place_without_growing() {
        let mut series = BarSeries::new();
        series.replace(vec![bar(100, 5.0)]);

        let outcome = series.apply_update(&bar(100, 7.5));

        assert_eq!(outcome, ApplyOutcome::PatchedLast);
        assert_eq!(series.len(), 1);
        assert_eq!(series.last().unwrap().close, 7.5);
    }

    #[test]
    fn newer_bucket_appends() {
        let mut series = BarSeries::new();
        series.replace(vec![bar(100, 5.0)]);

        let outcome = series.apply_update(&bar(160, 6.0));

        assert_eq!(outcome, ApplyOutcome::Appended);
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().open_time, 160);
    }

    #[test]
    fn older_bucket_is_rejected_untouched() {
        let mut series = BarSeries::new();
        series.replace(vec![bar(100, 5.0), bar(160, 6.0)]);

        let outcome = series.apply_update(&bar(40, 3.0));

        assert_eq!(outcome, ApplyOutcome::RejectedOutOfOrder);
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, 6.0);
    }

    #[test]
    fn non_decreasing_stream_keeps_series_strictly_increasing() {
        let mut series = BarSeries::new();
        let stream = [100, 100, 160, 160, 160, 220, 280, 280];

        for (i, ts) in stream.iter().enumerate() {
            series.apply_update(&bar(*ts, i as f64));
        }

        let times: Vec<i64> = series.bars().iter().map(|b| b.open_time).collect();
        assert_eq!(times, vec![100, 160, 220, 280]);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        // Each bucket holds the payload of its latest update.
        assert_eq!(series.last().unwrap().close, 7.0);
    }
}
