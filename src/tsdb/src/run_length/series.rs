use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use common_base::point::{FieldValue, SeriesSample};
use iotdb_utils::time::now_utc;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{Result, TsdbError};
use crate::notify::{ErrorEvent, ErrorNotifier};
use crate::run_length::{RunCollection, RunLengthOptions, TsItem};
use crate::task::BackgroundWork;

#[derive(Debug)]
struct TsValue {
    value: FieldValue,
    timestamp: DateTime<Utc>,
}

/// RunLengthSeries buffers samples in memory and appends them to run
/// documents of a [`RunCollection`] when flushed.
///
/// Reads go straight to the collection, so samples still queued are not
/// visible until the next flush.
pub struct RunLengthSeries<C> {
    collection: Arc<C>,
    options: RunLengthOptions,

    tx: UnboundedSender<TsValue>,
    rx: Mutex<UnboundedReceiver<TsValue>>,
    processing: AtomicBool,

    notifier: ErrorNotifier,
}

impl<C: RunCollection> RunLengthSeries<C> {
    pub fn new(collection: Arc<C>, options: RunLengthOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = ErrorNotifier::new(options.error_channel_capacity);
        Self {
            collection,
            options,
            tx,
            rx: Mutex::new(rx),
            processing: AtomicBool::new(false),
            notifier,
        }
    }

    pub fn collection(&self) -> &Arc<C> {
        &self.collection
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.notifier.subscribe()
    }

    /// enqueue queues `value` for the next flush. A missing timestamp means now.
    pub fn enqueue(&self, value: impl Into<FieldValue>, timestamp: Option<DateTime<Utc>>) {
        let item = TsValue {
            value: value.into(),
            timestamp: timestamp.unwrap_or_else(now_utc),
        };
        // the receiver lives as long as self
        let _ = self.tx.send(item);
    }

    pub fn enqueue_now(&self, value: impl Into<FieldValue>) {
        self.enqueue(value, None)
    }

    /// count returns the number of run documents.
    pub fn count(&self) -> Result<u64> {
        self.collection.count()
    }

    /// flush drains up to `max_items_per_flush` queued samples into the latest
    /// run document, starting new documents whenever one is full. Returns the
    /// number of samples applied; 0 if another flush is already running.
    ///
    /// A sample older than its run's last timestamp is dropped and reported
    /// on the error channel.
    pub fn flush(&self) -> Result<usize> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(0);
        }

        let result = self.flush_queue();
        self.processing.store(false, Ordering::Release);
        result
    }

    fn flush_queue(&self) -> Result<usize> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let first = match rx.try_recv() {
            Ok(item) => item,
            Err(_) => return Ok(0),
        };
        let drained = std::iter::once(first)
            .chain(std::iter::from_fn(|| rx.try_recv().ok()))
            .take(self.options.max_items_per_flush.max(1));

        let (mut run, mut is_new) = match self.collection.latest()? {
            Some(run) if run.len() < self.options.max_run_values => (run, false),
            _ => (TsItem::new(), true),
        };

        let mut dirty = false;
        let mut applied = 0;
        for item in drained {
            if run.len() >= self.options.max_run_values {
                self.persist(&run, is_new, dirty)?;
                run = TsItem::new();
                is_new = true;
                dirty = false;
            }

            match run.add(item.value, item.timestamp) {
                Ok(()) => {
                    applied += 1;
                    dirty = true;
                }
                Err(e) => self.notifier.notify("flush", e),
            }
        }

        self.persist(&run, is_new, dirty)?;
        debug!(applied, "run length series flushed");
        Ok(applied)
    }

    fn persist(&self, run: &TsItem, is_new: bool, dirty: bool) -> Result<()> {
        if !dirty || run.is_empty() {
            return Ok(());
        }
        if is_new {
            self.collection.insert(run)
        } else {
            self.collection.update(run)
        }
    }

    /// get expands the runs that started in `[start, end)` into one sample
    /// per millisecond. A failing collection read is reported and yields no
    /// samples.
    pub fn get(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<SeriesSample> {
        match self.collection.find_started_between(start, end) {
            Ok(runs) => runs.iter().flat_map(|run| run.expand()).collect(),
            Err(e) => {
                self.notifier.notify("get", e);
                vec![]
            }
        }
    }

    /// get_resampled reads `[start, end)` and resamples it every `step` from
    /// `start` through `end`.
    pub fn get_resampled(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<SeriesSample>> {
        let samples = self.get(start, end);
        resample(&samples, start, end, step)
    }
}

/// resample picks, for every instant `start + k * step <= end`, the last
/// sample at or before it and the first sample after it. Numeric neighbours
/// are interpolated linearly; otherwise the earlier value is carried forward.
/// Instants before the first sample produce nothing.
pub fn resample(
    samples: &[SeriesSample],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Result<Vec<SeriesSample>> {
    if step <= Duration::zero() {
        return Err(TsdbError::InvalidArgument(format!(
            "resample step must be positive, got {}",
            step
        )));
    }

    let mut result = vec![];
    let mut current = start;
    while current <= end {
        // samples are ordered by timestamp
        let split = samples.partition_point(|s| s.timestamp <= current);
        let before = split.checked_sub(1).map(|i| &samples[i]);
        let after = samples.get(split);

        if let Some(b) = before {
            let sample = if b.timestamp == current {
                SeriesSample::new(b.value.clone(), current).with_index(b.is_index)
            } else {
                match (after, b.value.as_f64()) {
                    (Some(a), Some(bv)) if a.value.as_f64().is_some() => {
                        let av = a.value.as_f64().unwrap_or(bv);
                        let frac = (current - b.timestamp).num_milliseconds() as f64
                            / (a.timestamp - b.timestamp).num_milliseconds() as f64;
                        SeriesSample::new(FieldValue::Double(bv + (av - bv) * frac), current)
                    }
                    _ => SeriesSample::new(b.value.clone(), current),
                }
            };
            result.push(sample);
        }

        current += step;
    }
    Ok(result)
}

impl<C: RunCollection + 'static> BackgroundWork for RunLengthSeries<C> {
    fn perform_background_work(&self) {
        if let Err(e) = self.flush() {
            self.notifier.notify("flush", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use common_base::point::FieldValue;
    use tokio_util::sync::CancellationToken;

    use crate::error::TsdbError;
    use crate::run_length::{MemoryCollection, RunCollection, RunLengthOptions, RunLengthSeries};
    use crate::task::spawn_periodic;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn series(options: RunLengthOptions) -> RunLengthSeries<MemoryCollection> {
        RunLengthSeries::new(Arc::new(MemoryCollection::new()), options)
    }

    #[test]
    fn test_flush_into_single_run() {
        let s = series(RunLengthOptions::default());
        let t0 = t0();
        s.enqueue("A", Some(t0));
        s.enqueue("A", Some(t0 + Duration::milliseconds(500)));
        s.enqueue("B", Some(t0 + Duration::milliseconds(800)));

        assert_eq!(s.flush().unwrap(), 3);
        assert_eq!(s.count().unwrap(), 1);

        let run = s.collection().latest().unwrap().unwrap();
        assert_eq!(run.values, vec![FieldValue::from("A"), FieldValue::from("B")]);
        assert_eq!(run.run_duration_ms, vec![500, 0]);
        assert_eq!(run.index_offset_ms, vec![0, 800]);

        // a later flush appends to the same document
        s.enqueue("B", Some(t0 + Duration::milliseconds(900)));
        assert_eq!(s.flush().unwrap(), 1);
        assert_eq!(s.count().unwrap(), 1);
        assert_eq!(s.collection().latest().unwrap().unwrap().run_duration_ms, vec![500, 100]);

        assert_eq!(s.flush().unwrap(), 0);
    }

    #[test]
    fn test_full_run_rolls_over() {
        let s = series(RunLengthOptions {
            max_run_values: 3,
            max_items_per_flush: 4,
            ..Default::default()
        });
        let t0 = t0();
        for i in 0..10 {
            s.enqueue(i, Some(t0 + Duration::milliseconds(i as i64)));
        }

        assert_eq!(s.flush().unwrap(), 4);
        assert_eq!(s.count().unwrap(), 2);
        assert_eq!(s.flush().unwrap(), 4);
        assert_eq!(s.flush().unwrap(), 2);
        assert_eq!(s.count().unwrap(), 4);

        let latest = s.collection().latest().unwrap().unwrap();
        assert_eq!(latest.values, vec![FieldValue::Int(9)]);
    }

    #[tokio::test]
    async fn test_out_of_order_item_dropped() {
        let s = series(RunLengthOptions::default());
        let mut errors = s.subscribe_errors();
        let t0 = t0();
        s.enqueue(1.5, Some(t0 + Duration::seconds(1)));
        s.enqueue(2.5, Some(t0));
        s.enqueue(3.5, Some(t0 + Duration::seconds(2)));

        assert_eq!(s.flush().unwrap(), 2);
        let event = errors.recv().await.unwrap();
        assert_eq!(event.source, "flush");
        assert!(matches!(*event.error, TsdbError::OrderingViolation { .. }));

        let run = s.collection().latest().unwrap().unwrap();
        assert_eq!(run.values, vec![FieldValue::Double(1.5), FieldValue::Double(3.5)]);
    }

    #[test]
    fn test_get_expands_runs() {
        let s = series(RunLengthOptions::default());
        let t0 = t0();
        s.enqueue(10, Some(t0));
        s.enqueue(10, Some(t0 + Duration::milliseconds(3)));
        s.enqueue(20, Some(t0 + Duration::milliseconds(5)));
        s.flush().unwrap();

        let samples = s.get(t0, t0 + Duration::seconds(1));
        assert_eq!(samples.len(), 5);
        let index: Vec<_> = samples.iter().map(|s| s.is_index).collect();
        assert_eq!(index, vec![true, false, false, false, true]);
        assert_eq!(samples[4].timestamp, t0 + Duration::milliseconds(5));

        // runs starting at or after `end` are excluded
        assert!(s.get(t0 - Duration::seconds(1), t0).is_empty());
    }

    #[test]
    fn test_get_resampled() {
        let s = series(RunLengthOptions::default());
        let t0 = t0();
        s.enqueue(0, Some(t0));
        s.enqueue(100, Some(t0 + Duration::milliseconds(100)));
        s.flush().unwrap();

        let end = t0 + Duration::milliseconds(200);
        let out = s.get_resampled(t0, end, Duration::milliseconds(25)).unwrap();
        // (end - start) / step + 1
        assert_eq!(out.len(), 9);
        assert_eq!(out[0].value, FieldValue::Int(0));
        assert!(out[0].is_index);
        assert_eq!(out[2].value, FieldValue::Double(50.0));
        assert!(!out[2].is_index);
        assert_eq!(out[4].value, FieldValue::Int(100));
        assert!(out[4].is_index);
        assert_eq!(out[8].value, FieldValue::Int(100));
        assert_eq!(out[8].timestamp, end);

        assert!(s.get_resampled(t0, end, Duration::zero()).is_err());
    }

    #[test]
    fn test_resample_carries_text() {
        let s = series(RunLengthOptions::default());
        let t0 = t0();
        s.enqueue("open", Some(t0));
        s.enqueue("closed", Some(t0 + Duration::milliseconds(10)));
        s.flush().unwrap();

        let out = s
            .get_resampled(t0, t0 + Duration::milliseconds(20), Duration::milliseconds(5))
            .unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[1].value, FieldValue::from("open"));
        assert_eq!(out[1].timestamp, t0 + Duration::milliseconds(5));
        assert_eq!(out[3].value, FieldValue::from("closed"));
    }

    #[tokio::test]
    async fn test_background_work_flushes() {
        let s = Arc::new(series(RunLengthOptions::default()));
        let token = CancellationToken::new();
        let handle = spawn_periodic(s.clone(), StdDuration::from_millis(5), token.clone());

        s.enqueue_now(true);
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(s.count().unwrap(), 1);
    }
}
