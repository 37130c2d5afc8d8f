use std::collections::{BTreeMap, HashSet};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use common_base::point::EntitySample;
use iotdb_storage::{exists, list_files};
use iotdb_utils::time::{day_stamp, in_daily_window, now_utc, parse_day_stamp, to_utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TsdbError};
use crate::notify::{ErrorEvent, ErrorNotifier};
use crate::tea::{read_items, write_items, FileSeriesOptions, TeaItem};

const TEA_EXTENSION: &str = "tea";
const ARCHIVE_DIR: &str = "data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationStats {
    pub files_merged: usize,
    pub records_moved: usize,
}

/// FlushState is everything guarded by the store's coarse lock.
struct FlushState {
    rx: UnboundedReceiver<TeaItem>,
    /// items of failed writes, retried first
    carry: Vec<TeaItem>,
}

struct StoreInner {
    name: String,
    base: PathBuf,
    options: FileSeriesOptions,

    tx: UnboundedSender<TeaItem>,
    pending: AtomicUsize,
    processing: AtomicBool,
    state: Mutex<FlushState>,

    notifier: ErrorNotifier,
}

/// FileSeriesStore persists `(entity_id, value, timestamp)` records into
/// per-day files.
///
/// [`add`](Self::add) only queues; a background task drains the queue every
/// `poll_interval`. A second task merges stale day files into the archive
/// once a day. Flushing, consolidation and reads serialize on one lock, so a
/// reader never sees a file that is being rewritten.
pub struct FileSeriesStore {
    inner: Arc<StoreInner>,
    token: CancellationToken,
    handles: StdMutex<Vec<JoinHandle<()>>>,
}

impl FileSeriesStore {
    /// open starts the store of series `name` under `base`. Must be called
    /// within a tokio runtime.
    pub async fn open(
        name: impl Into<String>,
        base: impl Into<PathBuf>,
        options: FileSeriesOptions,
    ) -> Result<Self> {
        let name = name.into();
        let base = base.into();
        if name.is_empty() {
            return Err(TsdbError::InvalidArgument("series name is empty".to_string()));
        }

        if !exists(&base).await {
            if options.create_dir_if_missing {
                tokio::fs::create_dir_all(&base).await?;
            } else {
                return Err(TsdbError::Io(io::Error::new(
                    ErrorKind::NotFound,
                    format!("directory not found: {}", base.display()),
                )));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = ErrorNotifier::new(options.error_channel_capacity);
        let inner = Arc::new(StoreInner {
            name,
            base,
            options,
            tx,
            pending: AtomicUsize::new(0),
            processing: AtomicBool::new(false),
            state: Mutex::new(FlushState { rx, carry: vec![] }),
            notifier,
        });

        let token = CancellationToken::new();
        let handles = vec![
            tokio::spawn(flush_loop(inner.clone(), token.clone())),
            tokio::spawn(consolidation_loop(inner.clone(), token.clone())),
        ];
        info!(name = %inner.name, base = ?inner.base, "file series store opened");

        Ok(Self {
            inner,
            token,
            handles: StdMutex::new(handles),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.inner.notifier.subscribe()
    }

    /// pending is the number of records accepted but not yet written.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// add queues a record. A missing timestamp means now.
    pub fn add(&self, entity_id: i64, value: f64, timestamp: Option<DateTime<Utc>>) {
        let item = TeaItem::new(entity_id, value, timestamp.unwrap_or_else(now_utc));
        self.inner.enqueue(item);
    }

    /// add_at queues a record stamped in any time zone; it is stored in UTC.
    pub fn add_at<Tz: TimeZone>(&self, entity_id: i64, value: f64, timestamp: DateTime<Tz>) {
        self.inner
            .enqueue(TeaItem::new(entity_id, value, to_utc(timestamp)));
    }

    /// flush waits for any running pass, then drains the whole queue. Returns
    /// the number of records written. Records that fail to write are reported
    /// and stay queued.
    pub async fn flush(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        self.inner.processing.store(true, Ordering::Release);

        let mut total = 0;
        loop {
            let n = self.inner.flush_pass(&mut state).await;
            if n == 0 {
                break;
            }
            total += n;
        }

        self.inner.processing.store(false, Ordering::Release);
        total
    }

    /// consolidate merges every day file older than yesterday (UTC) into the
    /// archive file and deletes the merged day files.
    pub async fn consolidate(&self) -> Result<ConsolidationStats> {
        self.inner.consolidate(now_utc().date_naive()).await
    }

    /// get_data returns the records of `ids` stamped within `[from, to]`,
    /// archive first, then day files in date order. Files that cannot be read
    /// are reported and skipped.
    pub async fn get_data(
        &self,
        ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<EntitySample> {
        let ids: HashSet<i64> = ids.iter().copied().collect();
        let mut samples = vec![];
        if ids.is_empty() || from > to {
            return samples;
        }

        // one guard over the whole read so consolidation cannot move a day
        // file between listing and reading it
        let _state = self.inner.state.lock().await;

        let archive = self.inner.archive_path();
        if exists(&archive).await {
            self.inner
                .read_filtered(&archive, &ids, from, to, &mut samples)
                .await;
        }

        let (first_day, last_day) = (from.date_naive(), to.date_naive());
        let day_files = match self.inner.day_files().await {
            Ok(files) => files,
            Err(e) => {
                self.inner.notifier.notify("get_data", e);
                return samples;
            }
        };
        for (date, path) in day_files {
            if date >= first_day && date <= last_day {
                self.inner
                    .read_filtered(&path, &ids, from, to, &mut samples)
                    .await;
            }
        }

        samples
    }

    /// shutdown stops the background tasks and waits for them. A pass in
    /// progress completes first. Queued records are not flushed; call
    /// [`flush`](Self::flush) before if they matter. Calling it again is a
    /// no-op.
    pub async fn shutdown(&self) {
        self.token.cancel();

        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("file series task failed: {}", e);
            }
        }
    }
}

impl Drop for FileSeriesStore {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl StoreInner {
    fn enqueue(&self, item: TeaItem) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(item).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.base
            .join(format!("{}_{}.{}", self.name, day_stamp(date), TEA_EXTENSION))
    }

    fn archive_dir(&self) -> PathBuf {
        self.base.join(ARCHIVE_DIR)
    }

    fn archive_path(&self) -> PathBuf {
        self.archive_dir()
            .join(format!("{}.{}", self.name, TEA_EXTENSION))
    }

    /// day_files lists `(date, path)` of this series' day files in date order.
    /// Files of other series sharing the name prefix are skipped.
    async fn day_files(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let prefix = format!("{}_", self.name);
        let files = list_files(&self.base, &prefix, TEA_EXTENSION).await?;

        let mut days: Vec<_> = files
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                let date = parse_day_stamp(stem.strip_prefix(prefix.as_str())?)?;
                Some((date, path))
            })
            .collect();
        days.sort();
        Ok(days)
    }

    /// flush_pass writes up to `max_items_per_flush` records, grouped by day
    /// file. Returns how many were written.
    async fn flush_pass(&self, state: &mut FlushState) -> usize {
        let max = self.options.max_items_per_flush.max(1);

        let take = state.carry.len().min(max);
        let mut batch: Vec<TeaItem> = state.carry.drain(..take).collect();
        while batch.len() < max {
            match state.rx.try_recv() {
                Ok(item) => batch.push(item),
                Err(_) => break,
            }
        }
        if batch.is_empty() {
            return 0;
        }

        let mut groups: BTreeMap<PathBuf, Vec<TeaItem>> = BTreeMap::new();
        for item in batch {
            groups
                .entry(self.day_path(item.timestamp.date_naive()))
                .or_default()
                .push(item);
        }

        let mut written = 0;
        for (path, items) in groups {
            match write_items(&path, &items).await {
                Ok(()) => written += items.len(),
                Err(e) => {
                    self.notifier.notify("flush", e);
                    state.carry.extend(items);
                }
            }
        }

        self.pending.fetch_sub(written, Ordering::AcqRel);
        debug!(written, "file series flushed");
        written
    }

    async fn try_flush(&self) {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        {
            let mut state = self.state.lock().await;
            self.flush_pass(&mut state).await;
        }
        self.processing.store(false, Ordering::Release);
    }

    async fn consolidate(&self, today: NaiveDate) -> Result<ConsolidationStats> {
        let _state = self.state.lock().await;

        let yesterday = today - Duration::days(1);
        let stale: Vec<PathBuf> = self
            .day_files()
            .await?
            .into_iter()
            .filter(|(date, _)| *date < yesterday)
            .map(|(_, path)| path)
            .collect();
        if stale.is_empty() {
            return Ok(ConsolidationStats::default());
        }

        tokio::fs::create_dir_all(self.archive_dir()).await?;
        let archive = self.archive_path();
        let tmp = archive.with_extension(format!("{}.tmp", TEA_EXTENSION));

        // rebuild the archive aside so a crash never leaves it half written
        if exists(&tmp).await {
            tokio::fs::remove_file(&tmp).await?;
        }
        if exists(&archive).await {
            tokio::fs::copy(&archive, &tmp).await?;
        }

        let mut records = vec![];
        for path in &stale {
            records.extend(read_items(path).await?);
        }
        write_items(&tmp, &records).await?;
        tokio::fs::rename(&tmp, &archive).await?;

        for path in &stale {
            tokio::fs::remove_file(path).await?;
        }

        let stats = ConsolidationStats {
            files_merged: stale.len(),
            records_moved: records.len(),
        };
        info!(
            name = %self.name,
            files_merged = stats.files_merged,
            records_moved = stats.records_moved,
            "consolidated day files"
        );
        Ok(stats)
    }

    async fn consolidate_reporting(&self) {
        if let Err(e) = self.consolidate(now_utc().date_naive()).await {
            self.notifier.notify("consolidate", e);
        }
    }

    /// read_filtered expects the caller to hold the state lock.
    async fn read_filtered(
        &self,
        path: &Path,
        ids: &HashSet<i64>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        out: &mut Vec<EntitySample>,
    ) {
        match read_items(path).await {
            Ok(items) => out.extend(
                items
                    .into_iter()
                    .filter(|item| ids.contains(&item.entity_id))
                    .filter(|item| item.timestamp >= from && item.timestamp <= to)
                    .map(EntitySample::from),
            ),
            Err(e) => self.notifier.notify("get_data", e),
        }
    }
}

async fn flush_loop(inner: Arc<StoreInner>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(inner.options.poll_interval) => {}
        }

        if inner.pending.load(Ordering::Acquire) > 0 && !inner.processing.load(Ordering::Acquire) {
            inner.try_flush().await;
        }
    }
    debug!(name = %inner.name, "flush task stopped");
}

async fn consolidation_loop(inner: Arc<StoreInner>, token: CancellationToken) {
    if inner.options.consolidate_on_startup {
        inner.consolidate_reporting().await;
    }

    let period = inner
        .options
        .consolidation_check_interval
        .max(std::time::Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                if in_daily_window(&Local::now(), inner.options.consolidation_hour) {
                    inner.consolidate_reporting().await;
                }
            }
        }
    }
    debug!(name = %inner.name, "consolidation task stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
    use iotdb_utils::time::{day_stamp, now_utc};

    use crate::error::TsdbError;
    use crate::tea::{read_items, write_items, FileSeriesOptions, FileSeriesStore, TeaItem};

    /// background passes stay out of the way, tests flush explicitly
    fn options() -> FileSeriesOptions {
        FileSeriesOptions {
            poll_interval: StdDuration::from_secs(3600),
            consolidate_on_startup: false,
            ..Default::default()
        }
    }

    /// noon UTC, `n` days before today
    fn days_ago(n: i64) -> DateTime<Utc> {
        let day = (now_utc() - Duration::days(n)).date_naive();
        Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_open_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested");

        let err = FileSeriesStore::open("cpu", &base, options()).await;
        assert!(matches!(err, Err(TsdbError::Io(_))));

        let opts = FileSeriesOptions {
            create_dir_if_missing: true,
            ..options()
        };
        let store = FileSeriesStore::open("cpu", &base, opts).await.unwrap();
        assert!(base.is_dir());
        store.shutdown().await;
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_flush_then_consolidate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSeriesStore::open("cpu", dir.path(), options()).await.unwrap();

        let ts = days_ago(3);
        for i in 0..3 {
            store.add(i, i as f64 + 0.25, Some(ts + Duration::seconds(i)));
        }
        assert_eq!(store.flush().await, 3);
        assert_eq!(store.pending(), 0);

        let day_file = dir
            .path()
            .join(format!("cpu_{}.tea", day_stamp(ts.date_naive())));
        let written = read_items(&day_file).await.unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written[1], TeaItem::new(1, 1.25, ts + Duration::seconds(1)));

        let stats = store.consolidate().await.unwrap();
        assert_eq!(stats.files_merged, 1);
        assert_eq!(stats.records_moved, 3);
        assert!(!day_file.exists());

        let archive = dir.path().join("data").join("cpu.tea");
        assert_eq!(read_items(&archive).await.unwrap(), written);
        assert!(!dir.path().join("data").join("cpu.tea.tmp").exists());

        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_consolidate_keeps_recent_days() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSeriesStore::open("cpu", dir.path(), options()).await.unwrap();

        // another series sharing the prefix
        let other = dir.path().join(format!("cpu_x_{}.tea", day_stamp(days_ago(9).date_naive())));
        write_items(&other, &[TeaItem::new(1, 1.0, days_ago(9))]).await.unwrap();

        for n in [0, 1, 2, 5] {
            store.add(7, n as f64, Some(days_ago(n)));
        }
        // the background pass must not have run yet
        tokio::task::yield_now().await;
        assert_eq!(store.pending(), 4);
        assert_eq!(store.flush().await, 4);

        let stats = store.consolidate().await.unwrap();
        assert_eq!(stats.files_merged, 2);
        assert_eq!(stats.records_moved, 2);
        assert!(other.exists());
        for n in [0, 1] {
            let day = dir.path().join(format!("cpu_{}.tea", day_stamp(days_ago(n).date_naive())));
            assert!(day.exists());
        }

        // the archive grows on the next run
        store.add(7, 8.0, Some(days_ago(8)));
        store.flush().await;
        let stats = store.consolidate().await.unwrap();
        assert_eq!(stats.records_moved, 1);
        let archive = read_items(&dir.path().join("data").join("cpu.tea")).await.unwrap();
        assert_eq!(archive.len(), 3);

        assert_eq!(store.consolidate().await.unwrap().files_merged, 0);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSeriesStore::open("power", dir.path(), options()).await.unwrap();

        let old = days_ago(4);
        let recent = days_ago(1);
        store.add(1, 10.0, Some(old));
        store.add(2, 20.0, Some(old));
        store.add(1, 11.0, Some(recent));
        store.add(1, 12.0, Some(recent + Duration::hours(1)));
        store.add(3, 30.0, Some(recent));
        store.flush().await;
        store.consolidate().await.unwrap();

        let samples = store.get_data(&[1, 3], old - Duration::hours(1), recent).await;
        let values: Vec<_> = samples.iter().map(|s| (s.entity_id, s.value)).collect();
        assert_eq!(values, vec![(1, 10.0), (1, 11.0), (3, 30.0)]);

        let samples = store
            .get_data(&[1], recent, recent + Duration::hours(2))
            .await;
        assert_eq!(samples.len(), 2);
        assert!(store.get_data(&[], old, recent).await.is_empty());
        store.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_get_data_during_consolidation() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileSeriesStore::open("mix", dir.path(), options()).await.unwrap());
        let mut errors = store.subscribe_errors();

        let ids: Vec<i64> = (2..12).collect();
        for &n in &ids {
            for i in 0..50 {
                store.add(n, i as f64, Some(days_ago(n) + Duration::seconds(i)));
            }
        }
        assert_eq!(store.flush().await, 500);

        let reader = {
            let store = store.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                let mut counts = vec![];
                for _ in 0..20 {
                    counts.push(store.get_data(&ids, days_ago(13), now_utc()).await.len());
                    tokio::task::yield_now().await;
                }
                counts
            })
        };
        let stats = store.consolidate().await.unwrap();
        assert_eq!(stats.files_merged, 10);
        assert_eq!(stats.records_moved, 500);

        let counts = reader.await.unwrap();
        assert!(counts.iter().all(|&c| c == 500), "counts {:?}", counts);
        assert!(errors.try_recv().is_err());
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_add_at_normalizes_to_utc() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSeriesStore::open("tz", dir.path(), options()).await.unwrap();

        let zone = FixedOffset::east_opt(9 * 3600).unwrap();
        let local = zone.with_ymd_and_hms(2024, 3, 2, 5, 0, 0).unwrap();
        store.add_at(1, 1.0, local);
        store.flush().await;

        // 05:00 +09:00 is still the previous day in UTC
        assert!(dir.path().join("tz_20240301.tea").exists());
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_background_flush() {
        let dir = tempfile::tempdir().unwrap();
        let opts = FileSeriesOptions {
            poll_interval: StdDuration::from_millis(10),
            ..options()
        };
        let store = FileSeriesStore::open("bg", dir.path(), opts).await.unwrap();
        store.add(1, 1.0, None);
        store.add(2, 2.0, None);

        for _ in 0..100 {
            if store.pending() == 0 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert_eq!(store.pending(), 0);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_startup_consolidation() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(format!("s_{}.tea", day_stamp(days_ago(3).date_naive())));
        write_items(&stale, &[TeaItem::new(1, 1.0, days_ago(3))]).await.unwrap();

        let store = FileSeriesStore::open("s", dir.path(), FileSeriesOptions::default())
            .await
            .unwrap();
        for _ in 0..100 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert!(!stale.exists());
        assert_eq!(store.get_data(&[1], days_ago(4), now_utc()).await.len(), 1);
        store.shutdown().await;
    }
}
