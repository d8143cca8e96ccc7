//! Per-transfer byte counters and their thread-safe registry
//!
//! Every transfer owns one [`ProgressTracker`], registered in a shared [`ProgressRegistry`] under
//! the worker id of the transfer. The registry keeps all trackers behind a single mutex and hands
//! a copied snapshot to a [`ProgressDisplay`] after every update; rendering never happens while
//! the lock is held.

use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressTracker {
    pub source: String,
    pub destination: String,
    pub total_bytes: u64,
    pub copied_bytes: u64,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(source: &std::path::Path, destination: &std::path::Path, total_bytes: u64) -> Self {
        Self {
            source: source.display().to_string(),
            destination: destination.display().to_string(),
            total_bytes,
            copied_bytes: 0,
        }
    }

    pub fn report(&mut self, bytes: u64) {
        self.copied_bytes = self.copied_bytes.saturating_add(bytes);
    }

    /// Share of `total_bytes` copied so far, 100% when there is nothing to copy.
    ///
    /// Not clamped: a tree that grew after it was sized reports more than 100%.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.copied_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

impl std::fmt::Display for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Copy source {} to destination {}: {:.2}%",
            self.source,
            self.destination,
            self.percentage()
        )
    }
}

/// Renders the state of all transfers.
///
/// Implementations receive a copy of the registry contents and must not call back into the
/// registry while rendering.
pub trait ProgressDisplay: Send + Sync {
    /// Whether a refresh would render anything right now; the registry skips copying its
    /// contents when it would not.
    fn wants_refresh(&self) -> bool {
        true
    }

    fn refresh(&self, snapshot: &[(usize, ProgressTracker)]);

    /// Called once after all transfers ended.
    fn finish(&self, _snapshot: &[(usize, ProgressTracker)]) {}
}

/// Display used when progress reporting is off.
#[derive(Debug, Default)]
pub struct NoDisplay;

impl ProgressDisplay for NoDisplay {
    fn wants_refresh(&self) -> bool {
        false
    }

    fn refresh(&self, _snapshot: &[(usize, ProgressTracker)]) {}
}

/// Periodic plain-text lines, suitable for logs and non-interactive terminals.
#[derive(Debug)]
pub struct TextDisplay {
    delay: std::time::Duration,
    last_print: std::sync::Mutex<Option<std::time::Instant>>,
}

impl TextDisplay {
    #[must_use]
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            delay,
            last_print: std::sync::Mutex::new(None),
        }
    }

    fn is_due(&self, last_print: Option<std::time::Instant>) -> bool {
        last_print.is_none_or(|last| last.elapsed() >= self.delay)
    }

    fn print(snapshot: &[(usize, ProgressTracker)]) {
        let lines = snapshot
            .iter()
            .map(|(worker_id, tracker)| format!("[{worker_id}] {tracker}"))
            .collect::<Vec<_>>()
            .join("\n");
        eprintln!("=======================\n{lines}");
    }
}

impl ProgressDisplay for TextDisplay {
    fn wants_refresh(&self) -> bool {
        let last_print = *self
            .last_print
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.is_due(last_print)
    }

    fn refresh(&self, snapshot: &[(usize, ProgressTracker)]) {
        {
            let mut last_print = self
                .last_print
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if !self.is_due(*last_print) {
                return;
            }
            *last_print = Some(std::time::Instant::now());
        }
        Self::print(snapshot);
    }

    fn finish(&self, snapshot: &[(usize, ProgressTracker)]) {
        Self::print(snapshot);
    }
}

/// One animated progress bar per transfer.
pub struct BarDisplay {
    multi: indicatif::MultiProgress,
    style: indicatif::ProgressStyle,
    bars: std::sync::Mutex<BTreeMap<usize, indicatif::ProgressBar>>,
}

impl BarDisplay {
    #[must_use]
    pub fn new(delay: std::time::Duration) -> Self {
        let refresh_rate = (1.0 / delay.as_secs_f64().max(0.001)).clamp(1.0, 255.0) as u8;
        let multi = indicatif::MultiProgress::with_draw_target(
            indicatif::ProgressDrawTarget::stderr_with_hz(refresh_rate),
        );
        let style = indicatif::ProgressStyle::with_template(
            "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
        .progress_chars("=> ");
        Self {
            multi,
            style,
            bars: std::sync::Mutex::new(BTreeMap::new()),
        }
    }
}

impl ProgressDisplay for BarDisplay {
    fn refresh(&self, snapshot: &[(usize, ProgressTracker)]) {
        let mut bars = self
            .bars
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (worker_id, tracker) in snapshot {
            let bar = bars.entry(*worker_id).or_insert_with(|| {
                let bar = self.multi.add(indicatif::ProgressBar::new(tracker.total_bytes));
                bar.set_style(self.style.clone());
                bar
            });
            // snapshots from different workers may arrive out of order, only a new
            // registration moves a bar back
            let reset = tracker.copied_bytes == 0 || bar.length() != Some(tracker.total_bytes);
            if reset || tracker.copied_bytes > bar.position() {
                bar.set_message(format!("{} -> {}", tracker.source, tracker.destination));
                bar.set_length(tracker.total_bytes);
                bar.set_position(tracker.copied_bytes);
            }
        }
    }

    fn finish(&self, snapshot: &[(usize, ProgressTracker)]) {
        self.refresh(snapshot);
        let bars = self
            .bars
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for bar in bars.values() {
            bar.finish();
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressType {
    /// progress bar on a terminal, text updates otherwise
    #[default]
    #[value(alias = "Auto")]
    Auto,
    #[value(alias = "ProgressBar")]
    ProgressBar,
    #[value(alias = "TextUpdates")]
    TextUpdates,
}

#[derive(Clone, Debug, Default)]
pub struct ProgressSettings {
    pub progress_type: ProgressType,
    /// human readable delay between updates, e.g. "200ms", "10s"
    pub progress_delay: Option<String>,
}

/// Builds the display for the given settings, `None` turns progress reporting off.
pub fn make_display(
    settings: Option<&ProgressSettings>,
) -> anyhow::Result<Box<dyn ProgressDisplay>> {
    use std::io::IsTerminal;
    let Some(settings) = settings else {
        return Ok(Box::new(NoDisplay));
    };
    let progress_type = match settings.progress_type {
        ProgressType::Auto => {
            if std::io::stderr().is_terminal() {
                ProgressType::ProgressBar
            } else {
                ProgressType::TextUpdates
            }
        }
        other => other,
    };
    let delay = match &settings.progress_delay {
        Some(delay) => humantime::parse_duration(delay)
            .map_err(|err| anyhow::anyhow!("invalid progress delay {:?}: {}", delay, err))?,
        None if progress_type == ProgressType::ProgressBar => {
            std::time::Duration::from_millis(200)
        }
        None => std::time::Duration::from_secs(10),
    };
    Ok(match progress_type {
        ProgressType::ProgressBar => Box::new(BarDisplay::new(delay)),
        _ => Box::new(TextDisplay::new(delay)),
    })
}

/// Trackers of all transfers of one run, keyed by worker id.
pub struct ProgressRegistry {
    trackers: std::sync::Mutex<BTreeMap<usize, ProgressTracker>>,
    display: Box<dyn ProgressDisplay>,
}

impl std::fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ProgressRegistry")
            .field("trackers", &self.trackers)
            .finish_non_exhaustive()
    }
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new(Box::new(NoDisplay))
    }
}

impl ProgressRegistry {
    #[must_use]
    pub fn new(display: Box<dyn ProgressDisplay>) -> Self {
        Self {
            trackers: std::sync::Mutex::new(BTreeMap::new()),
            display,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<usize, ProgressTracker>> {
        self.trackers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn copy_out(trackers: &BTreeMap<usize, ProgressTracker>) -> Vec<(usize, ProgressTracker)> {
        trackers
            .iter()
            .map(|(worker_id, tracker)| (*worker_id, tracker.clone()))
            .collect()
    }

    /// Starts tracking a transfer, replacing any tracker registered earlier for `worker_id`.
    pub fn register(
        &self,
        worker_id: usize,
        source: &std::path::Path,
        destination: &std::path::Path,
        total_bytes: u64,
    ) {
        tracing::info!(
            "worker {}: total bytes to copy from {:?} to {:?}: {}",
            worker_id,
            source,
            destination,
            total_bytes
        );
        let snapshot = {
            let mut trackers = self.lock();
            trackers.insert(
                worker_id,
                ProgressTracker::new(source, destination, total_bytes),
            );
            self.display.wants_refresh().then(|| Self::copy_out(&trackers))
        };
        if let Some(snapshot) = snapshot {
            self.display.refresh(&snapshot);
        }
    }

    pub fn report(&self, worker_id: usize, bytes: u64) {
        let snapshot = {
            let mut trackers = self.lock();
            let Some(tracker) = trackers.get_mut(&worker_id) else {
                tracing::warn!("progress reported for unregistered worker {}", worker_id);
                return;
            };
            tracker.report(bytes);
            self.display.wants_refresh().then(|| Self::copy_out(&trackers))
        };
        if let Some(snapshot) = snapshot {
            self.display.refresh(&snapshot);
        }
    }

    /// Consistent copy of all trackers ordered by worker id.
    #[must_use]
    pub fn trackers(&self) -> Vec<(usize, ProgressTracker)> {
        Self::copy_out(&self.lock())
    }

    #[must_use]
    pub fn tracker(&self, worker_id: usize) -> Option<ProgressTracker> {
        self.lock().get(&worker_id).cloned()
    }

    /// Display lines of all transfers ordered by worker id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(usize, String)> {
        self.trackers()
            .into_iter()
            .map(|(worker_id, tracker)| (worker_id, tracker.to_string()))
            .collect()
    }

    pub fn finish(&self) {
        let snapshot = self.trackers();
        self.display.finish(&snapshot);
    }
}
