use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Callback type for reporting download progress.
/// Arguments: source URL, bytes downloaded, total bytes (0 if unknown), MiB/s, is_complete
pub type ProgressFn = Arc<dyn Fn(&str, u64, u64, f64, bool) + Send + Sync>;

const MIB: f64 = 1024.0 * 1024.0;

/// Throughput in MiB/s since `start`.
pub(crate) fn mib_per_sec(downloaded: u64, start: Instant) -> f64 {
    let elapsed = start.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        downloaded as f64 / MIB / elapsed
    } else {
        0.0
    }
}

/// A ticking spinner on stderr, used by the CLI while a fetch runs.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Returns a progress function that writes download throughput into `bar`'s message.
pub fn spinner_progress_fn(bar: ProgressBar, label: String) -> ProgressFn {
    Arc::new(move |_src: &str, current: u64, total: u64, mib_per_sec: f64, complete: bool| {
        let done = current as f64 / MIB;
        let message = if complete {
            format!("{label}: downloaded {done:.2} MiB, extracting...")
        } else if total > 0 {
            format!(
                "{label}: {done:.2} of {:.2} MiB ({mib_per_sec:.2} MiB/s)",
                total as f64 / MIB
            )
        } else {
            format!("{label}: {done:.2} MiB ({mib_per_sec:.2} MiB/s)")
        };
        bar.set_message(message);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_progress_updates_message() {
        let bar = ProgressBar::hidden();
        let progress = spinner_progress_fn(bar.clone(), "vlurping a/b".to_owned());

        progress("https://example", 2 * 1024 * 1024, 4 * 1024 * 1024, 1.0, false);
        assert_eq!(bar.message(), "vlurping a/b: 2.00 of 4.00 MiB (1.00 MiB/s)");

        progress("https://example", 4 * 1024 * 1024, 0, 1.0, true);
        assert!(bar.message().contains("extracting"));
    }

    #[test]
    fn throughput_is_zero_without_elapsed_time() {
        let rate = mib_per_sec(0, Instant::now());
        assert!(rate >= 0.0);
    }
}
