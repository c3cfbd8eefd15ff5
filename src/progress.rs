// src/progress.rs

//! Download progress rendering

use indicatif::{ProgressBar, ProgressStyle};

/// Progress display for a single download
///
/// Sized by the response's Content-Length when known, otherwise an
/// indeterminate spinner. A hidden bar is used when progress is off so
/// callers don't need to branch.
pub struct DownloadProgress {
    bar: ProgressBar,
}

impl DownloadProgress {
    pub fn new(url: &str, total: Option<u64>, visible: bool) -> Self {
        if !visible {
            return Self::hidden();
        }

        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{wide_msg} [{bar:40}] {bytes}/{total_bytes}")
                {
                    bar.set_style(style.progress_chars("=> "));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("{wide_msg} {spinner} {bytes}") {
                    bar.set_style(style);
                }
                bar
            }
        };
        bar.set_message(url.to_string());
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn advance(&self, bytes: usize) {
        self.bar.inc(bytes as u64);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
