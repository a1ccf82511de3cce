//! Progress reporting for uploads and downloads.

use serde::Serialize;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// Progress information for a single transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub direction: TransferDirection,
    /// Remote node being transferred (the parent folder for new uploads)
    pub node_id: String,
    /// Local file name
    pub filename: String,
    /// Bytes transferred so far
    pub done: u64,
    /// Total bytes, 0 when the server did not announce a length
    pub total: u64,
}

impl TransferProgress {
    pub fn new(
        direction: TransferDirection,
        node_id: impl Into<String>,
        filename: impl Into<String>,
        done: u64,
        total: u64,
    ) -> Self {
        Self {
            direction,
            node_id: node_id.into(),
            filename: filename.into(),
            done,
            total,
        }
    }

    /// Get progress as a percentage (0.0 to 100.0).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done >= self.total
    }
}

/// Callback receiving progress reports.
///
/// Returning `false` cancels the transfer.
pub type ProgressCallback = Box<dyn FnMut(&TransferProgress) -> bool + Send>;

/// Create a callback that draws a text progress bar on stdout.
pub fn make_progress_bar() -> ProgressCallback {
    Box::new(|progress: &TransferProgress| {
        let percent = progress.percent();
        let bar_width = 40;
        let filled = ((percent / 100.0 * bar_width as f64) as usize).min(bar_width);

        print!(
            "\r[{}{}] {:.1}% {} - {}/{} bytes",
            "=".repeat(filled),
            " ".repeat(bar_width - filled),
            percent,
            progress.filename,
            progress.done,
            progress.total
        );

        if progress.is_complete() {
            println!();
        }

        use std::io::Write;
        let _ = std::io::stdout().flush();

        true
    })
}
