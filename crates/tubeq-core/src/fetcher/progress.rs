//! Progress samples reported by a running fetch.

/// Snapshot of one fetch's transfer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FetchProgress {
    /// Bytes received so far.
    pub downloaded_bytes: u64,
    /// Total size, exact or estimated; None if the tool does not know.
    pub total_bytes: Option<u64>,
    /// Current throughput; None when unknown.
    pub bytes_per_sec: Option<f64>,
}

impl FetchProgress {
    /// Integer percent in [0, 100]; 0 if the total is unknown.
    pub fn percent(&self) -> u8 {
        percent_complete(self.downloaded_bytes, self.total_bytes)
    }

    /// Throughput in bytes per second, 0 when unknown.
    pub fn rate(&self) -> f64 {
        self.bytes_per_sec.filter(|r| r.is_finite() && *r > 0.0).unwrap_or(0.0)
    }
}

pub fn percent_complete(downloaded: u64, total: Option<u64>) -> u8 {
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as u128 * 100) / total as u128;
            pct.min(100) as u8
        }
        _ => 0,
    }
}
