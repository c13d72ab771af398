//! Job and group records held by the status store.
//!
//! Records are plain data; every status change goes through the transition
//! methods on [`JobRecord`] so that a job can never leave a terminal state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

/// Group (playlist) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Uuid);

macro_rules! uuid_id {
    ($name:ident) => {
        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_id!(JobId);
uuid_id!(GroupId);

/// Lifecycle state of a job.
///
/// `Queued -> Downloading -> {Completed | Cancelled | Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Downloading,
    Completed,
    Cancelled,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Error => "error",
        }
    }

    /// True for states no transition leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Error
        )
    }

    /// Queued or Downloading.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Downloading)
                | (JobStatus::Downloading, JobStatus::Completed)
                | (JobStatus::Downloading, JobStatus::Cancelled)
                | (JobStatus::Downloading, JobStatus::Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested video quality ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P2160 => "2160p",
            Quality::P1440 => "1440p",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
        }
    }

    /// Maximum frame height, or None for `best`.
    pub fn max_height(self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::P2160 => Some(2160),
            Quality::P1440 => Some(1440),
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" => Ok(Quality::Best),
            "2160p" => Ok(Quality::P2160),
            "1440p" => Ok(Quality::P1440),
            "1080p" => Ok(Quality::P1080),
            "720p" => Ok(Quality::P720),
            "480p" => Ok(Quality::P480),
            "360p" => Ok(Quality::P360),
            other => Err(format!("unknown quality: {other}")),
        }
    }
}

/// Output profile: merged video, or audio only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    #[default]
    Video,
    AudioMp3,
    AudioM4a,
}

impl FormatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatKind::Video => "video",
            FormatKind::AudioMp3 => "audio_mp3",
            FormatKind::AudioM4a => "audio_m4a",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(FormatKind::Video),
            "audio_mp3" | "mp3" => Ok(FormatKind::AudioMp3),
            "audio_m4a" | "m4a" => Ok(FormatKind::AudioM4a),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

/// Position of a job inside its playlist group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSlot {
    pub group_id: GroupId,
    pub group_title: String,
    /// 1-based position in source order.
    pub index: usize,
    pub count: usize,
}

/// Full job record as seen by status readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub message: String,
    /// Percent 0..=100.
    pub progress: u8,
    /// Bytes per second, 0 when unknown.
    pub transfer_rate: f64,
    pub source_url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub duration_secs: u64,
    pub quality: Quality,
    pub format_kind: FormatKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist: Option<PlaylistSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    pub created_at: i64,
    /// Admission sequence number; listing order.
    #[serde(default)]
    pub seq: u64,
}

impl JobRecord {
    /// New job in `Queued` with the given queue-position message.
    pub fn queued(
        id: JobId,
        source_url: String,
        title: String,
        thumbnail: Option<String>,
        duration_secs: u64,
        quality: Quality,
        format_kind: FormatKind,
        message: String,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            message,
            progress: 0,
            transfer_rate: 0.0,
            source_url,
            title,
            thumbnail,
            duration_secs,
            quality,
            format_kind,
            playlist: None,
            output_file: None,
            created_at: unix_timestamp(),
            seq: 0,
        }
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.playlist.as_ref().map(|p| p.group_id)
    }

    fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                job_id = %self.id,
                from = %self.status,
                to = %next,
                "rejected job status transition"
            );
            return false;
        }
        self.status = next;
        true
    }

    /// `Queued -> Downloading`.
    pub fn begin_download(&mut self) -> bool {
        if !self.transition(JobStatus::Downloading) {
            return false;
        }
        self.message = "Downloading...".to_string();
        true
    }

    /// Applies a progress sample. Ignored unless downloading; percent never decreases.
    pub fn record_progress(&mut self, percent: u8, bytes_per_sec: f64) {
        if self.status != JobStatus::Downloading {
            return;
        }
        self.progress = self.progress.max(percent.min(100));
        self.transfer_rate = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
            bytes_per_sec
        } else {
            0.0
        };
    }

    /// `Downloading -> Completed`.
    pub fn complete(&mut self, output_file: String) -> bool {
        if !self.transition(JobStatus::Completed) {
            return false;
        }
        self.message = "Download completed".to_string();
        self.output_file = Some(output_file);
        self.progress = 100;
        self.transfer_rate = 0.0;
        true
    }

    /// `Downloading -> Cancelled`.
    pub fn cancel(&mut self) -> bool {
        if !self.transition(JobStatus::Cancelled) {
            return false;
        }
        self.message = "Cancelled".to_string();
        self.progress = 0;
        self.transfer_rate = 0.0;
        true
    }

    /// `Downloading -> Error`, keeping the failure text verbatim.
    pub fn fail(&mut self, message: String) -> bool {
        if !self.transition(JobStatus::Error) {
            return false;
        }
        self.message = message;
        self.progress = 0;
        self.transfer_rate = 0.0;
        true
    }
}

/// Playlist submission; members are fixed at admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub title: String,
    pub expected_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub quality: Quality,
    pub format_kind: FormatKind,
    pub member_job_ids: Vec<JobId>,
}

/// Per-state counts over the members currently present in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub downloading: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Downloading => self.downloading += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            JobStatus::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.downloading + self.completed + self.cancelled + self.error
    }
}

/// Aggregate view of a group, folded at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStatus {
    pub id: GroupId,
    pub title: String,
    pub total: usize,
    pub statuses: StatusCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub quality: Quality,
    pub format_kind: FormatKind,
}

pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
