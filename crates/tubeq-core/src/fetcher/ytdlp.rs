//! `MediaFetcher` backed by the yt-dlp command-line tool.
//!
//! Probe: `--flat-playlist --dump-single-json`, parsed with serde_json.
//! Fetch: the tool prints one machine-readable progress line per update
//! (custom `--progress-template`) and the final file path once post-processing
//! is done (`--print after_move:filepath`). Both pipes are drained by reader
//! threads into one channel so the progress callback runs on the calling
//! thread. Abort kills the child.

use serde_json::Value;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

use crate::config::YtDlpConfig;
use crate::types::FormatKind;

use super::format::format_selector;
use super::{
    FetchControl, FetchError, FetchOutcome, FetchProgress, FetchRequest, MediaFetcher, ProbeItem,
    ProbeResult,
};

const PROGRESS_MARKER: &str = "tubeq-progress";
const PROGRESS_TEMPLATE: &str = "download:tubeq-progress %(progress.downloaded_bytes)s \
     %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.speed)s";
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary: String,
    ffmpeg_location: Option<PathBuf>,
    mp3_quality: String,
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg_location: None,
            mp3_quality: "192".to_string(),
        }
    }

    pub fn from_config(cfg: &YtDlpConfig) -> Self {
        Self {
            binary: cfg.binary.clone(),
            ffmpeg_location: cfg.ffmpeg_location.clone(),
            mp3_quality: cfg.mp3_quality.clone(),
        }
    }

    fn probe_args(url: &str) -> Vec<String> {
        vec![
            "--flat-playlist".to_string(),
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            url.to_string(),
        ]
    }

    fn fetch_args(&self, request: &FetchRequest) -> Vec<String> {
        let output = request.output_dir.join(OUTPUT_TEMPLATE);
        let mut args = vec![
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-warnings".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "-f".to_string(),
            format_selector(request.quality, request.format_kind),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
        ];
        if let Some(ref ffmpeg) = self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().to_string());
        }
        if request.format_kind == FormatKind::AudioMp3 {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push("mp3".to_string());
            args.push("--audio-quality".to_string());
            args.push(format!("{}K", self.mp3_quality));
        }
        args.push(request.url.clone());
        args
    }

    fn spawn_error(&self, source: std::io::Error) -> FetchError {
        FetchError::Spawn {
            program: self.binary.clone(),
            source,
        }
    }
}

impl MediaFetcher for YtDlpFetcher {
    fn probe(&self, url: &str) -> Result<ProbeResult, FetchError> {
        tracing::debug!(url, "probing with {}", self.binary);
        let output = Command::new(&self.binary)
            .args(Self::probe_args(url))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<String> = stderr.lines().map(str::to_string).collect();
            return Err(FetchError::Tool(tool_error_message(&lines, output.status)));
        }

        let value: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::Parse(format!("probe JSON: {e}")))?;
        parse_probe_json(url, &value)
    }

    fn fetch(
        &self,
        request: &FetchRequest,
        on_progress: &mut dyn FnMut(FetchProgress) -> FetchControl,
    ) -> Result<FetchOutcome, FetchError> {
        let args = self.fetch_args(request);
        tracing::debug!(url = %request.url, ?args, "starting {}", self.binary);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let (tx, rx) = mpsc::channel::<StreamLine>();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, StreamLine::Out, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, StreamLine::Err, tx.clone());
        }
        drop(tx);

        let mut output_path: Option<PathBuf> = None;
        let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        // Ends once both pipes are closed.
        for line in rx {
            let text = match &line {
                StreamLine::Out(t) | StreamLine::Err(t) => t.as_str(),
            };
            if let Some(progress) = parse_progress_line(text) {
                if on_progress(progress) == FetchControl::Abort {
                    terminate(&mut child);
                    return Err(FetchError::Aborted);
                }
                continue;
            }
            match line {
                StreamLine::Out(text) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() && !trimmed.starts_with('[') {
                        output_path = Some(PathBuf::from(trimmed));
                    }
                }
                StreamLine::Err(text) => {
                    tracing::debug!(url = %request.url, "yt-dlp: {}", text);
                    if stderr_tail.len() == STDERR_TAIL_LINES {
                        stderr_tail.pop_front();
                    }
                    stderr_tail.push_back(text);
                }
            }
        }

        let status = child.wait().map_err(|e| self.spawn_error(e))?;
        if !status.success() {
            let lines: Vec<String> = stderr_tail.into_iter().collect();
            return Err(FetchError::Tool(tool_error_message(&lines, status)));
        }

        output_path
            .map(|output_path| FetchOutcome { output_path })
            .ok_or_else(|| FetchError::Parse("yt-dlp did not report an output file".to_string()))
    }
}

enum StreamLine {
    Out(String),
    Err(String),
}

fn spawn_line_reader<R>(stream: R, wrap: fn(String) -> StreamLine, tx: mpsc::Sender<StreamLine>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    });
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("kill yt-dlp: {}", e);
    }
    let _ = child.wait();
}

/// The tool's own `ERROR:` line if present, else the last stderr line.
fn tool_error_message(stderr_lines: &[String], status: ExitStatus) -> String {
    let non_empty = || stderr_lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
    non_empty()
        .filter(|l| l.contains("ERROR:"))
        .last()
        .or_else(|| non_empty().last())
        .map(str::to_string)
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}

/// Parses a line produced by the progress template; None for any other line.
pub fn parse_progress_line(line: &str) -> Option<FetchProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = rest.split_whitespace().map(parse_number);
    let downloaded = fields.next()?;
    let total = fields.next().flatten();
    let estimate = fields.next().flatten();
    let speed = fields.next().flatten();
    Some(FetchProgress {
        downloaded_bytes: downloaded.map(|d| d.max(0.0) as u64).unwrap_or(0),
        total_bytes: total.or(estimate).map(|t| t.max(0.0) as u64),
        bytes_per_sec: speed,
    })
}

fn parse_number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Interprets `--dump-single-json` output. Null entries and entries without
/// any usable URL are skipped.
pub fn parse_probe_json(url: &str, info: &Value) -> Result<ProbeResult, FetchError> {
    if !info.is_object() {
        return Err(FetchError::Parse("probe output is not a JSON object".to_string()));
    }

    if let Some(entries) = info.get("entries").and_then(Value::as_array) {
        let items: Vec<ProbeItem> = entries
            .iter()
            .filter(|e| e.is_object())
            .filter_map(|e| {
                let item = item_from_entry(e);
                if item.is_none() {
                    tracing::debug!("skipping playlist entry without URL or id");
                }
                item
            })
            .collect();
        let thumbnail =
            pick_thumbnail(info).or_else(|| items.first().and_then(|i| i.thumbnail.clone()));
        return Ok(ProbeResult::Collection {
            title: title_or(info, "Unknown Playlist"),
            thumbnail,
            items,
        });
    }

    Ok(ProbeResult::Single(ProbeItem {
        url: url.to_string(),
        title: title_or(info, "Unknown"),
        thumbnail: pick_thumbnail(info),
        duration_secs: duration_secs(info),
    }))
}

fn item_from_entry(entry: &Value) -> Option<ProbeItem> {
    let url = entry
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .or_else(|| entry.get("webpage_url").and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| {
            entry
                .get("id")
                .and_then(Value::as_str)
                .map(|id| format!("https://www.youtube.com/watch?v={id}"))
        })?;
    Some(ProbeItem {
        url,
        title: title_or(entry, "Unknown"),
        thumbnail: pick_thumbnail(entry),
        duration_secs: duration_secs(entry),
    })
}

fn title_or(v: &Value, default: &str) -> String {
    v.get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Last (largest) entry of `thumbnails`, else `thumbnail`.
fn pick_thumbnail(v: &Value) -> Option<String> {
    v.get("thumbnails")
        .and_then(Value::as_array)
        .and_then(|t| t.last())
        .and_then(|t| t.get("url"))
        .and_then(Value::as_str)
        .or_else(|| v.get("thumbnail").and_then(Value::as_str))
        .map(str::to_string)
}

fn duration_secs(v: &Value) -> u64 {
    v.get("duration")
        .and_then(Value::as_f64)
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.round() as u64)
        .unwrap_or(0)
}
