//! Control socket wire format: one JSON request per line, one JSON response
//! per line.

use serde::{Deserialize, Serialize};
use tubeq_core::types::{FormatKind, GroupId, JobId, Quality};
use tubeq_core::QueueError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Submit {
        url: String,
        quality: Quality,
        format_kind: FormatKind,
    },
    Status {
        job_id: JobId,
    },
    List,
    Group {
        group_id: GroupId,
    },
    Cancel {
        job_id: JobId,
    },
    CancelGroup {
        group_id: GroupId,
    },
    Delete {
        job_id: JobId,
    },
    DeleteGroup {
        group_id: GroupId,
    },
    Clear,
    ArtifactPath {
        job_id: JobId,
    },
    Checksum {
        job_id: JobId,
    },
    CleanStorage,
}

/// `{"ok": <value>}` or `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(serde_json::Value),
    Error { kind: String, message: String },
}

impl Response {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&QueueError> for Response {
    fn from(err: &QueueError) -> Self {
        Response::error(err.kind().as_str(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_is_tagged_by_op() {
        let req = Request::Submit {
            url: "https://example.com/v".to_string(),
            quality: Quality::P720,
            format_kind: FormatKind::AudioMp3,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"op": "submit", "url": "https://example.com/v", "quality": "720p", "format_kind": "audio_mp3"})
        );
        let parsed: Request = serde_json::from_str(r#"{"op":"clean_storage"}"#).unwrap();
        assert_eq!(parsed, Request::CleanStorage);
    }

    #[test]
    fn response_shapes() {
        assert_eq!(
            serde_json::to_value(Response::Ok(json!(3))).unwrap(),
            json!({"ok": 3})
        );
        let err = QueueError::JobNotFound(JobId::new());
        let value = serde_json::to_value(Response::from(&err)).unwrap();
        assert_eq!(value["error"]["kind"], "not_found");
        assert_eq!(value["error"]["message"], err.to_string());
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"op":"explode"}"#).is_err());
    }
}
