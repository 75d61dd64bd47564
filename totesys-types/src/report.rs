use serde::{Deserialize, Serialize};

/// Outcome of one extractor run. `no_change` lists tables with no rows past
/// the watermark; `failed` lists tables whose snapshot write was skipped
/// after a storage error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractReport {
    pub updated: Vec<String>,
    #[serde(rename = "no change")]
    pub no_change: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

impl ExtractReport {
    pub fn any_changes(&self) -> bool {
        !self.updated.is_empty()
    }
}

/// Outcome of a transformer or loader run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub not_uploaded: Vec<String>,
}

/// The full wire surface of a stage: an HTTP-style status code and a
/// human-readable body naming the tables touched or skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl StageResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }

    pub fn internal_error() -> Self {
        Self {
            status_code: 500,
            body: "Internal server error.".to_string(),
        }
    }

    pub fn from_extract(report: &ExtractReport) -> Self {
        if report.any_changes() {
            Self::ok(format!(
                "CSV files processed and uploaded successfully for: {}.",
                report.updated.join(", ")
            ))
        } else {
            Self::ok("No changes detected, no CSV files were uploaded.")
        }
    }

    pub fn from_upload(report: &UploadReport) -> Self {
        if report.uploaded.is_empty() {
            return Self::ok("No files were uploaded.");
        }
        let mut body = format!(
            "Files processed for {} and uploaded successfully.",
            report.uploaded.join(", ")
        );
        if !report.not_uploaded.is_empty() {
            body.push_str(&format!(
                " The following tables were not uploaded: {}.",
                report.not_uploaded.join(", ")
            ));
        }
        Self::ok(body)
    }
}
