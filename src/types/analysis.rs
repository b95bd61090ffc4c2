// src/types/analysis.rs
//! Résumé analysis payloads exchanged with the analysis service

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::utils::{self, ALLOWED_RESUME_EXTENSIONS};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Largest résumé the service accepts (5 MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

// ===== Request side =====

/// A résumé file held in memory, ready to be sent as a multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ResumeFile {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Build a file part, deriving the media type from the extension.
    /// Unknown extensions fall back to `application/octet-stream`.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let media_type = utils::media_type_for(&file_name)
            .unwrap_or("application/octet-stream")
            .to_string();

        Self {
            file_name,
            media_type,
            bytes,
        }
    }

    /// Read a résumé from disk
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?;

        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Check format and size before sending. The service enforces the same
    /// rules and answers 422 / 413 when they are violated.
    pub fn validate(&self, max_bytes: u64) -> Result<()> {
        utils::ensure_allowed_extension(&self.file_name, ALLOWED_RESUME_EXTENSIONS)?;

        if self.media_type != PDF_MEDIA_TYPE && self.media_type != DOCX_MEDIA_TYPE {
            anyhow::bail!(
                "Unsupported media type: {}. Upload a PDF or DOCX file",
                self.media_type
            );
        }

        if self.size() > max_bytes {
            anyhow::bail!(
                "File {} is {} bytes, the maximum is {} bytes",
                self.file_name,
                self.size(),
                max_bytes
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub job_description: String,
    pub resume_file: ResumeFile,
}

impl AnalysisRequest {
    pub fn new(job_description: impl Into<String>, resume_file: ResumeFile) -> Self {
        Self {
            job_description: job_description.into(),
            resume_file,
        }
    }
}

// ===== Response payloads =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub ats_score: u8,
    pub match_percentage: u8,
    pub missing_keywords: Vec<String>,
    pub strengths: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<DetailedAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    #[serde(default)]
    pub skills_match: Vec<String>,
    #[serde(default)]
    pub experience_match: Vec<String>,
    #[serde(default)]
    pub education_match: Vec<String>,
    #[serde(default)]
    pub improvement_areas: Vec<String>,
}

impl AnalysisResult {
    /// Shape check on a service-produced result. Scores are percentages.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.ats_score > 100 {
            return Err(format!("atsScore out of range: {}", self.ats_score));
        }
        if self.match_percentage > 100 {
            return Err(format!(
                "matchPercentage out of range: {}",
                self.match_percentage
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file_id: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

/// One prior analysis as listed by `/history`. Bookkeeping fields vary
/// between service versions, so all of them are optional. An entry whose
/// scores are missing keeps `result: None` instead of failing the list, and
/// fields this client does not know are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub result: Option<AnalysisResult>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_detects_media_type() {
        let pdf = ResumeFile::from_bytes("cv.PDF", vec![1, 2, 3]);
        assert_eq!(pdf.media_type, PDF_MEDIA_TYPE);

        let docx = ResumeFile::from_bytes("cv.docx", vec![]);
        assert_eq!(docx.media_type, DOCX_MEDIA_TYPE);

        let txt = ResumeFile::from_bytes("cv.txt", vec![]);
        assert_eq!(txt.media_type, "application/octet-stream");
    }

    #[test]
    fn test_validate_rejects_wrong_format_and_size() {
        let ok = ResumeFile::from_bytes("cv.pdf", vec![0; 10]);
        assert!(ok.validate(DEFAULT_MAX_UPLOAD_BYTES).is_ok());

        let txt = ResumeFile::from_bytes("cv.txt", vec![0; 10]);
        assert!(txt.validate(DEFAULT_MAX_UPLOAD_BYTES).is_err());

        let big = ResumeFile::from_bytes("cv.pdf", vec![0; 11]);
        let err = big.validate(10).unwrap_err();
        assert!(err.to_string().contains("maximum"));
    }

    #[test]
    fn test_analysis_result_wire_names() {
        let json = serde_json::json!({
            "atsScore": 72,
            "matchPercentage": 68,
            "missingKeywords": ["Python", "SQL"],
            "strengths": ["Leadership"],
            "recommendations": ["Add Python"],
            "detailedAnalysis": {
                "skillsMatch": ["Rust"],
                "improvementAreas": ["Testing"]
            }
        });

        let result: AnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.ats_score, 72);
        assert_eq!(result.missing_keywords, vec!["Python", "SQL"]);
        let detailed = result.detailed_analysis.unwrap();
        assert_eq!(detailed.skills_match, vec!["Rust"]);
        assert!(detailed.education_match.is_empty());
    }

    #[test]
    fn test_validate_score_range() {
        let mut result = AnalysisResult {
            ats_score: 101,
            match_percentage: 50,
            missing_keywords: vec![],
            strengths: vec![],
            recommendations: vec![],
            detailed_analysis: None,
        };
        assert!(result.validate().unwrap_err().contains("atsScore"));

        result.ats_score = 100;
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_history_entry_flattens_result() {
        let json = serde_json::json!({
            "id": "a1",
            "fileName": "cv.pdf",
            "createdAt": "2024-05-01T10:00:00Z",
            "atsScore": 80,
            "matchPercentage": 75,
            "missingKeywords": [],
            "strengths": ["Go"],
            "recommendations": []
        });

        let entry: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.id.as_deref(), Some("a1"));
        assert_eq!(entry.result.unwrap().ats_score, 80);
        assert!(entry.created_at.is_some());
        assert!(entry.extra.is_empty());
    }

    #[test]
    fn test_history_entry_keeps_unknown_fields() {
        let json = serde_json::json!({
            "id": "a2",
            "fileName": "cv.docx",
            "status": "processing",
            "model": { "name": "ats-v2" }
        });

        let entry: HistoryEntry = serde_json::from_value(json.clone()).unwrap();
        assert!(entry.result.is_none());
        assert_eq!(entry.extra["status"], "processing");
        assert_eq!(serde_json::to_value(&entry).unwrap(), json);
    }

    #[test]
    fn test_history_list_survives_entry_without_scores() {
        let json = serde_json::json!([
            {
                "id": "a1",
                "atsScore": 80,
                "matchPercentage": 75,
                "missingKeywords": [],
                "strengths": [],
                "recommendations": [],
                "source": "upload"
            },
            { "id": "a2", "status": "failed" }
        ]);

        let entries: Vec<HistoryEntry> = serde_json::from_value(json).unwrap();
        assert_eq!(entries[0].result.as_ref().map(|r| r.ats_score), Some(80));
        assert_eq!(entries[0].extra["source"], "upload");
        assert!(entries[1].result.is_none());
    }
}
