use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    configuration::{DocxBackend, ExportConfiguration},
    docx::DocxRenderer,
    error::ExportError,
    pdf_renderer::ProposalPdfRenderer,
    proposal::ProposalExportRequest,
};

const DOCX_UNAVAILABLE_MESSAGE: &str =
    "DOCX export is temporarily unavailable. Please use PDF export instead.";

/// The document kinds a proposal can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Pdf,
    Docx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    /// The MIME type announced to the client downloading the file.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string.trim().to_ascii_uppercase().as_str() {
            "PDF" => Ok(ExportFormat::Pdf),
            "DOCX" => Ok(ExportFormat::Docx),
            _ => Err(ExportError::UnsupportedFormat(string.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Pdf => write!(formatter, "PDF"),
            ExportFormat::Docx => write!(formatter, "DOCX"),
        }
    }
}

/// Builds the download file name: every character of the title outside `[A-Za-z0-9]` becomes an
/// underscore, and the extension of the format is appended.
pub fn file_name(title: &str, format: ExportFormat) -> String {
    let stem: String = title
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect();

    format!("{}.{}", stem, format.extension())
}

/// A rendered document, ready to be streamed back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    buffer: Vec<u8>,
    file_name: String,
    content_type: &'static str,
    format: ExportFormat,
}

impl ExportResult {
    fn new(buffer: Vec<u8>, title: &str, format: ExportFormat) -> Self {
        ExportResult {
            buffer,
            file_name: file_name(title, format),
            content_type: format.content_type(),
            format,
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn size_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// The audit record of this successful export.
    pub fn record(&self, created_at: OffsetDateTime) -> ExportRecord {
        ExportRecord {
            format: self.format,
            file_name: self.file_name.clone(),
            file_size: self.size_bytes(),
            status: ExportStatus::Completed,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportStatus {
    Completed,
    Failed,
}

/// The row persisted by the storage layer for every export attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub format: ExportFormat,
    pub file_name: String,
    pub file_size: usize,
    pub status: ExportStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ExportRecord {
    /// The audit record of an export which did not produce a document.
    pub fn failed(title: &str, format: ExportFormat, created_at: OffsetDateTime) -> Self {
        ExportRecord {
            format,
            file_name: file_name(title, format),
            file_size: 0,
            status: ExportStatus::Failed,
            created_at,
        }
    }
}

/// Turns export requests into documents, selecting the renderer from the requested format and
/// the configured DOCX backend.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    configuration: ExportConfiguration,
}

impl Exporter {
    pub fn new(configuration: ExportConfiguration) -> Self {
        Exporter { configuration }
    }

    pub fn configuration(&self) -> &ExportConfiguration {
        &self.configuration
    }

    /// Exports the proposal, stamping it with the current time.
    pub fn export(
        &self,
        request: &ProposalExportRequest,
        format: ExportFormat,
    ) -> Result<ExportResult, ExportError> {
        let generated_at =
            OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());

        self.export_at(request, format, generated_at)
    }

    /// Exports the proposal as if it was generated at the given time, which makes the output
    /// reproducible.
    pub fn export_at(
        &self,
        request: &ProposalExportRequest,
        format: ExportFormat,
        generated_at: OffsetDateTime,
    ) -> Result<ExportResult, ExportError> {
        validate_request(request)?;
        log::info!(
            "Exporting the proposal {:?} with {} sections as {}",
            request.title,
            request.sections.len(),
            format
        );

        let buffer = match format {
            ExportFormat::Pdf => {
                ProposalPdfRenderer::new(&self.configuration, generated_at).render(request)?
            }
            ExportFormat::Docx => {
                let renderer = DocxRenderer::new(&self.configuration, generated_at);
                match self.configuration.docx_backend {
                    DocxBackend::Structured => renderer.render(request)?,
                    DocxBackend::Rtf => {
                        log::debug!("Rendering the DOCX export through the RTF backend");
                        renderer.render_rtf(request)?
                    }
                    DocxBackend::Disabled => {
                        log::warn!("Refusing a DOCX export since the backend is disabled");
                        return Err(ExportError::UpstreamUnavailable(
                            DOCX_UNAVAILABLE_MESSAGE.to_string(),
                        ));
                    }
                }
            }
        };

        let export_result = ExportResult::new(buffer, &request.title, format);
        log::info!(
            "Exported {:?} ({} bytes)",
            export_result.file_name(),
            export_result.size_bytes()
        );

        Ok(export_result)
    }
}

/// Parses the format name and exports the proposal with the given configuration.
pub fn export_proposal(
    request: &ProposalExportRequest,
    format_name: &str,
    configuration: ExportConfiguration,
) -> Result<ExportResult, ExportError> {
    let format = format_name.parse::<ExportFormat>()?;

    Exporter::new(configuration).export(request, format)
}

fn validate_request(request: &ProposalExportRequest) -> Result<(), ExportError> {
    if request.title.trim().is_empty() {
        return Err(ExportError::InvalidRequest(
            "the proposal title is empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn request(title: &str) -> ProposalExportRequest {
        ProposalExportRequest {
            title: title.to_string(),
            proposal_type: "Project".to_string(),
            sections: Vec::new(),
            company_name: None,
            primary_color: None,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PDF".parse::<ExportFormat>(), Ok(ExportFormat::Pdf));
        assert_eq!("docx".parse::<ExportFormat>(), Ok(ExportFormat::Docx));
        assert_eq!(
            "HTML".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat("HTML".to_string()))
        );
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("Q1 Proposal: Acme/Co", ExportFormat::Pdf),
            "Q1_Proposal__Acme_Co.pdf"
        );
        assert_eq!(file_name("Café", ExportFormat::Docx), "Caf_.docx");
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let result = Exporter::default().export_at(
            &request("   "),
            ExportFormat::Pdf,
            datetime!(2026-10-16 0:00 UTC),
        );

        assert!(matches!(result, Err(ExportError::InvalidRequest(_))));
    }

    #[test]
    fn test_disabled_docx_backend() {
        let exporter = Exporter::new(ExportConfiguration {
            docx_backend: DocxBackend::Disabled,
            ..Default::default()
        });
        let result = exporter.export_at(
            &request("Plan"),
            ExportFormat::Docx,
            datetime!(2026-10-16 0:00 UTC),
        );

        assert_eq!(
            result,
            Err(ExportError::UpstreamUnavailable(
                DOCX_UNAVAILABLE_MESSAGE.to_string()
            ))
        );
    }

    #[test]
    fn test_record_serialization() {
        let export_result = ExportResult::new(vec![0; 42], "Plan", ExportFormat::Pdf);
        let record = export_result.record(datetime!(2026-10-16 12:00 UTC));

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({
                "format": "PDF",
                "fileName": "Plan.pdf",
                "fileSize": 42,
                "status": "COMPLETED",
                "createdAt": "2026-10-16T12:00:00Z"
            })
        );
        assert_eq!(
            ExportRecord::failed("Plan", ExportFormat::Docx, datetime!(2026-10-16 12:00 UTC))
                .status,
            ExportStatus::Failed
        );
    }
}
