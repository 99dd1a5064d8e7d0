use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// The geometry, typography and backend selection used when rendering proposals. Lengths are in
/// millimeters, font sizes in points. Every field can be omitted from the JSON configuration file,
/// in which case the A4 layout below is used.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfiguration {
    pub page_width: f32,
    pub page_height: f32,
    /// The margin applied on all four sides of the page.
    pub margin: f32,
    /// The distance of the footer baseline from the bottom edge of the page.
    pub footer_offset: f32,
    pub title_font_size: f32,
    pub subtitle_font_size: f32,
    pub company_font_size: f32,
    pub heading_font_size: f32,
    pub body_font_size: f32,
    pub footer_font_size: f32,
    /// Vertical advance after every line of the title.
    pub title_advance: f32,
    pub subtitle_advance: f32,
    pub company_advance: f32,
    /// Vertical advance after the accent rule below the header.
    pub rule_advance: f32,
    /// Vertical advance after every line of a section heading.
    pub heading_advance: f32,
    /// Vertical advance after every line of body text.
    pub line_height: f32,
    /// The gap left between two paragraphs of the same section.
    pub paragraph_spacing: f32,
    /// The gap left after the last line of a section.
    pub section_spacing: f32,
    pub rule_width: f32,
    /// Width of the colored bar drawn left of every section heading.
    pub accent_bar_width: f32,
    /// Product name displayed in the footer and recorded as the PDF creator.
    pub product_label: String,
    pub docx_backend: DocxBackend,
    /// Optional TTF fonts to embed in place of the standard Helvetica family.
    pub font_associations: Vec<FontAssociation>,
}

impl Default for ExportConfiguration {
    fn default() -> Self {
        ExportConfiguration {
            page_width: 210.0,
            page_height: 297.0,
            margin: 20.0,
            footer_offset: 10.0,
            title_font_size: 24.0,
            subtitle_font_size: 12.0,
            company_font_size: 10.0,
            heading_font_size: 16.0,
            body_font_size: 11.0,
            footer_font_size: 9.0,
            title_advance: 12.0,
            subtitle_advance: 8.0,
            company_advance: 8.0,
            rule_advance: 10.0,
            heading_advance: 8.0,
            line_height: 7.0,
            paragraph_spacing: 7.0,
            section_spacing: 5.0,
            rule_width: 0.5,
            accent_bar_width: 1.5,
            product_label: "PropelAI".to_string(),
            docx_backend: DocxBackend::default(),
            font_associations: Vec::new(),
        }
    }
}

/// Which word-processing renderer serves DOCX requests.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DocxBackend {
    /// A WordprocessingML package.
    #[default]
    Structured,
    /// A single RTF document, which word processors open like a DOCX file.
    Rtf,
    /// DOCX export is switched off and every request is refused.
    Disabled,
}

/// The styles of text a proposal is rendered with.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FontAssociation {
    pub font_style: FontStyle,
    pub font_file_path: PathBuf,
}

impl ExportConfiguration {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error("Failed to read the configuration file", &error)
            })?;
        let configuration: ExportConfiguration =
            serde_json::from_str(&configuration_file_contents).map_err(|error| {
                ContextError::with_error("Failed to parse the configuration file", &error)
            })?;
        configuration.validate()?;

        Ok(configuration)
    }

    pub fn get_font_path(&self, font_style: FontStyle) -> Option<&Path> {
        self.font_associations
            .iter()
            .find(|font_association| font_association.font_style == font_style)
            .map(|font_association| font_association.font_file_path.as_path())
    }

    /// The width available for text between the left and right margins.
    pub fn content_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    /// Rejects geometries which leave no room for content.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.content_width() <= 0.0 || self.page_height - 2.0 * self.margin <= 0.0 {
            return Err(ContextError::with_context(format!(
                "The margin of {}mm leaves no room for content on a {}x{}mm page",
                self.margin, self.page_width, self.page_height
            )));
        }
        if self.line_height <= 0.0 || self.heading_advance <= 0.0 || self.title_advance <= 0.0 {
            return Err(ContextError::with_context(
                "Line advances have to be positive",
            ));
        }

        Ok(())
    }
}
