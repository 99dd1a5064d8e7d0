//! Word-processing output: the proposal is flattened into a sequence of styled blocks, which is
//! then serialized either as a WordprocessingML package or as an RTF document.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use time::OffsetDateTime;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::{
    configuration::ExportConfiguration,
    error::ContextError,
    normalizer::{normalize_html, split_paragraphs},
    pdf_renderer::footer_text,
    proposal::{ProposalExportRequest, Rgb},
};

const SUBTITLE_GREY: Rgb = Rgb::new(100, 100, 100);
const FOOTER_GREY: Rgb = Rgb::new(150, 150, 150);
const TWIPS_PER_MILLIMETER: f32 = 1440.0 / 25.4;

/// A styled paragraph of the flattened proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum DocxBlock {
    Title(String),
    Subtitle(String),
    Company(String),
    /// A section heading, colored with the accent.
    Heading(String),
    /// A body paragraph, whose lines are separated by hard line breaks.
    Paragraph(Vec<String>),
    Footer(String),
}

/// Flattens the proposal into the blocks both word-processing formats are written from.
pub fn proposal_blocks(request: &ProposalExportRequest, footer: String) -> Vec<DocxBlock> {
    let mut blocks = vec![
        DocxBlock::Title(request.title.trim().to_string()),
        DocxBlock::Subtitle(request.subtitle()),
    ];
    if let Some(company_name) = request.company_name() {
        blocks.push(DocxBlock::Company(company_name.to_string()));
    }

    for section in request.sections.iter() {
        blocks.push(DocxBlock::Heading(section.title.trim().to_string()));
        let content = normalize_html(&section.content);
        blocks.extend(split_paragraphs(&content).into_iter().map(|paragraph| {
            DocxBlock::Paragraph(paragraph.lines().map(|line| line.trim().to_string()).collect())
        }));
    }
    blocks.push(DocxBlock::Footer(footer));

    blocks
}

fn millimeters_to_twips(millimeters: f32) -> u32 {
    (millimeters * TWIPS_PER_MILLIMETER).round() as u32
}

/// Font sizes are given in half points in both WordprocessingML and RTF.
fn half_points(font_size: f32) -> u32 {
    (font_size * 2.0).round() as u32
}

/// Renders proposals into word-processing documents.
pub struct DocxRenderer<'a> {
    configuration: &'a ExportConfiguration,
    generated_at: OffsetDateTime,
}

impl<'a> DocxRenderer<'a> {
    pub fn new(configuration: &'a ExportConfiguration, generated_at: OffsetDateTime) -> Self {
        DocxRenderer {
            configuration,
            generated_at,
        }
    }

    fn blocks(&self, request: &ProposalExportRequest) -> Vec<DocxBlock> {
        proposal_blocks(
            request,
            footer_text(&self.configuration.product_label, &self.generated_at),
        )
    }

    /// Renders the proposal as a WordprocessingML (`.docx`) package.
    pub fn render(&self, request: &ProposalExportRequest) -> Result<Vec<u8>, ContextError> {
        let blocks = self.blocks(request);
        log::debug!("Writing {} blocks into the DOCX package", blocks.len());

        let document_xml = self.document_xml(&blocks, request.accent_color());
        let styles_xml = self.styles_xml();

        let mut package_writer = PackageWriter::new();
        package_writer.write_file("[Content_Types].xml", CONTENT_TYPES_XML)?;
        package_writer.write_file("_rels/.rels", ROOT_RELATIONSHIPS_XML)?;
        package_writer.write_file("word/document.xml", &document_xml)?;
        package_writer.write_file("word/styles.xml", &styles_xml)?;
        package_writer.write_file("word/settings.xml", SETTINGS_XML)?;
        package_writer.write_file("word/_rels/document.xml.rels", DOCUMENT_RELATIONSHIPS_XML)?;

        package_writer.finish()
    }

    /// Renders the proposal as a single RTF document.
    pub fn render_rtf(&self, request: &ProposalExportRequest) -> Result<Vec<u8>, ContextError> {
        let blocks = self.blocks(request);
        let configuration = self.configuration;
        let accent_color = request.accent_color();

        let mut rtf = String::new();
        rtf.push_str("{\\rtf1\\ansi\\ansicpg1252\\deff0\\uc1");
        rtf.push_str("{\\fonttbl{\\f0\\fswiss Helvetica;}}");
        rtf.push_str("{\\colortbl;");
        for color in [Rgb::new(0, 0, 0), SUBTITLE_GREY, FOOTER_GREY, accent_color] {
            rtf.push_str(&format!(
                "\\red{}\\green{}\\blue{};",
                color.red, color.green, color.blue
            ));
        }
        rtf.push_str("}\n");

        let margin = millimeters_to_twips(configuration.margin);
        rtf.push_str(&format!(
            "\\paperw{}\\paperh{}\\margl{margin}\\margr{margin}\\margt{margin}\\margb{margin}\n",
            millimeters_to_twips(configuration.page_width),
            millimeters_to_twips(configuration.page_height),
        ));

        for block in blocks.iter() {
            let (paragraph_format, character_format, lines) = match block {
                DocxBlock::Title(text) => (
                    "\\sa120".to_string(),
                    format!("\\b\\cf1\\fs{}", half_points(configuration.title_font_size)),
                    vec![text.as_str()],
                ),
                DocxBlock::Subtitle(text) => (
                    "\\sa60".to_string(),
                    format!("\\cf2\\fs{}", half_points(configuration.subtitle_font_size)),
                    vec![text.as_str()],
                ),
                DocxBlock::Company(text) => (
                    "\\sa60".to_string(),
                    format!("\\i\\cf2\\fs{}", half_points(configuration.company_font_size)),
                    vec![text.as_str()],
                ),
                DocxBlock::Heading(text) => (
                    "\\sb360\\sa120\\keepn".to_string(),
                    format!("\\b\\cf4\\fs{}", half_points(configuration.heading_font_size)),
                    vec![text.as_str()],
                ),
                DocxBlock::Paragraph(lines) => (
                    "\\qj\\sa120".to_string(),
                    format!("\\cf1\\fs{}", half_points(configuration.body_font_size)),
                    lines.iter().map(String::as_str).collect(),
                ),
                DocxBlock::Footer(text) => (
                    "\\qc\\sb480".to_string(),
                    format!("\\i\\cf3\\fs{}", half_points(configuration.footer_font_size)),
                    vec![text.as_str()],
                ),
            };

            rtf.push_str(&format!("{{\\pard{paragraph_format}{character_format} "));
            for (line_index, line) in lines.iter().enumerate() {
                if line_index > 0 {
                    rtf.push_str("\\line ");
                }
                rtf.push_str(&escape_rtf(line));
            }
            rtf.push_str("\\par}\n");
        }
        rtf.push('}');

        Ok(rtf.into_bytes())
    }

    fn document_xml(&self, blocks: &[DocxBlock], accent_color: Rgb) -> String {
        let configuration = self.configuration;
        let mut body = String::new();

        for block in blocks {
            let paragraph = match block {
                DocxBlock::Title(text) => styled_paragraph("Title", None, text),
                DocxBlock::Subtitle(text) => styled_paragraph("Subtitle", None, text),
                DocxBlock::Company(text) => styled_paragraph("Company", None, text),
                DocxBlock::Heading(text) => {
                    styled_paragraph("Heading1", Some(accent_color), text)
                }
                DocxBlock::Paragraph(lines) => {
                    let mut runs = String::new();
                    for (line_index, line) in lines.iter().enumerate() {
                        if line_index > 0 {
                            runs.push_str("<w:br/>");
                        }
                        runs.push_str(&text_element(line));
                    }
                    format!(
                        "<w:p><w:pPr><w:jc w:val=\"both\"/></w:pPr><w:r>{}</w:r></w:p>",
                        runs
                    )
                }
                DocxBlock::Footer(text) => styled_paragraph("ProposalFooter", None, text),
            };
            body.push_str(&paragraph);
        }

        let margin = millimeters_to_twips(configuration.margin);
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
                "<w:body>{body}",
                r#"<w:sectPr><w:pgSz w:w="{width}" w:h="{height}"/>"#,
                r#"<w:pgMar w:top="{margin}" w:right="{margin}" w:bottom="{margin}" w:left="{margin}" "#,
                r#"w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#,
                "</w:body></w:document>"
            ),
            body = body,
            width = millimeters_to_twips(configuration.page_width),
            height = millimeters_to_twips(configuration.page_height),
            margin = margin,
        )
    }

    fn styles_xml(&self) -> String {
        let configuration = self.configuration;
        let paragraph_style = |style_id: &str, properties: &str, run_properties: String| {
            format!(
                concat!(
                    r#"<w:style w:type="paragraph" w:styleId="{id}"><w:name w:val="{id}"/>"#,
                    r#"<w:basedOn w:val="Normal"/><w:pPr>{properties}</w:pPr>"#,
                    "<w:rPr>{run_properties}</w:rPr></w:style>"
                ),
                id = style_id,
                properties = properties,
                run_properties = run_properties,
            )
        };
        let size = |font_size: f32| {
            let half_points = half_points(font_size);
            format!(r#"<w:sz w:val="{half_points}"/><w:szCs w:val="{half_points}"/>"#)
        };
        let color = |color: Rgb| format!(r#"<w:color w:val="{}"/>"#, color.to_hex());

        let styles = [
            paragraph_style(
                "Title",
                r#"<w:spacing w:after="120"/>"#,
                format!("<w:b/>{}", size(configuration.title_font_size)),
            ),
            paragraph_style(
                "Subtitle",
                r#"<w:spacing w:after="60"/>"#,
                format!("{}{}", color(SUBTITLE_GREY), size(configuration.subtitle_font_size)),
            ),
            paragraph_style(
                "Company",
                r#"<w:spacing w:after="240"/>"#,
                format!(
                    "<w:i/>{}{}",
                    color(SUBTITLE_GREY),
                    size(configuration.company_font_size)
                ),
            ),
            // Headings stay on the page of the paragraph that follows them
            paragraph_style(
                "Heading1",
                r#"<w:keepNext/><w:spacing w:before="360" w:after="120"/><w:outlineLvl w:val="0"/>"#,
                format!("<w:b/>{}", size(configuration.heading_font_size)),
            ),
            paragraph_style(
                "ProposalFooter",
                r#"<w:jc w:val="center"/><w:spacing w:before="480"/>"#,
                format!(
                    "<w:i/>{}{}",
                    color(FOOTER_GREY),
                    size(configuration.footer_font_size)
                ),
            ),
        ];

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                r#"<w:docDefaults><w:rPrDefault><w:rPr>"#,
                r#"<w:rFonts w:ascii="Helvetica" w:hAnsi="Helvetica" w:cs="Helvetica"/>{body_size}"#,
                r#"</w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="120"/></w:pPr>"#,
                r#"</w:pPrDefault></w:docDefaults>"#,
                r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
                "{styles}</w:styles>"
            ),
            body_size = size(configuration.body_font_size),
            styles = styles.concat(),
        )
    }
}

/// A paragraph of the given style made of a single run, optionally colored.
fn styled_paragraph(style_id: &str, color: Option<Rgb>, text: &str) -> String {
    let run_properties = match color {
        Some(color) => format!(r#"<w:rPr><w:color w:val="{}"/></w:rPr>"#, color.to_hex()),
        None => String::new(),
    };

    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr><w:r>{}{}</w:r></w:p>"#,
        style_id,
        run_properties,
        text_element(text)
    )
}

fn text_element(text: &str) -> String {
    format!(r#"<w:t xml:space="preserve">{}</w:t>"#, escape(text))
}

/// Escapes the RTF control characters, writing every non-ASCII character as a `\u` control
/// word followed by `?` for readers without Unicode support.
pub fn escape_rtf(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for character in text.chars() {
        match character {
            '\\' => escaped.push_str("\\\\"),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '\t' => escaped.push_str("\\tab "),
            '\u{a0}' => escaped.push_str("\\~"),
            character if character.is_ascii() => escaped.push(character),
            character => {
                let mut code_units = [0u16; 2];
                for code_unit in character.encode_utf16(&mut code_units) {
                    // RTF expects signed 16-bit values
                    escaped.push_str(&format!("\\u{}?", *code_unit as i16));
                }
            }
        }
    }

    escaped
}

/// Writes the parts of a package into an in-memory ZIP archive.
struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl PackageWriter {
    fn new() -> Self {
        PackageWriter {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    fn write_file(&mut self, path: &str, content: &str) -> Result<(), ContextError> {
        // A fixed modification time keeps the archive identical across exports
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        self.zip.start_file(path, options).map_err(|error| {
            ContextError::with_error(format!("Failed to add {:?} to the DOCX package", path), &error)
        })?;
        self.zip.write_all(content.as_bytes()).map_err(|error| {
            ContextError::with_error(format!("Failed to write {:?} into the DOCX package", path), &error)
        })?;

        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ContextError> {
        let cursor = self.zip.finish().map_err(|error| {
            ContextError::with_error("Failed to finalize the DOCX package", &error)
        })?;

        Ok(cursor.into_inner())
    }
}

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
    r#"<Override PartName="/word/settings.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml"/>"#,
    "</Types>"
);

const ROOT_RELATIONSHIPS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    "</Relationships>"
);

const DOCUMENT_RELATIONSHIPS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings" Target="settings.xml"/>"#,
    "</Relationships>"
);

const SETTINGS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:compat><w:compatSetting w:name="compatibilityMode" w:uri="http://schemas.microsoft.com/office/word" w:val="15"/></w:compat>"#,
    "</w:settings>"
);
