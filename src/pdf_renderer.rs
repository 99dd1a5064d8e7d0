use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::{
    configuration::{ExportConfiguration, FontStyle},
    error::ContextError,
    layout::{layout_paragraphs, wrap_text, LayoutBlock, TextMeasure},
    normalizer::normalize_html,
    paginator::Paginator,
    pdf::{points_to_millimeters, DocumentInfo, PdfColor, PdfDocument},
    proposal::{ProposalExportRequest, Section},
    standard_fonts::StandardFont,
};

const BLACK: PdfColor = [0.0, 0.0, 0.0];
const SUBTITLE_GREY: PdfColor = [100.0 / 255.0, 100.0 / 255.0, 100.0 / 255.0];
const FOOTER_GREY: PdfColor = [150.0 / 255.0, 150.0 / 255.0, 150.0 / 255.0];

/// Gap between the accent bar and the heading text, in millimeters.
const HEADING_INDENT_GAP: f32 = 3.0;
/// Height of the Helvetica capitals relative to the font size.
const CAP_HEIGHT_RATIO: f32 = 0.72;

/// The font indices of the three text styles within the PDF document.
#[derive(Debug, Clone, Copy)]
struct FontSet {
    regular: usize,
    bold: usize,
    italic: usize,
}

/// Renders a proposal into a paginated A4 (by default) PDF document: a header made of the title,
/// the proposal type, the optional company name and an accent rule, then every section in order,
/// and finally a footer with the page number on every page.
pub struct ProposalPdfRenderer<'a> {
    configuration: &'a ExportConfiguration,
    generated_at: OffsetDateTime,
}

impl<'a> ProposalPdfRenderer<'a> {
    pub fn new(configuration: &'a ExportConfiguration, generated_at: OffsetDateTime) -> Self {
        ProposalPdfRenderer {
            configuration,
            generated_at,
        }
    }

    /// Renders the proposal and returns the bytes of the PDF file.
    pub fn render(&self, request: &ProposalExportRequest) -> Result<Vec<u8>, ContextError> {
        let mut composer = PageComposer::new(self.configuration, &request.title)?;
        let accent_color = request.accent_color().to_unit_components();

        composer.compose_header(request, accent_color)?;
        for section in request.sections.iter() {
            composer.compose_section(section, accent_color)?;
        }
        composer.compose_footers(&self.footer_text())?;
        log::info!(
            "Laid out the proposal {:?} over {} pages",
            request.title,
            composer.pdf_document.page_count()
        );

        let mut pdf_document = composer.pdf_document;
        pdf_document.write_all(
            document_identifier(&request.title, &self.generated_at, "instance"),
            &DocumentInfo {
                title: request.title.clone(),
                creator: self.configuration.product_label.clone(),
                creation_date: self.generated_at,
            },
        )?;

        pdf_document.save_to_bytes()
    }

    /// The centered footer line, such as `Generated with PropelAI • October 16, 2026`.
    fn footer_text(&self) -> String {
        footer_text(&self.configuration.product_label, &self.generated_at)
    }
}

/// The footer shared by the PDF and the word-processing renderers.
pub(crate) fn footer_text(product_label: &str, generated_at: &OffsetDateTime) -> String {
    format!(
        "Generated with {} • {} {}, {}",
        product_label,
        generated_at.month(),
        generated_at.day(),
        generated_at.year()
    )
}

/// Derives the PDF `ID` strings from the title and the export timestamp, so that the same
/// export request always produces the same file.
fn document_identifier(title: &str, generated_at: &OffsetDateTime, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(generated_at.unix_timestamp_nanos().to_be_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();

    // The first 128 bits are enough for an identifier
    digest[..16]
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Places content on the pages of a `PdfDocument`, allocating a new page whenever the
/// paginator decides that the next element does not fit.
struct PageComposer<'a> {
    configuration: &'a ExportConfiguration,
    pdf_document: PdfDocument,
    paginator: Paginator,
    fonts: FontSet,
    current_page: usize,
}

impl<'a> PageComposer<'a> {
    fn new(configuration: &'a ExportConfiguration, title: &str) -> Result<Self, ContextError> {
        let mut pdf_document = PdfDocument::new(document_identifier(
            title,
            &OffsetDateTime::UNIX_EPOCH,
            "document",
        ));

        let mut load_font = |font_style: FontStyle, fallback: StandardFont| {
            match configuration.get_font_path(font_style) {
                Some(font_path) => {
                    log::debug!("Embedding the {:?} font {:?}", font_style, font_path);
                    pdf_document.add_font(font_path)
                }
                None => Ok(pdf_document.add_standard_font(fallback)),
            }
        };
        let fonts = FontSet {
            regular: load_font(FontStyle::Regular, StandardFont::Helvetica)?,
            bold: load_font(FontStyle::Bold, StandardFont::HelveticaBold)?,
            italic: load_font(FontStyle::Italic, StandardFont::HelveticaOblique)?,
        };

        let current_page =
            pdf_document.add_page(configuration.page_width, configuration.page_height);
        let paginator = Paginator::new(
            configuration.page_height,
            configuration.margin,
            configuration.margin,
        );

        Ok(PageComposer {
            configuration,
            pdf_document,
            paginator,
            fonts,
            current_page,
        })
    }

    /// Reserves the vertical space for an element, moving to a new page when needed.
    fn ensure_space(&mut self, height: f32) -> bool {
        let page_started = self.paginator.ensure_space(height);
        if page_started {
            self.current_page = self
                .pdf_document
                .add_page(self.configuration.page_width, self.configuration.page_height);
        }
        debug_assert_eq!(self.paginator.page_count(), self.pdf_document.page_count());

        page_started
    }

    fn wrap(
        &self,
        text: &str,
        font_index: usize,
        font_size: f32,
        max_width: f32,
    ) -> Result<Vec<String>, ContextError> {
        let font = self.pdf_document.font(font_index)?;

        Ok(wrap_text(
            text.trim(),
            |candidate| font.text_width(candidate, font_size),
            max_width,
        ))
    }

    /// Writes a single line with its baseline at the cursor.
    fn write_line(
        &mut self,
        text: &str,
        font_index: usize,
        font_size: f32,
        color: PdfColor,
        x: f32,
    ) -> Result<(), ContextError> {
        let y = self.paginator.cursor();
        self.pdf_document
            .write_text_to_page(self.current_page, color, text, font_index, font_size, [x, y])
    }

    /// Writes wrapped lines at the left margin, each preceded by a page break check.
    fn write_lines(
        &mut self,
        lines: &[String],
        font_index: usize,
        font_size: f32,
        color: PdfColor,
        advance: f32,
    ) -> Result<(), ContextError> {
        for line in lines {
            self.ensure_space(advance);
            self.write_line(line, font_index, font_size, color, self.configuration.margin)?;
            self.paginator.advance(advance);
        }

        Ok(())
    }

    fn compose_header(
        &mut self,
        request: &ProposalExportRequest,
        accent_color: PdfColor,
    ) -> Result<(), ContextError> {
        let configuration = self.configuration;
        let content_width = configuration.content_width();

        let title_lines = self.wrap(
            &request.title,
            self.fonts.bold,
            configuration.title_font_size,
            content_width,
        )?;
        self.write_lines(
            &title_lines,
            self.fonts.bold,
            configuration.title_font_size,
            BLACK,
            configuration.title_advance,
        )?;

        let subtitle_lines = self.wrap(
            &request.subtitle(),
            self.fonts.regular,
            configuration.subtitle_font_size,
            content_width,
        )?;
        self.write_lines(
            &subtitle_lines,
            self.fonts.regular,
            configuration.subtitle_font_size,
            SUBTITLE_GREY,
            configuration.subtitle_advance,
        )?;

        if let Some(company_name) = request.company_name() {
            let company_lines = self.wrap(
                company_name,
                self.fonts.regular,
                configuration.company_font_size,
                content_width,
            )?;
            self.write_lines(
                &company_lines,
                self.fonts.regular,
                configuration.company_font_size,
                SUBTITLE_GREY,
                configuration.company_advance,
            )?;
        }

        self.ensure_space(configuration.rule_advance);
        let rule_y = self.paginator.cursor();
        self.pdf_document.draw_line_in_page(
            self.current_page,
            accent_color,
            configuration.rule_width,
            [configuration.margin, rule_y],
            [configuration.page_width - configuration.margin, rule_y],
        )?;
        self.paginator.advance(configuration.rule_advance);

        Ok(())
    }

    fn compose_section(
        &mut self,
        section: &Section,
        accent_color: PdfColor,
    ) -> Result<(), ContextError> {
        let configuration = self.configuration;
        let heading_indent = configuration.accent_bar_width + HEADING_INDENT_GAP;

        let mut heading_lines = self.wrap(
            &section.title,
            self.fonts.bold,
            configuration.heading_font_size,
            configuration.content_width() - heading_indent,
        )?;
        if heading_lines.is_empty() {
            heading_lines.push(String::new());
        }
        let body_blocks: Vec<LayoutBlock> = {
            let font = self.pdf_document.font(self.fonts.regular)?;
            layout_paragraphs(
                &normalize_html(&section.content),
                font,
                configuration.body_font_size,
                configuration.content_width(),
            )
        };

        // The heading is kept together with the first line of its body
        let heading_height = heading_lines.len() as f32 * configuration.heading_advance;
        self.ensure_space(heading_height + configuration.line_height);
        log::debug!(
            "Placing the section {:?} on page {}",
            section.title,
            self.current_page + 1
        );

        let cap_height = points_to_millimeters(configuration.heading_font_size * CAP_HEIGHT_RATIO);
        let extra_lines_height = (heading_lines.len() - 1) as f32 * configuration.heading_advance;
        let bar_bottom = self.paginator.cursor() - extra_lines_height - 1.0;
        self.pdf_document.fill_rectangle_in_page(
            self.current_page,
            accent_color,
            [configuration.margin, bar_bottom],
            [configuration.accent_bar_width, extra_lines_height + cap_height + 1.0],
        )?;
        for heading_line in heading_lines.iter() {
            self.write_line(
                heading_line,
                self.fonts.bold,
                configuration.heading_font_size,
                BLACK,
                configuration.margin + heading_indent,
            )?;
            self.paginator.advance(configuration.heading_advance);
        }

        for (block_index, block) in body_blocks.iter().enumerate() {
            // The gap between paragraphs is dropped when it falls on a page break
            if block_index > 0 && !self.ensure_space(configuration.paragraph_spacing) {
                self.paginator.advance(configuration.paragraph_spacing);
            }
            self.write_lines(
                &block.lines,
                self.fonts.regular,
                configuration.body_font_size,
                BLACK,
                configuration.line_height,
            )?;
        }
        self.paginator.advance(configuration.section_spacing);

        Ok(())
    }

    /// Writes the footer on every page, once the total page count is known.
    fn compose_footers(&mut self, footer_text: &str) -> Result<(), ContextError> {
        let configuration = self.configuration;
        let page_count = self.pdf_document.page_count();
        let footer_font_size = configuration.footer_font_size;

        let footer_width = self
            .pdf_document
            .font(self.fonts.italic)?
            .text_width(footer_text, footer_font_size);
        let footer_x = (configuration.page_width - footer_width) / 2.0;

        for page_index in 0..page_count {
            self.pdf_document.write_text_to_page(
                page_index,
                FOOTER_GREY,
                footer_text,
                self.fonts.italic,
                footer_font_size,
                [footer_x, configuration.footer_offset],
            )?;

            let page_label = format!("Page {} of {}", page_index + 1, page_count);
            let page_label_width = self
                .pdf_document
                .font(self.fonts.regular)?
                .text_width(&page_label, footer_font_size);
            self.pdf_document.write_text_to_page(
                page_index,
                FOOTER_GREY,
                &page_label,
                self.fonts.regular,
                footer_font_size,
                [
                    configuration.page_width - configuration.margin - page_label_width,
                    configuration.footer_offset,
                ],
            )?;
        }

        Ok(())
    }
}
