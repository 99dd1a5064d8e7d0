use std::io::{Cursor, Read as _};

use proposal_export::{
    export_proposal, DocxBackend, ExportConfiguration, ExportError, ExportFormat, Exporter,
    ProposalExportRequest, Rgb, Section,
};
use rand::Rng as _;
use time::{macros::datetime, OffsetDateTime};

const GENERATED_AT: OffsetDateTime = datetime!(2026-10-16 10:00 UTC);

fn proposal(title: &str, sections: Vec<Section>) -> ProposalExportRequest {
    ProposalExportRequest {
        title: title.to_string(),
        proposal_type: "Project".to_string(),
        sections,
        company_name: Some("Acme Co".to_string()),
        primary_color: Some(Rgb::new(0x10, 0xB9, 0x81)),
    }
}

fn section(title: &str, content: String) -> Section {
    Section {
        title: title.to_string(),
        content,
        order: 0,
    }
}

/// A paragraph made of the given number of short lines separated by hard breaks.
fn lines_paragraph(prefix: &str, line_count: usize) -> String {
    let lines: Vec<String> = (1..=line_count)
        .map(|line_index| format!("{} {}", prefix, line_index))
        .collect();
    format!("<p>{}</p>", lines.join("<br>"))
}

fn export_pdf(request: &ProposalExportRequest) -> Vec<u8> {
    Exporter::default()
        .export_at(request, ExportFormat::Pdf, GENERATED_AT)
        .unwrap()
        .into_buffer()
}

/// The strings shown by the `Tj` operators of every page, in drawing order.
fn page_texts(pdf_bytes: &[u8]) -> Vec<Vec<String>> {
    let document = lopdf::Document::load_mem(pdf_bytes).unwrap();

    document
        .get_pages()
        .into_values()
        .map(|page_id| {
            let content = document.get_page_content(page_id).unwrap();
            lopdf::content::Content::decode(&content)
                .unwrap()
                .operations
                .into_iter()
                .filter(|operation| operation.operator == "Tj")
                .filter_map(|operation| match operation.operands.first() {
                    Some(lopdf::Object::String(bytes, _)) => {
                        Some(bytes.iter().map(|&byte| char::from(byte)).collect())
                    }
                    _ => None,
                })
                .collect()
        })
        .collect()
}

fn is_footer(text: &str) -> bool {
    text.starts_with("Generated with") || text.starts_with("Page ")
}

#[test]
fn single_short_section_fits_on_one_page() {
    let request = proposal(
        "Website Redesign",
        vec![section("Introduction", "<p>Hello <strong>world</strong></p>".into())],
    );
    let pages = page_texts(&export_pdf(&request));

    assert_eq!(pages.len(), 1);
    let texts = &pages[0];
    assert_eq!(
        texts
            .iter()
            .filter(|text| !is_footer(text))
            .cloned()
            .collect::<Vec<_>>(),
        vec![
            "Website Redesign",
            "PROJECT PROPOSAL",
            "Acme Co",
            "Introduction",
            "Hello world"
        ]
    );
    assert!(texts.contains(&"Page 1 of 1".to_string()));
    assert!(texts
        .iter()
        .any(|text| text.starts_with("Generated with PropelAI") && text.ends_with("October 16, 2026")));
}

#[test]
fn sample_proposal_with_two_short_sections() {
    let request = proposal(
        "Sample Web Development Proposal",
        vec![
            section("Introduction", "<p>We build websites.</p>".into()),
            section(
                "Scope",
                "<ul><li>Design</li><li>Development</li></ul>".into(),
            ),
        ],
    );
    let pages = page_texts(&export_pdf(&request));

    assert_eq!(pages.len(), 1);
    assert!(pages[0].contains(&"Page 1 of 1".to_string()));
    // The bullet is the WinAnsi code 0x95
    assert!(pages[0].contains(&"\u{95} Development".to_string()));
}

#[test]
fn sections_keep_the_input_order_whatever_their_order_field() {
    let sections = ["Gamma", "Alpha", "Beta"]
        .into_iter()
        .zip([5, 1, 1])
        .map(|(title, order)| Section {
            title: title.to_string(),
            content: String::new(),
            order,
        })
        .collect();
    let pages = page_texts(&export_pdf(&proposal("Ordering", sections)));

    let headings: Vec<&String> = pages[0]
        .iter()
        .filter(|text| ["Gamma", "Alpha", "Beta"].contains(&text.as_str()))
        .collect();
    assert_eq!(headings, vec!["Gamma", "Alpha", "Beta"]);
}

#[test]
fn sixty_lines_span_two_pages() {
    let request = proposal(
        "Long Proposal",
        vec![section("Details", lines_paragraph("Line", 60))],
    );
    let pages = page_texts(&export_pdf(&request));

    assert_eq!(pages.len(), 2);
    for (page_index, texts) in pages.iter().enumerate() {
        assert!(texts.contains(&format!("Page {} of 2", page_index + 1)));
    }
    // The heading stays on the first page, above its body
    assert!(pages[0].contains(&"Details".to_string()));
    assert!(pages[1].contains(&"Line 60".to_string()));
}

#[test]
fn headings_are_never_orphaned_and_sections_keep_their_order() {
    let sections: Vec<Section> = (1..=15)
        .map(|section_index| {
            section(
                &format!("Section {}", section_index),
                lines_paragraph(&format!("Body {}", section_index), 5),
            )
        })
        .collect();
    let pages = page_texts(&export_pdf(&proposal("Orphans", sections)));
    assert!(pages.len() > 1);

    let mut seen_headings = Vec::new();
    for texts in pages.iter() {
        let body_texts: Vec<&String> = texts.iter().filter(|text| !is_footer(text)).collect();
        for (text_index, text) in body_texts.iter().enumerate() {
            if let Some(section_index) = text.strip_prefix("Section ") {
                seen_headings.push(section_index.parse::<usize>().unwrap());
                assert_eq!(
                    body_texts.get(text_index + 1).map(|text| text.as_str()),
                    Some(format!("Body {} 1", section_index).as_str()),
                    "heading {:?} is separated from its first line",
                    text
                );
            }
        }
    }
    assert_eq!(seen_headings, (1..=15).collect::<Vec<_>>());
}

#[test]
fn page_count_never_decreases_with_more_content() {
    let mut rng = rand::thread_rng();
    let mut line_count = 0;
    let mut previous_page_count = 0;

    for _ in 0..12 {
        line_count += rng.gen_range(1..40);
        let request = proposal(
            "Growing",
            vec![section("Growing section", lines_paragraph("Line", line_count))],
        );
        let page_count = page_texts(&export_pdf(&request)).len();

        assert!(page_count >= previous_page_count, "{} lines", line_count);
        previous_page_count = page_count;
    }
}

#[test]
fn every_page_carries_its_footer() {
    let request = proposal(
        "Footers",
        vec![
            section("First", lines_paragraph("First", 50)),
            section("Second", lines_paragraph("Second", 50)),
        ],
    );
    let pages = page_texts(&export_pdf(&request));
    let page_count = pages.len();

    for (page_index, texts) in pages.iter().enumerate() {
        assert_eq!(
            texts.iter().filter(|text| is_footer(text)).count(),
            2,
            "page {}",
            page_index + 1
        );
        assert!(texts.contains(&format!("Page {} of {}", page_index + 1, page_count)));
    }
}

#[test]
fn proposal_without_sections_is_a_single_page() {
    let pages = page_texts(&export_pdf(&proposal("Empty", Vec::new())));

    assert_eq!(pages.len(), 1);
    assert!(pages[0].contains(&"Page 1 of 1".to_string()));
}

#[test]
fn characters_outside_the_standard_encoding_are_replaced() {
    let request = proposal(
        "International",
        vec![section("Greetings", "<p>Café 日本</p>".into())],
    );
    let pages = page_texts(&export_pdf(&request));

    assert!(pages[0].contains(&"Café ??".to_string()));
}

#[test]
fn pdf_export_is_deterministic() {
    let request = proposal(
        "Deterministic",
        vec![section("Scope", "<ul><li>One</li><li>Two</li></ul>".into())],
    );

    similar_asserts::assert_eq!(export_pdf(&request), export_pdf(&request));
}

#[test]
fn pdf_result_metadata() {
    let request = proposal("Q1 Proposal: Acme Co", Vec::new());
    let export_result = Exporter::default()
        .export_at(&request, ExportFormat::Pdf, GENERATED_AT)
        .unwrap();

    assert_eq!(export_result.file_name(), "Q1_Proposal__Acme_Co.pdf");
    assert_eq!(export_result.content_type(), "application/pdf");
    assert_eq!(export_result.size_bytes(), export_result.buffer().len());
    assert!(export_result.buffer().starts_with(b"%PDF-1.5"));

    let document = lopdf::Document::load_mem(export_result.buffer()).unwrap();
    let info_id = document
        .trailer
        .get(b"Info")
        .unwrap()
        .as_reference()
        .unwrap();
    let info = document.get_dictionary(info_id).unwrap();
    assert_eq!(
        info.get(b"Title").unwrap().as_str().unwrap(),
        b"Q1 Proposal: Acme Co"
    );
}

#[test]
fn docx_package_can_be_read_back() {
    let request = proposal(
        "Q1 Proposal: Acme Co",
        vec![section("Introduction", "<p>Tom &amp; Jerry</p>".into())],
    );
    let export_result = Exporter::default()
        .export_at(&request, ExportFormat::Docx, GENERATED_AT)
        .unwrap();

    assert_eq!(export_result.file_name(), "Q1_Proposal__Acme_Co.docx");
    assert_eq!(
        export_result.content_type(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(export_result.into_buffer())).unwrap();
    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut document_xml)
        .unwrap();

    let mut reader = quick_xml::Reader::from_str(&document_xml);
    let mut texts = Vec::new();
    let mut inside_text = false;
    loop {
        match reader.read_event().unwrap() {
            quick_xml::events::Event::Start(element) => {
                inside_text = element.name().as_ref() == b"w:t";
            }
            quick_xml::events::Event::Text(text) if inside_text => {
                texts.push(text.unescape().unwrap().into_owned());
            }
            quick_xml::events::Event::End(_) => inside_text = false,
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
    }

    assert_eq!(
        texts,
        vec![
            "Q1 Proposal: Acme Co",
            "PROJECT PROPOSAL",
            "Acme Co",
            "Introduction",
            "Tom & Jerry",
            "Generated with PropelAI • October 16, 2026",
        ]
    );
}

#[test]
fn rtf_backend_serves_docx_requests() {
    let exporter = Exporter::new(ExportConfiguration {
        docx_backend: DocxBackend::Rtf,
        ..Default::default()
    });
    let export_result = exporter
        .export_at(
            &proposal("Fallback", vec![section("Scope", "<p>Text</p>".into())]),
            ExportFormat::Docx,
            GENERATED_AT,
        )
        .unwrap();

    assert_eq!(export_result.file_name(), "Fallback.docx");
    assert!(export_result.buffer().starts_with(b"{\\rtf1"));
}

#[test]
fn disabled_docx_backend_is_reported() {
    let exporter = Exporter::new(ExportConfiguration {
        docx_backend: DocxBackend::Disabled,
        ..Default::default()
    });
    let error = exporter
        .export_at(&proposal("Plan", Vec::new()), ExportFormat::Docx, GENERATED_AT)
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "DOCX export is temporarily unavailable. Please use PDF export instead."
    );
    // PDF keeps working
    assert!(exporter
        .export_at(&proposal("Plan", Vec::new()), ExportFormat::Pdf, GENERATED_AT)
        .is_ok());
}

#[test]
fn unsupported_format_is_rejected() {
    let error = export_proposal(
        &proposal("Plan", Vec::new()),
        "HTML",
        ExportConfiguration::default(),
    )
    .unwrap_err();

    assert_eq!(error, ExportError::UnsupportedFormat("HTML".to_string()));
}
