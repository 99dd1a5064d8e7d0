use std::path::PathBuf;

use owned_ttf_parser::{AsFaceRef as _, OwnedFace};
use proposal_export::{
    configuration::{FontAssociation, FontStyle},
    ExportConfiguration, ExportFormat, Exporter, ProposalExportRequest, Section,
};
use time::macros::datetime;

fn font_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts/DejaVuSansMono.ttf")
}

fn embedded_fonts_configuration() -> ExportConfiguration {
    ExportConfiguration {
        font_associations: [FontStyle::Regular, FontStyle::Bold, FontStyle::Italic]
            .into_iter()
            .map(|font_style| FontAssociation {
                font_style,
                font_file_path: font_path(),
            })
            .collect(),
        ..Default::default()
    }
}

fn export_with_embedded_fonts(title: &str) -> Vec<u8> {
    let request = ProposalExportRequest {
        title: title.to_string(),
        proposal_type: "Project".to_string(),
        sections: vec![Section {
            title: "Introduction".to_string(),
            content: "<p>Café • naïve</p><ul><li>One</li><li>Two</li></ul>".to_string(),
            order: 0,
        }],
        company_name: Some("Acme Co".to_string()),
        primary_color: None,
    };

    Exporter::new(embedded_fonts_configuration())
        .export_at(&request, ExportFormat::Pdf, datetime!(2026-10-16 10:00 UTC))
        .unwrap()
        .into_buffer()
}

#[test]
fn configured_fonts_are_embedded_as_type0_fonts() {
    let document = lopdf::Document::load_mem(&export_with_embedded_fonts("Embedded")).unwrap();

    let type0_fonts: Vec<&lopdf::Dictionary> = document
        .objects
        .values()
        .filter_map(|object| object.as_dict().ok())
        .filter(|dictionary| {
            dictionary
                .get(b"Subtype")
                .and_then(|subtype| subtype.as_name())
                .map_or(false, |subtype| subtype == b"Type0")
        })
        .collect();
    assert_eq!(type0_fonts.len(), 3);

    for font in type0_fonts {
        assert_eq!(font.get(b"Encoding").unwrap().as_name().unwrap(), b"Identity-H");

        let descendant = font.get(b"DescendantFonts").unwrap().as_array().unwrap()[0]
            .as_dict()
            .unwrap();
        assert_eq!(
            descendant.get(b"Subtype").unwrap().as_name().unwrap(),
            b"CIDFontType2"
        );
        assert!(!descendant.get(b"W").unwrap().as_array().unwrap().is_empty());

        let font_descriptor_id = descendant
            .get(b"FontDescriptor")
            .unwrap()
            .as_reference()
            .unwrap();
        let font_descriptor = document.get_dictionary(font_descriptor_id).unwrap();
        let font_file_id = font_descriptor
            .get(b"FontFile2")
            .unwrap()
            .as_reference()
            .unwrap();
        let font_file = document.get_object(font_file_id).unwrap().as_stream().unwrap();
        assert_eq!(font_file.content, std::fs::read(font_path()).unwrap());

        let to_unicode_id = font.get(b"ToUnicode").unwrap().as_reference().unwrap();
        let to_unicode = document.get_object(to_unicode_id).unwrap().as_stream().unwrap();
        let cmap = String::from_utf8_lossy(&to_unicode.content);
        assert!(cmap.contains("begincmap"));
        assert!(cmap.contains("beginbfchar"));
        assert!(cmap.contains("endcmap"));
    }
}

#[test]
fn text_is_written_as_glyph_identifiers() {
    let title = "Embedded Fonts";
    let document = lopdf::Document::load_mem(&export_with_embedded_fonts(title)).unwrap();
    let face = OwnedFace::from_vec(std::fs::read(font_path()).unwrap(), 0).unwrap();

    let page_id = *document.get_pages().values().next().unwrap();
    let content = document.get_page_content(page_id).unwrap();
    let operands: Vec<(Vec<u8>, lopdf::StringFormat)> = lopdf::content::Content::decode(&content)
        .unwrap()
        .operations
        .into_iter()
        .filter(|operation| operation.operator == "Tj")
        .filter_map(|operation| match operation.operands.into_iter().next() {
            Some(lopdf::Object::String(bytes, format)) => Some((bytes, format)),
            _ => None,
        })
        .collect();
    assert!(!operands.is_empty());
    assert!(operands
        .iter()
        .all(|(_, format)| matches!(format, lopdf::StringFormat::Hexadecimal)));

    // The title is drawn first, two bytes per glyph
    let expected_title: Vec<u8> = title
        .chars()
        .map(|character| face.as_face_ref().glyph_index(character).unwrap().0)
        .flat_map(|glyph_id| glyph_id.to_be_bytes())
        .collect();
    assert_eq!(operands[0].0, expected_title);
}

#[test]
fn embedded_export_is_deterministic() {
    similar_asserts::assert_eq!(
        export_with_embedded_fonts("Deterministic"),
        export_with_embedded_fonts("Deterministic")
    );
}
