use lopdf::{Object, StringFormat};
use owned_ttf_parser::{AsFaceRef as _, Face, OwnedFace};
use std::{
    collections::{BTreeMap, HashMap},
    io::BufWriter,
    mem,
    path::Path,
};
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization as _;

use crate::error::ContextError;
use crate::layout::TextMeasure;
use crate::standard_fonts::{encode_win_ansi, StandardFont};

/// The (insofar) relevant vertical metrics of a font.
#[derive(Clone, Copy, Debug, Default)]
pub struct FontMetrics {
    /// The ascent of the font.
    pub ascent: i16,
    /// The descent of the font.
    pub descent: i16,
    /// The number of units per em of the font.
    pub units_per_em: u16,
}

/// The (insofar) relevant metrics associated to a single glyph of a font.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlyphMetrics {
    /// The width of the glyph.
    pub width: u32,
    /// The height of the glyph.
    pub height: u32,
}

/// A font face loaded from a TTF font, together with its measure of units per em.
#[derive(Clone, Debug)]
struct TtfFontFace {
    /// The underlying font face which is represented through the `ttf_parser` crate.
    inner: std::sync::Arc<owned_ttf_parser::OwnedFace>,
    /// The number of units per em of the font face.
    units_per_em: u16,
}

impl TtfFontFace {
    /// Retrieve the font metrics from the associated font face.
    fn font_metrics(&self) -> FontMetrics {
        FontMetrics {
            ascent: self.face().ascender(),
            descent: self.face().descender(),
            units_per_em: self.units_per_em,
        }
    }

    /// Retrieve the glyph ID of a specific codepoint, which in our case is just a `char`.
    fn glyph_id(&self, codepoint: char) -> Option<u16> {
        self.face()
            .glyph_index(codepoint)
            .map(|glyph_id| glyph_id.0)
    }

    /// Retrieve the mapping between the glyph IDs and the characters (codepoints), that specifically
    /// contains exactly the number of unicode glyphs present in the font.
    fn glyph_ids(&self) -> HashMap<u16, char> {
        let font_subtables = self.face().tables().cmap.map(|cmap| {
            cmap.subtables
                .into_iter()
                .filter(|font_subtable| font_subtable.is_unicode())
        });
        let Some(font_subtables) = font_subtables else {
            return HashMap::new();
        };

        let mut gid_to_codepoint_map =
            HashMap::with_capacity(self.face().number_of_glyphs().into());
        for font_subtable in font_subtables {
            font_subtable.codepoints(|codepoint| {
                if let Ok(character) = char::try_from(codepoint) {
                    // Glyph 0 is the missing glyph and is never mapped back to a character
                    if let Some(glyph_index) = font_subtable
                        .glyph_index(codepoint)
                        .filter(|index| index.0 > 0)
                    {
                        gid_to_codepoint_map
                            .entry(glyph_index.0)
                            .or_insert(character);
                    }
                }
            })
        }

        gid_to_codepoint_map
    }

    /// Retrieve the total number of glyphs present in the font face.
    fn glyph_count(&self) -> u16 {
        self.face().number_of_glyphs()
    }

    /// Attempt to calculate the metrics of a glyph from the associated glyph ID, taken as input.
    fn glyph_metrics(&self, glyph_id: u16) -> Option<GlyphMetrics> {
        let glyph_id = owned_ttf_parser::GlyphId(glyph_id);

        let width = self.face().glyph_hor_advance(glyph_id)? as u32;
        // The height of the glyph is corrected by employing the descender vertical metric
        // of the font face (this is supposedly valid only for horizontally-laid fonts).
        let height = self
            .face()
            .glyph_bounding_box(glyph_id)
            .map(|bounding_box| bounding_box.y_max - bounding_box.y_min - self.face().descender())
            .unwrap_or(1000) as u32;

        Some(GlyphMetrics { width, height })
    }

    /// Constructs a font face from the underlying raw data extracted from the TTF font file.
    fn from_bytes(data: &[u8]) -> Result<Self, ContextError> {
        let face = OwnedFace::from_vec(data.to_vec(), 0)
            .map_err(|error| ContextError::with_error("Failed to parse font", &error))?;
        let units_per_em = face.as_face_ref().units_per_em();

        Ok(Self {
            inner: std::sync::Arc::new(face),
            units_per_em,
        })
    }

    /// Retrieve the underlying font face as a reference.
    fn face(&self) -> &Face<'_> {
        self.inner.as_face_ref()
    }
}

/// Where the glyphs of a font come from: either one of the fonts every PDF viewer provides,
/// or a TrueType font which is embedded into the document.
#[derive(Debug, Clone)]
enum FontSource {
    Standard(StandardFont),
    TrueType {
        /// The byte data the font was loaded from.
        bytes: Vec<u8>,
        /// The actual font face, together with its measure of units per em.
        ttf_face: TtfFontFace,
    },
}

/// A font registered into a `PdfDocument`, together with the identifier it is referenced by
/// from the content streams.
#[derive(Debug, Clone)]
pub struct Font {
    source: FontSource,
    /// The identifier of the font face.
    face_identifier: String,
}

impl TextMeasure for Font {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let em_fraction = match &self.source {
            FontSource::Standard(standard_font) => {
                standard_font.string_width(&text.nfc().collect::<String>()) as f32 / 1000.0
            }
            FontSource::TrueType { ttf_face, .. } => {
                let advance: u32 = text
                    .nfc()
                    .filter_map(|character| ttf_face.glyph_id(character))
                    .filter_map(|glyph_id| ttf_face.glyph_metrics(glyph_id))
                    .map(|glyph_metrics| glyph_metrics.width)
                    .sum();
                advance as f32 / f32::from(ttf_face.units_per_em)
            }
        };

        points_to_millimeters(em_fraction * font_size)
    }
}

impl Font {
    /// The identifier used for selecting this font with the `Tf` operator.
    pub fn face_identifier(&self) -> &str {
        &self.face_identifier
    }

    /// Encodes the text into the string operand of the `Tj` operator, which depends on the font:
    /// standard fonts take WinAnsi bytes while embedded fonts take big-endian glyph IDs.
    fn encode_text(&self, text: &str) -> Object {
        match &self.source {
            FontSource::Standard(_) => {
                Object::String(encode_win_ansi(&text.nfc().collect::<String>()), StringFormat::Literal)
            }
            FontSource::TrueType { ttf_face, .. } => {
                let mut glyph_id_list = Vec::<u16>::new();
                for character in text.nfc() {
                    if let Some(glyph_id) = ttf_face.glyph_id(character) {
                        glyph_id_list.push(glyph_id);
                    } else {
                        log::warn!("Unable to find the character {:?} in the font", character)
                    }
                }

                let glyph_id_bytes = glyph_id_list
                    .iter()
                    .flat_map(|glyph_id| glyph_id.to_be_bytes())
                    .collect::<Vec<u8>>();
                Object::String(glyph_id_bytes, StringFormat::Hexadecimal)
            }
        }
    }

    /// Inserts the font into the PDF document, returning the associated PDF dictionary.
    fn insert_into_document(&self, inner_document: &mut lopdf::Document) -> lopdf::Dictionary {
        use lopdf::Object::*;

        match &self.source {
            FontSource::Standard(standard_font) => lopdf::Dictionary::from_iter(vec![
                ("Type", Name("Font".into())),
                ("Subtype", Name("Type1".into())),
                ("BaseFont", Name(standard_font.base_font_name().into())),
                ("Encoding", Name("WinAnsiEncoding".into())),
            ]),
            FontSource::TrueType { bytes, ttf_face } => {
                self.insert_true_type_into_document(inner_document, bytes, ttf_face)
            }
        }
    }

    /// Embeds a TrueType font as a `Type0` font with an `Identity-H` encoding, so that the content
    /// streams address it by glyph ID, and a `ToUnicode` map so that the text stays extractable.
    fn insert_true_type_into_document(
        &self,
        inner_document: &mut lopdf::Document,
        bytes: &[u8],
        ttf_face: &TtfFontFace,
    ) -> lopdf::Dictionary {
        use lopdf::Object::*;
        let face_metrics = ttf_face.font_metrics();

        let font_stream = lopdf::Stream::new(
            lopdf::Dictionary::from_iter(vec![("Length1", Integer(bytes.len() as i64))]),
            bytes.to_vec(),
        )
        .with_compression(false);

        let mut font_vector: Vec<(::std::string::String, lopdf::Object)> = vec![
            ("Type".into(), Name("Font".into())),
            ("Subtype".into(), Name("Type0".into())),
            (
                "BaseFont".into(),
                Name(self.face_identifier.clone().into_bytes()),
            ),
            // `Identity-H` is used for horizontal writing, while `Identity-V` for vertical writing
            ("Encoding".into(), Name("Identity-H".into())),
        ];

        let mut font_descriptor_vector: Vec<(::std::string::String, lopdf::Object)> = vec![
            ("Type".into(), Name("FontDescriptor".into())),
            (
                "FontName".into(),
                Name(self.face_identifier.clone().into_bytes()),
            ),
            ("Ascent".into(), Integer(i64::from(face_metrics.ascent))),
            ("Descent".into(), Integer(i64::from(face_metrics.descent))),
            ("CapHeight".into(), Integer(i64::from(face_metrics.ascent))),
            ("ItalicAngle".into(), Integer(0)),
            // Nonsymbolic font using the Adobe standard Latin character set
            ("Flags".into(), Integer(32)),
            ("StemV".into(), Integer(80)),
        ];

        let mut maximum_character_height = 0;
        let mut total_width = 0;

        // Glyph ID to (codepoint, width, height)
        let mut gid_to_glyph_properties_map = BTreeMap::<u32, (u32, u32, u32)>::new();
        gid_to_glyph_properties_map.insert(0, (0, 1000, 1000));

        for (glyph_id, character) in ttf_face.glyph_ids() {
            if let Some(glyph_metrics) = ttf_face.glyph_metrics(glyph_id) {
                maximum_character_height = maximum_character_height.max(glyph_metrics.height);
                total_width += glyph_metrics.width;
                gid_to_glyph_properties_map.insert(
                    glyph_id as u32,
                    (character as u32, glyph_metrics.width, glyph_metrics.height),
                );
            }
        }

        // Glyph IDs have to be grouped in blocks whose first and last element share the same high
        // byte, and a `beginbfchar` block holds at most 100 entries.
        let mut current_first_bit: u16 = 0;
        let mut all_gid_to_character_blocks = Vec::new();
        let mut current_gid_to_character_block = Vec::new();
        for (glyph_id, (character, _glyph_width, _glyph_height)) in
            gid_to_glyph_properties_map.iter()
        {
            if (*glyph_id >> 8) as u16 != current_first_bit
                || current_gid_to_character_block.len() >= 100
            {
                all_gid_to_character_blocks.push(mem::take(&mut current_gid_to_character_block));
                current_first_bit = (*glyph_id >> 8) as u16;
            }

            current_gid_to_character_block.push((*glyph_id, *character));
        }
        all_gid_to_character_blocks.push(current_gid_to_character_block);

        let cid_to_unicode_map =
            generate_cid_to_unicode_map(self.face_identifier.clone(), all_gid_to_character_blocks);
        let cid_to_unicode_map_stream = lopdf::Stream::new(
            lopdf::Dictionary::new(),
            cid_to_unicode_map.as_bytes().to_vec(),
        );
        let cid_to_unicode_map_stream_id = inner_document.add_object(cid_to_unicode_map_stream);

        // The widths are encoded as runs of consecutive glyph IDs, `20 [21 99 34]` meaning that
        // the glyph 20 is 21 units wide, the glyph 21 is 99 units wide and so on (PDF 1.7, p. 439)
        let mut width_objects = Vec::<Object>::new();
        let mut current_lesser_glyph_id = 0;
        let mut current_upper_gid = 0;
        let mut current_widths_vector = Vec::<Object>::new();

        // Widths are expressed in a 1000 units per em space
        let percentage_font_scaling = 1000.0 / (face_metrics.units_per_em as f32);

        for glyph_id in 0..ttf_face.glyph_count() {
            if let Some(GlyphMetrics { width, .. }) = ttf_face.glyph_metrics(glyph_id) {
                if glyph_id == current_upper_gid {
                    current_widths_vector
                        .push(Integer((width as f32 * percentage_font_scaling) as i64));
                    current_upper_gid += 1;
                } else {
                    width_objects.push(Integer(current_lesser_glyph_id as i64));
                    width_objects.push(Array(mem::take(&mut current_widths_vector)));

                    current_widths_vector
                        .push(Integer((width as f32 * percentage_font_scaling) as i64));
                    current_lesser_glyph_id = glyph_id;
                    current_upper_gid = glyph_id + 1;
                }
            } else {
                log::warn!(
                    "Glyph ID {} for the font {:?} has no width, skipping it",
                    glyph_id,
                    self.face_identifier
                );
            }
        }
        width_objects.push(Integer(current_lesser_glyph_id as i64));
        width_objects.push(Array(mem::take(&mut current_widths_vector)));

        let mut font_descriptors = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Font".into())),
            ("Subtype", Name("CIDFontType2".into())),
            ("BaseFont", Name(self.face_identifier.clone().into())),
            (
                "CIDSystemInfo",
                Dictionary(lopdf::Dictionary::from_iter(vec![
                    ("Registry", String("Adobe".into(), StringFormat::Literal)),
                    ("Ordering", String("Identity".into(), StringFormat::Literal)),
                    ("Supplement", Integer(0)),
                ])),
            ),
            ("W", Array(width_objects)),
            ("DW", Integer(1000)),
        ]);

        let font_bounding_box = vec![
            Integer(0),
            Integer(maximum_character_height as i64),
            Integer(total_width as i64),
            Integer(maximum_character_height as i64),
        ];
        font_descriptor_vector.push((
            "FontFile2".into(),
            Reference(inner_document.add_object(font_stream)),
        ));
        // Not required by the format, but Adobe Reader refuses the font without it
        font_descriptor_vector.push(("FontBBox".into(), Array(font_bounding_box)));

        let font_descriptor_vector_id =
            inner_document.add_object(lopdf::Dictionary::from_iter(font_descriptor_vector));
        font_descriptors.set("FontDescriptor", Reference(font_descriptor_vector_id));

        font_vector.push((
            "DescendantFonts".into(),
            Array(vec![Dictionary(font_descriptors)]),
        ));
        font_vector.push(("ToUnicode".into(), Reference(cid_to_unicode_map_stream_id)));

        lopdf::Dictionary::from_iter(font_vector)
    }
}

/// One layer of PDF data, that is the sequence of content operations of a page.
#[derive(Debug, Clone, Default)]
pub struct PdfLayer {
    /// Stream objects in this layer.
    pub(crate) operations: Vec<lopdf::content::Operation>,
}

impl PdfLayer {
    /// Encodes the operations into an uncompressed content stream.
    fn into_stream(self) -> Result<lopdf::Stream, ContextError> {
        let stream_content = lopdf::content::Content {
            operations: self.operations,
        };
        let encoded_content = stream_content.encode().map_err(|error| {
            ContextError::with_error("Failed to encode PDF layer content", &error)
        })?;

        Ok(lopdf::Stream::new(lopdf::Dictionary::new(), encoded_content).with_compression(false))
    }
}

/// The representation of a PDF page, whose content is kept in memory until the document is
/// written, so that it can still be amended after the following pages have been laid out.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    /// The content of the page.
    pub layer: PdfLayer,
}

/// Converts millimeters to points. This function is used in order to present the data
/// in the format required by the PDF specification, while the end user might want to work in
/// millimeters which are easier to reason about.
pub fn millimeters_to_points(millimeters: f32) -> f32 {
    millimeters * 2.834646
}

/// Converts points back to millimeters.
pub fn points_to_millimeters(points: f32) -> f32 {
    points / 2.834646
}

/// The metadata written into the `Info` dictionary of the document.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub title: String,
    pub creator: String,
    pub creation_date: OffsetDateTime,
}

/// An RGB color whose components go from 0 to 1.
pub type PdfColor = [f32; 3];

/// This struct represents the actual PDF document on a high-level. It is an interface to the actual underlying
/// `lopdf::Document` with the addition of the PDF pages, the document ID and the fonts used in the document.
///
/// Positions are given in millimeters from the bottom-left corner of the page and font sizes in points.
pub struct PdfDocument {
    /// The fonts of the document, indexed by their font index, and the object they are represented by.
    fonts: Vec<(lopdf::ObjectId, Font)>,
    /// The underlying PDF document: this is a low-level interface and shouldn't be directly interacted with
    /// unless strictly necessary.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used to in order to set the PDF `ID` tag.
    pub identifier: String,
    /// The pages of the PDF document.
    pub(crate) pages: Vec<PdfPage>,
}

impl PdfDocument {
    /// Create a new `PdfDocument` by defaulting the underlying PDF document to version 1.5
    /// of the PDF specification and customly specifying the PDF identifier.
    pub fn new(pdf_document_identifier: String) -> Self {
        PdfDocument {
            fonts: Vec::new(),
            inner_document: lopdf::Document::with_version("1.5"),
            identifier: pdf_document_identifier,
            pages: Vec::new(),
        }
    }

    /// Adds an empty page of given width and height in millimeters, returning its index.
    pub fn add_page(&mut self, page_width: f32, page_height: f32) -> usize {
        self.pages.push(PdfPage {
            width: millimeters_to_points(page_width),
            height: millimeters_to_points(page_height),
            layer: PdfLayer::default(),
        });

        self.pages.len() - 1
    }

    /// The number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Registers one of the standard fonts, returning its font index.
    pub fn add_standard_font(&mut self, standard_font: StandardFont) -> usize {
        self.register_font(FontSource::Standard(standard_font))
    }

    /// Add a font from the given path to the document. This function expects the font to be TTF, or either way
    /// an OTF font which is just a wrapper around a TTF font. If successful, the function returns
    /// the index of the font which is then to be used in order to write text.
    pub fn add_font(&mut self, font_path: &Path) -> Result<usize, ContextError> {
        let font_bytes = std::fs::read(font_path).map_err(|error| {
            ContextError::with_error(
                format!("Failed to read the font {:?}, probably the path is wrong", font_path),
                &error,
            )
        })?;

        self.add_font_from_bytes(font_bytes)
    }

    /// Add a TTF font from its raw data, returning its font index.
    pub fn add_font_from_bytes(&mut self, font_bytes: Vec<u8>) -> Result<usize, ContextError> {
        let ttf_face = TtfFontFace::from_bytes(&font_bytes)?;

        Ok(self.register_font(FontSource::TrueType {
            bytes: font_bytes,
            ttf_face,
        }))
    }

    /// Retrieve the font at the given font index.
    pub fn font(&self, font_index: usize) -> Result<&Font, ContextError> {
        self.fonts
            .get(font_index)
            .map(|(_, font)| font)
            .ok_or(ContextError::with_context(format!(
                "Failed to find font {} into the fonts map",
                font_index
            )))
    }

    /// Writes the text in the specified font and color, with its baseline starting at the caret
    /// position given in millimeters.
    pub fn write_text_to_page(
        &mut self,
        page_index: usize,
        color: PdfColor,
        text: &str,
        font_index: usize,
        font_size: f32,
        caret_position: [f32; 2],
    ) -> Result<(), ContextError> {
        use lopdf::content::Operation;

        let font = self.font(font_index)?;
        let face_identifier = font.face_identifier.clone();
        let encoded_text = font.encode_text(text);
        let [x, y] = caret_position;
        let [r, g, b] = color;

        self.add_operations_to_page(
            page_index,
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![face_identifier.into(), font_size.into()]),
                Operation::new(
                    "Td",
                    vec![
                        millimeters_to_points(x).into(),
                        millimeters_to_points(y).into(),
                    ],
                ),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new("Tj", vec![encoded_text]),
                Operation::new("ET", vec![]),
            ],
        )
    }

    /// Strokes a straight line between two points given in millimeters.
    pub fn draw_line_in_page(
        &mut self,
        page_index: usize,
        color: PdfColor,
        line_width: f32,
        from: [f32; 2],
        to: [f32; 2],
    ) -> Result<(), ContextError> {
        use lopdf::content::Operation;
        let [r, g, b] = color;

        self.add_operations_to_page(
            page_index,
            vec![
                Operation::new("q", vec![]),
                Operation::new("RG", vec![r.into(), g.into(), b.into()]),
                Operation::new("w", vec![millimeters_to_points(line_width).into()]),
                Operation::new(
                    "m",
                    vec![
                        millimeters_to_points(from[0]).into(),
                        millimeters_to_points(from[1]).into(),
                    ],
                ),
                Operation::new(
                    "l",
                    vec![
                        millimeters_to_points(to[0]).into(),
                        millimeters_to_points(to[1]).into(),
                    ],
                ),
                Operation::new("S", vec![]),
                Operation::new("Q", vec![]),
            ],
        )
    }

    /// Fills a rectangle whose bottom-left corner and size are given in millimeters.
    pub fn fill_rectangle_in_page(
        &mut self,
        page_index: usize,
        color: PdfColor,
        origin: [f32; 2],
        size: [f32; 2],
    ) -> Result<(), ContextError> {
        use lopdf::content::Operation;
        let [r, g, b] = color;

        self.add_operations_to_page(
            page_index,
            vec![
                Operation::new("q", vec![]),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new(
                    "re",
                    [origin[0], origin[1], size[0], size[1]]
                        .into_iter()
                        .map(|value| millimeters_to_points(value).into())
                        .collect(),
                ),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ],
        )
    }

    /// Write the pages and fonts so far specified to the underlying document and finalize it.
    /// One mandatory argument needed by the PDF specification is the instance ID, which is
    /// written next to the document identifier in the trailer.
    pub fn write_all(
        &mut self,
        instance_id: String,
        document_info: &DocumentInfo,
    ) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        let creation_date = to_pdf_timestamp_format(&document_info.creation_date);
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", "False".into()),
            ("CreationDate", String(creation_date.clone().into_bytes(), Literal)),
            ("ModDate", String(creation_date.into_bytes(), Literal)),
            ("Title", String(pdf_text_string(&document_info.title), Literal)),
            ("Creator", String(pdf_text_string(&document_info.creator), Literal)),
            ("Producer", String(env!("CARGO_PKG_NAME").into(), Literal)),
            ("Identifier", String(self.identifier.clone().into_bytes(), Literal)),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        let pages_id = self.inner_document.new_object_id();
        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", "Catalog".into()),
            ("PageLayout", "OneColumn".into()),
            ("PageMode", "UseNone".into()),
            ("Pages", Reference(pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document
            .trailer
            .set("Root", Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                String(self.identifier.clone().into_bytes(), Literal),
                String(instance_id.into_bytes(), Literal),
            ]),
        );

        let fonts_dictionary = self.insert_fonts_into_document();
        let fonts_dictionary_id = self.inner_document.add_object(fonts_dictionary);
        let resources_id = self.inner_document.add_object(lopdf::Dictionary::from_iter(vec![(
            "Font",
            Reference(fonts_dictionary_id),
        )]));

        let mut page_ids = Vec::<lopdf::Object>::new();
        for page in mem::take(&mut self.pages) {
            let media_box: lopdf::Object =
                vec![0.into(), 0.into(), page.width.into(), page.height.into()].into();
            let page_content_id = self.inner_document.add_object(page.layer.into_stream()?);

            let page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", "Page".into()),
                ("Rotate", Integer(0)),
                ("MediaBox", media_box.clone()),
                ("TrimBox", media_box.clone()),
                ("CropBox", media_box),
                ("Parent", Reference(pages_id)),
                ("Resources", Reference(resources_id)),
                ("Contents", Reference(page_content_id)),
            ]);
            page_ids.push(Reference(self.inner_document.add_object(page_dictionary)));
        }

        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", "Pages".into()),
            ("Count", Integer(page_ids.len() as i64)),
            ("Kids", Array(page_ids)),
        ]);
        self.inner_document
            .objects
            .insert(pages_id, Dictionary(pages));

        Ok(())
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    fn register_font(&mut self, source: FontSource) -> usize {
        let font = Font {
            source,
            face_identifier: format!("F{}", self.fonts.len()),
        };
        let font_object_id = self.inner_document.new_object_id();
        self.fonts.push((font_object_id, font));

        self.fonts.len() - 1
    }

    /// Converts the fonts into a dictionary and inserts them into the document.
    fn insert_fonts_into_document(&mut self) -> lopdf::Dictionary {
        let mut font_dictionary = lopdf::Dictionary::new();

        for (font_object_id, font) in self.fonts.iter() {
            let collected_font_dictionary = font.insert_into_document(&mut self.inner_document);

            self.inner_document.objects.insert(
                *font_object_id,
                lopdf::Object::Dictionary(collected_font_dictionary),
            );
            font_dictionary.set(
                font.face_identifier.clone(),
                lopdf::Object::Reference(*font_object_id),
            );
        }

        font_dictionary
    }

    /// This function is responsible for adding the given operations to the specified page.
    fn add_operations_to_page(
        &mut self,
        page_index: usize,
        operations: Vec<lopdf::content::Operation>,
    ) -> Result<(), ContextError> {
        let pdf_page = self
            .pages
            .get_mut(page_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            )))?;
        pdf_page.layer.operations.extend(operations);

        Ok(())
    }
}

type GlyphId = u32;
type UnicodeCodePoint = u32;
type CmapBlock = Vec<(GlyphId, UnicodeCodePoint)>;

/// Generates a CMAP (character map) from valid cmap blocks by iterating over them. This function adheres to
/// the PDF specification by employing a predefined beginning and end section which is inserted at compile time.
fn generate_cid_to_unicode_map(face_name: String, all_cmap_blocks: Vec<CmapBlock>) -> String {
    let mut cid_to_unicode_map =
        format!(include_str!("../assets/gid_to_unicode_beg.txt"), face_name);

    for cmap_block in all_cmap_blocks
        .into_iter()
        .filter(|block| !block.is_empty())
    {
        cid_to_unicode_map.push_str(format!("{} beginbfchar\r\n", cmap_block.len()).as_str());
        for (glyph_id, unicode) in cmap_block {
            cid_to_unicode_map.push_str(format!("<{glyph_id:04x}> <{unicode:04x}>\n").as_str());
        }
        cid_to_unicode_map.push_str("endbfchar\r\n");
    }

    cid_to_unicode_map.push_str(include_str!("../assets/gid_to_unicode_end.txt"));

    cid_to_unicode_map
}

/// Encodes a string for the `Info` dictionary: plain ASCII is kept as is, anything else is
/// written as UTF-16BE with a byte order mark.
fn pdf_text_string(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        return text.as_bytes().to_vec();
    }

    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    bytes
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_info() -> DocumentInfo {
        DocumentInfo {
            title: "Test".into(),
            creator: "Tests".into(),
            creation_date: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(
            to_pdf_timestamp_format(&OffsetDateTime::UNIX_EPOCH),
            "D:19700101000000+00'00'"
        );
    }

    #[test]
    fn test_standard_font_width_in_millimeters() {
        let mut pdf_document = PdfDocument::new("identifier".into());
        let font_index = pdf_document.add_standard_font(StandardFont::Helvetica);
        let font = pdf_document.font(font_index).unwrap();

        // 1000 units at 72 points are exactly one inch
        let width = font.text_width("WW", 36.0);
        assert!((width - 2.0 * 944.0 / 1000.0 * 12.7).abs() < 1e-3, "{}", width);
    }

    #[test]
    fn test_invalid_font_bytes_are_rejected() {
        let mut pdf_document = PdfDocument::new("identifier".into());

        assert!(pdf_document.add_font_from_bytes(vec![0, 1, 2, 3]).is_err());
        assert!(pdf_document.font(0).is_err());
    }

    #[test]
    fn test_writing_to_a_missing_page_fails() {
        let mut pdf_document = PdfDocument::new("identifier".into());
        let font_index = pdf_document.add_standard_font(StandardFont::Helvetica);

        let result =
            pdf_document.write_text_to_page(3, [0.0; 3], "Hello", font_index, 12.0, [0.0, 0.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_saved_document_can_be_loaded_back() {
        let mut pdf_document = PdfDocument::new("QU2KK7yivMeRDnU8DodEQxnfqJAe4wZ2".into());
        let font_index = pdf_document.add_standard_font(StandardFont::HelveticaBold);
        for _ in 0..2 {
            let page_index = pdf_document.add_page(210.0, 297.0);
            pdf_document
                .write_text_to_page(page_index, [0.0; 3], "Hello, world!", font_index, 24.0, [20.0, 277.0])
                .unwrap();
            pdf_document
                .draw_line_in_page(page_index, [0.3, 0.3, 0.9], 0.5, [20.0, 270.0], [190.0, 270.0])
                .unwrap();
            pdf_document
                .fill_rectangle_in_page(page_index, [0.3, 0.3, 0.9], [20.0, 250.0], [1.5, 6.0])
                .unwrap();
        }
        pdf_document
            .write_all("DLjCAhuTD3cvaoQCJnMvkC0iNWEGEfyD".into(), &document_info())
            .unwrap();
        let pdf_document_bytes = pdf_document.save_to_bytes().unwrap();

        let loaded_document = lopdf::Document::load_mem(&pdf_document_bytes).unwrap();
        let pages = loaded_document.get_pages();
        assert_eq!(pages.len(), 2);

        let first_page_id = *pages.get(&1).unwrap();
        let content = loaded_document.get_page_content(first_page_id).unwrap();
        let content = lopdf::content::Content::decode(&content).unwrap();
        let operators: Vec<_> = content
            .operations
            .iter()
            .map(|operation| operation.operator.as_str())
            .collect();
        assert!(operators.contains(&"Tj"));
        assert!(operators.contains(&"re"));
        assert!(operators.contains(&"S"));
    }

    #[test]
    fn test_pdf_text_string() {
        assert_eq!(pdf_text_string("Plan"), b"Plan".to_vec());
        assert_eq!(pdf_text_string("é"), vec![0xFE, 0xFF, 0x00, 0xE9]);
    }
}
