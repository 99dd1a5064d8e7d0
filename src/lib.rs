//! Proposal Export turns business proposals, made of a title, some branding and an ordered list of
//! sections written in a rich-text editor, into downloadable documents.
//!
//! The entry point of this crate is the `Exporter` struct, which receives a `ProposalExportRequest`
//! together with the requested `ExportFormat` and returns an `ExportResult` holding the bytes of
//! the document, its file name and its MIME type. Two formats are supported: PDF, laid out and
//! paginated by this crate on top of the low-level `PdfDocument` interface, and DOCX, written
//! either as a WordprocessingML package or as an RTF document depending on the configuration.
//!
//! Rendering is deterministic: given the same request, configuration and export timestamp, the
//! produced bytes are always the same, which is what makes the documents testable.

/// The module where the top-level `Exporter` interface is presented.
///
/// # Introduction
///
/// The `Exporter` validates the request, selects the renderer from the `ExportFormat` and the
/// configured `DocxBackend`, and wraps the rendered bytes into an `ExportResult`. Every export can
/// then be summarized by an `ExportRecord`, which is what the storage layer persists.
///
/// Errors are reported through the `ExportError` enum, whose variants distinguish a request for an
/// unknown format, an invalid request, a failure while rendering, and a disabled backend.
pub mod export;

/// This module contains the error types used throughout this library.
///
/// The `ContextError` type carries a human readable context together with the message of the error
/// it was propagated from, if any. It is used by the lower layers, such as the PDF writer and the
/// configuration loader. The `ExportError` enum is the single error type returned by an export, and
/// wraps the `ContextError` of a failed rendering.
pub mod error;

/// The data model of an export request: the proposal with its sections, and the branding color.
pub mod proposal;

/// The layout and typography parameters of the exporter, loaded from an optional JSON file.
///
/// Every field falls back to its default, which reproduces an A4 page with 20mm margins and the
/// standard Helvetica fonts. TTF fonts can be embedded in place of Helvetica by listing them in
/// the `fontAssociations` array.
pub mod configuration;

/// Conversion of the markup produced by the rich-text editor into plain text, where paragraphs
/// are separated by blank lines and list items are prefixed by a bullet.
pub mod normalizer;

/// Greedy word wrapping of plain text, given any `TextMeasure` able to tell the width of a line.
pub mod layout;

/// The vertical cursor deciding when a new page has to be started.
pub mod paginator;

/// The metrics and the encoding of the standard Helvetica fonts.
pub mod standard_fonts;

/// The module where the `PdfDocument` interface for working with PDF documents is presented.
///
/// # Introduction
///
/// A `PdfDocument` is built by adding fonts, either standard or embedded from a TTF file, and
/// pages, onto which text, lines and filled rectangles are drawn. Positions are given in
/// millimeters from the bottom-left corner of the page. Once all the content has been placed, the
/// `write_all` method writes the pages and fonts into the underlying `lopdf::Document`, together
/// with the document information dictionary and the trailer identifier, and `save_to_bytes`
/// serializes the document.
///
/// The identifiers of the document are supplied by the caller rather than randomly generated, so
/// that the same input always results in the same bytes.
pub mod pdf;

/// The renderer which lays out a proposal onto the pages of a `PdfDocument`.
pub mod pdf_renderer;

/// The renderers producing word-processing documents from a proposal.
pub mod docx;

pub use configuration::{DocxBackend, ExportConfiguration};
pub use error::{ContextError, ExportError};
pub use export::{export_proposal, ExportFormat, ExportRecord, ExportResult, Exporter};
pub use proposal::{ProposalExportRequest, Rgb, Section};
