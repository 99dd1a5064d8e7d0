use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// A fully resolved proposal, as it is handed over to the exporter by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalExportRequest {
    pub title: String,
    /// A free-form category label, such as `PROJECT`.
    #[serde(rename = "type", default)]
    pub proposal_type: String,
    /// The sections in the order they have to appear in the document.
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub primary_color: Option<Rgb>,
}

/// One titled block of a proposal, whose content is the HTML produced by the rich-text editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub order: i64,
}

impl ProposalExportRequest {
    /// Reads and parses a JSON export request.
    pub fn from_path(request_path: &Path) -> Result<Self, ContextError> {
        let request_content = std::fs::read_to_string(request_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to read the export request {:?}", request_path),
                &error,
            )
        })?;
        let request: ProposalExportRequest =
            serde_json::from_str(&request_content).map_err(|error| {
                ContextError::with_error(
                    format!("Unable to parse the export request {:?}", request_path),
                    &error,
                )
            })?;

        Ok(request)
    }

    /// The branding accent, falling back to the default indigo.
    pub fn accent_color(&self) -> Rgb {
        self.primary_color.unwrap_or(Rgb::DEFAULT_ACCENT)
    }

    /// The line shown below the title, such as `PROJECT PROPOSAL`.
    pub fn subtitle(&self) -> String {
        format!("{} Proposal", self.proposal_type.trim())
            .trim()
            .to_uppercase()
    }

    /// The company name, unless it is missing or blank.
    pub fn company_name(&self) -> Option<&str> {
        self.company_name
            .as_deref()
            .map(str::trim)
            .filter(|company_name| !company_name.is_empty())
    }
}

/// An RGB color, written as `#RRGGBB` in the JSON documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// The indigo used for the accents when no branding color is configured.
    pub const DEFAULT_ACCENT: Rgb = Rgb::new(79, 70, 229);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Rgb { red, green, blue }
    }

    /// The color with its components scaled from 0 to 1, as the PDF color operators expect.
    pub fn to_unit_components(self) -> [f32; 3] {
        [self.red, self.green, self.blue].map(|component| f32::from(component) / 255.0)
    }

    /// The color as six uppercase hexadecimal digits without the leading `#`.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

impl FromStr for Rgb {
    type Err = ContextError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let digits = string.trim().trim_start_matches('#');
        let invalid_color =
            || ContextError::with_context(format!("Invalid color {:?}, expected #RRGGBB", string));

        let digits: String = match digits.len() {
            6 => digits.to_string(),
            // The short form `#RGB` doubles every digit
            3 => digits.chars().flat_map(|digit| [digit, digit]).collect(),
            _ => return Err(invalid_color()),
        };
        if !digits.is_ascii() {
            return Err(invalid_color());
        }
        let component = |index: usize| {
            u8::from_str_radix(&digits[index..index + 2], 16).map_err(|_| invalid_color())
        };

        Ok(Rgb::new(component(0)?, component(2)?, component(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = ContextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        format!("#{}", value.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_json() {
        let request: ProposalExportRequest = serde_json::from_str(
            r##"{
                "title": "Sample Web Development Proposal",
                "type": "PROJECT",
                "sections": [
                    { "title": "Introduction", "content": "<p>Hi</p>", "order": 0 },
                    { "title": "Scope", "content": "", "order": 1 }
                ],
                "companyName": "Acme",
                "primaryColor": "#10B981"
            }"##,
        )
        .unwrap();

        assert_eq!(request.proposal_type, "PROJECT");
        assert_eq!(request.sections.len(), 2);
        assert_eq!(request.sections[1].title, "Scope");
        assert_eq!(request.company_name(), Some("Acme"));
        assert_eq!(request.accent_color(), Rgb::new(0x10, 0xB9, 0x81));
    }

    #[test]
    fn test_optional_branding_defaults() {
        let request: ProposalExportRequest =
            serde_json::from_str(r#"{ "title": "Plan", "type": "Business", "companyName": "  " }"#)
                .unwrap();

        assert!(request.sections.is_empty());
        assert_eq!(request.company_name(), None);
        assert_eq!(request.accent_color(), Rgb::DEFAULT_ACCENT);
        assert_eq!(request.subtitle(), "BUSINESS PROPOSAL");
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!("#4F46E5".parse::<Rgb>().unwrap(), Rgb::DEFAULT_ACCENT);
        assert_eq!("4f46e5".parse::<Rgb>().unwrap(), Rgb::DEFAULT_ACCENT);
        assert_eq!("#fff".parse::<Rgb>().unwrap(), Rgb::new(255, 255, 255));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#GGGGGG".parse::<Rgb>().is_err());
        assert!("#ééé".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_invalid_color_in_json_is_rejected() {
        let result = serde_json::from_str::<ProposalExportRequest>(
            r#"{ "title": "Plan", "type": "Business", "primaryColor": "blue" }"#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_color_conversions() {
        assert_eq!(Rgb::new(255, 0, 51).to_unit_components(), [1.0, 0.0, 0.2]);
        assert_eq!(String::from(Rgb::DEFAULT_ACCENT), "#4F46E5");
    }
}
