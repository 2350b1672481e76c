// src/instruction/loader.rs

//! Reading, writing and converting instruction-set files.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::instruction::element::Element;
use crate::instruction::json::{element_to_json, json_to_element};
use crate::instruction::model::InstructionSet;
use crate::instruction::xml::{parse_xml, write_xml};

/// Serialization of an instruction-set file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xml,
    Json,
}

impl SourceFormat {
    /// `.json` (any case) is JSON; everything else is treated as XML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SourceFormat::Json,
            _ => SourceFormat::Xml,
        }
    }
}

pub fn parse_document(src: &str, format: SourceFormat) -> Result<Element> {
    match format {
        SourceFormat::Xml => parse_xml(src),
        SourceFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(src)?;
            json_to_element(&value)
        }
    }
}

pub fn render_document(root: &Element, format: SourceFormat) -> Result<String> {
    match format {
        SourceFormat::Xml => write_xml(root),
        SourceFormat::Json => Ok(serde_json::to_string_pretty(&element_to_json(root))?),
    }
}

pub fn read_document(fs: &dyn FileSystem, path: &Path) -> Result<Element> {
    let format = SourceFormat::from_path(path);
    debug!(path = %path.display(), ?format, "reading instruction set");
    let src = fs.read_to_string(path)?;
    parse_document(&src, format)
}

pub fn write_document(fs: &dyn FileSystem, path: &Path, root: &Element) -> Result<()> {
    let rendered = render_document(root, SourceFormat::from_path(path))?;
    fs.write(path, rendered.as_bytes())?;
    Ok(())
}

pub fn load_instruction_set(fs: &dyn FileSystem, path: &Path) -> Result<InstructionSet> {
    let root = read_document(fs, path)?;
    Ok(InstructionSet::new(path, root))
}

/// Convert `input` to the serialization implied by the extension of `output`.
pub fn convert(fs: &dyn FileSystem, input: &Path, output: &Path) -> Result<()> {
    let root = read_document(fs, input)?;
    write_document(fs, output, &root)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        "instruction set converted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn format_is_detected_by_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a.JSON")), SourceFormat::Json);
        assert_eq!(SourceFormat::from_path(Path::new("a.xml")), SourceFormat::Xml);
        assert_eq!(SourceFormat::from_path(Path::new("noext")), SourceFormat::Xml);
    }

    #[test]
    fn converts_xml_to_json_and_back() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "in.xml",
            "<equinoxInput><addSpectrum><id>s1</id><specPath>/a.spec</specPath></addSpectrum></equinoxInput>",
        );

        convert(&fs, Path::new("in.xml"), Path::new("out.json")).unwrap();
        let json = fs.read_to_string(Path::new("out.json")).unwrap();
        assert!(json.contains("\"addSpectrum\""));

        convert(&fs, Path::new("out.json"), Path::new("back.xml")).unwrap();
        let back = read_document(&fs, Path::new("back.xml")).unwrap();
        let original = read_document(&fs, Path::new("in.xml")).unwrap();
        assert_eq!(back, original.canonical());
    }

    #[test]
    fn missing_file_is_an_error() {
        let fs = MockFileSystem::new();
        assert!(load_instruction_set(&fs, Path::new("nope.xml")).is_err());
    }
}
