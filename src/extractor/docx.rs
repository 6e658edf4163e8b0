//! DOCX 텍스트 추출 모듈
//!
//! `word/document.xml`의 문단(`w:p`)마다 `w:t` 텍스트를 모아 줄바꿈으로 연결합니다.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ExtractError;

const DOCUMENT_XML: &str = "word/document.xml";

/// DOCX 파일에서 텍스트 추출
pub fn extract_text_from_docx(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let docx_err = |message: String| ExtractError::Docx {
        path: path.to_path_buf(),
        message,
    };

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| docx_err(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| docx_err(format!("{}: {}", DOCUMENT_XML, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| docx_err(e.to_string()))?;

    paragraphs_from_xml(&xml).map_err(docx_err)
}

/// document.xml 본문에서 문단 텍스트 추출
///
/// 텍스트 상자(`w:txbxContent`) 안의 문단은 바깥 문단 안에 중첩됩니다.
/// 중첩 문단은 닫히는 순서대로 별도 줄이 되고, 바깥 문단의 텍스트는 유지됩니다.
fn paragraphs_from_xml(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs: Vec<String> = Vec::new();
    // 열려 있는 문단 (가장 안쪽이 마지막)
    let mut open: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => open.push(String::new()),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match (e.name().as_ref(), open.last_mut()) {
                (b"w:p", None) => paragraphs.push(String::new()),
                (b"w:tab", Some(current)) => current.push('\t'),
                (b"w:br" | b"w:cr", Some(current)) => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(current) = open.last_mut() {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    current.push_str(&text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    if let Some(done) = open.pop() {
                        paragraphs.push(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
    <w:p/>
    <w:p><w:r><w:t>Fish &amp; chips</w:t><w:tab/><w:t>2</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    fn write_docx(path: &Path, xml: &str) {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_XML, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_paragraphs_joined_with_newlines() {
        let text = paragraphs_from_xml(SAMPLE).unwrap();
        assert_eq!(text, "Hello world\n\nFish & chips\t2");
    }

    #[test]
    fn test_text_box_keeps_outer_paragraph() {
        let xml = r#"<w:document><w:body>
<w:p><w:r><w:t>Before</w:t></w:r><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p><w:p/></w:txbxContent></w:pict></w:r><w:r><w:t> after</w:t></w:r></w:p>
</w:body></w:document>"#;
        let text = paragraphs_from_xml(xml).unwrap();
        assert_eq!(text, "Boxed\nBefore after");
    }

    #[test]
    fn test_extract_from_docx_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.docx");
        write_docx(&path, SAMPLE);

        let text = extract_text_from_docx(&path).unwrap();
        assert!(text.starts_with("Hello world"));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, b"plain text pretending").unwrap();

        assert!(matches!(
            extract_text_from_docx(&path),
            Err(ExtractError::Docx { .. })
        ));
    }
}
