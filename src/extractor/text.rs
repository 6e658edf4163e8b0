//! 텍스트 파일 디코딩
//!
//! 우선순위: UTF-8 → Latin-1 → Windows-1252 → 손실 UTF-8
//!
//! Latin-1 단계는 C1 제어 문자(0x80–0x9F)가 있으면 실패로 봅니다.
//! 그런 바이트는 대부분 Windows-1252의 따옴표/대시이기 때문입니다.

/// 디코딩에 사용된 인코딩
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
    /// 모든 단계 실패, 대체 문자(U+FFFD)로 치환
    Lossy,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Windows1252 => "cp1252",
            TextEncoding::Lossy => "utf-8 (lossy)",
        }
    }
}

/// 바이트를 문자열로 디코딩 (실패하지 않음)
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), TextEncoding::Utf8);
    }
    if let Some(text) = decode_latin1(bytes) {
        return (text, TextEncoding::Latin1);
    }
    if let Some(text) = decode_windows1252(bytes) {
        return (text, TextEncoding::Windows1252);
    }
    (
        String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Lossy,
    )
}

/// C1 제어 구간. Latin-1 단계는 이 바이트가 있으면 실패로 봅니다.
const C1_RANGE: std::ops::RangeInclusive<u8> = 0x80..=0x9F;

/// Windows-1252에서 정의되지 않은 바이트
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// C1 구간이 없으면 Latin-1과 Windows-1252의 매핑이 같습니다.
fn decode_latin1(bytes: &[u8]) -> Option<String> {
    if bytes.iter().any(|b| C1_RANGE.contains(b)) {
        return None;
    }
    Some(single_byte(bytes))
}

fn decode_windows1252(bytes: &[u8]) -> Option<String> {
    if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
        return None;
    }
    Some(single_byte(bytes))
}

fn single_byte(bytes: &[u8]) -> String {
    encoding_rs::WINDOWS_1252
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}
