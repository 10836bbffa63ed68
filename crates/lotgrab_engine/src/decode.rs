use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use crate::FetchOutput;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed {encoding} text in {url}")]
    Malformed { encoding: String, url: String },
}

/// Decode an HTML page to UTF-8: BOM, then Content-Type charset, then chardetng's guess.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> Option<(String, &'static Encoding)> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| content_type.and_then(charset_label).and_then(|l| Encoding::for_label(l.as_bytes())))
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some((text.into_owned(), encoding))
    }
}

impl FetchOutput {
    /// Body as text, decoded per [`decode_html`].
    pub fn text(&self) -> Result<String, DecodeError> {
        decode_html(&self.bytes, self.metadata.content_type.as_deref())
            .map(|(text, _)| text)
            .ok_or_else(|| DecodeError::Malformed {
                encoding: self
                    .metadata
                    .content_type
                    .as_deref()
                    .and_then(charset_label)
                    .unwrap_or("detected")
                    .to_string(),
                url: self.metadata.final_url.clone(),
            })
    }
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}
