//! URL codecs
//! Reversible mapping between an absolute target URL and a token that can be
//! embedded in a path segment or a query value.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded token is not valid UTF-8")]
    Utf8,

    #[error("decoded token contains invalid code point {0:#x}")]
    CodePoint(u32),
}

/// A URL <-> token transform. `decode(encode(u)) == u` must hold for every
/// absolute URL, and `encode` output must not contain `/`, `?`, `#`, `&`,
/// `=` or `+`.
pub trait UrlCodec: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn encode(&self, url: &str) -> String;
    fn decode(&self, token: &str) -> Result<String, DecodeError>;
}

/// Codecs selectable by name from configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Base64,
    Plain,
    Xor,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn UrlCodec> {
        match self {
            Self::Base64 => Arc::new(Base64Codec),
            Self::Plain => Arc::new(PlainCodec),
            Self::Xor => Arc::new(XorCodec),
        }
    }
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "plain" => Ok(Self::Plain),
            "xor" => Ok(Self::Xor),
            other => Err(format!("unknown codec '{}' (expected base64, plain or xor)", other)),
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Base64 => "base64",
            Self::Plain => "plain",
            Self::Xor => "xor",
        };
        f.write_str(name)
    }
}

/// base64url over the percent-encoded URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl UrlCodec for Base64Codec {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn encode(&self, url: &str) -> String {
        URL_SAFE_NO_PAD.encode(urlencoding::encode(url).as_bytes())
    }

    fn decode(&self, token: &str) -> Result<String, DecodeError> {
        let escaped = base64_to_string(token)?;
        percent_decode(&escaped).map(Cow::into_owned)
    }
}

/// Percent-encoding only. Readable, but long.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl UrlCodec for PlainCodec {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn encode(&self, url: &str) -> String {
        urlencoding::encode(url).into_owned()
    }

    fn decode(&self, token: &str) -> Result<String, DecodeError> {
        percent_decode(token).map(Cow::into_owned)
    }
}

/// Flips bit 1 of every odd-indexed character, then percent-encodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorCodec;

impl XorCodec {
    fn xor(input: &str) -> Result<String, DecodeError> {
        input
            .chars()
            .enumerate()
            .map(|(idx, c)| {
                if idx % 2 == 0 {
                    return Ok(c);
                }
                let flipped = c as u32 ^ 2;
                char::from_u32(flipped).ok_or(DecodeError::CodePoint(flipped))
            })
            .collect()
    }
}

impl UrlCodec for XorCodec {
    fn name(&self) -> &'static str {
        "xor"
    }

    fn encode(&self, url: &str) -> String {
        // Flipping bit 1 never moves a scalar value into the surrogate block.
        let mixed = Self::xor(url).unwrap_or_else(|_| url.to_string());
        urlencoding::encode(&mixed).into_owned()
    }

    fn decode(&self, token: &str) -> Result<String, DecodeError> {
        Self::xor(&percent_decode(token)?)
    }
}

/// Decode with `codec`, falling back once to a raw base64 -> UTF-8 decode.
/// The codec's own error is reported when both attempts fail.
pub fn decode_with_fallback(codec: &dyn UrlCodec, token: &str) -> Result<String, DecodeError> {
    match codec.decode(token) {
        Ok(url) => Ok(url),
        Err(primary) => match base64_to_string(token) {
            Ok(raw) => {
                tracing::debug!("{} decode failed ({}), raw base64 fallback used", codec.name(), primary);
                Ok(raw)
            }
            Err(_) => Err(primary),
        },
    }
}

/// Accepts base64url or standard alphabet, with or without padding. A `' '`
/// is read as `'+'`, which is what form decoding turns an unescaped `+` into.
fn base64_to_string(token: &str) -> Result<String, DecodeError> {
    let normalized: String = token
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' | ' ' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized.as_bytes())?;
    String::from_utf8(bytes).map_err(|_| DecodeError::Utf8)
}

fn percent_decode(input: &str) -> Result<Cow<'_, str>, DecodeError> {
    urlencoding::decode(input).map_err(|_| DecodeError::Utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &[&str] = &[
        "https://example.com/",
        "https://example.com/path/to/page.html",
        "http://localhost:8080/api?x=1&y=two",
        "https://example.com/search?q=hello+world&lang=en#results",
        "https://user:pw@example.com:8443/a/b;c?d=e#f",
        "https://例え.jp/パス?検索=テスト",
        "https://example.com/emoji/🦀?q=🚀#🎉",
        "https://example.com/already%20escaped?v=%2F%3F",
        "https://example.com/?empty=&&trailing=",
    ];

    fn assert_round_trip(codec: &dyn UrlCodec) {
        for url in CORPUS {
            let token = codec.encode(url);
            assert_eq!(codec.decode(&token).as_deref(), Ok(*url), "{} failed for {}", codec.name(), url);
        }
    }

    fn assert_delimiter_free(codec: &dyn UrlCodec) {
        for url in CORPUS {
            let token = codec.encode(url);
            assert!(
                !token.contains(['/', '?', '#', '&', '=', '+', ' ']),
                "{} produced unsafe token {} for {}",
                codec.name(),
                token,
                url
            );
        }
    }

    #[test]
    fn test_round_trip_all_codecs() {
        for kind in [CodecKind::Base64, CodecKind::Plain, CodecKind::Xor] {
            let codec = kind.build();
            assert_round_trip(codec.as_ref());
            assert_delimiter_free(codec.as_ref());
        }
    }

    #[test]
    fn test_base64_accepts_standard_alphabet_with_padding() {
        // btoa(encodeURIComponent("https://a.b/?x=>>>"))
        let escaped = urlencoding::encode("https://a.b/?x=>>>").into_owned();
        let standard = base64::engine::general_purpose::STANDARD.encode(escaped.as_bytes());
        assert_eq!(Base64Codec.decode(&standard).unwrap(), "https://a.b/?x=>>>");

        let mangled = standard.replace('+', " ");
        assert_eq!(Base64Codec.decode(&mangled).unwrap(), "https://a.b/?x=>>>");
    }

    #[test]
    fn test_malformed_tokens_are_errors() {
        assert!(matches!(Base64Codec.decode("@@not base64@@"), Err(DecodeError::Base64(_))));

        let invalid_utf8 = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
        assert_eq!(Base64Codec.decode(&invalid_utf8), Err(DecodeError::Utf8));
        assert_eq!(PlainCodec.decode("%ff%fe"), Err(DecodeError::Utf8));
    }

    #[test]
    fn test_fallback_uses_raw_base64() {
        // Raw base64 of an unescaped URL whose '%' escapes are not valid UTF-8
        // once percent-decoded.
        let raw = URL_SAFE_NO_PAD.encode("https://example.com/%ff");
        assert_eq!(Base64Codec.decode(&raw), Err(DecodeError::Utf8));
        assert_eq!(
            decode_with_fallback(&Base64Codec, &raw).unwrap(),
            "https://example.com/%ff"
        );
    }

    #[test]
    fn test_fallback_reports_primary_error() {
        let err = decode_with_fallback(&PlainCodec, "%ff").unwrap_err();
        assert_eq!(err, DecodeError::Utf8);
    }

    #[test]
    fn test_codec_kind_parsing() {
        assert_eq!("BASE64".parse::<CodecKind>(), Ok(CodecKind::Base64));
        assert_eq!(" xor ".parse::<CodecKind>(), Ok(CodecKind::Xor));
        assert!("rot13".parse::<CodecKind>().is_err());
        assert_eq!(CodecKind::Plain.to_string(), "plain");
    }
}
