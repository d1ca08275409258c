//! Typed body decoding for JSON, XML and form-urlencoded payloads.
//!
//! There is no per-format field mapping. A single `#[derive(Deserialize)]`
//! describes the shape, and each format's serde deserializer consumes it:
//!
//! ```rust
//! use sendi::BodyFormat;
//!
//! #[derive(serde::Deserialize)]
//! struct Register { username: String, password: String, name: String }
//!
//! let xml = b"<Register><username>adib</username><password>rahasia</password><name>Adib</name></Register>";
//! let json = br#"{"username":"adib","password":"rahasia","name":"Adib"}"#;
//!
//! let a: Register = sendi::decode::from_bytes(BodyFormat::Xml, xml).unwrap();
//! let b: Register = sendi::decode::from_bytes(BodyFormat::Json, json).unwrap();
//! assert_eq!(a.username, b.username);
//! ```

use std::fmt;

use serde::de::DeserializeOwned;

/// A request body encoding sendi can decode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BodyFormat {
    Json,
    Xml,
    Form,
}

impl BodyFormat {
    /// Picks the format for a `content-type` value.
    ///
    /// Parameters such as `charset` are ignored and the comparison is
    /// case-insensitive. Structured-syntax suffixes (`+json`, `+xml`) count.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Some(Self::Json),
            "application/xml" | "text/xml" => Some(Self::Xml),
            "application/x-www-form-urlencoded" => Some(Self::Form),
            s if s.starts_with("application/") && s.ends_with("+json") => Some(Self::Json),
            s if s.starts_with("application/") && s.ends_with("+xml") => Some(Self::Xml),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml  => "application/xml",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

impl fmt::Display for BodyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a body could not be turned into the requested shape.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML body: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("invalid form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("missing content-type header")]
    MissingContentType,

    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),
}

impl DecodeError {
    /// True when the payload was never parsed because its media type is
    /// unknown or absent.
    pub fn is_unsupported_media(&self) -> bool {
        matches!(self, Self::MissingContentType | Self::UnsupportedContentType(_))
    }
}

/// Decodes `body` as `format` into `T`.
pub fn from_bytes<T: DeserializeOwned>(format: BodyFormat, body: &[u8]) -> Result<T, DecodeError> {
    match format {
        BodyFormat::Json => Ok(serde_json::from_slice(body)?),
        BodyFormat::Xml => Ok(quick_xml::de::from_reader(body)?),
        BodyFormat::Form => Ok(serde_urlencoded::from_bytes(body)?),
    }
}

/// Decodes `body` using the format named by `content_type`.
pub fn from_content_type<T: DeserializeOwned>(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<T, DecodeError> {
    let content_type = content_type.ok_or(DecodeError::MissingContentType)?;
    let format = BodyFormat::from_content_type(content_type)
        .ok_or_else(|| DecodeError::UnsupportedContentType(content_type.to_owned()))?;
    from_bytes(format, body)
}
