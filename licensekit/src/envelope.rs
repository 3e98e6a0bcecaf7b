//! Textual transport envelope for signed licenses.
//!
//! ```text
//! -----BEGIN <PRODUCT> LICENSE KEY-----
//! <base64(canonical record)>
//! +
//! <base64(signature)>
//! -----END <PRODUCT> LICENSE KEY-----
//! ```
//!
//! The envelope carries no integrity of its own; the markers and the `+`
//! delimiter line are structural only.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::fmt;
use std::str::FromStr;

use crate::error::{LicenseError, LicenseResult};

/// Product name used when none is configured.
pub const DEFAULT_PRODUCT: &str = "LICENSEKIT";

/// Line separating the record segment from the signature segment.
pub const SEGMENT_DELIMITER: &str = "+";

const HEADER_PREFIX: &str = "-----BEGIN ";
const FOOTER_PREFIX: &str = "-----END ";
const MARKER_SUFFIX: &str = " LICENSE KEY-----";

/// A signed license in transport form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseEnvelope {
    product: String,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

impl LicenseEnvelope {
    /// Wraps a payload and its signature.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::EnvelopeFormat`] if the product name is not
    /// made of `A-Z`, `0-9`, space, `_` or `-`.
    pub fn new(
        product: impl Into<String>,
        payload: Vec<u8>,
        signature: Vec<u8>,
    ) -> LicenseResult<Self> {
        let product = product.into();
        check_product(&product)?;
        Ok(Self {
            product,
            payload,
            signature,
        })
    }

    /// Returns the product named in the markers.
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Returns the signed record bytes (segment 1).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the signature bytes (segment 2).
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Header line for a product, without the trailing newline.
    #[must_use]
    pub fn header(product: &str) -> String {
        format!("{HEADER_PREFIX}{product}{MARKER_SUFFIX}")
    }

    /// Footer line for a product, without the trailing newline.
    #[must_use]
    pub fn footer(product: &str) -> String {
        format!("{FOOTER_PREFIX}{product}{MARKER_SUFFIX}")
    }

    /// Renders the envelope, every line newline-terminated.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}\n{}\n{SEGMENT_DELIMITER}\n{}\n{}\n",
            Self::header(&self.product),
            BASE64.encode(&self.payload),
            BASE64.encode(&self.signature),
            Self::footer(&self.product),
        )
    }

    /// Parses envelope text.
    ///
    /// Surrounding whitespace, CRLF line endings and segments wrapped over
    /// several lines are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::EnvelopeFormat`] if a marker or the delimiter
    /// is missing, the markers disagree, or a segment is not valid base64.
    pub fn parse(text: &str) -> LicenseResult<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let (first, rest) = lines
            .split_first()
            .ok_or_else(|| format_error("license text is empty"))?;
        let product = first
            .strip_prefix(HEADER_PREFIX)
            .and_then(|l| l.strip_suffix(MARKER_SUFFIX))
            .ok_or_else(|| format_error("missing license header"))?;
        check_product(product)?;

        let (last, body) = rest
            .split_last()
            .ok_or_else(|| format_error("missing license footer"))?;
        if *last != Self::footer(product) {
            return Err(format_error("missing or mismatched license footer"));
        }

        let mut segments = body.split(|line| *line == SEGMENT_DELIMITER);
        let (Some(record), Some(signature), None) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(format_error("expected exactly one `+` delimiter line"));
        };

        Ok(Self {
            product: product.to_string(),
            payload: decode_segment(record, "record")?,
            signature: decode_segment(signature, "signature")?,
        })
    }
}

impl fmt::Display for LicenseEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for LicenseEnvelope {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn format_error(msg: &str) -> LicenseError {
    LicenseError::EnvelopeFormat(msg.to_string())
}

pub(crate) fn check_product(product: &str) -> LicenseResult<()> {
    let valid = !product.is_empty()
        && product
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || matches!(b, b' ' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(format_error("product name must match [A-Z0-9 _-]+"))
    }
}

fn decode_segment(lines: &[&str], name: &str) -> LicenseResult<Vec<u8>> {
    if lines.is_empty() {
        return Err(LicenseError::EnvelopeFormat(format!("{name} segment is empty")));
    }
    BASE64
        .decode(lines.concat())
        .map_err(|_| LicenseError::EnvelopeFormat(format!("{name} segment is not valid base64")))
}
