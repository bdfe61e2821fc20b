use std::fmt;

use crate::error::{RegistryError, RegistryResult};

/// A validated content digest in `algorithm:hex` form.
///
/// Digests are the dedup key for snapshots: every reference resolving to the
/// same digest shares one snapshot entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest(String);

impl Digest {
    /// Parse and validate an `algorithm:hex` digest string.
    ///
    /// The algorithm must be lowercase alphanumeric; the encoded part must be
    /// hexadecimal and at least 32 characters.
    pub fn parse(input: &str) -> RegistryResult<Self> {
        let (algorithm, encoded) = input.split_once(':').ok_or_else(|| {
            RegistryError::InvalidDigest {
                digest: input.to_string(),
                reason: "missing algorithm separator".to_string(),
            }
        })?;
        if algorithm.is_empty()
            || !algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(RegistryError::InvalidDigest {
                digest: input.to_string(),
                reason: "malformed algorithm".to_string(),
            });
        }
        if encoded.len() < 32 || !encoded.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::InvalidDigest {
                digest: input.to_string(),
                reason: "malformed hex encoding".to_string(),
            });
        }
        Ok(Self(input.to_string()))
    }

    /// The algorithm part (`sha256` in `sha256:abc…`).
    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map(|(a, _)| a).unwrap_or(&self.0)
    }

    /// The hex-encoded part after the separator.
    pub fn encoded(&self) -> &str {
        self.0.split_once(':').map(|(_, e)| e).unwrap_or("")
    }

    /// The full `algorithm:hex` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed image reference: `locator[:tag][@digest]`.
///
/// The locator may carry a registry port (`registry.example:5000/os/base`);
/// a `:` only separates a tag when no `/` follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    locator: String,
    tag: Option<String>,
    digest: Option<Digest>,
}

impl ImageRef {
    /// Parse and validate a reference string.
    pub fn parse(input: &str) -> RegistryResult<Self> {
        let invalid = |reason: &str| RegistryError::InvalidReference {
            reference: input.to_string(),
            reason: reason.to_string(),
        };

        let (rest, digest) = match input.split_once('@') {
            Some((rest, digest)) => (rest, Some(Digest::parse(digest)?)),
            None => (input, None),
        };

        let (locator, tag) = match rest.rfind(':') {
            Some(idx) if !rest[idx + 1..].contains('/') => {
                let tag = &rest[idx + 1..];
                if tag.is_empty() {
                    return Err(invalid("empty tag"));
                }
                if !tag
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
                {
                    return Err(invalid("malformed tag"));
                }
                (&rest[..idx], Some(tag.to_string()))
            }
            _ => (rest, None),
        };

        if locator.is_empty() {
            return Err(invalid("empty locator"));
        }
        if locator.chars().any(|c| c.is_ascii_whitespace()) {
            return Err(invalid("whitespace in locator"));
        }

        Ok(Self {
            locator: locator.to_string(),
            tag,
            digest,
        })
    }

    /// Everything before the tag and digest.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    /// The canonical `locator@digest` form under the resolved digest,
    /// dropping any tag.
    pub fn canonical(&self, digest: &Digest) -> String {
        format!("{}@{}", self.locator, digest)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.locator)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}
