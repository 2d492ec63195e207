use crate::{
    Result,
    constants::{MAX_COMPARTMENT, MAX_TAG_LENGTH, MIN_COMPARTMENT, MIN_TAG_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Compartment index (1-4), one per drawer and RFID reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CompartmentId(u8);

impl CompartmentId {
    /// Create a new compartment ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCompartment` if the index is outside 1-4.
    pub fn new(index: u8) -> Result<Self> {
        if !(MIN_COMPARTMENT..=MAX_COMPARTMENT).contains(&index) {
            return Err(Error::InvalidCompartment {
                index,
                min: MIN_COMPARTMENT,
                max: MAX_COMPARTMENT,
            });
        }
        Ok(CompartmentId(index))
    }

    /// Get the raw index as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Zero-based position, for indexing per-compartment arrays.
    #[must_use]
    pub fn slot(&self) -> usize {
        usize::from(self.0 - MIN_COMPARTMENT)
    }

    /// All valid compartment IDs in ascending order.
    pub fn all() -> impl Iterator<Item = CompartmentId> {
        (MIN_COMPARTMENT..=MAX_COMPARTMENT).map(CompartmentId)
    }
}

impl fmt::Display for CompartmentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for CompartmentId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        CompartmentId::new(value)
    }
}

impl From<CompartmentId> for u8 {
    fn from(id: CompartmentId) -> Self {
        id.0
    }
}

impl std::str::FromStr for CompartmentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let index: u8 = s.trim().parse().map_err(|_| Error::InvalidCompartment {
            index: 0,
            min: MIN_COMPARTMENT,
            max: MAX_COMPARTMENT,
        })?;
        CompartmentId::new(index)
    }
}

/// RFID tag identifier (1-32 ASCII alphanumeric characters).
///
/// # Security
/// This type implements constant-time comparison so that allow-list lookups
/// do not leak how many leading characters of a forged tag matched.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagId(String);

impl TagId {
    /// Create a new tag ID with validation.
    ///
    /// The identifier is normalized (trimmed and converted to uppercase) before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidTagFormat` if:
    /// - The length is not between 1-32 characters
    /// - The identifier contains anything other than ASCII letters and digits
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim().to_uppercase();

        let len = id.len();
        if !(MIN_TAG_LENGTH..=MAX_TAG_LENGTH).contains(&len) {
            return Err(Error::InvalidTagFormat(format!(
                "Tag ID must be {MIN_TAG_LENGTH}-{MAX_TAG_LENGTH} chars, got {len}"
            )));
        }

        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidTagFormat(format!(
                "Tag ID must be ASCII alphanumeric: {id}"
            )));
        }

        Ok(TagId(id))
    }

    /// Get the tag ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TagId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagId::new(s)
    }
}

impl TryFrom<String> for TagId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TagId::new(&value)
    }
}

impl From<TagId> for String {
    fn from(tag: TagId) -> Self {
        tag.0
    }
}

/// Constant-time comparison implementation for TagId
impl PartialEq for TagId {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for TagId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Result of looking a tag up in the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Authorized,
    Unauthorized,
}

impl Classification {
    /// Returns `true` if the tag is on the allow-list.
    #[inline]
    #[must_use]
    pub fn is_authorized(self) -> bool {
        matches!(self, Classification::Authorized)
    }

    /// Text shown on the display for this classification.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Authorized => "AUTHORIZED",
            Classification::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical medicine slot and its last known strip count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compartment {
    pub id: CompartmentId,
    pub medicine: String,
    /// `None` until configured or first observed.
    pub last_count: Option<u32>,
}

impl Compartment {
    pub fn new(id: CompartmentId, medicine: impl Into<String>, last_count: Option<u32>) -> Self {
        Self {
            id,
            medicine: medicine.into(),
            last_count,
        }
    }

    /// Accept a freshly estimated count.
    ///
    /// Stock only goes down between restocks, so an apparent increase is
    /// treated as a false reading and the prior count is kept.
    ///
    /// Returns `true` if the stored count changed.
    pub fn accept_count(&mut self, new_count: u32) -> bool {
        match self.last_count {
            Some(previous) if new_count >= previous => false,
            _ => {
                self.last_count = Some(new_count);
                true
            }
        }
    }
}
