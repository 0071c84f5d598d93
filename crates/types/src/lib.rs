/// Errors that can occur when creating validated identifier types.
#[derive(Debug, thiserror::Error)]
pub enum NhsNumberError {
    /// The input did not contain exactly ten digits after stripping separators
    #[error("NHS number must contain exactly 10 digits, found {0}")]
    WrongLength(usize),
    /// The input contained a character that is neither a digit nor a separator
    #[error("NHS number may only contain digits, spaces and dashes")]
    InvalidCharacter,
}

/// A validated NHS number.
///
/// This type wraps a `String` and guarantees it holds exactly ten ASCII digits.
/// Spaces and dashes embedded in the input are stripped during construction, so
/// `900 000 0009` and `900-000-0009` both parse to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NhsNumber(String);

impl NhsNumber {
    /// Parses an NHS number from user input.
    ///
    /// Spaces and dashes are stripped before validation. The remaining
    /// characters must be exactly ten ASCII digits.
    ///
    /// # Errors
    ///
    /// Returns `NhsNumberError::InvalidCharacter` if any non-separator,
    /// non-digit character is present, or `NhsNumberError::WrongLength` if the
    /// stripped input is not ten digits long.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, NhsNumberError> {
        let stripped: String = input
            .as_ref()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();

        if stripped.chars().any(|c| !c.is_ascii_digit()) {
            return Err(NhsNumberError::InvalidCharacter);
        }

        if stripped.len() != 10 {
            return Err(NhsNumberError::WrongLength(stripped.len()));
        }

        Ok(Self(stripped))
    }

    /// Returns the bare ten-digit form, as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the national display grouping, e.g. `900 000 0009`.
    pub fn display_grouped(&self) -> String {
        format!("{} {} {}", &self.0[0..3], &self.0[3..6], &self.0[6..10])
    }
}

impl std::fmt::Display for NhsNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_grouped())
    }
}

impl serde::Serialize for NhsNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NhsNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NhsNumber::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Staff role carried by the session for its whole lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// GP practice administrative staff
    GpAdmin,
    /// GP practice clinical staff
    GpClinical,
    /// National records-holding staff (Primary Care Support England)
    Pcse,
}

impl Role {
    /// Parse from the wire format string used by the auth endpoints.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "GP_ADMIN" => Some(Role::GpAdmin),
            "GP_CLINICAL" => Some(Role::GpClinical),
            "PCSE" => Some(Role::Pcse),
            _ => None,
        }
    }

    /// Convert to the wire format string.
    pub fn to_wire(self) -> &'static str {
        match self {
            Role::GpAdmin => "GP_ADMIN",
            Role::GpClinical => "GP_CLINICAL",
            Role::Pcse => "PCSE",
        }
    }
}

/// Category of stored document a request operates on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum DocType {
    /// Lloyd George scanned paper record
    #[serde(rename = "LG")]
    Lg,
    /// Electronic (ARF) documents
    #[serde(rename = "ARF")]
    Arf,
    /// Both categories at once, used by the delete-everything flow
    #[serde(rename = "LG,ARF")]
    LgAndArf,
}

impl DocType {
    /// The query-string value sent to the records API.
    pub fn to_wire(self) -> &'static str {
        match self {
            DocType::Lg => "LG",
            DocType::Arf => "ARF",
            DocType::LgAndArf => "LG,ARF",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}
