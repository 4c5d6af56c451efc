use serde::{Deserialize, Deserializer, de::Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNumber {
    Str(String),
    Number(u64),
}

/// Deserializes a zero-padded string such as `"0000320193"` (or a bare number) into a u64.
pub fn deserialize_str_to_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match StrOrNumber::deserialize(deserializer)? {
        StrOrNumber::Str(s) => s.trim().parse::<u64>().map_err(Error::custom),
        StrOrNumber::Number(n) => Ok(n),
    }
}

/// Deserializes an SEC code that may be a string, a number, empty, or null.
///
/// EDGAR reports a missing SIC as `""`; that and `0` become `None`.
pub fn deserialize_optional_code<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let code = match Option::<StrOrNumber>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(StrOrNumber::Str(s)) if s.trim().is_empty() => return Ok(None),
        Some(StrOrNumber::Str(s)) => s.trim().parse::<u32>().map_err(Error::custom)?,
        Some(StrOrNumber::Number(n)) => u32::try_from(n).map_err(Error::custom)?,
    };
    Ok((code > 0).then_some(code))
}

/// Deserializes an optional string, mapping blank values to `None`.
pub fn deserialize_non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
