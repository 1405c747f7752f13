//! Dynamic values
//!
//! Placeholders whose name starts with `$` generate a fresh value on every
//! expansion:
//! - `{{$guid}}`, `{{$randomUUID}}` - random UUID v4
//! - `{{$timestamp}}` - Unix timestamp (seconds)
//! - `{{$isoTimestamp}}` - current ISO 8601 timestamp
//! - `{{$randomInt}}` - random integer in `0..=1000`
//! - `{{$randomHexadecimal}}` - one random hex digit
//! - `{{$randomAlphaNumeric}}` - one random alphanumeric character
//! - `{{$randomBoolean}}` - `true` or `false`
//! - `{{$randomFirstName}}`, `{{$randomLastName}}`, `{{$randomEmail}}`,
//!   `{{$randomLoremWord}}`

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use uuid::Uuid;

/// Prefix marking a dynamic value name
pub const DYNAMIC_PREFIX: char = '$';

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Charlie", "Diana", "Edward", "Fiona", "George", "Hannah", "Ivan", "Julia",
    "Kevin", "Laura", "Michael", "Nina", "Oscar", "Paula",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Martinez",
    "Lopez", "Wilson", "Anderson", "Taylor", "Thomas", "Moore",
];

const LOREM_WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "labore", "magna", "aliqua",
];

/// Generate the value for a dynamic placeholder name (without the `$`).
/// Unknown names yield `None` and the placeholder stays untouched.
pub fn generate(name: &str) -> Option<String> {
    let mut rng = rand::rng();

    let value = match name {
        "guid" | "randomUUID" => Uuid::new_v4().to_string(),
        "timestamp" => Utc::now().timestamp().to_string(),
        "isoTimestamp" => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "randomInt" => rng.random_range(0..=1000).to_string(),
        "randomHexadecimal" => format!("{:x}", rng.random_range(0..16u8)),
        "randomAlphaNumeric" => {
            char::from(rng.sample(rand::distr::Alphanumeric)).to_string()
        }
        "randomBoolean" => rng.random_bool(0.5).to_string(),
        "randomFirstName" => pick(&mut rng, FIRST_NAMES).to_string(),
        "randomLastName" => pick(&mut rng, LAST_NAMES).to_string(),
        "randomEmail" => format!(
            "{}.{}@example.com",
            pick(&mut rng, FIRST_NAMES).to_lowercase(),
            pick(&mut rng, LAST_NAMES).to_lowercase()
        ),
        "randomLoremWord" => pick(&mut rng, LOREM_WORDS).to_string(),
        _ => return None,
    };

    Some(value)
}

fn pick<'a>(rng: &mut impl Rng, words: &[&'a str]) -> &'a str {
    words[rng.random_range(0..words.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_is_uuid() {
        let value = generate("guid").unwrap();
        assert!(Uuid::parse_str(&value).is_ok());
        assert_ne!(value, generate("randomUUID").unwrap());
    }

    #[test]
    fn test_timestamps() {
        let ts: i64 = generate("timestamp").unwrap().parse().unwrap();
        assert!(ts > 1_600_000_000);
        let iso = generate("isoTimestamp").unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&iso).is_ok());
    }

    #[test]
    fn test_random_shapes() {
        let n: u32 = generate("randomInt").unwrap().parse().unwrap();
        assert!(n <= 1000);

        let hex = generate("randomHexadecimal").unwrap();
        assert_eq!(hex.len(), 1);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));

        let alnum = generate("randomAlphaNumeric").unwrap();
        assert!(alnum.chars().all(|c| c.is_ascii_alphanumeric()));

        let b = generate("randomBoolean").unwrap();
        assert!(b == "true" || b == "false");

        assert!(generate("randomEmail").unwrap().ends_with("@example.com"));
    }

    #[test]
    fn test_unknown_name() {
        assert!(generate("definitelyNotAThing").is_none());
    }
}
