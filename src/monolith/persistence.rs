//! Versioned, opaque string encoding for grammar and transport configs.
//!
//! ```text
//!   value --serde_json--> {"version": 1, "body": value} --base64--> String
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::monolith::{Description, Instance};

/// Current envelope version.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u16,
    body: T,
}

/// Encode `value` as a versioned base64 string.
pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    let envelope = Envelope {
        version: FORMAT_VERSION,
        body: value,
    };
    let json = serde_json::to_vec(&envelope).map_err(|e| Error::encoding(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Decode a string produced by [`encode`].
pub fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T> {
    let json = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::encoding(format!("invalid base64: {}", e)))?;
    let envelope: Envelope<serde_json::Value> =
        serde_json::from_slice(&json).map_err(|e| Error::encoding(e.to_string()))?;

    if envelope.version != FORMAT_VERSION {
        return Err(Error::VersionMismatch {
            expected: FORMAT_VERSION,
            actual: envelope.version,
        });
    }

    serde_json::from_value(envelope.body).map_err(|e| Error::encoding(e.to_string()))
}

impl Description {
    pub fn encode(&self) -> Result<String> {
        encode(self)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        decode(encoded)
    }
}

impl Instance {
    pub fn encode(&self) -> Result<String> {
        encode(self)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        decode(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monolith::{
        Args, ByteType, BytesPart, Condition, DynamicPart, OptionalPart, Part, TimedPart, Value,
    };

    fn everything() -> Instance {
        Instance::new(
            Description::new(vec![
                Part::Bytes(BytesPart::new(vec![
                    ByteType::fixed(1),
                    ByteType::enumerated(vec![2, 3]),
                    ByteType::random(),
                    ByteType::random_enumerated(vec![4]),
                    ByteType::producer("n", ByteType::random_enumerated(vec![1, 2])),
                    ByteType::consumer("n"),
                ])),
                Part::Timed(TimedPart::new(100, vec![ByteType::fixed(9)])),
                Part::Dynamic(DynamicPart::length("n", ByteType::random())),
                Part::Dynamic(DynamicPart::seeded("n", ByteType::fixed(0))),
                Part::Dynamic(DynamicPart::from_args(ByteType::fixed(5))),
                Part::Optional(OptionalPart::new(
                    "n",
                    Condition::Greater(1),
                    Part::Bytes(BytesPart::new(vec![ByteType::fixed(7)])),
                )),
                Part::Empty,
            ]),
            Args::new([Value::Byte(3), Value::Int(2), Value::Bool(false)]),
        )
    }

    #[test]
    fn test_instance_round_trip() {
        let instance = everything();
        let encoded = instance.encode().unwrap();
        let decoded = Instance::decode(&encoded).unwrap();
        assert_eq!(decoded, instance);
    }

    #[test]
    fn test_description_round_trip() {
        let description = everything().description;
        let decoded = Description::decode(&description.encode().unwrap()).unwrap();
        assert_eq!(decoded, description);
    }

    #[test]
    fn test_version_mismatch() {
        let json = br#"{"version":2,"body":{"parts":[]}}"#;
        let encoded = STANDARD.encode(json);
        let err = Description::decode(&encoded).unwrap_err();
        assert!(matches!(
            err,
            Error::VersionMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(Description::decode("not base64!"), Err(Error::Encoding(_))));

        let encoded = STANDARD.encode(br#"{"version":1,"body":{"parts":[{"type":"bogus"}]}}"#);
        assert!(matches!(Description::decode(&encoded), Err(Error::Encoding(_))));
    }
}
