//! Descriptor serialization codecs.
//!
//! A codec turns a whole [`Descriptor`] into an opaque byte blob and back.
//! The only contract is that `decode(encode(d)) == d`; callers never inspect
//! the bytes.

use serde::{Deserialize, Serialize};

use crate::{Descriptor, DescriptorId, StoreError};

/// Pluggable descriptor serialization.
pub trait DescriptorCodec: Send + Sync {
    /// Serialize a descriptor to bytes.
    fn encode(&self, descriptor: &Descriptor) -> Result<Vec<u8>, StoreError>;

    /// Deserialize a descriptor from bytes.
    fn decode(&self, bytes: &[u8]) -> Result<Descriptor, StoreError>;
}

/// JSON codec backed by `serde_json`.
///
/// JSON numbers cannot hold `NaN` or infinities, so those components are
/// written as the strings `"NaN"`, `"inf"` and `"-inf"`. Finite components
/// are plain numbers, so blobs of finite vectors read like a serialized
/// [`Descriptor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

/// One vector component on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Component {
    Number(f64),
    Special(String),
}

const NAN: &str = "NaN";
const INFINITY: &str = "inf";
const NEG_INFINITY: &str = "-inf";

impl From<f64> for Component {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Component::Number(value)
        } else if value.is_nan() {
            Component::Special(NAN.to_string())
        } else if value > 0.0 {
            Component::Special(INFINITY.to_string())
        } else {
            Component::Special(NEG_INFINITY.to_string())
        }
    }
}

impl Component {
    fn into_f64(self) -> Result<f64, StoreError> {
        match self {
            Component::Number(value) => Ok(value),
            Component::Special(text) => match text.as_str() {
                NAN => Ok(f64::NAN),
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                other => Err(StoreError::Serialization {
                    reason: format!("unknown vector component '{}'", other),
                }),
            },
        }
    }
}

#[derive(Serialize)]
struct EncodedDescriptor<'a> {
    id: &'a DescriptorId,
    vector: Vec<Component>,
}

#[derive(Deserialize)]
struct DecodedDescriptor {
    id: DescriptorId,
    vector: Vec<Component>,
}

impl DescriptorCodec for JsonCodec {
    fn encode(&self, descriptor: &Descriptor) -> Result<Vec<u8>, StoreError> {
        let encoded = EncodedDescriptor {
            id: &descriptor.id,
            vector: descriptor.vector.iter().copied().map(Component::from).collect(),
        };
        serde_json::to_vec(&encoded).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Descriptor, StoreError> {
        let decoded: DecodedDescriptor =
            serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
                reason: e.to_string(),
            })?;
        let vector = decoded
            .vector
            .into_iter()
            .map(Component::into_f64)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Descriptor::new(decoded.id, vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DescriptorId;
    use proptest::prelude::*;

    #[test]
    fn test_decode_garbage_is_serialization_error() {
        let err = JsonCodec.decode(b"\x00\x01not json").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn test_encode_keeps_identity() {
        let d = Descriptor::new(DescriptorId::new("sift", "u1"), vec![1.0, -2.5]);
        let bytes = JsonCodec.encode(&d).unwrap();
        let back = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(back.uuid().as_str(), "u1");
        assert_eq!(back.type_name(), "sift");
    }

    #[test]
    fn test_non_finite_components_roundtrip() {
        let d = Descriptor::new(
            DescriptorId::new("sift", "u1"),
            vec![1.0, f64::INFINITY, f64::NAN, f64::NEG_INFINITY, -0.0],
        );
        let back = JsonCodec.decode(&JsonCodec.encode(&d).unwrap()).unwrap();

        assert_eq!(back.id, d.id);
        assert_eq!(back.vector.len(), 5);
        assert_eq!(back.vector[0], 1.0);
        assert_eq!(back.vector[1], f64::INFINITY);
        assert!(back.vector[2].is_nan());
        assert_eq!(back.vector[3], f64::NEG_INFINITY);
        assert!(back.vector[4] == 0.0 && back.vector[4].is_sign_negative());
    }

    #[test]
    fn test_finite_blob_matches_descriptor_json() {
        let d = Descriptor::new(DescriptorId::new("sift", "u1"), vec![0.5, -3.0]);
        let plain = serde_json::to_vec(&d).unwrap();
        assert_eq!(JsonCodec.encode(&d).unwrap(), plain);
        assert_eq!(JsonCodec.decode(&plain).unwrap(), d);
    }

    #[test]
    fn test_unknown_component_string_is_serialization_error() {
        let bytes = br#"{"id":{"type_name":"t","uuid":"u"},"vector":[1.0,"big"]}"#;
        let err = JsonCodec.decode(bytes).unwrap_err();
        assert!(matches!(err, StoreError::Serialization { ref reason } if reason.contains("big")));
    }

    fn component_strategy() -> impl Strategy<Value = f64> {
        prop_oneof![
            8 => -1.0e6f64..1.0e6,
            1 => Just(f64::INFINITY),
            1 => Just(f64::NEG_INFINITY),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: infinities survive alongside finite values.
        #[test]
        fn prop_json_codec_roundtrip_with_infinities(
            vector in prop::collection::vec(component_strategy(), 0..32),
        ) {
            let d = Descriptor::new(DescriptorId::new("sift", "u"), vector);
            let bytes = JsonCodec.encode(&d).unwrap();
            prop_assert_eq!(JsonCodec.decode(&bytes).unwrap(), d);
        }

        /// Property: decoding an encoded descriptor yields the original.
        #[test]
        fn prop_json_codec_roundtrip(
            type_name in "[a-z]{1,8}",
            uuid in "[a-zA-Z0-9-]{1,36}",
            vector in prop::collection::vec(-1.0e6f64..1.0e6, 0..32),
        ) {
            let d = Descriptor::new(DescriptorId::new(type_name, uuid), vector);
            let bytes = JsonCodec.encode(&d).unwrap();
            prop_assert_eq!(JsonCodec.decode(&bytes).unwrap(), d);
        }
    }
}
