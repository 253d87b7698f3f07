//! Record codecs.
//!
//! A [`Serializer`] is chosen once when a [`DB`](crate::DB) is built and
//! used for every record it writes or reads. Payloads carry no codec tag,
//! so data written with one serializer must be read back with the same one.

use crate::error::CodecError;
use crate::model::Model;

/// Encodes records to bytes and decodes bytes back into records.
pub trait Serializer: Send + Sync {
    /// Short codec name, used in logs.
    fn name(&self) -> &'static str;

    fn marshal<M: Model>(&self, model: &M) -> Result<Vec<u8>, CodecError>;

    /// Decode into an existing record. On failure the record is left as it
    /// was.
    fn unmarshal<M: Model>(&self, data: &[u8], model: &mut M) -> Result<(), CodecError>;
}

/// Self-describing JSON text. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Serializer for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn marshal<M: Model>(&self, model: &M) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(model)?)
    }

    fn unmarshal<M: Model>(&self, data: &[u8], model: &mut M) -> Result<(), CodecError> {
        *model = serde_json::from_slice(data)?;
        Ok(())
    }
}

/// Compact binary MessagePack with named fields, so records stay readable
/// across field reordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePack;

impl Serializer for MessagePack {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn marshal<M: Model>(&self, model: &M) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(model)?)
    }

    fn unmarshal<M: Model>(&self, data: &[u8], model: &mut M) -> Result<(), CodecError> {
        *model = rmp_serde::from_slice(data)?;
        Ok(())
    }
}

/// Schema-driven protobuf encoding.
///
/// Only records exposing [`Model::as_message`] can be encoded; anything
/// else fails with [`CodecError::Unsupported`] when it is marshaled or
/// unmarshaled.
#[derive(Debug, Clone, Copy, Default)]
pub struct Protobuf;

impl Serializer for Protobuf {
    fn name(&self) -> &'static str {
        "protobuf"
    }

    fn marshal<M: Model>(&self, model: &M) -> Result<Vec<u8>, CodecError> {
        let msg = model
            .as_message()
            .ok_or(CodecError::Unsupported(M::model_name()))?;
        Ok(msg.encode_message())
    }

    fn unmarshal<M: Model>(&self, data: &[u8], model: &mut M) -> Result<(), CodecError> {
        let msg = model
            .as_message_mut()
            .ok_or(CodecError::Unsupported(M::model_name()))?;
        msg.replace_from(data)?;
        Ok(())
    }
}

/// Object-safe view of a generated protobuf message.
///
/// Implemented for every `prost::Message + Default`.
pub trait ProtoMessage {
    fn encode_message(&self) -> Vec<u8>;

    /// Replace the whole message with the decoded one. On failure the
    /// message is unchanged.
    fn replace_from(&mut self, buf: &[u8]) -> Result<(), prost::DecodeError>;
}

impl<T: prost::Message + Default> ProtoMessage for T {
    fn encode_message(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    fn replace_from(&mut self, buf: &[u8]) -> Result<(), prost::DecodeError> {
        *self = T::decode(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u64,
        name: String,
        email: Option<String>,
        age: u8,
        tags: Vec<String>,
    }

    crate::impl_model!(Profile, id = id);

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    struct PbProfile {
        #[prost(uint64, tag = "1")]
        id: u64,
        #[prost(string, tag = "2")]
        name: String,
        #[prost(uint32, tag = "3")]
        age: u32,
    }

    crate::impl_model!(PbProfile, id = id, message = protobuf);

    fn round_trip<S: Serializer, M: Model + Default>(s: &S, m: &M) -> M {
        let data = s.marshal(m).unwrap();
        let mut out = M::default();
        s.unmarshal(&data, &mut out).unwrap();
        out
    }

    #[test]
    fn test_json_is_text() {
        let p = Profile {
            id: 1,
            name: "Alice".into(),
            ..Default::default()
        };
        let data = Json.marshal(&p).unwrap();
        let text = String::from_utf8(data).unwrap();
        assert!(text.contains("\"name\":\"Alice\""));
    }

    #[test]
    fn test_msgpack_is_smaller_than_json() {
        let p = Profile {
            id: 1,
            name: "Alice".into(),
            email: Some("alice@example.com".into()),
            age: 30,
            tags: vec!["a".into()],
        };
        let json = Json.marshal(&p).unwrap();
        let mp = MessagePack.marshal(&p).unwrap();
        assert!(mp.len() < json.len());
        assert_eq!(round_trip(&MessagePack, &p), p);
    }

    #[test]
    fn test_protobuf_round_trip() {
        let p = PbProfile {
            id: 15,
            name: "Alice".into(),
            age: 30,
        };
        assert_eq!(round_trip(&Protobuf, &p), p);
    }

    #[test]
    fn test_protobuf_rejects_plain_model() {
        let mut p = Profile::default();
        assert!(matches!(
            Protobuf.marshal(&p),
            Err(CodecError::Unsupported("Profile"))
        ));
        assert!(matches!(
            Protobuf.unmarshal(b"", &mut p),
            Err(CodecError::Unsupported("Profile"))
        ));
    }

    #[test]
    fn test_failed_decode_leaves_model_untouched() {
        let mut p = Profile {
            id: 3,
            name: "keep".into(),
            ..Default::default()
        };
        assert!(Json.unmarshal(b"{not json", &mut p).is_err());
        assert!(MessagePack.unmarshal(&[0xc1], &mut p).is_err());
        assert_eq!(p.name, "keep");

        let mut pb = PbProfile {
            id: 3,
            name: "keep".into(),
            age: 1,
        };
        // Field 2 declared as length-delimited but truncated.
        assert!(Protobuf.unmarshal(&[0x12, 0x05, b'a'], &mut pb).is_err());
        assert_eq!(pb.name, "keep");
    }

    fn profile_strategy() -> impl Strategy<Value = Profile> {
        (
            any::<u64>(),
            ".{0,16}",
            proptest::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"),
            any::<u8>(),
            proptest::collection::vec("[a-z]{0,6}", 0..4),
        )
            .prop_map(|(id, name, email, age, tags)| Profile {
                id,
                name,
                email,
                age,
                tags,
            })
    }

    proptest! {
        #[test]
        fn json_round_trips(p in profile_strategy()) {
            prop_assert_eq!(round_trip(&Json, &p), p);
        }

        #[test]
        fn msgpack_round_trips(p in profile_strategy()) {
            prop_assert_eq!(round_trip(&MessagePack, &p), p);
        }

        #[test]
        fn protobuf_round_trips(id in any::<u64>(), name in ".{0,16}", age in any::<u32>()) {
            let p = PbProfile { id, name, age };
            prop_assert_eq!(round_trip(&Protobuf, &p), p);
        }
    }
}
