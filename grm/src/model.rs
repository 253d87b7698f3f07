use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::serializer::ProtoMessage;

/// A record that can be persisted by [`DB`](crate::DB).
///
/// Only [`Model::identifier`] matters in practice; a type that leaves it at
/// the default has no identifier and is rejected with
/// [`Error::InvalidModel`](crate::Error::InvalidModel) by every operation.
/// Most types implement this trait through [`impl_model!`](crate::impl_model).
pub trait Model: Serialize + DeserializeOwned {
    /// Type name the storage key is derived from. Defaults to the
    /// unqualified Rust type name without generic arguments.
    fn model_name() -> &'static str {
        short_type_name::<Self>()
    }

    /// String form of the identifier, or `None` if the type has none.
    fn identifier(&self) -> Option<String> {
        None
    }

    /// Bookkeeping timestamps, touched in place before every write.
    fn timestamps(&mut self) -> Option<&mut dyn Timestamps> {
        None
    }

    /// The schema-message capability required by
    /// [`Protobuf`](crate::Protobuf).
    fn as_message(&self) -> Option<&dyn ProtoMessage> {
        None
    }

    fn as_message_mut(&mut self) -> Option<&mut dyn ProtoMessage> {
        None
    }
}

/// Creation and modification times of a record.
pub trait Timestamps {
    /// Set the creation time, only if it is still unset.
    fn touch_created(&mut self, now: DateTime<Utc>);

    /// Set the modification time unconditionally.
    fn touch_updated(&mut self, now: DateTime<Utc>);
}

/// Common fields for records: a string identifier and both timestamps.
///
/// Embed it as a field and point [`impl_model!`](crate::impl_model) at it:
///
/// ```rust
/// use grm::{impl_model, Base};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Article {
///     base: Base,
///     title: String,
/// }
///
/// impl_model!(Article, id = base.id, timestamps = base);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Base {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

impl Timestamps for Base {
    fn touch_created(&mut self, now: DateTime<Utc>) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
    }

    fn touch_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

impl Model for Base {
    fn identifier(&self) -> Option<String> {
        Some(self.id.clone())
    }

    fn timestamps(&mut self) -> Option<&mut dyn Timestamps> {
        Some(self)
    }
}

/// `my_app::models::User<T>` -> `User`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Implement [`Model`] for a struct.
///
/// ```text
/// impl_model!(User, id = id);
/// impl_model!(Article, id = base.id, timestamps = base);
/// impl_model!(Account, id = id, name = "UserAccount");
/// impl_model!(pb::User, id = id, message = protobuf);
/// ```
///
/// `id` names the identifier field (any `ToString` type), `name` overrides
/// the type name used for keys, `timestamps` names a field implementing
/// [`Timestamps`], and `message = protobuf` exposes the type to the
/// [`Protobuf`](crate::Protobuf) serializer. The optional parts must appear
/// in this order.
#[macro_export]
macro_rules! impl_model {
    (@message protobuf) => {
        fn as_message(&self) -> ::std::option::Option<&dyn $crate::ProtoMessage> {
            ::std::option::Option::Some(self)
        }

        fn as_message_mut(&mut self) -> ::std::option::Option<&mut dyn $crate::ProtoMessage> {
            ::std::option::Option::Some(self)
        }
    };
    (
        $ty:ty, id = $($id:ident).+
        $(, name = $name:literal)?
        $(, timestamps = $($ts:ident).+)?
        $(, message = $msg:ident)?
    ) => {
        impl $crate::Model for $ty {
            $(
                fn model_name() -> &'static str {
                    $name
                }
            )?

            fn identifier(&self) -> ::std::option::Option<::std::string::String> {
                ::std::option::Option::Some(::std::string::ToString::to_string(&self.$($id).+))
            }

            $(
                fn timestamps(
                    &mut self,
                ) -> ::std::option::Option<&mut dyn $crate::Timestamps> {
                    ::std::option::Option::Some(&mut self.$($ts).+)
                }
            )?

            $( $crate::impl_model!(@message $msg); )?
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Serialize, Deserialize)]
    struct Plain;

    impl Model for Plain {}

    #[derive(Serialize, Deserialize)]
    struct Wrapper<T>(T);

    impl<T: Serialize + DeserializeOwned> Model for Wrapper<T> {}

    #[test]
    fn test_short_type_name() {
        assert_eq!(Plain::model_name(), "Plain");
        assert_eq!(Wrapper::<Plain>::model_name(), "Wrapper");
        assert_eq!(short_type_name::<u32>(), "u32");
    }

    #[test]
    fn test_default_capabilities_are_absent() {
        let mut p = Plain;
        assert!(p.identifier().is_none());
        assert!(p.timestamps().is_none());
        assert!(p.as_message().is_none());
        assert!(p.as_message_mut().is_none());
    }

    #[test]
    fn test_base_timestamps() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut b = Base::new("u1");
        b.touch_created(t1);
        b.touch_updated(t1);
        b.touch_created(t2);
        b.touch_updated(t2);

        assert_eq!(b.created_at, Some(t1));
        assert_eq!(b.updated_at, Some(t2));
        assert_eq!(b.identifier().as_deref(), Some("u1"));
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Account {
        base: Base,
        email: String,
    }

    crate::impl_model!(Account, id = base.id, name = "UserAccount", timestamps = base);

    #[test]
    fn test_impl_model_macro() {
        let mut a = Account {
            base: Base::new("7"),
            email: "a@example.com".into(),
        };
        assert_eq!(Account::model_name(), "UserAccount");
        assert_eq!(a.identifier().as_deref(), Some("7"));
        assert!(a.timestamps().is_some());
        assert!(a.as_message().is_none());
    }
}
