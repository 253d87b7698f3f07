//! Canonical key layout:
//!
//! ```text
//! grm:{plural_snake_type}:{id}   -> serialized record
//! ```
//!
//! The plural is the snake-cased type name with a literal `s` appended; no
//! irregular plurals are recognized. Type names that snake-case to the same
//! string (`UserID` and `User_ID`) share one namespace.

use crate::error::{Error, Result};
use crate::model::Model;

/// Namespace shared by every key this crate writes.
pub const KEY_PREFIX: &str = "grm";

/// Build the canonical key for a type name and identifier.
/// Format: `grm:{snake(type_name)}s:{id}`
pub fn derive_key(type_name: &str, id: &str) -> String {
    format!("{KEY_PREFIX}:{}:{id}", collection_name(type_name))
}

/// The per-type key segment, e.g. `UserProfile` -> `user_profiles`.
pub fn collection_name(type_name: &str) -> String {
    let mut name = camel_to_snake(type_name);
    name.push('s');
    name
}

/// Build the canonical key of a record. Fails with [`Error::InvalidModel`]
/// when the record does not expose an identifier.
pub fn key_for<M: Model>(model: &M) -> Result<String> {
    let id = model
        .identifier()
        .ok_or(Error::InvalidModel(M::model_name()))?;
    Ok(derive_key(M::model_name(), &id))
}

/// Convert `CamelCase` to `snake_case`.
///
/// Runs of capitals are treated as one word, with the last capital opening
/// the next word when followed by a lowercase letter: `HTTPServer` becomes
/// `http_server`, `UserID` becomes `user_id`. Existing underscores are kept
/// and never doubled.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                Some(_) => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("User"), "user");
        assert_eq!(camel_to_snake("Product"), "product");
        assert_eq!(camel_to_snake("UserProfile"), "user_profile");
        assert_eq!(camel_to_snake("TestUser"), "test_user");
        assert_eq!(camel_to_snake("HTTPServer"), "http_server");
        assert_eq!(camel_to_snake("UserID"), "user_id");
        assert_eq!(camel_to_snake("Oauth2Token"), "oauth2_token");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
        assert_eq!(camel_to_snake("Mixed_Case"), "mixed_case");
    }

    #[test]
    fn test_derive_key_format() {
        assert_eq!(derive_key("Product", "42"), "grm:products:42");
        assert_eq!(derive_key("TestUser", "999"), "grm:test_users:999");
        assert_eq!(derive_key("User", "a:b"), "grm:users:a:b");
    }

    #[test]
    fn test_naive_plural() {
        assert_eq!(collection_name("Status"), "statuss");
        assert_eq!(collection_name("Person"), "persons");
    }

    #[test]
    fn test_snake_collision_shares_namespace() {
        assert_eq!(collection_name("UserID"), collection_name("User_ID"));
    }

    proptest! {
        #[test]
        fn derive_key_is_deterministic(ty in "[A-Z][a-z]{1,8}([A-Z][a-z]{1,8}){0,2}", id in any::<u64>()) {
            let id = id.to_string();
            prop_assert_eq!(derive_key(&ty, &id), derive_key(&ty, &id));
        }

        #[test]
        fn derive_key_is_injective_in_id(ty in "[A-Z][a-z]{1,8}", a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            prop_assert_ne!(derive_key(&ty, &a.to_string()), derive_key(&ty, &b.to_string()));
        }

        #[test]
        fn derive_key_is_injective_in_type(
            a in "[A-Z][a-z]{1,8}([A-Z][a-z]{1,8})?",
            b in "[A-Z][a-z]{1,8}([A-Z][a-z]{1,8})?",
            id in any::<u32>(),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(derive_key(&a, &id.to_string()), derive_key(&b, &id.to_string()));
        }
    }
}
