use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application user payload, either still serialized or already structured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum UserPayload {
    Raw(String),
    Structured(Value),
}

impl UserPayload {
    /// Decode into a structured value. Raw strings must hold JSON.
    pub fn decode(&self) -> Result<Value, serde_json::Error> {
        match self {
            UserPayload::Raw(text) => serde_json::from_str(text),
            UserPayload::Structured(value) => Ok(value.clone()),
        }
    }

    /// Text form written to storage.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            UserPayload::Raw(text) => Ok(text.clone()),
            UserPayload::Structured(value) => serde_json::to_string(value),
        }
    }
}

impl From<&str> for UserPayload {
    fn from(text: &str) -> Self {
        UserPayload::Raw(text.to_string())
    }
}

impl From<String> for UserPayload {
    fn from(text: String) -> Self {
        UserPayload::Raw(text)
    }
}

impl From<Value> for UserPayload {
    fn from(value: Value) -> Self {
        UserPayload::Structured(value)
    }
}

/// Identifier of the authenticated principal, numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl UserId {
    /// Numeric text parses as `Number`, anything else stays `Text`.
    pub fn parse(text: &str) -> Self {
        text.parse::<i64>()
            .map(UserId::Number)
            .unwrap_or_else(|_| UserId::Text(text.to_string()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        UserId::Number(n)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId::Text(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId::Text(s)
    }
}

/// The persisted fields of a token, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenField {
    Id,
    User,
    UserId,
    Created,
    Ttl,
    RememberMe,
}

impl TokenField {
    pub const ALL: [TokenField; 6] = [
        TokenField::Id,
        TokenField::User,
        TokenField::UserId,
        TokenField::Created,
        TokenField::Ttl,
        TokenField::RememberMe,
    ];

    /// Field name as it appears in storage keys.
    pub fn name(&self) -> &'static str {
        match self {
            TokenField::Id => "id",
            TokenField::User => "user",
            TokenField::UserId => "userId",
            TokenField::Created => "created",
            TokenField::Ttl => "ttl",
            TokenField::RememberMe => "rememberMe",
        }
    }
}

/// Authentication token with the fields the credential manager persists.
///
/// Every field is optional until loaded or set. Deserializing a login
/// response into a `TokenRecord` yields a patch suitable for
/// `CredentialManager::set_token`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TokenRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
}

impl TokenRecord {
    /// Shallow merge: fields present in `patch` overwrite, absent ones are kept.
    pub fn merge(&mut self, patch: TokenRecord) {
        if patch.id.is_some() {
            self.id = patch.id;
        }
        if patch.user.is_some() {
            self.user = patch.user;
        }
        if patch.user_id.is_some() {
            self.user_id = patch.user_id;
        }
        if patch.created.is_some() {
            self.created = patch.created;
        }
        if patch.ttl.is_some() {
            self.ttl = patch.ttl;
        }
        if patch.remember_me.is_some() {
            self.remember_me = patch.remember_me;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TokenRecord::default()
    }

    /// Text written to storage for `field`, or `None` when the field is absent.
    ///
    /// `userId` is stored as JSON so a textual id such as `"007"` stays text.
    pub fn encode_field(&self, field: TokenField) -> Result<Option<String>, serde_json::Error> {
        Ok(match field {
            TokenField::Id => self.id.clone(),
            TokenField::User => self.user.as_ref().map(UserPayload::encode).transpose()?,
            TokenField::UserId => self.user_id.as_ref().map(serde_json::to_string).transpose()?,
            TokenField::Created => self.created.clone(),
            TokenField::Ttl => self.ttl.map(|ttl| ttl.to_string()),
            TokenField::RememberMe => self.remember_me.map(|flag| flag.to_string()),
        })
    }

    /// Apply text read from storage to `field`.
    ///
    /// Returns `false` when the text cannot be read as that field's type;
    /// the field is left absent in that case.
    pub fn apply_stored(&mut self, field: TokenField, text: &str) -> bool {
        match field {
            TokenField::Id => self.id = Some(text.to_string()),
            TokenField::User => self.user = Some(UserPayload::Raw(text.to_string())),
            // Unquoted ids were written before ids were stored as JSON.
            TokenField::UserId => {
                let user_id = serde_json::from_str::<UserId>(text)
                    .unwrap_or_else(|_| UserId::parse(text));
                self.user_id = Some(user_id);
            }
            TokenField::Created => self.created = Some(text.to_string()),
            TokenField::Ttl => match text.trim().parse::<i64>() {
                Ok(ttl) => self.ttl = Some(ttl),
                Err(_) => return false,
            },
            TokenField::RememberMe => match text.trim() {
                "true" => self.remember_me = Some(true),
                "false" => self.remember_me = Some(false),
                _ => return false,
            },
        }
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_is_shallow() {
        let mut token = TokenRecord {
            id: Some("old".to_string()),
            remember_me: Some(true),
            ..TokenRecord::default()
        };
        token.merge(TokenRecord {
            id: Some("new".to_string()),
            ttl: Some(60),
            ..TokenRecord::default()
        });

        assert_eq!(token.id.as_deref(), Some("new"));
        assert_eq!(token.ttl, Some(60));
        assert_eq!(token.remember_me, Some(true));
        assert_eq!(token.user, None);
    }

    #[test]
    fn test_field_names() {
        let names: Vec<&str> = TokenField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["id", "user", "userId", "created", "ttl", "rememberMe"]);
    }

    #[test]
    fn test_encode_fields() {
        let token = TokenRecord {
            id: Some("tok1".to_string()),
            user: Some(json!({"name": "Ana"}).into()),
            user_id: Some(UserId::Number(42)),
            created: None,
            ttl: Some(60),
            remember_me: Some(false),
        };

        let encode = |field| token.encode_field(field).unwrap();
        assert_eq!(encode(TokenField::Id).as_deref(), Some("tok1"));
        assert_eq!(encode(TokenField::User).as_deref(), Some(r#"{"name":"Ana"}"#));
        assert_eq!(encode(TokenField::UserId).as_deref(), Some("42"));
        assert_eq!(encode(TokenField::Created), None);
        assert_eq!(encode(TokenField::Ttl).as_deref(), Some("60"));
        assert_eq!(encode(TokenField::RememberMe).as_deref(), Some("false"));
    }

    #[test]
    fn test_text_user_id_is_stored_quoted() {
        let token = TokenRecord {
            user_id: Some(UserId::Text("007".to_string())),
            ..TokenRecord::default()
        };
        let stored = token.encode_field(TokenField::UserId).unwrap().unwrap();
        assert_eq!(stored, r#""007""#);

        let mut loaded = TokenRecord::default();
        assert!(loaded.apply_stored(TokenField::UserId, &stored));
        assert_eq!(loaded.user_id, Some(UserId::Text("007".to_string())));
    }

    #[test]
    fn test_unquoted_user_id_still_loads() {
        let mut token = TokenRecord::default();
        assert!(token.apply_stored(TokenField::UserId, "5f2b9c"));
        assert_eq!(token.user_id, Some(UserId::Text("5f2b9c".to_string())));

        assert!(token.apply_stored(TokenField::UserId, "42"));
        assert_eq!(token.user_id, Some(UserId::Number(42)));
    }

    #[test]
    fn test_raw_user_is_stored_verbatim() {
        let token = TokenRecord {
            user: Some("already serialized".into()),
            ..TokenRecord::default()
        };
        assert_eq!(
            token.encode_field(TokenField::User).unwrap().as_deref(),
            Some("already serialized")
        );
    }

    #[test]
    fn test_apply_stored_values() {
        let mut token = TokenRecord::default();
        assert!(token.apply_stored(TokenField::Id, "tok1"));
        assert!(token.apply_stored(TokenField::User, r#"{"name":"a"}"#));
        assert!(token.apply_stored(TokenField::UserId, "42"));
        assert!(token.apply_stored(TokenField::Created, "2024-01-01T00:00:00Z"));
        assert!(token.apply_stored(TokenField::Ttl, "1209600"));
        assert!(token.apply_stored(TokenField::RememberMe, "true"));

        assert_eq!(token.id.as_deref(), Some("tok1"));
        assert_eq!(token.user, Some(UserPayload::Raw(r#"{"name":"a"}"#.to_string())));
        assert_eq!(token.user_id, Some(UserId::Number(42)));
        assert_eq!(token.ttl, Some(1_209_600));
        assert_eq!(token.remember_me, Some(true));
    }

    #[test]
    fn test_apply_stored_keeps_null_text() {
        let mut token = TokenRecord::default();
        assert!(token.apply_stored(TokenField::Id, "null"));
        assert!(token.apply_stored(TokenField::Created, "undefined"));
        assert_eq!(token.id.as_deref(), Some("null"));
        assert_eq!(token.created.as_deref(), Some("undefined"));
    }

    #[test]
    fn test_apply_stored_rejects_bad_primitives() {
        let mut token = TokenRecord::default();
        assert!(!token.apply_stored(TokenField::Ttl, "sixty"));
        assert!(!token.apply_stored(TokenField::RememberMe, "yes"));
        assert!(token.is_empty());
    }

    #[test]
    fn test_user_id_parse_and_display() {
        assert_eq!(UserId::parse("7"), UserId::Number(7));
        assert_eq!(UserId::parse("abc-7"), UserId::Text("abc-7".to_string()));
        assert_eq!(UserId::Number(7).to_string(), "7");
        assert_eq!(UserId::Text("x".to_string()).to_string(), "x");
    }

    #[test]
    fn test_user_payload_decode() {
        let raw = UserPayload::from(r#"{"name":"a"}"#);
        assert_eq!(raw.decode().unwrap(), json!({"name": "a"}));

        let bad = UserPayload::from("not json");
        assert!(bad.decode().is_err());

        let structured = UserPayload::from(json!([1, 2]));
        assert_eq!(structured.decode().unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_deserialize_login_response() {
        let token: TokenRecord = serde_json::from_value(json!({
            "id": "tok1",
            "ttl": 1209600,
            "created": "2024-01-01T00:00:00.000Z",
            "userId": 42,
            "user": {"email": "a@example.com"}
        }))
        .unwrap();

        assert_eq!(token.id.as_deref(), Some("tok1"));
        assert_eq!(token.user_id, Some(UserId::Number(42)));
        assert_eq!(
            token.user,
            Some(UserPayload::Structured(json!({"email": "a@example.com"})))
        );
        assert_eq!(token.remember_me, None);
    }

    #[test]
    fn test_deserialize_string_user_id() {
        let token: TokenRecord =
            serde_json::from_value(json!({"userId": "5f2b", "user": "{\"a\":1}"})).unwrap();
        assert_eq!(token.user_id, Some(UserId::Text("5f2b".to_string())));
        assert_eq!(token.user, Some(UserPayload::Raw("{\"a\":1}".to_string())));
    }
}
