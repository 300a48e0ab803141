//! Credential blob codec.
//!
//! Claude CLI stores OAuth credentials in two locations:
//!
//! 1. **macOS Keychain**: service="Claude Code-credentials"
//! 2. **File**: `~/.claude/.credentials.json`
//!
//! # Credentials Format
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000,
//!     "scopes": ["user:profile", "..."]
//!   }
//! }
//! ```
//!
//! The codec never drops fields it does not recognize: a blob parsed and
//! reserialized carries every unknown top-level and nested key through
//! unchanged. Output is pretty-printed with sorted keys.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::DateTime;
use serde_json::{Map, Value, json};

use crate::error::CoreError;

// ============================================================================
// Constants
// ============================================================================

/// Key of the nested OAuth object inside a credential blob.
pub const OAUTH_KEY: &str = "claudeAiOauth";

/// Hex length of a fingerprint (first 8 bytes of SHA-256).
const FINGERPRINT_LEN: usize = 16;

// ============================================================================
// Hashing Helpers
// ============================================================================

/// Returns the first 16 hex characters of SHA-256 over `bytes`.
///
/// Used both as a human-readable label component and as the refresh-lock
/// key derived from refresh-token bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, bytes);
    let mut out = String::with_capacity(FINGERPRINT_LEN);
    for byte in &digest.as_ref()[..FINGERPRINT_LEN / 2] {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Slugs a string for use in account IDs.
///
/// Lowercase; runs of non-alphanumeric characters collapse to a single
/// underscore; leading and trailing underscores are trimmed.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;
    for ch in input.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    out
}

// ============================================================================
// Token Material
// ============================================================================

/// The `(accessToken, refreshToken, expiresAt)` triple extracted from a blob.
///
/// Defines the freshness partial order: material with a later `expires_at_ms`
/// is strictly newer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMaterial {
    /// Access token, if present and non-empty.
    pub access_token: Option<String>,
    /// Refresh token, if present and non-empty.
    pub refresh_token: Option<String>,
    /// Expiry as epoch milliseconds.
    pub expires_at_ms: Option<i64>,
}

impl TokenMaterial {
    /// True when this material expires strictly before `other`.
    pub fn is_strictly_older_than(&self, other: &TokenMaterial) -> bool {
        match (self.expires_at_ms, other.expires_at_ms) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }
}

// ============================================================================
// Plan Tag
// ============================================================================

/// Subscription plan derived from credential metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTag {
    /// Max 20x plan.
    Max20x,
    /// Max 5x plan.
    Max5x,
    /// Pro plan.
    Pro,
    /// Max plan with no multiplier.
    Max,
}

impl std::fmt::Display for PlanTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanTag::Max20x => write!(f, "Max 20x"),
            PlanTag::Max5x => write!(f, "Max 5x"),
            PlanTag::Pro => write!(f, "Pro"),
            PlanTag::Max => write!(f, "Max"),
        }
    }
}

impl PlanTag {
    /// Case-insensitive substring match against a tier or subscription string.
    fn from_str_hint(hint: &str) -> Option<Self> {
        let lower = hint.to_lowercase();
        if lower.contains("20x") {
            Some(PlanTag::Max20x)
        } else if lower.contains("5x") {
            Some(PlanTag::Max5x)
        } else if lower.contains("pro") {
            Some(PlanTag::Pro)
        } else if lower.contains("max") {
            Some(PlanTag::Max)
        } else {
            None
        }
    }
}

// ============================================================================
// Refresh Payload
// ============================================================================

/// Token endpoint response fields merged back into a blob after rotation.
#[derive(Debug, Clone)]
pub struct RefreshPayload {
    /// New access token. Always present on success.
    pub access_token: String,
    /// New refresh token. The previous one is kept when omitted.
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, converted to an absolute `expiresAt`.
    pub expires_in: Option<i64>,
    /// Space-delimited scope string.
    pub scope: Option<String>,
}

// ============================================================================
// Timestamp Heuristics
// ============================================================================

/// Parses a timestamp value into epoch milliseconds.
///
/// Accepted shapes: integer milliseconds (> 1e12), integer seconds (> 1e9),
/// numeric strings parseable as either, or ISO-8601 strings. Non-positive
/// and non-finite values are treated as absent.
pub fn parse_timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => numeric_ms(n.as_f64()?),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(num) = trimmed.parse::<f64>() {
                numeric_ms(num)
            } else {
                DateTime::parse_from_rfc3339(trimmed)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            }
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn numeric_ms(value: f64) -> Option<i64> {
    if !value.is_finite() || value <= 0.0 {
        None
    } else if value > 1e12 {
        Some(value as i64)
    } else if value > 1e9 {
        Some((value * 1000.0) as i64)
    } else {
        None
    }
}

// ============================================================================
// Credential Blob
// ============================================================================

/// A credential JSON document with unknown fields preserved.
///
/// All extraction is lazy: the blob keeps the raw [`Value`] and reads fields
/// on demand, so writers round-trip metadata they never interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialBlob {
    value: Value,
}

impl CredentialBlob {
    /// Parses credential bytes. The top level must be a JSON object.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Wraps an already-parsed value. The top level must be a JSON object.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        if value.is_object() {
            Ok(Self { value })
        } else {
            Err(CoreError::NotAnObject)
        }
    }

    /// The underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Serializes with sorted keys, pretty-printed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec_pretty(&self.value)?)
    }

    /// Fingerprint over the canonical serialization of this blob.
    pub fn fingerprint(&self) -> Result<String, CoreError> {
        Ok(fingerprint(&self.to_bytes()?))
    }

    fn oauth(&self) -> Option<&Map<String, Value>> {
        self.value.get(OAUTH_KEY)?.as_object()
    }

    fn trimmed_string(value: Option<&Value>) -> Option<String> {
        let s = value?.as_str()?.trim();
        if s.is_empty() { None } else { Some(s.to_string()) }
    }

    // ========================================================================
    // Token Material
    // ========================================================================

    /// Trimmed non-empty `claudeAiOauth.accessToken`.
    pub fn access_token(&self) -> Option<String> {
        Self::trimmed_string(self.oauth()?.get("accessToken"))
    }

    /// Trimmed non-empty `claudeAiOauth.refreshToken`.
    pub fn refresh_token(&self) -> Option<String> {
        Self::trimmed_string(self.oauth()?.get("refreshToken"))
    }

    /// Expiry in epoch milliseconds.
    ///
    /// The first of `claudeAiOauth.expiresAt`, `claudeAiOauth.expires_at`,
    /// root `expiresAt`, root `expires_at` that parses under the timestamp
    /// heuristics wins.
    pub fn expires_at_ms(&self) -> Option<i64> {
        let candidates = [
            self.oauth().and_then(|o| o.get("expiresAt")),
            self.oauth().and_then(|o| o.get("expires_at")),
            self.value.get("expiresAt"),
            self.value.get("expires_at"),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(parse_timestamp_ms)
    }

    /// The full token material triple.
    pub fn token_material(&self) -> TokenMaterial {
        TokenMaterial {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            expires_at_ms: self.expires_at_ms(),
        }
    }

    /// A blob is usable when it parses and carries an access token.
    pub fn is_usable(&self) -> bool {
        self.access_token().is_some()
    }

    // ========================================================================
    // Metadata Extraction
    // ========================================================================

    /// Granted scopes: an array of strings or one space-delimited string.
    pub fn scopes(&self) -> Vec<String> {
        let Some(raw) = self.oauth().and_then(|o| o.get("scopes")) else {
            return Vec::new();
        };
        match raw {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
            Value::String(s) => s.split_whitespace().map(ToString::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Account email, lowercased.
    ///
    /// Searched in order: root `email`, root `account.email`,
    /// `claudeAiOauth.email`, `claudeAiOauth.account.email`, and as a last
    /// resort the `email` or `preferred_username` claim of the access-token
    /// JWT payload.
    pub fn email(&self) -> Option<String> {
        let direct = [
            self.value.get("email"),
            self.value.get("account").and_then(|a| a.get("email")),
            self.oauth().and_then(|o| o.get("email")),
            self.oauth()
                .and_then(|o| o.get("account"))
                .and_then(|a| a.get("email")),
        ];
        for candidate in direct.into_iter().flatten() {
            if let Some(email) = as_email(candidate) {
                return Some(email);
            }
        }

        let claims = self.access_token().and_then(|t| decode_jwt_payload(&t))?;
        [claims.get("email"), claims.get("preferred_username")]
            .into_iter()
            .flatten()
            .find_map(as_email)
    }

    /// Plan tag from `rateLimitTier` first, `subscriptionType` second.
    pub fn plan(&self) -> Option<PlanTag> {
        let oauth = self.oauth()?;
        for key in ["rateLimitTier", "subscriptionType"] {
            if let Some(hint) = Self::trimmed_string(oauth.get(key)) {
                if let Some(plan) = PlanTag::from_str_hint(&hint) {
                    return Some(plan);
                }
            }
        }
        None
    }

    /// Whether this credential belongs to a team account.
    ///
    /// `isTeam` wins when present; otherwise a case-insensitive "team"
    /// substring in `subscriptionType` or `organization.organization_type`.
    pub fn is_team(&self) -> bool {
        if let Some(flag) = self
            .oauth()
            .and_then(|o| o.get("isTeam"))
            .or_else(|| self.value.get("isTeam"))
            .and_then(Value::as_bool)
        {
            return flag;
        }

        let hints = [
            self.oauth().and_then(|o| o.get("subscriptionType")),
            self.oauth()
                .and_then(|o| o.get("organization"))
                .and_then(|org| org.get("organization_type")),
        ];
        hints
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .any(|s| s.to_lowercase().contains("team"))
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Stable account ID derived from `(email?, is_team, refresh_token?)`.
    pub fn account_id(&self) -> String {
        if let Some(email) = self.email() {
            let slug = slugify(&email);
            if self.is_team() {
                format!("acct_claude_team_{slug}")
            } else {
                format!("acct_claude_{slug}")
            }
        } else {
            let refresh = self.refresh_token().unwrap_or_else(|| "-".to_string());
            let salted = format!("claude:refresh:{refresh}");
            format!("acct_claude_{}", fingerprint(salted.as_bytes()))
        }
    }

    /// Key under which cross-process refresh mutual exclusion is enforced.
    ///
    /// Refresh-token fingerprint when available; otherwise the account ID,
    /// so accounts without a refresh token serialize on their own identity.
    pub fn refresh_lock_id(&self) -> String {
        match self.refresh_token() {
            Some(token) => fingerprint(token.as_bytes()),
            None => self.account_id(),
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Merges a token endpoint response into this blob.
    ///
    /// Updates `accessToken`; `refreshToken` only when the payload carries
    /// one; `expiresAt` to `now_ms + expires_in * 1000` when a lifetime is
    /// provided; `scopes` only when the payload includes a scope string.
    /// Every other field is left untouched.
    pub fn apply_refresh(&mut self, payload: &RefreshPayload, now_ms: i64) {
        let Some(root) = self.value.as_object_mut() else {
            return;
        };
        let oauth = root
            .entry(OAUTH_KEY.to_string())
            .or_insert_with(|| json!({}));
        let Some(oauth) = oauth.as_object_mut() else {
            return;
        };

        oauth.insert(
            "accessToken".to_string(),
            Value::String(payload.access_token.clone()),
        );
        if let Some(refresh) = &payload.refresh_token {
            oauth.insert("refreshToken".to_string(), Value::String(refresh.clone()));
        }
        if let Some(expires_in) = payload.expires_in {
            oauth.insert(
                "expiresAt".to_string(),
                Value::from(now_ms + expires_in * 1000),
            );
        }
        if let Some(scope) = &payload.scope {
            let scopes: Vec<Value> = scope
                .split_whitespace()
                .map(|s| Value::String(s.to_string()))
                .collect();
            oauth.insert("scopes".to_string(), Value::Array(scopes));
        }
    }

    /// Copies keys present in `other` but absent here, without overwriting.
    ///
    /// Applies at the top level and one level into `claudeAiOauth`, which is
    /// how the resolver fills metadata gaps between the canonical file and
    /// the keychain mirror.
    pub fn fill_gaps_from(&mut self, other: &CredentialBlob) {
        let Some(theirs) = other.value.as_object() else {
            return;
        };
        let Some(ours) = self.value.as_object_mut() else {
            return;
        };

        for (key, value) in theirs {
            if key == OAUTH_KEY {
                continue;
            }
            ours.entry(key.clone()).or_insert_with(|| value.clone());
        }

        if let Some(their_oauth) = theirs.get(OAUTH_KEY).and_then(Value::as_object) {
            let our_oauth = ours
                .entry(OAUTH_KEY.to_string())
                .or_insert_with(|| json!({}));
            if let Some(our_oauth) = our_oauth.as_object_mut() {
                for (key, value) in their_oauth {
                    our_oauth.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
    }
}

fn as_email(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.is_empty() || !s.contains('@') {
        None
    } else {
        Some(s.to_lowercase())
    }
}

/// Decodes the middle (payload) segment of a JWT.
fn decode_jwt_payload(token: &str) -> Option<Map<String, Value>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(json: &str) -> CredentialBlob {
        CredentialBlob::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_full_blob() {
        let b = blob(
            r#"{
                "claudeAiOauth": {
                    "accessToken": "at-1",
                    "refreshToken": "rt-1",
                    "expiresAt": 1735000000000,
                    "scopes": ["user:profile", "user:inference"],
                    "rateLimitTier": "default_max_20x",
                    "email": "User@Example.com"
                }
            }"#,
        );

        assert_eq!(b.access_token().as_deref(), Some("at-1"));
        assert_eq!(b.refresh_token().as_deref(), Some("rt-1"));
        assert_eq!(b.expires_at_ms(), Some(1_735_000_000_000));
        assert_eq!(b.scopes(), vec!["user:profile", "user:inference"]);
        assert_eq!(b.email().as_deref(), Some("user@example.com"));
        assert_eq!(b.plan(), Some(PlanTag::Max20x));
        assert!(b.is_usable());
    }

    #[test]
    fn test_unknown_fields_survive_reserialization() {
        let b = blob(
            r#"{
                "mystery": {"nested": [1, 2, 3]},
                "claudeAiOauth": {"accessToken": "at", "vendorHint": true}
            }"#,
        );
        let bytes = b.to_bytes().unwrap();
        let round = CredentialBlob::from_slice(&bytes).unwrap();
        assert_eq!(round, b);
        assert!(round.as_value().get("mystery").is_some());
        assert!(
            round.as_value()["claudeAiOauth"]
                .get("vendorHint")
                .is_some()
        );
    }

    #[test]
    fn test_sorted_key_output() {
        let b = blob(r#"{"zeta": 1, "alpha": 2, "claudeAiOauth": {"b": 1, "a": 2}}"#);
        let text = String::from_utf8(b.to_bytes().unwrap()).unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_expires_at_heuristics() {
        // Milliseconds pass through
        assert_eq!(
            blob(r#"{"claudeAiOauth": {"expiresAt": 1735000000000}}"#).expires_at_ms(),
            Some(1_735_000_000_000)
        );
        // Seconds are scaled
        assert_eq!(
            blob(r#"{"claudeAiOauth": {"expiresAt": 1735000000}}"#).expires_at_ms(),
            Some(1_735_000_000_000)
        );
        // Numeric string
        assert_eq!(
            blob(r#"{"claudeAiOauth": {"expiresAt": "1735000000"}}"#).expires_at_ms(),
            Some(1_735_000_000_000)
        );
        // ISO-8601
        assert_eq!(
            blob(r#"{"claudeAiOauth": {"expiresAt": "2024-12-24T00:26:40Z"}}"#).expires_at_ms(),
            Some(1_735_000_000_000)
        );
        // Snake-case fallback and root-level fallback
        assert_eq!(
            blob(r#"{"claudeAiOauth": {"expires_at": 1735000000}}"#).expires_at_ms(),
            Some(1_735_000_000_000)
        );
        assert_eq!(
            blob(r#"{"expiresAt": 1735000000, "claudeAiOauth": {}}"#).expires_at_ms(),
            Some(1_735_000_000_000)
        );
        // Garbage
        assert_eq!(blob(r#"{"claudeAiOauth": {"expiresAt": 0}}"#).expires_at_ms(), None);
        assert_eq!(blob(r#"{"claudeAiOauth": {"expiresAt": -5}}"#).expires_at_ms(), None);
        assert_eq!(
            blob(r#"{"claudeAiOauth": {"expiresAt": "soon"}}"#).expires_at_ms(),
            None
        );
    }

    #[test]
    fn test_scopes_space_delimited() {
        let b = blob(r#"{"claudeAiOauth": {"scopes": " user:profile  user:inference "}}"#);
        assert_eq!(b.scopes(), vec!["user:profile", "user:inference"]);
    }

    #[test]
    fn test_scopes_array_drops_empty_entries() {
        let b = blob(r#"{"claudeAiOauth": {"scopes": ["user:profile", "  ", ""]}}"#);
        assert_eq!(b.scopes(), vec!["user:profile"]);
    }

    #[test]
    fn test_email_search_order() {
        let b = blob(
            r#"{
                "email": "Root@a.io",
                "claudeAiOauth": {"email": "oauth@b.io", "accessToken": "at"}
            }"#,
        );
        assert_eq!(b.email().as_deref(), Some("root@a.io"));

        let b = blob(r#"{"account": {"email": "acct@a.io"}, "claudeAiOauth": {}}"#);
        assert_eq!(b.email().as_deref(), Some("acct@a.io"));

        let b = blob(r#"{"claudeAiOauth": {"account": {"email": "nested@a.io"}}}"#);
        assert_eq!(b.email().as_deref(), Some("nested@a.io"));
    }

    #[test]
    fn test_email_from_jwt_payload() {
        // {"email":"jwt@claims.io"} base64url-encoded as the middle segment
        let payload = URL_SAFE_NO_PAD.encode(r#"{"email":"JWT@claims.io"}"#);
        let token = format!("eyJhbGciOiJub25lIn0.{payload}.sig");
        let b = CredentialBlob::from_value(json!({
            "claudeAiOauth": {"accessToken": token}
        }))
        .unwrap();
        assert_eq!(b.email().as_deref(), Some("jwt@claims.io"));
    }

    #[test]
    fn test_email_rejects_non_address_strings() {
        let b = blob(r#"{"email": "not-an-address", "claudeAiOauth": {}}"#);
        assert_eq!(b.email(), None);
    }

    #[test]
    fn test_plan_tier_beats_subscription() {
        let b = blob(
            r#"{"claudeAiOauth": {"rateLimitTier": "default_max_5x", "subscriptionType": "pro"}}"#,
        );
        assert_eq!(b.plan(), Some(PlanTag::Max5x));

        let b = blob(r#"{"claudeAiOauth": {"subscriptionType": "Pro"}}"#);
        assert_eq!(b.plan(), Some(PlanTag::Pro));

        let b = blob(r#"{"claudeAiOauth": {"subscriptionType": "max"}}"#);
        assert_eq!(b.plan(), Some(PlanTag::Max));
    }

    #[test]
    fn test_is_team() {
        assert!(blob(r#"{"claudeAiOauth": {"isTeam": true}}"#).is_team());
        assert!(!blob(r#"{"claudeAiOauth": {"isTeam": false, "subscriptionType": "team"}}"#).is_team());
        assert!(blob(r#"{"claudeAiOauth": {"subscriptionType": "claude_team"}}"#).is_team());
        assert!(
            blob(r#"{"claudeAiOauth": {"organization": {"organization_type": "Team"}}}"#).is_team()
        );
        assert!(!blob(r#"{"claudeAiOauth": {}}"#).is_team());
    }

    #[test]
    fn test_account_id_from_email() {
        let b = blob(r#"{"email": "z@iq.io", "claudeAiOauth": {"isTeam": true}}"#);
        assert_eq!(b.account_id(), "acct_claude_team_z_iq_io");

        let b = blob(r#"{"email": "home@example.com", "claudeAiOauth": {}}"#);
        assert_eq!(b.account_id(), "acct_claude_home_example_com");
    }

    #[test]
    fn test_account_id_fallback_is_stable() {
        let a = blob(r#"{"claudeAiOauth": {"refreshToken": "rt-1"}}"#);
        let b = blob(r#"{"claudeAiOauth": {"refreshToken": "rt-1", "accessToken": "at"}}"#);
        assert_eq!(a.account_id(), b.account_id());
        assert!(a.account_id().starts_with("acct_claude_"));

        let other = blob(r#"{"claudeAiOauth": {"refreshToken": "rt-2"}}"#);
        assert_ne!(a.account_id(), other.account_id());
    }

    #[test]
    fn test_refresh_lock_id() {
        let shared_a = blob(r#"{"email": "a@x.io", "claudeAiOauth": {"refreshToken": "rt-shared"}}"#);
        let shared_b = blob(r#"{"email": "b@x.io", "claudeAiOauth": {"refreshToken": "rt-shared"}}"#);
        // Distinct accounts, identical lock key
        assert_ne!(shared_a.account_id(), shared_b.account_id());
        assert_eq!(shared_a.refresh_lock_id(), shared_b.refresh_lock_id());

        // No refresh token serializes on the account itself
        let lone = blob(r#"{"email": "c@x.io", "claudeAiOauth": {}}"#);
        assert_eq!(lone.refresh_lock_id(), lone.account_id());
    }

    #[test]
    fn test_apply_refresh_merges_payload() {
        let mut b = blob(
            r#"{
                "claudeAiOauth": {
                    "accessToken": "at-before",
                    "refreshToken": "rt-before",
                    "expiresAt": 1,
                    "subscriptionType": "pro"
                }
            }"#,
        );
        b.apply_refresh(
            &RefreshPayload {
                access_token: "at-after".to_string(),
                refresh_token: Some("rt-after".to_string()),
                expires_in: Some(3600),
                scope: Some("user:profile user:inference".to_string()),
            },
            1_000_000,
        );

        assert_eq!(b.access_token().as_deref(), Some("at-after"));
        assert_eq!(b.refresh_token().as_deref(), Some("rt-after"));
        assert_eq!(b.expires_at_ms(), None); // 4_600_000 is below the epoch floor
        assert_eq!(b.as_value()[OAUTH_KEY]["expiresAt"], json!(4_600_000));
        assert_eq!(b.scopes(), vec!["user:profile", "user:inference"]);
        // Untouched metadata survives
        assert_eq!(b.as_value()[OAUTH_KEY]["subscriptionType"], json!("pro"));
    }

    #[test]
    fn test_apply_refresh_keeps_previous_refresh_token() {
        let mut b = blob(r#"{"claudeAiOauth": {"refreshToken": "rt-keep"}}"#);
        b.apply_refresh(
            &RefreshPayload {
                access_token: "at".to_string(),
                refresh_token: None,
                expires_in: None,
                scope: None,
            },
            0,
        );
        assert_eq!(b.refresh_token().as_deref(), Some("rt-keep"));
    }

    #[test]
    fn test_fill_gaps_never_overwrites() {
        let mut file = blob(r#"{"claudeAiOauth": {"accessToken": "at-file"}}"#);
        let mirror = blob(
            r#"{
                "vendor": "keychain",
                "claudeAiOauth": {"accessToken": "at-mirror", "email": "gap@x.io"}
            }"#,
        );
        file.fill_gaps_from(&mirror);

        assert_eq!(file.access_token().as_deref(), Some("at-file"));
        assert_eq!(file.email().as_deref(), Some("gap@x.io"));
        assert_eq!(file.as_value()["vendor"], json!("keychain"));
    }

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let a = fingerprint(b"rt-shared");
        let b = fingerprint(b"rt-shared");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, fingerprint(b"rt-other"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("z@iq.io"), "z_iq_io");
        assert_eq!(slugify("--Weird..Name--"), "weird_name");
        assert_eq!(slugify("plain"), "plain");
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(CredentialBlob::from_slice(b"[1,2,3]").is_err());
        assert!(CredentialBlob::from_slice(b"not json").is_err());
    }

    #[test]
    fn test_token_material_ordering() {
        let older = TokenMaterial {
            access_token: Some("a".into()),
            refresh_token: None,
            expires_at_ms: Some(100),
        };
        let newer = TokenMaterial {
            access_token: Some("b".into()),
            refresh_token: None,
            expires_at_ms: Some(200),
        };
        assert!(older.is_strictly_older_than(&newer));
        assert!(!newer.is_strictly_older_than(&older));
    }
}
