//! Cookie-backed storage.
//!
//! The jar mirrors how a browser cookie store behaves: values are
//! percent-encoded, cookies are scoped to `path=/`, cookies with an
//! `expires` attribute outlive the session and cookies without one do not.
//! Every write and removal is also recorded as a `Set-Cookie` header line so
//! a host can forward them to a client.
//!
//! When opened from a jar file, persistent cookies are written back to that
//! file (one `Set-Cookie` line per cookie) after each change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{debug, warn};

use super::{Storage, StorageError, StoredEntry};

/// Characters that cannot appear raw in a cookie value.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b',')
    .add(b';')
    .add(b'\\');

/// HTTP date format used by the `expires` attribute.
const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Browsers reject cookies whose name and value exceed 4096 bytes.
const MAX_COOKIE_BYTES: usize = 4096;

/// Removal is an already-expired cookie with an empty value.
const EXPIRED_COOKIE_DATE: &str = "Thu, 01 Jan 1970 00:00:01 GMT";

#[derive(Debug, Default)]
pub struct CookieStore {
    cookies: BTreeMap<String, StoredEntry>,
    pending: Vec<String>,
    jar_path: Option<PathBuf>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the jar from a `Cookie:` request header (`a=1; b=2`).
    /// Seeded cookies are session cookies.
    pub fn from_cookie_header(header: &str) -> Self {
        let mut store = Self::new();
        for pair in header.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            store
                .cookies
                .insert(name.to_string(), StoredEntry::new(&decode_value(value), None));
        }
        store
    }

    /// Open a jar file of `Set-Cookie` lines, dropping expired cookies.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut store = Self::new();

        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                match parse_set_cookie(line) {
                    Some((name, entry)) if !entry.is_expired() => {
                        store.cookies.insert(name, entry);
                    }
                    Some(_) => {}
                    None => warn!(path = %path.display(), "Skipping malformed cookie line"),
                }
            }
        }

        debug!(path = %path.display(), cookies = store.cookies.len(), "Cookie jar opened");
        store.jar_path = Some(path);
        Ok(store)
    }

    pub fn jar_path(&self) -> Option<&Path> {
        self.jar_path.as_deref()
    }

    /// Render the live cookies as a `Cookie:` request header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(name, entry)| format!("{}={}", name, encode_value(&entry.value)))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Drain the `Set-Cookie` lines produced since the last call.
    pub fn take_set_cookies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    fn save_jar(&self) -> Result<(), StorageError> {
        let Some(ref path) = self.jar_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lines: Vec<String> = self
            .cookies
            .iter()
            .filter(|(_, entry)| entry.expires.is_some() && !entry.is_expired())
            .map(|(name, entry)| set_cookie_line(name, &entry.value, entry.expires))
            .collect();
        std::fs::write(path, lines.join("\n"))?;
        Ok(())
    }
}

impl Storage for CookieStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .cookies
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    fn set(
        &mut self,
        key: &str,
        value: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let encoded = encode_value(value);
        if key.len() + encoded.len() > MAX_COOKIE_BYTES {
            return Err(StorageError::QuotaExceeded(format!(
                "cookie {} is {} bytes, limit is {}",
                key,
                key.len() + encoded.len(),
                MAX_COOKIE_BYTES
            )));
        }

        self.pending.push(set_cookie_line(key, value, expires));
        self.cookies
            .insert(key.to_string(), StoredEntry::new(value, expires));
        self.save_jar()
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.pending
            .push(format!("{}=; path=/; expires={}", key, EXPIRED_COOKIE_DATE));
        if self.cookies.remove(key).is_some() {
            self.save_jar()?;
        }
        Ok(())
    }
}

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, COOKIE_VALUE).to_string()
}

/// Undecodable values are kept as they are.
fn decode_value(value: &str) -> String {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn format_cookie_date(at: DateTime<Utc>) -> String {
    at.format(COOKIE_DATE_FORMAT).to_string()
}

fn set_cookie_line(key: &str, value: &str, expires: Option<DateTime<Utc>>) -> String {
    match expires {
        Some(at) => format!(
            "{}={}; path=/; expires={}",
            key,
            encode_value(value),
            format_cookie_date(at)
        ),
        None => format!("{}={}; path=/", key, encode_value(value)),
    }
}

fn parse_set_cookie(line: &str) -> Option<(String, StoredEntry)> {
    let mut parts = line.split(';').map(str::trim);
    let (name, value) = parts.next()?.split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let mut expires = None;
    for attr in parts {
        if let Some((attr_name, attr_value)) = attr.split_once('=') {
            if attr_name.eq_ignore_ascii_case("expires") {
                let parsed = NaiveDateTime::parse_from_str(attr_value, COOKIE_DATE_FORMAT).ok()?;
                expires = Some(parsed.and_utc());
            }
        }
    }

    Some((name.to_string(), StoredEntry::new(&decode_value(value), expires)))
}

// ============================================================================
// Tests
// ============================================================================
