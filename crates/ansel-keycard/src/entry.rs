//! Entry schema, canonical serialization, signing, and hashing.

use std::collections::HashMap;
use std::str::FromStr;

use ansel_crypto::{hash_bytes, sign, verify, verify_hash, CryptoString};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

use crate::EntryError;

/// Hash algorithm used when the caller does not pick one.
pub const DEFAULT_FINGERPRINT_ALGORITHM: &str = "BLAKE3-256";

const EXPIRES_FORMAT: &str = "%Y%m%d";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Longest permitted lifetime for any entry, in days.
const MAX_EXPIRATION_DAYS: i64 = 1095;

/// The two keycard owners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryType {
    Organization,
    User,
}

impl EntryType {
    fn type_name(self) -> &'static str {
        match self {
            EntryType::Organization => "Organization",
            EntryType::User => "User",
        }
    }

    fn default_lifetime_days(self) -> i64 {
        match self {
            EntryType::Organization => 365,
            EntryType::User => 90,
        }
    }
}

/// Signature and hash slots, in the order they are applied.
///
/// Adding a signature at one slot invalidates everything at or above it,
/// so the slots form levels: custody first, then the organization
/// signature, then the hash pair, then (for user entries) the owner's own
/// signature over the completed entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureSlot {
    Custody,
    Organization,
    Hashes,
    User,
}

impl SignatureSlot {
    fn name(self) -> &'static str {
        match self {
            SignatureSlot::Custody => "Custody",
            SignatureSlot::Organization => "Organization",
            SignatureSlot::Hashes => "Hashes",
            SignatureSlot::User => "User",
        }
    }
}

impl FromStr for SignatureSlot {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Custody" => Ok(SignatureSlot::Custody),
            "Organization" => Ok(SignatureSlot::Organization),
            "User" => Ok(SignatureSlot::User),
            other => Err(EntryError::UnknownSignature(other.to_string())),
        }
    }
}

#[derive(Clone, Copy)]
enum SlotKind {
    Signature,
    Hash,
}

#[derive(Clone, Copy)]
struct SigInfo {
    slot: SignatureSlot,
    level: u8,
    optional: bool,
    kind: SlotKind,
}

const ORG_FIELDS: &[&str] = &[
    "Index",
    "Name",
    "Contact-Admin",
    "Contact-Abuse",
    "Contact-Support",
    "Language",
    "Primary-Signing-Key",
    "Secondary-Signing-Key",
    "Encryption-Key",
    "Time-To-Live",
    "Expires",
    "Timestamp",
];

const ORG_REQUIRED: &[&str] = &[
    "Index",
    "Name",
    "Contact-Admin",
    "Primary-Signing-Key",
    "Encryption-Key",
    "Time-To-Live",
    "Expires",
];

const USER_FIELDS: &[&str] = &[
    "Index",
    "Workspace-ID",
    "User-ID",
    "Domain",
    "Contact-Request-Verification-Key",
    "Contact-Request-Encryption-Key",
    "Public-Encryption-Key",
    "Time-To-Live",
    "Expires",
    "Timestamp",
];

const USER_REQUIRED: &[&str] = &[
    "Index",
    "Workspace-ID",
    "Domain",
    "Contact-Request-Verification-Key",
    "Contact-Request-Encryption-Key",
    "Public-Encryption-Key",
    "Time-To-Live",
    "Expires",
];

const ORG_SIGS: &[SigInfo] = &[
    SigInfo {
        slot: SignatureSlot::Custody,
        level: 1,
        optional: true,
        kind: SlotKind::Signature,
    },
    SigInfo {
        slot: SignatureSlot::Organization,
        level: 2,
        optional: false,
        kind: SlotKind::Signature,
    },
    SigInfo {
        slot: SignatureSlot::Hashes,
        level: 3,
        optional: false,
        kind: SlotKind::Hash,
    },
];

const USER_SIGS: &[SigInfo] = &[
    SigInfo {
        slot: SignatureSlot::Custody,
        level: 1,
        optional: true,
        kind: SlotKind::Signature,
    },
    SigInfo {
        slot: SignatureSlot::Organization,
        level: 2,
        optional: false,
        kind: SlotKind::Signature,
    },
    SigInfo {
        slot: SignatureSlot::Hashes,
        level: 3,
        optional: false,
        kind: SlotKind::Hash,
    },
    SigInfo {
        slot: SignatureSlot::User,
        level: 4,
        optional: false,
        kind: SlotKind::Signature,
    },
];

/// One keycard entry, organization or user.
///
/// The canonical byte form is the CRLF-joined `Field:Value` lines in schema
/// order (empty fields skipped) followed by the signature and hash lines in
/// slot order, with no trailing CRLF. Signatures are taken over that byte
/// form, so readers must never normalize line endings.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    etype: EntryType,
    fields: HashMap<String, String>,
    signatures: HashMap<&'static str, CryptoString>,
    prev_hash: Option<CryptoString>,
    hash: Option<CryptoString>,
}

impl Entry {
    /// A fresh entry with the standard defaults: index 1, a 30-minute
    /// time-to-live, the default lifetime for its type, and a current
    /// timestamp.
    pub fn new(etype: EntryType) -> Self {
        let mut entry = Self {
            etype,
            fields: HashMap::new(),
            signatures: HashMap::new(),
            prev_hash: None,
            hash: None,
        };
        entry.fields.insert("Index".to_string(), "1".to_string());
        entry
            .fields
            .insert("Time-To-Live".to_string(), "30".to_string());
        entry.fields.insert(
            "Timestamp".to_string(),
            Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        );
        entry.set_expiration(None);
        entry
    }

    pub fn entry_type(&self) -> EntryType {
        self.etype
    }

    fn field_names(&self) -> &'static [&'static str] {
        match self.etype {
            EntryType::Organization => ORG_FIELDS,
            EntryType::User => USER_FIELDS,
        }
    }

    fn required_fields(&self) -> &'static [&'static str] {
        match self.etype {
            EntryType::Organization => ORG_REQUIRED,
            EntryType::User => USER_REQUIRED,
        }
    }

    fn sig_infos(&self) -> &'static [SigInfo] {
        match self.etype {
            EntryType::Organization => ORG_SIGS,
            EntryType::User => USER_SIGS,
        }
    }

    fn sig_info(&self, slot: SignatureSlot) -> Result<SigInfo, EntryError> {
        self.sig_infos()
            .iter()
            .find(|info| info.slot == slot)
            .copied()
            .ok_or_else(|| EntryError::UnknownSignature(slot.name().to_string()))
    }

    fn hash_level(&self) -> u8 {
        // Both schemas place the hash pair at level 3.
        self.sig_infos()
            .iter()
            .find(|info| matches!(info.kind, SlotKind::Hash))
            .map(|info| info.level)
            .unwrap_or(3)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Set a field. Editing invalidates every signature and the hash.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), EntryError> {
        if !self.field_names().contains(&name) {
            return Err(EntryError::UnknownField(name.to_string()));
        }
        self.fields.insert(name.to_string(), value.to_string());
        self.signatures.clear();
        self.hash = None;
        Ok(())
    }

    /// Set several fields at once; signatures are cleared first, exactly as
    /// for a single edit.
    pub fn set_fields(&mut self, fields: &[(&str, &str)]) -> Result<(), EntryError> {
        self.signatures.clear();
        self.hash = None;
        for (name, value) in fields {
            if !self.field_names().contains(name) {
                return Err(EntryError::UnknownField(name.to_string()));
            }
            self.fields.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn signature(&self, slot: SignatureSlot) -> Option<&CryptoString> {
        self.signatures.get(slot.name())
    }

    /// Attach an externally produced signature (parsing, or the owner's
    /// signature arriving over the wire).
    pub fn set_signature(
        &mut self,
        slot: SignatureSlot,
        signature: CryptoString,
    ) -> Result<(), EntryError> {
        let info = self.sig_info(slot)?;
        if !matches!(info.kind, SlotKind::Signature) {
            return Err(EntryError::UnknownSignature(slot.name().to_string()));
        }
        self.signatures.insert(info.slot.name(), signature);
        Ok(())
    }

    pub fn prev_hash(&self) -> Option<&CryptoString> {
        self.prev_hash.as_ref()
    }

    /// Set the chain link to the previous entry. The hash and anything
    /// above it are stale afterwards.
    pub fn set_prev_hash(&mut self, prev: CryptoString) {
        self.prev_hash = Some(prev);
        self.hash = None;
        let hash_level = self.hash_level();
        let stale: Vec<&'static str> = self
            .sig_infos()
            .iter()
            .filter(|info| info.level > hash_level)
            .map(|info| info.slot.name())
            .collect();
        for name in stale {
            self.signatures.remove(name);
        }
    }

    pub fn hash(&self) -> Option<&CryptoString> {
        self.hash.as_ref()
    }

    pub fn index(&self) -> Result<u32, EntryError> {
        self.fields
            .get("Index")
            .ok_or(EntryError::MissingField("Index"))?
            .parse()
            .map_err(|_| EntryError::InvalidValue("Index"))
    }

    /// The storage owner key: `organization`, or the workspace ID.
    pub fn owner(&self) -> Result<String, EntryError> {
        match self.etype {
            EntryType::Organization => Ok("organization".to_string()),
            EntryType::User => self
                .fields
                .get("Workspace-ID")
                .cloned()
                .ok_or(EntryError::MissingField("Workspace-ID")),
        }
    }

    /// Set the expiration date. `None` selects the default lifetime for the
    /// entry type; anything beyond three years is clamped. An edit like any
    /// other, so signatures and the hash are invalidated.
    pub fn set_expiration(&mut self, days: Option<i64>) {
        let days = days
            .unwrap_or_else(|| self.etype.default_lifetime_days())
            .clamp(1, MAX_EXPIRATION_DAYS);
        let expires = Utc::now().date_naive() + Duration::days(days);
        self.fields.insert(
            "Expires".to_string(),
            expires.format(EXPIRES_FORMAT).to_string(),
        );
        self.signatures.clear();
        self.hash = None;
    }

    /// Move this entry one step along the chain: next index, fresh
    /// timestamp, stale state cleared. Used when deriving a rotation entry
    /// from the current one.
    pub fn bump_index(&mut self) -> Result<(), EntryError> {
        let next = self.index()? + 1;
        self.fields.insert("Index".to_string(), next.to_string());
        self.fields.insert(
            "Timestamp".to_string(),
            Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        );
        self.signatures.clear();
        self.prev_hash = None;
        self.hash = None;
        Ok(())
    }

    fn byte_string(&self, siglevel: u8, include_hash_line: bool) -> Vec<u8> {
        self.text_form(siglevel, include_hash_line).into_bytes()
    }

    fn text_form(&self, siglevel: u8, include_hash_line: bool) -> String {
        let mut lines: Vec<String> =
            Vec::with_capacity(self.field_names().len() + self.sig_infos().len() + 2);
        lines.push(format!("Type:{}", self.etype.type_name()));

        for name in self.field_names() {
            if let Some(value) = self.fields.get(*name) {
                if !value.is_empty() {
                    lines.push(format!("{}:{}", name, value));
                }
            }
        }

        for info in self.sig_infos() {
            if info.level > siglevel {
                break;
            }
            match info.kind {
                SlotKind::Hash => {
                    if let Some(prev) = &self.prev_hash {
                        lines.push(format!("Previous-Hash:{}", prev));
                    }
                    if include_hash_line {
                        if let Some(hash) = &self.hash {
                            lines.push(format!("Hash:{}", hash));
                        }
                    }
                }
                SlotKind::Signature => {
                    if let Some(sig) = self.signatures.get(info.slot.name()) {
                        lines.push(format!("{}-Signature:{}", info.slot.name(), sig));
                    }
                }
            }
        }

        lines.join("\r\n")
    }

    fn max_level(&self) -> u8 {
        self.sig_infos().last().map(|info| info.level).unwrap_or(0)
    }

    /// The full canonical byte form, signatures and hash included.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.byte_string(self.max_level(), true)
    }

    /// The canonical form as text; identical bytes to [`Entry::to_bytes`].
    pub fn to_text(&self) -> String {
        self.text_form(self.max_level(), true)
    }

    /// Sign the entry at the named slot.
    ///
    /// The signed bytes are the canonical form up to the level below the
    /// slot; the slot itself and everything above it are cleared first
    /// because they are stale once this signature lands.
    pub fn sign_entry(
        &mut self,
        signing_key: &CryptoString,
        slot: SignatureSlot,
    ) -> Result<(), EntryError> {
        let info = self.sig_info(slot)?;
        if !matches!(info.kind, SlotKind::Signature) {
            return Err(EntryError::UnknownSignature(slot.name().to_string()));
        }

        let stale: Vec<SigInfo> = self
            .sig_infos()
            .iter()
            .filter(|i| i.level >= info.level)
            .copied()
            .collect();
        for i in stale {
            match i.kind {
                SlotKind::Signature => {
                    self.signatures.remove(i.slot.name());
                }
                SlotKind::Hash => self.hash = None,
            }
        }

        let data = self.byte_string(info.level - 1, true);
        let signature = sign(signing_key, &data)?;
        self.signatures.insert(info.slot.name(), signature);
        Ok(())
    }

    /// Generate the entry hash over everything below the hash slot,
    /// `Previous-Hash` included. Anything above the hash slot is cleared.
    pub fn generate_hash(&mut self, algorithm: &str) -> Result<(), EntryError> {
        let hash_level = self.hash_level();

        self.hash = None;
        let stale: Vec<&'static str> = self
            .sig_infos()
            .iter()
            .filter(|info| info.level > hash_level)
            .map(|info| info.slot.name())
            .collect();
        for name in stale {
            self.signatures.remove(name);
        }

        let data = self.byte_string(hash_level, false);
        self.hash = Some(hash_bytes(algorithm, &data)?);
        Ok(())
    }

    /// Verify one signature against the byte scope it was made over.
    pub fn verify_signature(
        &self,
        verify_key: &CryptoString,
        slot: SignatureSlot,
    ) -> Result<bool, EntryError> {
        let info = self.sig_info(slot)?;
        let signature = self
            .signatures
            .get(info.slot.name())
            .ok_or(EntryError::SignatureMissing(info.slot.name()))?;

        let data = self.byte_string(info.level - 1, true);
        Ok(verify(verify_key, &data, signature)?)
    }

    /// Recompute the fingerprint and compare it to the stored hash.
    pub fn verify_entry_hash(&self) -> Result<bool, EntryError> {
        let hash = self.hash.as_ref().ok_or(EntryError::HashMissing)?;
        let data = self.byte_string(self.hash_level(), false);
        Ok(verify_hash(hash, &data)?)
    }

    /// Required fields present and every non-optional slot filled.
    pub fn is_compliant(&self) -> bool {
        for name in self.required_fields() {
            match self.fields.get(*name) {
                Some(value) if !value.is_empty() => {}
                _ => return false,
            }
        }

        for info in self.sig_infos() {
            match info.kind {
                SlotKind::Hash => {
                    if self.hash.is_none() {
                        return false;
                    }
                }
                SlotKind::Signature => {
                    if !info.optional && !self.signatures.contains_key(info.slot.name()) {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Field-format checks that do not need any key material: a positive
    /// index, parseable dates, and an expiration after the timestamp.
    pub fn validate_data(&self) -> Result<(), EntryError> {
        if self.index()? < 1 {
            return Err(EntryError::InvalidValue("Index"));
        }

        let expires = self
            .fields
            .get("Expires")
            .ok_or(EntryError::MissingField("Expires"))?;
        let expires = NaiveDate::parse_from_str(expires, EXPIRES_FORMAT)
            .map_err(|_| EntryError::InvalidValue("Expires"))?;

        let timestamp = self
            .fields
            .get("Timestamp")
            .ok_or(EntryError::MissingField("Timestamp"))?;
        let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .map_err(|_| EntryError::InvalidValue("Timestamp"))?;

        if expires <= timestamp.date() {
            return Err(EntryError::InvalidValue("Expires"));
        }
        Ok(())
    }

    /// Parse an entry from its canonical byte form. The data must carry the
    /// expected `Type:` line.
    pub fn from_bytes(etype: EntryType, data: &[u8]) -> Result<Self, EntryError> {
        let text = std::str::from_utf8(data).map_err(|_| EntryError::BadLine(0))?;
        if text.is_empty() {
            return Err(EntryError::BadLine(0));
        }

        let mut entry = Self {
            etype,
            fields: HashMap::new(),
            signatures: HashMap::new(),
            prev_hash: None,
            hash: None,
        };

        for (linenum, raw_line) in text.split("\r\n").enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(EntryError::BadLine(linenum + 1))?;
            if value.is_empty() {
                return Err(EntryError::BadLine(linenum + 1));
            }

            if name == "Type" {
                if value != etype.type_name() {
                    return Err(EntryError::WrongType);
                }
            } else if name == "Previous-Hash" {
                entry.prev_hash = Some(value.parse()?);
            } else if name == "Hash" {
                entry.hash = Some(value.parse()?);
            } else if let Some(sig_name) = name.strip_suffix("-Signature") {
                let slot: SignatureSlot = sig_name.parse()?;
                entry.set_signature(slot, value.parse()?)?;
            } else if entry.field_names().contains(&name) {
                entry.fields.insert(name.to_string(), value.to_string());
            } else {
                return Err(EntryError::UnknownField(name.to_string()));
            }
        }

        Ok(entry)
    }
}
