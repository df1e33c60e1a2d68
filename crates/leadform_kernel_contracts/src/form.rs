#![forbid(unsafe_code)]

use serde::{Serialize, Serializer};

use crate::{ContractViolation, SchemaVersion, Validate};

pub const FORM_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Lowercase hex SHA-256 of `johndoe@example.com`, carried by the reference defaults.
pub const REFERENCE_DEFAULT_EMAIL_HASH: &str =
    "836f82db99121b3481011f16b49dfa5fbc714a0d1b1b9f784a1ebbbf5b39577f";

pub const EMAIL_HASH_HEX_LEN: usize = 64;

/// Closed set of form keys. Wire names match the input names the form posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormField {
    Identifier,
    LastName,
    FirstName,
    Email,
    EmailHash,
    Title,
    Company,
    CountryCode,
    Currency,
    Value,
    AcxiomId,
    OracleMoatId,
    LeadId,
}

impl FormField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identifier => "li_fat_id",
            Self::LastName => "lastName",
            Self::FirstName => "firstName",
            Self::Email => "email",
            Self::EmailHash => "hashEmail",
            Self::Title => "title",
            Self::Company => "company",
            Self::CountryCode => "countryCode",
            Self::Currency => "currency",
            Self::Value => "value",
            Self::AcxiomId => "acxiomId",
            Self::OracleMoatId => "oracleMoatId",
            Self::LeadId => "leadId",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Identifier,
            Self::LastName,
            Self::FirstName,
            Self::Email,
            Self::EmailHash,
            Self::Title,
            Self::Company,
            Self::CountryCode,
            Self::Currency,
            Self::Value,
            Self::AcxiomId,
            Self::OracleMoatId,
            Self::LeadId,
        ]
    }

    /// Exact match on the wire name; form keys are case-sensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.as_str() == raw)
    }

    /// The identifier is filled by resolution and the hash is derived; neither takes user input.
    pub const fn is_user_editable(self) -> bool {
        !matches!(self, Self::Identifier | Self::EmailHash)
    }

    pub fn editable_field_names() -> Vec<&'static str> {
        Self::all()
            .iter()
            .filter(|f| f.is_user_editable())
            .map(|f| f.as_str())
            .collect()
    }
}

impl Serialize for FormField {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Opaque first-party tracking id (`li_fat_id`). Never empty once constructed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackingIdentifier(String);

impl TrackingIdentifier {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "tracking_identifier",
                reason: "must not be empty",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// The single in-memory record behind the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRecord {
    #[serde(skip)]
    pub schema_version: SchemaVersion,
    #[serde(rename = "li_fat_id")]
    pub identifier: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    #[serde(rename = "hashEmail")]
    pub email_hash: String,
    pub title: String,
    pub company: String,
    pub country_code: String,
    pub currency: String,
    pub value: String,
    pub acxiom_id: String,
    pub oracle_moat_id: String,
    pub lead_id: String,
}

impl FormRecord {
    /// Defaults the demo form ships with. The hash is precomputed for the default email.
    pub fn reference_defaults_v1() -> Self {
        Self {
            schema_version: FORM_CONTRACT_VERSION,
            identifier: String::new(),
            last_name: "Doe".to_string(),
            first_name: "John".to_string(),
            email: "johndoe@example.com".to_string(),
            email_hash: REFERENCE_DEFAULT_EMAIL_HASH.to_string(),
            title: "Engineer".to_string(),
            company: "Acme Inc".to_string(),
            country_code: "US".to_string(),
            currency: "USD".to_string(),
            value: "0.0".to_string(),
            acxiom_id: "12345678".to_string(),
            oracle_moat_id: "12345678".to_string(),
            lead_id: "12345678".to_string(),
        }
    }

    /// All fields empty. The hash stays empty until the first computation commits.
    pub fn blank_v1() -> Self {
        Self {
            schema_version: FORM_CONTRACT_VERSION,
            identifier: String::new(),
            last_name: String::new(),
            first_name: String::new(),
            email: String::new(),
            email_hash: String::new(),
            title: String::new(),
            company: String::new(),
            country_code: String::new(),
            currency: String::new(),
            value: String::new(),
            acxiom_id: String::new(),
            oracle_moat_id: String::new(),
            lead_id: String::new(),
        }
    }

    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::Identifier => &self.identifier,
            FormField::LastName => &self.last_name,
            FormField::FirstName => &self.first_name,
            FormField::Email => &self.email,
            FormField::EmailHash => &self.email_hash,
            FormField::Title => &self.title,
            FormField::Company => &self.company,
            FormField::CountryCode => &self.country_code,
            FormField::Currency => &self.currency,
            FormField::Value => &self.value,
            FormField::AcxiomId => &self.acxiom_id,
            FormField::OracleMoatId => &self.oracle_moat_id,
            FormField::LeadId => &self.lead_id,
        }
    }

    /// Replaces one field and returns the previous value.
    pub fn replace(&mut self, field: FormField, value: String) -> String {
        let slot = match field {
            FormField::Identifier => &mut self.identifier,
            FormField::LastName => &mut self.last_name,
            FormField::FirstName => &mut self.first_name,
            FormField::Email => &mut self.email,
            FormField::EmailHash => &mut self.email_hash,
            FormField::Title => &mut self.title,
            FormField::Company => &mut self.company,
            FormField::CountryCode => &mut self.country_code,
            FormField::Currency => &mut self.currency,
            FormField::Value => &mut self.value,
            FormField::AcxiomId => &mut self.acxiom_id,
            FormField::OracleMoatId => &mut self.oracle_moat_id,
            FormField::LeadId => &mut self.lead_id,
        };
        std::mem::replace(slot, value)
    }

    pub fn has_identifier(&self) -> bool {
        !self.identifier.is_empty()
    }
}

impl Validate for FormRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != FORM_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "form_record.schema_version",
                reason: "must match FORM_CONTRACT_VERSION",
            });
        }
        if !self.email_hash.is_empty() {
            validate_email_hash_hex("form_record.email_hash", &self.email_hash)?;
        }
        Ok(())
    }
}

pub fn validate_email_hash_hex(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    if value.len() != EMAIL_HASH_HEX_LEN {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be lowercase hex sha256 (64 chars)",
        });
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be lowercase hex sha256 (64 chars)",
        });
    }
    Ok(())
}
