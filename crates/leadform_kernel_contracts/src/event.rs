#![forbid(unsafe_code)]

use serde::Serialize;

use crate::form::{validate_email_hash_hex, FormField, FormRecord};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const TRACKING_EVENT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingEventKind {
    FieldCommitted,
    HashCommitted,
    IdentifierResolved,
    Reset,
    Submit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerIds {
    pub acxiom_id: String,
    pub oracle_moat_id: String,
    pub lead_id: String,
}

/// Snapshot handed to tracking sinks. Carries the email hash, never the raw email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    #[serde(skip)]
    pub schema_version: SchemaVersion,
    pub sequence: u64,
    pub kind: TrackingEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_field: Option<FormField>,
    pub identifier: String,
    pub email_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub company: String,
    pub country_code: String,
    pub currency: String,
    pub value: String,
    pub partner_ids: PartnerIds,
}

impl TrackingEvent {
    pub fn from_record_v1(
        sequence: u64,
        kind: TrackingEventKind,
        changed_field: Option<FormField>,
        record: &FormRecord,
    ) -> Result<Self, ContractViolation> {
        let event = Self {
            schema_version: TRACKING_EVENT_CONTRACT_VERSION,
            sequence,
            kind,
            changed_field,
            identifier: record.identifier.clone(),
            email_hash: record.email_hash.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            title: record.title.clone(),
            company: record.company.clone(),
            country_code: record.country_code.clone(),
            currency: record.currency.clone(),
            value: record.value.clone(),
            partner_ids: PartnerIds {
                acxiom_id: record.acxiom_id.clone(),
                oracle_moat_id: record.oracle_moat_id.clone(),
                lead_id: record.lead_id.clone(),
            },
        };
        event.validate()?;
        Ok(event)
    }
}

impl Validate for TrackingEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != TRACKING_EVENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "tracking_event.schema_version",
                reason: "must match TRACKING_EVENT_CONTRACT_VERSION",
            });
        }
        if self.sequence == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "tracking_event.sequence",
                reason: "must be >= 1",
            });
        }
        if !self.email_hash.is_empty() {
            validate_email_hash_hex("tracking_event.email_hash", &self.email_hash)?;
        }
        match (self.kind, self.changed_field) {
            (TrackingEventKind::FieldCommitted, None) => Err(ContractViolation::InvalidValue {
                field: "tracking_event.changed_field",
                reason: "must be Some(...) when kind=FieldCommitted",
            }),
            (TrackingEventKind::FieldCommitted, Some(_)) | (_, None) => Ok(()),
            (_, Some(_)) => Err(ContractViolation::InvalidValue {
                field: "tracking_event.changed_field",
                reason: "must be None unless kind=FieldCommitted",
            }),
        }
    }
}
