//! Portal documents.
//!
//! Each entity is split into a *body* (the fields stored in the document, camelCase on the
//! wire) and a typed wrapper carrying the document id. Store-managed timestamps are read back
//! where the portal needs them and ignored elsewhere.

use crate::ids::{AccountId, DocumentId};
use crate::store::{Collection, Document, Fields};
use crate::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use portal_types::{InsuranceNumber, NonEmptyText};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an account. Fixed at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(PortalError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Stored profile of an account in the `users` collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub insurance_number: InsuranceNumber,
    pub role: Role,
    pub name: NonEmptyText,
}

/// An account profile together with the identity provider account id it is keyed by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub profile: AccountProfile,
}

impl Account {
    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn name(&self) -> &str {
        self.profile.name.as_str()
    }

    pub fn from_document(doc: Document) -> PortalResult<Self> {
        let (id, profile) = decode(Collection::Users, doc)?;
        Ok(Self { id, profile })
    }

    /// Fails with [`PortalError::Forbidden`] unless this account has one of `roles`.
    pub fn require_role(&self, roles: &[Role], action: &str) -> PortalResult<()> {
        if roles.contains(&self.role()) {
            return Ok(());
        }
        Err(PortalError::Forbidden(format!(
            "{} accounts may not {action}",
            self.role()
        )))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl SymptomEntry {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl MethodEntry {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recommendations: String,
}

impl TreatmentEntry {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        recommendations: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            recommendations: recommendations.into(),
        }
    }
}

/// Body of a `diagnosisTemplates` document.
///
/// Templates written before the lists existed read back with empty lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateBody {
    pub name: String,
    #[serde(default)]
    pub icd_code: String,
    #[serde(default)]
    pub icd_link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub symptoms: Vec<SymptomEntry>,
    #[serde(default)]
    pub diagnostic_methods: Vec<MethodEntry>,
    #[serde(default)]
    pub treatments: Vec<TreatmentEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosisTemplate {
    pub id: DocumentId,
    pub body: TemplateBody,
}

impl DiagnosisTemplate {
    pub fn from_document(doc: Document) -> PortalResult<Self> {
        let (id, body) = decode(Collection::DiagnosisTemplates, doc)?;
        Ok(Self { id, body })
    }

    pub fn name(&self) -> &str {
        &self.body.name
    }

    pub fn has_symptom(&self, name: &str) -> bool {
        self.body.symptoms.iter().any(|s| s.name == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.body.diagnostic_methods.iter().any(|m| m.name == name)
    }

    pub fn has_treatment(&self, name: &str) -> bool {
        self.body.treatments.iter().any(|t| t.name == name)
    }
}

/// The doctor's picks from one template.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiagnosisSelection {
    pub symptoms: Vec<String>,
    pub diagnostics: Vec<String>,
    pub treatment: String,
}

/// Body of a `diagnoses` document.
///
/// `createdAt`/`updatedAt` are assigned by the store and are never sent on write. Records
/// stored without selection arrays read back with empty selections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBody {
    pub patient_id: AccountId,
    #[serde(default)]
    pub doctor_id: Option<AccountId>,
    #[serde(default)]
    pub diagnosis_id: Option<DocumentId>,
    #[serde(default)]
    pub selected_symptoms: Vec<String>,
    #[serde(default)]
    pub selected_diagnostics: Vec<String>,
    #[serde(default)]
    pub selected_treatment: String,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RecordBody {
    pub fn new(
        patient_id: AccountId,
        doctor_id: AccountId,
        template_id: DocumentId,
        selection: DiagnosisSelection,
    ) -> Self {
        Self {
            patient_id,
            doctor_id: Some(doctor_id),
            diagnosis_id: Some(template_id),
            selected_symptoms: selection.symptoms,
            selected_diagnostics: selection.diagnostics,
            selected_treatment: selection.treatment,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosisRecord {
    pub id: DocumentId,
    pub body: RecordBody,
}

impl DiagnosisRecord {
    pub fn from_document(doc: Document) -> PortalResult<Self> {
        let (id, body) = decode(Collection::Diagnoses, doc)?;
        Ok(Self { id, body })
    }

    /// True when `account` wrote this record.
    pub fn is_authored_by(&self, account: &AccountId) -> bool {
        self.body.doctor_id.as_ref() == Some(account)
    }
}

/// Serialises a document body into store fields.
pub fn encode<T: Serialize>(body: &T) -> PortalResult<Fields> {
    match serde_json::to_value(body).map_err(PortalError::Encoding)? {
        serde_json::Value::Object(fields) => Ok(fields),
        _ => Err(PortalError::Validation(
            "document bodies must serialise to JSON objects".into(),
        )),
    }
}

fn decode<T: DeserializeOwned>(
    collection: Collection,
    doc: Document,
) -> PortalResult<(DocumentId, T)> {
    let Document { id, fields } = doc;
    match serde_json::from_value(serde_json::Value::Object(fields)) {
        Ok(body) => Ok((id, body)),
        Err(source) => Err(PortalError::MalformedDocument {
            collection,
            id,
            source,
        }),
    }
}
