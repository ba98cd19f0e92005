//! Wire types of the REST API.
//!
//! Identifiers, roles and views travel as plain strings; the REST layer validates them
//! against the core types on the way in.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterReq {
    pub insurance_number: String,
    pub password: String,
    pub name: String,
    /// `patient` or `doctor`.
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub insurance_number: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccountRes {
    pub id: String,
    pub insurance_number: String,
    pub name: String,
    pub role: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthRes {
    pub token: String,
    pub account: AccountRes,
    pub view: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeRes {
    pub account: AccountRes,
    pub view: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SymptomDto {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MethodDto {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TreatmentDto {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recommendations: String,
}

/// A complete template body as submitted by an administrator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemplateReq {
    pub name: String,
    #[serde(default)]
    pub icd_code: String,
    #[serde(default)]
    pub icd_link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub symptoms: Vec<SymptomDto>,
    #[serde(default)]
    pub diagnostic_methods: Vec<MethodDto>,
    #[serde(default)]
    pub treatments: Vec<TreatmentDto>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemplateRes {
    pub id: String,
    pub name: String,
    pub icd_code: String,
    pub icd_link: String,
    pub description: String,
    pub symptoms: Vec<SymptomDto>,
    pub diagnostic_methods: Vec<MethodDto>,
    pub treatments: Vec<TreatmentDto>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListTemplatesRes {
    pub templates: Vec<TemplateRes>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<AccountRes>,
}

/// One submission of the authoring workflow.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitDiagnosisReq {
    pub patient_id: String,
    pub template_id: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    #[serde(default)]
    pub treatment: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubmitDiagnosisRes {
    pub id: String,
}

/// A diagnosis record with its template and doctor resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DiagnosisRes {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub template_id: Option<String>,
    /// Absent when the template was deleted or could not be read.
    pub template_name: Option<String>,
    pub doctor_name: String,
    pub selected_symptoms: Vec<String>,
    pub selected_diagnostics: Vec<String>,
    pub selected_treatment: String,
    /// RFC 3339.
    pub created_at: Option<String>,
    /// True when the caller wrote this record.
    pub can_delete: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryRes {
    pub diagnoses: Vec<DiagnosisRes>,
}
