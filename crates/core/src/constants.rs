//! Constants used throughout the portal core crate.
//!
//! Collection names and document field names live here so the store-facing code and the
//! tests agree on the wire shape of every document.

/// Collection holding one profile document per account, keyed by the identity account id.
pub const USERS_COLLECTION: &str = "users";

/// Collection holding the administrator-curated diagnosis templates.
pub const TEMPLATES_COLLECTION: &str = "diagnosisTemplates";

/// Collection holding diagnosis records written by doctors.
pub const DIAGNOSES_COLLECTION: &str = "diagnoses";

/// Domain appended to an insurance number to form the identity provider login id.
pub const DEFAULT_LOGIN_DOMAIN: &str = "medportal.com";

/// Minimum password length enforced by the identity provider.
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 6;

/// Store-assigned creation timestamp field.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Store-assigned last-write timestamp field.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Field on `users` documents holding the account role.
pub const ROLE_FIELD: &str = "role";

/// Field on `diagnoses` documents referencing the patient account.
pub const PATIENT_ID_FIELD: &str = "patientId";

/// Label rendered when a record's doctor can no longer be resolved.
pub const DOCTOR_UNSPECIFIED: &str = "doctor unspecified";
