//! # MedPortal Core
//!
//! Core business logic for the MedPortal medical records portal.
//!
//! This crate contains the domain model and the services built on it:
//! - Session management against an external identity provider
//! - The administrator-curated diagnosis template catalog
//! - Diagnosis authoring for doctors
//! - Resolved diagnosis history for doctors and patients
//!
//! Persistence and identity are collaborator traits ([`DocumentStore`], [`IdentityProvider`])
//! with in-memory implementations for development and tests.
//!
//! **No API concerns**: HTTP servers and wire DTOs belong in `api-rest` and `api-shared`.

pub mod authoring;
pub mod bootstrap;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod history;
pub mod identity;
pub mod ids;
pub mod model;
pub mod patients;
pub mod routes;
pub mod session;
pub mod store;
pub mod validation;

pub use authoring::{AuthoringSession, AuthoringState, HistoryView};
pub use bootstrap::{ensure_admin, AdminProvisioning, AdminSeed};
pub use cancel::LivenessToken;
pub use catalog::{CatalogService, TemplateDraft};
pub use config::CoreConfig;
pub use error::{AuthError, PortalError, PortalResult};
pub use history::{resolve, DeleteHandle, HistoryService, ResolvedDiagnosis};
pub use identity::{IdentityError, IdentityProvider, MemoryIdentityClient, MemoryIdentityDirectory};
pub use ids::{AccountId, DocumentId};
pub use model::{
    Account, AccountProfile, DiagnosisRecord, DiagnosisSelection, DiagnosisTemplate, MethodEntry,
    RecordBody, Role, SymptomEntry, TemplateBody, TreatmentEntry,
};
pub use patients::PatientDirectory;
pub use routes::{admin_route, landing_view, RouteDecision, View};
pub use session::{Registration, Session, SessionState};
pub use store::{Collection, DocumentStore, MemoryDocumentStore, StoreError};

pub use portal_types::{InsuranceNumber, NonEmptyText, TextError};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Portal {
        cfg: Arc<CoreConfig>,
        directory: Arc<MemoryIdentityDirectory>,
        store: Arc<MemoryDocumentStore>,
    }

    impl Portal {
        fn new() -> Self {
            Self {
                cfg: Arc::new(CoreConfig::default()),
                directory: MemoryIdentityDirectory::new(6),
                store: Arc::new(MemoryDocumentStore::new()),
            }
        }

        fn session(&self) -> Session {
            Session::new(
                self.cfg.clone(),
                Arc::new(self.directory.client()),
                self.store.clone(),
            )
        }

        async fn register(&self, number: &str, name: &str, role: Role) -> Account {
            self.session()
                .register(Registration {
                    insurance_number: InsuranceNumber::parse(number).unwrap(),
                    password: format!("{number}-password"),
                    name: NonEmptyText::new(name).unwrap(),
                    role,
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn doctor_diagnosis_is_visible_to_patient() {
        let portal = Portal::new();
        let AdminProvisioning::Created(admin) = ensure_admin(
            portal.cfg.clone(),
            Arc::new(portal.directory.client()),
            portal.store.clone(),
            AdminSeed {
                insurance_number: InsuranceNumber::parse("ADMIN").unwrap(),
                password: "admin-password".into(),
                name: NonEmptyText::new("Admin").unwrap(),
            },
        )
        .await
        .unwrap() else {
            panic!("a fresh portal has no administrator");
        };

        let doctor = portal.register("1111", "Dr Gregory", Role::Doctor).await;
        portal.register("2222", "Paula Patient", Role::Patient).await;

        let catalog = CatalogService::new(portal.cfg.clone(), portal.store.clone());
        let mut draft = TemplateDraft::new();
        draft.set_name("Flu");
        draft.add_symptom(SymptomEntry::new("Fever", ""));
        draft.add_method(MethodEntry::new("Blood test", ""));
        draft.add_treatment(TreatmentEntry::new("Rest", "", "Drink water"));
        let flu = catalog.submit(&admin, &mut draft).await.unwrap();

        let mut authoring =
            AuthoringSession::open(portal.cfg.clone(), portal.store.clone(), doctor.clone())
                .await
                .unwrap();
        let patient_id = authoring.patients()[0].id.clone();
        authoring.select_patient(&patient_id).unwrap();
        authoring.select_template(&flu.id).unwrap();
        authoring.toggle_symptom("Fever").unwrap();
        authoring.toggle_diagnostic("Blood test").unwrap();
        authoring.select_treatment("Rest").unwrap();
        let record = authoring.submit().await.unwrap();
        authoring.close();

        let patient_session = portal.session();
        let patient = patient_session
            .login(&InsuranceNumber::parse("2222").unwrap(), "2222-password")
            .await
            .unwrap();
        assert_eq!(patient.id, patient_id);
        assert_eq!(
            landing_view(&patient_session.state()),
            Some(View::PatientProfile)
        );

        let history = HistoryService::new(portal.store.clone())
            .view(&patient, &patient.id)
            .await
            .unwrap();

        assert_eq!(history.len(), 1);
        let entry = &history[0];
        assert_eq!(entry.id(), &record.id);
        assert_eq!(entry.template_name(), Some("Flu"));
        assert_eq!(entry.doctor_label(), "Dr Gregory");
        assert_eq!(entry.record.body.selected_symptoms, ["Fever"]);
        assert_eq!(entry.record.body.selected_diagnostics, ["Blood test"]);
        assert_eq!(entry.record.body.selected_treatment, "Rest");
        assert!(entry.delete_handle(&patient).is_none());
        assert!(entry.delete_handle(&doctor).is_some());
    }
}
