//! Diagnosis history.
//!
//! A patient's history is every `diagnoses` document with a matching `patientId`, each joined
//! with the template and the doctor it references. The joins are point reads issued
//! concurrently across records. A reference that is dangling or fails to load leaves that
//! field empty; only a failure of the initial scan fails the whole fetch.

use crate::cancel::LivenessToken;
use crate::constants::{DOCTOR_UNSPECIFIED, PATIENT_ID_FIELD};
use crate::ids::{AccountId, DocumentId};
use crate::model::{Account, DiagnosisRecord, DiagnosisTemplate, Role};
use crate::store::{Collection, Document, DocumentStore, FieldFilter};
use crate::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;

/// A diagnosis record with its references resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDiagnosis {
    pub record: DiagnosisRecord,
    pub template: Option<DiagnosisTemplate>,
    pub doctor: Option<Account>,
}

impl ResolvedDiagnosis {
    pub fn id(&self) -> &DocumentId {
        &self.record.id
    }

    pub fn template_name(&self) -> Option<&str> {
        self.template.as_ref().map(DiagnosisTemplate::name)
    }

    /// The doctor's name, or a placeholder when the doctor could not be resolved.
    pub fn doctor_label(&self) -> &str {
        self.doctor
            .as_ref()
            .map_or(DOCTOR_UNSPECIFIED, Account::name)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.record.body.created_at
    }

    /// A handle allowing `actor` to delete this record, if `actor` wrote it.
    pub fn delete_handle(&self, actor: &Account) -> Option<DeleteHandle> {
        DeleteHandle::for_record(&self.record, actor)
    }
}

/// Proof that the acting account authored a record.
///
/// Only obtainable through [`ResolvedDiagnosis::delete_handle`] or
/// [`HistoryService::delete_by_id`], both of which check authorship.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteHandle {
    record_id: DocumentId,
    patient_id: AccountId,
    doctor_id: AccountId,
}

impl DeleteHandle {
    fn for_record(record: &DiagnosisRecord, actor: &Account) -> Option<Self> {
        record.is_authored_by(&actor.id).then(|| Self {
            record_id: record.id.clone(),
            patient_id: record.body.patient_id.clone(),
            doctor_id: actor.id.clone(),
        })
    }

    pub fn record_id(&self) -> &DocumentId {
        &self.record_id
    }

    pub fn patient_id(&self) -> &AccountId {
        &self.patient_id
    }
}

/// Joins one record with its template and doctor.
///
/// Never fails: each reference that cannot be resolved comes back as `None`.
pub async fn resolve(store: &dyn DocumentStore, record: DiagnosisRecord) -> ResolvedDiagnosis {
    let template = point_read(
        store,
        Collection::DiagnosisTemplates,
        record.body.diagnosis_id.as_ref(),
        DiagnosisTemplate::from_document,
    );
    let doctor = point_read(
        store,
        Collection::Users,
        record.body.doctor_id.as_ref(),
        Account::from_document,
    );
    let (template, doctor) = futures::join!(template, doctor);

    ResolvedDiagnosis {
        record,
        template,
        doctor,
    }
}

async fn point_read<T>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: Option<&DocumentId>,
    decode: fn(Document) -> PortalResult<T>,
) -> Option<T> {
    let id = id?;
    match store.get(collection, id).await {
        Ok(Some(doc)) => decode(doc)
            .map_err(|e| tracing::warn!("unusable reference: {e}"))
            .ok(),
        Ok(None) => {
            tracing::warn!(%collection, %id, "dangling reference");
            None
        }
        Err(e) => {
            tracing::warn!(%collection, %id, "failed to resolve reference: {e}");
            None
        }
    }
}

#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn DocumentStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Resolved history of `patient_id`, newest first.
    ///
    /// Records without a creation time sort last. Records that do not decode are skipped.
    ///
    /// # Errors
    ///
    /// [`PortalError::Fetch`] if the `diagnoses` scan fails.
    pub async fn fetch(&self, patient_id: &AccountId) -> PortalResult<Vec<ResolvedDiagnosis>> {
        let filter = FieldFilter::eq(PATIENT_ID_FIELD, patient_id.as_str());
        let docs = self
            .store
            .query(Collection::Diagnoses, &filter)
            .await
            .map_err(PortalError::Fetch)?;

        let records = docs
            .into_iter()
            .filter_map(|doc| match DiagnosisRecord::from_document(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("skipping diagnosis record: {e}");
                    None
                }
            });

        let store = self.store.as_ref();
        let mut history = join_all(records.map(|record| resolve(store, record))).await;
        history.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(history)
    }

    /// [`fetch`](Self::fetch), discarded if `token` is cancelled before it completes.
    pub async fn fetch_guarded(
        &self,
        patient_id: &AccountId,
        token: &LivenessToken,
    ) -> Option<PortalResult<Vec<ResolvedDiagnosis>>> {
        token.guard(self.fetch(patient_id)).await
    }

    /// History as seen by `actor`.
    ///
    /// Doctors may read any patient's history; patients only their own.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Forbidden`] for anyone else
    /// - [`PortalError::Fetch`] if the scan fails
    pub async fn view(
        &self,
        actor: &Account,
        patient_id: &AccountId,
    ) -> PortalResult<Vec<ResolvedDiagnosis>> {
        let own_history = actor.role() == Role::Patient && &actor.id == patient_id;
        if !own_history {
            actor.require_role(&[Role::Doctor], "read another patient's history")?;
        }
        self.fetch(patient_id).await
    }

    /// Deletes the record behind `handle` and returns the patient's refreshed history.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Forbidden`] if `actor` is not the account the handle was issued to
    /// - [`PortalError::Persistence`] if the delete fails
    /// - [`PortalError::Fetch`] if the refresh fails
    pub async fn delete(
        &self,
        actor: &Account,
        handle: DeleteHandle,
    ) -> PortalResult<Vec<ResolvedDiagnosis>> {
        if handle.doctor_id != actor.id {
            return Err(PortalError::Forbidden(
                "only the authoring doctor may delete a diagnosis".into(),
            ));
        }

        self.store
            .delete(Collection::Diagnoses, &handle.record_id)
            .await
            .map_err(PortalError::Persistence)?;
        tracing::info!(record_id = %handle.record_id, "diagnosis deleted");

        self.fetch(&handle.patient_id).await
    }

    /// Looks up a record, checks that `actor` wrote it and deletes it.
    ///
    /// # Errors
    ///
    /// - [`PortalError::NotFound`] if the record does not exist
    /// - [`PortalError::Forbidden`] if `actor` did not write it
    /// - otherwise as [`delete`](Self::delete)
    pub async fn delete_by_id(
        &self,
        actor: &Account,
        record_id: &DocumentId,
    ) -> PortalResult<Vec<ResolvedDiagnosis>> {
        let doc = self
            .store
            .get(Collection::Diagnoses, record_id)
            .await
            .map_err(PortalError::Fetch)?
            .ok_or_else(|| PortalError::NotFound {
                collection: Collection::Diagnoses,
                id: record_id.clone(),
            })?;
        let record = DiagnosisRecord::from_document(doc)?;

        let handle = DeleteHandle::for_record(&record, actor).ok_or_else(|| {
            PortalError::Forbidden("only the authoring doctor may delete a diagnosis".into())
        })?;
        self.delete(actor, handle).await
    }
}
