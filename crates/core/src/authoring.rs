//! Diagnosis authoring.
//!
//! An [`AuthoringSession`] walks one doctor through writing diagnoses:
//!
//! ```text
//! Idle -> PatientChosen -> TemplateChosen -> Submitting -> PatientChosen
//!                               ^                 |
//!                               +-----------------+  (validation or persistence failure)
//! ```
//!
//! Choosing a patient starts a background refresh of that patient's resolved history. Each
//! refresh runs under its own [`LivenessToken`]; choosing another patient or closing the
//! session cancels it so a late result is never shown against the wrong patient.

use crate::cancel::LivenessToken;
use crate::catalog::CatalogService;
use crate::config::CoreConfig;
use crate::history::{DeleteHandle, HistoryService, ResolvedDiagnosis};
use crate::ids::{AccountId, DocumentId};
use crate::model::{
    encode, Account, DiagnosisRecord, DiagnosisSelection, DiagnosisTemplate, RecordBody, Role,
};
use crate::patients::PatientDirectory;
use crate::store::{Collection, DocumentStore};
use crate::validation::validate_selection;
use crate::{PortalError, PortalResult};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthoringState {
    Idle,
    PatientChosen,
    TemplateChosen,
    Submitting,
}

/// The history panel next to the authoring form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryView {
    NoPatient,
    Loading {
        patient_id: AccountId,
    },
    Loaded {
        patient_id: AccountId,
        entries: Vec<ResolvedDiagnosis>,
    },
    Failed {
        patient_id: AccountId,
        message: String,
    },
}

impl HistoryView {
    fn patient_id(&self) -> Option<&AccountId> {
        match self {
            HistoryView::NoPatient => None,
            HistoryView::Loading { patient_id }
            | HistoryView::Loaded { patient_id, .. }
            | HistoryView::Failed { patient_id, .. } => Some(patient_id),
        }
    }

    fn settle(patient_id: AccountId, result: PortalResult<Vec<ResolvedDiagnosis>>) -> Self {
        match result {
            Ok(entries) => HistoryView::Loaded {
                patient_id,
                entries,
            },
            Err(e) => {
                tracing::warn!(%patient_id, "history refresh failed: {e}");
                HistoryView::Failed {
                    patient_id,
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, HistoryView::Loading { .. })
    }

    pub fn entries(&self) -> &[ResolvedDiagnosis] {
        match self {
            HistoryView::Loaded { entries, .. } => entries,
            _ => &[],
        }
    }
}

pub struct AuthoringSession {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn DocumentStore>,
    history: HistoryService,
    doctor: Account,
    patients: Vec<Account>,
    templates: Vec<DiagnosisTemplate>,
    state: AuthoringState,
    patient: Option<Account>,
    template: Option<DiagnosisTemplate>,
    selection: DiagnosisSelection,
    history_view: Arc<watch::Sender<HistoryView>>,
    refresh: LivenessToken,
    track_history: bool,
}

impl AuthoringSession {
    /// Opens an authoring session for `doctor`, loading the patient directory and the
    /// template catalog.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Forbidden`] unless `doctor` has the doctor role
    /// - [`PortalError::Fetch`] if either list cannot be loaded
    pub async fn open(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn DocumentStore>,
        doctor: Account,
    ) -> PortalResult<Self> {
        doctor.require_role(&[Role::Doctor], "author diagnoses")?;

        let directory = PatientDirectory::new(store.clone());
        let catalog = CatalogService::new(cfg.clone(), store.clone());
        let (patients, templates) =
            futures::try_join!(directory.load_all(), catalog.load_all())?;

        let (history_view, _) = watch::channel(HistoryView::NoPatient);
        Ok(Self {
            cfg,
            history: HistoryService::new(store.clone()),
            store,
            doctor,
            patients,
            templates,
            state: AuthoringState::Idle,
            patient: None,
            template: None,
            selection: DiagnosisSelection::default(),
            history_view: Arc::new(history_view),
            refresh: LivenessToken::new(),
            track_history: true,
        })
    }

    /// Opens a session for a single submission, already in `TemplateChosen`.
    ///
    /// Only the named patient and template are read, and no history is followed: the view
    /// stays [`HistoryView::NoPatient`] and a successful submit does not re-fetch it.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Forbidden`] unless `doctor` has the doctor role
    /// - [`PortalError::NotFound`] if the patient or template does not exist
    /// - [`PortalError::Fetch`] if either read fails
    pub async fn open_for_submission(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn DocumentStore>,
        doctor: Account,
        patient_id: &AccountId,
        template_id: &DocumentId,
    ) -> PortalResult<Self> {
        doctor.require_role(&[Role::Doctor], "author diagnoses")?;

        let directory = PatientDirectory::new(store.clone());
        let catalog = CatalogService::new(cfg.clone(), store.clone());
        let (patient, template) =
            futures::try_join!(directory.get(patient_id), catalog.get(template_id))?;

        let (history_view, _) = watch::channel(HistoryView::NoPatient);
        Ok(Self {
            cfg,
            history: HistoryService::new(store.clone()),
            store,
            doctor,
            patients: vec![patient.clone()],
            templates: vec![template.clone()],
            state: AuthoringState::TemplateChosen,
            patient: Some(patient),
            template: Some(template),
            selection: DiagnosisSelection::default(),
            history_view: Arc::new(history_view),
            refresh: LivenessToken::new(),
            track_history: false,
        })
    }

    pub fn state(&self) -> AuthoringState {
        self.state
    }

    pub fn doctor(&self) -> &Account {
        &self.doctor
    }

    pub fn patients(&self) -> &[Account] {
        &self.patients
    }

    pub fn templates(&self) -> &[DiagnosisTemplate] {
        &self.templates
    }

    pub fn patient(&self) -> Option<&Account> {
        self.patient.as_ref()
    }

    pub fn template(&self) -> Option<&DiagnosisTemplate> {
        self.template.as_ref()
    }

    pub fn selection(&self) -> &DiagnosisSelection {
        &self.selection
    }

    pub fn history(&self) -> HistoryView {
        self.history_view.borrow().clone()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<HistoryView> {
        self.history_view.subscribe()
    }

    /// Waits for the current history refresh, if any, and returns the settled view.
    pub async fn settled_history(&self) -> HistoryView {
        let mut rx = self.history_view.subscribe();
        let settled = match rx.wait_for(|view| !view.is_loading()).await {
            Ok(view) => view.clone(),
            Err(_) => self.history(),
        };
        settled
    }

    /// Chooses the patient to diagnose and refreshes their history in the background.
    ///
    /// From `Idle` this moves to `PatientChosen`; otherwise the state, the chosen template and
    /// the selections are kept, so correcting the patient does not lose data entry. Must be
    /// called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`PortalError::NotFound`] if `patient_id` is not in the patient directory.
    pub fn select_patient(&mut self, patient_id: &AccountId) -> PortalResult<()> {
        let patient = self
            .patients
            .iter()
            .find(|p| &p.id == patient_id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound {
                collection: Collection::Users,
                id: patient_id.clone(),
            })?;

        self.patient = Some(patient);
        if self.state == AuthoringState::Idle {
            self.state = AuthoringState::PatientChosen;
        }
        if !self.track_history {
            return Ok(());
        }

        let token = self.restart_refresh(patient_id);
        let history = self.history.clone();
        let view = self.history_view.clone();
        let patient_id = patient_id.clone();
        tokio::spawn(async move {
            if let Some(result) = history.fetch_guarded(&patient_id, &token).await {
                apply_history(&view, patient_id, result);
            }
        });
        Ok(())
    }

    /// Chooses the template and clears all symptom, diagnostic and treatment selections.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Validation`] if no patient has been chosen yet
    /// - [`PortalError::NotFound`] if `template_id` is not in the catalog
    pub fn select_template(&mut self, template_id: &DocumentId) -> PortalResult<()> {
        if self.patient.is_none() {
            return Err(PortalError::Validation(
                "choose a patient before choosing a template".into(),
            ));
        }

        let template = self
            .templates
            .iter()
            .find(|t| &t.id == template_id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound {
                collection: Collection::DiagnosisTemplates,
                id: template_id.clone(),
            })?;

        self.template = Some(template);
        self.selection = DiagnosisSelection::default();
        self.state = AuthoringState::TemplateChosen;
        Ok(())
    }

    /// Adds or removes a symptom. Returns whether it is selected afterwards.
    pub fn toggle_symptom(&mut self, name: &str) -> PortalResult<bool> {
        let template = self.chosen_template()?;
        if !template.has_symptom(name) {
            return Err(PortalError::Validation(format!(
                "symptom {name:?} is not part of template {:?}",
                template.name()
            )));
        }
        Ok(toggle(&mut self.selection.symptoms, name))
    }

    /// Adds or removes a diagnostic method. Returns whether it is selected afterwards.
    pub fn toggle_diagnostic(&mut self, name: &str) -> PortalResult<bool> {
        let template = self.chosen_template()?;
        if !template.has_method(name) {
            return Err(PortalError::Validation(format!(
                "diagnostic method {name:?} is not part of template {:?}",
                template.name()
            )));
        }
        Ok(toggle(&mut self.selection.diagnostics, name))
    }

    /// Selects the treatment, replacing any previous choice.
    pub fn select_treatment(&mut self, name: &str) -> PortalResult<()> {
        let template = self.chosen_template()?;
        if !template.has_treatment(name) {
            return Err(PortalError::Validation(format!(
                "treatment {name:?} is not part of template {:?}",
                template.name()
            )));
        }
        self.selection.treatment = name.to_owned();
        Ok(())
    }

    /// Writes the diagnosis.
    ///
    /// On success the record is stored with this doctor as author, the patient's history is
    /// re-fetched and the session returns to `PatientChosen` with the same patient.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Validation`] if the patient, template or treatment is missing, or the
    ///   selections no longer match the stored template; nothing is written
    /// - [`PortalError::Persistence`] if the template cannot be re-read or the insert fails;
    ///   selections are kept for a retry
    pub async fn submit(&mut self) -> PortalResult<DiagnosisRecord> {
        let (patient, template) = match (&self.patient, &self.template) {
            (Some(patient), Some(template)) if !self.selection.treatment.is_empty() => {
                (patient.id.clone(), template.clone())
            }
            (None, _) => return Err(missing("a patient")),
            (_, None) => return Err(missing("a template")),
            _ => return Err(missing("a treatment")),
        };

        self.state = AuthoringState::Submitting;
        match self.write(patient.clone(), template).await {
            Ok(record) => {
                tracing::info!(
                    record_id = %record.id,
                    patient_id = %patient,
                    doctor_id = %self.doctor.id,
                    "diagnosis recorded"
                );
                self.template = None;
                self.selection = DiagnosisSelection::default();
                self.state = AuthoringState::PatientChosen;
                if self.track_history {
                    self.reload_history(&patient).await;
                }
                Ok(record)
            }
            Err(e) => {
                self.state = AuthoringState::TemplateChosen;
                Err(e)
            }
        }
    }

    async fn write(
        &self,
        patient_id: AccountId,
        template: DiagnosisTemplate,
    ) -> PortalResult<DiagnosisRecord> {
        if self.cfg.validate_selections() {
            let current = self
                .store
                .get(Collection::DiagnosisTemplates, &template.id)
                .await
                .map_err(PortalError::Persistence)?
                .ok_or_else(|| {
                    PortalError::Validation(format!(
                        "template {:?} no longer exists",
                        template.name()
                    ))
                })?;
            validate_selection(&DiagnosisTemplate::from_document(current)?, &self.selection)?;
        }

        let body = RecordBody::new(
            patient_id,
            self.doctor.id.clone(),
            template.id,
            self.selection.clone(),
        );
        let id = self
            .store
            .insert(Collection::Diagnoses, encode(&body)?)
            .await
            .map_err(PortalError::Persistence)?;
        Ok(DiagnosisRecord { id, body })
    }

    /// Deletes one of this doctor's records from the current patient's history.
    ///
    /// # Errors
    ///
    /// As [`HistoryService::delete`].
    pub async fn delete_record(&mut self, handle: DeleteHandle) -> PortalResult<()> {
        let patient_id = handle.patient_id().clone();
        let refreshed = self.history.delete(&self.doctor, handle).await?;
        // Supersede any refresh still in flight for this patient.
        self.restart_refresh(&patient_id);
        apply_history(&self.history_view, patient_id, Ok(refreshed));
        Ok(())
    }

    /// Cancels any outstanding history refresh. Later results are dropped.
    pub fn close(&mut self) {
        self.refresh.cancel();
    }

    async fn reload_history(&mut self, patient_id: &AccountId) {
        let token = self.restart_refresh(patient_id);
        if let Some(result) = self.history.fetch_guarded(patient_id, &token).await {
            apply_history(&self.history_view, patient_id.clone(), result);
        }
    }

    fn restart_refresh(&mut self, patient_id: &AccountId) -> LivenessToken {
        self.refresh.cancel();
        self.refresh = LivenessToken::new();
        self.history_view.send_replace(HistoryView::Loading {
            patient_id: patient_id.clone(),
        });
        self.refresh.clone()
    }

    fn chosen_template(&self) -> PortalResult<&DiagnosisTemplate> {
        self.template
            .as_ref()
            .ok_or_else(|| PortalError::Validation("choose a template first".into()))
    }
}

impl Drop for AuthoringSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn apply_history(
    view: &watch::Sender<HistoryView>,
    patient_id: AccountId,
    result: PortalResult<Vec<ResolvedDiagnosis>>,
) {
    view.send_if_modified(|current| {
        if current.patient_id() != Some(&patient_id) {
            return false;
        }
        *current = HistoryView::settle(patient_id, result);
        true
    });
}

fn toggle(list: &mut Vec<String>, name: &str) -> bool {
    if let Some(pos) = list.iter().position(|n| n == name) {
        list.remove(pos);
        false
    } else {
        list.push(name.to_owned());
        true
    }
}

fn missing(what: &str) -> PortalError {
    PortalError::Validation(format!("choose {what} before submitting"))
}
