//! Diagnosis template catalog.
//!
//! Administrators curate the templates doctors diagnose from. Editing happens on a local
//! [`TemplateDraft`]; nothing reaches the store until the draft is submitted, and a submit
//! writes the whole template document at once.

use crate::config::CoreConfig;
use crate::ids::DocumentId;
use crate::model::{
    encode, Account, DiagnosisTemplate, MethodEntry, Role, SymptomEntry, TemplateBody,
    TreatmentEntry,
};
use crate::store::{Collection, DocumentStore};
use crate::{PortalError, PortalResult};
use std::sync::Arc;

/// An unsaved template, either new or loaded from an existing one for editing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateDraft {
    editing: Option<DocumentId>,
    body: TemplateBody,
}

impl TemplateDraft {
    /// An empty draft that will create a new template on submit.
    pub fn new() -> Self {
        Self::default()
    }

    /// A draft pre-filled from `template` that will overwrite it on submit.
    pub fn from_template(template: &DiagnosisTemplate) -> Self {
        Self {
            editing: Some(template.id.clone()),
            body: template.body.clone(),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn editing(&self) -> Option<&DocumentId> {
        self.editing.as_ref()
    }

    pub fn body(&self) -> &TemplateBody {
        &self.body
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.body.name = name.into();
    }

    pub fn set_icd_code(&mut self, icd_code: impl Into<String>) {
        self.body.icd_code = icd_code.into();
    }

    pub fn set_icd_link(&mut self, icd_link: impl Into<String>) {
        self.body.icd_link = icd_link.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.body.description = description.into();
    }

    /// Appends a symptom. Returns `false` and leaves the draft unchanged if the name is blank.
    pub fn add_symptom(&mut self, entry: SymptomEntry) -> bool {
        push_named(&mut self.body.symptoms, entry, |e| &e.name)
    }

    /// Appends a diagnostic method. Returns `false` if the name is blank.
    pub fn add_method(&mut self, entry: MethodEntry) -> bool {
        push_named(&mut self.body.diagnostic_methods, entry, |e| &e.name)
    }

    /// Appends a treatment. Returns `false` if the name is blank.
    pub fn add_treatment(&mut self, entry: TreatmentEntry) -> bool {
        push_named(&mut self.body.treatments, entry, |e| &e.name)
    }

    pub fn remove_symptom(&mut self, index: usize) -> Option<SymptomEntry> {
        remove_at(&mut self.body.symptoms, index)
    }

    pub fn remove_method(&mut self, index: usize) -> Option<MethodEntry> {
        remove_at(&mut self.body.diagnostic_methods, index)
    }

    pub fn remove_treatment(&mut self, index: usize) -> Option<TreatmentEntry> {
        remove_at(&mut self.body.treatments, index)
    }

    /// Discards all edits and returns to an empty create draft.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn push_named<T>(list: &mut Vec<T>, entry: T, name: impl Fn(&T) -> &String) -> bool {
    if name(&entry).trim().is_empty() {
        return false;
    }
    list.push(entry);
    true
}

fn remove_at<T>(list: &mut Vec<T>, index: usize) -> Option<T> {
    (index < list.len()).then(|| list.remove(index))
}

/// Catalog operations against the `diagnosisTemplates` collection.
#[derive(Clone)]
pub struct CatalogService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn DocumentStore>,
}

impl CatalogService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn DocumentStore>) -> Self {
        Self { cfg, store }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Lists every template in the catalog.
    ///
    /// Doctors read the catalog to pick a template; administrators to manage it. Documents
    /// that do not decode as templates are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Forbidden`] for patients
    /// - [`PortalError::Fetch`] if the collection scan fails
    pub async fn list(&self, actor: &Account) -> PortalResult<Vec<DiagnosisTemplate>> {
        actor.require_role(&[Role::Doctor, Role::Admin], "read the template catalog")?;
        self.load_all().await
    }

    pub(crate) async fn load_all(&self) -> PortalResult<Vec<DiagnosisTemplate>> {
        let docs = self
            .store
            .list(Collection::DiagnosisTemplates)
            .await
            .map_err(PortalError::Fetch)?;

        Ok(docs
            .into_iter()
            .filter_map(|doc| match DiagnosisTemplate::from_document(doc) {
                Ok(template) => Some(template),
                Err(e) => {
                    tracing::warn!("skipping template: {e}");
                    None
                }
            })
            .collect())
    }

    /// Reads one template.
    ///
    /// # Errors
    ///
    /// - [`PortalError::NotFound`] if no template has this id
    /// - [`PortalError::Fetch`] if the read fails
    pub async fn get(&self, id: &DocumentId) -> PortalResult<DiagnosisTemplate> {
        let doc = self
            .store
            .get(Collection::DiagnosisTemplates, id)
            .await
            .map_err(PortalError::Fetch)?
            .ok_or_else(|| PortalError::NotFound {
                collection: Collection::DiagnosisTemplates,
                id: id.clone(),
            })?;
        DiagnosisTemplate::from_document(doc)
    }

    /// Writes a draft to the store and resets it.
    ///
    /// A draft loaded with [`TemplateDraft::from_template`] overwrites that template; any
    /// other draft creates a new one. On failure the draft is left untouched so the
    /// administrator can retry.
    ///
    /// # Arguments
    ///
    /// * `actor` - The signed-in account. Must be an administrator.
    /// * `draft` - The draft to submit.
    ///
    /// # Returns
    ///
    /// The template as written.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Forbidden`] if `actor` is not an administrator
    /// - [`PortalError::Validation`] if the template name is blank
    /// - [`PortalError::Persistence`] if the write fails
    pub async fn submit(
        &self,
        actor: &Account,
        draft: &mut TemplateDraft,
    ) -> PortalResult<DiagnosisTemplate> {
        let template = match draft.editing() {
            Some(id) => self.replace(actor, id, draft.body().clone()).await?,
            None => self.create(actor, draft.body().clone()).await?,
        };
        draft.reset();
        Ok(template)
    }

    /// Creates a template from a complete body.
    ///
    /// # Errors
    ///
    /// As [`submit`](Self::submit).
    pub async fn create(
        &self,
        actor: &Account,
        body: TemplateBody,
    ) -> PortalResult<DiagnosisTemplate> {
        actor.require_role(&[Role::Admin], "create templates")?;
        let body = normalise(body)?;

        let id = self
            .store
            .insert(Collection::DiagnosisTemplates, encode(&body)?)
            .await
            .map_err(PortalError::Persistence)?;

        tracing::info!(template_id = %id, name = %body.name, "template created");
        Ok(DiagnosisTemplate { id, body })
    }

    /// Overwrites an existing template with `body`.
    ///
    /// # Errors
    ///
    /// As [`submit`](Self::submit), plus [`PortalError::NotFound`] if the template no longer
    /// exists.
    pub async fn replace(
        &self,
        actor: &Account,
        id: &DocumentId,
        body: TemplateBody,
    ) -> PortalResult<DiagnosisTemplate> {
        actor.require_role(&[Role::Admin], "edit templates")?;
        let body = normalise(body)?;

        let exists = self
            .store
            .get(Collection::DiagnosisTemplates, id)
            .await
            .map_err(PortalError::Fetch)?
            .is_some();
        if !exists {
            return Err(PortalError::NotFound {
                collection: Collection::DiagnosisTemplates,
                id: id.clone(),
            });
        }

        self.store
            .set(Collection::DiagnosisTemplates, id, encode(&body)?)
            .await
            .map_err(PortalError::Persistence)?;

        tracing::info!(template_id = %id, name = %body.name, "template updated");
        Ok(DiagnosisTemplate {
            id: id.clone(),
            body,
        })
    }

    /// Deletes a template.
    ///
    /// Records that reference the template are kept and will resolve without a template name.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Forbidden`] if `actor` is not an administrator
    /// - [`PortalError::Persistence`] if the delete fails
    pub async fn delete(&self, actor: &Account, id: &DocumentId) -> PortalResult<()> {
        actor.require_role(&[Role::Admin], "delete templates")?;
        self.store
            .delete(Collection::DiagnosisTemplates, id)
            .await
            .map_err(PortalError::Persistence)?;
        tracing::info!(template_id = %id, "template deleted");
        Ok(())
    }
}

fn normalise(mut body: TemplateBody) -> PortalResult<TemplateBody> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(PortalError::Validation(
            "template name cannot be empty".into(),
        ));
    }
    body.name = name.to_owned();
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountProfile;
    use crate::store::MemoryDocumentStore;
    use portal_types::{InsuranceNumber, NonEmptyText};

    fn account(role: Role) -> Account {
        Account {
            id: DocumentId::generate(),
            profile: AccountProfile {
                insurance_number: InsuranceNumber::parse("900").unwrap(),
                role,
                name: NonEmptyText::new("Staff").unwrap(),
            },
        }
    }

    fn service() -> (CatalogService, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        (
            CatalogService::new(Arc::new(CoreConfig::default()), store.clone()),
            store,
        )
    }

    fn flu_draft() -> TemplateDraft {
        let mut draft = TemplateDraft::new();
        draft.set_name("Flu");
        draft.set_icd_code("J11");
        draft.set_icd_link("https://icd.who.int/browse10/2019/en#/J11");
        draft.set_description("Influenza, virus not identified");
        assert!(draft.add_symptom(SymptomEntry::new("Fever", "")));
        assert!(draft.add_method(MethodEntry::new("Blood test", "")));
        assert!(draft.add_treatment(TreatmentEntry::new("Rest", "", "Drink water")));
        draft
    }

    #[test]
    fn blank_entries_are_ignored() {
        let mut draft = TemplateDraft::new();
        assert!(!draft.add_symptom(SymptomEntry::new("  ", "ignored")));
        assert!(!draft.add_method(MethodEntry::new("", "")));
        assert!(!draft.add_treatment(TreatmentEntry::new("", "", "")));
        assert_eq!(draft, TemplateDraft::new());
    }

    #[test]
    fn remove_by_position_keeps_order() {
        let mut draft = TemplateDraft::new();
        for name in ["Fever", "Cough", "Headache"] {
            draft.add_symptom(SymptomEntry::new(name, ""));
        }

        assert_eq!(draft.remove_symptom(1).map(|s| s.name), Some("Cough".into()));
        assert_eq!(draft.remove_symptom(5), None);
        let names: Vec<_> = draft.body().symptoms.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Fever", "Headache"]);
    }

    #[tokio::test]
    async fn submit_creates_then_resets_draft() {
        let (catalog, store) = service();
        let admin = account(Role::Admin);
        let mut draft = flu_draft();

        let created = catalog.submit(&admin, &mut draft).await.unwrap();

        assert_eq!(draft, TemplateDraft::new());
        assert_eq!(store.len(Collection::DiagnosisTemplates).await, 1);
        let stored = catalog.get(&created.id).await.unwrap();
        assert_eq!(stored.name(), "Flu");
        assert_eq!(stored.body.treatments[0].recommendations, "Drink water");
    }

    #[tokio::test]
    async fn editing_overwrites_whole_template() {
        let (catalog, store) = service();
        let admin = account(Role::Admin);
        let created = catalog.submit(&admin, &mut flu_draft()).await.unwrap();

        let mut draft = TemplateDraft::from_template(&created);
        assert!(draft.is_editing());
        draft.remove_symptom(0);
        draft.add_symptom(SymptomEntry::new("Chills", ""));
        let updated = catalog.submit(&admin, &mut draft).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(store.len(Collection::DiagnosisTemplates).await, 1);
        let stored = catalog.get(&created.id).await.unwrap();
        assert!(stored.has_symptom("Chills"));
        assert!(!stored.has_symptom("Fever"));
    }

    #[tokio::test]
    async fn blank_name_is_rejected_without_a_write() {
        let (catalog, store) = service();
        let mut draft = flu_draft();
        draft.set_name("   ");

        let err = catalog
            .submit(&account(Role::Admin), &mut draft)
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(store.write_count(), 0);
        assert_eq!(draft.body().symptoms.len(), 1);
    }

    #[tokio::test]
    async fn only_admins_write_and_patients_cannot_read() {
        let (catalog, store) = service();

        let err = catalog
            .submit(&account(Role::Doctor), &mut flu_draft())
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Forbidden(_)));
        assert_eq!(store.write_count(), 0);

        assert!(catalog.list(&account(Role::Doctor)).await.is_ok());
        assert!(matches!(
            catalog.list(&account(Role::Patient)).await,
            Err(PortalError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn replacing_a_deleted_template_is_not_found() {
        let (catalog, _) = service();
        let admin = account(Role::Admin);
        let created = catalog.submit(&admin, &mut flu_draft()).await.unwrap();
        catalog.delete(&admin, &created.id).await.unwrap();

        let err = catalog
            .replace(&admin, &created.id, created.body.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::NotFound { .. }));
        assert!(catalog.list(&admin).await.unwrap().is_empty());
    }
}
