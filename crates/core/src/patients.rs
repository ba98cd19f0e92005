//! Patient directory for doctors.

use crate::constants::ROLE_FIELD;
use crate::ids::AccountId;
use crate::model::{Account, Role};
use crate::store::{Collection, DocumentStore, FieldFilter};
use crate::{PortalError, PortalResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct PatientDirectory {
    store: Arc<dyn DocumentStore>,
}

impl PatientDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Every account with the patient role, sorted by name.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Forbidden`] unless `actor` is a doctor
    /// - [`PortalError::Fetch`] if the scan fails
    pub async fn list(&self, actor: &Account) -> PortalResult<Vec<Account>> {
        actor.require_role(&[Role::Doctor], "list patients")?;
        self.load_all().await
    }

    /// Reads one patient account. Accounts with another role count as missing.
    pub(crate) async fn get(&self, id: &AccountId) -> PortalResult<Account> {
        let missing = || PortalError::NotFound {
            collection: Collection::Users,
            id: id.clone(),
        };
        let doc = self
            .store
            .get(Collection::Users, id)
            .await
            .map_err(PortalError::Fetch)?
            .ok_or_else(missing)?;
        let account = Account::from_document(doc)?;
        if account.role() != Role::Patient {
            return Err(missing());
        }
        Ok(account)
    }

    pub(crate) async fn load_all(&self) -> PortalResult<Vec<Account>> {
        let filter = FieldFilter::eq(ROLE_FIELD, Role::Patient.as_str());
        let docs = self
            .store
            .query(Collection::Users, &filter)
            .await
            .map_err(PortalError::Fetch)?;

        let mut patients: Vec<Account> = docs
            .into_iter()
            .filter_map(|doc| match Account::from_document(doc) {
                Ok(account) => Some(account),
                Err(e) => {
                    tracing::warn!("skipping patient profile: {e}");
                    None
                }
            })
            .collect();
        patients.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(patients)
    }
}
