//! Startup provisioning of the administrator account.
//!
//! Public registration only creates patients and doctors. The administrator is created here
//! from startup configuration, once; later starts find the account and leave it alone.

use crate::config::CoreConfig;
use crate::error::AuthError;
use crate::identity::IdentityProvider;
use crate::model::{Account, Role};
use crate::session::{Registration, Session};
use crate::store::DocumentStore;
use crate::{PortalError, PortalResult};
use portal_types::{InsuranceNumber, NonEmptyText};
use std::sync::Arc;

/// Credentials and display name for the administrator account.
#[derive(Clone)]
pub struct AdminSeed {
    pub insurance_number: InsuranceNumber,
    pub password: String,
    pub name: NonEmptyText,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("insurance_number", &self.insurance_number)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AdminSeed {
    const DEFAULT_NAME: &'static str = "Administrator";

    /// Builds a seed from optional startup values.
    ///
    /// Returns `Ok(None)` when neither insurance number nor password is set. The display
    /// name defaults to `Administrator`.
    ///
    /// # Errors
    ///
    /// - [`PortalError::Validation`] if only one of insurance number and password is set
    /// - [`PortalError::InvalidText`] if the insurance number or name is invalid
    pub fn from_env_values(
        insurance_number: Option<String>,
        password: Option<String>,
        name: Option<String>,
    ) -> PortalResult<Option<Self>> {
        let present = |v: Option<String>| v.filter(|v| !v.trim().is_empty());

        match (present(insurance_number), present(password)) {
            (None, None) => Ok(None),
            (Some(number), Some(password)) => Ok(Some(Self {
                insurance_number: InsuranceNumber::parse(number)?,
                password,
                name: NonEmptyText::new(
                    present(name).unwrap_or_else(|| Self::DEFAULT_NAME.to_owned()),
                )?,
            })),
            _ => Err(PortalError::Validation(
                "administrator insurance number and password must be set together".into(),
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminProvisioning {
    Created(Account),
    AlreadyPresent(Account),
}

/// Creates the administrator account unless it already exists.
///
/// `identity` should be a dedicated client; it is signed out again before returning.
///
/// # Errors
///
/// - [`PortalError::Validation`] if the insurance number belongs to a non-admin account
/// - [`AuthError::InvalidCredentials`] if the account exists with a different password
/// - [`AuthError::ProfileMissing`] if the account exists without a profile
/// - any registration failure
pub async fn ensure_admin(
    cfg: Arc<CoreConfig>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    seed: AdminSeed,
) -> PortalResult<AdminProvisioning> {
    let session = Session::new(cfg, identity, store);
    let registration = Registration {
        insurance_number: seed.insurance_number.clone(),
        password: seed.password.clone(),
        name: seed.name,
        role: Role::Admin,
    };

    let outcome = match session.register(registration).await {
        Ok(account) => {
            tracing::info!(account_id = %account.id, "administrator account created");
            Ok(AdminProvisioning::Created(account))
        }
        Err(PortalError::Auth(AuthError::AlreadyRegistered)) => {
            match session.login(&seed.insurance_number, &seed.password).await {
                Ok(account) if account.role() == Role::Admin => {
                    tracing::info!(account_id = %account.id, "administrator account present");
                    Ok(AdminProvisioning::AlreadyPresent(account))
                }
                Ok(account) => Err(PortalError::Validation(format!(
                    "insurance number {} belongs to a {} account",
                    seed.insurance_number,
                    account.role()
                ))),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    };

    if let Err(e) = session.logout().await {
        tracing::warn!("failed to sign out provisioning client: {e}");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityDirectory;
    use crate::store::MemoryDocumentStore;

    fn seed(number: &str) -> AdminSeed {
        AdminSeed {
            insurance_number: InsuranceNumber::parse(number).unwrap(),
            password: "admin-pass".into(),
            name: NonEmptyText::new("Administrator").unwrap(),
        }
    }

    #[test]
    fn seed_from_env_values() {
        assert!(AdminSeed::from_env_values(None, None, None).unwrap().is_none());

        let seed = AdminSeed::from_env_values(Some("adm1".into()), Some("pw123456".into()), None)
            .unwrap()
            .unwrap();
        assert_eq!(seed.insurance_number.as_str(), "ADM1");
        assert_eq!(seed.name.as_str(), "Administrator");

        assert!(AdminSeed::from_env_values(Some("adm1".into()), None, None)
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn creates_once_then_finds_existing() {
        let cfg = Arc::new(CoreConfig::default());
        let directory = MemoryIdentityDirectory::new(6);
        let store = Arc::new(MemoryDocumentStore::new());

        let first = ensure_admin(
            cfg.clone(),
            Arc::new(directory.client()),
            store.clone(),
            seed("ADMIN1"),
        )
        .await
        .unwrap();
        let AdminProvisioning::Created(created) = first else {
            panic!("first run should create the administrator");
        };
        assert_eq!(created.role(), Role::Admin);

        let second = ensure_admin(cfg, Arc::new(directory.client()), store, seed("ADMIN1"))
            .await
            .unwrap();
        assert_eq!(second, AdminProvisioning::AlreadyPresent(created));
        assert_eq!(directory.account_count().await, 1);
    }

    #[tokio::test]
    async fn refuses_to_adopt_a_patient_account() {
        let cfg = Arc::new(CoreConfig::default());
        let directory = MemoryIdentityDirectory::new(6);
        let store = Arc::new(MemoryDocumentStore::new());
        Session::new(cfg.clone(), Arc::new(directory.client()), store.clone())
            .register(Registration {
                insurance_number: InsuranceNumber::parse("ADMIN1").unwrap(),
                password: "admin-pass".into(),
                name: NonEmptyText::new("Not an admin").unwrap(),
                role: Role::Patient,
            })
            .await
            .unwrap();

        let err = ensure_admin(cfg, Arc::new(directory.client()), store, seed("ADMIN1"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
