// security/src/gate.rs
//
// Every dashboard page and API call passes through the gate: no identity
// sends the caller to sign-in, a role without the page's permission sends
// them to role selection.

use std::sync::Arc;

use hms_lib::repository::users::UserRepository;
use models::medical::Role;
use models::{HospitalError, HospitalResult};
use serde::Serialize;
use tracing::{debug, warn};

use crate::roles::RolesConfig;
use crate::{AuthError, TokenService};

pub const ACCESS_DENIED_NOTICE: &str = "You do not have access to this page";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Redirect {
    SignIn,
    RoleSelection,
}

impl Redirect {
    pub fn path(&self) -> &'static str {
        match self {
            Redirect::SignIn => "/auth/signin",
            Redirect::RoleSelection => "/auth/role-selection",
        }
    }

    /// Where an auth failure should send the caller, if anywhere.
    pub fn for_error(err: &HospitalError) -> Option<Redirect> {
        match err {
            HospitalError::Unauthenticated(_) => Some(Redirect::SignIn),
            HospitalError::PermissionDenied(_) => Some(Redirect::RoleSelection),
            _ => None,
        }
    }
}

/// A signed-in account with the role read from its profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenService,
    users: UserRepository,
    roles: Arc<RolesConfig>,
}

impl AuthGate {
    pub fn new(tokens: TokenService, users: UserRepository, roles: RolesConfig) -> Self {
        AuthGate { tokens, users, roles: Arc::new(roles) }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn roles(&self) -> &RolesConfig {
        &self.roles
    }

    /// Resolves a bearer token to a session. A valid token whose account has
    /// no usable role is a permission problem, not an identity problem. A
    /// storage failure during the role lookup is returned as it is.
    pub async fn authenticate(&self, token: Option<&str>) -> HospitalResult<Session> {
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)?;
        let claims = self.tokens.validate(token)?;
        let profile = match self.users.get_profile(&claims.sub).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                debug!("No usable profile for {}", claims.sub);
                return Err(HospitalError::PermissionDenied(ACCESS_DENIED_NOTICE.to_string()));
            }
            Err(e) => {
                warn!("Role lookup for {} failed: {}", claims.sub, e);
                return Err(e);
            }
        };
        Ok(Session { uid: profile.uid, name: profile.name, email: profile.email, role: profile.role })
    }

    pub fn authorize(&self, session: &Session, permission: &str) -> HospitalResult<()> {
        if self.roles.has_permission(session.role, permission) {
            Ok(())
        } else {
            debug!(uid = %session.uid, role = %session.role, permission, "Access denied");
            Err(HospitalError::PermissionDenied(ACCESS_DENIED_NOTICE.to_string()))
        }
    }

    pub async fn require(&self, token: Option<&str>, permission: &str) -> HospitalResult<Session> {
        let session = self.authenticate(token).await?;
        self.authorize(&session, permission)?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{DASHBOARD_DOCTOR, DASHBOARD_RECEPTION, PATIENTS_WRITE};
    use async_trait::async_trait;
    use chrono::Utc;
    use hms_lib::storage_engine::{DocumentStore, InMemoryStorage, Query, QueryWatch, StorageEngineType};
    use models::medical::UserProfile;
    use models::{Collection, Document, Fields};
    use serde_json::json;
    use std::time::Duration;

    /// A store whose every call fails, as when the database is unreachable.
    struct UnreachableStore;

    fn offline<T>() -> HospitalResult<T> {
        Err(HospitalError::StorageError("database unreachable".into()))
    }

    #[async_trait]
    impl DocumentStore for UnreachableStore {
        fn engine_type(&self) -> StorageEngineType {
            StorageEngineType::InMemory
        }

        async fn add(&self, _: Collection, _: Fields) -> HospitalResult<String> {
            offline()
        }

        async fn set(&self, _: Collection, _: &str, _: Fields) -> HospitalResult<()> {
            offline()
        }

        async fn update(&self, _: Collection, _: &str, _: Fields) -> HospitalResult<()> {
            offline()
        }

        async fn delete(&self, _: Collection, _: &str) -> HospitalResult<()> {
            offline()
        }

        async fn get(&self, _: Collection, _: &str) -> HospitalResult<Option<Document>> {
            offline()
        }

        async fn query(&self, _: &Query) -> HospitalResult<Vec<Document>> {
            offline()
        }

        async fn watch(&self, _: Query) -> HospitalResult<QueryWatch> {
            offline()
        }
    }

    async fn gate_with(role: Option<Role>) -> (AuthGate, String) {
        let store = Arc::new(InMemoryStorage::default());
        let users = UserRepository::new(store.clone());
        match role {
            Some(role) => {
                let profile = UserProfile {
                    uid: "u1".into(),
                    name: "Sam".into(),
                    email: "sam@clinic.org".into(),
                    role,
                    password_hash: None,
                    created_at: Utc::now(),
                };
                users.put_profile(&profile).await.unwrap();
            }
            None => {
                let fields: Fields = json!({ "name": "Sam" }).as_object().cloned().unwrap();
                store.set(Collection::Users, "u1", fields).await.unwrap();
            }
        }
        let tokens = TokenService::new("secret", Duration::from_secs(600));
        let token = tokens.issue("u1").unwrap();
        (AuthGate::new(tokens, users, RolesConfig::builtin().unwrap()), token)
    }

    #[tokio::test]
    async fn missing_or_bad_tokens_go_to_sign_in() {
        let (gate, _) = gate_with(Some(Role::Doctor)).await;
        for token in [None, Some(""), Some("not-a-jwt")] {
            let err = gate.require(token, DASHBOARD_DOCTOR).await.unwrap_err();
            assert_eq!(Redirect::for_error(&err), Some(Redirect::SignIn));
        }
    }

    #[tokio::test]
    async fn wrong_role_goes_to_role_selection() {
        let (gate, token) = gate_with(Some(Role::Reception)).await;
        let session = gate.require(Some(&token), DASHBOARD_RECEPTION).await.unwrap();
        assert_eq!(session.role, Role::Reception);
        assert_eq!(session.name, "Sam");

        let err = gate.require(Some(&token), DASHBOARD_DOCTOR).await.unwrap_err();
        assert_eq!(Redirect::for_error(&err), Some(Redirect::RoleSelection));
        assert!(err.to_string().contains(ACCESS_DENIED_NOTICE));
    }

    #[tokio::test]
    async fn roleless_profile_is_denied() {
        let (gate, token) = gate_with(None).await;
        let err = gate.require(Some(&token), PATIENTS_WRITE).await.unwrap_err();
        assert!(matches!(err, HospitalError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn storage_failure_is_an_error_not_a_redirect() {
        let tokens = TokenService::new("secret", Duration::from_secs(600));
        let token = tokens.issue("u1").unwrap();
        let users = UserRepository::new(Arc::new(UnreachableStore));
        let gate = AuthGate::new(tokens, users, RolesConfig::builtin().unwrap());

        let err = gate.require(Some(&token), DASHBOARD_DOCTOR).await.unwrap_err();
        assert!(matches!(err, HospitalError::StorageError(_)));
        assert_eq!(Redirect::for_error(&err), None);
    }
}
