// lib/src/repository/users.rs

use std::sync::Arc;

use models::medical::UserProfile;
use models::{Collection, HospitalResult};
use serde_json::Value;
use tracing::warn;

use crate::storage_engine::{DocumentStore, Query};

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        UserRepository { store }
    }

    /// E-mail addresses are stored lowercase so that sign-in can match them exactly.
    pub async fn put_profile(&self, profile: &UserProfile) -> HospitalResult<()> {
        let mut fields = profile.to_fields();
        fields.insert("email".into(), Value::String(profile.email.trim().to_lowercase()));
        self.store.set(Collection::Users, &profile.uid, fields).await
    }

    /// `None` when there is no profile or it carries no usable role.
    pub async fn get_profile(&self, uid: &str) -> HospitalResult<Option<UserProfile>> {
        let Some(doc) = self.store.get(Collection::Users, uid).await? else {
            return Ok(None);
        };
        let profile = UserProfile::try_from_document(&doc);
        if profile.is_none() {
            warn!("User {} has no recognizable role", uid);
        }
        Ok(profile)
    }

    pub async fn find_by_email(&self, email: &str) -> HospitalResult<Option<UserProfile>> {
        let q = Query::collection(Collection::Users)
            .where_eq("email", email.trim().to_lowercase())
            .limit(1);
        let docs = self.store.query(&q).await?;
        Ok(docs.first().and_then(UserProfile::try_from_document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::permissive_store;
    use chrono::Utc;
    use models::medical::Role;
    use models::Fields;
    use serde_json::json;

    #[tokio::test]
    async fn profiles_round_trip_and_roleless_users_are_hidden() {
        let store = permissive_store();
        let repo = UserRepository::new(store.clone());
        let profile = UserProfile {
            uid: "u1".into(),
            name: "Rita".into(),
            email: "Rita@Clinic.org".into(),
            role: Role::Reception,
            password_hash: Some("hash".into()),
            created_at: Utc::now(),
        };
        repo.put_profile(&profile).await.unwrap();
        let loaded = repo.find_by_email(" Rita@Clinic.org ").await.unwrap().unwrap();
        assert_eq!(loaded.uid, "u1");
        assert_eq!(loaded.password_hash.as_deref(), Some("hash"));

        let fields: Fields = json!({ "name": "Ghost" }).as_object().cloned().unwrap();
        store.set(Collection::Users, "u2", fields).await.unwrap();
        assert!(repo.get_profile("u2").await.unwrap().is_none());
        assert!(repo.get_profile("u3").await.unwrap().is_none());
    }
}
