use crate::errors::{Result, StoreError};
use crate::kv::{K_SESSION, K_USERS, KvStore};
use crate::models::{TechStats, User, UserPatch, UserType, new_id, now};

/// What a registration form supplies; everything else starts at defaults.
#[derive(Debug, Clone)]
pub struct RegisterData {
    pub email: String,
    pub username: String,
    pub password: String,
    pub user_type: UserType,
    pub name: String,
}

/// Registered-user collection plus the single signed-in session slot.
/// Anonymous -> authenticated via `login`/`register`, back via `logout`.
pub struct AuthStore<'a> {
    kv: &'a KvStore,
}

impl<'a> AuthStore<'a> {
    pub fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }

    pub fn users(&self) -> Vec<User> {
        self.kv.get_as(K_USERS).unwrap_or_default()
    }

    fn save_users(&self, users: &[User]) -> Result<()> {
        self.kv.set_as(K_USERS, &users)
    }

    /// Writes the full collection and, when the touched user is the session
    /// user, refreshes the session blob too.
    fn save_users_syncing_session(&self, users: &[User], touched: &User) -> Result<()> {
        self.save_users(users)?;
        if let Some(current) = self.current() {
            if current.id == touched.id {
                self.kv.set_as(K_SESSION, touched)?;
            }
        }
        Ok(())
    }

    pub fn current(&self) -> Option<User> {
        self.kv.get_as(K_SESSION)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .users()
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email) && u.password == password)
            .ok_or(StoreError::InvalidCredentials)?;
        self.kv.set_as(K_SESSION, &user)?;
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        self.kv.remove(K_SESSION)
    }

    /// Appends the new user and immediately authenticates as them.
    pub fn register(&self, data: RegisterData) -> Result<User> {
        let mut users = self.users();
        if users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&data.email))
        {
            return Err(StoreError::EmailTaken(data.email));
        }
        if !self.check_username_unique(&data.username) {
            return Err(StoreError::UsernameTaken(data.username));
        }

        let user = User {
            id: new_id(),
            email: data.email,
            username: data.username,
            password: data.password,
            user_type: data.user_type,
            name: data.name,
            phone: None,
            address: None,
            bio: None,
            avatar: None,
            skills: Default::default(),
            overall_rating: 0.0,
            total_reviews: 0,
            stats: TechStats::default(),
            created_at: now(),
        };
        users.push(user.clone());
        self.save_users(&users)?;
        self.kv.set_as(K_SESSION, &user)?;
        Ok(user)
    }

    /// Case-insensitive scan. An empty name is trivially unique so a
    /// half-filled form is not flagged.
    pub fn check_username_unique(&self, name: &str) -> bool {
        if name.is_empty() {
            return true;
        }
        !self
            .users()
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(name))
    }

    /// Merges profile fields into the signed-in user's record. A username
    /// change colliding with a different user is rejected whole.
    pub fn update_user(&self, patch: UserPatch) -> Result<User> {
        let current = self.current().ok_or(StoreError::NotSignedIn)?;
        let mut users = self.users();

        if let Some(username) = &patch.username {
            let taken = users
                .iter()
                .any(|u| u.id != current.id && u.username.eq_ignore_ascii_case(username));
            if taken {
                return Err(StoreError::UsernameTaken(username.clone()));
            }
        }

        let user = users
            .iter_mut()
            .find(|u| u.id == current.id)
            .ok_or_else(|| StoreError::not_found("user", &current.id))?;

        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(phone) = patch.phone {
            user.phone = Some(phone);
        }
        if let Some(address) = patch.address {
            user.address = Some(address);
        }
        if let Some(bio) = patch.bio {
            user.bio = Some(bio);
        }
        if let Some(avatar) = patch.avatar {
            user.avatar = Some(avatar);
        }
        if let Some(skills) = patch.skills {
            user.skills = skills;
        }

        let updated = user.clone();
        self.save_users_syncing_session(&users, &updated)?;
        Ok(updated)
    }

    /// Merges performance stats into a technician record. The closing rate
    /// is recomputed from the merged counters, never taken from the patch.
    pub fn update_user_stats(&self, technician_id: &str, partial: TechStats) -> Result<User> {
        let mut users = self.users();
        let user = users
            .iter_mut()
            .find(|u| u.id == technician_id)
            .ok_or_else(|| StoreError::not_found("user", technician_id))?;

        if partial.completed_jobs.is_some() {
            user.stats.completed_jobs = partial.completed_jobs;
        }
        if partial.jobs_applied_to.is_some() {
            user.stats.jobs_applied_to = partial.jobs_applied_to;
        }
        if partial.jobs_won.is_some() {
            user.stats.jobs_won = partial.jobs_won;
        }
        if let (Some(completed), Some(applied)) =
            (user.stats.completed_jobs, user.stats.jobs_applied_to)
        {
            if applied > 0 {
                user.stats.job_closing_rate = Some(f64::from(completed) / f64::from(applied) * 100.0);
            }
        }

        let updated = user.clone();
        self.save_users_syncing_session(&users, &updated)?;
        Ok(updated)
    }

    pub fn find(&self, id: &str) -> Option<User> {
        self.users().into_iter().find(|u| u.id == id)
    }

    pub fn find_by_username(&self, username: &str) -> Option<User> {
        self.users()
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    pub fn technicians(&self) -> Vec<User> {
        self.users()
            .into_iter()
            .filter(|u| u.user_type == UserType::Technician)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::testutil::temp_store;

    fn register_data(email: &str, username: &str, user_type: UserType) -> RegisterData {
        RegisterData {
            email: email.to_string(),
            username: username.to_string(),
            password: "hunter2".to_string(),
            user_type,
            name: username.to_string(),
        }
    }

    #[test]
    fn register_authenticates_immediately() {
        let (_dir, kv) = temp_store();
        let auth = AuthStore::new(&kv);
        let user = auth
            .register(register_data("a@x.com", "alice", UserType::Advertiser))
            .unwrap();
        assert_eq!(auth.current().unwrap().id, user.id);
    }

    #[test]
    fn duplicate_email_and_username_rejected() {
        let (_dir, kv) = temp_store();
        let auth = AuthStore::new(&kv);
        auth.register(register_data("a@x.com", "alice", UserType::Advertiser))
            .unwrap();

        let dup_email = auth.register(register_data("A@X.COM", "alice2", UserType::Advertiser));
        assert!(matches!(dup_email, Err(StoreError::EmailTaken(_))));

        let dup_name = auth.register(register_data("b@x.com", "ALICE", UserType::Advertiser));
        assert!(matches!(dup_name, Err(StoreError::UsernameTaken(_))));

        assert_eq!(auth.users().len(), 1);
    }

    #[test]
    fn username_uniqueness_is_case_insensitive_and_empty_is_unique() {
        let (_dir, kv) = temp_store();
        let auth = AuthStore::new(&kv);
        auth.register(register_data("a@x.com", "alice", UserType::Technician))
            .unwrap();
        assert!(!auth.check_username_unique("Alice"));
        assert!(auth.check_username_unique("bob"));
        assert!(auth.check_username_unique(""));
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let (_dir, kv) = temp_store();
        let auth = AuthStore::new(&kv);
        auth.register(register_data("a@x.com", "alice", UserType::Advertiser))
            .unwrap();
        auth.logout().unwrap();

        assert!(matches!(
            auth.login("a@x.com", "wrong"),
            Err(StoreError::InvalidCredentials)
        ));
        assert!(auth.current().is_none());

        auth.login("a@x.com", "hunter2").unwrap();
        assert_eq!(auth.current().unwrap().username, "alice");
    }

    #[test]
    fn update_user_rejects_taken_username() {
        let (_dir, kv) = temp_store();
        let auth = AuthStore::new(&kv);
        auth.register(register_data("a@x.com", "alice", UserType::Advertiser))
            .unwrap();
        auth.register(register_data("b@x.com", "bob", UserType::Technician))
            .unwrap();

        // bob is signed in
        let result = auth.update_user(UserPatch {
            username: Some("Alice".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(StoreError::UsernameTaken(_))));
        assert_eq!(auth.current().unwrap().username, "bob");
    }

    #[test]
    fn update_user_syncs_session_blob() {
        let (_dir, kv) = temp_store();
        let auth = AuthStore::new(&kv);
        auth.register(register_data("a@x.com", "alice", UserType::Advertiser))
            .unwrap();
        auth.update_user(UserPatch {
            bio: Some("third-generation plumber".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            auth.current().unwrap().bio.as_deref(),
            Some("third-generation plumber")
        );
    }

    #[test]
    fn closing_rate_is_recomputed_from_merged_counters() {
        let (_dir, kv) = temp_store();
        let auth = AuthStore::new(&kv);
        let tech = auth
            .register(register_data("t@x.com", "tech", UserType::Technician))
            .unwrap();

        auth.update_user_stats(
            &tech.id,
            TechStats {
                jobs_applied_to: Some(10),
                ..Default::default()
            },
        )
        .unwrap();
        let updated = auth
            .update_user_stats(
                &tech.id,
                TechStats {
                    completed_jobs: Some(8),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.stats.job_closing_rate, Some(80.0));
        assert_eq!(updated.stats.jobs_applied_to, Some(10));
    }
}
