use crate::errors::{Result, StoreError};
use crate::kv::{KvStore, favorites_key};
use crate::models::{FavoriteList, ProSnapshot, User, UserType, new_id, now};

/// Named lists of favorited service pros, one blob per owning user. Lists
/// embed snapshots of the pro at favoriting time, so later profile edits do
/// not show up here.
pub struct FavoritesStore<'a> {
    kv: &'a KvStore,
}

impl<'a> FavoritesStore<'a> {
    pub fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }

    pub fn lists(&self, owner: &User) -> Vec<FavoriteList> {
        self.kv.get_as(&favorites_key(&owner.id)).unwrap_or_default()
    }

    fn save(&self, owner: &User, lists: &[FavoriteList]) -> Result<()> {
        self.kv.set_as(&favorites_key(&owner.id), &lists)
    }

    pub fn create_list(&self, owner: &User, name: &str) -> Result<FavoriteList> {
        let mut lists = self.lists(owner);
        if lists.iter().any(|l| l.name.eq_ignore_ascii_case(name)) {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        let list = FavoriteList {
            id: new_id(),
            name: name.to_string(),
            pros: Vec::new(),
            created_at: now(),
        };
        lists.push(list.clone());
        self.save(owner, &lists)?;
        Ok(list)
    }

    pub fn rename_list(&self, owner: &User, list_id: &str, name: &str) -> Result<()> {
        let mut lists = self.lists(owner);
        if lists
            .iter()
            .any(|l| l.id != list_id && l.name.eq_ignore_ascii_case(name))
        {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        let list = lists
            .iter_mut()
            .find(|l| l.id == list_id)
            .ok_or_else(|| StoreError::not_found("list", list_id))?;
        list.name = name.to_string();
        self.save(owner, &lists)
    }

    pub fn delete_list(&self, owner: &User, list_id: &str) -> Result<()> {
        let mut lists = self.lists(owner);
        let before = lists.len();
        lists.retain(|l| l.id != list_id);
        if lists.len() == before {
            return Err(StoreError::not_found("list", list_id));
        }
        self.save(owner, &lists)
    }

    /// Only technicians go on a list. Idempotent per pro: favoriting
    /// someone already on the list is a no-op.
    pub fn add_pro(&self, owner: &User, list_id: &str, pro: &User) -> Result<FavoriteList> {
        if pro.user_type != UserType::Technician {
            return Err(StoreError::WrongUserType {
                required: UserType::Technician,
            });
        }
        let mut lists = self.lists(owner);
        let list = lists
            .iter_mut()
            .find(|l| l.id == list_id)
            .ok_or_else(|| StoreError::not_found("list", list_id))?;
        if !list.pros.iter().any(|p| p.user_id == pro.id) {
            list.pros.push(ProSnapshot::of(pro));
        }
        let updated = list.clone();
        self.save(owner, &lists)?;
        Ok(updated)
    }

    pub fn remove_pro(&self, owner: &User, list_id: &str, pro_id: &str) -> Result<()> {
        let mut lists = self.lists(owner);
        let list = lists
            .iter_mut()
            .find(|l| l.id == list_id)
            .ok_or_else(|| StoreError::not_found("list", list_id))?;
        list.pros.retain(|p| p.user_id != pro_id);
        self.save(owner, &lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::testutil::temp_store;
    use crate::models::{TechStats, UserType};

    fn user(id: &str, user_type: UserType) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@x.com"),
            username: id.to_string(),
            password: "pw".to_string(),
            user_type,
            name: id.to_string(),
            phone: None,
            address: None,
            bio: None,
            avatar: None,
            skills: Default::default(),
            overall_rating: 4.5,
            total_reviews: 12,
            stats: TechStats::default(),
            created_at: now(),
        }
    }

    #[test]
    fn duplicate_list_name_is_rejected() {
        let (_dir, kv) = temp_store();
        let store = FavoritesStore::new(&kv);
        let owner = user("adv", UserType::Advertiser);
        store.create_list(&owner, "Plumbers").unwrap();
        assert!(matches!(
            store.create_list(&owner, "plumbers"),
            Err(StoreError::DuplicateName(_))
        ));
        assert_eq!(store.lists(&owner).len(), 1);
    }

    #[test]
    fn lists_are_per_owner() {
        let (_dir, kv) = temp_store();
        let store = FavoritesStore::new(&kv);
        let a = user("a", UserType::Advertiser);
        let b = user("b", UserType::Advertiser);
        store.create_list(&a, "Mine").unwrap();
        assert!(store.lists(&b).is_empty());
        // Same name on a different owner's blob is fine.
        store.create_list(&b, "Mine").unwrap();
    }

    #[test]
    fn snapshot_does_not_track_later_edits() {
        let (_dir, kv) = temp_store();
        let store = FavoritesStore::new(&kv);
        let owner = user("adv", UserType::Advertiser);
        let mut pro = user("tech", UserType::Technician);
        let list = store.create_list(&owner, "Electricians").unwrap();
        store.add_pro(&owner, &list.id, &pro).unwrap();

        pro.name = "renamed".to_string();
        let lists = store.lists(&owner);
        assert_eq!(lists[0].pros[0].name, "tech");
        assert_eq!(lists[0].pros[0].overall_rating, 4.5);
    }

    #[test]
    fn only_technicians_can_be_favorited() {
        let (_dir, kv) = temp_store();
        let store = FavoritesStore::new(&kv);
        let owner = user("adv", UserType::Advertiser);
        let other = user("adv2", UserType::Advertiser);
        let list = store.create_list(&owner, "Crew").unwrap();

        assert!(matches!(
            store.add_pro(&owner, &list.id, &other),
            Err(StoreError::WrongUserType { .. })
        ));
        assert!(store.lists(&owner)[0].pros.is_empty());
    }

    #[test]
    fn add_pro_is_idempotent() {
        let (_dir, kv) = temp_store();
        let store = FavoritesStore::new(&kv);
        let owner = user("adv", UserType::Advertiser);
        let pro = user("tech", UserType::Technician);
        let list = store.create_list(&owner, "Crew").unwrap();
        store.add_pro(&owner, &list.id, &pro).unwrap();
        let updated = store.add_pro(&owner, &list.id, &pro).unwrap();
        assert_eq!(updated.pros.len(), 1);

        store.remove_pro(&owner, &list.id, &pro.id).unwrap();
        assert!(store.lists(&owner)[0].pros.is_empty());
    }
}
