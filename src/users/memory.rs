use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::Mutex;

use super::{
    error::{Operation, StorageError},
    model::{parse_id, User, UserDocument},
    repo::UserStorage,
};

/// In-process `UserStorage` with the same semantics as the MongoDB one.
#[derive(Default)]
pub struct MemoryUserStorage {
    users: Mutex<BTreeMap<ObjectId, UserDocument>>,
    round_trips: AtomicUsize,
}

impl MemoryUserStorage {
    pub fn new() -> Self {
        Self::default()
    }

    async fn store(&self) -> tokio::sync::MutexGuard<'_, BTreeMap<ObjectId, UserDocument>> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        self.users.lock().await
    }

    /// Number of times the backing map was touched.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }
}

/// Copies the non-empty fields of `from` over `into`, like `$set` with empty fields omitted.
fn apply(into: &mut UserDocument, from: UserDocument) {
    if !from.email.is_empty() {
        into.email = from.email;
    }
    if !from.username.is_empty() {
        into.username = from.username;
    }
    if !from.password_hash.is_empty() {
        into.password_hash = from.password_hash;
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn create(&self, user: &User) -> Result<String, StorageError> {
        let oid = ObjectId::new();
        let document = UserDocument {
            id: Some(oid),
            ..UserDocument::without_id(user)
        };
        self.store().await.insert(oid, document);
        Ok(oid.to_hex())
    }

    async fn find_one(&self, id: &str) -> Result<User, StorageError> {
        let oid = parse_id(Operation::FindOne, id)?;
        self.store()
            .await
            .get(&oid)
            .cloned()
            .map(User::from)
            .ok_or_else(|| StorageError::not_found(Operation::FindOne, id))
    }

    async fn find_all(&self) -> Result<Vec<User>, StorageError> {
        Ok(self.store().await.values().cloned().map(User::from).collect())
    }

    async fn update(&self, user: &User) -> Result<(), StorageError> {
        let oid = parse_id(Operation::Update, &user.id)?;
        let mut users = self.store().await;
        let stored = users
            .get_mut(&oid)
            .ok_or_else(|| StorageError::not_found(Operation::Update, &user.id))?;
        apply(stored, UserDocument::without_id(user));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let oid = parse_id(Operation::Delete, id)?;
        self.store()
            .await
            .remove(&oid)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(Operation::Delete, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::contract;

    #[tokio::test]
    async fn memory_storage_satisfies_contract() {
        contract::exercise(&MemoryUserStorage::new()).await;
    }

    #[tokio::test]
    async fn malformed_ids_never_touch_the_store() {
        let storage = MemoryUserStorage::new();
        let bad = User {
            id: "not-a-valid-id".into(),
            username: "x".into(),
            ..User::default()
        };

        assert!(storage.find_one("not-a-valid-id").await.is_err());
        assert!(storage.update(&bad).await.is_err());
        assert!(storage.delete("not-a-valid-id").await.is_err());
        assert_eq!(storage.round_trips(), 0);

        storage.find_all().await.unwrap();
        assert_eq!(storage.round_trips(), 1);
    }

    #[tokio::test]
    async fn update_keeps_fields_left_empty() {
        let storage = MemoryUserStorage::new();
        let id = storage
            .create(&User {
                email: "a@x.com".into(),
                username: "alice".into(),
                password_hash: "h1".into(),
                ..User::default()
            })
            .await
            .unwrap();

        storage
            .update(&User {
                id: id.clone(),
                username: "alicia".into(),
                ..User::default()
            })
            .await
            .unwrap();

        let found = storage.find_one(&id).await.unwrap();
        assert_eq!(found.email, "a@x.com");
        assert_eq!(found.username, "alicia");
        assert_eq!(found.password_hash, "h1");
    }

    #[tokio::test]
    async fn create_ignores_caller_supplied_id() {
        let storage = MemoryUserStorage::new();
        let taken = ObjectId::new().to_hex();
        let id = storage
            .create(&User {
                id: taken.clone(),
                username: "dora".into(),
                ..User::default()
            })
            .await
            .unwrap();
        assert_ne!(id, taken);
        assert!(storage.find_one(&taken).await.is_err());
    }
}
