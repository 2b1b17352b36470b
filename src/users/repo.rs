use async_trait::async_trait;
use mongodb::{
    bson::{self, doc},
    Collection, Database,
};
use tracing::{debug, trace};

use super::{
    error::{Operation, StorageError},
    model::{parse_id, User, UserDocument},
};

/// Identifier-keyed persistence for users.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Inserts `user` and returns the identifier assigned by the store.
    /// Any identifier already on `user` is ignored.
    async fn create(&self, user: &User) -> Result<String, StorageError>;
    async fn find_one(&self, id: &str) -> Result<User, StorageError>;
    /// Every stored user in the store's natural order.
    async fn find_all(&self) -> Result<Vec<User>, StorageError>;
    /// Overwrites the stored fields of `user.id` with the non-empty fields of `user`.
    async fn update(&self, user: &User) -> Result<(), StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

/// `UserStorage` backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoUserStorage {
    collection: Collection<UserDocument>,
}

impl MongoUserStorage {
    pub fn new(database: &Database, collection: &str) -> Self {
        Self {
            collection: database.collection(collection),
        }
    }
}

#[async_trait]
impl UserStorage for MongoUserStorage {
    async fn create(&self, user: &User) -> Result<String, StorageError> {
        debug!("create user");
        let result = self
            .collection
            .insert_one(UserDocument::without_id(user), None)
            .await
            .map_err(|e| StorageError::persistence(Operation::Create, None, e))?;

        debug!("convert inserted id to object id");
        match result.inserted_id.as_object_id() {
            Some(oid) => Ok(oid.to_hex()),
            None => Err(StorageError::Conversion {
                op: Operation::Create,
                inserted: result.inserted_id.to_string(),
            }),
        }
    }

    async fn find_one(&self, id: &str) -> Result<User, StorageError> {
        let oid = parse_id(Operation::FindOne, id)?;
        debug!(%id, "find user");

        let found = self
            .collection
            .find_one(doc! { "_id": oid }, None)
            .await
            .map_err(|e| StorageError::persistence(Operation::FindOne, Some(id), e))?;

        found
            .map(User::from)
            .ok_or_else(|| StorageError::not_found(Operation::FindOne, id))
    }

    async fn find_all(&self) -> Result<Vec<User>, StorageError> {
        debug!("find all users");
        let failed = |e: mongodb::error::Error| StorageError::persistence(Operation::FindAll, None, e);

        let mut cursor = self.collection.find(doc! {}, None).await.map_err(failed)?;
        let mut users = Vec::new();
        while cursor.advance().await.map_err(failed)? {
            let document = cursor.deserialize_current().map_err(failed)?;
            users.push(User::from(document));
        }
        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<(), StorageError> {
        let oid = parse_id(Operation::Update, &user.id)?;
        debug!(id = %user.id, "update user");

        // The `$set` payload is the full record minus `_id`.
        let fields = bson::to_document(&UserDocument::without_id(user))
            .map_err(|e| StorageError::persistence(Operation::Update, Some(&user.id), e))?;

        let result = self
            .collection
            .update_one(doc! { "_id": oid }, doc! { "$set": fields }, None)
            .await
            .map_err(|e| StorageError::persistence(Operation::Update, Some(&user.id), e))?;

        if result.matched_count == 0 {
            return Err(StorageError::not_found(Operation::Update, &user.id));
        }
        trace!(
            matched = result.matched_count,
            modified = result.modified_count,
            "user updated"
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let oid = parse_id(Operation::Delete, id)?;
        debug!(%id, "delete user");

        let result = self
            .collection
            .delete_one(doc! { "_id": oid }, None)
            .await
            .map_err(|e| StorageError::persistence(Operation::Delete, Some(id), e))?;

        if result.deleted_count == 0 {
            return Err(StorageError::not_found(Operation::Delete, id));
        }
        trace!(deleted = result.deleted_count, "user deleted");
        Ok(())
    }
}
