//! In-memory repository.
//!
//! [`MemoryStore`] is the server half: it owns the map and the receiving end
//! of the channel and processes requests one at a time, so the map needs no
//! lock. [`MemoryRepository`] is the cloneable client half.

use super::{Record, Repository, RepositoryError, Stored};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Response<T> = oneshot::Sender<Result<T, RepositoryError>>;

#[derive(Debug)]
enum StoreRequest<T> {
    Get {
        id: String,
        respond_to: Response<Option<Stored<T>>>,
    },
    Insert {
        item: Stored<T>,
        respond_to: Response<Stored<T>>,
    },
    Update {
        item: Stored<T>,
        respond_to: Response<Stored<T>>,
    },
    Delete {
        id: String,
        respond_to: Response<bool>,
    },
    List {
        limit: Option<usize>,
        respond_to: Response<Vec<Stored<T>>>,
    },
}

/// The task that owns the records.
pub struct MemoryStore<T> {
    receiver: mpsc::Receiver<StoreRequest<T>>,
    records: BTreeMap<String, T>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new(buffer_size: usize) -> (Self, MemoryRepository<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let store = Self {
            receiver,
            records: BTreeMap::new(),
        };
        (store, MemoryRepository { sender })
    }

    /// Processes requests until every client is dropped.
    pub async fn run(mut self) {
        let record_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(record_type, "Store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::Get { id, respond_to } => {
                    let item = self.records.get(&id).cloned().map(|data| Stored { id: id.clone(), data });
                    debug!(record_type, %id, found = item.is_some(), "Get");
                    let _ = respond_to.send(Ok(item));
                }
                StoreRequest::Insert { item, respond_to } => {
                    if self.records.contains_key(&item.id) {
                        warn!(record_type, id = %item.id, "Already exists");
                        let _ = respond_to.send(Err(RepositoryError::AlreadyExists(item.id)));
                        continue;
                    }
                    self.records.insert(item.id.clone(), item.data.clone());
                    info!(record_type, id = %item.id, size = self.records.len(), "Inserted");
                    let _ = respond_to.send(Ok(item));
                }
                StoreRequest::Update { item, respond_to } => match self.records.get_mut(&item.id) {
                    Some(data) => {
                        *data = item.data.clone();
                        info!(record_type, id = %item.id, "Updated");
                        let _ = respond_to.send(Ok(item));
                    }
                    None => {
                        warn!(record_type, id = %item.id, "Not found");
                        let _ = respond_to.send(Err(RepositoryError::NotFound(item.id)));
                    }
                },
                StoreRequest::Delete { id, respond_to } => {
                    let removed = self.records.remove(&id).is_some();
                    debug!(record_type, %id, removed, size = self.records.len(), "Delete");
                    let _ = respond_to.send(Ok(removed));
                }
                StoreRequest::List { limit, respond_to } => {
                    let items = self
                        .records
                        .iter()
                        .take(limit.unwrap_or(usize::MAX))
                        .map(|(id, data)| Stored {
                            id: id.clone(),
                            data: data.clone(),
                        })
                        .collect();
                    let _ = respond_to.send(Ok(items));
                }
            }
        }

        info!(record_type, size = self.records.len(), "Shutdown");
    }
}

/// Client for a [`MemoryStore`].
pub struct MemoryRepository<T> {
    sender: mpsc::Sender<StoreRequest<T>>,
}

impl<T> Clone for MemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: Record> MemoryRepository<T> {
    /// Starts a store task and returns its client.
    pub fn spawn(buffer_size: usize) -> Self {
        let (store, repository) = MemoryStore::new(buffer_size);
        tokio::spawn(store.run());
        repository
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(Response<R>) -> StoreRequest<T>,
    ) -> Result<R, RepositoryError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| RepositoryError::Closed)?;
        response.await.map_err(|_| RepositoryError::Dropped)?
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn get(&self, id: &str) -> Result<Option<Stored<T>>, RepositoryError> {
        let id = id.to_string();
        self.request(|respond_to| StoreRequest::Get { id, respond_to }).await
    }

    async fn insert(&self, id: String, data: T) -> Result<Stored<T>, RepositoryError> {
        let item = Stored { id, data };
        self.request(|respond_to| StoreRequest::Insert { item, respond_to }).await
    }

    async fn update(&self, item: Stored<T>) -> Result<Stored<T>, RepositoryError> {
        self.request(|respond_to| StoreRequest::Update { item, respond_to }).await
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let id = id.to_string();
        self.request(|respond_to| StoreRequest::Delete { id, respond_to }).await
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<Stored<T>>, RepositoryError> {
        self.request(|respond_to| StoreRequest::List { limit, respond_to }).await
    }
}
