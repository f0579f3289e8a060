//! TransactionManager: move a value between guarded resources without
//! deadlocking.
//!
//! Every transfer locks its two resources in ascending `ResourceId` order,
//! whatever the direction. Two transfers over the same pair therefore always
//! request the locks in the same order, so a circular wait cannot form.
//! Each acquisition is additionally bounded by `lock_timeout`.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::config::TransferConfig;
use crate::domain::ResourceId;
use crate::error::TxError;

/// A payload guarded by its own lock.
pub struct Resource<T> {
    id: ResourceId,
    payload: Mutex<T>,
}

impl<T> Resource<T> {
    pub fn new(id: impl Into<ResourceId>, payload: T) -> Self {
        Self {
            id: id.into(),
            payload: Mutex::new(payload),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

pub struct TransactionManager<T = String> {
    resources: BTreeMap<ResourceId, Resource<T>>,
    config: TransferConfig,
}

impl<T: Default + Send> TransactionManager<T> {
    /// Register resources once; the set never changes afterwards.
    pub fn new(
        resources: impl IntoIterator<Item = Resource<T>>,
        config: TransferConfig,
    ) -> Result<Self, TxError> {
        let mut map = BTreeMap::new();
        for resource in resources {
            let id = resource.id;
            if map.insert(id, resource).is_some() {
                return Err(TxError::DuplicateResource(id));
            }
        }
        Ok(Self {
            resources: map,
            config,
        })
    }

    /// The classic two-resource setup.
    pub fn pair(a: Resource<T>, b: Resource<T>, config: TransferConfig) -> Result<Self, TxError> {
        Self::new([a, b], config)
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.keys().copied()
    }

    /// Clear `from` and write `value` into `to`.
    ///
    /// On `LockTimeout` nothing was modified and no lock is left held.
    pub async fn transfer(&self, from: ResourceId, to: ResourceId, value: T) -> Result<(), TxError> {
        if from == to {
            return Err(TxError::SameResource(from));
        }
        let source = self.resource(from)?;
        let dest = self.resource(to)?;

        // BTreeMap order == lock order
        let (first, second) = if source.id < dest.id {
            (source, dest)
        } else {
            (dest, source)
        };

        let mut first_guard = self.lock(first).await?;
        let hold_delay = self.config.hold_delay();
        if hold_delay > Duration::ZERO {
            tokio::time::sleep(hold_delay).await;
        }
        let mut second_guard = self.lock(second).await?;

        {
            let (source_slot, dest_slot) = if first.id == from {
                (&mut *first_guard, &mut *second_guard)
            } else {
                (&mut *second_guard, &mut *first_guard)
            };
            *source_slot = T::default();
            *dest_slot = value;
        }

        // release in reverse acquisition order
        drop(second_guard);
        drop(first_guard);

        tracing::debug!(%from, %to, "transfer committed");
        Ok(())
    }

    /// Copy of a resource's payload.
    pub async fn read(&self, id: ResourceId) -> Result<T, TxError>
    where
        T: Clone,
    {
        let resource = self.resource(id)?;
        let guard = self.lock(resource).await?;
        Ok(guard.clone())
    }

    fn resource(&self, id: ResourceId) -> Result<&Resource<T>, TxError> {
        self.resources.get(&id).ok_or(TxError::UnknownResource(id))
    }

    async fn lock<'a>(&self, resource: &'a Resource<T>) -> Result<MutexGuard<'a, T>, TxError> {
        let after = self.config.lock_timeout();
        tokio::time::timeout(after, resource.payload.lock())
            .await
            .map_err(|_| {
                tracing::warn!(resource = %resource.id, ?after, "lock acquisition timed out");
                TxError::LockTimeout {
                    resource: resource.id,
                    after,
                }
            })
    }
}
