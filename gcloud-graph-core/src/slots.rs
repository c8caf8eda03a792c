//! Typed output slots for handing a value from one step to the steps that read it.
//!
//! A producing step publishes on a `Slot<T>` and lists the slot in its
//! `publishes`; a consuming step lists it in `reads`, which makes the executor
//! order the producer first.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::contract::JobState;
use crate::error::JobStateError;

pub struct Slot<T> {
    pub name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> Slot<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Slot<T> {
    pub async fn publish(&self, state: &dyn JobState, value: &T) -> Result<(), JobStateError> {
        let json = serde_json::to_value(value).map_err(|e| JobStateError::Slot {
            slot: self.name.to_string(),
            message: e.to_string(),
        })?;
        state.set_slot(self.name, json).await;
        Ok(())
    }

    /// `Ok(None)` when nothing was published, e.g. the producer lacked permission.
    pub async fn read(&self, state: &dyn JobState) -> Result<Option<T>, JobStateError> {
        match state.get_slot(self.name).await {
            None => Ok(None),
            Some(json) => serde_json::from_value(json)
                .map(Some)
                .map_err(|e| JobStateError::Slot {
                    slot: self.name.to_string(),
                    message: e.to_string(),
                }),
        }
    }
}
