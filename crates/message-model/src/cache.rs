// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use dashmap::DashMap;

use crate::message::{MessageType, MessageTypeId};

/// Memoizes an artifact compiled from a message type (a codec or a validator), keyed by the
/// type's identity.
///
/// Compilation runs outside any lock, so two threads may compile the same type concurrently;
/// the first one to publish wins and both use the published artifact. When a limit is set and
/// reached, new artifacts are returned without being cached.
pub struct CompiledCache<T> {
    entries: DashMap<MessageTypeId, Arc<T>>,
    limit: Option<usize>,
}

impl<T> CompiledCache<T> {
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
        }
    }

    pub fn get(&self, message_type: &MessageType) -> Option<Arc<T>> {
        self.entries
            .get(&message_type.id())
            .map(|entry| entry.value().clone())
    }

    pub fn get_or_compile<E>(
        &self,
        message_type: &MessageType,
        compile: impl FnOnce(&MessageType) -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(compiled) = self.get(message_type) {
            return Ok(compiled);
        }

        let compiled = Arc::new(compile(message_type)?);

        if self
            .limit
            .is_some_and(|limit| self.entries.len() >= limit)
        {
            tracing::debug!(
                message = message_type.name(),
                "Compile cache is full; not caching"
            );
            return Ok(compiled);
        }

        Ok(self
            .entries
            .entry(message_type.id())
            .or_insert(compiled)
            .value()
            .clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for CompiledCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn compiles_once_per_type() {
        let cache = CompiledCache::<String>::new();
        let compilations = AtomicUsize::new(0);
        let compile = |message_type: &MessageType| -> Result<String, ()> {
            compilations.fetch_add(1, Ordering::SeqCst);
            Ok(message_type.name().to_string())
        };

        let pet = MessageType::builder("Pet").build().unwrap();
        let first = cache.get_or_compile(&pet, compile).unwrap();
        let second = cache.get_or_compile(&pet, compile).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compilations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn limit_stops_caching() {
        let cache = CompiledCache::<usize>::with_limit(Some(1));

        let a = MessageType::builder("A").build().unwrap();
        let b = MessageType::builder("B").build().unwrap();

        cache.get_or_compile(&a, |_| Ok::<_, ()>(1)).unwrap();
        let compiled = cache.get_or_compile(&b, |_| Ok::<_, ()>(2)).unwrap();

        assert_eq!(*compiled, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&b).is_none());
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = CompiledCache::<usize>::new();
        let a = MessageType::builder("A").build().unwrap();

        assert!(cache.get_or_compile(&a, |_| Err("boom")).is_err());
        assert!(cache.is_empty());
    }
}
