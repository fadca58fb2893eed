/// In-memory object store for unit tests
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::store::{ObjectStore, StoreError};

type ExternalWrite<K> = Box<dyn Fn(&mut K) + Send>;

struct State<K> {
    objects: BTreeMap<String, K>,
    next_version: u64,
    pending_external_writes: usize,
    external_write: Option<ExternalWrite<K>>,
    fail_next: Option<fn() -> StoreError>,
    gets: usize,
    writes: usize,
    written: Vec<K>,
}

/// Object store holding objects in memory with versioned, conditional writes
///
/// Can simulate a concurrent writer that modifies an object between our read
/// and our write, and can be told to fail the next call.
pub struct MemoryStore<K> {
    state: Mutex<State<K>>,
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone,
{
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                objects: BTreeMap::new(),
                next_version: 1,
                pending_external_writes: 0,
                external_write: None,
                fail_next: None,
                gets: 0,
                writes: 0,
                written: Vec::new(),
            }),
        }
    }

    /// Seed an object, assigning it a fresh resource version
    pub fn with_object(self, mut obj: K) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.bump(&mut obj);
            state.objects.insert(obj.name_any(), obj);
        }
        self
    }

    /// Make another writer update the object right after each of our next `count` reads
    pub fn with_concurrent_writes(
        self,
        count: usize,
        write: impl Fn(&mut K) + Send + 'static,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.pending_external_writes = count;
            state.external_write = Some(Box::new(write));
        }
        self
    }

    /// Fail the next store call with the given error
    pub fn failing_next(self, error: fn() -> StoreError) -> Self {
        self.arm_failure(error);
        self
    }

    /// Like [`MemoryStore::failing_next`], for a store that is already in use
    pub fn arm_failure(&self, error: fn() -> StoreError) {
        self.state.lock().unwrap().fail_next = Some(error);
    }

    /// Delete an object behind the back of whoever is using the store
    pub fn remove(&self, name: &str) {
        self.state.lock().unwrap().objects.remove(name);
    }

    pub fn object(&self, name: &str) -> Option<K> {
        self.state.lock().unwrap().objects.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    pub fn gets(&self) -> usize {
        self.state.lock().unwrap().gets
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    /// Every object submitted through `replace`, in order
    pub fn written(&self) -> Vec<K> {
        self.state.lock().unwrap().written.clone()
    }
}

impl<K> State<K>
where
    K: Resource + Clone,
{
    fn bump(&mut self, obj: &mut K) {
        obj.meta_mut().resource_version = Some(format!("v{}", self.next_version));
        self.next_version += 1;
    }

    fn check_failure(&mut self) -> Result<(), StoreError> {
        match self.fail_next.take() {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Clone,
{
    async fn list(&self) -> Result<Vec<K>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_failure()?;
        Ok(state.objects.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<K, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        state.check_failure()?;

        let current = state
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        if state.pending_external_writes > 0 {
            state.pending_external_writes -= 1;
            let mut changed = current.clone();
            if let Some(write) = &state.external_write {
                write(&mut changed);
            }
            state.bump(&mut changed);
            state.objects.insert(name.to_string(), changed);
        }

        Ok(current)
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_failure()?;
        let name = obj.name_any();
        if state.objects.contains_key(&name) {
            return Err(StoreError::AlreadyExists(name));
        }
        let mut created = obj.clone();
        state.bump(&mut created);
        state.objects.insert(name, created.clone());
        Ok(created)
    }

    async fn replace(&self, name: &str, obj: &K) -> Result<K, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state.written.push(obj.clone());
        state.check_failure()?;

        let stored_version = state
            .objects
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?
            .resource_version();
        if stored_version != obj.resource_version() {
            return Err(StoreError::Conflict(name.to_string()));
        }

        let mut replaced = obj.clone();
        state.bump(&mut replaced);
        state.objects.insert(name.to_string(), replaced.clone());
        Ok(replaced)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_failure()?;
        state
            .objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}
