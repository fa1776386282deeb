use std::any::{type_name, Any};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::FrameworkError;

/// A type-erased shared service.
pub type Service = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&Container) -> Result<Service> + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Value(Service),
    Factory(Factory),
    Singleton {
        factory: Factory,
        cell: Arc<OnceCell<Service>>,
    },
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Value(_) => "value",
            Entry::Factory(_) => "factory",
            Entry::Singleton { .. } => "singleton",
        }
    }
}

/// Insertion-ordered service registry.
///
/// All methods take `&self`; entries live behind a lock that is never held while
/// a factory runs, so factories may freely read (or register) other keys.
#[derive(Default)]
pub struct Container {
    entries: RwLock<Vec<(String, Entry)>>,
    /// Keys currently being produced, per thread, for cycle detection
    resolving: Mutex<Vec<(ThreadId, String)>>,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a plain value. Reading it never invokes anything.
    pub fn set<T: Any + Send + Sync>(&self, key: &str, value: T) {
        self.insert(key, Entry::Value(Arc::new(value)));
    }

    /// Store an already shared value, so callers keep their own handle to it.
    pub fn set_shared<T: Any + Send + Sync>(&self, key: &str, value: Arc<T>) {
        self.insert(key, Entry::Value(value));
    }

    /// Register a factory that runs on every read.
    pub fn factory<T, F>(&self, key: &str, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        self.insert(key, Entry::Factory(erase(factory)));
    }

    /// Register a factory that runs at most once; later reads share its result.
    ///
    /// A factory that fails memoizes nothing, so the next read tries again.
    pub fn singleton<T, F>(&self, key: &str, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        self.insert(
            key,
            Entry::Singleton {
                factory: erase(factory),
                cell: Arc::new(OnceCell::new()),
            },
        );
    }

    /// Read `key` as `T`, invoking its factory if it has one.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        let service = self
            .resolve(key)?
            .ok_or_else(|| FrameworkError::MissingService {
                key: key.to_string(),
            })?;
        downcast(key, service)
    }

    /// Read `key` as `T`, or return `default` when the key is absent.
    pub fn get_or<T: Any + Send + Sync>(&self, key: &str, default: Arc<T>) -> Result<Arc<T>> {
        match self.resolve(key)? {
            Some(service) => downcast(key, service),
            None => Ok(default),
        }
    }

    /// Read `key` without a type check.
    pub fn get_service(&self, key: &str) -> Result<Option<Service>> {
        self.resolve(key)
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.read_entries().iter().any(|(k, _)| k == key)
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(k, _)| k != key);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Registered keys in registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.read_entries().iter().map(|(k, _)| k.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, Vec<(String, Entry)>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, key: &str, entry: Entry) {
        debug!(key = %key, kind = entry.kind(), "Service registered");
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Overwrite keeps the original position
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = entry,
            None => entries.push((key.to_string(), entry)),
        }
    }

    fn resolve(&self, key: &str) -> Result<Option<Service>> {
        let entry = self
            .read_entries()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| entry.clone());

        match entry {
            None => Ok(None),
            Some(Entry::Value(service)) => Ok(Some(service)),
            Some(Entry::Factory(factory)) => {
                let _guard = self.enter(key)?;
                factory(self).map(Some)
            }
            Some(Entry::Singleton { factory, cell }) => {
                if let Some(service) = cell.get() {
                    return Ok(Some(Arc::clone(service)));
                }
                let _guard = self.enter(key)?;
                let service = cell.get_or_try_init(|| {
                    debug!(key = %key, "Initializing singleton");
                    factory(self)
                })?;
                Ok(Some(Arc::clone(service)))
            }
        }
    }

    fn enter(&self, key: &str) -> Result<ResolvingGuard<'_>, FrameworkError> {
        let thread = thread::current().id();
        let mut resolving = self.resolving.lock().unwrap_or_else(PoisonError::into_inner);
        if resolving.iter().any(|(t, k)| *t == thread && k == key) {
            return Err(FrameworkError::CircularDependency {
                key: key.to_string(),
            });
        }
        resolving.push((thread, key.to_string()));
        Ok(ResolvingGuard {
            container: self,
            thread,
            key: key.to_string(),
        })
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.read_entries();
        f.debug_map()
            .entries(entries.iter().map(|(k, e)| (k, e.kind())))
            .finish()
    }
}

struct ResolvingGuard<'a> {
    container: &'a Container,
    thread: ThreadId,
    key: String,
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        let mut resolving = self
            .container
            .resolving
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = resolving
            .iter()
            .rposition(|(t, k)| *t == self.thread && *k == self.key)
        {
            resolving.remove(pos);
        }
    }
}

fn erase<T, F>(factory: F) -> Factory
where
    T: Any + Send + Sync,
    F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(move |c: &Container| factory(c).map(|value| Arc::new(value) as Service))
}

fn downcast<T: Any + Send + Sync>(key: &str, service: Service) -> Result<Arc<T>> {
    service.downcast::<T>().map_err(|_| {
        FrameworkError::ServiceType {
            key: key.to_string(),
            expected: type_name::<T>(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_plain_value_is_returned_verbatim() {
        let c = Container::new();
        c.set("name", String::from("trellis"));
        assert_eq!(c.get::<String>("name").unwrap().as_str(), "trellis");
        assert!(c.has("name"));
        assert!(!c.has("other"));
    }

    #[test]
    fn test_factory_runs_on_every_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let c = Container::new();
        c.factory("tick", move |_| Ok(counter.fetch_add(1, Ordering::SeqCst)));

        assert_eq!(*c.get::<usize>("tick").unwrap(), 0);
        assert_eq!(*c.get::<usize>("tick").unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_singleton_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let c = Container::new();
        c.singleton("db", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1u8, 2, 3])
        });

        let first = c.get::<Vec<u8>>("db").unwrap();
        for _ in 0..10 {
            assert!(Arc::ptr_eq(&first, &c.get::<Vec<u8>>("db").unwrap()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_singleton_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let c = Container::new();
        c.singleton("flaky", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("not yet");
            }
            Ok(42u32)
        });

        let err = c.get::<u32>("flaky").unwrap_err();
        assert_eq!(err.to_string(), "not yet");
        assert_eq!(*c.get::<u32>("flaky").unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_factory_reads_dependencies() {
        let c = Container::new();
        c.set("base", 20u32);
        c.factory("derived", |c| Ok(*c.get::<u32>("base")? + 1));
        assert_eq!(*c.get::<u32>("derived").unwrap(), 21);
    }

    #[test]
    fn test_missing_and_mistyped_keys() {
        let c = Container::new();
        c.set("n", 1u32);

        let missing = c.get::<u32>("absent").unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<FrameworkError>(),
            Some(FrameworkError::MissingService { .. })
        ));

        let mistyped = c.get::<String>("n").unwrap_err();
        assert!(matches!(
            mistyped.downcast_ref::<FrameworkError>(),
            Some(FrameworkError::ServiceType { .. })
        ));
    }

    #[test]
    fn test_get_or_returns_default_when_absent() {
        let c = Container::new();
        let value = c.get_or("port", Arc::new(8080u16)).unwrap();
        assert_eq!(*value, 8080);
        c.set("port", 9090u16);
        assert_eq!(*c.get_or("port", Arc::new(8080u16)).unwrap(), 9090);
    }

    #[test]
    fn test_self_referencing_singleton_is_a_cycle() {
        let c = Container::new();
        c.singleton("a", |c| Ok(*c.get::<u32>("b")? + 1));
        c.singleton("b", |c| Ok(*c.get::<u32>("a")? + 1));

        let err = c.get::<u32>("a").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FrameworkError>(),
            Some(FrameworkError::CircularDependency { .. })
        ));
        // Guards were released, so an unrelated read still works
        c.set("c", 3u32);
        assert_eq!(*c.get::<u32>("c").unwrap(), 3);
    }

    #[test]
    fn test_overwrite_remove_clear_and_order() {
        let c = Container::new();
        c.set("one", 1u8);
        c.set("two", 2u8);
        c.set("one", 10u8);
        assert_eq!(c.keys(), vec!["one".to_string(), "two".to_string()]);
        assert_eq!(*c.get::<u8>("one").unwrap(), 10);

        assert!(c.remove("one"));
        assert!(!c.remove("one"));
        assert_eq!(c.len(), 1);

        c.clear();
        assert!(c.is_empty());
    }
}
