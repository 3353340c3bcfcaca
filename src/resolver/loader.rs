//! At-most-once asset loading
//!
//! Every logical name moves through `Unrequested -> Loading -> Ready | Failed`
//! exactly once. Concurrent callers share the in-flight load, and a failure
//! is remembered and replayed instead of retried.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::fetch::{AssetFetcher, FetchRequest};
use super::{AssetTable, ResolveError};

/// Redirects a requested path to the path actually fetched
pub type LocateHook<'a> = dyn Fn(&str) -> String + Send + Sync + 'a;

type SharedLoad<H> = Shared<BoxFuture<'static, Result<H, ResolveError>>>;

/// Observable lifecycle of one logical name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unrequested,
    Loading,
    Ready,
    Failed,
}

enum Slot<H> {
    Loading(SharedLoad<H>),
    Ready(H),
    Failed(ResolveError),
}

enum Lookup<H> {
    Done(Result<H, ResolveError>),
    Wait(SharedLoad<H>),
}

impl<H: Clone> Slot<H> {
    fn lookup(&self) -> Lookup<H> {
        match self {
            Slot::Loading(pending) => Lookup::Wait(pending.clone()),
            Slot::Ready(handle) => Lookup::Done(Ok(handle.clone())),
            Slot::Failed(err) => Lookup::Done(Err(err.clone())),
        }
    }

    fn state(&self) -> LoadState {
        match self {
            Slot::Loading(_) => LoadState::Loading,
            Slot::Ready(_) => LoadState::Ready,
            Slot::Failed(_) => LoadState::Failed,
        }
    }
}

/// Loads assets named in an [`AssetTable`], each at most once
pub struct AssetLoader<F: AssetFetcher> {
    table: Arc<AssetTable>,
    fetcher: Arc<F>,
    slots: Arc<DashMap<String, Slot<F::Handle>>>,
}

impl<F: AssetFetcher + 'static> AssetLoader<F> {
    pub fn new(table: Arc<AssetTable>, fetcher: F) -> Self {
        Self {
            table,
            fetcher: Arc::new(fetcher),
            slots: Arc::new(DashMap::new()),
        }
    }

    pub fn table(&self) -> &AssetTable {
        &self.table
    }

    /// Current lifecycle state of `name`
    pub fn state(&self, name: &str) -> LoadState {
        self.slots
            .get(name)
            .map(|slot| slot.state())
            .unwrap_or(LoadState::Unrequested)
    }

    /// Load `name`, starting the fetch if nobody has yet
    ///
    /// With a locate hook the fetched path is whatever the hook returns for
    /// `name`; otherwise the name must be registered in the table. An
    /// unregistered name fails with [`ResolveError::UnknownAsset`] and leaves
    /// no state behind. The fetch runs on its own task, so it completes even
    /// if every caller stops waiting.
    pub async fn load(
        &self,
        name: &str,
        locate: Option<&LocateHook<'_>>,
    ) -> Result<F::Handle, ResolveError> {
        let existing = self.slots.get(name).map(|slot| slot.lookup());

        let lookup = match existing {
            Some(lookup) => lookup,
            None => {
                let request = self.request(name, locate)?;
                let (lookup, start) = match self.slots.entry(name.to_string()) {
                    Entry::Occupied(slot) => (slot.get().lookup(), None),
                    Entry::Vacant(slot) => {
                        debug!("Loading asset {} from {}", name, request.path);
                        let (pending, start) = self.spawn(request);
                        slot.insert(Slot::Loading(pending.clone()));
                        (Lookup::Wait(pending), Some(start))
                    }
                };
                // The shard guard is gone, so the fetch may settle from here on
                if let Some(start) = start {
                    let _ = start.send(());
                }
                lookup
            }
        };

        match lookup {
            Lookup::Done(result) => result,
            Lookup::Wait(pending) => pending.await,
        }
    }

    fn request(&self, name: &str, locate: Option<&LocateHook<'_>>) -> Result<FetchRequest, ResolveError> {
        let (path, location) = match locate {
            Some(hook) => (hook(name), self.table.resolve(name).ok().cloned()),
            None => {
                let location = self.table.resolve(name)?;
                (location.url.clone(), Some(location.clone()))
            }
        };

        Ok(FetchRequest {
            name: name.to_string(),
            path,
            location,
        })
    }

    /// Spawn the fetch for `request`; it waits for the returned signal before starting
    fn spawn(&self, request: FetchRequest) -> (SharedLoad<F::Handle>, oneshot::Sender<()>) {
        let fetcher = Arc::clone(&self.fetcher);
        let slots = Arc::clone(&self.slots);
        let task_slots = Arc::clone(&self.slots);
        let name = request.name.clone();
        let (start, started) = oneshot::channel();

        let task = tokio::spawn(async move {
            // A dropped sender still lets the fetch run
            let _ = started.await;
            let result = fetcher.fetch(&request).await.map_err(|e| ResolveError::AssetLoad {
                name: request.name.clone(),
                reason: format!("{:#}", e),
            });
            settle(&task_slots, &request.name, &result);
            result
        });

        let pending = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    let result = Err(ResolveError::AssetLoad {
                        name: name.clone(),
                        reason: format!("load task failed: {}", e),
                    });
                    settle(&slots, &name, &result);
                    result
                }
            }
        }
        .boxed()
        .shared();

        (pending, start)
    }
}

fn settle<H: Clone>(
    slots: &DashMap<String, Slot<H>>,
    name: &str,
    result: &Result<H, ResolveError>,
) {
    let slot = match result {
        Ok(handle) => {
            debug!("Asset {} ready", name);
            Slot::Ready(handle.clone())
        }
        Err(err) => {
            warn!("{}", err);
            Slot::Failed(err.clone())
        }
    };
    slots.insert(name.to_string(), slot);
}
