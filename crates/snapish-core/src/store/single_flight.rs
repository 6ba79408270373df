use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlightError {
    #[error("{0}")]
    Failed(String),

    #[error("In-flight request ended without a result")]
    Aborted,
}

type Flight<T> = Shared<BoxFuture<'static, Result<T, FlightError>>>;

/// Registry of in-flight operations keyed by resource.
///
/// At most one operation runs per key. Callers arriving while it runs wait
/// for the same result. The operation is spawned, so it completes (and
/// commits whatever it commits) even if every caller stops waiting.
pub struct SingleFlight<K, T> {
    flights: Arc<Mutex<HashMap<K, Flight<T>>>>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Join the flight for `key`, or start one from `start` if none is running
    pub async fn run<F, Fut>(&self, key: K, start: F) -> Result<T, FlightError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FlightError>> + Send + 'static,
    {
        let flight = {
            let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);

            match flights.get(&key) {
                Some(existing) => {
                    debug!(?key, "Joining in-flight request");
                    existing.clone()
                }
                None => {
                    let registry = Arc::clone(&self.flights);
                    let task_key = key.clone();
                    let operation = start();

                    // The task cannot deregister before we register: it needs
                    // the lock we are holding.
                    let handle = tokio::spawn(async move {
                        let result = operation.await;
                        registry
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&task_key);
                        result
                    });

                    let flight: Flight<T> = async move {
                        handle.await.unwrap_or(Err(FlightError::Aborted))
                    }
                    .boxed()
                    .shared();

                    debug!(?key, "Starting request");
                    flights.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }
}
