use crate::BosunError;
use crate::analyses::AnalysisRepository;
use crate::events::EventRepository;
use crate::knowledge::KnowledgeRepository;
use crate::telemetry::TelemetryRepository;
use std::time::Duration;

pub trait Store {
    type Events<'a>: EventRepository
    where
        Self: 'a;
    type Telemetry<'a>: TelemetryRepository
    where
        Self: 'a;
    type Analyses<'a>: AnalysisRepository
    where
        Self: 'a;
    type Knowledge<'a>: KnowledgeRepository
    where
        Self: 'a;

    fn events(&self) -> Self::Events<'_>;
    fn telemetry(&self) -> Self::Telemetry<'_>;
    fn analyses(&self) -> Self::Analyses<'_>;
    fn knowledge(&self) -> Self::Knowledge<'_>;

    fn with_tx<F, T>(&self, f: F) -> Result<T, BosunError>
    where
        F: FnOnce(&Self) -> Result<T, BosunError>;
}

/// Opens a fresh [`Store`] per unit of work. Stores are blocking, so callers in
/// async code go through [`with_store`].
pub trait StoreProvider: Clone + Send + Sync + 'static {
    type Store: Store;

    fn open(&self) -> Result<Self::Store, BosunError>;
}

/// Runs `f` against a freshly opened store on the blocking pool, bounded by
/// `limit`.
pub async fn with_store<P, F, T>(provider: &P, limit: Duration, f: F) -> Result<T, BosunError>
where
    P: StoreProvider,
    F: FnOnce(&P::Store) -> Result<T, BosunError> + Send + 'static,
    T: Send + 'static,
{
    let provider = provider.clone();
    let task = tokio::task::spawn_blocking(move || {
        let store = provider.open()?;
        f(&store)
    });
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(BosunError::internal(join)),
        Err(_) => Err(BosunError::Internal {
            message: format!("store operation timed out after {limit:?}"),
        }),
    }
}
