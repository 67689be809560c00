//! Transactions and the coordinator running a body inside one
//!
//! [`transaction`] begins a transaction on the participants' shared executor,
//! rebinds every participant onto it, runs the body, and always unbinds the
//! participants afterwards. A failing (or panicking) body makes it return
//! `Ok(false)`: the transaction is rolled back under the default
//! [`CommitPolicy::RollbackOnError`], or committed anyway under
//! [`CommitPolicy::AlwaysCommit`].

use crate::driver::{Connection, Driver, QueryOutcome};
use crate::executor::{Executor, Submit};
use crate::statement::PreparedStatement;
use crate::{Error, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

/// An open transaction holding its executor's connection
pub struct Transaction<D: Driver> {
    name: String,
    executor: Executor<D>,
    connection: Mutex<OwnedMutexGuard<Option<D::Connection>>>,
    finished: AtomicBool,
}

impl<D: Driver> Transaction<D> {
    pub(crate) fn new(
        name: String,
        executor: Executor<D>,
        connection: OwnedMutexGuard<Option<D::Connection>>,
    ) -> Self {
        Self {
            name,
            executor,
            connection: Mutex::new(connection),
            finished: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> &Executor<D> {
        &self.executor
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub async fn commit(&self) -> Result<()> {
        self.finish("COMMIT;").await?;
        info!(transaction = %self.name, "Transaction committed");
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.finish("ROLLBACK;").await?;
        info!(transaction = %self.name, "Transaction rolled back");
        Ok(())
    }

    async fn finish(&self, sql: &str) -> Result<()> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Err(Error::usage(format!(
                "Transaction {} is already finished",
                self.name
            )));
        }
        self.query(sql, &[]).await.map(|_| ())
    }

    async fn query(&self, sql: &str, args: &[crate::Value]) -> Result<QueryOutcome> {
        let mut slot = self.connection.lock().await;
        let connection = slot.as_mut().ok_or_else(|| {
            Error::usage(format!("Transaction {} lost its connection", self.name))
        })?;
        connection.query(sql, args).await
    }
}

impl<D: Driver> Submit for Transaction<D> {
    async fn run(&self, statement: &PreparedStatement) -> Result<QueryOutcome> {
        if self.is_finished() {
            return Err(Error::usage(format!(
                "Transaction {} is already finished",
                self.name
            )));
        }
        tracing::debug!(
            transaction = %self.name,
            sql = %statement.text,
            args = statement.args.len(),
            "Submitting statement"
        );

        let outcome = self.query(&statement.text, &statement.args).await?;
        Ok(self.executor.remap(&statement.scope, outcome))
    }
}

impl<D: Driver> Drop for Transaction<D> {
    fn drop(&mut self) {
        if !*self.finished.get_mut() {
            // The server discards the open transaction along with the
            // connection; the executor reconnects on its next statement.
            let abandoned = self.connection.get_mut().take();
            drop(abandoned);
            warn!(transaction = %self.name, "Transaction dropped without commit or rollback, connection discarded");
        }
        self.executor.release_transaction();
    }
}

/// An object whose statements can be temporarily routed through a transaction
pub trait Participant<D: Driver>: Send + Sync {
    fn executor(&self) -> &Executor<D>;

    /// Route subsequent statements through `transaction`
    fn on_transaction(&self, transaction: Arc<Transaction<D>>);

    /// Go back to the executor
    fn on_transaction_end(&self);
}

/// What to do with the transaction when the body fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    #[default]
    RollbackOnError,
    /// Commit whatever the body managed to run before failing
    AlwaysCommit,
}

/// Participants bound to a transaction, unbound again when this is dropped,
/// including when the coordinating future is cancelled mid-body
struct Bindings<'a, D: Driver> {
    participants: &'a [&'a dyn Participant<D>],
}

impl<'a, D: Driver> Bindings<'a, D> {
    fn bind(participants: &'a [&'a dyn Participant<D>], transaction: &Arc<Transaction<D>>) -> Self {
        for participant in participants {
            participant.on_transaction(transaction.clone());
        }
        Self { participants }
    }
}

impl<D: Driver> Drop for Bindings<'_, D> {
    fn drop(&mut self) {
        for participant in self.participants {
            participant.on_transaction_end();
        }
    }
}

/// Run `body` in a transaction shared by `participants`, rolling back if it fails.
///
/// Returns `Ok(true)` if the body succeeded and `Ok(false)` if it failed; the
/// body's error is logged, not returned. Errors beginning or ending the
/// transaction are returned.
pub async fn transaction<D, F, Fut>(participants: &[&dyn Participant<D>], body: F) -> Result<bool>
where
    D: Driver,
    F: FnOnce(Arc<Transaction<D>>) -> Fut,
    Fut: Future<Output = Result<()>> + Send,
{
    transaction_with_policy(participants, CommitPolicy::default(), body).await
}

pub async fn transaction_with_policy<D, F, Fut>(
    participants: &[&dyn Participant<D>],
    policy: CommitPolicy,
    body: F,
) -> Result<bool>
where
    D: Driver,
    F: FnOnce(Arc<Transaction<D>>) -> Fut,
    Fut: Future<Output = Result<()>> + Send,
{
    let executor = participants
        .first()
        .map(|participant| participant.executor().clone())
        .ok_or_else(|| Error::usage("A transaction needs at least one participant"))?;
    if participants
        .iter()
        .any(|participant| !participant.executor().same_as(&executor))
    {
        return Err(Error::usage(
            "Transaction participants must share the same executor",
        ));
    }

    let name = Uuid::new_v4().to_string();
    let transaction = Arc::new(executor.begin(&name).await?);

    let bindings = Bindings::bind(participants, &transaction);
    let outcome = AssertUnwindSafe(body(transaction.clone()))
        .catch_unwind()
        .await;
    drop(bindings);

    let succeeded = match outcome {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(transaction = %name, error = %err, "Transaction body failed");
            false
        }
        Err(_) => {
            warn!(transaction = %name, "Transaction body panicked");
            false
        }
    };

    if !succeeded && policy == CommitPolicy::RollbackOnError {
        if let Err(err) = transaction.rollback().await {
            warn!(transaction = %name, error = %err, "Rollback failed");
            return Err(err);
        }
    } else {
        transaction.commit().await?;
    }

    Ok(succeeded)
}
