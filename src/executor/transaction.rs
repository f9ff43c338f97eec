use tiberius::Query;
use tracing::{debug, warn};

use crate::client::{MssqlClient, connect};
use crate::error::MssqlExecError;
use crate::types::IsolationLevel;

/// One invocation's connection plus its transaction state.
///
/// A `Session` must be finished through [`commit`](Session::commit) or
/// [`rollback`](Session::rollback); dropping it mid-transaction abandons the
/// connection with the transaction still open on the server side.
pub struct Session {
    client: MssqlClient,
    tx_open: bool,
}

impl Session {
    /// Open a fresh connection for this invocation.
    ///
    /// # Errors
    ///
    /// Returns the driver's connect/login error verbatim.
    pub async fn connect(connection_string: &str) -> Result<Self, MssqlExecError> {
        let client = connect(connection_string).await?;
        Ok(Self {
            client,
            tx_open: false,
        })
    }

    /// Begin a transaction at the requested isolation level.
    ///
    /// `Default`/`Unspecified` issue a bare `BEGIN TRANSACTION`; `None` is a
    /// no-op and the statement runs autocommit.
    ///
    /// # Errors
    ///
    /// Returns `MssqlExecError` if the SET or BEGIN batch fails.
    pub async fn begin(&mut self, isolation: IsolationLevel) -> Result<(), MssqlExecError> {
        if !isolation.wraps_transaction() {
            debug!("running autocommit, no transaction wrapper");
            return Ok(());
        }
        if let Some(clause) = isolation.set_clause() {
            Query::new(format!("SET TRANSACTION ISOLATION LEVEL {clause}"))
                .execute(&mut self.client)
                .await?;
        }
        Query::new("BEGIN TRANSACTION")
            .execute(&mut self.client)
            .await?;
        self.tx_open = true;
        debug!(?isolation, "transaction opened");
        Ok(())
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx_open
    }

    pub fn client_mut(&mut self) -> &mut MssqlClient {
        &mut self.client
    }

    /// Commit the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns `MssqlExecError` if the COMMIT batch fails; the transaction
    /// stays marked open so a rollback can still be attempted.
    pub async fn commit(&mut self) -> Result<(), MssqlExecError> {
        if self.tx_open {
            Query::new("COMMIT TRANSACTION")
                .execute(&mut self.client)
                .await?;
            self.tx_open = false;
            debug!("transaction committed");
        }
        Ok(())
    }

    /// Roll back the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns `MssqlExecError` if the ROLLBACK batch fails.
    pub async fn rollback(&mut self) -> Result<(), MssqlExecError> {
        if self.tx_open {
            Query::new("ROLLBACK TRANSACTION")
                .execute(&mut self.client)
                .await?;
            self.tx_open = false;
            warn!("transaction rolled back");
        }
        Ok(())
    }
}
