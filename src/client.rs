use tiberius::{Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::error::MssqlExecError;

/// Connected SQL Server client for one invocation.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open a fresh connection from an opaque ADO connection string.
///
/// The string is handed to the driver unchanged; named instances resolve
/// through the SQL Browser service. Authentication failures surface the
/// driver's diagnostic text verbatim.
///
/// # Errors
///
/// Returns `MssqlExecError::ConfigError` if the connection string does not
/// parse, and the driver's own error for connect/login failures.
pub async fn connect(connection_string: &str) -> Result<MssqlClient, MssqlExecError> {
    let config = Config::from_ado_string(connection_string)
        .map_err(|e| MssqlExecError::ConfigError(e.to_string()))?;

    let tcp = TcpStream::connect_named(&config).await?;
    tcp.set_nodelay(true)?;

    let client = Client::connect(config, tcp.compat_write()).await?;
    debug!("sql server connection established");
    Ok(client)
}
