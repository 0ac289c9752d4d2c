//! Command handlers and shared helpers.

pub mod auth;
pub mod config_cmd;
pub mod devices;
pub mod set;
pub mod structures;
pub mod watch;

use std::sync::Arc;

use nestly_core::{Nest, Snapshot};

use crate::error::CliError;

/// Stream until the store hydrates, then drop the connection and return
/// the first snapshot.
pub async fn hydrate(nest: &Nest) -> Result<Arc<Snapshot>, CliError> {
    let mut latest = nest.store().watch();
    let stream = nest.start_stream();
    tokio::pin!(stream);

    tokio::select! {
        biased;

        ready = latest.wait_for(Option::is_some) => {
            let snapshot = ready.ok().and_then(|r| (*r).clone());
            snapshot.ok_or(CliError::StreamClosed)
        }
        result = &mut stream => {
            result?;
            // The stream may end right after the first put.
            let snapshot = nest.store().watch().borrow().clone();
            snapshot.ok_or(CliError::StreamClosed)
        }
    }
}
