//! Identity-preserving writes.
//!
//! Restoring a record re-creates it under the key it had before archiving.
//! Live tables normally generate their own keys, so the insert runs inside a
//! scope that switches explicit-key insert mode on for the table and always
//! switches it back off, whatever the insert did.

use futures::future::BoxFuture;
use tracing::{debug, error};

use assetvault_core::{Error, Result};

use crate::store::StoreSession;

/// Run `f` while `table` accepts caller-supplied keys.
///
/// On stores that do not enforce generated keys this is a pass-through. On
/// stores that do, the mode is enabled before `f` and disabled after it, on
/// both the success and the error path. An error from `f` wins over an error
/// releasing the mode; a release failure after a successful `f` is reported
/// as [`Error::IdentityToggle`].
///
/// # Examples
///
/// ```rust,ignore
/// let record = live_record.clone();
/// with_preserved_key(session, "item", "id", move |s| {
///     Box::pin(async move { s.insert("item", "id", &record).await })
/// })
/// .await?;
/// ```
pub async fn with_preserved_key<T, F>(
    session: &mut dyn StoreSession,
    table: &str,
    key: &str,
    f: F,
) -> Result<T>
where
    T: Send,
    F: for<'a> FnOnce(&'a mut dyn StoreSession) -> BoxFuture<'a, Result<T>> + Send,
{
    if !session.capabilities().enforces_generated_keys() {
        return f(session).await;
    }

    session.set_explicit_key_insert(table, key, true).await?;
    debug!(
        subsystem = "db",
        component = "writer",
        op = "identity_toggle",
        db_table = table,
        "Explicit key insert enabled"
    );

    let outcome = f(&mut *session).await;
    let released = session.set_explicit_key_insert(table, key, false).await;

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release_err)) => {
            error!(
                subsystem = "db",
                component = "writer",
                db_table = table,
                error = %release_err,
                "Explicit key insert could not be released after a failed insert"
            );
            Err(err)
        }
        (Ok(_), Err(release_err)) => {
            error!(
                subsystem = "db",
                component = "writer",
                db_table = table,
                error = %release_err,
                "Explicit key insert could not be released"
            );
            Err(Error::IdentityToggle {
                table: table.to_string(),
                message: release_err.to_string(),
            })
        }
    }
}
