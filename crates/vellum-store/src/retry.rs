use std::io;

use tracing::warn;

/// Run an I/O operation, retrying it exactly once if the first attempt
/// fails with a transient error.
///
/// Transient means the OS reported `Interrupted`, `WouldBlock`, or
/// `TimedOut`. Anything else (permission denied, disk full, not found) is
/// returned immediately.
pub fn retry_once<T, F>(what: &str, mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    match op() {
        Err(e) if is_transient(&e) => {
            warn!(operation = what, error = %e, "transient I/O failure; retrying once");
            op()
        }
        other => other,
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
