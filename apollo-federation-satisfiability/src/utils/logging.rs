/// This macro is a wrapper around `tracing::trace!` and should not be confused with our snapshot
/// testing. Its goal is to add the necessary context to logging statements so that external tools
/// can show how key data structures (validation states, subgraph paths) evolve over the course of
/// a validation.
///
/// Pass the macro the name tag for the snapshot, the data and a message literal. Note that the
/// data needs to implement the tracing crate's `Value` trait, so it is usually a string rendering
/// of what is snapshotted. EX:
/// ```ignore
/// snapshot!("ValidationState", state.to_string(), "popped validation state");
/// // Generates:
/// // trace!(snapshot = "ValidationState", data = state.to_string(), "popped validation state");
/// ```
/// Nothing is logged unless the `snapshot_tracing` feature is enabled.
macro_rules! snapshot {
    ($name:literal, $value:expr, $msg:literal) => {
        #[cfg(feature = "snapshot_tracing")]
        tracing::trace!(snapshot = $name, data = $value, $msg);
    };
}

pub(crate) use snapshot;
