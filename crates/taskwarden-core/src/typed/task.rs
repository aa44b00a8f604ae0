//! Task trait - binds a task name to a typed kwargs struct.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A task whose kwargs deserialize into `Self`.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Rebuild {
///     index: String,
/// }
///
/// impl Task for Rebuild {
///     const NAME: &'static str = "rebuild_index";
/// }
/// ```
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Value of the envelope's `task` field.
    const NAME: &'static str;
}
