//! TaskRouter - maps task names to handler factories.
//!
//! Each registered route is type-erased behind [`DynRoute`] so routes for
//! different kwargs types share one map.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde_json::Value;

use super::handler::TaskHandler;
use super::task::Task;
use crate::domain::Kwargs;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no handler registered for task {0:?}")]
    UnknownTask(String),

    #[error("kwargs for task {task:?} do not match: {source}")]
    InvalidKwargs {
        task: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("handler for task {0:?} is already registered")]
    AlreadyRegistered(String),
}

impl RouteError {
    pub fn as_label(&self) -> &'static str {
        match self {
            RouteError::UnknownTask(_) => "unknown_task",
            RouteError::InvalidKwargs { .. } => "invalid_kwargs",
            RouteError::AlreadyRegistered(_) => "already_registered",
        }
    }
}

/// Builds a fresh handler for one message.
pub trait DynRoute: Send + Sync {
    fn task_name(&self) -> &str;

    fn build(&self, kwargs: Kwargs) -> Result<Box<dyn TaskHandler>, RouteError>;
}

struct TypedRoute<T, F> {
    factory: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F, H> DynRoute for TypedRoute<T, F>
where
    T: Task,
    F: Fn(T) -> H + Send + Sync,
    H: TaskHandler + 'static,
{
    fn task_name(&self) -> &str {
        T::NAME
    }

    fn build(&self, kwargs: Kwargs) -> Result<Box<dyn TaskHandler>, RouteError> {
        let task: T =
            serde_json::from_value(Value::Object(kwargs)).map_err(|source| {
                RouteError::InvalidKwargs {
                    task: T::NAME.to_string(),
                    source,
                }
            })?;
        Ok(Box::new((self.factory)(task)))
    }
}

struct RawRoute<F> {
    name: String,
    factory: F,
}

impl<F, H> DynRoute for RawRoute<F>
where
    F: Fn(Kwargs) -> H + Send + Sync,
    H: TaskHandler + 'static,
{
    fn task_name(&self) -> &str {
        &self.name
    }

    fn build(&self, kwargs: Kwargs) -> Result<Box<dyn TaskHandler>, RouteError> {
        Ok(Box::new((self.factory)(kwargs)))
    }
}

/// Routes decoded envelopes to handlers.
///
/// ```ignore
/// let mut router = TaskRouter::new();
/// router.register::<Rebuild, _, _>(|task| RebuildHandler::new(task))?;
/// let handler = router.route("rebuild_index", kwargs)?;
/// ```
#[derive(Default)]
pub struct TaskRouter {
    routes: HashMap<String, Box<dyn DynRoute>>,
}

impl TaskRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a typed task.
    pub fn register<T, F, H>(&mut self, factory: F) -> Result<(), RouteError>
    where
        T: Task,
        F: Fn(T) -> H + Send + Sync + 'static,
        H: TaskHandler + 'static,
    {
        self.insert(Box::new(TypedRoute {
            factory,
            _marker: PhantomData,
        }))
    }

    /// Register a factory that receives the raw kwargs.
    pub fn register_raw<F, H>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), RouteError>
    where
        F: Fn(Kwargs) -> H + Send + Sync + 'static,
        H: TaskHandler + 'static,
    {
        self.insert(Box::new(RawRoute {
            name: name.into(),
            factory,
        }))
    }

    fn insert(&mut self, route: Box<dyn DynRoute>) -> Result<(), RouteError> {
        let name = route.task_name().to_string();
        if self.routes.contains_key(&name) {
            return Err(RouteError::AlreadyRegistered(name));
        }
        self.routes.insert(name, route);
        Ok(())
    }

    pub fn route(&self, task: &str, kwargs: Kwargs) -> Result<Box<dyn TaskHandler>, RouteError> {
        let route = self
            .routes
            .get(task)
            .ok_or_else(|| RouteError::UnknownTask(task.to_string()))?;
        route.build(kwargs)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.routes.contains_key(task)
    }

    /// Registered task names, sorted.
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkError;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Resize {
        width: u32,
        height: u32,
    }

    impl Task for Resize {
        const NAME: &'static str = "resize";
    }

    struct ResizeHandler {
        area: u32,
    }

    #[async_trait]
    impl TaskHandler for ResizeHandler {
        async fn execute(&self) -> Result<(), WorkError> {
            if self.area == 0 {
                return Err(WorkError::failed("empty image"));
            }
            Ok(())
        }

        fn is_alive(&self) -> bool {
            true
        }
    }

    fn kwargs(value: serde_json::Value) -> Kwargs {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn router() -> TaskRouter {
        let mut router = TaskRouter::new();
        router
            .register::<Resize, _, _>(|t| ResizeHandler {
                area: t.width * t.height,
            })
            .unwrap();
        router
    }

    #[tokio::test]
    async fn routes_typed_kwargs() {
        let handler = router()
            .route("resize", kwargs(json!({"width": 0, "height": 4})))
            .unwrap();
        assert_eq!(handler.execute().await, Err(WorkError::failed("empty image")));
    }

    #[test]
    fn unknown_task() {
        let err = router().route("crop", Kwargs::new()).err().unwrap();
        assert!(matches!(err, RouteError::UnknownTask(name) if name == "crop"));
    }

    #[test]
    fn kwargs_that_do_not_fit() {
        let err = router()
            .route("resize", kwargs(json!({"width": "wide"})))
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "invalid_kwargs");
    }

    #[test]
    fn double_registration() {
        let mut router = router();
        let result = router.register_raw("resize", |_| ResizeHandler { area: 1 });
        assert!(matches!(result, Err(RouteError::AlreadyRegistered(name)) if name == "resize"));
    }

    #[test]
    fn raw_and_typed_routes_coexist() {
        let mut router = router();
        router
            .register_raw("noop", |_| ResizeHandler { area: 1 })
            .unwrap();
        assert_eq!(router.task_names(), vec!["noop".to_string(), "resize".to_string()]);
        assert!(router.contains("noop"));
        assert_eq!(router.len(), 2);
    }
}
