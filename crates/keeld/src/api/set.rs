//! The operation table consulted by the dispatcher.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use super::deferred::Handle;
use super::response::ApiResponse;

/// Errors raised while building a [`HandlerSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two handlers claimed the same operation name.
    #[error("operation '{operation}' is registered more than once")]
    DuplicateOperation {
        /// The contested name.
        operation: String,
    },
}

/// Decodes raw params and forwards them to a typed handler.
trait ErasedHandler: Send + Sync {
    fn call(&self, params: Value) -> ApiResponse;
}

struct Typed<H, P> {
    handler: H,
    params: PhantomData<fn(P)>,
}

impl<H, P> ErasedHandler for Typed<H, P>
where
    H: Handle<P>,
    P: DeserializeOwned,
{
    fn call(&self, params: Value) -> ApiResponse {
        // Absent params decode like an empty object.
        let params = if params.is_null() {
            Value::Object(Map::new())
        } else {
            params
        };
        match serde_json::from_value::<P>(params) {
            Ok(decoded) => self.handler.handle(decoded),
            Err(error) => ApiResponse::bad_request(format_args!("invalid params: {error}")),
        }
    }
}

/// Collects handlers before the set is frozen.
#[derive(Default)]
pub struct HandlerSetBuilder {
    handlers: BTreeMap<&'static str, Box<dyn ErasedHandler>>,
}

impl HandlerSetBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` under `operation`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateOperation`] if the name is taken.
    pub fn register<P, H>(
        mut self,
        operation: &'static str,
        handler: H,
    ) -> Result<Self, RegistryError>
    where
        P: DeserializeOwned + 'static,
        H: Handle<P> + 'static,
    {
        if self.handlers.contains_key(operation) {
            return Err(RegistryError::DuplicateOperation {
                operation: operation.to_owned(),
            });
        }
        self.handlers.insert(
            operation,
            Box::new(Typed {
                handler,
                params: PhantomData,
            }),
        );
        Ok(self)
    }

    /// Freezes the table.
    #[must_use]
    pub fn build(self) -> HandlerSet {
        HandlerSet {
            handlers: self.handlers,
        }
    }
}

/// Read-only map from operation name to handler.
pub struct HandlerSet {
    handlers: BTreeMap<&'static str, Box<dyn ErasedHandler>>,
}

impl HandlerSet {
    /// Runs `operation` with raw JSON params.
    ///
    /// Returns `None` for unknown operations. Params that do not decode give
    /// a `400` before the handler, and therefore any readiness wait, runs.
    #[must_use]
    pub fn dispatch(&self, operation: &str, params: Value) -> Option<ApiResponse> {
        self.handlers
            .get(operation)
            .map(|handler| handler.call(params))
    }

    /// Whether `operation` is registered.
    #[must_use]
    pub fn contains(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Registered operation names, sorted.
    pub fn operations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.operations()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockall::mock;
    use rstest::{fixture, rstest};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq, Eq)]
    #[serde(deny_unknown_fields)]
    struct Lookup {
        id: u64,
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Nothing {}

    mock! {
        LookupHandler {}
        impl Handle<Lookup> for LookupHandler {
            fn handle(&self, params: Lookup) -> ApiResponse;
        }
    }

    struct Counter(Arc<AtomicUsize>);

    impl Handle<Nothing> for Counter {
        fn handle(&self, _params: Nothing) -> ApiResponse {
            self.0.fetch_add(1, Ordering::SeqCst);
            ApiResponse::ok(&"counted")
        }
    }

    #[fixture]
    fn calls() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[rstest]
    fn decodes_params_for_the_handler() {
        let mut lookup = MockLookupHandler::new();
        lookup
            .expect_handle()
            .withf(|params| *params == Lookup { id: 7 })
            .once()
            .returning(|params| ApiResponse::ok(&params.id));
        let set = HandlerSetBuilder::new()
            .register("lookup", lookup)
            .expect("register")
            .build();

        let response = set.dispatch("lookup", json!({"id": 7})).expect("known op");
        assert_eq!(response.body, json!(7));
    }

    #[rstest]
    #[case::wrong_type(json!({"id": "seven"}))]
    #[case::unknown_field(json!({"id": 7, "extra": true}))]
    #[case::missing_field(json!({}))]
    fn bad_params_never_reach_the_handler(#[case] params: Value) {
        let mut lookup = MockLookupHandler::new();
        lookup.expect_handle().never();
        let set = HandlerSetBuilder::new()
            .register("lookup", lookup)
            .expect("register")
            .build();

        let response = set.dispatch("lookup", params).expect("known op");
        assert_eq!(response.status, 400);
    }

    #[rstest]
    fn null_params_decode_as_empty(calls: Arc<AtomicUsize>) {
        let set = HandlerSetBuilder::new()
            .register("count", Counter(Arc::clone(&calls)))
            .expect("register")
            .build();

        assert!(set.dispatch("count", Value::Null).is_some_and(|r| r.is_success()));
        assert!(set.dispatch("count", json!({})).is_some_and(|r| r.is_success()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    fn unknown_operations_are_not_dispatched(calls: Arc<AtomicUsize>) {
        let set = HandlerSetBuilder::new()
            .register("count", Counter(Arc::clone(&calls)))
            .expect("register")
            .build();

        assert!(set.dispatch("missing", Value::Null).is_none());
        assert!(!set.contains("missing"));
        assert_eq!(set.operations().collect::<Vec<_>>(), vec!["count"]);
    }

    #[rstest]
    fn duplicate_names_are_rejected(calls: Arc<AtomicUsize>) {
        let result = HandlerSetBuilder::new()
            .register("count", Counter(Arc::clone(&calls)))
            .and_then(|builder| builder.register("count", Counter(Arc::clone(&calls))));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateOperation { operation }) if operation == "count"
        ));
    }
}
