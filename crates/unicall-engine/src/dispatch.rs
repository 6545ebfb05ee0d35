//! The invocation dispatcher.
//!
//! One [`Engine`] serves both wire operations: [`Engine::invoke`] and
//! [`Engine::list`]. Every request runs the same arc — validate, resolve,
//! bind, construct (only when an instance method needs a receiver),
//! invoke — and every failure along the way is caught at this boundary and
//! degraded to the error envelope (`ok:false`, `code:500`, `msg`, `throw`).
//! Nothing escapes as a transport-level failure.
//!
//! # Envelope
//!
//! | Key | Present | Meaning |
//! |-----|---------|---------|
//! | `ok`/`code`/`msg` | always | outcome summary |
//! | `language` | always | `"Rust"` |
//! | `type`/`return` | success | declared (or observed) return type and value |
//! | `methodArgs` | success | echo of the bound arguments, re-tagged |
//! | `this` | success, instance call | post-call receiver snapshot |
//! | `warn` | as needed | snapshot fell back to a debug rendering |
//! | `throw` | failure | error-kind tag |
//! | `time:start\|duration\|end` | always | microsecond timing triple |

use crate::cache::InstanceCache;
use crate::callback::{CallbackBridge, CallbackNotice};
use crate::coerce::{bind_args, coerce_plain, parse_descriptor, BoundArg, Coercer};
use crate::config::EngineConfig;
use crate::error::InvokeError;
use serde_json::json;
use std::sync::{mpsc, Arc, OnceLock};
use tracing::{debug, info};
use unicall_registry::listing::{self, ListQuery};
use unicall_registry::{
    CallArgs, Callable, ClassEntry, FunctionEntry, Registry, TypeRegistry, DEFAULT_CONSTRUCTOR,
    FALLBACK_CONSTRUCTOR,
};
use unicall_types::{wire, InstanceHandle, Value};

/// The invocation engine.
///
/// Holds every piece of cross-invocation state explicitly: the type memo
/// cache, the instance reuse cache, and the async runtime. Nothing is
/// process-global; two engines over the same registry are fully
/// independent.
pub struct Engine {
    types: TypeRegistry,
    instances: InstanceCache,
    config: EngineConfig,
    notify: Option<mpsc::Sender<CallbackNotice>>,
    runtime: OnceLock<Option<tokio::runtime::Runtime>>,
}

impl Engine {
    /// Creates an engine over a registration table.
    #[must_use]
    pub fn new(registry: Arc<Registry>, config: EngineConfig) -> Self {
        Self {
            types: TypeRegistry::new(registry),
            instances: InstanceCache::new(config.reuse_cache_capacity),
            config,
            notify: None,
            runtime: OnceLock::new(),
        }
    }

    /// Installs the receiver for as-you-go callback notices.
    #[must_use]
    pub fn with_notifier(mut self, notify: mpsc::Sender<CallbackNotice>) -> Self {
        self.notify = Some(notify);
        self
    }

    /// The engine's type resolver (shared memo cache).
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Handles one invoke request, always producing an envelope.
    pub fn invoke(&self, request: &serde_json::Value) -> serde_json::Value {
        let received = wire::now_micros();
        match self.try_invoke(request) {
            Ok(done) => self.success_envelope(done),
            Err(err) => {
                info!(kind = err.kind(), msg = %err, "invocation failed");
                error_envelope(&err, wire::TimeDetail::since(received))
            }
        }
    }

    /// Handles one list request, always producing an envelope.
    pub fn list(&self, request: &serde_json::Value) -> serde_json::Value {
        let received = wire::now_micros();
        match self.try_list(request) {
            Ok(mut map) => {
                base_success(&mut map);
                map.insert(
                    wire::KEY_TIME_DETAIL.to_string(),
                    json!(wire::TimeDetail::since(received).render()),
                );
                serde_json::Value::Object(map)
            }
            Err(err) => {
                info!(kind = err.kind(), msg = %err, "listing failed");
                error_envelope(&err, wire::TimeDetail::since(received))
            }
        }
    }

    fn try_invoke(&self, request: &serde_json::Value) -> Result<Invocation, InvokeError> {
        let req = request
            .as_object()
            .ok_or_else(|| InvokeError::validation("request must be an object!"))?;

        let is_static = opt_bool(req, wire::KEY_STATIC)?;
        let reuse = opt_bool(req, wire::KEY_REUSE)?.unwrap_or(false);
        let package = opt_str(req, wire::KEY_PACKAGE)?.unwrap_or_default();
        let class = opt_str(req, wire::KEY_CLASS)?.unwrap_or_default();
        let constructor = opt_str(req, wire::KEY_CONSTRUCTOR)?;
        let class_args = opt_array(req, wire::KEY_CLASS_ARGS)?;
        let method_args = opt_array(req, wire::KEY_METHOD_ARGS)?.unwrap_or(&[]);

        let method = opt_str(req, wire::KEY_METHOD)?
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                InvokeError::validation(format!("{} must not be empty!", wire::KEY_METHOD))
            })?;

        let this = match req.get(wire::KEY_THIS) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(InvokeError::validation(format!(
                    "{} must be dict!",
                    wire::KEY_THIS
                )))
            }
        };

        if this.is_some() {
            if is_static == Some(true) {
                return Err(exclusion(wire::KEY_STATIC, wire::KEY_THIS));
            }
            if class_args.is_some() {
                return Err(exclusion(wire::KEY_THIS, wire::KEY_CLASS_ARGS));
            }
            if constructor.is_some() {
                return Err(exclusion(wire::KEY_THIS, wire::KEY_CONSTRUCTOR));
            }
        }
        if class_args.is_some() && is_static == Some(true) {
            return Err(exclusion(wire::KEY_CLASS_ARGS, wire::KEY_STATIC));
        }

        let entry = self
            .types
            .registry()
            .resolve_function(package, class, method)?;

        if is_static == Some(true) && !entry.is_static() {
            return Err(InvokeError::validation(format!(
                "{method} is not a static member!"
            )));
        }
        if this.is_some() && entry.is_static() {
            return Err(InvokeError::validation(format!(
                "{method} is a static member; {} cannot be used!",
                wire::KEY_THIS
            )));
        }

        let qualified_method = if class.is_empty() {
            format!("{package}.{method}")
        } else {
            format!("{package}.{class}.{method}")
        };
        let bridge = CallbackBridge::new(self.types.clone(), self.notify.clone()).with_context(
            &qualified_method,
            json!({
                wire::KEY_LANGUAGE: wire::LANGUAGE,
                wire::KEY_PACKAGE: package,
                wire::KEY_CLASS: class,
                wire::KEY_METHOD: method,
            }),
        );
        let coercer = Coercer::new(&self.types, &bridge);

        let args: Vec<BoundArg> = method_args
            .iter()
            .map(|raw| coercer.coerce(parse_descriptor(raw)))
            .collect::<Result<_, _>>()?;
        let values = bind_args(entry.params(), &args)?;

        let receiver = if entry.is_static() {
            None
        } else if let Some(this) = this {
            Some(self.decode_this(this)?)
        } else {
            Some(self.construct(
                package,
                class,
                constructor.unwrap_or(DEFAULT_CONSTRUCTOR),
                class_args.unwrap_or(&[]),
                reuse,
                &coercer,
            )?)
        };

        debug!(method = %qualified_method, args = values.len(), "invoking");

        // Timing covers the target call alone, not request parsing.
        let start = wire::now_micros();
        let return_value = self.run_callable(
            &entry,
            CallArgs {
                this: receiver.clone(),
                values,
            },
        )?;
        let time = wire::TimeDetail::since(start);

        let return_type = if entry.return_type() == "any" {
            return_value.type_name()
        } else {
            entry.return_type().to_string()
        };

        Ok(Invocation {
            args,
            receiver,
            return_value,
            return_type,
            time,
        })
    }

    /// Materializes the receiver from a `this` descriptor (`{type, value}`).
    ///
    /// The state goes through the same fallback chain as any class-typed
    /// argument: registered decode, then keyword spread of a map or
    /// positional spread of a list into the default constructor.
    fn decode_this(
        &self,
        this: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<InstanceHandle, InvokeError> {
        let type_name = this
            .get(wire::KEY_TYPE)
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                InvokeError::validation(format!(
                    "{}.{} must be a class name!",
                    wire::KEY_THIS,
                    wire::KEY_TYPE
                ))
            })?;

        let desc = self.types.resolve(Some(type_name), None)?;
        if desc.as_class().is_none() {
            return Err(InvokeError::Type(format!("{type_name} is not a class type")));
        }

        let state = this
            .get(wire::KEY_VALUE)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        match coerce_plain(&desc, Value::from_json(state)) {
            Value::Opaque(handle) => Ok(handle),
            other => Err(InvokeError::Construction(format!(
                "cannot build a {type_name} receiver from {}",
                other.type_name()
            ))),
        }
    }

    /// Constructs (or reuses) the receiver for an instance-method call.
    fn construct(
        &self,
        package: &str,
        class_path: &str,
        constructor: &str,
        class_args: &[serde_json::Value],
        reuse: bool,
        coercer: &Coercer<'_>,
    ) -> Result<InstanceHandle, InvokeError> {
        let class = self.types.registry().resolve_class(package, class_path)?;

        let key = InstanceCache::key(
            class.qualified(),
            constructor,
            &serde_json::Value::Array(class_args.to_vec()),
        );
        if reuse {
            if let Some(handle) = self.instances.get(&key) {
                debug!(class = class.qualified(), "reusing cached instance");
                return Ok(handle);
            }
        }

        let args: Vec<BoundArg> = class_args
            .iter()
            .map(|raw| coercer.coerce(parse_descriptor(raw)))
            .collect::<Result<_, _>>()?;

        let handle = self.run_constructor(&class, constructor, &args)?;
        if reuse {
            self.instances.insert(key, handle.clone());
        }
        Ok(handle)
    }

    /// Runs the chosen constructor, falling back to the factory literally
    /// named `constructor` when a named alternate is missing or fails.
    fn run_constructor(
        &self,
        class: &Arc<ClassEntry>,
        constructor: &str,
        args: &[BoundArg],
    ) -> Result<InstanceHandle, InvokeError> {
        let attempt = |entry: &FunctionEntry| -> Result<InstanceHandle, InvokeError> {
            let values = bind_args(entry.params(), args)?;
            let value = self
                .run_callable(entry, CallArgs::positional(values))
                .map_err(|err| InvokeError::Construction(err.to_string()))?;
            value.as_opaque().cloned().ok_or_else(|| {
                InvokeError::Construction(format!(
                    "{} constructor did not produce an instance",
                    class.qualified()
                ))
            })
        };

        let primary = match class.constructor(constructor) {
            Some(entry) => attempt(entry),
            None => Err(InvokeError::Construction(format!(
                "{} has no constructor '{constructor}'",
                class.qualified()
            ))),
        };

        match primary {
            Ok(handle) => Ok(handle),
            // Binding problems are the caller's, never the fallback's.
            Err(err @ InvokeError::Binding(_)) => Err(err),
            Err(err) => {
                let named_alternate =
                    constructor != DEFAULT_CONSTRUCTOR && constructor != FALLBACK_CONSTRUCTOR;
                match class.constructor(FALLBACK_CONSTRUCTOR) {
                    Some(fallback) if named_alternate => {
                        debug!(class = class.qualified(), constructor, "falling back");
                        attempt(fallback).map_err(|_| err)
                    }
                    _ => Err(err),
                }
            }
        }
    }

    /// Runs a callable to completion; async targets block on the
    /// engine-owned current-thread runtime.
    fn run_callable(&self, entry: &FunctionEntry, args: CallArgs) -> Result<Value, InvokeError> {
        match entry.callable() {
            Callable::Sync(f) => f(args).map_err(Into::into),
            Callable::Async(f) => {
                let runtime = self.runtime.get_or_init(|| {
                    tokio::runtime::Builder::new_current_thread()
                        .enable_time()
                        .build()
                        .ok()
                });
                let Some(runtime) = runtime else {
                    return Err(InvokeError::Target(
                        "async runtime could not be started".into(),
                    ));
                };
                runtime.block_on(f(args)).map_err(Into::into)
            }
        }
    }

    fn success_envelope(&self, done: Invocation) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        base_success(&mut map);
        map.insert(wire::KEY_TYPE.to_string(), json!(done.return_type));
        map.insert(wire::KEY_RETURN.to_string(), done.return_value.to_json());

        if self.config.echo_method_args && !done.args.is_empty() {
            let echo: Vec<serde_json::Value> = done.args.iter().map(BoundArg::echo).collect();
            map.insert(wire::KEY_METHOD_ARGS.to_string(), json!(echo));
        }

        if let Some(receiver) = &done.receiver {
            match receiver.try_snapshot() {
                Ok(snapshot) => {
                    map.insert(wire::KEY_THIS.to_string(), snapshot);
                }
                Err(debug_rendering) => {
                    map.insert(wire::KEY_THIS.to_string(), json!(debug_rendering));
                    map.insert(
                        wire::KEY_WARN.to_string(),
                        json!(format!(
                            "{} state is not serializable; showing its debug rendering",
                            wire::KEY_THIS
                        )),
                    );
                }
            }
        }

        map.insert(wire::KEY_TIME_DETAIL.to_string(), json!(done.time.render()));
        serde_json::Value::Object(map)
    }

    fn try_list(
        &self,
        request: &serde_json::Value,
    ) -> Result<serde_json::Map<String, serde_json::Value>, InvokeError> {
        let req = request
            .as_object()
            .ok_or_else(|| InvokeError::validation("request must be an object!"))?;

        // Validated for contract compatibility; this engine never mocks.
        let _mock = opt_bool(req, wire::KEY_MOCK)?;

        let query = match req.get(wire::KEY_QUERY) {
            None | Some(serde_json::Value::Null) => 0,
            Some(value) => match value.as_i64() {
                Some(q @ 0..=2) => q,
                _ => {
                    return Err(InvokeError::validation(format!(
                        "{} must be in [0, 1, 2]! 0-Data, 1-Total count, 2-Both above",
                        wire::KEY_QUERY
                    )))
                }
            },
        };

        let depth = match req.get(wire::KEY_DEPTH) {
            None | Some(serde_json::Value::Null) => self.config.list_depth,
            Some(value) => match value.as_u64().and_then(|d| u32::try_from(d).ok()) {
                Some(d) => d,
                None => {
                    return Err(InvokeError::validation(format!(
                        "{} must be a non-negative int!",
                        wire::KEY_DEPTH
                    )))
                }
            },
        };

        let list_query = ListQuery {
            package: opt_str(req, wire::KEY_PACKAGE)?.unwrap_or_default().to_string(),
            class: opt_str(req, wire::KEY_CLASS)?.unwrap_or_default().to_string(),
            method: opt_str(req, wire::KEY_METHOD)?.unwrap_or_default().to_string(),
            depth,
        };
        // Signature filter of the shared contract; accepted, not applied.
        if let Some(types) = req.get(wire::KEY_TYPES) {
            if !types.is_null() && !types.is_array() {
                return Err(InvokeError::validation(format!(
                    "{} must be list!",
                    wire::KEY_TYPES
                )));
            }
        }

        let outcome = listing::list(self.types.registry(), &list_query);

        let mut map = serde_json::Map::new();
        if query != 1 {
            map.insert(
                wire::KEY_PACKAGE_LIST.to_string(),
                serde_json::to_value(&outcome.packages).unwrap_or_default(),
            );
        }
        if query >= 1 {
            map.insert(wire::KEY_PACKAGE_TOTAL.to_string(), json!(outcome.package_total));
            map.insert(wire::KEY_CLASS_TOTAL.to_string(), json!(outcome.class_total));
            map.insert(wire::KEY_METHOD_TOTAL.to_string(), json!(outcome.method_total));
        }
        Ok(map)
    }
}

/// One finished invocation, ready to be rendered as an envelope.
struct Invocation {
    args: Vec<BoundArg>,
    receiver: Option<InstanceHandle>,
    return_value: Value,
    return_type: String,
    time: wire::TimeDetail,
}

fn base_success(map: &mut serde_json::Map<String, serde_json::Value>) {
    map.insert(wire::KEY_LANGUAGE.to_string(), json!(wire::LANGUAGE));
    map.insert(wire::KEY_OK.to_string(), json!(true));
    map.insert(wire::KEY_CODE.to_string(), json!(wire::CODE_SUCCESS));
    map.insert(wire::KEY_MSG.to_string(), json!(wire::MSG_SUCCESS));
}

fn error_envelope(err: &InvokeError, time: wire::TimeDetail) -> serde_json::Value {
    json!({
        wire::KEY_LANGUAGE: wire::LANGUAGE,
        wire::KEY_OK: false,
        wire::KEY_CODE: wire::CODE_SERVER_ERROR,
        wire::KEY_MSG: err.to_string(),
        wire::KEY_THROW: err.kind(),
        wire::KEY_TIME_DETAIL: time.render(),
    })
}

fn exclusion(a: &str, b: &str) -> InvokeError {
    InvokeError::validation(format!("{a} cannot appear together with {b}!"))
}

fn opt_bool(
    req: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<bool>, InvokeError> {
    match req.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(InvokeError::validation(format!("{key} must be bool!"))),
    }
}

fn opt_str<'a>(
    req: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<&'a str>, InvokeError> {
    match req.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(InvokeError::validation(format!("{key} must be str!"))),
    }
}

fn opt_array<'a>(
    req: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<&'a [serde_json::Value]>, InvokeError> {
    match req.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(InvokeError::validation(format!("{key} must be list!"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unicall_registry::testing::sample_registry;
    use unicall_registry::{CallError, ClassBuilder};

    fn engine() -> Engine {
        Engine::new(Arc::new(sample_registry()), EngineConfig::new())
    }

    #[derive(Debug, serde::Serialize)]
    struct PlainBox {
        id: i64,
    }

    /// A registry whose class has a default constructor but no decode hook.
    fn plain_registry() -> Registry {
        let mut registry = Registry::new();
        registry.package("demo").class(
            ClassBuilder::new("Box")
                .constructor(
                    FunctionEntry::builder("new")
                        .param("id", "int")
                        .returns("demo.Box")
                        .sync(|args| {
                            let state = PlainBox { id: args.int(0)? };
                            Ok(Value::Opaque(InstanceHandle::of("demo.Box", state)))
                        }),
                )
                .method(
                    FunctionEntry::builder("get_id")
                        .instance()
                        .returns("int")
                        .sync(|args| {
                            args.this()?
                                .with::<PlainBox, _, _>(|b| Value::Int(b.id))
                                .ok_or_else(|| CallError::BadReceiver("demo.Box".into()))
                        }),
                ),
        );
        registry
    }

    #[test]
    fn minus_success_envelope() {
        let rsp = engine().invoke(&json!({
            "package": "unicall.test",
            "class": "testutil",
            "method": "minus",
            "methodArgs": [
                {"type": "int", "value": 2},
                {"type": "int", "value": 3},
            ],
        }));
        assert_eq!(rsp["ok"], json!(true));
        assert_eq!(rsp["code"], json!(200));
        assert_eq!(rsp["msg"], json!("success"));
        assert_eq!(rsp["language"], json!("Rust"));
        assert_eq!(rsp["type"], json!("int"));
        assert_eq!(rsp["return"], json!(-1));
        assert_eq!(rsp["methodArgs"][0], json!({"type": "int", "value": 2}));
    }

    #[test]
    fn missing_method_is_validation() {
        let rsp = engine().invoke(&json!({"package": "unicall.test"}));
        assert_eq!(rsp["ok"], json!(false));
        assert_eq!(rsp["code"], json!(500));
        assert_eq!(rsp["throw"], json!("ValidationError"));
    }

    #[test]
    fn unknown_member_is_symbol_not_found() {
        let rsp = engine().invoke(&json!({
            "package": "unicall.test",
            "class": "testutil",
            "method": "no_such",
        }));
        assert_eq!(rsp["throw"], json!("SymbolNotFound"));
    }

    #[test]
    fn static_flag_with_this_is_validation() {
        let rsp = engine().invoke(&json!({
            "package": "unicall.test",
            "class": "testutil$Test",
            "method": "get_id",
            "static": true,
            "this": {"type": "unicall.test.testutil$Test", "value": {"id": 1, "sex": 0, "name": "X"}},
        }));
        assert_eq!(rsp["throw"], json!("ValidationError"));
        assert!(rsp["msg"].as_str().unwrap().contains("cannot appear together"));
    }

    #[test]
    fn time_detail_shape() {
        let rsp = engine().invoke(&json!({
            "package": "unicall.test",
            "method": "test",
        }));
        let time = rsp["time:start|duration|end"].as_str().unwrap();
        let parts: Vec<_> = time.split('|').collect();
        assert_eq!(parts.len(), 3);
        let start: u128 = parts[0].parse().unwrap();
        let duration: u128 = parts[1].parse().unwrap();
        let end: u128 = parts[2].parse().unwrap();
        assert_eq!(start + duration, end);
    }

    #[test]
    fn list_totals_by_query_mode() {
        let engine = engine();
        let data = engine.list(&json!({"package": "unicall.test"}));
        assert!(data.get("packageList").is_some());
        assert!(data.get("methodTotal").is_none());

        let totals = engine.list(&json!({"package": "unicall.test", "query": 1}));
        assert!(totals.get("packageList").is_none());
        assert!(totals["methodTotal"].as_u64().unwrap() > 0);

        let both = engine.list(&json!({"package": "unicall.test", "query": 2}));
        assert!(both.get("packageList").is_some());
        assert!(both.get("classTotal").is_some());
    }

    #[test]
    fn list_rejects_bad_query() {
        let rsp = engine().list(&json!({"query": 9}));
        assert_eq!(rsp["throw"], json!("ValidationError"));
    }

    #[test]
    fn list_rejects_oversized_depth() {
        // 2^32 does not fit u32 and must not truncate to 0 (= unbounded).
        let rsp = engine().list(&json!({"package": "unicall.test", "depth": 4_294_967_296_u64}));
        assert_eq!(rsp["throw"], json!("ValidationError"));
        assert!(rsp["msg"].as_str().unwrap().contains("depth"));
    }

    #[test]
    fn this_spreads_into_constructor_without_decode_hook() {
        let engine = Engine::new(Arc::new(plain_registry()), EngineConfig::new());
        let rsp = engine.invoke(&json!({
            "package": "demo",
            "class": "Box",
            "this": {"type": "demo.Box", "value": {"id": 3}},
            "method": "get_id",
        }));
        assert_eq!(rsp["ok"], json!(true));
        assert_eq!(rsp["return"], json!(3));
        assert_eq!(rsp["this"]["id"], json!(3));
    }

    #[test]
    fn this_with_unknown_state_keys_is_construction_error() {
        let engine = Engine::new(Arc::new(plain_registry()), EngineConfig::new());
        let rsp = engine.invoke(&json!({
            "package": "demo",
            "class": "Box",
            "this": {"type": "demo.Box", "value": {"nope": 1}},
            "method": "get_id",
        }));
        assert_eq!(rsp["ok"], json!(false));
        assert_eq!(rsp["throw"], json!("ConstructionError"));
    }
}
