//! Ready-made sample registry for tests and demos.
//!
//! Mirrors the reference target library shipped with the protocol's other
//! runtimes: a `unicall.test` package holding the `testutil` container with
//! arithmetic functions, an async variant, a callback consumer, and the
//! stateful `Test` class (`id`/`sex`/`name`).
//!
//! # Example
//!
//! ```
//! use unicall_registry::testing::sample_registry;
//!
//! let registry = sample_registry();
//! assert!(registry.resolve_function("unicall.test", "testutil", "minus").is_ok());
//! assert!(registry.resolve_class("unicall.test", "testutil$Test").is_ok());
//! ```

use crate::class::ClassBuilder;
use crate::entry::{CallArgs, CallError, FunctionEntry};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use unicall_types::{InstanceHandle, Value};

/// Qualified name of the sample `Test` class.
pub const TEST_CLASS: &str = "unicall.test.testutil$Test";

/// State of the sample `Test` class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub id: i64,
    pub sex: i64,
    pub name: String,
    /// Bumped by `touch`; lets tests observe instance reuse.
    #[serde(default)]
    pub hits: i64,
}

impl TestRecord {
    fn sex_str(&self) -> &'static str {
        match self.sex {
            0 => "Male",
            1 => "Female",
            _ => "Unknown",
        }
    }
}

fn new_test_instance(args: &CallArgs) -> Result<Value, CallError> {
    let record = TestRecord {
        id: args.int(0)?,
        sex: args.int(1)?,
        name: args.str(2)?.to_string(),
        hits: 0,
    };
    Ok(Value::Opaque(InstanceHandle::of(TEST_CLASS, record)))
}

fn with_record<R>(
    args: &CallArgs,
    f: impl FnOnce(&mut TestRecord) -> R,
) -> Result<R, CallError> {
    args.this()?
        .with_mut::<TestRecord, _, _>(f)
        .ok_or_else(|| CallError::BadReceiver(TEST_CLASS.into()))
}

/// Builds the sample registry.
#[must_use]
pub fn sample_registry() -> Registry {
    let mut registry = Registry::new();

    registry
        .package("unicall.test")
        .function(
            FunctionEntry::builder("test")
                .returns("str")
                .sync(|_| Ok(Value::Str("ok".into()))),
        )
        .class(
            ClassBuilder::new("testutil")
                .method(
                    FunctionEntry::builder("minus")
                        .param("a", "int")
                        .param("b", "int")
                        .returns("int")
                        .sync(|args| Ok(Value::Int(args.int(0)? - args.int(1)?))),
                )
                .method(
                    FunctionEntry::builder("plus")
                        .param("a", "int")
                        .param("b", "int")
                        .returns("int")
                        .sync(|args| Ok(Value::Int(args.int(0)? + args.int(1)?))),
                )
                .method(
                    FunctionEntry::builder("divide")
                        .param("a", "float")
                        .param("b", "float")
                        .returns("float")
                        .sync(|args| {
                            let b = args.float(1)?;
                            if b == 0.0 {
                                return Err(CallError::failed("division by zero"));
                            }
                            Ok(Value::Float(args.float(0)? / b))
                        }),
                )
                .method(
                    FunctionEntry::builder("delayed_minus")
                        .param("a", "int")
                        .param("b", "int")
                        .returns("int")
                        .asynchronous(|args| async move {
                            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                            Ok(Value::Int(args.int(0)? - args.int(1)?))
                        }),
                )
                .method(
                    FunctionEntry::builder("compute")
                        .param("a", "int")
                        .param("b", "int")
                        .param("callback", "def(a,b)")
                        .returns("int")
                        .sync(|args| {
                            let a = args.int(0)?;
                            let b = args.int(1)?;
                            let callback = args.opaque(2)?;
                            let out = callback
                                .call_callback(&[Value::Int(a), Value::Int(b)])
                                .map_err(CallError::Failed)?;
                            out.as_int().map(Value::Int).ok_or(CallError::BadArg {
                                index: 2,
                                expected: "callback returning int".into(),
                            })
                        }),
                )
                .method(
                    FunctionEntry::builder("repeat")
                        .param("text", "str")
                        .param("times", "int")
                        .returns("str")
                        .sync(|args| {
                            let times = usize::try_from(args.int(1)?).unwrap_or(0);
                            Ok(Value::Str(args.str(0)?.repeat(times)))
                        }),
                )
                .nested(
                    ClassBuilder::new("Test")
                        .decodes::<TestRecord>()
                        .constructor(
                            FunctionEntry::builder("new")
                                .param("id", "int")
                                .param("sex", "int")
                                .param("name", "str")
                                .returns(TEST_CLASS)
                                .sync(|args| new_test_instance(&args)),
                        )
                        .factory(
                            FunctionEntry::builder("get_test_instance")
                                .param("id", "int")
                                .param("sex", "int")
                                .param("name", "str")
                                .returns(TEST_CLASS)
                                .sync(|args| {
                                    if !(0..=1).contains(&args.int(1)?) {
                                        return Err(CallError::failed("sex must be 0 or 1"));
                                    }
                                    new_test_instance(&args)
                                }),
                        )
                        .factory(
                            FunctionEntry::builder("constructor")
                                .param("id", "int")
                                .param("sex", "int")
                                .param("name", "str")
                                .returns(TEST_CLASS)
                                .sync(|args| new_test_instance(&args)),
                        )
                        .factory(
                            FunctionEntry::builder("broken")
                                .returns(TEST_CLASS)
                                .sync(|_| Err(CallError::failed("broken factory"))),
                        )
                        .method(
                            FunctionEntry::builder("get_id")
                                .instance()
                                .returns("int")
                                .sync(|args| Ok(Value::Int(with_record(&args, |r| r.id)?))),
                        )
                        .method(
                            FunctionEntry::builder("get_sex")
                                .instance()
                                .returns("int")
                                .sync(|args| Ok(Value::Int(with_record(&args, |r| r.sex)?))),
                        )
                        .method(
                            FunctionEntry::builder("get_name")
                                .instance()
                                .returns("str")
                                .sync(|args| {
                                    Ok(Value::Str(with_record(&args, |r| r.name.clone())?))
                                }),
                        )
                        .method(
                            FunctionEntry::builder("get_sex_str")
                                .instance()
                                .returns("str")
                                .sync(|args| {
                                    Ok(Value::Str(
                                        with_record(&args, |r| r.sex_str().to_string())?,
                                    ))
                                }),
                        )
                        .method(
                            FunctionEntry::builder("set_name")
                                .instance()
                                .param("name", "str")
                                .sync(|args| {
                                    let name = args.str(0)?.to_string();
                                    with_record(&args, |r| r.name = name)?;
                                    Ok(Value::Null)
                                }),
                        )
                        .method(
                            FunctionEntry::builder("touch")
                                .instance()
                                .returns("int")
                                .sync(|args| {
                                    Ok(Value::Int(with_record(&args, |r| {
                                        r.hits += 1;
                                        r.hits
                                    })?))
                                }),
                        ),
                ),
        );

    registry
        .package("unicall.test.sub")
        .function(
            FunctionEntry::builder("leaf")
                .returns("bool")
                .sync(|_| Ok(Value::Bool(true))),
        );

    registry
}
