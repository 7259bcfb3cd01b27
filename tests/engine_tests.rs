mod common;

use std::io;
use std::rc::Rc;

use common::{add_module, call_global, load, numbers, returning, top_level};
use rand::Rng;
use rstest::rstest;
use shark::encoder::CodeBuilder;
use shark::parser::module::{Constant, Import, ModuleImage};
use shark::parser::opcode::{Arith, Opcode};
use shark::runtime::{Class, ErrorKind, Function, Interpreter, Module, RuntimeError, Value};

/// Emits `class name(parent): <methods>` where each method is
/// `(name constant, arity, body)`. `parent` is a name constant or `None`.
fn class(
    code: &mut CodeBuilder,
    name: u16,
    parent: Option<u16>,
    methods: &[(u16, u8, Vec<u8>)],
) {
    match parent {
        Some(parent) => code.op_u16(Opcode::LoadGlobal, parent),
        None => code.op(Opcode::Null),
    };
    code.op_u16(Opcode::EnterClass, name);
    for (method, arity, body) in methods {
        code.function(*arity, *method, body);
    }
    code.op(Opcode::ExitClass);
}

/// `init(self)` that does nothing.
fn empty_init() -> Vec<u8> {
    let mut body = CodeBuilder::new();
    body.op(Opcode::Null);
    returning(body)
}

#[test]
fn test_cross_module_call() {
    // app: from lib import add; result = add(2, 3)
    let mut app = ModuleImage::new("app");
    app.imports.push(Import::names("lib", &["add"]));
    let add = app.name_constant("add");
    let result = app.name_constant("result");
    let two = app.add_constant(Constant::Integer(2));
    let three = app.add_constant(Constant::Integer(3));
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::LoadGlobal, add)
        .op_u16(Opcode::Const, two)
        .op_u16(Opcode::Const, three)
        .op_u8(Opcode::FunctionCall, 2)
        .op_u16(Opcode::Define, result);
    app.code = top_level(code);

    let mut interp = load(vec![add_module(), app]);
    let app = interp.import("app").unwrap();
    assert_eq!(app.get("result"), Some(Value::Number(5.0)));
    assert_eq!(interp.stack().depth(), 0);
}

#[test]
fn test_free_call_arity_error() {
    let mut interp = load(vec![add_module()]);
    let lib = interp.import("lib").unwrap();
    let err = call_global(&mut interp, &lib, "add", numbers(&[1.0])).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Arity { expected: 2, actual: 1, .. }
    ));
    assert_eq!(err.trace().len(), 1);
    assert_eq!(err.trace()[0].name(), "add");
    assert_eq!(interp.stack().depth(), 0);
}

#[test]
fn test_method_arity_error_names_method() {
    // class Point: def scale(self, k): return k
    // Point().scale()
    let mut app = ModuleImage::new("app");
    let point = app.name_constant("Point");
    let init = app.name_constant("init");
    let scale = app.name_constant("scale");
    let mut scale_body = CodeBuilder::new();
    scale_body.op_u8(Opcode::Load, 1);
    let mut code = CodeBuilder::new();
    class(
        &mut code,
        point,
        None,
        &[(init, 0, empty_init()), (scale, 1, returning(scale_body))],
    );
    code.op_u16(Opcode::LoadGlobal, point)
        .op_u8(Opcode::New, 0)
        .call_named(Opcode::MethodCall, 0, scale);
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let err = interp.import("app").unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Arity { expected: 1, actual: 0, .. }
    ));
    let method = &err.trace()[0];
    assert_eq!(method.name(), "scale");
    assert!(method.is_method());
    assert_eq!(
        err.report(),
        "in module 'app', class 'Point', method 'scale'.\n\
         function 'scale' expects 1 argument(s), got 0"
    );
}

#[test]
fn test_constructor_sets_fields() {
    // class Counter:
    //     def init(self, start): self.count = start
    //     def get(self): return self.count
    // result = Counter(5).get()
    let mut app = ModuleImage::new("app");
    let counter = app.name_constant("Counter");
    let init = app.name_constant("init");
    let get = app.name_constant("get");
    let count = app.name_constant("count");
    let result = app.name_constant("result");
    let five = app.add_constant(Constant::Integer(5));

    let mut init_body = CodeBuilder::new();
    init_body
        .op(Opcode::SelfRef)
        .op_u8(Opcode::Load, 1)
        .op_u16(Opcode::SetField, count)
        .op(Opcode::Null);
    let mut get_body = CodeBuilder::new();
    get_body.op(Opcode::SelfRef).op_u16(Opcode::GetField, count);

    let mut code = CodeBuilder::new();
    class(
        &mut code,
        counter,
        None,
        &[(init, 1, returning(init_body)), (get, 0, returning(get_body))],
    );
    code.op_u16(Opcode::LoadGlobal, counter)
        .op_u16(Opcode::Const, five)
        .op_u8(Opcode::New, 1)
        .call_named(Opcode::MethodCall, 0, get)
        .op_u16(Opcode::Define, result);
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    assert_eq!(app.get("result"), Some(Value::Number(5.0)));

    // The same object from the host.
    let class = match app.get("Counter") {
        Some(Value::Class(class)) => class,
        other => panic!("expected a class, got {other:?}"),
    };
    let instance = class.instantiate().unwrap();
    interp
        .call_method(instance.clone(), "init", numbers(&[9.0]))
        .unwrap();
    let value = interp.call_method(instance, "get", Vec::new()).unwrap();
    assert_eq!(value, Value::Number(9.0));
}

#[test]
fn test_new_requires_init() {
    let mut app = ModuleImage::new("app");
    let bare = app.name_constant("Bare");
    let mut code = CodeBuilder::new();
    class(&mut code, bare, None, &[]);
    code.op_u16(Opcode::LoadGlobal, bare).op_u8(Opcode::New, 0).op(Opcode::Drop);
    app.code = top_level(code);

    let err = load(vec![app]).import("app").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Dispatch(_)));
    assert_eq!(err.to_string(), "class 'Bare' has no constructor");
}

#[test]
fn test_abstract_class_cannot_be_constructed() {
    let shapes = Rc::new(Module::native("shapes"));
    shapes.set(
        "Shape",
        Value::Class(Rc::new(Class::new_abstract("Shape", None))),
    );

    let mut app = ModuleImage::new("app");
    app.imports.push(Import::names("shapes", &["Shape"]));
    let shape = app.name_constant("Shape");
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::LoadGlobal, shape).op_u8(Opcode::New, 0).op(Opcode::Drop);
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    interp.linker().register_native(shapes);
    let err = interp.import("app").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::AbstractClass(name) if name == "Shape"));
}

#[test]
fn test_super_calls_through_three_levels() {
    // class A: def value(self): return 1
    // class B(A): def value(self): return super.value() + 10
    // class C(B): def value(self): return super.value() + 100
    // class D(C): pass
    // result = D().value()
    let mut app = ModuleImage::new("app");
    let names: Vec<u16> = ["A", "B", "C", "D"]
        .iter()
        .map(|n| app.name_constant(n))
        .collect();
    let init = app.name_constant("init");
    let value = app.name_constant("value");
    let result = app.name_constant("result");
    let one = app.add_constant(Constant::Integer(1));
    let ten = app.add_constant(Constant::Integer(10));
    let hundred = app.add_constant(Constant::Integer(100));

    let mut base = CodeBuilder::new();
    base.op_u16(Opcode::Const, one);
    let deferring = |addend: u16| {
        let mut body = CodeBuilder::new();
        body.op(Opcode::SelfRef)
            .call_named(Opcode::SuperCall, 0, value)
            .op_u16(Opcode::Const, addend)
            .op(Opcode::Add);
        returning(body)
    };

    let mut code = CodeBuilder::new();
    class(
        &mut code,
        names[0],
        None,
        &[(init, 0, empty_init()), (value, 0, returning(base))],
    );
    class(&mut code, names[1], Some(names[0]), &[(value, 0, deferring(ten))]);
    class(&mut code, names[2], Some(names[1]), &[(value, 0, deferring(hundred))]);
    class(&mut code, names[3], Some(names[2]), &[]);
    code.op_u16(Opcode::LoadGlobal, names[3])
        .op_u8(Opcode::New, 0)
        .call_named(Opcode::MethodCall, 0, value)
        .op_u16(Opcode::Define, result);
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    assert_eq!(app.get("result"), Some(Value::Number(111.0)));
    assert_eq!(interp.stack().depth(), 0);
}

#[test]
fn test_instance_of_follows_parents() {
    let mut app = ModuleImage::new("app");
    let base = app.name_constant("Base");
    let derived = app.name_constant("Derived");
    let init = app.name_constant("init");
    let yes = app.name_constant("yes");
    let no = app.name_constant("no");
    let mut code = CodeBuilder::new();
    class(&mut code, base, None, &[(init, 0, empty_init())]);
    class(&mut code, derived, Some(base), &[]);
    code.op_u16(Opcode::LoadGlobal, derived)
        .op_u8(Opcode::New, 0)
        .op_u16(Opcode::LoadGlobal, base)
        .op(Opcode::InstanceOf)
        .op_u16(Opcode::Define, yes);
    code.op_u16(Opcode::LoadGlobal, base)
        .op_u8(Opcode::New, 0)
        .op_u16(Opcode::LoadGlobal, derived)
        .op(Opcode::InstanceOf)
        .op_u16(Opcode::Define, no);
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    assert_eq!(app.get("yes"), Some(Value::Bool(true)));
    assert_eq!(app.get("no"), Some(Value::Bool(false)));
}

#[test]
fn test_native_method_on_builtin_array() {
    // xs = []; xs.twice(7)
    let host = Rc::new(Module::native("host"));
    let twice = Function::native("twice", 1, &host, |interp: &mut Interpreter, base| {
        let receiver = interp.argument(base, 0);
        let item = interp.argument(base, 1);
        let items = receiver.as_array().ok_or("receiver is not an array")?;
        items.borrow_mut().push(item.clone());
        items.borrow_mut().push(item);
        Ok(Value::Null)
    });

    let mut app = ModuleImage::new("app");
    let name = app.name_constant("twice");
    let xs = app.name_constant("xs");
    let seven = app.add_constant(Constant::Integer(7));
    let mut code = CodeBuilder::new();
    code.op(Opcode::ArrayNew)
        .op(Opcode::ArrayClose)
        .op(Opcode::Dup)
        .op_u16(Opcode::Const, seven)
        .call_named(Opcode::MethodCall, 1, name)
        .op(Opcode::Drop)
        .op_u16(Opcode::Define, xs);
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    interp.builtins().array.define_method(Rc::new(twice));
    let app = interp.import("app").unwrap();
    assert_eq!(app.get("xs").unwrap().to_string(), "[7, 7]");
    assert_eq!(interp.stack().depth(), 0);
}

#[test]
fn test_method_on_null_is_type_error() {
    let mut app = ModuleImage::new("app");
    let name = app.name_constant("anything");
    let mut code = CodeBuilder::new();
    code.op(Opcode::Null).call_named(Opcode::MethodCall, 0, name);
    app.code = top_level(code);
    let err = load(vec![app]).import("app").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Type(_)));
}

#[test]
fn test_host_error_is_wrapped() {
    let host = Rc::new(Module::native("host"));
    host.define_native("read", 0, |_, _| {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
    });

    let mut interp = load(Vec::new());
    let err = call_global(&mut interp, &host, "read", Vec::new()).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Host(_)));
    assert_eq!(err.to_string(), "host error: denied");
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(err.report(), "in module 'host', function 'read'.\nhost error: denied");
}

#[test]
fn test_error_trace_is_innermost_first() {
    // def inner(): NOT null
    // def outer(): return inner()
    let mut app = ModuleImage::new("app");
    let inner = app.name_constant("inner");
    let outer = app.name_constant("outer");
    let mut inner_body = CodeBuilder::new();
    inner_body.op(Opcode::Null).op(Opcode::Not);
    let mut outer_body = CodeBuilder::new();
    outer_body
        .op_u16(Opcode::LoadGlobal, inner)
        .op_u8(Opcode::FunctionCall, 0);
    let mut code = CodeBuilder::new();
    code.function(0, inner, &returning(inner_body))
        .function(0, outer, &returning(outer_body));
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    let err = call_global(&mut interp, &app, "outer", Vec::new()).unwrap_err();
    let frames: Vec<&str> = err.trace().iter().map(|f| f.name()).collect();
    assert_eq!(frames, vec!["inner", "outer"]);
    assert_eq!(interp.stack().depth(), 0);
}

/// Builds `target = <literal>; target[key] op= operand` (or the field
/// form) and returns the updated value.
fn augmented(arith: Arith, start: i32, operand: i32, field: bool) -> Value {
    let mut app = ModuleImage::new("app");
    let target = app.name_constant("target");
    let key = app.name_constant("k");
    let start = app.add_constant(Constant::Integer(start));
    let operand = app.add_constant(Constant::Integer(operand));

    let mut code = CodeBuilder::new();
    code.op(Opcode::TableNew)
        .op_u16(Opcode::Const, key)
        .op_u16(Opcode::Const, start)
        .op(Opcode::TableNewInsert)
        .op(Opcode::TableClose)
        .op_u16(Opcode::Define, target);
    code.op_u16(Opcode::LoadGlobal, target);
    if field {
        code.op_u16(Opcode::Const, operand)
            .update_named(Opcode::SetFieldAu, arith, key);
    } else {
        code.op_u16(Opcode::Const, key)
            .op_u16(Opcode::Const, operand)
            .update_index(arith);
    }
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    assert_eq!(interp.stack().depth(), 0);
    let table = app.get("target").unwrap();
    let record = table.as_record().unwrap().borrow();
    record.get(&Value::string("k"))
}

#[test]
fn test_augmented_updates_match_plain_arithmetic() {
    let mut rng = rand::thread_rng();
    let ops: [(Arith, fn(f64, f64) -> f64); 3] = [
        (Arith::Add, |a, b| a + b),
        (Arith::Sub, |a, b| a - b),
        (Arith::Mul, |a, b| a * b),
    ];
    for _ in 0..20 {
        let a = rng.gen_range(-1000..1000);
        let b = rng.gen_range(-1000..1000);
        for (arith, plain) in ops {
            let expected = Value::Number(plain(f64::from(a), f64::from(b)));
            assert_eq!(augmented(arith, a, b, false), expected, "{arith:?} {a} {b}");
            assert_eq!(augmented(arith, a, b, true), expected, "{arith:?} {a} {b}");
        }
    }
}

#[test]
fn test_augmented_static_update() {
    // maths.total += 5, where maths is an aliased module
    let mut lib = ModuleImage::new("lib");
    let total = lib.name_constant("total");
    let ten = lib.add_constant(Constant::Integer(10));
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::Const, ten).op_u16(Opcode::Define, total);
    lib.code = top_level(code);

    let mut app = ModuleImage::new("app");
    app.imports.push(Import::alias("lib", "maths"));
    let maths = app.name_constant("maths");
    let total = app.name_constant("total");
    let five = app.add_constant(Constant::Integer(5));
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::LoadGlobal, maths)
        .op_u16(Opcode::Const, five)
        .update_named(Opcode::SetStaticAu, Arith::Add, total);
    app.code = top_level(code);

    let mut interp = load(vec![lib, app]);
    interp.import("app").unwrap();
    let lib = interp.linker().live("lib").unwrap();
    assert_eq!(lib.get("total"), Some(Value::Number(15.0)));
}

#[test]
fn test_string_size_counts_characters() {
    let mut app = ModuleImage::new("app");
    let word = app.add_constant(Constant::Str("naïve".to_string()));
    let result = app.name_constant("result");
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::Const, word)
        .op(Opcode::SizeOf)
        .op_u16(Opcode::Define, result);
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    assert_eq!(app.get("result"), Some(Value::Number(5.0)));
}

/// Trace frames as `Class.method` or `function`, innermost first.
fn frames(err: &RuntimeError) -> Vec<String> {
    err.trace()
        .iter()
        .map(|f| match f.class() {
            Some(class) => format!("{}.{}", class.name(), f.name()),
            None => f.name().to_string(),
        })
        .collect()
}

/// Body that records it ran by defining the global `touched`, then
/// returns its first argument.
fn touching(touched: u16) -> Vec<u8> {
    let mut body = CodeBuilder::new();
    body.op(Opcode::True)
        .op_u16(Opcode::Define, touched)
        .op_u8(Opcode::Load, 1);
    returning(body)
}

#[test]
fn test_super_call_arity_error() {
    // class A: def m(self, x): touched = true; return x
    // class B(A): def m(self, x): return super.m()
    // def run(): return B().m(1)
    let mut app = ModuleImage::new("app");
    let a = app.name_constant("A");
    let b = app.name_constant("B");
    let init = app.name_constant("init");
    let m = app.name_constant("m");
    let run = app.name_constant("run");
    let touched = app.name_constant("touched");
    let one = app.add_constant(Constant::Integer(1));

    let mut override_body = CodeBuilder::new();
    override_body
        .op(Opcode::SelfRef)
        .call_named(Opcode::SuperCall, 0, m);
    let mut run_body = CodeBuilder::new();
    run_body
        .op_u16(Opcode::LoadGlobal, b)
        .op_u8(Opcode::New, 0)
        .op_u16(Opcode::Const, one)
        .call_named(Opcode::MethodCall, 1, m);

    let mut code = CodeBuilder::new();
    class(
        &mut code,
        a,
        None,
        &[(init, 0, empty_init()), (m, 1, touching(touched))],
    );
    class(&mut code, b, Some(a), &[(m, 1, returning(override_body))]);
    code.function(0, run, &returning(run_body));
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    let err = call_global(&mut interp, &app, "run", Vec::new()).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Arity { expected: 1, actual: 0, .. }
    ));
    assert_eq!(err.to_string(), "function 'm' expects 1 argument(s), got 0");
    assert_eq!(frames(&err), vec!["A.m", "B.m", "run"]);
    assert!(app.get("touched").is_none());
    assert_eq!(interp.stack().depth(), 0);
}

#[test]
fn test_constructor_arity_error() {
    // class A: def init(self, x): touched = true
    // def run(): return A()
    let mut app = ModuleImage::new("app");
    let a = app.name_constant("A");
    let init = app.name_constant("init");
    let run = app.name_constant("run");
    let touched = app.name_constant("touched");

    let mut run_body = CodeBuilder::new();
    run_body.op_u16(Opcode::LoadGlobal, a).op_u8(Opcode::New, 0);
    let mut code = CodeBuilder::new();
    class(&mut code, a, None, &[(init, 1, touching(touched))]);
    code.function(0, run, &returning(run_body));
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    let err = call_global(&mut interp, &app, "run", Vec::new()).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Arity { expected: 1, actual: 0, .. }
    ));
    assert_eq!(frames(&err), vec!["A.init", "run"]);
    assert!(app.get("touched").is_none());
    assert_eq!(interp.stack().depth(), 0);
}

#[test]
fn test_super_call_without_supermethod() {
    // class A: def m(self): return super.m()
    // def run(): return A().m()
    let mut app = ModuleImage::new("app");
    let a = app.name_constant("A");
    let init = app.name_constant("init");
    let m = app.name_constant("m");
    let run = app.name_constant("run");

    let mut m_body = CodeBuilder::new();
    m_body.op(Opcode::SelfRef).call_named(Opcode::SuperCall, 0, m);
    let mut run_body = CodeBuilder::new();
    run_body
        .op_u16(Opcode::LoadGlobal, a)
        .op_u8(Opcode::New, 0)
        .call_named(Opcode::MethodCall, 0, m);
    let mut code = CodeBuilder::new();
    class(
        &mut code,
        a,
        None,
        &[(init, 0, empty_init()), (m, 0, returning(m_body))],
    );
    code.function(0, run, &returning(run_body));
    app.code = top_level(code);

    let mut interp = load(vec![app]);
    let app = interp.import("app").unwrap();
    let err = call_global(&mut interp, &app, "run", Vec::new()).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Dispatch(_)));
    assert_eq!(err.to_string(), "method 'm' of class 'A' has no supermethod");
    assert_eq!(frames(&err), vec!["A.m", "run"]);
}

#[rstest]
#[case::instance(true, "A object has no method 'missing'")]
#[case::table(false, "table object has no method 'missing'")]
fn test_missing_method_on_record(#[case] instance: bool, #[case] message: &str) {
    let mut app = ModuleImage::new("app");
    let a = app.name_constant("A");
    let init = app.name_constant("init");
    let missing = app.name_constant("missing");
    let mut code = CodeBuilder::new();
    class(&mut code, a, None, &[(init, 0, empty_init())]);
    if instance {
        code.op_u16(Opcode::LoadGlobal, a).op_u8(Opcode::New, 0);
    } else {
        code.op(Opcode::TableNew).op(Opcode::TableClose);
    }
    code.call_named(Opcode::MethodCall, 0, missing).op(Opcode::Drop);
    app.code = top_level(code);

    let err = load(vec![app]).import("app").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Dispatch(_)));
    assert_eq!(err.to_string(), message);
}

/// `def f(n): if n < 1: return 0 else: return f(n - 1)`
fn countdown() -> ModuleImage {
    let mut app = ModuleImage::new("app");
    let f = app.name_constant("f");
    let one = app.add_constant(Constant::Integer(1));
    let mut body = CodeBuilder::new();
    body.op_u8(Opcode::Load, 0)
        .op_u16(Opcode::Const, one)
        .op(Opcode::Lt);
    let recurse = body.jump(Opcode::If);
    body.op(Opcode::Zero).op(Opcode::Return);
    body.place(recurse).unwrap();
    body.op_u16(Opcode::LoadGlobal, f)
        .op_u8(Opcode::Load, 0)
        .op_u16(Opcode::Const, one)
        .op(Opcode::Sub)
        .op_u8(Opcode::FunctionCall, 1);
    let mut code = CodeBuilder::new();
    code.function(1, f, &returning(body));
    app.code = top_level(code);
    app
}

#[test]
fn test_deep_recursion_under_default_limit() {
    let mut interp = load(vec![countdown()]);
    let app = interp.import("app").unwrap();
    let result = call_global(&mut interp, &app, "f", numbers(&[1000.0])).unwrap();
    assert_eq!(result, Value::Number(0.0));
    assert_eq!(interp.stack().depth(), 0);
}

#[test]
fn test_runaway_recursion_hits_depth_limit() {
    let mut interp = load(vec![countdown()]);
    let app = interp.import("app").unwrap();
    let err = call_global(&mut interp, &app, "f", numbers(&[100_000.0])).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::CallDepthExceeded(1024)));
    assert_eq!(interp.stack().depth(), 0);
}
