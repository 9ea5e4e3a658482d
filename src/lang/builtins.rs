//! Native functions exposed to programs by name.
//!
//! Every builtin checks its arity and argument types and reports misuse by
//! returning an `Object::Error` rather than failing the caller.

use crate::lang::object::{Builtin, NULL, Object};

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: len,
    },
    Builtin {
        name: "first",
        func: first,
    },
    Builtin {
        name: "last",
        func: last,
    },
    Builtin {
        name: "rest",
        func: rest,
    },
    Builtin {
        name: "push",
        func: push,
    },
];

/// Looks up a builtin by name.
pub fn lookup(name: &str) -> Option<Object> {
    BUILTINS
        .iter()
        .find(|b| b.name == name)
        .map(|b| Object::Builtin(*b))
}

fn error(msg: String) -> Object {
    Object::Error(msg)
}

fn check_arity(args: &[Object], want: usize) -> Result<(), Object> {
    if args.len() != want {
        return Err(error(format!(
            "wrong number of arguments. got={}, want={}",
            args.len(),
            want
        )));
    }
    Ok(())
}

fn array_arg<'a>(name: &str, arg: &'a Object) -> Result<&'a [Object], Object> {
    match arg {
        Object::Array(items) => Ok(items),
        other => Err(error(format!(
            "argument to `{}` must be ARRAY, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn len(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match &args[0] {
        Object::String(s) => Object::Integer(s.chars().count() as i64),
        Object::Array(items) => Object::Integer(items.len() as i64),
        other => error(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        )),
    }
}

fn first(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match array_arg("first", &args[0]) {
        Ok(items) => items.first().cloned().unwrap_or(NULL),
        Err(e) => e,
    }
}

fn last(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match array_arg("last", &args[0]) {
        Ok(items) => items.last().cloned().unwrap_or(NULL),
        Err(e) => e,
    }
}

fn rest(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match array_arg("rest", &args[0]) {
        Ok([]) => NULL,
        Ok([_, tail @ ..]) => Object::Array(tail.to_vec()),
        Err(e) => e,
    }
}

fn push(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 2) {
        return e;
    }
    match array_arg("push", &args[0]) {
        Ok(items) => {
            let mut pushed = Vec::with_capacity(items.len() + 1);
            pushed.extend_from_slice(items);
            pushed.push(args[1].clone());
            Object::Array(pushed)
        }
        Err(e) => e,
    }
}
