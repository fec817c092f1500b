// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema printing.
//!
//! `Display` renders the human-readable form (`array?<long>`); the short
//! form uses the grammar letters and parses back into an equal schema.

use std::fmt::{self, Write};

use super::{Schema, SchemaKind, TypeReference, TypeReferenceHint, TypeReferenceTarget};
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Format {
    HumanReadable,
    Short,
}

impl Format {
    fn pick(self, long: &'static str, short: &'static str) -> &'static str {
        match self {
            Format::HumanReadable => long,
            Format::Short => short,
        }
    }
}

impl Schema {
    /// Compact form using the parser's type letters.
    #[must_use]
    pub fn to_short_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_schema(&mut out, self, Format::Short);
        out
    }

    fn type_names(&self) -> (&'static str, &'static str) {
        match &self.kind {
            SchemaKind::Untyped => ("untyped", "u"),
            SchemaKind::Void => ("void", "v"),
            SchemaKind::Int => ("int", "i"),
            SchemaKind::Long => ("long", "l"),
            SchemaKind::Double => ("double", "d"),
            SchemaKind::Bool => ("bool", "b"),
            SchemaKind::String => ("string", "s"),
            SchemaKind::TypedArray => ("typedarray", "t"),
            SchemaKind::Date => ("date", "date"),
            SchemaKind::TypeReference(_) => ("ref", "r"),
            SchemaKind::GenericTypeReference(_) => ("genref", "g"),
            SchemaKind::Class(_) => ("class", "c"),
            SchemaKind::Enum(_) => ("enum", "e"),
            SchemaKind::Function(_) => ("func", "f"),
            SchemaKind::Array(_) => ("array", "a"),
            SchemaKind::Map(..) => ("map", "m"),
            SchemaKind::Es6Map(..) => ("es6map", "%"),
            SchemaKind::Es6Set(_) => ("es6set", "@"),
            SchemaKind::Promise(_) => ("promise", "p"),
            SchemaKind::SchemaReference(_) => ("link", "link"),
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_schema(f, self, Format::HumanReadable)
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type_reference(f, self, Format::HumanReadable)
    }
}

fn write_list<W: Write, T>(
    out: &mut W,
    items: &[T],
    start: &str,
    end: &str,
    mut item: impl FnMut(&mut W, &T) -> fmt::Result,
) -> fmt::Result {
    out.write_str(start)?;
    for (i, entry) in items.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        item(out, entry)?;
    }
    out.write_str(end)
}

fn write_type_reference<W: Write>(
    out: &mut W,
    reference: &TypeReference,
    format: Format,
) -> fmt::Result {
    match &reference.target {
        TypeReferenceTarget::Named(name) => {
            match reference.hint {
                TypeReferenceHint::Unknown => {}
                TypeReferenceHint::Object => write!(out, "<{}>", format.pick("object", "o"))?,
                TypeReferenceHint::Enum => write!(out, "<{}>", format.pick("enum", "e"))?,
                TypeReferenceHint::Converted => {
                    write!(out, "<{}>", format.pick("converted", "c"))?;
                }
            }
            write!(out, ":'{}'", name)
        }
        TypeReferenceTarget::Positional(index) => write!(out, ":{}", index),
    }
}

fn write_enum_value<W: Write>(out: &mut W, value: &Value) -> fmt::Result {
    match value.as_str() {
        Some(s) => write!(out, "'{}'", s),
        None => write!(out, "{}", value),
    }
}

fn write_schema<W: Write>(out: &mut W, schema: &Schema, format: Format) -> fmt::Result {
    let (long, short) = schema.type_names();
    out.write_str(format.pick(long, short))?;
    if schema.boxed {
        out.write_char('@')?;
    }
    if schema.optional {
        out.write_char('?')?;
    }

    match &schema.kind {
        SchemaKind::Untyped
        | SchemaKind::Void
        | SchemaKind::Int
        | SchemaKind::Long
        | SchemaKind::Double
        | SchemaKind::Bool
        | SchemaKind::String
        | SchemaKind::TypedArray
        | SchemaKind::Date => Ok(()),
        SchemaKind::TypeReference(reference) => write_type_reference(out, reference, format),
        SchemaKind::GenericTypeReference(generic) => {
            write_type_reference(out, &generic.base, format)?;
            write_list(out, &generic.arguments, "<", ">", |out, arg| {
                write_schema(out, arg, format)
            })
        }
        SchemaKind::Class(class) => {
            if class.is_interface {
                out.write_char('+')?;
            }
            write!(out, " '{}'", class.name)?;
            write_list(out, &class.properties, "{", "}", |out, property| {
                write!(out, "'{}': ", property.name)?;
                write_schema(out, &property.schema, format)
            })
        }
        SchemaKind::Enum(enumeration) => {
            out.write_char('<')?;
            write_schema(out, &enumeration.case_schema, format)?;
            write!(out, "> '{}'", enumeration.name)?;
            write_list(out, &enumeration.cases, "{", "}", |out, case| {
                write!(out, "'{}': ", case.name)?;
                write_enum_value(out, &case.value)
            })
        }
        SchemaKind::Function(function) => {
            let attributes = function.attributes;
            if !attributes.is_empty() {
                let mut names = Vec::new();
                if attributes.is_method {
                    names.push(format.pick("method", "m"));
                }
                if attributes.is_single_call {
                    names.push(format.pick("singlecall", "s"));
                }
                if attributes.dispatch_to_worker {
                    names.push(format.pick("worker", "w"));
                }
                write_list(out, &names, "|", "|", |out, name| out.write_str(name))?;
            }
            write_list(out, &function.parameters, "(", ")", |out, param| {
                write_schema(out, param, format)
            })?;
            out.write_str(": ")?;
            write_schema(out, &function.return_schema, format)
        }
        SchemaKind::Array(item) | SchemaKind::Es6Set(item) | SchemaKind::Promise(item) => {
            out.write_char('<')?;
            write_schema(out, item, format)?;
            out.write_char('>')
        }
        SchemaKind::Map(key, value) | SchemaKind::Es6Map(key, value) => {
            out.write_char('<')?;
            write_schema(out, key, format)?;
            out.write_str(", ")?;
            write_schema(out, value, format)?;
            out.write_char('>')
        }
        SchemaKind::SchemaReference(reference) => {
            out.write_char(':')?;
            write_schema(out, &reference.key, format)
        }
    }
}
