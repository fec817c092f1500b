// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive-descent parser for the compact schema grammar.
//!
//! Every type starts with a single letter, optionally followed by `@`
//! (boxed) and `?` (optional). Composite types continue with their own
//! delimited lists. Failures carry the byte position and a short excerpt of
//! the remaining input.

use std::sync::Arc;

use super::{
    ClassProperty, ClassSchema, EnumCase, EnumSchema, FunctionAttributes, FunctionSchema, Schema,
    TypeReference, TypeReferenceHint,
};
use crate::error::{Error, Result};
use crate::value::Value;

/// Number of characters shown after the failure position.
const EXCERPT_LEN: usize = 16;

/// Type letters with the long name used in error messages.
const TYPE_TOKENS: [(char, &str); 18] = [
    ('u', "untyped"),
    ('v', "void"),
    ('i', "int"),
    ('l', "long"),
    ('d', "double"),
    ('b', "bool"),
    ('s', "string"),
    ('t', "typedarray"),
    ('r', "ref"),
    ('g', "genref"),
    ('c', "class"),
    ('e', "enum"),
    ('f', "func"),
    ('a', "array"),
    ('m', "map"),
    ('%', "es6map"),
    ('@', "es6set"),
    ('p', "promise"),
];

/// Parse a complete schema; trailing input is an error.
pub(super) fn parse(text: &str) -> Result<Schema> {
    let mut parser = Parser::new(text);
    let outcome = parser.parse_schema().and_then(|schema| {
        parser.ensure_at_end()?;
        Ok(schema)
    });

    outcome.map_err(|failure| {
        log::debug!("[schema] parse failed for '{}'", text);
        Error::SchemaParse(format!(
            "At position {} ({}): {}",
            failure.position,
            excerpt(text, failure.position),
            failure.error.full_message()
        ))
    })
}

fn excerpt(text: &str, position: usize) -> String {
    let rest = text.get(position..).unwrap_or_default();
    if rest.is_empty() {
        return "<EOF>".to_string();
    }
    let mut shown: String = rest.chars().take(EXCERPT_LEN).collect();
    if shown.len() != rest.len() {
        shown.push('…');
    }
    shown
}

struct ParseFailure {
    position: usize,
    error: Error,
}

type ParseResult<T> = std::result::Result<T, ParseFailure>;

struct Parser<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, position: 0 }
    }

    // -- primitives ---------------------------------------------------------

    fn fail<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(ParseFailure {
            position: self.position,
            error: Error::SchemaParse(message.into()),
        })
    }

    fn rest(&self) -> &'a str {
        self.text.get(self.position..).unwrap_or_default()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_is(&self, c: char) -> bool {
        self.peek() == Some(c)
    }

    fn try_consume(&mut self, c: char) -> bool {
        if self.peek_is(c) {
            self.position += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn ensure_not_at_end(&self) -> ParseResult<()> {
        if self.rest().is_empty() {
            self.fail("Unexpectedly reached end of string")
        } else {
            Ok(())
        }
    }

    fn ensure_at_end(&self) -> ParseResult<()> {
        if self.rest().is_empty() {
            Ok(())
        } else {
            self.fail("Unexpectedly found trailing characters")
        }
    }

    fn expect(&mut self, c: char) -> ParseResult<()> {
        self.ensure_not_at_end()?;
        if self.try_consume(c) {
            Ok(())
        } else {
            self.fail(format!("Expecting character '{}'", c))
        }
    }

    fn skip_whitespaces(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.position += c.len_utf8();
        }
    }

    fn parse_quoted(&mut self) -> ParseResult<Arc<str>> {
        self.expect('\'')?;
        let rest = self.rest();
        match rest.find('\'') {
            Some(end) => {
                let name = Arc::from(&rest[..end]);
                self.position += end + 1;
                Ok(name)
            }
            None => {
                self.position = self.text.len();
                self.fail("Expecting character '''")
            }
        }
    }

    fn parse_int(&mut self) -> ParseResult<i64> {
        let rest = self.rest();
        let sign_len = usize::from(rest.starts_with('-'));
        let digits = rest[sign_len..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            return self.fail("Expecting int");
        }
        let end = sign_len + digits;
        match rest[..end].parse::<i64>() {
            Ok(value) => {
                self.position += end;
                Ok(value)
            }
            Err(_) => self.fail("Expecting int"),
        }
    }

    /// Delimited, comma-separated list. Whitespace is allowed after commas.
    fn parse_list<T>(
        &mut self,
        start: char,
        end: char,
        mut item: impl FnMut(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        self.expect(start)?;
        let mut items = Vec::new();
        loop {
            self.ensure_not_at_end()?;
            if self.try_consume(end) {
                return Ok(items);
            }
            if !items.is_empty() {
                self.expect(',')?;
                self.skip_whitespaces();
            }
            items.push(item(self)?);
        }
    }

    // -- schemas ------------------------------------------------------------

    fn parse_schema(&mut self) -> ParseResult<Schema> {
        let Some(&(letter, name)) = TYPE_TOKENS.iter().find(|(letter, _)| self.peek_is(*letter))
        else {
            return self.fail("Unrecognized token");
        };
        self.position += letter.len_utf8();

        let boxed = self.try_consume('@');
        let optional = self.try_consume('?');

        let schema = self.parse_body(letter).map_err(|failure| ParseFailure {
            position: failure.position,
            error: failure
                .error
                .context(format!("Failed to parse schema of type '{}'", name)),
        })?;

        Ok(schema.with_flags(optional, boxed))
    }

    fn parse_body(&mut self, letter: char) -> ParseResult<Schema> {
        match letter {
            'u' => Ok(Schema::untyped()),
            'v' => Ok(Schema::void()),
            'i' => Ok(Schema::int()),
            'l' => Ok(Schema::long()),
            'd' => Ok(Schema::double()),
            'b' => Ok(Schema::bool()),
            's' => Ok(Schema::string()),
            't' => Ok(Schema::typed_array()),
            'r' => self.parse_type_reference().map(Schema::type_reference),
            'g' => self.parse_generic_type_reference(),
            'c' => self.parse_class(),
            'e' => self.parse_enum(),
            'f' => self.parse_function(),
            'a' => self.parse_single_entry().map(Schema::array),
            'p' => self.parse_single_entry().map(Schema::promise),
            'm' => self
                .parse_two_entries()
                .map(|(key, value)| Schema::map(key, value)),
            '%' => self
                .parse_two_entries()
                .map(|(key, value)| Schema::es6_map(key, value)),
            '@' => {
                let mut entries = self.parse_list('<', '>', Self::parse_schema)?;
                if entries.len() != 1 {
                    return self.fail("set definition should have one entry");
                }
                Ok(Schema::es6_set(entries.remove(0)))
            }
            _ => self.fail("Unrecognized token"),
        }
    }

    fn parse_type_reference(&mut self) -> ParseResult<TypeReference> {
        let mut hint = TypeReferenceHint::Unknown;
        if self.try_consume('<') {
            hint = if self.try_consume('u') {
                TypeReferenceHint::Unknown
            } else if self.try_consume('o') {
                TypeReferenceHint::Object
            } else if self.try_consume('e') {
                TypeReferenceHint::Enum
            } else if self.try_consume('c') {
                TypeReferenceHint::Converted
            } else {
                return self.fail("Invalid type reference type hint");
            };
            self.expect('>')?;
        }

        self.expect(':')?;

        if self.peek_is('\'') {
            let name = self.parse_quoted()?;
            Ok(TypeReference::named(name).with_hint(hint))
        } else {
            let position = self.parse_int()?;
            match usize::try_from(position) {
                Ok(index) => Ok(TypeReference::positional(index)),
                Err(_) => self.fail("Expecting int"),
            }
        }
    }

    fn parse_generic_type_reference(&mut self) -> ParseResult<Schema> {
        let base = self.parse_type_reference()?;
        let arguments = self.parse_list('<', '>', Self::parse_schema)?;
        Ok(Schema::generic_type_reference(base, arguments))
    }

    fn parse_class(&mut self) -> ParseResult<Schema> {
        let is_interface = self.try_consume('+');
        self.skip_whitespaces();
        let name = self.parse_quoted()?;
        self.skip_whitespaces();

        let properties = self.parse_list('{', '}', |parser| {
            let name = parser.parse_quoted()?;
            parser.expect(':')?;
            parser.skip_whitespaces();
            let schema = parser.parse_schema()?;
            Ok(ClassProperty::new(name, schema))
        })?;

        Ok(Schema::class(ClassSchema::new(name, is_interface, properties)))
    }

    fn parse_enum(&mut self) -> ParseResult<Schema> {
        self.expect('<')?;
        let case_schema = self.parse_schema()?;
        self.expect('>')?;
        self.skip_whitespaces();
        let name = self.parse_quoted()?;
        self.skip_whitespaces();

        let cases = self.parse_list('{', '}', |parser| {
            let case_name = parser.parse_quoted()?;
            parser.expect(':')?;
            parser.skip_whitespaces();
            let value = if parser.peek_is('\'') {
                Value::from(parser.parse_quoted()?)
            } else {
                let raw = parser.parse_int()?;
                match i32::try_from(raw) {
                    Ok(v) => Value::Int(v),
                    Err(_) => return parser.fail("Expecting int"),
                }
            };
            Ok(EnumCase::new(case_name, value))
        })?;

        Ok(Schema::enumeration(EnumSchema::new(name, case_schema, cases)))
    }

    fn parse_function_attributes(&mut self) -> ParseResult<FunctionAttributes> {
        // Legacy single-character modifiers.
        let mut attributes = FunctionAttributes {
            is_method: self.try_consume('*'),
            is_single_call: self.try_consume('!'),
            dispatch_to_worker: false,
        };

        if self.peek_is('|') {
            self.parse_list('|', '|', |parser| {
                if parser.try_consume('m') {
                    attributes.is_method = true;
                } else if parser.try_consume('s') {
                    attributes.is_single_call = true;
                } else if parser.try_consume('w') {
                    attributes.dispatch_to_worker = true;
                } else {
                    return parser.fail("Unrecognized function attribute");
                }
                Ok(())
            })?;
        }

        Ok(attributes)
    }

    fn parse_function(&mut self) -> ParseResult<Schema> {
        let attributes = self.parse_function_attributes()?;
        let parameters = self.parse_list('(', ')', Self::parse_schema)?;

        let return_schema = if self.try_consume(':') {
            self.skip_whitespaces();
            self.parse_schema()?
        } else {
            Schema::void()
        };

        Ok(Schema::function(FunctionSchema::new(
            attributes,
            return_schema,
            parameters,
        )))
    }

    fn parse_single_entry(&mut self) -> ParseResult<Schema> {
        self.expect('<')?;
        let item = self.parse_schema()?;
        self.expect('>')?;
        Ok(item)
    }

    fn parse_two_entries(&mut self) -> ParseResult<(Schema, Schema)> {
        let entries = self.parse_list('<', '>', Self::parse_schema)?;
        let mut iter = entries.into_iter();
        match (iter.next(), iter.next(), iter.next()) {
            (Some(key), Some(value), None) => Ok((key, value)),
            _ => self.fail("map definition should have two entries"),
        }
    }
}
