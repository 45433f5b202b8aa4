// This module lets generated routines print traced values at run time. Message templates
// use {n} placeholders (and {} for the next argument); at trace time every placeholder is
// replaced with the format fragment of its argument, the argument values are spilled into a
// stack buffer of 64-bit slots, the finished format string is embedded as constant data,
// and a single host call to the runtime formatter is emitted. Nothing here needs backend
// support beyond ordinary calls, stores and constants. rr_log! adds the constructing
// module, file and line in front of the message; rr_watch! prints a list of expressions
// under their own source text.

//! Print/trace facility.
//!
//! ```ignore
//! let x = f.arg::<Int>(0).rvalue();
//! rr_log!(&f, "x = {0}, x * 2 = {1}", x, x * 2);
//! rr_watch!(&f, x);
//! ```

pub mod runtime;
pub mod value;

pub use runtime::{capture, format_slots};
pub use value::{PrintArgs, PrintValue};

use crate::core::{Session, Type, Value};
use std::fmt;

/// Where a print call was traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub function: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.file, self.line, self.function)
    }
}

/// Expand `{n}` and `{}` placeholders of `template` with `fragments`.
///
/// Returns the printf format and the argument index of every substituted
/// fragment in order. `%` in the template is escaped, `{{` and `}}` are
/// literal braces, and placeholders naming a missing argument are kept as text.
pub fn substitute(template: &str, fragments: &[String]) -> (String, Vec<usize>) {
    let mut format = String::with_capacity(template.len());
    let mut order = Vec::new();
    let mut next = 0;
    let mut rest = template;

    while let Some(ch) = rest.chars().next() {
        rest = &rest[ch.len_utf8()..];
        match ch {
            '%' => format.push_str("%%"),
            '{' if rest.starts_with('{') => {
                format.push('{');
                rest = &rest[1..];
            }
            '}' if rest.starts_with('}') => {
                format.push('}');
                rest = &rest[1..];
            }
            '{' => {
                let Some(end) = rest.find('}') else {
                    format.push('{');
                    continue;
                };
                let name = rest[..end].trim();
                let index = if name.is_empty() {
                    Some(next)
                } else {
                    name.parse::<usize>().ok()
                };
                match index.filter(|&i| i < fragments.len()) {
                    Some(i) => {
                        format.push_str(&fragments[i]);
                        order.push(i);
                        next = i + 1;
                    }
                    None => {
                        log::warn!("print placeholder {{{}}} has no argument", name);
                        format.push('{');
                        format.push_str(&rest[..end]);
                        format.push('}');
                    }
                }
                rest = &rest[end + 1..];
            }
            _ => format.push(ch),
        }
    }
    (format, order)
}

/// Print `template` with `args` when the routine runs.
pub fn printv<'s>(session: &'s Session, template: &str, args: &[&dyn PrintValue<'s>]) {
    let lowered: Vec<PrintArgs> = args.iter().map(|arg| arg.print_args(session)).collect();
    let fragments: Vec<String> = lowered.iter().map(|args| args.format.clone()).collect();
    let (format, order) = substitute(template, &fragments);
    let values: Vec<Value> = order
        .iter()
        .flat_map(|&i| lowered[i].values.iter().copied())
        .collect();
    emit_print(session, format, &values);
}

/// [`printv`] prefixed with `location` and terminated by a newline.
pub fn printv_at<'s>(session: &'s Session, location: Location, template: &str, args: &[&dyn PrintValue<'s>]) {
    // Braces in the location are literal.
    let location = location.to_string().replace('{', "{{").replace('}', "}}");
    let template = format!("{location}: {template}\n");
    printv(session, &template, args);
}

/// Template `a: {0}, b: {1}\n` for the watched expressions `names`.
pub fn watch_template(names: &[&str]) -> String {
    let fields: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}: {{{}}}", name.replace('{', "{{").replace('}', "}}"), i))
        .collect();
    fields.join(", ") + "\n"
}

fn emit_print(session: &Session, format: String, values: &[Value]) {
    let mut bytes = format.into_bytes();
    bytes.push(0);
    let format = session.constant_data(&bytes);
    let buffer = value::spill_slots(session, values);
    let count = session.free_value(|b| b.create_constant_int(Type::U32, values.len() as i64));

    let helper: unsafe extern "C" fn(*const u8, *const u64, u32) = runtime::reactor_print;
    // SAFETY: reactor_print takes (format, slots, count) as declared and lives
    // for the whole process.
    unsafe {
        session.call_host(
            helper as usize,
            &[Type::PTR, Type::PTR, Type::U32],
            None,
            &[format, buffer, count],
        );
    }
}

/// Print a message with the tracing location in front.
#[macro_export]
macro_rules! rr_log {
    ($session:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $crate::print::printv_at(
            $session,
            $crate::print::Location {
                function: module_path!(),
                file: file!(),
                line: line!(),
            },
            $template,
            &[$(&$arg as &dyn $crate::print::PrintValue<'_>),*],
        )
    };
}

/// Print each expression next to its source text.
#[macro_export]
macro_rules! rr_watch {
    ($session:expr, $($arg:expr),+ $(,)?) => {
        $crate::print::printv(
            $session,
            &$crate::print::watch_template(&[$(stringify!($arg)),+]),
            &[$(&$arg as &dyn $crate::print::PrintValue<'_>),+],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_placeholders() {
        let (format, order) = substitute("b={1} a={0} b={1}", &fragments(&["%d", "%f"]));
        assert_eq!(format, "b=%f a=%d b=%f");
        assert_eq!(order, vec![1, 0, 1]);
    }

    #[test]
    fn test_sequential_placeholders_and_escapes() {
        let (format, order) = substitute("{} and {} at 100% {{x}}", &fragments(&["%u", "%p"]));
        assert_eq!(format, "%u and %p at 100%% {x}");
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_missing_argument_is_literal() {
        let (format, order) = substitute("{3} {name}", &fragments(&["%d"]));
        assert_eq!(format, "{3} {name}");
        assert!(order.is_empty());
    }

    #[test]
    fn test_watch_template() {
        assert_eq!(watch_template(&["x", "y + 1"]), "x: {0}, y + 1: {1}\n");
    }
}
