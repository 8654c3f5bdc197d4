//! Walks a parsed AST and builds the [`Spec`] it describes.
//!
//! Function calls are numbered in pre-order (a call takes its number before
//! its nested arguments are visited) and joiners have their own counter, so
//! an error path such as `3(amount).num` or `1(AND)` points at one place in
//! the input.

use crate::error::Result;
use crate::grammar::{ArgValue, FuncCall, Joiner, Node};
use crate::registry::Normaliser;
use crate::spec::Spec;
use crate::value::{Provenance, RawSection, RawValue};

pub struct Visitor<'a> {
    normaliser: Normaliser<'a>,
    func_count: usize,
    joiner_count: usize,
}

/// Digits become integers only when they read back identically, so `007`
/// stays the string it was written as.
fn number_value(text: &str) -> RawValue {
    match text.parse::<i64>() {
        Ok(n) if n.to_string() == text => RawValue::Int(n),
        _ => RawValue::Str(text.to_string()),
    }
}

impl<'a> Visitor<'a> {
    pub fn new(normaliser: Normaliser<'a>) -> Self {
        Visitor {
            normaliser,
            func_count: 0,
            joiner_count: 0,
        }
    }

    pub fn visit(&mut self, node: &Node) -> Result<Spec> {
        match node {
            Node::Func(call) => self.visit_func(call),
            Node::Join {
                joiner,
                left,
                right,
            } => self.visit_join(*joiner, left, right),
        }
    }

    fn visit_func(&mut self, call: &FuncCall) -> Result<Spec> {
        self.func_count += 1;
        let path = Provenance::indexed(self.func_count, &call.name);

        let mut raw = RawSection::new(call.name.clone());
        for (key, value) in &call.args {
            let value = match value {
                ArgValue::Number(text) => number_value(text),
                ArgValue::Str(text) => RawValue::Str(text.clone()),
                ArgValue::Func(inner) => RawValue::Spec(self.visit_func(inner)?),
            };
            raw = raw.with(key.clone(), value);
        }

        self.normaliser.normalise(&path, raw)
    }

    fn visit_join(&mut self, joiner: Joiner, left: &Node, right: &Node) -> Result<Spec> {
        self.joiner_count += 1;
        let path = Provenance::indexed(self.joiner_count, joiner.as_str());

        let left = self.visit(left)?;
        let right = self.visit(right)?;
        tracing::trace!(
            path = %path,
            left = left.kind(),
            right = right.kind(),
            "joining specs"
        );

        let joined = match joiner {
            Joiner::And => left.combine_with(&right),
            Joiner::Or => left.or_with(&right),
        }
        .map_err(|e| e.located(&path))?;

        joined
            .simplify(self.normaliser.context())
            .map_err(|e| e.located(&path))
    }
}
