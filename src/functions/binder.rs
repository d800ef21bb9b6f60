//! Binding: arity checks, static argument validation and constant folding.
//!
//! The parser produces a [`Raw`] tree of resolved names; the binder turns it
//! into the immutable [`Function`] tree that generators are created from.

use std::sync::Arc;

use tracing::{debug, trace};

use super::string::HashAlgorithm;
use super::{FunctionDef, FunctionKind, apply};
use crate::ast::expressions::Bound;
use crate::ast::{Function, NodeId, Param};
use crate::cache::Caches;
use crate::config::EngineConfig;
use crate::error::{ArityError, ParseError, Result};
use crate::generator::SelectorKind;
use crate::value::Val;

/// A parsed argument before binding.
#[derive(Debug)]
pub(crate) enum Raw {
    Val(Val),
    Call(RawCall),
}

#[derive(Debug)]
pub(crate) struct RawCall {
    pub name: String,
    pub def: &'static FunctionDef,
    pub args: Vec<Raw>,
    /// Byte offset of the call in the formula
    pub position: usize,
    /// Row position of a field reference
    pub field: Option<usize>,
}

pub(crate) struct Binder<'c> {
    caches: Arc<Caches>,
    config: &'c EngineConfig,
    next_node: usize,
}

impl<'c> Binder<'c> {
    pub(crate) fn new(caches: Arc<Caches>, config: &'c EngineConfig) -> Self {
        Binder {
            caches,
            config,
            next_node: 0,
        }
    }

    pub(crate) fn bind(&mut self, raw: Raw) -> Result<Param> {
        match raw {
            Raw::Val(v) => Ok(Param::Val(v)),
            Raw::Call(call) => self.bind_call(call).map(|f| Param::Function(Arc::new(f))),
        }
    }

    fn bind_call(&mut self, call: RawCall) -> Result<Function> {
        // Node ids are assigned in pre-order.
        let node = NodeId(self.next_node);
        self.next_node += 1;

        let def = call.def;
        let actual = call.args.len();
        if actual < def.min_params || def.max_params.is_some_and(|max| actual > max) {
            debug!(function = %call.name, position = call.position, actual, "wrong number of arguments");
            return Err(ArityError {
                function: call.name,
                min: def.min_params,
                max: def.max_params,
                actual,
            }
            .into());
        }

        let params = call
            .args
            .into_iter()
            .map(|arg| self.bind(arg))
            .collect::<Result<Vec<_>>>()?;
        let mut bound = self
            .validate(&call.name, def.kind, &params)
            .inspect_err(|e| debug!(function = %call.name, position = call.position, error = %e, "invalid argument"))?;
        bound.field = call.field;
        trace!(function = %call.name, position = call.position, ?node, "bound function");

        let kind = def.kind;
        let has_aggregate = kind.is_aggregate(params.len()) || params.iter().any(Param::has_aggregate);
        let requires_child_data = kind.requires_child_data() || params.iter().any(Param::requires_child_data);

        let mut function = Function {
            name: call.name,
            def,
            params,
            node,
            bound,
            folded: None,
            has_aggregate,
            requires_child_data,
            caches: Arc::clone(&self.caches),
        };

        if kind.is_foldable(function.params.len()) {
            let constants: Option<Vec<Val>> = function.params.iter().map(|p| p.constant().cloned()).collect();
            if let Some(args) = constants {
                let value = apply(&function, &args);
                debug!(function = %function.name, ?value, "folded constant call");
                function.folded = Some(value);
            }
        }
        Ok(function)
    }

    /// Check static arguments and resolve the ones generators need.
    fn validate(&self, name: &str, kind: FunctionKind, params: &[Param]) -> Result<Bound> {
        let mut bound = Bound::default();
        match kind {
            FunctionKind::Round | FunctionKind::Ceiling | FunctionKind::Floor => {
                if params.len() > 1 {
                    let places = static_integer(name, params, 1, "decimal places")?;
                    if !(0..=18).contains(&places) {
                        return Err(ParseError::invalid_param(
                            name,
                            1,
                            format!("decimal places must be between 0 and 18, found {places}"),
                        ));
                    }
                    bound.decimal_places = Some(places as u32);
                }
            }
            FunctionKind::Limited(limited) => {
                bound.delimiter = Some(match params.get(1) {
                    Some(_) => static_string(name, params, 1, "delimiter")?,
                    None => limited.default_delimiter().to_string(),
                });
                bound.limit = Some(match params.get(2) {
                    Some(_) => positive(name, params, 2, "limit")?,
                    None => self.config.default_max_values.max(1),
                });
            }
            FunctionKind::Selector(selector) => match selector {
                SelectorKind::Nth => {
                    bound.position = Some(positive(name, params, 1, "position")?);
                }
                SelectorKind::Top | SelectorKind::Bottom => {
                    bound.delimiter = Some(static_string(name, params, 1, "delimiter")?);
                    bound.limit = Some(positive(name, params, 2, "limit")?);
                }
                _ => {}
            },
            FunctionKind::Match | FunctionKind::Replace => {
                self.check_pattern(name, params, 1, kind == FunctionKind::Match)?;
            }
            FunctionKind::Decode => {
                if params.len() % 2 != 0 {
                    return Err(ParseError::invalid_param(
                        name,
                        params.len() - 1,
                        "expected a result after the last pattern and a default value",
                    ));
                }
                for index in (1..params.len() - 1).step_by(2) {
                    self.check_pattern(name, params, index, true)?;
                }
            }
            FunctionKind::Include | FunctionKind::Exclude => {
                for index in 1..params.len() {
                    self.check_pattern(name, params, index, true)?;
                }
            }
            FunctionKind::Hash => {
                if let Some(algorithm) = params.get(1).and_then(Param::constant) {
                    let algorithm = algorithm.as_string().unwrap_or_default();
                    if HashAlgorithm::parse(&algorithm).is_none() {
                        return Err(ParseError::invalid_param(
                            name,
                            1,
                            format!("unknown hash algorithm '{algorithm}'"),
                        ));
                    }
                }
            }
            FunctionKind::ParseDate | FunctionKind::FormatDate => {
                if let Some(pattern) = params.get(1).and_then(Param::constant).and_then(Val::as_string) {
                    self.caches
                        .date_pattern(&pattern)
                        .map_err(|e| ParseError::invalid_param(name, 1, e))?;
                }
                if let Some(zone) = params.get(2).and_then(Param::constant).and_then(Val::as_string) {
                    self.caches
                        .time_zone(&zone)
                        .map_err(|e| ParseError::invalid_param(name, 2, e))?;
                }
            }
            FunctionKind::Param => {
                bound.mapped_key = Some(static_string(name, params, 0, "key")?);
            }
            _ => {}
        }
        Ok(bound)
    }

    /// Compile a constant pattern now so a bad regex fails the parse. Runtime
    /// patterns are checked per row instead.
    fn check_pattern(&self, name: &str, params: &[Param], index: usize, full_match: bool) -> Result<()> {
        let Some(pattern) = params.get(index).and_then(Param::constant) else {
            return Ok(());
        };
        let pattern = pattern.as_string().unwrap_or_default();
        if pattern.is_empty() {
            return Err(ParseError::invalid_param(name, index, "pattern must not be empty"));
        }
        self.caches
            .regex(&pattern, full_match)
            .map_err(|e| ParseError::invalid_param(name, index, e.to_string()))?;
        Ok(())
    }
}

fn constant<'p>(name: &str, params: &'p [Param], index: usize, what: &str) -> Result<&'p Val> {
    params
        .get(index)
        .and_then(Param::constant)
        .ok_or_else(|| ParseError::invalid_param(name, index, format!("{what} must be a constant")))
}

fn static_string(name: &str, params: &[Param], index: usize, what: &str) -> Result<String> {
    constant(name, params, index, what)?
        .as_string()
        .ok_or_else(|| ParseError::invalid_param(name, index, format!("{what} must be a string")))
}

fn static_integer(name: &str, params: &[Param], index: usize, what: &str) -> Result<i64> {
    let val = constant(name, params, index, what)?;
    match val.as_double() {
        Some(d) if d.fract() == 0.0 && d.is_finite() => Ok(d as i64),
        _ => Err(ParseError::invalid_param(
            name,
            index,
            format!("{what} must be a whole number"),
        )),
    }
}

fn positive(name: &str, params: &[Param], index: usize, what: &str) -> Result<usize> {
    let n = static_integer(name, params, index, what)?;
    if n < 1 {
        return Err(ParseError::invalid_param(
            name,
            index,
            format!("{what} must be greater than zero, found {n}"),
        ));
    }
    Ok(n as usize)
}
