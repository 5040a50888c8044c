//! The tree-walking evaluator.
//!
//! Walks an AST against an environment of bindings and yields a runtime
//! value. `FROM` iterates sources as a lateral nested loop, `WHERE`
//! filters under three-valued logic, and projection builds one struct per
//! row. `GROUP BY`, `HAVING`, and `ORDER BY` parse but do not evaluate
//! yet; `LIMIT` does.

use std::cmp::Ordering;

use docql_ast::{
    BinaryOp, Expr, FromSource, PathComponent, Projection, SelectExpr, UnaryOp,
};
use docql_error::{EvalError, EvalErrorCode};
use docql_types::{pts_eq, DocType, DocValue};
use tracing::debug;

use crate::builtins::FunctionRegistry;
use crate::cast::cast;
use crate::coerce::{arithmetic, coerce, ArithOp};
use crate::env::{Bindings, Env};
use crate::like::{compile_pattern, matches};
use crate::value::{range_over, unpivot, ExprValue};

/// What an unresolvable name evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndefinedVariableBehavior {
    /// Raise `EVALUATOR_BINDING_NOT_FOUND`.
    Error,
    /// Evaluate to MISSING.
    Missing,
}

/// The evaluator: a function registry plus policy knobs.
#[derive(Debug, Clone)]
pub struct Evaluator {
    functions: FunctionRegistry,
    undefined_variables: UndefinedVariableBehavior,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            functions: FunctionRegistry::new(),
            undefined_variables: UndefinedVariableBehavior::Error,
        }
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_undefined_variables(mut self, behavior: UndefinedVariableBehavior) -> Self {
        self.undefined_variables = behavior;
        self
    }

    /// Evaluate an expression against the root bindings and materialize
    /// the result into the document model.
    pub fn evaluate(&self, expr: &Expr, globals: &Bindings) -> Result<DocValue, EvalError> {
        let env = Env::root(globals);
        let result = self.eval(expr, &env)?;
        result.materialize()
    }

    // ── Expression dispatch ─────────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    pub(crate) fn eval(&self, expr: &Expr, env: &Env) -> Result<ExprValue, EvalError> {
        match expr {
            Expr::Lit(value) => Ok(ExprValue::from_doc(value.clone())),
            Expr::Id(name) => match env.lookup(name) {
                Some(value) => Ok(value.clone()),
                None => self.undefined(name),
            },
            Expr::LocalId(name) => match env.lookup_local(name) {
                Some(value) => Ok(value.clone()),
                None => self.undefined(name),
            },
            Expr::Path(base, components) => self.eval_path(base, components, env),
            Expr::Unary(op, operand) => self.eval_unary(*op, operand, env),
            Expr::Binary(op, left, right) => self.eval_binary(*op, left, right, env),
            Expr::Like {
                value,
                pattern,
                escape,
                not,
            } => self.eval_like(value, pattern, escape.as_deref(), *not, env),
            Expr::Between {
                value,
                lower,
                upper,
                not,
            } => self.eval_between(value, lower, upper, *not, env),
            Expr::InList {
                value,
                candidates,
                not,
            } => self.eval_in(value, candidates, *not, env),
            Expr::IsType { value, target, not } => {
                let v = self.eval(value, env)?;
                let is = type_check(&v, target.name);
                Ok(ExprValue::bool(is != *not))
            }
            Expr::Cast { value, target, pos } => {
                let v = self.eval(value, env)?;
                cast(v, target, *pos)
            }
            Expr::Case {
                operand,
                whens,
                else_clause,
            } => self.eval_case(operand.as_deref(), whens, else_clause.as_deref(), env),
            Expr::Call { name, args } => {
                let builtin = self.functions.resolve(name, args.len())?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg, env)?.materialize()?);
                }
                (builtin.func)(&evaluated).map(ExprValue::from_doc)
            }
            Expr::Unpivot(operand) => unpivot(self.eval(operand, env)?),
            Expr::ListCtor(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, env)?.materialize()?);
                }
                Ok(ExprValue::from_doc(DocValue::List(values)))
            }
            Expr::StructCtor(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (name_expr, value_expr) in fields {
                    let name = self.eval(name_expr, env)?.materialize()?;
                    let Some(name) = name.as_text().map(str::to_owned) else {
                        return Err(EvalError::new(
                            EvalErrorCode::InvalidArguments,
                            format!("struct field names must be text, got {}", name.doc_type()),
                        ));
                    };
                    out.push((name, self.eval(value_expr, env)?.materialize()?));
                }
                Ok(ExprValue::from_doc(DocValue::Struct(out)))
            }
            Expr::Values(rows) => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut items = Vec::with_capacity(row.len());
                    for item in row {
                        items.push(self.eval(item, env)?.materialize()?);
                    }
                    out.push(ExprValue::from_doc(DocValue::List(items)));
                }
                Ok(ExprValue::bag_of(out))
            }
            Expr::Select(select) => self.eval_select(select, env),
        }
    }

    fn undefined(&self, name: &str) -> Result<ExprValue, EvalError> {
        match self.undefined_variables {
            UndefinedVariableBehavior::Error => Err(EvalError::new(
                EvalErrorCode::BindingNotFound,
                format!("no binding for '{name}'"),
            )),
            UndefinedVariableBehavior::Missing => Ok(ExprValue::missing()),
        }
    }

    // ── Operators ───────────────────────────────────────────────────────

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, env: &Env) -> Result<ExprValue, EvalError> {
        let value = self.eval(operand, env)?;
        if value.is_null_or_missing() {
            return Ok(value);
        }
        let doc = value.as_doc();
        match op {
            UnaryOp::Not => match doc {
                Some(DocValue::Bool(b)) => Ok(ExprValue::bool(!b)),
                _ => Err(EvalError::new(
                    EvalErrorCode::InvalidArguments,
                    format!("NOT expects a boolean, got {}", value.value_type()),
                )),
            },
            UnaryOp::Plus => match doc {
                Some(DocValue::Int(_) | DocValue::Float(_) | DocValue::Decimal(_)) => Ok(value),
                _ => Err(EvalError::new(
                    EvalErrorCode::InvalidArguments,
                    format!("unary '+' expects a number, got {}", value.value_type()),
                )),
            },
            UnaryOp::Minus => match doc {
                Some(DocValue::Int(i)) => i
                    .checked_neg()
                    .map(|n| ExprValue::from_doc(DocValue::Int(n)))
                    .ok_or_else(|| {
                        EvalError::new(EvalErrorCode::IntOverflow, "integer overflow in negation")
                    }),
                Some(DocValue::Float(f)) => Ok(ExprValue::from_doc(DocValue::Float(-f))),
                Some(DocValue::Decimal(d)) => {
                    Ok(ExprValue::from_doc(DocValue::Decimal(-d.clone())))
                }
                _ => Err(EvalError::new(
                    EvalErrorCode::InvalidArguments,
                    format!("unary '-' expects a number, got {}", value.value_type()),
                )),
            },
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Env,
    ) -> Result<ExprValue, EvalError> {
        // AND / OR short-circuit under three-valued logic.
        if op == BinaryOp::And || op == BinaryOp::Or {
            let shortcut = op == BinaryOp::Or; // OR stops on true, AND on false
            let lhs = tristate(&self.eval(left, env)?)?;
            if lhs == Some(shortcut) {
                return Ok(ExprValue::bool(shortcut));
            }
            let rhs = tristate(&self.eval(right, env)?)?;
            return Ok(match (lhs, rhs) {
                (_, Some(r)) if r == shortcut => ExprValue::bool(shortcut),
                (Some(_), Some(_)) => ExprValue::bool(!shortcut),
                _ => ExprValue::null(),
            });
        }

        let lhs = self.eval(left, env)?;
        let rhs = self.eval(right, env)?;

        // Comparing against NULL or MISSING is unknown. For the other
        // scalar operators MISSING propagates as MISSING and NULL as NULL.
        let comparison = matches!(
            op,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        );
        if comparison {
            if lhs.is_null_or_missing() || rhs.is_null_or_missing() {
                return Ok(ExprValue::null());
            }
        } else {
            if lhs.value_type() == DocType::Missing || rhs.value_type() == DocType::Missing {
                return Ok(ExprValue::missing());
            }
            if lhs.is_null_or_missing() || rhs.is_null_or_missing() {
                return Ok(ExprValue::null());
            }
        }

        let (Some(a), Some(b)) = (lhs.as_doc(), rhs.as_doc()) else {
            return Err(EvalError::new(
                EvalErrorCode::InvalidArguments,
                "lazy sequences are not valid operator arguments",
            ));
        };

        match op {
            BinaryOp::Eq => Ok(ExprValue::bool(doc_eq(a, b))),
            BinaryOp::Ne => Ok(ExprValue::bool(!doc_eq(a, b))),
            BinaryOp::Lt => Ok(ExprValue::bool(compare_values(a, b)? == Ordering::Less)),
            BinaryOp::Le => Ok(ExprValue::bool(compare_values(a, b)? != Ordering::Greater)),
            BinaryOp::Gt => Ok(ExprValue::bool(compare_values(a, b)? == Ordering::Greater)),
            BinaryOp::Ge => Ok(ExprValue::bool(compare_values(a, b)? != Ordering::Less)),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let pair = coerce(a, b).ok_or_else(|| {
                    EvalError::new(
                        EvalErrorCode::InvalidArguments,
                        format!(
                            "'{}' expects numbers, got {} and {}",
                            op.text(),
                            a.doc_type(),
                            b.doc_type()
                        ),
                    )
                })?;
                let arith_op = match op {
                    BinaryOp::Add => ArithOp::Add,
                    BinaryOp::Sub => ArithOp::Sub,
                    BinaryOp::Mul => ArithOp::Mul,
                    BinaryOp::Div => ArithOp::Div,
                    _ => ArithOp::Mod,
                };
                arithmetic(arith_op, pair).map(ExprValue::from_doc)
            }
            BinaryOp::Concat => match (a.as_text(), b.as_text()) {
                (Some(a), Some(b)) => {
                    Ok(ExprValue::from_doc(DocValue::String(format!("{a}{b}"))))
                }
                _ => Err(EvalError::new(
                    EvalErrorCode::InvalidArguments,
                    format!("'||' expects text, got {} and {}", a.doc_type(), b.doc_type()),
                )),
            },
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_like(
        &self,
        value: &Expr,
        pattern: &Expr,
        escape: Option<&Expr>,
        not: bool,
        env: &Env,
    ) -> Result<ExprValue, EvalError> {
        let value = self.eval(value, env)?;
        let pattern = self.eval(pattern, env)?;
        let escape = escape.map(|e| self.eval(e, env)).transpose()?;

        if value.is_null_or_missing()
            || pattern.is_null_or_missing()
            || escape.as_ref().is_some_and(ExprValue::is_null_or_missing)
        {
            return Ok(ExprValue::null());
        }

        let text = like_text(&value, "LIKE value")?;
        let pattern_text = like_text(&pattern, "LIKE pattern")?;
        let escape_char = match &escape {
            None => None,
            Some(esc) => {
                let text = like_text(esc, "ESCAPE")?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => {
                        return Err(EvalError::new(
                            EvalErrorCode::InvalidArguments,
                            "ESCAPE must be exactly one character",
                        ));
                    }
                }
            }
        };

        let parts = compile_pattern(pattern_text, escape_char)?;
        let matched = matches(&parts, text);
        Ok(ExprValue::bool(matched != not))
    }

    fn eval_between(
        &self,
        value: &Expr,
        lower: &Expr,
        upper: &Expr,
        not: bool,
        env: &Env,
    ) -> Result<ExprValue, EvalError> {
        let v = self.eval(value, env)?;
        let lo = self.eval(lower, env)?;
        let hi = self.eval(upper, env)?;
        if v.is_null_or_missing() || lo.is_null_or_missing() || hi.is_null_or_missing() {
            return Ok(ExprValue::null());
        }
        let (Some(v), Some(lo), Some(hi)) = (v.as_doc(), lo.as_doc(), hi.as_doc()) else {
            return Err(EvalError::new(
                EvalErrorCode::InvalidArguments,
                "BETWEEN expects comparable scalars",
            ));
        };
        let inside = compare_values(v, lo)? != Ordering::Less
            && compare_values(v, hi)? != Ordering::Greater;
        Ok(ExprValue::bool(inside != not))
    }

    fn eval_in(
        &self,
        value: &Expr,
        candidates: &[Expr],
        not: bool,
        env: &Env,
    ) -> Result<ExprValue, EvalError> {
        let v = self.eval(value, env)?;
        if v.is_null_or_missing() {
            return Ok(ExprValue::null());
        }
        let v = v.materialize()?;
        let mut found = false;
        for candidate in candidates {
            let c = self.eval(candidate, env)?.materialize()?;
            if !c.is_null_or_missing() && doc_eq(&v, &c) {
                found = true;
                break;
            }
        }
        Ok(ExprValue::bool(found != not))
    }

    fn eval_case(
        &self,
        operand: Option<&Expr>,
        whens: &[(Expr, Expr)],
        else_clause: Option<&Expr>,
        env: &Env,
    ) -> Result<ExprValue, EvalError> {
        let operand = operand.map(|e| self.eval(e, env)).transpose()?;
        let operand_doc = match &operand {
            Some(v) => Some(v.clone().materialize()?),
            None => None,
        };
        for (test, result) in whens {
            let test = self.eval(test, env)?;
            let matched = match &operand_doc {
                // Simple form: operand = test, with unknown treated as no
                // match.
                Some(operand) => {
                    let test = test.materialize()?;
                    !operand.is_null_or_missing()
                        && !test.is_null_or_missing()
                        && doc_eq(operand, &test)
                }
                // Searched form: the test must be exactly TRUE.
                None => test.as_doc() == Some(&DocValue::Bool(true)),
            };
            if matched {
                return self.eval(result, env);
            }
        }
        match else_clause {
            Some(e) => self.eval(e, env),
            None => Ok(ExprValue::null()),
        }
    }

    // ── Paths ───────────────────────────────────────────────────────────

    fn eval_path(
        &self,
        base: &Expr,
        components: &[PathComponent],
        env: &Env,
    ) -> Result<ExprValue, EvalError> {
        let mut current = vec![self.eval(base, env)?];
        let mut fanned = false;

        for component in components {
            let mut next = Vec::new();
            match component {
                PathComponent::Index(index_expr) => {
                    let key = self.eval(index_expr, env)?.materialize()?;
                    for value in current {
                        next.push(path_step(value, &key)?);
                    }
                }
                PathComponent::Wildcard => {
                    fanned = true;
                    for value in current {
                        for item in range_over(value)? {
                            next.push(item?);
                        }
                    }
                }
                PathComponent::UnpivotWildcard => {
                    fanned = true;
                    for value in current {
                        for item in range_over(unpivot(value)?)? {
                            next.push(item?);
                        }
                    }
                }
            }
            current = next;
        }

        if fanned {
            Ok(ExprValue::bag_of(current))
        } else {
            Ok(current
                .pop()
                .expect("a wildcard-free path always has exactly one result"))
        }
    }

    // ── SELECT ──────────────────────────────────────────────────────────

    fn eval_select(&self, select: &SelectExpr, env: &Env) -> Result<ExprValue, EvalError> {
        if !select.group_by.is_empty() || select.having.is_some() {
            return Err(EvalError::new(
                EvalErrorCode::Generic,
                "GROUP BY evaluation is not yet supported",
            ));
        }
        if !select.order_by.is_empty() {
            return Err(EvalError::new(
                EvalErrorCode::Generic,
                "ORDER BY evaluation is not yet supported",
            ));
        }

        let mut rows = Vec::new();
        let mut in_flight = Bindings::new();
        self.collect_rows(&select.from, 0, env, &mut in_flight, &mut rows)?;
        debug!(rows = rows.len(), "FROM iteration complete");

        // WHERE keeps only rows where the predicate is exactly TRUE.
        let mut kept = Vec::new();
        for row in rows {
            let keep = match &select.where_clause {
                None => true,
                Some(predicate) => {
                    let row_env = env.nested(&row);
                    let value = self.eval(predicate, &row_env)?;
                    value.as_doc() == Some(&DocValue::Bool(true))
                }
            };
            if keep {
                kept.push(row);
            }
        }

        if let Some(limit_expr) = &select.limit {
            let limit = self.eval(limit_expr, env)?.materialize()?;
            let Some(limit) = limit.as_int().filter(|n| *n >= 0) else {
                return Err(EvalError::new(
                    EvalErrorCode::InvalidArguments,
                    format!("LIMIT expects a non-negative integer, got {limit}"),
                ));
            };
            kept.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        let mut out = Vec::with_capacity(kept.len());
        for row in &kept {
            let row_env = env.nested(row);
            let mut fields = Vec::new();
            match &select.projection {
                Projection::Star => {
                    for (name, value) in row.iter() {
                        match value.as_doc() {
                            // Struct-valued bindings spread their fields
                            // into the row. Ordered bind names fix the
                            // column order when the value carries them.
                            Some(DocValue::Struct(inner)) => match value.bind_names() {
                                Some(bind_names) => {
                                    for bound in bind_names {
                                        if let Some((key, field)) =
                                            inner.iter().find(|(key, _)| key == bound)
                                        {
                                            fields.push((key.clone(), field.clone()));
                                        }
                                    }
                                }
                                None => fields.extend(inner.iter().cloned()),
                            },
                            _ => fields.push((name.to_owned(), value.clone().materialize()?)),
                        }
                    }
                }
                Projection::Items(items) => {
                    for (index, item) in items.iter().enumerate() {
                        let value = self.eval(&item.expr, &row_env)?;
                        let name = item
                            .alias
                            .clone()
                            .or_else(|| {
                                value.name().and_then(DocValue::as_text).map(str::to_owned)
                            })
                            .unwrap_or_else(|| format!("_{}", index + 1));
                        let value = value.materialize()?;
                        // MISSING columns are left out of the row struct.
                        if value != DocValue::Missing {
                            fields.push((name, value));
                        }
                    }
                }
            }
            // Rows are tuple-like: they remember their column order so a
            // SELECT * over them can spread in projection order.
            let column_names = fields.iter().map(|(name, _)| name.clone()).collect();
            out.push(
                ExprValue::from_doc(DocValue::Struct(fields)).with_bind_names(column_names),
            );
        }

        Ok(ExprValue::bag_of(out))
    }

    /// Lateral nested-loop iteration: each source may reference the
    /// aliases bound by the sources before it.
    fn collect_rows(
        &self,
        sources: &[FromSource],
        index: usize,
        outer: &Env,
        in_flight: &mut Bindings,
        out: &mut Vec<Bindings>,
    ) -> Result<(), EvalError> {
        let Some(source) = sources.get(index) else {
            out.push(in_flight.clone());
            return Ok(());
        };

        let value = {
            let scope = outer.nested(in_flight);
            self.eval(&source.expr, &scope)?
        };
        let alias = source_alias(source, index);
        let checkpoint = in_flight.len();

        for (position, item) in range_over(value)?.enumerate() {
            let item = item?;
            in_flight.bind(alias.clone(), item);
            if let Some(at_alias) = &source.at_alias {
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                in_flight.bind(
                    at_alias.clone(),
                    ExprValue::from_doc(DocValue::Int(position)),
                );
            }
            self.collect_rows(sources, index + 1, outer, in_flight, out)?;
            in_flight.truncate(checkpoint);
        }
        Ok(())
    }
}

/// The binding name of a `FROM` source: the explicit alias, the obvious
/// name of the expression, or a positional `_N`.
fn source_alias(source: &FromSource, index: usize) -> String {
    if let Some(alias) = &source.as_alias {
        return alias.clone();
    }
    match &source.expr {
        Expr::Id(name) => name.clone(),
        Expr::Path(_, components) => match components.last() {
            Some(PathComponent::Index(Expr::Lit(DocValue::String(name)))) => name.clone(),
            _ => format!("_{}", index + 1),
        },
        _ => format!("_{}", index + 1),
    }
}

// ---------------------------------------------------------------------------
// Semantics helpers
// ---------------------------------------------------------------------------

/// The text payload of a `LIKE` operand.
fn like_text<'a>(value: &'a ExprValue, what: &str) -> Result<&'a str, EvalError> {
    value
        .as_doc()
        .and_then(DocValue::as_text)
        .ok_or_else(|| {
            EvalError::new(
                EvalErrorCode::InvalidArguments,
                format!("{what} must be text, got {}", value.value_type()),
            )
        })
}

/// Three-valued logic: NULL/MISSING is unknown, a non-boolean is an error.
fn tristate(value: &ExprValue) -> Result<Option<bool>, EvalError> {
    if value.is_null_or_missing() {
        return Ok(None);
    }
    match value.as_doc() {
        Some(DocValue::Bool(b)) => Ok(Some(*b)),
        _ => Err(EvalError::new(
            EvalErrorCode::InvalidArguments,
            format!("expected a boolean, got {}", value.value_type()),
        )),
    }
}

/// SQL `=` on non-null operands: numbers compare across the ladder,
/// everything else compares structurally.
fn doc_eq(a: &DocValue, b: &DocValue) -> bool {
    if a.doc_type().is_number() && b.doc_type().is_number() {
        a.compare_numeric(b) == Some(Ordering::Equal)
    } else {
        pts_eq(a, b)
    }
}

/// Ordering for `<`/`<=`/`>`/`>=` and BETWEEN. Numbers use the ladder;
/// text, booleans, timestamps, and LOBs compare within their own type.
fn compare_values(a: &DocValue, b: &DocValue) -> Result<Ordering, EvalError> {
    if let Some(ordering) = a.compare_numeric(b) {
        return Ok(ordering);
    }
    let ordering = match (a, b) {
        (DocValue::Bool(x), DocValue::Bool(y)) => x.cmp(y),
        (DocValue::String(x), DocValue::String(y)) | (DocValue::Symbol(x), DocValue::Symbol(y)) => {
            x.cmp(y)
        }
        (DocValue::Timestamp(x), DocValue::Timestamp(y)) => x.cmp(y),
        (DocValue::Clob(x), DocValue::Clob(y)) | (DocValue::Blob(x), DocValue::Blob(y)) => {
            x.cmp(y)
        }
        _ => {
            return Err(EvalError::new(
                EvalErrorCode::InvalidArguments,
                format!("cannot compare {} and {}", a.doc_type(), b.doc_type()),
            ));
        }
    };
    Ok(ordering)
}

/// `IS [NOT] <type>`: never unknown. `IS NULL` covers MISSING as well;
/// `IS MISSING` covers only MISSING.
fn type_check(value: &ExprValue, target: docql_ast::TypeName) -> bool {
    use docql_ast::TypeName;
    match target {
        TypeName::Null => value.is_null_or_missing(),
        TypeName::Missing => value.value_type() == DocType::Missing,
        _ => value.value_type() == target.doc_type(),
    }
}

/// One `e.name` / `e[i]` step over a single value. Absent fields, out of
/// range indexes, and steps into non-containers yield MISSING.
fn path_step(value: ExprValue, key: &DocValue) -> Result<ExprValue, EvalError> {
    let doc = match value.as_doc() {
        Some(doc) => doc.clone(),
        None => value.materialize()?,
    };
    Ok(match key {
        DocValue::String(name) | DocValue::Symbol(name) => match doc.field(name) {
            Some(field) => ExprValue::from_doc(field.clone())
                .named(DocValue::Symbol(name.clone())),
            None => ExprValue::missing(),
        },
        DocValue::Int(index) => {
            let element = usize::try_from(*index)
                .ok()
                .and_then(|i| doc.sequence_elements()?.get(i).cloned());
            match element {
                Some(element) => ExprValue::from_doc(element),
                None => ExprValue::missing(),
            }
        }
        _ => ExprValue::missing(),
    })
}

#[cfg(test)]
mod tests {
    use docql_parser::parse;
    use docql_types::parse_doc;

    use super::*;

    fn run_with(source: &str, globals: &Bindings) -> Result<DocValue, EvalError> {
        let expr = parse(source).unwrap_or_else(|e| panic!("{source}: {e}"));
        Evaluator::new().evaluate(&expr, globals)
    }

    fn run(source: &str) -> DocValue {
        run_with(source, &Bindings::new()).unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    fn run_err(source: &str) -> EvalError {
        run_with(source, &Bindings::new())
            .expect_err(&format!("{source}: expected an evaluation error"))
    }

    /// Compare a query result against expected document text with strict
    /// equality (so bags compare as multisets).
    fn assert_result(source: &str, expected: &str) {
        let actual = run(source);
        let expected = parse_doc(expected).expect("expected form should parse");
        assert!(
            pts_eq(&actual, &expected),
            "{source}: got {actual}, want {expected}"
        );
    }

    fn animals() -> Bindings {
        let mut globals = Bindings::new();
        let data = parse_doc(
            "[{name: \"Kumo\", type: \"dog\"},
              {name: \"Mochi\", type: \"dog\"},
              {name: \"Lilikoi\", type: \"unicorn\"}]",
        )
        .expect("animals parse");
        globals.bind("animals", ExprValue::from_doc(data));
        globals
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_result("1 + 2 * 3", "7");
        assert_result("(1 + 2) * 3", "9");
        assert_result("7 / 2", "3");
        assert_result("7 % 2", "1");
        assert_result("1 + 2.0", "3.0");
        assert_result("- (1 + 2)", "-3");
        assert_result("'a' || 'b'", "\"ab\"");
    }

    #[test]
    fn three_valued_logic() {
        assert_result("null and false", "false");
        assert_result("null and true", "null");
        assert_result("null or true", "true");
        assert_result("null or false", "null");
        assert_result("not null", "null");
        assert_result("missing and true", "null");
    }

    #[test]
    fn equality_follows_the_ladder() {
        assert_result("1 = 1.0", "true");
        assert_result("1 = 1", "true");
        assert_result("1 <> 2", "true");
        assert_result("1.0 = 1.00", "true");
        assert_result("'a' = 'a'", "true");
        // Comparing against NULL or MISSING is unknown.
        assert_result("1 = null", "null");
        assert_result("missing = missing", "null");
        // Missing propagates through arithmetic.
        assert_result("1 + missing", "missing::null.symbol");
        assert_result("1 + null", "null");
    }

    #[test]
    fn comparisons_and_between() {
        assert_result("1 < 2", "true");
        assert_result("'a' < 'b'", "true");
        assert_result("5 between 1 and 10", "true");
        assert_result("11 not between 1 and 10", "true");
        assert_result("null between 1 and 2", "null");
        let err = run_err("1 < 'a'");
        assert_eq!(err.code, EvalErrorCode::InvalidArguments);
    }

    #[test]
    fn in_list() {
        assert_result("2 in (1, 2)", "true");
        assert_result("3 in (1, 2)", "false");
        assert_result("3 not in (1, 2)", "true");
        assert_result("null in (1, 2)", "null");
    }

    #[test]
    fn is_type_checks() {
        assert_result("1 is integer", "true");
        assert_result("1 is string", "false");
        assert_result("1 is not string", "true");
        assert_result("null is null", "true");
        assert_result("missing is null", "true");
        assert_result("missing is missing", "true");
        assert_result("null is missing", "false");
        assert_result("'x' is string", "true");
        assert_result("`sym` is symbol", "true");
    }

    #[test]
    fn case_forms() {
        assert_result("case when true then 1 end", "1");
        assert_result("case when false then 1 else 2 end", "2");
        assert_result("case when false then 1 end", "null");
        assert_result("case 2 when 1 then 'a' when 2 then 'b' end", "\"b\"");
        assert_result("case null when null then 'x' else 'y' end", "\"y\"");
    }

    #[test]
    fn paths() {
        assert_result("`{a: [10, 20]}`.a[1]", "20");
        assert_result("`{a: 1}`.b", "missing::null.symbol");
        assert_result("`[1, 2]`[5]", "missing::null.symbol");
        assert_result("`[{a: 1}, {a: 2}]`[*].a", "(bag 1 2)");
        assert_result("`{a: 1, b: 2}`.*", "(bag 1 2)");
    }

    #[test]
    fn constructors() {
        assert_result("[1, 1 + 1]", "[1, 2]");
        assert_result("{'k': 1, 'j': 2}", "{k: 1, j: 2}");
        assert_result("values (1, 2), (3, 4)", "(bag [1, 2] [3, 4])");
        let err = run_err("{1: 2}");
        assert_eq!(err.code, EvalErrorCode::InvalidArguments);
    }

    #[test]
    fn select_star_filters_rows() {
        let globals = animals();
        let expr = parse("SELECT * FROM animals a WHERE a.type = 'dog'").expect("parses");
        let result = Evaluator::new().evaluate(&expr, &globals).expect("evaluates");
        let expected = parse_doc(
            "(bag {name: \"Kumo\", type: \"dog\"} {name: \"Mochi\", type: \"dog\"})",
        )
        .expect("expected parses");
        assert!(pts_eq(&result, &expected), "got {result}");
    }

    #[test]
    fn row_independent_like_keeps_all_rows() {
        let globals = animals();
        let expr =
            parse("SELECT * FROM animals a WHERE '100%' LIKE '1%[%' ESCAPE '['").expect("parses");
        let result = Evaluator::new().evaluate(&expr, &globals).expect("evaluates");
        if let DocValue::Sexp(items) = &result {
            assert_eq!(items.len(), 4, "bag head plus three rows: {result}");
        } else {
            panic!("expected a bag, got {result}");
        }

        let expr = parse("SELECT * FROM animals a WHERE 'Kuumo' LIKE 'K_mo'").expect("parses");
        let result = Evaluator::new().evaluate(&expr, &globals).expect("evaluates");
        assert!(
            pts_eq(&result, &parse_doc("(bag)").expect("empty bag")),
            "got {result}"
        );
    }

    #[test]
    fn projection_names() {
        let globals = animals();
        let expr = parse(
            "SELECT a.name AS moniker, a.type, 1 + 1 FROM animals a WHERE a.name = 'Kumo'",
        )
        .expect("parses");
        let result = Evaluator::new().evaluate(&expr, &globals).expect("evaluates");
        let expected = parse_doc("(bag {moniker: \"Kumo\", type: \"dog\", _3: 2})")
            .expect("expected parses");
        assert!(pts_eq(&result, &expected), "got {result}");
    }

    #[test]
    fn from_non_sequence_is_a_single_row() {
        assert_result("SELECT v FROM 1 AS v", "(bag {v: 1})");
    }

    #[test]
    fn select_star_spreads_struct_bindings() {
        // Struct rows flatten; scalar bindings keep their binding name.
        assert_result(
            "SELECT * FROM `[{a: 1}]` AS r, `[2]` AS n",
            "(bag {a: 1, n: 2})",
        );
        assert_result(
            "SELECT * FROM `[\"x\"]` AS v AT i",
            "(bag {v: \"x\", i: 0})",
        );
    }

    #[test]
    fn select_star_spreads_tuple_rows_in_bind_name_order() {
        // The inner SELECT's rows carry their column order; the outer
        // star spreads them in that order, which PTS equality cannot
        // observe but the text form can.
        let expr = parse("SELECT * FROM (SELECT r.b, r.a FROM `[{a: 1, b: 2}]` AS r) AS t")
            .expect("parses");
        let result = Evaluator::new()
            .evaluate(&expr, &Bindings::new())
            .expect("evaluates");
        assert_eq!(result.to_string(), "(bag {b: 2, a: 1})");
    }

    #[test]
    fn from_multiple_sources_is_a_nested_loop() {
        assert_result(
            "SELECT x, y FROM `[1, 2]` AS x, `[10, 20]` AS y",
            "(bag {x: 1, y: 10} {x: 1, y: 20} {x: 2, y: 10} {x: 2, y: 20})",
        );
    }

    #[test]
    fn from_is_lateral() {
        assert_result(
            "SELECT v FROM `[{items: [1, 2]}, {items: [3]}]` AS row, row.items AS v",
            "(bag {v: 1} {v: 2} {v: 3})",
        );
    }

    #[test]
    fn at_binds_zero_based_positions() {
        assert_result(
            "SELECT i, v FROM `[\"a\", \"b\"]` AS v AT i",
            "(bag {i: 0, v: \"a\"} {i: 1, v: \"b\"})",
        );
    }

    #[test]
    fn limit_truncates() {
        assert_result("SELECT v FROM `[1, 2, 3]` AS v LIMIT 2", "(bag {v: 1} {v: 2})");
        assert_result("SELECT v FROM `[1, 2, 3]` AS v LIMIT 0", "(bag)");
        let err = run_err("SELECT v FROM `[1]` AS v LIMIT -1");
        assert_eq!(err.code, EvalErrorCode::InvalidArguments);
    }

    #[test]
    fn unpivot_in_from_carries_names() {
        assert_result(
            "SELECT kv FROM unpivot(`{a: 1, b: 2}`) AS kv",
            "(bag {a: 1} {b: 2})",
        );
        assert_result(
            "SELECT n FROM unpivot(7) AS n",
            "(bag {_1: 7})",
        );
    }

    #[test]
    fn nested_select() {
        assert_result(
            "SELECT s.x FROM (SELECT y AS x FROM `[{y: 5}]` AS t) AS s",
            "(bag {x: 5})",
        );
    }

    #[test]
    fn missing_columns_are_omitted() {
        assert_result(
            "SELECT r.absent AS a, r.y AS y FROM `[{y: 1}]` AS r",
            "(bag {y: 1})",
        );
    }

    #[test]
    fn local_binding_reference_is_scope_local() {
        let mut globals = Bindings::new();
        globals.bind("c", ExprValue::from_doc(DocValue::Int(9)));
        // Lexical resolution sees the global...
        let expr = parse("SELECT c FROM `[1]` AS a").expect("parses");
        let result = Evaluator::new().evaluate(&expr, &globals).expect("evaluates");
        assert!(pts_eq(&result, &parse_doc("(bag {c: 9})").expect("parse")));
        // ...but `@c` refuses to look past the row scope.
        let expr = parse("SELECT @c FROM `[1]` AS a").expect("parses");
        let err = Evaluator::new()
            .evaluate(&expr, &globals)
            .expect_err("local-only lookup must fail");
        assert_eq!(err.code, EvalErrorCode::BindingNotFound);
    }

    #[test]
    fn undefined_variables_policy() {
        let err = run_err("nope");
        assert_eq!(err.code, EvalErrorCode::BindingNotFound);

        let expr = parse("nope").expect("parses");
        let result = Evaluator::new()
            .with_undefined_variables(UndefinedVariableBehavior::Missing)
            .evaluate(&expr, &Bindings::new())
            .expect("lenient mode evaluates");
        assert_eq!(result, DocValue::Missing);
    }

    #[test]
    fn group_by_and_order_by_are_staged_out() {
        let mut globals = Bindings::new();
        globals.bind(
            "t",
            ExprValue::from_doc(parse_doc("[{a: 1}]").expect("parse")),
        );
        for source in [
            "SELECT a FROM t GROUP BY a",
            "SELECT a FROM t ORDER BY a",
        ] {
            let expr = parse(source).expect("parses");
            let err = Evaluator::new()
                .evaluate(&expr, &globals)
                .expect_err("staged out");
            assert_eq!(err.code, EvalErrorCode::Generic, "{source}");
        }
    }

    #[test]
    fn builtin_calls_evaluate() {
        assert_result("substring('hello' from 2 for 3)", "\"ell\"");
        assert_result("substring('hello', 2)", "\"ello\"");
        assert_result("trim(leading 'x' from 'xxhix')", "\"hix\"");
        assert_result("upper('abc')", "\"ABC\"");
        assert_result("char_length('abc')", "3");
        assert_result("exists(`[1]`)", "true");
        assert_result("exists(`[]`)", "false");
        let err = run_err("no_such_function(1)");
        assert_eq!(err.code, EvalErrorCode::BindingNotFound);
    }

    #[test]
    fn cast_scenarios() {
        assert_result("cast('-0005' as int)", "-5");
        assert_result("cast('+0x10' as int)", "16");
        assert_result("cast('true' as boolean)", "true");
        assert_result("cast('TrUe' as boolean)", "true");
        assert_result("cast('other' as boolean)", "false");
        let err = run_err("cast('99999999999999999999' as int)");
        assert_eq!(err.code, EvalErrorCode::IntOverflow);
        // Parsed casts carry their location.
        let err = run_err("cast(1 as timestamp)");
        assert_eq!(err.code, EvalErrorCode::InvalidCast);
        assert_eq!(err.properties.position(), Some((1, 1)));
    }
}
