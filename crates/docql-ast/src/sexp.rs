//! Serialization of the AST into the document model.
//!
//! Every node becomes `(op arg ...)` with a symbol head, which keeps the
//! parser's output directly printable and comparable in tests. The shapes
//! here are the stable parity-test contract.

use docql_types::DocValue;

use crate::{
    BinaryOp, Expr, FromSource, OrderingTerm, PathComponent, ProjectItem, Projection, SelectExpr,
    SortDirection, TypeSpec, UnaryOp,
};

fn sym(s: &str) -> DocValue {
    DocValue::Symbol(s.to_owned())
}

fn node(head: &str, mut args: Vec<DocValue>) -> DocValue {
    let mut items = vec![sym(head)];
    items.append(&mut args);
    DocValue::Sexp(items)
}

impl Expr {
    /// Serialize this expression into its s-expression form.
    #[allow(clippy::too_many_lines)]
    pub fn to_sexp(&self) -> DocValue {
        match self {
            Self::Lit(value) => node("lit", vec![value.clone()]),
            Self::Id(name) => node("id", vec![sym(name)]),
            Self::LocalId(name) => node("@", vec![node("id", vec![sym(name)])]),
            Self::Path(base, components) => {
                let mut args = vec![base.to_sexp()];
                args.extend(components.iter().map(PathComponent::to_sexp));
                node("path", args)
            }
            Self::Unary(op, operand) => node(op.text(), vec![operand.to_sexp()]),
            Self::Binary(op, left, right) => {
                node(op.text(), vec![left.to_sexp(), right.to_sexp()])
            }
            Self::Like {
                value,
                pattern,
                escape,
                not,
            } => {
                let mut args = vec![value.to_sexp(), pattern.to_sexp()];
                if let Some(escape) = escape {
                    args.push(escape.to_sexp());
                }
                negate(*not, node("like", args))
            }
            Self::Between {
                value,
                lower,
                upper,
                not,
            } => negate(
                *not,
                node(
                    "between",
                    vec![value.to_sexp(), lower.to_sexp(), upper.to_sexp()],
                ),
            ),
            Self::InList {
                value,
                candidates,
                not,
            } => {
                let mut args = vec![value.to_sexp()];
                args.extend(candidates.iter().map(Expr::to_sexp));
                negate(*not, node("in", args))
            }
            Self::IsType { value, target, not } => negate(
                *not,
                node("is", vec![value.to_sexp(), target.to_sexp()]),
            ),
            Self::Cast { value, target, .. } => {
                node("cast", vec![value.to_sexp(), target.to_sexp()])
            }
            Self::Case {
                operand,
                whens,
                else_clause,
            } => {
                let mut args = Vec::new();
                if let Some(operand) = operand {
                    args.push(operand.to_sexp());
                }
                for (test, result) in whens {
                    args.push(node("when", vec![test.to_sexp(), result.to_sexp()]));
                }
                if let Some(else_clause) = else_clause {
                    args.push(node("else", vec![else_clause.to_sexp()]));
                }
                node("case", args)
            }
            Self::Call { name, args } => {
                let mut items = vec![sym(name)];
                items.extend(args.iter().map(Expr::to_sexp));
                node("call", items)
            }
            Self::Unpivot(operand) => node("unpivot", vec![operand.to_sexp()]),
            Self::ListCtor(items) => node("list", items.iter().map(Expr::to_sexp).collect()),
            Self::StructCtor(fields) => {
                let mut args = Vec::with_capacity(fields.len() * 2);
                for (name, value) in fields {
                    args.push(name.to_sexp());
                    args.push(value.to_sexp());
                }
                node("struct", args)
            }
            Self::Values(rows) => node(
                "values",
                rows.iter()
                    .map(|row| node("list", row.iter().map(Expr::to_sexp).collect()))
                    .collect(),
            ),
            Self::Select(select) => select.to_sexp(),
        }
    }
}

fn negate(not: bool, inner: DocValue) -> DocValue {
    if not {
        node("not", vec![inner])
    } else {
        inner
    }
}

impl PathComponent {
    fn to_sexp(&self) -> DocValue {
        match self {
            Self::Index(expr) => expr.to_sexp(),
            Self::Wildcard => DocValue::Sexp(vec![sym("*")]),
            Self::UnpivotWildcard => DocValue::Sexp(vec![sym("*"), sym("unpivot")]),
        }
    }
}

impl TypeSpec {
    fn to_sexp(&self) -> DocValue {
        let mut args = vec![sym(self.name.text())];
        args.extend(self.params.iter().map(|p| DocValue::Int(*p)));
        node("type", args)
    }
}

impl SelectExpr {
    fn to_sexp(&self) -> DocValue {
        let mut args = vec![self.projection.to_sexp()];

        args.push(node(
            "from",
            self.from.iter().map(FromSource::to_sexp).collect(),
        ));
        if let Some(where_clause) = &self.where_clause {
            args.push(node("where", vec![where_clause.to_sexp()]));
        }
        if !self.group_by.is_empty() {
            args.push(node(
                "group_by",
                self.group_by.iter().map(Expr::to_sexp).collect(),
            ));
        }
        if let Some(having) = &self.having {
            args.push(node("having", vec![having.to_sexp()]));
        }
        if !self.order_by.is_empty() {
            args.push(node(
                "order_by",
                self.order_by.iter().map(OrderingTerm::to_sexp).collect(),
            ));
        }
        if let Some(limit) = &self.limit {
            args.push(node("limit", vec![limit.to_sexp()]));
        }
        node("select", args)
    }
}

impl Projection {
    fn to_sexp(&self) -> DocValue {
        match self {
            Self::Star => node("project", vec![DocValue::Sexp(vec![sym("*")])]),
            Self::Items(items) => node(
                "project",
                vec![node(
                    "list",
                    items.iter().map(ProjectItem::to_sexp).collect(),
                )],
            ),
        }
    }
}

impl ProjectItem {
    fn to_sexp(&self) -> DocValue {
        match &self.alias {
            Some(alias) => node("as", vec![sym(alias), self.expr.to_sexp()]),
            None => self.expr.to_sexp(),
        }
    }
}

impl FromSource {
    fn to_sexp(&self) -> DocValue {
        let mut inner = self.expr.to_sexp();
        if let Some(as_alias) = &self.as_alias {
            inner = node("as", vec![sym(as_alias), inner]);
        }
        if let Some(at_alias) = &self.at_alias {
            inner = node("at", vec![sym(at_alias), inner]);
        }
        inner
    }
}

impl OrderingTerm {
    fn to_sexp(&self) -> DocValue {
        let head = match self.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        node(head, vec![self.expr.to_sexp()])
    }
}

#[cfg(test)]
mod tests {
    use docql_types::parse_doc;

    use super::*;
    use crate::TypeName;

    fn assert_sexp(expr: &Expr, expected: &str) {
        let expected = parse_doc(expected).expect("expected form should parse");
        assert_eq!(expr.to_sexp(), expected);
    }

    #[test]
    fn literals_and_ids() {
        assert_sexp(&Expr::Lit(DocValue::Int(5)), "(lit 5)");
        assert_sexp(&Expr::Id("a".to_owned()), "(id a)");
        assert_sexp(&Expr::LocalId("a".to_owned()), "(@ (id a))");
    }

    #[test]
    fn operators() {
        let expr = Expr::Binary(
            BinaryOp::And,
            Expr::Binary(
                BinaryOp::Eq,
                Expr::Id("a".to_owned()).boxed(),
                Expr::Lit(DocValue::Int(1)).boxed(),
            )
            .boxed(),
            Expr::Unary(UnaryOp::Not, Expr::Id("b".to_owned()).boxed()).boxed(),
        );
        assert_sexp(&expr, "(and (= (id a) (lit 1)) (not (id b)))");
    }

    #[test]
    fn paths_with_wildcards() {
        let expr = Expr::Path(
            Expr::Id("e".to_owned()).boxed(),
            vec![
                PathComponent::Index(Expr::Lit(DocValue::String("name".to_owned()))),
                PathComponent::Wildcard,
                PathComponent::UnpivotWildcard,
            ],
        );
        assert_sexp(&expr, "(path (id e) (lit \"name\") (*) (* unpivot))");
    }

    #[test]
    fn cast_with_type_params() {
        let expr = Expr::Cast {
            value: Expr::Id("a".to_owned()).boxed(),
            target: TypeSpec {
                name: TypeName::CharacterVarying,
                params: vec![10],
            },
            pos: None,
        };
        assert_sexp(&expr, "(cast (id a) (type character_varying 10))");
    }

    #[test]
    fn negated_forms_wrap_in_not() {
        let expr = Expr::Like {
            value: Expr::Id("s".to_owned()).boxed(),
            pattern: Expr::Lit(DocValue::String("a%".to_owned())).boxed(),
            escape: None,
            not: true,
        };
        assert_sexp(&expr, "(not (like (id s) (lit \"a%\")))");
    }

    #[test]
    fn select_shape() {
        let select = SelectExpr {
            projection: Projection::Items(vec![ProjectItem {
                expr: Expr::Id("name".to_owned()),
                alias: Some("n".to_owned()),
            }]),
            from: vec![FromSource {
                expr: Expr::Id("animals".to_owned()),
                as_alias: Some("a".to_owned()),
                at_alias: Some("i".to_owned()),
            }],
            where_clause: Some(Expr::Id("p".to_owned())),
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: Some(Expr::Lit(DocValue::Int(10))),
        };
        assert_sexp(
            &Expr::Select(Box::new(select)),
            "(select (project (list (as n (id name)))) \
             (from (at i (as a (id animals)))) \
             (where (id p)) \
             (limit (lit 10)))",
        );
    }
}
