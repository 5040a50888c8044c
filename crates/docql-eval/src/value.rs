//! The runtime value: a document value or a lazy sequence, plus facets.
//!
//! Facets are additive capabilities carried alongside the value without
//! touching its payload: `Named` (a one-shot name used by `UNPIVOT` and
//! struct projection) and `OrderedBindNames` (ordered bind names for
//! tuple-like values). Wrapping adds a facet and preserves the ones
//! already attached; `unnamed` masks only the `Named` facet.

use std::cell::RefCell;
use std::rc::Rc;

use docql_error::{EvalError, EvalErrorCode};
use docql_types::{DocType, DocValue};

/// A single-pass iterator of runtime values.
pub type SeqIter = Box<dyn Iterator<Item = Result<ExprValue, EvalError>>>;

/// A runtime value flowing through the evaluator.
#[derive(Clone)]
pub struct ExprValue {
    kind: ValueKind,
    facets: Facets,
}

#[derive(Clone)]
enum ValueKind {
    Doc(Rc<DocValue>),
    /// A lazy sequence with a target container type (LIST, SEXP, or BAG).
    /// Clones share the same single-pass iterator.
    Seq {
        target: DocType,
        iter: Rc<RefCell<Option<SeqIter>>>,
    },
}

/// Optional capability records attached to a value.
#[derive(Clone, Default)]
struct Facets {
    name: Option<Rc<DocValue>>,
    bind_names: Option<Rc<Vec<String>>>,
}

impl ExprValue {
    pub fn from_doc(value: DocValue) -> Self {
        Self {
            kind: ValueKind::Doc(Rc::new(value)),
            facets: Facets::default(),
        }
    }

    pub fn missing() -> Self {
        Self::from_doc(DocValue::Missing)
    }

    pub fn null() -> Self {
        Self::from_doc(DocValue::Null(DocType::Null))
    }

    pub fn bool(value: bool) -> Self {
        Self::from_doc(DocValue::Bool(value))
    }

    /// A lazy sequence. `target` must be LIST, SEXP, or BAG.
    pub fn sequence(target: DocType, iter: SeqIter) -> Self {
        debug_assert!(target.is_sequence());
        Self {
            kind: ValueKind::Seq {
                target,
                iter: Rc::new(RefCell::new(Some(iter))),
            },
            facets: Facets::default(),
        }
    }

    /// An eager bag.
    pub fn bag_of(items: Vec<ExprValue>) -> Self {
        Self::sequence(DocType::Bag, Box::new(items.into_iter().map(Ok)))
    }

    /// The type discriminator; lazy sequences report their target type.
    pub fn value_type(&self) -> DocType {
        match &self.kind {
            ValueKind::Doc(doc) => doc.doc_type(),
            ValueKind::Seq { target, .. } => *target,
        }
    }

    pub fn is_null_or_missing(&self) -> bool {
        matches!(&self.kind, ValueKind::Doc(doc) if doc.is_null_or_missing())
    }

    /// The backing document value, unless this is a lazy sequence.
    pub fn as_doc(&self) -> Option<&DocValue> {
        match &self.kind {
            ValueKind::Doc(doc) => Some(doc),
            ValueKind::Seq { .. } => None,
        }
    }

    // ── Facets ──────────────────────────────────────────────────────────

    /// Attach the `Named` facet, preserving every other facet.
    #[must_use]
    pub fn named(mut self, name: DocValue) -> Self {
        self.facets.name = Some(Rc::new(name));
        self
    }

    /// Attach the `OrderedBindNames` facet, preserving every other facet.
    /// `SELECT` attaches the column order to every row it produces; a
    /// `SELECT *` spreading such a tuple-like row reads it back.
    #[must_use]
    pub fn with_bind_names(mut self, names: Vec<String>) -> Self {
        self.facets.bind_names = Some(Rc::new(names));
        self
    }

    /// Mask only the `Named` facet.
    #[must_use]
    pub fn unnamed(mut self) -> Self {
        self.facets.name = None;
        self
    }

    /// The `Named` facet, if attached.
    pub fn name(&self) -> Option<&DocValue> {
        self.facets.name.as_deref()
    }

    /// The `OrderedBindNames` facet, if attached.
    pub fn bind_names(&self) -> Option<&[String]> {
        self.facets.bind_names.as_deref().map(Vec::as_slice)
    }

    // ── Sequences ───────────────────────────────────────────────────────

    /// Take the single-pass iterator out of a lazy sequence. Consuming a
    /// sequence twice is an engine bug.
    pub fn take_iter(&self) -> Result<Option<SeqIter>, EvalError> {
        match &self.kind {
            ValueKind::Doc(_) => Ok(None),
            ValueKind::Seq { iter, .. } => iter
                .borrow_mut()
                .take()
                .map(|it| Ok(Some(it)))
                .unwrap_or_else(|| {
                    Err(EvalError::new(
                        EvalErrorCode::Generic,
                        "lazy sequence consumed more than once",
                    )
                    .internal())
                }),
        }
    }

    /// Materialize into the document model. A BAG becomes the
    /// conventional `(bag ...)` s-expression.
    pub fn materialize(self) -> Result<DocValue, EvalError> {
        match self.kind {
            ValueKind::Doc(doc) => Ok(Rc::try_unwrap(doc).unwrap_or_else(|rc| (*rc).clone())),
            ValueKind::Seq { target, iter } => {
                let iter = iter.borrow_mut().take().ok_or_else(|| {
                    EvalError::new(
                        EvalErrorCode::Generic,
                        "lazy sequence consumed more than once",
                    )
                    .internal()
                })?;
                let mut items = Vec::new();
                if target == DocType::Bag {
                    items.push(DocValue::Symbol("bag".to_owned()));
                }
                for item in iter {
                    items.push(item?.materialize()?);
                }
                Ok(match target {
                    DocType::List => DocValue::List(items),
                    _ => DocValue::Sexp(items),
                })
            }
        }
    }
}

impl std::fmt::Debug for ExprValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ValueKind::Doc(doc) => write!(f, "ExprValue({doc:?})"),
            ValueKind::Seq { target, .. } => write!(f, "ExprValue(lazy {target})"),
        }
    }
}

/// Iterate a value the way `FROM` does: sequences iterate their children;
/// anything else becomes a singleton holding an unnamed copy, so an
/// accidental name facet does not leak into the row binding.
pub fn range_over(value: ExprValue) -> Result<SeqIter, EvalError> {
    if let Some(iter) = value.take_iter()? {
        return Ok(iter);
    }
    let doc = value.as_doc().expect("non-sequence values are documents");
    match doc {
        DocValue::List(items) | DocValue::Sexp(items) => {
            let items: Vec<DocValue> = items.clone();
            Ok(Box::new(
                items.into_iter().map(|item| Ok(ExprValue::from_doc(item))),
            ))
        }
        _ => Ok(Box::new(std::iter::once(Ok(value.unnamed())))),
    }
}

/// `UNPIVOT`: a struct becomes one named value per field; any non-struct
/// becomes a singleton bag of the value under the synthetic name `_1`.
pub fn unpivot(value: ExprValue) -> Result<ExprValue, EvalError> {
    let doc = match value.as_doc() {
        Some(doc) => doc.clone(),
        None => value.materialize()?,
    };
    if let DocValue::Struct(fields) = doc {
        Ok(ExprValue::sequence(
            DocType::Bag,
            Box::new(fields.into_iter().map(|(name, field)| {
                Ok(ExprValue::from_doc(field).named(DocValue::Symbol(name)))
            })),
        ))
    } else {
        Ok(ExprValue::bag_of(vec![ExprValue::from_doc(doc)
            .named(DocValue::Symbol("_1".to_owned()))]))
    }
}
