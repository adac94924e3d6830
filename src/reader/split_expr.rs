//! Split expression grammar: `A+B[+C...]` union, `name$expr` predicate
//! filter, and the `path^split` initial-split suffix (parsed one level up,
//! in `config::parse_path_spec`).
//!
//! This is a small hand-written recursive-descent parser, not a Python-
//! style `eval` — predicates compile to a typed AST evaluated against a
//! `RowView`, so a split expression can never execute arbitrary code.

use crate::codec::Value;
use crate::error::{ConfigError, FddError};
use crate::index::{GeneralIndex, IndexKind, Key, KeylessIndex};
use crate::row::RowView;

use super::{ReOpen, Reader};
use std::io::{Read, Seek, Write};

pub fn resolve<R: Read + Seek + Write + ReOpen>(reader: &Reader<R>, expr: &str) -> Result<IndexKind, FddError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(ConfigError::InvalidSplitExpr("empty split expression".into()).into());
    }
    if let Some(parts) = split_top_level(expr, '+') {
        let mut operands = parts.into_iter().map(|p| resolve(reader, p));
        let first = operands.next().unwrap()?;
        return operands.try_fold(first, |acc, next| union(acc, next?));
    }
    if let Some((name, pred_src)) = expr.split_once('$') {
        let ast = parse_predicate(pred_src)?;
        let base = reader.load_named_split(name)?;
        return Ok(filter_index(reader, &base, &ast)?);
    }
    reader.load_named_split(expr)
}

/// Splits `s` on every top-level occurrence of `sep` (there is no bracket
/// nesting in this grammar, so "top-level" just means "occurs at all").
/// Returns `None` if `sep` doesn't occur, signalling "not this production".
fn split_top_level(s: &str, sep: char) -> Option<Vec<&str>> {
    if !s.contains(sep) {
        return None;
    }
    Some(s.split(sep).map(str::trim).collect())
}

fn union(a: IndexKind, b: IndexKind) -> Result<IndexKind, FddError> {
    match (a, b) {
        (IndexKind::Keyless(a), IndexKind::Keyless(b)) => {
            let arity = a.arity();
            let mut seen = std::collections::HashSet::new();
            let mut merged = KeylessIndex::new(crate::index::DEFAULT_WIDTH, arity);
            for (_, list) in a.iter().chain(b.iter()) {
                let offsets = list.to_vec();
                if seen.insert(offsets.clone()) {
                    merged.push(&offsets)?;
                }
            }
            Ok(IndexKind::Keyless(merged))
        }
        (a, b) if std::mem::discriminant(&a) != std::mem::discriminant(&b) => {
            Err(ConfigError::InvalidSplitExpr("all operands of a split union must be the same variant".into()).into())
        }
        (a, b) => {
            let mut merged: GeneralIndex<Key> = GeneralIndex::new(crate::index::DEFAULT_WIDTH, a.arity());
            for key in a.keys() {
                if let Some(list) = a.get(&key) {
                    merged.set(key, &list.to_vec())?;
                }
            }
            for key in b.keys() {
                if let Some(list) = b.get(&key) {
                    merged.set(key, &list.to_vec())?; // later operand wins on collision
                }
            }
            Ok(IndexKind::General(merged))
        }
    }
}

fn filter_index<R: Read + Seek + Write + ReOpen>(
    reader: &Reader<R>,
    base: &IndexKind,
    ast: &Expr,
) -> Result<IndexKind, FddError> {
    let columns = reader.columns.as_deref().unwrap_or(&[]);
    let mut out: GeneralIndex<Key> = GeneralIndex::new(crate::index::DEFAULT_WIDTH, base.arity());
    for key in base.keys() {
        let Some(offsets) = base.get(&key).map(|l| l.to_vec()) else { continue };
        let cells = offsets
            .windows(2)
            .map(|w| reader_read_range(reader, w[0], w[1]))
            .collect::<Result<Vec<_>, _>>()?;
        let source = OwnedCells(cells);
        let row = RowView::new(columns, codec_table(reader), &source);
        if ast.eval(&row)? {
            out.set(key, &offsets)?;
        }
    }
    Ok(IndexKind::General(out))
}

// Small accessors kept private to this file so `Reader`'s fields stay
// crate-private rather than pub(super).
fn reader_read_range<R: Read + Seek + Write + ReOpen>(reader: &Reader<R>, start: u64, end: u64) -> Result<Vec<u8>, FddError> {
    reader.read_range(start, end)
}
fn codec_table<R>(reader: &Reader<R>) -> &crate::codec::CodecTable {
    reader.codec_table.as_ref()
}

struct OwnedCells(Vec<Vec<u8>>);
impl crate::row::CellSource for OwnedCells {
    fn cell_bytes(&self, index: usize) -> Result<Vec<u8>, FddError> {
        Ok(self.0[index].clone())
    }
    fn cell_len(&self, index: usize) -> Result<usize, FddError> {
        Ok(self.0[index].len())
    }
    fn overwrite_cell(&self, _index: usize, _bytes: &[u8]) -> Result<(), FddError> {
        Err(crate::error::StateError::ReadOnly.into())
    }
}

// ── Predicate AST ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Int(i128),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
enum Expr {
    Cmp(String, CmpOp, Literal),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, row: &RowView) -> Result<bool, FddError> {
        match self {
            Expr::And(a, b) => Ok(a.eval(row)? && b.eval(row)?),
            Expr::Or(a, b) => Ok(a.eval(row)? || b.eval(row)?),
            Expr::Cmp(name, op, lit) => {
                let value = row.get_named(name)?;
                Ok(compare(&value, *op, lit))
            }
        }
    }
}

fn compare(value: &Value, op: CmpOp, lit: &Literal) -> bool {
    let ordering = match (value, lit) {
        (Value::Int(i), Literal::Int(j)) => i.partial_cmp(j),
        (Value::Int(i), Literal::Float(f)) => (*i as f64).partial_cmp(f),
        (Value::Float(a), Literal::Float(b)) => a.partial_cmp(b),
        (Value::Float(a), Literal::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Literal::Str(b)) => a.as_str().partial_cmp(b.as_str()),
        (Value::Bool(a), Literal::Bool(b)) => a.partial_cmp(b),
        _ => None,
    };
    match op {
        CmpOp::Eq => ordering == Some(std::cmp::Ordering::Equal),
        CmpOp::Ne => ordering != Some(std::cmp::Ordering::Equal),
        CmpOp::Lt => ordering == Some(std::cmp::Ordering::Less),
        CmpOp::Le => matches!(ordering, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)),
        CmpOp::Gt => ordering == Some(std::cmp::Ordering::Greater),
        CmpOp::Ge => matches!(ordering, Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)),
    }
}

/// Parse `"col>5 && other=='x'"` style predicates. Public entry point
/// mirrors spec.md's `name$expr` syntax one layer up.
pub fn parse_split_expr(expr: &str) -> Result<(), FddError> {
    if let Some((_, pred)) = expr.split_once('$') {
        parse_predicate(pred)?;
    }
    Ok(())
}

fn parse_predicate(src: &str) -> Result<Expr, FddError> {
    let or_parts: Vec<&str> = split_on(src, "||");
    if or_parts.len() > 1 {
        let mut parts = or_parts.into_iter();
        let first = parse_and(parts.next().unwrap())?;
        return parts.try_fold(first, |acc, p| Ok(Expr::Or(Box::new(acc), Box::new(parse_and(p)?))));
    }
    parse_and(src)
}

fn parse_and(src: &str) -> Result<Expr, FddError> {
    let and_parts: Vec<&str> = split_on(src, "&&");
    if and_parts.len() > 1 {
        let mut parts = and_parts.into_iter();
        let first = parse_cmp(parts.next().unwrap())?;
        return parts.try_fold(first, |acc, p| Ok(Expr::And(Box::new(acc), Box::new(parse_cmp(p)?))));
    }
    parse_cmp(src)
}

fn split_on<'a>(src: &'a str, op: &str) -> Vec<&'a str> {
    src.split(op).map(str::trim).collect()
}

fn parse_cmp(src: &str) -> Result<Expr, FddError> {
    const OPS: [(&str, CmpOp); 6] =
        [("==", CmpOp::Eq), ("!=", CmpOp::Ne), ("<=", CmpOp::Le), (">=", CmpOp::Ge), ("<", CmpOp::Lt), (">", CmpOp::Gt)];
    for (token, op) in OPS {
        if let Some((name, lit)) = src.split_once(token) {
            return Ok(Expr::Cmp(name.trim().to_owned(), op, parse_literal(lit.trim())?));
        }
    }
    Err(ConfigError::InvalidSplitExpr(format!("no comparison operator in '{src}'")).into())
}

fn parse_literal(src: &str) -> Result<Literal, FddError> {
    if let Some(stripped) = src.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Ok(Literal::Str(stripped.to_owned()));
    }
    if let Some(stripped) = src.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Ok(Literal::Str(stripped.to_owned()));
    }
    match src {
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }
    if let Ok(i) = src.parse::<i128>() {
        return Ok(Literal::Int(i));
    }
    if let Ok(f) = src.parse::<f64>() {
        return Ok(Literal::Float(f));
    }
    Err(ConfigError::InvalidSplitExpr(format!("unparseable literal '{src}'")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let ast = parse_predicate("n>5").unwrap();
        match ast {
            Expr::Cmp(name, CmpOp::Gt, Literal::Int(5)) => assert_eq!(name, "n"),
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_conjunction() {
        let ast = parse_predicate("n>5 && label=='x'").unwrap();
        assert!(matches!(ast, Expr::And(_, _)));
    }

    #[test]
    fn rejects_missing_operator() {
        assert!(parse_predicate("garbage").is_err());
    }

    #[test]
    fn top_level_union_split_respects_plus() {
        assert_eq!(split_top_level("odds+evens", '+'), Some(vec!["odds", "evens"]));
        assert_eq!(split_top_level("all_rows", '+'), None);
    }

    #[test]
    fn union_rejects_mismatched_variants() {
        let sorted = IndexKind::Sorted(crate::index::SortedIndex::build(
            crate::index::DEFAULT_WIDTH,
            1,
            vec![(Key::Int(1), vec![0, 1])],
        ));
        let mut general: GeneralIndex<Key> = GeneralIndex::new(crate::index::DEFAULT_WIDTH, 1);
        general.set(Key::Int(2), &[0, 1]).unwrap();
        let err = union(sorted, IndexKind::General(general)).unwrap_err();
        assert!(matches!(err, FddError::Config(ConfigError::InvalidSplitExpr(_))));
    }

    #[test]
    fn union_merges_two_sorted_splits_keeping_later_wins() {
        let a = IndexKind::Sorted(crate::index::SortedIndex::build(
            crate::index::DEFAULT_WIDTH,
            1,
            vec![(Key::Int(1), vec![0, 1]), (Key::Int(2), vec![1, 2])],
        ));
        let b = IndexKind::Sorted(crate::index::SortedIndex::build(
            crate::index::DEFAULT_WIDTH,
            1,
            vec![(Key::Int(2), vec![9, 10])],
        ));
        let merged = union(a, b).unwrap();
        assert_eq!(merged.get(&Key::Int(2)).unwrap().to_vec(), vec![9, 10]);
        assert_eq!(merged.get(&Key::Int(1)).unwrap().to_vec(), vec![0, 1]);
    }
}
