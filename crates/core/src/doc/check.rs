use std::cmp::Ordering;
use std::sync::LazyLock;

use quick_cache::sync::{Cache, GuardResult};
use regex::Regex;

use crate::cnf::REGEX_CACHE_SIZE;

use crate::err::{Error, Result};
use crate::expr::{Comparison, FilterClause, Operator};
use crate::val::{Row, Value};

/// Compares a field value against an operand
pub fn compare(op: Operator, left: &Value, right: &Value) -> Result<bool> {
	let out = match op {
		Operator::Is => left == right,
		Operator::IsNot => left != right,
		_ if left.is_null() || right.is_null() => false,
		Operator::Equal => left == right,
		Operator::NotEqual => left != right,
		Operator::LessThan => left.compare(right) == Some(Ordering::Less),
		Operator::LessThanEqual => {
			matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal))
		}
		Operator::MoreThan => left.compare(right) == Some(Ordering::Greater),
		Operator::MoreThanEqual => {
			matches!(left.compare(right), Some(Ordering::Greater | Ordering::Equal))
		}
		Operator::Inside => right.as_array().is_some_and(|v| v.contains(left)),
		Operator::NotInside => right.as_array().is_some_and(|v| !v.contains(left)),
		Operator::Like => like(left, right, false)?,
		Operator::NotLike => !like(left, right, false)? && left.as_str().is_some(),
		Operator::ILike => like(left, right, true)?,
		Operator::NotILike => !like(left, right, true)? && left.as_str().is_some(),
	};
	Ok(out)
}

/// Matches a string against a LIKE pattern, where `%` matches any run
/// of characters and `_` matches exactly one
fn like(left: &Value, right: &Value, insensitive: bool) -> Result<bool> {
	let (Some(text), Some(pattern)) = (left.as_str(), right.as_str()) else {
		return Ok(false);
	};
	let re = like_regex(pattern, insensitive).map_err(|e| Error::InvalidParam {
		name: pattern.to_owned(),
		message: e.to_string(),
	})?;
	Ok(re.is_match(text))
}

static LIKE_CACHE: LazyLock<Cache<String, Regex>> =
	LazyLock::new(|| Cache::new(REGEX_CACHE_SIZE.max(10)));

/// Translates a LIKE pattern into an anchored regular expression
fn like_source(pattern: &str, insensitive: bool) -> String {
	let mut source = String::with_capacity(pattern.len() + 8);
	source.push_str(if insensitive {
		"(?si)^"
	} else {
		"(?s)^"
	});
	let mut buf = [0u8; 4];
	for c in pattern.chars() {
		match c {
			'%' => source.push_str(".*"),
			'_' => source.push('.'),
			c => source.push_str(&regex::escape(c.encode_utf8(&mut buf))),
		}
	}
	source.push('$');
	source
}

/// Fetches the compiled regex for a LIKE pattern, compiling it on first use
fn like_regex(pattern: &str, insensitive: bool) -> Result<Regex, regex::Error> {
	let source = like_source(pattern, insensitive);
	match LIKE_CACHE.get_value_or_guard(source.as_str(), None) {
		GuardResult::Value(v) => Ok(v),
		GuardResult::Guard(g) => {
			let re = Regex::new(&source)?;
			g.insert(re.clone()).ok();
			Ok(re)
		}
		GuardResult::Timeout => {
			warn!("LIKE pattern cache timeout");
			Regex::new(&source)
		}
	}
}

pub(crate) fn compare_row(row: &Row, v: &Comparison) -> Result<bool> {
	compare(v.op, row.pick(&v.field), &v.value)
}

/// Evaluates a clause which holds no existential or permission clauses
/// against a row. This is the subset of clauses storage is handed.
pub fn matches(clause: &FilterClause, row: &Row) -> Result<bool> {
	match clause {
		FilterClause::Compare(v) => compare_row(row, v),
		FilterClause::Not(v) => Ok(!matches(v, row)?),
		FilterClause::And(v) => {
			for c in v.iter() {
				if !matches(c, row)? {
					return Ok(false);
				}
			}
			Ok(true)
		}
		FilterClause::Or(v) => {
			for c in v.iter() {
				if matches(c, row)? {
					return Ok(true);
				}
			}
			Ok(false)
		}
		FilterClause::Constant(v) => Ok(*v),
		FilterClause::Exists(_) | FilterClause::Permission(_) => {
			fail!("Storage was handed a clause it cannot evaluate: {clause}")
		}
	}
}
