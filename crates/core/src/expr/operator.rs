use std::fmt;

use serde::{Deserialize, Serialize};

/// A comparison between a row field and a value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Operator {
	/// `=`
	Equal,
	/// `!=`
	NotEqual,
	/// `<`
	LessThan,
	/// `<=`
	LessThanEqual,
	/// `>`
	MoreThan,
	/// `>=`
	MoreThanEqual,
	/// `IN`
	Inside,
	/// `NOT IN`
	NotInside,
	/// `LIKE`
	Like,
	/// `NOT LIKE`
	NotLike,
	/// `ILIKE`
	ILike,
	/// `NOT ILIKE`
	NotILike,
	/// `IS`
	Is,
	/// `IS NOT`
	IsNot,
}

impl Operator {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Equal => "=",
			Self::NotEqual => "!=",
			Self::LessThan => "<",
			Self::LessThanEqual => "<=",
			Self::MoreThan => ">",
			Self::MoreThanEqual => ">=",
			Self::Inside => "IN",
			Self::NotInside => "NOT IN",
			Self::Like => "LIKE",
			Self::NotLike => "NOT LIKE",
			Self::ILike => "ILIKE",
			Self::NotILike => "NOT ILIKE",
			Self::Is => "IS",
			Self::IsNot => "IS NOT",
		}
	}

	/// Check if this operator expects an array of candidate values
	pub fn is_set(&self) -> bool {
		matches!(self, Self::Inside | Self::NotInside)
	}

	/// Check if this operator expects a string pattern
	pub fn is_pattern(&self) -> bool {
		matches!(self, Self::Like | Self::NotLike | Self::ILike | Self::NotILike)
	}
}

impl fmt::Display for Operator {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Operator {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let op = match s.trim().to_ascii_uppercase().as_str() {
			"=" | "==" => Self::Equal,
			"!=" | "<>" => Self::NotEqual,
			"<" => Self::LessThan,
			"<=" => Self::LessThanEqual,
			">" => Self::MoreThan,
			">=" => Self::MoreThanEqual,
			"IN" => Self::Inside,
			"NOT IN" => Self::NotInside,
			"LIKE" => Self::Like,
			"NOT LIKE" => Self::NotLike,
			"ILIKE" => Self::ILike,
			"NOT ILIKE" => Self::NotILike,
			"IS" => Self::Is,
			"IS NOT" => Self::IsNot,
			_ => return Err(format!("'{s}' is not a comparison operator")),
		};
		Ok(op)
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case::equal("=", Operator::Equal)]
	#[case::double_equal("==", Operator::Equal)]
	#[case::not_in("not in", Operator::NotInside)]
	#[case::ilike("ILIKE", Operator::ILike)]
	#[case::is_not(" IS NOT ", Operator::IsNot)]
	fn parses_operators(#[case] input: &str, #[case] expected: Operator) {
		assert_eq!(input.parse::<Operator>().unwrap(), expected);
	}

	#[test]
	fn rejects_unknown_operators() {
		assert!("~".parse::<Operator>().is_err());
	}
}
