//! Runtime value model
//!
//! [`BaseValue`] is the closed set of value kinds shared by the binder,
//! emitter, and execution engine. All coercions are total: there is no
//! value combination that can fault the engine at runtime.
//!
//! Values constructed from free text (string literals, host input) are
//! normalized once at construction: a trimmed, case-folded probe decides
//! whether the text is a Boolean, a decimal Number, or stays a String.
//! Reads never re-normalize.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Separator joining index strings into a composite array key.
///
/// `a[1][2] = x` stores under the single key `"1\u{1}2"`; arrays are one
/// flat insertion-ordered map regardless of indexing depth.
pub const KEY_SEPARATOR: char = '\u{1}';

/// Binary operators over [`BaseValue`]s.
///
/// `And`/`Or` are listed for the syntax tree; the emitter lowers them to
/// short-circuit jumps, so the engine never applies them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    /// Display name used in diagnostics and hover text.
    pub fn display_text(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "And",
            BinaryOperator::Or => "Or",
        }
    }
}

/// A Basil runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum BaseValue {
    Number(Decimal),
    String(String),
    Boolean(bool),
    Array(IndexMap<String, BaseValue>),
}

impl Default for BaseValue {
    fn default() -> Self {
        BaseValue::String(String::new())
    }
}

impl BaseValue {
    /// Construct a value from free text, applying construction-time
    /// normalization. The String fallback keeps the original, untrimmed
    /// text; the trimmed probe is only used for classification.
    pub fn from_text(text: &str) -> BaseValue {
        let probe = text.trim();
        if probe.eq_ignore_ascii_case("true") {
            return BaseValue::Boolean(true);
        }
        if probe.eq_ignore_ascii_case("false") {
            return BaseValue::Boolean(false);
        }
        if let Ok(number) = probe.parse::<Decimal>() {
            return BaseValue::Number(number);
        }
        BaseValue::String(text.to_string())
    }

    /// True only for a Boolean holding true. Numbers and Strings are
    /// always false; this is intentional, not a missing coercion.
    pub fn to_boolean(&self) -> bool {
        matches!(self, BaseValue::Boolean(true))
    }

    /// The decimal value of a Number; 0 for every other kind.
    pub fn to_number(&self) -> Decimal {
        match self {
            BaseValue::Number(n) => *n,
            _ => Decimal::ZERO,
        }
    }

    /// The entries of an Array; a fresh empty map for every other kind.
    pub fn into_array(self) -> IndexMap<String, BaseValue> {
        match self {
            BaseValue::Array(entries) => entries,
            _ => IndexMap::new(),
        }
    }

    /// Display form used for concatenation, comparisons against
    /// non-numbers, and debugger snapshots.
    pub fn display(&self) -> String {
        match self {
            BaseValue::Number(n) => n.normalize().to_string(),
            BaseValue::String(s) => s.clone(),
            BaseValue::Boolean(true) => "True".to_string(),
            BaseValue::Boolean(false) => "False".to_string(),
            BaseValue::Array(entries) => {
                let mut out = String::new();
                for (key, value) in entries {
                    // Composite keys render with '.' between dimensions.
                    let shown: String = key
                        .split(KEY_SEPARATOR)
                        .collect::<Vec<_>>()
                        .join(".");
                    out.push_str(&shown);
                    out.push('=');
                    out.push_str(&value.display());
                    out.push(';');
                }
                out
            }
        }
    }

    /// Apply a binary operator. Total: every operand combination yields a
    /// value. Division by zero yields 0.
    pub fn binary(op: BinaryOperator, left: &BaseValue, right: &BaseValue) -> BaseValue {
        use BaseValue::*;
        match op {
            BinaryOperator::Add => match (left, right) {
                (Number(a), Number(b)) => Number(a + b),
                _ => String(format!("{}{}", left.display(), right.display())),
            },
            BinaryOperator::Subtract => Number(left.to_number() - right.to_number()),
            BinaryOperator::Multiply => Number(left.to_number() * right.to_number()),
            BinaryOperator::Divide => Number(
                left.to_number()
                    .checked_div(right.to_number())
                    .unwrap_or(Decimal::ZERO),
            ),
            BinaryOperator::Equal => Boolean(Self::values_equal(left, right)),
            BinaryOperator::NotEqual => Boolean(!Self::values_equal(left, right)),
            BinaryOperator::LessThan => Boolean(left.to_number() < right.to_number()),
            BinaryOperator::LessThanOrEqual => Boolean(left.to_number() <= right.to_number()),
            BinaryOperator::GreaterThan => Boolean(left.to_number() > right.to_number()),
            BinaryOperator::GreaterThanOrEqual => Boolean(left.to_number() >= right.to_number()),
            // Lowered to jumps by the emitter; kept total anyway.
            BinaryOperator::And => Boolean(left.to_boolean() && right.to_boolean()),
            BinaryOperator::Or => Boolean(left.to_boolean() || right.to_boolean()),
        }
    }

    /// Negate a value numerically.
    pub fn negate(&self) -> BaseValue {
        BaseValue::Number(-self.to_number())
    }

    fn values_equal(left: &BaseValue, right: &BaseValue) -> bool {
        match (left, right) {
            (BaseValue::Number(a), BaseValue::Number(b)) => a == b,
            _ => left.display() == right.display(),
        }
    }
}

/// Join index display strings into one composite array key.
pub fn composite_key(indices: &[BaseValue]) -> String {
    let parts: Vec<String> = indices.iter().map(BaseValue::display).collect();
    parts.join(&KEY_SEPARATOR.to_string())
}
