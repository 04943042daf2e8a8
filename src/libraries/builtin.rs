//! Pure library implementations
//!
//! `Math` and `Array` have no host dependency, so their implementations
//! ship with the crate and any host can reuse them.

use rust_decimal::Decimal;

use super::{ArrayPlugin, LibraryCall, MathPlugin};
use crate::values::BaseValue;

pub struct BuiltinMath;

impl MathPlugin for BuiltinMath {
    fn abs(&mut self, number: &BaseValue) -> LibraryCall {
        LibraryCall::Value(BaseValue::Number(number.to_number().abs()))
    }

    fn ceiling(&mut self, number: &BaseValue) -> LibraryCall {
        LibraryCall::Value(BaseValue::Number(number.to_number().ceil()))
    }

    fn floor(&mut self, number: &BaseValue) -> LibraryCall {
        LibraryCall::Value(BaseValue::Number(number.to_number().floor()))
    }

    fn round(&mut self, number: &BaseValue) -> LibraryCall {
        LibraryCall::Value(BaseValue::Number(number.to_number().round()))
    }

    fn min(&mut self, a: &BaseValue, b: &BaseValue) -> LibraryCall {
        LibraryCall::Value(BaseValue::Number(a.to_number().min(b.to_number())))
    }

    fn max(&mut self, a: &BaseValue, b: &BaseValue) -> LibraryCall {
        LibraryCall::Value(BaseValue::Number(a.to_number().max(b.to_number())))
    }

    fn remainder(&mut self, dividend: &BaseValue, divisor: &BaseValue) -> LibraryCall {
        let result = dividend
            .to_number()
            .checked_rem(divisor.to_number())
            .unwrap_or(Decimal::ZERO);
        LibraryCall::Value(BaseValue::Number(result))
    }

    fn get_pi(&mut self) -> LibraryCall {
        // 28 significant digits, the full precision a Decimal carries.
        let pi: Decimal = "3.141592653589793238462643383"
            .parse()
            .unwrap_or(Decimal::ZERO);
        LibraryCall::Value(BaseValue::Number(pi))
    }
}

pub struct BuiltinArray;

impl ArrayPlugin for BuiltinArray {
    fn get_item_count(&mut self, array: &BaseValue) -> LibraryCall {
        let count = match array {
            BaseValue::Array(entries) => entries.len(),
            _ => 0,
        };
        LibraryCall::Value(BaseValue::Number(Decimal::from(count)))
    }

    fn is_array(&mut self, value: &BaseValue) -> LibraryCall {
        LibraryCall::Value(BaseValue::Boolean(matches!(value, BaseValue::Array(_))))
    }

    fn contains_value(&mut self, array: &BaseValue, value: &BaseValue) -> LibraryCall {
        let found = match array {
            BaseValue::Array(entries) => {
                entries.values().any(|v| v.display() == value.display())
            }
            _ => false,
        };
        LibraryCall::Value(BaseValue::Boolean(found))
    }

    fn contains_index(&mut self, array: &BaseValue, index: &BaseValue) -> LibraryCall {
        let found = match array {
            BaseValue::Array(entries) => entries.contains_key(&index.display()),
            _ => false,
        };
        LibraryCall::Value(BaseValue::Boolean(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn value(call: LibraryCall) -> BaseValue {
        match call {
            LibraryCall::Value(v) => v,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn math_methods_coerce_through_to_number() {
        let mut math = BuiltinMath;
        assert_eq!(
            value(math.abs(&BaseValue::from_text("-4"))),
            BaseValue::from_text("4")
        );
        assert_eq!(
            value(math.floor(&BaseValue::from_text("2.9"))),
            BaseValue::from_text("2")
        );
        // Non-numbers coerce to zero, never fault.
        assert_eq!(
            value(math.ceiling(&BaseValue::String("abc".into()))),
            BaseValue::Number(Decimal::ZERO)
        );
        assert_eq!(
            value(math.remainder(&BaseValue::from_text("7"), &BaseValue::from_text("0"))),
            BaseValue::Number(Decimal::ZERO)
        );
    }

    #[test]
    fn array_inspection() {
        let mut plugin = BuiltinArray;
        let mut entries = IndexMap::new();
        entries.insert("1".to_string(), BaseValue::from_text("a"));
        entries.insert("2".to_string(), BaseValue::from_text("b"));
        let array = BaseValue::Array(entries);

        assert_eq!(
            value(plugin.get_item_count(&array)),
            BaseValue::from_text("2")
        );
        assert_eq!(value(plugin.is_array(&array)), BaseValue::Boolean(true));
        assert_eq!(
            value(plugin.is_array(&BaseValue::from_text("2"))),
            BaseValue::Boolean(false)
        );
        assert_eq!(
            value(plugin.contains_value(&array, &BaseValue::String("b".into()))),
            BaseValue::Boolean(true)
        );
        assert_eq!(
            value(plugin.contains_index(&array, &BaseValue::from_text("2"))),
            BaseValue::Boolean(true)
        );
        assert_eq!(
            value(plugin.contains_index(&array, &BaseValue::from_text("3"))),
            BaseValue::Boolean(false)
        );
    }
}
