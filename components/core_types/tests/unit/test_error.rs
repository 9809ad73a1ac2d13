//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, JsError, Value};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_error_kind_display_names() {
        assert_eq!(ErrorKind::Error.to_string(), "Error");
        assert_eq!(ErrorKind::TypeError.to_string(), "TypeError");
        assert_eq!(ErrorKind::AggregateError.to_string(), "AggregateError");
        assert_eq!(ErrorKind::RangeError.to_string(), "RangeError");
    }

    #[test]
    fn test_error_kind_equality() {
        assert_eq!(ErrorKind::TypeError, ErrorKind::TypeError);
        assert_ne!(ErrorKind::TypeError, ErrorKind::RangeError);
    }
}

#[cfg(test)]
mod js_error_tests {
    use super::*;

    #[test]
    fn test_js_error_new_is_minimal() {
        let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");

        assert!(matches!(error.kind, ErrorKind::TypeError));
        assert_eq!(error.message, "undefined is not a function");
        assert!(error.thrown.is_none());
        assert!(error.errors.is_empty());
    }

    #[test]
    fn test_thrown_string_round_trips() {
        let error = JsError::thrown(Value::string("x"));
        assert_eq!(error.kind, ErrorKind::Thrown);
        assert!(error.is_thrown());
        assert_eq!(error.to_value(), Value::string("x"));
        assert_eq!(error.to_string(), "x");
    }

    #[test]
    fn test_value_converts_into_thrown_error() {
        let error: JsError = Value::Smi(7).into();
        assert_eq!(error, JsError::thrown(Value::Smi(7)));
    }

    #[test]
    fn test_error_object_to_value_is_rendered_message() {
        let error = JsError::type_error("nope");
        assert_eq!(error.to_value(), Value::string("TypeError: nope"));
    }

    #[test]
    fn test_aggregate_keeps_order() {
        let error = JsError::aggregate(
            "all promises were rejected",
            vec![JsError::thrown(Value::string("a")), JsError::type_error("b")],
        );
        assert_eq!(error.kind, ErrorKind::AggregateError);
        assert_eq!(error.errors[0].to_value(), Value::string("a"));
        assert_eq!(error.errors[1].kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_errors_compare_by_content() {
        assert_eq!(JsError::type_error("a"), JsError::type_error("a"));
        assert_ne!(JsError::type_error("a"), JsError::type_error("b"));
        assert_ne!(
            JsError::thrown(Value::Smi(1)),
            JsError::thrown(Value::Smi(2))
        );
    }

    #[test]
    fn test_js_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&JsError::type_error("x"));
    }
}
