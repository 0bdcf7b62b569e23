//! Property-based tests for command templates

use std::collections::HashMap;

use proptest::prelude::*;
use remotectl_core::Template;

fn arb_literal() -> impl Strategy<Value = String> {
    "[ -~]{0,40}"
}

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,15}"
}

fn escape(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn escaped_text_renders_verbatim(text in arb_literal()) {
        let template = Template::parse(&escape(&text)).unwrap();
        prop_assert!(template.field_keys().is_empty());
        prop_assert_eq!(template.render(&HashMap::new()).unwrap(), text);
    }

    #[test]
    fn fields_are_substituted(
        prefix in arb_literal(),
        key in arb_key(),
        value in arb_literal(),
        suffix in arb_literal(),
    ) {
        let source = format!("{}{{{key}}}{}{{{key}}}", escape(&prefix), escape(&suffix));
        let template = Template::parse(&source).unwrap();
        prop_assert_eq!(template.field_keys(), vec![key.as_str()]);

        let context = HashMap::from([(key.clone(), value.clone())]);
        prop_assert_eq!(
            template.render(&context).unwrap(),
            format!("{prefix}{value}{suffix}{value}")
        );
    }

    #[test]
    fn missing_field_is_named(key in arb_key()) {
        let template = Template::parse(&format!("echo {{{key}}}")).unwrap();
        let err = template.render(&HashMap::new()).unwrap_err();
        prop_assert!(err.to_string().contains(&key));
    }
}
