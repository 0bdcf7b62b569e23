//! `{placeholder}` templates for command strings
//!
//! Named fields are written `{name}` and substituted on render; `{{` and
//! `}}` produce literal braces. Shell snippets that need braces (awk
//! programs, PowerShell script blocks) must double them.

use std::collections::HashMap;

use crate::error::CommandError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed command template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template string.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Format`] for empty or malformed field names
    /// and for unbalanced braces.
    pub fn parse(source: &str) -> Result<Self, CommandError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(CommandError::Format(format!(
                            "Unclosed placeholder in '{source}'"
                        )));
                    }
                    if name.is_empty() {
                        return Err(CommandError::Format(format!(
                            "Empty placeholder in '{source}'"
                        )));
                    }
                    if !is_identifier(&name) {
                        return Err(CommandError::Format(format!(
                            "Invalid placeholder '{{{name}}}' in '{source}'"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name));
                }
                '}' => {
                    return Err(CommandError::Format(format!(
                        "Single '}}' encountered in '{source}'"
                    )));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Placeholder names in order of first appearance
    #[must_use]
    pub fn field_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Field(name) = segment
                && !keys.contains(&name.as_str())
            {
                keys.push(name);
            }
        }
        keys
    }

    /// Substitutes every placeholder from `context`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Format`] naming the first missing key.
    pub fn render(&self, context: &HashMap<String, String>) -> Result<String, CommandError> {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Field(name) => {
                    let value = context.get(name).ok_or_else(|| {
                        CommandError::Format(format!("Missing value for '{name}'"))
                    })?;
                    rendered.push_str(value);
                }
            }
        }
        Ok(rendered)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_keys() {
        let template = Template::parse("cat /sys/class/net/{interface}/address {interface} {x}")
            .unwrap();
        assert_eq!(template.field_keys(), vec!["interface", "x"]);
    }

    #[test]
    fn test_escaped_braces() {
        let template = Template::parse("awk '{{print $1}}' {file}").unwrap();
        assert_eq!(template.field_keys(), vec!["file"]);

        let context = HashMap::from([("file".to_string(), "/proc/loadavg".to_string())]);
        assert_eq!(
            template.render(&context).unwrap(),
            "awk '{print $1}' /proc/loadavg"
        );
    }

    #[test]
    fn test_rejects_malformed_templates() {
        for source in ["echo {}", "echo {name", "echo }", "echo {1abc}", "echo {a b}"] {
            let err = Template::parse(source).unwrap_err();
            assert!(err.is_format(), "{source} should fail: {err}");
        }
    }

    #[test]
    fn test_render_missing_key() {
        let template = Template::parse("ping {target}").unwrap();
        let err = template.render(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_plain_string() {
        let template = Template::parse("shutdown -h now").unwrap();
        assert!(template.field_keys().is_empty());
        assert_eq!(template.render(&HashMap::new()).unwrap(), "shutdown -h now");
    }
}
