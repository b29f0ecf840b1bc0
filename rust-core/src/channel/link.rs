//! Link grammar binding a channel to an instance
//!
//! `<instance> <role> [offset=<n>] [trigger=<bool>]`
//!
//! Tokens are separated by spaces; a space preceded by a backslash is part
//! of the token. Booleans are judged by their first character.

use crate::error::{EngineError, Result};

use super::role::ChannelRole;

/// Parsed link string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub instance: String,
    pub role: ChannelRole,
    pub offset: usize,
    pub trigger: bool,
}

/// Parse a link string
///
/// # Example
/// ```
/// use fft_instance::channel::{parse_link, ChannelRole};
/// let link = parse_link("A1 input-real trigger=yes").unwrap();
/// assert_eq!(link.instance, "A1");
/// assert_eq!(link.role, ChannelRole::InputReal);
/// assert!(link.trigger);
/// ```
pub fn parse_link(text: &str) -> Result<LinkSpec> {
    let malformed = |reason: &str| EngineError::MalformedLink {
        link: text.to_string(),
        reason: reason.to_string(),
    };

    let tokens: Vec<String> = split_escaped(text, ' ')
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect();

    let mut tokens = tokens.into_iter();
    let instance = tokens.next().ok_or_else(|| malformed("missing instance name"))?;
    let role: ChannelRole = tokens
        .next()
        .ok_or_else(|| malformed("missing channel role"))?
        .parse()?;

    let mut spec = LinkSpec {
        instance,
        role,
        offset: 0,
        trigger: false,
    };

    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| EngineError::InvalidOption(token.clone()))?;

        match key {
            "trigger" => spec.trigger = parse_bool(value)?,
            "offset" => {
                spec.offset = value
                    .parse()
                    .map_err(|_| EngineError::InvalidOption(token.clone()))?
            }
            _ => return Err(EngineError::InvalidOption(token.clone())),
        }
    }

    if spec.trigger && !spec.role.is_input() {
        return Err(EngineError::InvalidOption(format!(
            "trigger on {} channel",
            spec.role.token()
        )));
    }

    Ok(spec)
}

/// Split at `delim`, keeping delimiters escaped with a backslash
fn split_escaped(text: &str, delim: char) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&delim) {
            current.push(delim);
            chars.next();
        } else if c == delim {
            tokens.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    tokens.push(current);
    tokens
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.chars().next() {
        Some('Y' | 'y' | 'T' | 't' | '1') => Ok(true),
        Some('N' | 'n' | 'F' | 'f' | '0') => Ok(false),
        _ => Err(EngineError::InvalidOption(format!("trigger={}", value))),
    }
}
