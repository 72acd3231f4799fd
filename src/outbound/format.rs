//! The `.email` text format: `key: value` header lines, a `Body:` marker
//! line, then the body.

use crate::api::models::{EmailAddress, Importance, OutgoingMessage};
use crate::error::{AppError, AppResult};

pub const BODY_MARKER: &str = "Body:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessageSpec {
    headers: Vec<(String, String)>,
    pub body: String,
}

impl OutboundMessageSpec {
    /// Later values for the same key replace earlier ones in place.
    pub fn insert_header(&mut self, key: &str, value: &str) {
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();

        match self.headers.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((key, value)),
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn is_html(&self) -> bool {
        matches!(self.header("html"), Some("1" | "true"))
    }
}

pub fn parse(raw: &str) -> AppResult<OutboundMessageSpec> {
    if raw.trim().is_empty() {
        return Err(invalid("the file is empty"));
    }

    let Some(marker) = raw.find(BODY_MARKER) else {
        return Err(invalid("no `Body:` marker"));
    };

    let mut draft = OutboundMessageSpec::default();
    for line in raw[..marker].trim().split('\n') {
        if let Some((key, value)) = line.split_once(':') {
            draft.insert_header(key, value);
        }
    }

    // The body starts on the line after the marker.
    let body = match raw[marker..].find('\n') {
        Some(newline) => raw[marker + newline + 1..].trim(),
        None => "",
    };

    if draft.headers.is_empty() {
        return Err(invalid("no headers before `Body:`"));
    }
    if body.is_empty() {
        return Err(invalid("the body is empty"));
    }

    draft.body = body.to_string();
    Ok(draft)
}

pub fn compose(draft: &OutboundMessageSpec) -> AppResult<OutgoingMessage> {
    let html_body = if draft.is_html() {
        draft.body.clone()
    } else {
        transform_body(&draft.body)
    };

    let mut message = OutgoingMessage {
        html_body,
        ..OutgoingMessage::default()
    };

    for (key, value) in draft.headers() {
        match key {
            "subject" => message.subject = value.to_string(),
            "importance" => message.importance = parse_importance(value),
            "to" | "torecipients" => message.to.extend(parse_address_list(value)),
            "cc" | "ccrecipients" => message.cc.extend(parse_address_list(value)),
            "bcc" | "bccrecipients" => message.bcc.extend(parse_address_list(value)),
            "from" => message.from = parse_address(value),
            "replyto" | "reply-to" => message.reply_to.extend(parse_address_list(value)),
            _ => {}
        }
    }

    if message.subject.trim().is_empty() {
        return Err(invalid("missing subject"));
    }
    if message.to.is_empty() {
        return Err(invalid("no `To` recipients"));
    }

    Ok(message)
}

pub fn parse_importance(value: &str) -> Importance {
    if value.eq_ignore_ascii_case("low") {
        Importance::Low
    } else if value.eq_ignore_ascii_case("high") {
        Importance::High
    } else {
        Importance::Normal
    }
}

pub fn parse_address_list(value: &str) -> Vec<EmailAddress> {
    value.split(',').filter_map(parse_address).collect()
}

/// `Name <address>` or a bare address. A bracket group without `@` is read
/// as the display name, with the address in front of it.
pub fn parse_address(token: &str) -> Option<EmailAddress> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let bracketed = token
        .strip_suffix('>')
        .and_then(|rest| rest.split_once('<'));

    let Some((outside, inside)) = bracketed else {
        return Some(EmailAddress::new(token));
    };

    let outside = outside.trim();
    let inside = inside.trim();

    let address = if inside.is_empty() {
        EmailAddress::new(outside)
    } else if inside.contains('@') {
        EmailAddress::named(outside, inside)
    } else {
        EmailAddress::named(inside, outside)
    };

    Some(address)
}

/// Plain text to HTML: leading spaces become `&nbsp;` and lines are joined
/// with `<br>`.
pub fn transform_body(body: &str) -> String {
    body.split('\n')
        .map(|line| {
            let line = line.trim_start_matches(['\r', '\t']);
            let indent = line.len() - line.trim_start_matches(' ').len();
            format!("{}{}", "&nbsp;".repeat(indent), line.trim())
        })
        .collect::<Vec<_>>()
        .join("<br>")
}

fn invalid(reason: &str) -> AppError {
    AppError::InvalidInput(reason.to_string())
}
