use super::models::SearchFilter;

const RECEIVED_FLOOR: &str = "1900-01-01T00:00:00Z";

const WELL_KNOWN_FOLDERS: &[&str] = &[
    "archive",
    "deleteditems",
    "drafts",
    "inbox",
    "junkemail",
    "outbox",
    "sentitems",
];

pub fn mailbox_root(mailbox: &str) -> String {
    let mailbox = mailbox.trim();
    if mailbox.is_empty() || mailbox.eq_ignore_ascii_case("me") {
        "/me".to_string()
    } else {
        format!("/users/{mailbox}")
    }
}

pub fn message_endpoint(root: &str, id: &str) -> String {
    format!("{root}/messages/{id}")
}

pub fn permanent_delete_endpoint(root: &str, id: &str) -> String {
    format!("{root}/messages/{id}/permanentDelete")
}

pub fn move_endpoint(root: &str, id: &str) -> String {
    format!("{root}/messages/{id}/move")
}

pub fn attachment_value_endpoint(root: &str, message_id: &str, attachment_id: &str) -> String {
    format!("{root}/messages/{message_id}/attachments/{attachment_id}/$value")
}

pub fn send_endpoint(root: &str) -> String {
    format!("{root}/sendMail")
}

pub fn folder_endpoint(root: &str, folder: &str) -> String {
    format!("{root}/mailFolders/{folder}")
}

pub fn folder_list_endpoint(root: &str) -> String {
    format!("{root}/mailFolders")
}

pub fn folder_messages_endpoint(root: &str, folder: &str) -> String {
    format!("{root}/mailFolders/{folder}/messages")
}

pub fn folder_delta_endpoint(root: &str, folder: &str) -> String {
    format!("{root}/mailFolders/{folder}/messages/delta")
}

/// Maps a folder display name to its well-known alias, ignoring case and spaces.
pub fn well_known_folder(name: &str) -> Option<&'static str> {
    let normalized = name
        .chars()
        .filter(|value| !value.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    WELL_KNOWN_FOLDERS
        .iter()
        .copied()
        .find(|alias| *alias == normalized)
}

pub fn folder_lookup_query(display_name: &str) -> Vec<(String, String)> {
    vec![
        (
            "$filter".to_string(),
            format!("displayName eq '{}'", escape_odata(display_name)),
        ),
        ("$select".to_string(), "id,displayName".to_string()),
        ("$top".to_string(), "1".to_string()),
    ]
}

pub fn bind_query() -> Vec<(String, String)> {
    vec![
        (
            "$select".to_string(),
            "id,internetMessageId,subject,from,toRecipients,ccRecipients,bccRecipients,body,receivedDateTime"
                .to_string(),
        ),
        ("$expand".to_string(), "attachments".to_string()),
    ]
}

pub fn delta_query() -> Vec<(String, String)> {
    vec![("$select".to_string(), "id,internetMessageId".to_string())]
}

/// `None` when the filter can never match, so no request should be made.
pub fn search_query(
    filter: &SearchFilter,
    page_size: u32,
    offset: u32,
) -> Option<Vec<(String, String)>> {
    let expression = odata_filter(filter)?;

    Some(vec![
        ("$select".to_string(), "id,internetMessageId".to_string()),
        ("$filter".to_string(), expression),
        ("$orderby".to_string(), "receivedDateTime asc".to_string()),
        ("$top".to_string(), page_size.to_string()),
        ("$skip".to_string(), offset.to_string()),
        ("$count".to_string(), "true".to_string()),
    ])
}

/// `None` means match nothing.
///
/// Graph rejects `$orderby` on a property the filter does not restrict
/// first, so every expression opens with an always-true `receivedDateTime`
/// clause.
pub fn odata_filter(filter: &SearchFilter) -> Option<String> {
    let SearchFilter::Criteria {
        has_attachments,
        subject_contains_any,
    } = filter
    else {
        return None;
    };

    let mut clauses = vec![format!("receivedDateTime ge {RECEIVED_FLOOR}")];
    if *has_attachments {
        clauses.push("hasAttachments eq true".to_string());
    }

    let subjects = subject_contains_any
        .iter()
        .map(|phrase| phrase.trim())
        .filter(|phrase| !phrase.is_empty())
        .map(|phrase| format!("contains(subject,'{}')", escape_odata(phrase)))
        .collect::<Vec<_>>();

    match subjects.len() {
        0 => {}
        1 => clauses.extend(subjects),
        _ => clauses.push(format!("({})", subjects.join(" or "))),
    }

    Some(clauses.join(" and "))
}

fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}
