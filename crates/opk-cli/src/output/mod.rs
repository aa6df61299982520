//! Output formatting utilities for the CLI
//!
//! Tables for agent identities, the identity status block, and coloured
//! status messages.

use tabled::{settings::Style, Table, Tabled};

use opk_agent::{AgentEntry, CertificateInfo};
use opk_core::time::format_hm;
use opk_core::{IdentityAge, IdentityStatus};

/// Format the identities loaded in the agent as a table
///
/// Returns "No identities loaded" if the agent holds none.
pub fn format_entries(entries: &[AgentEntry]) -> String {
    if entries.is_empty() {
        return "No identities loaded".to_string();
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "TYPE")]
        key_type: String,
        #[tabled(rename = "FINGERPRINT")]
        fingerprint: String,
        #[tabled(rename = "KEY ID")]
        key_id: String,
        #[tabled(rename = "EXPIRES IN")]
        expires: String,
        #[tabled(rename = "COMMENT")]
        comment: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|entry| {
            let certificate = entry
                .certificate()
                .map(|c| CertificateInfo::from_certificate(&c));
            EntryRow {
                key_type: entry.key_type().unwrap_or_else(|| "?".to_string()),
                fingerprint: entry.fingerprint().unwrap_or_else(|| "-".to_string()),
                key_id: certificate
                    .as_ref()
                    .map(|c| c.key_id.clone())
                    .unwrap_or_else(|| "-".to_string()),
                expires: match &certificate {
                    Some(c) => c
                        .expires_in()
                        .map(format_hm)
                        .unwrap_or_else(|| "expired".to_string()),
                    None => "-".to_string(),
                },
                comment: truncate(&entry.comment, 48),
            }
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format the status of one identity
pub fn format_status(
    name: &str,
    age: IdentityAge,
    status: &IdentityStatus,
    certificate: Option<&CertificateInfo>,
) -> String {
    let mut lines = vec![
        format!("Identity:    {}", name),
        format!("Status:      {}", status.summary()),
        format!("             {}", status.description()),
        format!("Age:         {}", age),
    ];

    if let Some(cert) = certificate {
        lines.push(format!("Key ID:      {}", cert.key_id));
        if !cert.principals.is_empty() {
            lines.push(format!("Principals:  {}", cert.principals.join(", ")));
        }
        lines.push(format!("Fingerprint: {}", cert.fingerprint));
        lines.push(format!(
            "Expires in:  {}",
            cert.expires_in()
                .map(format_hm)
                .unwrap_or_else(|| "expired".to_string())
        ));
    }

    lines.join("\n")
}

/// Truncate a string to max length, appending "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Join an error and its causes, skipping any cause the message so far
/// already spells out
pub fn error_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    for cause in error.chain().skip(1) {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
    }
    message
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow
///
/// Outputs to stderr.
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
