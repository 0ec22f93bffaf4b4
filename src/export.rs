//! CSV download and HTML mail report
//!
//! Both read the same [`ReportTable`] that is shown on screen.

use std::path::Path;
use tracing::info;

use crate::error::{ReportError, Result};
use crate::graph::GraphClient;
use crate::models::{EmailAddress, ItemBody, MailMessage, Recipient, SendMailRequest};
use crate::table::ReportTable;

/// Serialize the table as CSV text
///
/// Cells are comma-joined as-is: values containing commas or quotes are not
/// escaped.
pub fn to_csv(table: &ReportTable) -> Result<String> {
    if table.is_empty() {
        return Err(ReportError::ValidationError("No data to download.".to_string()));
    }

    let mut lines = Vec::with_capacity(table.len() + 1);
    lines.push(table.headers.join(","));
    for row in &table.rows {
        lines.push(row.cells().join(","));
    }
    Ok(lines.join("\n"))
}

/// Write the table to `path` as CSV; no file is created for an empty table
pub async fn download_report_as_csv(table: &ReportTable, path: &Path) -> Result<()> {
    let content = to_csv(table)?;
    tokio::fs::write(path, content).await?;
    info!("Wrote {} rows to {:?}", table.len(), path);
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// HTML `<table>` body for the report mail
pub fn build_html_table(table: &ReportTable) -> String {
    let header: String = table
        .headers
        .iter()
        .map(|h| format!("<th>{}</th>", escape_html(h)))
        .collect();

    let rows: String = table
        .rows
        .iter()
        .map(|row| {
            let cells: String = row
                .cells()
                .iter()
                .map(|cell| format!("<td>{}</td>", escape_html(cell)))
                .collect();
            format!("<tr>{}</tr>", cells)
        })
        .collect();

    format!(
        "<table border=\"1\"><thead><tr>{}</tr></thead><tbody>{}</tbody></table>",
        header, rows
    )
}

/// `sendMail` payload addressed to a single recipient
pub fn build_mail_request(table: &ReportTable, address: &str, subject: &str) -> SendMailRequest {
    SendMailRequest {
        message: MailMessage {
            subject: subject.to_string(),
            body: ItemBody {
                content_type: "HTML".to_string(),
                content: build_html_table(table),
            },
            to_recipients: vec![Recipient {
                email_address: EmailAddress {
                    address: address.to_string(),
                },
            }],
        },
    }
}

/// Mail the table to `address` through Graph
///
/// An empty address fails before any network call.
pub async fn send_report_as_mail(
    client: &dyn GraphClient,
    table: &ReportTable,
    address: &str,
    subject: &str,
) -> Result<()> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ReportError::ValidationError(
            "Please provide an admin email.".to_string(),
        ));
    }

    let request = build_mail_request(table, address, subject);
    client.send_mail(&request).await?;
    info!("Report with {} rows sent to {}", table.len(), address);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DirectoryObject, Group};
    use crate::table::populate_table;
    use async_trait::async_trait;
    use tempfile::TempDir;

    mockall::mock! {
        pub TestGraphClient {}

        #[async_trait]
        impl GraphClient for TestGraphClient {
            async fn list_groups(&self) -> Result<Vec<Group>>;
            async fn list_group_members(&self, group_id: &str) -> Result<Vec<DirectoryObject>>;
            async fn send_mail(&self, request: &SendMailRequest) -> Result<()>;
        }
    }

    fn sample_table() -> ReportTable {
        populate_table(&[
            Group {
                id: Some("1".to_string()),
                display_name: Some("Sales".to_string()),
                mail: Some("sales@x.com".to_string()),
                mail_enabled: true,
                member_count: 4,
                ..Default::default()
            },
            Group {
                id: Some("2".to_string()),
                display_name: Some("R&D <core>".to_string()),
                group_types: vec!["Unified".to_string()],
                member_count: 0,
                ..Default::default()
            },
        ])
    }

    #[test]
    fn test_to_csv() {
        let csv = to_csv(&sample_table()).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines[0], "Group Name,Group Mail,Group Type,Mail Enabled,Members");
        assert_eq!(lines[1], "Sales,sales@x.com,Security/Distribution,Yes,4");
        assert_eq!(lines[2], "R&D <core>,N/A,Unified,No,0");
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn test_to_csv_does_not_escape_delimiters() {
        let table = populate_table(&[Group {
            display_name: Some("Sales, EMEA".to_string()),
            ..Default::default()
        }]);
        let csv = to_csv(&table).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("Sales, EMEA,N/A,"));
    }

    #[test]
    fn test_to_csv_empty_table() {
        let result = to_csv(&populate_table(&[]));
        assert!(matches!(result, Err(ReportError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_download_empty_table_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Tenant_Groups_Report.csv");

        let result = download_report_as_csv(&populate_table(&[]), &path).await;
        assert!(matches!(result, Err(ReportError::ValidationError(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Tenant_Groups_Report.csv");

        download_report_as_csv(&sample_table(), &path).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, to_csv(&sample_table()).unwrap());
    }

    #[test]
    fn test_build_html_table() {
        let html = build_html_table(&sample_table());
        assert!(html.starts_with("<table border=\"1\"><thead><tr><th>Group Name</th>"));
        assert!(html.contains(
            "<tr><td>Sales</td><td>sales@x.com</td><td>Security/Distribution</td><td>Yes</td><td>4</td></tr>"
        ));
        assert!(html.contains("<td>R&amp;D &lt;core&gt;</td>"));
        assert!(html.ends_with("</tbody></table>"));
    }

    #[test]
    fn test_build_mail_request() {
        let request = build_mail_request(&sample_table(), "admin@x.com", "Tenant Groups Report");
        assert_eq!(request.message.subject, "Tenant Groups Report");
        assert_eq!(request.message.body.content_type, "HTML");
        assert_eq!(request.message.to_recipients.len(), 1);
        assert_eq!(request.message.to_recipients[0].email_address.address, "admin@x.com");
    }

    #[tokio::test]
    async fn test_send_report_empty_address_skips_network() {
        let mut client = MockTestGraphClient::new();
        client.expect_send_mail().never();

        for address in ["", "   "] {
            let result = send_report_as_mail(&client, &sample_table(), address, "Report").await;
            assert!(matches!(result, Err(ReportError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_send_report_posts_mail() {
        let mut client = MockTestGraphClient::new();
        client
            .expect_send_mail()
            .withf(|request| {
                request.message.to_recipients[0].email_address.address == "admin@x.com"
                    && request.message.body.content.contains("<td>Sales</td>")
            })
            .times(1)
            .returning(|_| Ok(()));

        send_report_as_mail(&client, &sample_table(), " admin@x.com ", "Tenant Groups Report")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_report_failure_is_surfaced() {
        let mut client = MockTestGraphClient::new();
        client.expect_send_mail().times(1).returning(|_| {
            Err(ReportError::ApiError {
                status: 403,
                status_text: "Forbidden".to_string(),
                body: String::new(),
            })
        });

        let result = send_report_as_mail(&client, &sample_table(), "admin@x.com", "Report").await;
        assert_eq!(result.unwrap_err().status(), Some(403));
    }
}
