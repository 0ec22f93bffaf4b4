//! Tabular projection of the group list

use crate::models::Group;

/// Column headers, in display order
pub const HEADERS: [&str; 5] = [
    "Group Name",
    "Group Mail",
    "Group Type",
    "Mail Enabled",
    "Members",
];

/// Shown for a missing name or mail
pub const PLACEHOLDER: &str = "N/A";

/// Type label for untagged groups
pub const UNTAGGED_TYPE_LABEL: &str = "Security/Distribution";

/// One rendered row of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub name: String,
    pub mail: String,
    pub type_label: String,
    pub mail_enabled: String,
    pub member_count: usize,
}

impl ReportRow {
    pub fn from_group(group: &Group) -> Self {
        let type_label = if group.is_unified() {
            "Unified".to_string()
        } else if group.group_types.is_empty() {
            UNTAGGED_TYPE_LABEL.to_string()
        } else {
            group.group_types.join(", ")
        };

        Self {
            name: non_empty_or_placeholder(group.display_name.as_deref()),
            mail: non_empty_or_placeholder(group.mail.as_deref()),
            type_label,
            mail_enabled: if group.mail_enabled { "Yes" } else { "No" }.to_string(),
            member_count: group.member_count,
        }
    }

    /// Cell texts in [`HEADERS`] order
    pub fn cells(&self) -> [String; 5] {
        [
            self.name.clone(),
            self.mail.clone(),
            self.type_label.clone(),
            self.mail_enabled.clone(),
            self.member_count.to_string(),
        ]
    }
}

fn non_empty_or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Headers plus rows; the single source for display and export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Column-aligned plain text for the terminal
    pub fn render_text(&self) -> String {
        let cells: Vec<[String; 5]> = self.rows.iter().map(ReportRow::cells).collect();

        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        out.push_str(&format_line(self.headers.iter(), &widths));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        out.push('\n');
        for row in &cells {
            out.push_str(&format_line(row.iter(), &widths));
            out.push('\n');
        }
        out.push_str(&format!("{} group(s)\n", self.rows.len()));
        out
    }
}

fn format_line<'a>(values: impl Iterator<Item = &'a String>, widths: &[usize]) -> String {
    values
        .zip(widths.iter())
        .map(|(value, width)| format!("{:<width$}", value, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Project groups into report rows, keeping source order
pub fn populate_table(groups: &[Group]) -> ReportTable {
    ReportTable {
        headers: HEADERS.iter().map(|h| h.to_string()).collect(),
        rows: groups.iter().map(ReportRow::from_group).collect(),
    }
}
