//! Output formatting for coverage reports, waterfalls, and histories

use eyre::Result;
use facet::Facet;
use owo_colors::OwoColorize;
use specmap_api::{
    ApiComponentData, ApiCoverageData, ApiHistory, ApiSection, ApiSectionItem, ApiWaterfall,
};

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            "markdown" | "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

fn to_json<T: Facet<'static>>(value: &T) -> Result<String> {
    facet_json::to_string_pretty(value)
        .map_err(|e| eyre::eyre!("JSON serialization failed: {e}"))
}

fn color_percent(percent: f64) -> String {
    let percent_str = format!("{:.1}%", percent);
    if percent >= 80.0 {
        percent_str.green().to_string()
    } else if percent >= 50.0 {
        percent_str.yellow().to_string()
    } else {
        percent_str.red().to_string()
    }
}

/// Single-line preview of a section's text
fn excerpt(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn section_items(section: &ApiSection) -> impl Iterator<Item = &ApiSectionItem> {
    let items = &section.work_items;
    items
        .requirements
        .iter()
        .chain(&items.test_specs)
        .chain(&items.test_cases)
        .chain(&items.justifications)
        .chain(&items.documents)
}

fn item_label(item: &ApiSectionItem) -> String {
    match &item.title {
        Some(title) => format!("{}#{} {}", item.kind, item.work_item_id, title),
        None => format!("{}#{}", item.kind, item.work_item_id),
    }
}

// ============================================================================
// Coverage
// ============================================================================

/// Render the coverage of every component in the specified format
pub fn render_coverage(
    data: &ApiCoverageData,
    format: OutputFormat,
    verbose: bool,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(data
            .components
            .iter()
            .map(|c| render_component_text(c, verbose))
            .collect()),
        OutputFormat::Json => to_json(data),
        OutputFormat::Markdown => Ok(data
            .components
            .iter()
            .map(|c| render_component_markdown(c, verbose))
            .collect()),
    }
}

fn render_component_text(component: &ApiComponentData, verbose: bool) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!(
        "{} {} Coverage Report\n",
        "##".bold(),
        component.name.cyan().bold()
    ));
    output.push('\n');

    let mapped = component
        .sections
        .iter()
        .filter(|s| !s.work_items.is_empty())
        .count();
    output.push_str(&format!(
        "Coverage: {} ({}/{} sections mapped, threshold {:.1}%)\n",
        color_percent(component.coverage),
        mapped,
        component.sections.len(),
        component.threshold
    ));
    output.push('\n');

    if !component.findings.is_empty() {
        output.push_str(&format!(
            "{} Findings ({}):\n",
            "!".yellow().bold(),
            component.findings.len()
        ));
        for finding in &component.findings {
            output.push_str(&format!(
                "  {} {} {}\n",
                "-".yellow(),
                finding.code.dimmed(),
                finding.message
            ));
        }
        output.push('\n');
    }

    if !component.unmapped.is_empty() {
        output.push_str(&format!(
            "{} Unmatched Mappings ({}):\n",
            "?".yellow().bold(),
            component.unmapped.len()
        ));
        for item in &component.unmapped {
            output.push_str(&format!(
                "  {} mapping {} {} @{}+{}\n",
                "-".yellow(),
                item.mapping_id,
                item_label(item).dimmed(),
                item.offset,
                item.length
            ));
        }
        output.push('\n');
    }

    for section in &component.sections {
        if section.work_items.is_empty() && !verbose {
            continue;
        }
        let marker = if section.work_items.is_empty() {
            "○".dimmed().to_string()
        } else if section.covered >= 100.0 {
            "✓".green().to_string()
        } else {
            "◐".yellow().to_string()
        };
        output.push_str(&format!(
            "{} [{}..{}] {} {}\n",
            marker,
            section.offset,
            section.offset + section.length,
            color_percent(section.covered),
            excerpt(&section.text, 60).dimmed()
        ));
        for item in section_items(section) {
            output.push_str(&format!(
                "      {} {} ({}% declared, {:.1}% effective)\n",
                "+".green(),
                item_label(item),
                item.declared,
                item.coverage
            ));
        }
    }
    output.push('\n');

    output
}

fn render_component_markdown(component: &ApiComponentData, verbose: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {} Coverage Report\n\n", component.name));
    output.push_str(&format!(
        "**Coverage:** {:.1}% (threshold {:.1}%, {})\n\n",
        component.coverage,
        component.threshold,
        if component.passing { "passing" } else { "failing" }
    ));

    if !component.findings.is_empty() {
        output.push_str(&format!("## Findings ({})\n\n", component.findings.len()));
        for finding in &component.findings {
            output.push_str(&format!("- `{}` {}\n", finding.code, finding.message));
        }
        output.push('\n');
    }

    if !component.unmapped.is_empty() {
        output.push_str(&format!(
            "## Unmatched Mappings ({})\n\n",
            component.unmapped.len()
        ));
        for item in &component.unmapped {
            output.push_str(&format!("- mapping {} {}\n", item.mapping_id, item_label(item)));
        }
        output.push('\n');
    }

    output.push_str("## Sections\n\n");
    output.push_str("| Range | Covered | Work items |\n");
    output.push_str("|-------|---------|------------|\n");
    for section in &component.sections {
        if section.work_items.is_empty() && !verbose {
            continue;
        }
        let items: Vec<String> = section_items(section).map(item_label).collect();
        output.push_str(&format!(
            "| {}..{} | {:.1}% | {} |\n",
            section.offset,
            section.offset + section.length,
            section.covered,
            if items.is_empty() {
                "-".to_string()
            } else {
                items.join(", ")
            }
        ));
    }
    output.push('\n');

    output
}

// ============================================================================
// Waterfall
// ============================================================================

pub fn render_waterfall(data: &ApiWaterfall, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(data);
    }

    let mut output = String::new();
    let markdown = format == OutputFormat::Markdown;
    if markdown {
        output.push_str(&format!(
            "# Mapping {} waterfall coverage: {:.1}%\n\n",
            data.mapping_id, data.coverage
        ));
    } else {
        output.push_str(&format!(
            "Mapping {} waterfall coverage: {}\n\n",
            data.mapping_id,
            color_percent(data.coverage)
        ));
    }

    for node in &data.nodes {
        let label = match &node.title {
            Some(title) => format!("{}#{} {}", node.kind, node.work_item_id, title),
            None => format!("{}#{}", node.kind, node.work_item_id),
        };
        let cycle = if node.cycle { " (cycle)" } else { "" };
        if markdown {
            output.push_str(&format!(
                "{}- mapping {} {}: {:.1}% declared, {:.1}% effective{}\n",
                "  ".repeat(node.depth),
                node.mapping_id,
                label,
                node.declared,
                node.effective,
                cycle
            ));
        } else {
            output.push_str(&format!(
                "{}{} mapping {} {}: {:.1}% declared, {} effective{}\n",
                "  ".repeat(node.depth),
                "→".dimmed(),
                node.mapping_id,
                label,
                node.declared,
                color_percent(node.effective),
                cycle.red()
            ));
        }
    }

    for finding in &data.findings {
        output.push_str(&format!("\n{} {}", "!".yellow().bold(), finding.message));
    }
    if !data.findings.is_empty() {
        output.push('\n');
    }

    Ok(output)
}

// ============================================================================
// History
// ============================================================================

pub fn render_history(data: &ApiHistory, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(data);
    }

    let mut output = String::new();
    let markdown = format == OutputFormat::Markdown;
    if markdown {
        output.push_str(&format!("# Mapping {} history\n\n", data.mapping_id));
    } else {
        output.push_str(&format!(
            "{} Mapping {} history ({} records)\n\n",
            "##".bold(),
            data.mapping_id,
            data.records.len()
        ));
    }

    for record in &data.records {
        if markdown {
            output.push_str(&format!(
                "## {} (at {})\n\n",
                record.version, record.created_at
            ));
        } else {
            output.push_str(&format!(
                "{} {}\n",
                record.version.cyan().bold(),
                format!("at {}", record.created_at).dimmed()
            ));
        }
        for (scope, changes) in [("object", &record.object), ("mapping", &record.mapping)] {
            for change in changes {
                let editor = change
                    .editor
                    .as_deref()
                    .map(|e| format!(" by {e}"))
                    .unwrap_or_default();
                if markdown {
                    output.push_str(&format!(
                        "- {}.{} = `{}`{}\n",
                        scope, change.field, change.value, editor
                    ));
                } else {
                    output.push_str(&format!(
                        "  {}.{} = {}{}\n",
                        scope.dimmed(),
                        change.field,
                        change.value.green(),
                        editor.dimmed()
                    ));
                }
            }
        }
        output.push('\n');
    }

    for finding in &data.findings {
        output.push_str(&format!("{} {}\n", "!".yellow().bold(), finding.message));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use specmap_api::{ApiCoverageNode, ApiFieldChange, ApiHistoryRecord, ApiWorkItems};

    fn item() -> ApiSectionItem {
        ApiSectionItem {
            mapping_id: 10,
            kind: "requirement".to_string(),
            work_item_id: 100,
            title: Some("Open handles".to_string()),
            declared: 100,
            coverage: 60.0,
            offset: 0,
            length: 3,
        }
    }

    fn component() -> ApiComponentData {
        ApiComponentData {
            id: 1,
            name: "libfoo".to_string(),
            coverage: 20.0,
            threshold: 0.0,
            passing: true,
            sections: vec![
                ApiSection {
                    text: "AAA".to_string(),
                    offset: 0,
                    length: 3,
                    covered: 60.0,
                    gap: 40.0,
                    work_items: ApiWorkItems {
                        requirements: vec![item()],
                        ..Default::default()
                    },
                },
                ApiSection {
                    text: "BBBBBB".to_string(),
                    offset: 3,
                    length: 6,
                    covered: 0.0,
                    gap: 100.0,
                    work_items: ApiWorkItems::default(),
                },
            ],
            unmapped: Vec::new(),
            findings: Vec::new(),
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::from_str("html"), None);
    }

    #[test]
    fn test_markdown_hides_gaps_unless_verbose() {
        let data = ApiCoverageData {
            components: vec![component()],
        };
        let terse = render_coverage(&data, OutputFormat::Markdown, false).unwrap();
        assert!(terse.contains("# libfoo Coverage Report"));
        assert!(terse.contains("| 0..3 | 60.0% | requirement#100 Open handles |"));
        assert!(!terse.contains("| 3..9 |"));

        let verbose = render_coverage(&data, OutputFormat::Markdown, true).unwrap();
        assert!(verbose.contains("| 3..9 | 0.0% | - |"));
    }

    #[test]
    fn test_text_lists_section_items() {
        let data = ApiCoverageData {
            components: vec![component()],
        };
        let text = render_coverage(&data, OutputFormat::Text, false).unwrap();
        assert!(text.contains("libfoo"));
        assert!(text.contains("requirement#100 Open handles"));
    }

    #[test]
    fn test_waterfall_markdown_indents_by_depth() {
        let node = |mapping_id, depth| ApiCoverageNode {
            mapping_id,
            kind: "requirement".to_string(),
            work_item_id: mapping_id,
            title: None,
            depth,
            declared: 50.0,
            effective: 50.0,
            cycle: false,
        };
        let data = ApiWaterfall {
            mapping_id: 1,
            coverage: 50.0,
            nodes: vec![node(1, 0), node(2, 1)],
            findings: Vec::new(),
        };
        let out = render_waterfall(&data, OutputFormat::Markdown).unwrap();
        assert!(out.contains("- mapping 1 requirement#1: 50.0% declared"));
        assert!(out.contains("\n  - mapping 2 requirement#2"));
    }

    #[test]
    fn test_history_markdown_lists_changes() {
        let data = ApiHistory {
            mapping_id: 10,
            records: vec![ApiHistoryRecord {
                version: "2.1".to_string(),
                created_at: 3000,
                object: vec![ApiFieldChange {
                    field: "title".to_string(),
                    value: "Open handles".to_string(),
                    editor: Some("bob".to_string()),
                }],
                mapping: Vec::new(),
            }],
            findings: Vec::new(),
        };
        let out = render_history(&data, OutputFormat::Markdown).unwrap();
        assert!(out.contains("## 2.1 (at 3000)"));
        assert!(out.contains("- object.title = `Open handles` by bob"));
    }

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n  b", 10), "a b");
        assert_eq!(excerpt("abcdefghij", 5), "abcd…");
    }
}
