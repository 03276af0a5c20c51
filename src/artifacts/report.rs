//! HTML report assembly.

use askama::Template;

use crate::{
    artifacts::ChartOutcome,
    stats::{GLOBAL_HEADERS, GROUP_HEADERS, GroupStats, Precision, SummaryStats},
    validate::Diagnostic,
};

/// Everything the report shows, precomputed by the pipeline.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub title: String,
    pub author: Option<String>,
    pub generated_at: String,
    pub source: String,
    pub fingerprint: String,
    pub records_loaded: usize,
    pub records_kept: usize,
    pub global: Option<SummaryStats>,
    pub groups: Option<Vec<GroupStats>>,
    pub charts: Vec<ChartOutcome>,
    pub diagnostics: Vec<Diagnostic>,
}

struct TableView {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableView {
    fn new(headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| if cell.is_empty() { "NA".to_string() } else { cell })
                        .collect()
                })
                .collect(),
        }
    }
}

struct ChartView {
    title: String,
    src: String,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    title: &'a str,
    author: Option<&'a str>,
    generated_at: &'a str,
    source: &'a str,
    fingerprint: &'a str,
    records_loaded: usize,
    records_kept: usize,
    global: Option<TableView>,
    groups: Option<TableView>,
    charts: Vec<ChartView>,
    failed_charts: Vec<String>,
    diagnostics: Vec<String>,
}

/// Renders the report. Only charts that were written this run are linked;
/// `graphics_prefix` is their directory relative to the report file.
pub fn render(document: &ReportDocument, graphics_prefix: &str) -> askama::Result<String> {
    let charts = document
        .charts
        .iter()
        .filter_map(|outcome| {
            let path = outcome.result.as_ref().ok()?;
            let file_name = path.file_name()?.to_string_lossy();
            Some(ChartView {
                title: outcome.id.title().to_string(),
                src: format!("{graphics_prefix}/{file_name}"),
            })
        })
        .collect();
    let failed_charts = document
        .charts
        .iter()
        .filter_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|reason| format!("{}: {reason}", outcome.id.file_stem()))
        })
        .collect();

    let template = ReportTemplate {
        title: &document.title,
        author: document.author.as_deref(),
        generated_at: &document.generated_at,
        source: &document.source,
        fingerprint: &document.fingerprint,
        records_loaded: document.records_loaded,
        records_kept: document.records_kept,
        global: document
            .global
            .map(|stats| TableView::new(&GLOBAL_HEADERS, vec![stats.global_row(Precision::Rounded)])),
        groups: document.groups.as_ref().map(|groups| {
            TableView::new(
                &GROUP_HEADERS,
                groups.iter().map(|group| group.row(Precision::Rounded)).collect(),
            )
        }),
        charts,
        failed_charts,
        diagnostics: document
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.message.clone())
            .collect(),
    };
    template.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{charts::ChartId, validate::DiagnosticKind};
    use std::path::PathBuf;

    fn document() -> ReportDocument {
        ReportDocument {
            title: "Relatório do Agronegócio".to_string(),
            author: Some("Equipe <Agro>".to_string()),
            generated_at: "18/10/2026 10:00:00".to_string(),
            source: "base_agro.csv".to_string(),
            fingerprint: "abc123".to_string(),
            records_loaded: 5,
            records_kept: 4,
            global: Some(SummaryStats::from_values(&[0.0, 2.0, 5.5, 20.0])),
            groups: Some(vec![GroupStats {
                group_key: Some("Soja".to_string()),
                stats: SummaryStats::from_values(&[3.0]),
            }]),
            charts: vec![
                ChartOutcome {
                    id: ChartId::Histogram,
                    result: Ok(PathBuf::from("relatorios/graficos/hist_densidade.svg")),
                },
                ChartOutcome {
                    id: ChartId::CultureBoxplot,
                    result: Err("disk full".to_string()),
                },
            ],
            diagnostics: vec![Diagnostic {
                kind: DiagnosticKind::MissingValues,
                message: "Produtividade_t_ha: 1 missing value(s)".to_string(),
                count: Some(1),
            }],
        }
    }

    #[test]
    fn report_links_written_charts_and_lists_diagnostics() {
        let html = render(&document(), "graficos").expect("render");
        assert!(html.contains(r#"src="graficos/hist_densidade.svg""#));
        assert!(!html.contains("boxplot_cultura.svg"));
        assert!(html.contains("boxplot_cultura: disk full"));
        assert!(html.contains("Produtividade_t_ha: 1 missing value(s)"));
        assert!(html.contains("<td>6.875</td>"));
        assert!(html.contains("<td>Soja</td>"));
    }

    #[test]
    fn not_computable_cells_render_as_na_and_text_is_escaped() {
        let html = render(&document(), "graficos").expect("render");
        assert!(html.contains("<td>NA</td>"));
        assert!(html.contains("Equipe &lt;Agro&gt;"));
    }

    #[test]
    fn missing_tables_are_omitted() {
        let mut doc = document();
        doc.global = None;
        doc.groups = None;
        let html = render(&doc, "graficos").expect("render");
        assert!(!html.contains("<th>q3</th>"));
        assert!(!html.contains("<th>group_key</th>"));
    }
}
