use agro_report::table::render_table;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn render_table_right_aligns_numeric_columns() {
    let headers = strings(&["group_key", "n", "mean"]);
    let rows = vec![
        strings(&["Soja", "12", "3.25"]),
        strings(&["Feijão", "3", "1.5"]),
    ];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(
        lines,
        vec![
            "group_key   n  mean",
            "---------  --  ----",
            "Soja       12  3.25",
            "Feijão      3   1.5",
        ]
    );
}

#[test]
fn blank_cells_do_not_break_numeric_alignment() {
    let headers = strings(&["n", "std_dev"]);
    let rows = vec![strings(&["1", ""]), strings(&["10", "0.5"])];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[2], " 1");
    assert_eq!(lines[3], "10      0.5");
}

#[test]
fn render_table_normalizes_control_characters() {
    let headers = strings(&["message"]);
    let rows = vec![strings(&["line1\nline2\tvalue"])];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "line1 line2 value");
}

#[test]
fn render_table_ignores_ansi_sequences_in_widths() {
    let headers = strings(&["check", "status"]);
    let rows = vec![strings(&["café", "\u{1b}[31mERR\u{1b}[0m"])];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "check  status");
    assert_eq!(lines[2], "café   \u{1b}[31mERR\u{1b}[0m");
}
