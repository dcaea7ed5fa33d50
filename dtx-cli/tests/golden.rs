//! End-to-end scenarios from spec.md §8, driven through the same facade
//! the `dtx` binary calls, against synthetic archives built in-test with
//! the `zip` crate (mirroring the fixture helper in dtx-archive's own
//! unit tests).

use std::io::{Cursor, Write};

use dtx_cli::config::Config;
use dtx_cli::facade;
use dtx_template::{Record, Value};

fn build_docx(main_xml: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let cursor = Cursor::new(&mut buf);
        let mut writer = zip::ZipWriter::new(cursor);
        let options: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default();

        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(b"<Types/>").unwrap();

        writer.start_file("_rels/.rels", options).unwrap();
        writer.write_all(b"<Relationships/>").unwrap();

        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(main_xml.as_bytes()).unwrap();

        writer.finish().unwrap();
    }
    while buf.len() < 1000 {
        buf.push(0);
    }
    buf
}

fn record_of(pairs: Vec<(&str, Value)>) -> Record {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn run_xml(xml: &str) -> String {
    let input = build_docx(xml);
    let config = Config::default();
    let data = Record::new();
    let result = facade::render(&input, data, &config).unwrap();
    String::from_utf8(result.bytes).unwrap()
}

fn render_with(xml: &str, data: Record) -> facade::RenderSuccess {
    let input = build_docx(xml);
    let config = Config::default();
    facade::render(&input, data, &config).unwrap()
}

fn extract_main(bytes: &[u8]) -> String {
    let reader = Cursor::new(bytes);
    let mut zip = zip::ZipArchive::new(reader).unwrap();
    let mut entry = zip.by_name("word/document.xml").unwrap();
    let mut out = String::new();
    std::io::Read::read_to_string(&mut entry, &mut out).unwrap();
    out
}

#[test]
fn scenario_1_simple_loop() {
    let xml = "<w:document><w:body>Users:\n${#each users}- ${this.name}: ${this.score} points\n${/each}</w:body></w:document>";
    let users = Value::List(vec![
        Value::Record(record_of(vec![("name", Value::Str("Alice".into())), ("score", Value::Number(95.0))])),
        Value::Record(record_of(vec![("name", Value::Str("Bob".into())), ("score", Value::Number(87.0))])),
    ]);
    let data = record_of(vec![("users", users)]);
    let result = render_with(xml, data);
    let out = extract_main(&result.bytes);
    let alice_at = out.find("- Alice: 95 points").expect("alice line present");
    let bob_at = out.find("- Bob: 87 points").expect("bob line present");
    assert!(alice_at < bob_at, "alice must come before bob");
}

#[test]
fn scenario_2_conditional_inside_loop() {
    let xml = "<w:document><w:body>${#each team}${#if this.achievement >= 1.0}${this.status|upper}${#else}${this.status}${/if}\n${/each}</w:body></w:document>";
    let team = Value::List(vec![
        Value::Record(record_of(vec![
            ("name", Value::Str("S".into())),
            ("achievement", Value::Number(1.15)),
            ("status", Value::Str("ahead".into())),
        ])),
        Value::Record(record_of(vec![
            ("name", Value::Str("M".into())),
            ("achievement", Value::Number(0.86)),
            ("status", Value::Str("behind".into())),
        ])),
    ]);
    let data = record_of(vec![("team", team)]);
    let result = render_with(xml, data);
    let out = extract_main(&result.bytes);
    let ahead_at = out.find("AHEAD").expect("AHEAD present");
    let behind_at = out.find("behind").expect("behind present");
    assert!(ahead_at < behind_at);
    assert!(!out.contains("ahead\n"), "lowercase branch must not leak through");
}

#[test]
fn scenario_3_formatter_pipeline() {
    let xml = "<w:document><w:body>${total|currency:USD} and ${ratio|percent}</w:body></w:document>";
    let data = record_of(vec![
        ("total", Value::Number(1234.5)),
        ("ratio", Value::Number(0.0725)),
    ]);
    let result = render_with(xml, data);
    let out = extract_main(&result.bytes);
    assert!(out.contains("$1,234.50"), "got: {out}");
    assert!(out.contains("7.25%"), "got: {out}");
}

#[test]
fn scenario_4_split_directive_recovery() {
    // Mirrors an authoring tool splitting "${user.name}" across two runs.
    let xml = concat!(
        "<w:document><w:body><w:p>",
        "<w:r><w:t>${use</w:t></w:r><w:r><w:t>r.name}</w:t></w:r>",
        "</w:p></w:body></w:document>"
    );
    let data = record_of(vec![(
        "user",
        Value::Record(record_of(vec![("name", Value::Str("Grace".into()))])),
    )]);
    let result = render_with(xml, data);
    let out = extract_main(&result.bytes);
    assert!(out.contains("Grace"), "got: {out}");
}

#[test]
fn scenario_5_empty_control_row_removal() {
    let xml = concat!(
        "<w:document><w:body><w:tbl>",
        "<w:tr><w:tc><w:p><w:r><w:t>${#each items}</w:t></w:r></w:p></w:tc></w:tr>",
        "<w:tr><w:tc><w:p><w:r><w:t>${this}</w:t></w:r></w:p></w:tc></w:tr>",
        "<w:tr><w:tc><w:p><w:r><w:t>${/each}</w:t></w:r></w:p></w:tc></w:tr>",
        "</w:tbl></w:body></w:document>"
    );
    let data = record_of(vec![(
        "items",
        Value::List(vec![Value::Str("a".into()), Value::Str("b".into())]),
    )]);
    let result = render_with(xml, data);
    let out = extract_main(&result.bytes);
    assert_eq!(out.matches("<w:tr>").count(), 2, "got: {out}");
    assert!(out.contains("a"));
    assert!(out.contains("b"));
}

#[test]
fn scenario_6_safe_expression_rejection() {
    let xml = "<w:document><w:body>${ ({}).toString() }</w:body></w:document>";
    let out = run_xml(xml);
    assert!(out.contains("[ERROR:"), "got: {out}");
    assert!(!out.contains("toString()"), "original expression text is not re-executed verbatim as a method call");
}

#[test]
fn validator_agrees_with_executor_on_directive_count() {
    let xml = "<w:document><w:body>${#each users}${this.name}${/each} ${total|currency}</w:body></w:document>";
    let input = build_docx(xml);
    let report = facade::validate(&input).unwrap();
    assert_eq!(report.statistics.vars, 2);
    assert_eq!(report.statistics.loops, 1);
    // Every Interp/If/Each node the validator enumerates is one the
    // executor actually visits: one `#each` plus the two interpolations
    // it and the trailing `${total|currency}` contain.
    assert_eq!(report.directives.len(), 3);
}

#[test]
fn empty_data_template_with_no_directives_is_identity() {
    let xml = "<w:document><w:body><w:p>Hello, static world.</w:p></w:body></w:document>";
    let out = run_xml(xml);
    assert_eq!(out, xml);
}
