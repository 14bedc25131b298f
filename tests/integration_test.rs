use ruledoc::config::DocConfig;
use ruledoc::DocGenerator;
use std::fs;
use std::path::Path;

const LOGIC: &str = r#"<rule name="Root Rule"><ruleset correlationField="SrcIP">
    <trigger name="T1" timeout="10" timeUnit="MINUTE" threshold="1" ordered="false"/>
    <rule name="fail_login">
      <activate type="EVENT"/>
      <action type="TRIGGER" trigger="T1"/>
      <match matchType="EVENT" count="1">
        <matchFilter type="EM">
          <singleFilterComponent type="IP">
            <filterData name="operator" value="EQUALS"/>
            <filterData name="value" value="10.0.0.1"/>
          </singleFilterComponent>
        </matchFilter>
      </match>
    </rule></ruleset></rule>"#;

fn rule_element(id: &str, message: &str) -> String {
    format!(
        "<rule><id>{id}</id><normid>408944640</normid>\
         <message>{message}</message>\
         <description>Detects repeated failures.</description>\
         <severity>80</severity><tag>Authentication</tag>\
         <text><![CDATA[{LOGIC}]]></text></rule>"
    )
}

fn export(rules: &[(&str, &str)]) -> String {
    let body: String = rules
        .iter()
        .map(|(id, message)| rule_element(id, message))
        .collect();
    format!("<export><rules>{body}</rules></export>")
}

fn config_for(dir: &Path) -> DocConfig {
    DocConfig {
        image_dir: dir.join("images"),
        ..DocConfig::default()
    }
}

fn run(dir: &Path, xml: &str, config: DocConfig) -> anyhow::Result<String> {
    let input = dir.join("export.xml");
    let output = dir.join("documentation.md");
    fs::write(&input, xml).unwrap();
    DocGenerator::new(config).run(&input, &output)?;
    Ok(fs::read_to_string(output).unwrap())
}

#[test]
fn end_to_end_single_rule() {
    let dir = tempfile::tempdir().unwrap();
    let doc = run(
        dir.path(),
        &export(&[("47-1", "Brute Force")]),
        config_for(dir.path()),
    )
    .unwrap();

    // TOC with exactly one entry.
    assert!(doc.contains("# Correlation Rule Overview"));
    assert_eq!(doc.matches("*   **Brute Force**").count(), 1);
    // No parameters declared, so no Parameters section.
    assert!(!doc.contains("### Parameters"));
    // Exactly one condition-rule sub-heading, title cased.
    assert_eq!(doc.matches("\n#### ").count(), 1);
    assert!(doc.contains("#### Fail Login"));
    // Trigger resolved through the relation graph.
    assert!(doc.contains("**Trigger:** T1"));
    assert!(doc.contains("**Threshold:** 1"));
    assert!(doc.contains("Condition:** 'IP' EQUALS '10.0.0.1'"));
    assert!(doc.contains("\\newpage"));
}

#[test]
fn duplicate_rule_names_fail_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let xml = export(&[("47-1", "Same Name"), ("47-2", "Same Name")]);
    let input = dir.path().join("export.xml");
    let output = dir.path().join("documentation.md");
    fs::write(&input, &xml).unwrap();

    let err = DocGenerator::new(config_for(dir.path()))
        .run(&input, &output)
        .unwrap_err();
    assert!(err.to_string().contains("Same Name"));
    assert!(!output.exists(), "no partial output may be written");
}

#[test]
fn sorting_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let xml = export(&[("47-1", "zeta"), ("47-2", "alpha"), ("47-3", "midway")]);

    let sorted = run(dir.path(), &xml, config_for(dir.path())).unwrap();
    let a = sorted.find("\n# alpha").unwrap();
    let m = sorted.find("\n# midway").unwrap();
    let z = sorted.find("\n# zeta").unwrap();
    assert!(a < m && m < z);

    let unsorted = run(
        dir.path(),
        &xml,
        DocConfig {
            sort_rules: false,
            ..config_for(dir.path())
        },
    )
    .unwrap();
    let z = unsorted.find("\n# zeta").unwrap();
    let a = unsorted.find("\n# alpha").unwrap();
    let m = unsorted.find("\n# midway").unwrap();
    assert!(z < a && a < m, "document order preserved when sort is off");
}

#[test]
fn toc_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let doc = run(
        dir.path(),
        &export(&[("47-1", "Brute Force")]),
        DocConfig {
            toc: false,
            ..config_for(dir.path())
        },
    )
    .unwrap();
    assert!(!doc.contains("Correlation Rule Overview"));
}

#[test]
fn reruns_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let xml = export(&[("47-1", "beta"), ("47-2", "alpha")]);
    let first = run(dir.path(), &xml, config_for(dir.path())).unwrap();
    let second = run(dir.path(), &xml, config_for(dir.path())).unwrap();
    assert_eq!(first, second);
}

#[test]
fn percent_encoded_values_are_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let logic = LOGIC.replace("10.0.0.1", "a%20b");
    let xml = format!(
        "<export><rules><rule><id>47-1</id><normid>1</normid>\
         <message>Encoded</message><description>d</description>\
         <severity>50</severity><text><![CDATA[{logic}]]></text>\
         </rule></rules></export>"
    );
    let doc = run(dir.path(), &xml, config_for(dir.path())).unwrap();
    assert!(doc.contains("'IP' EQUALS 'a b'"), "{doc}");
}

#[test]
fn malformed_embedded_logic_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let xml = "<export><rules><rule><id>47-1</id><normid>1</normid>\
               <message>Broken</message><description>d</description>\
               <severity>50</severity><text><![CDATA[<rule><oops>]]></text>\
               </rule></rules></export>";
    let input = dir.path().join("export.xml");
    let output = dir.path().join("documentation.md");
    fs::write(&input, xml).unwrap();

    let err = DocGenerator::new(config_for(dir.path()))
        .run(&input, &output)
        .unwrap_err();
    assert!(format!("{err:#}").contains("Broken"));
    assert!(!output.exists());
}
