//! Integration tests for project evaluation

mod common;

use common::{create_test_project, load, load_with, specs, write_file};
use rbuild::error::{BuildError, RbuildError, StructuralError};
use rbuild::project::Project;

#[test]
fn test_wildcard_include_with_exclude() {
    let (dir, path) = create_test_project(
        r#"
elements:
  - item_group:
      items:
        - type: Compile
          include: "src/**/*.cs"
          exclude: "src/skip.cs"
"#,
    );
    write_file(dir.path(), "src/a.cs", "");
    write_file(dir.path(), "src/b.cs", "");
    write_file(dir.path(), "src/gen/c.cs", "");
    write_file(dir.path(), "src/skip.cs", "");
    write_file(dir.path(), "src/readme.md", "");

    let project = load(&path);
    assert_eq!(specs(&project, "Compile"), ["src/a.cs", "src/b.cs", "src/gen/c.cs"]);

    let items = project.items("Compile");
    assert_eq!(items[0].recursive_dir(), "");
    assert_eq!(items[2].recursive_dir(), "gen/");
}

#[test]
fn test_global_property_wins_over_project() {
    let (_dir, path) = create_test_project(
        r#"
elements:
  - property_group:
      properties:
        Configuration: Debug
        OutDir: bin/$(Configuration)/
"#,
    );

    let project = load_with(&path, &[("Configuration", "Release")]);
    assert_eq!(project.property("Configuration").as_deref(), Some("Release"));
    assert_eq!(project.property("OutDir").as_deref(), Some("bin/Release/"));

    let project = load(&path);
    assert_eq!(project.property("OutDir").as_deref(), Some("bin/Debug/"));
}

#[test]
fn test_conditional_properties() {
    let (_dir, path) = create_test_project(
        r#"
elements:
  - property_group:
      properties:
        - name: OutDir
          value: out/
          condition: "'$(OutDir)' == ''"
        - name: OutDir
          value: ignored/
          condition: "'$(OutDir)' == ''"
        - name: Upper
          value: "$(OutDir.ToUpper())"
"#,
    );

    let project = load(&path);
    assert_eq!(project.property("OutDir").as_deref(), Some("out/"));
    assert_eq!(project.property("Upper").as_deref(), Some("OUT/"));
}

#[test]
fn test_choose_selects_first_matching_branch() {
    let (_dir, path) = create_test_project(
        r#"
elements:
  - property_group:
      properties:
        Platform: arm
  - choose:
      when:
        - condition: "'$(Platform)' == 'x86'"
          elements:
            - property_group:
                properties:
                  Bits: 32
        - condition: "'$(Platform)' == 'arm'"
          elements:
            - property_group:
                properties:
                  Bits: 64
            - item_group:
                items:
                  - type: Lib
                    include: "libarm.a"
      otherwise:
        - property_group:
            properties:
              Bits: unknown
"#,
    );

    let project = load(&path);
    assert_eq!(project.property("Bits").as_deref(), Some("64"));
    assert_eq!(specs(&project, "Lib"), ["libarm.a"]);
}

#[test]
fn test_item_definitions_supply_defaults() {
    let (_dir, path) = create_test_project(
        r#"
elements:
  - item_definition_group:
      definitions:
        - type: Compile
          metadata:
            Culture: en
            Optimize: "true"
  - item_group:
      items:
        - type: Compile
          include: "a.cs;b.cs"
        - type: Compile
          include: "c.cs"
          metadata:
            Culture: de
"#,
    );

    let project = load(&path);
    let items = project.items("Compile");
    let cultures: Vec<Option<String>> = items.iter().map(|i| i.custom_metadata("Culture")).collect();
    assert_eq!(
        cultures,
        [Some("en".to_string()), Some("en".to_string()), Some("de".to_string())]
    );
    assert_eq!(items[2].custom_metadata("Optimize").as_deref(), Some("true"));
}

#[test]
fn test_update_and_remove_items() {
    let (_dir, path) = create_test_project(
        r#"
elements:
  - item_group:
      items:
        - type: Compile
          include: "a.cs;b.cs;c.cs"
          metadata:
            Flag: off
  - item_group:
      items:
        - type: Compile
          update: "b.cs"
          metadata:
            Flag: "on-%(Filename)"
        - type: Compile
          remove: "c.cs"
"#,
    );

    let project = load(&path);
    assert_eq!(specs(&project, "Compile"), ["a.cs", "b.cs"]);
    let flags: Vec<Option<String>> = project
        .items("Compile")
        .iter()
        .map(|i| i.custom_metadata("Flag"))
        .collect();
    assert_eq!(flags, [Some("off".to_string()), Some("on-b".to_string())]);
}

#[test]
fn test_items_reference_earlier_items() {
    let (_dir, path) = create_test_project(
        r#"
elements:
  - item_group:
      items:
        - type: Source
          include: "one.txt;two.txt"
        - type: All
          include: "@(Source);three.txt"
"#,
    );

    let project = load(&path);
    assert_eq!(specs(&project, "All"), ["one.txt", "two.txt", "three.txt"]);
}

#[test]
fn test_env_file_supplies_environment_properties() {
    let (dir, path) = create_test_project(
        r#"
elements:
  - property_group:
      properties:
        Greeting: "$(RBUILD_TEST_GREETING) there"
"#,
    );
    write_file(dir.path(), ".env", "RBUILD_TEST_GREETING=hello\n");

    let project = load(&path);
    assert_eq!(project.property("Greeting").as_deref(), Some("hello there"));
}

#[test]
fn test_reserved_property_assignment_fails() {
    let (_dir, path) = create_test_project(
        r#"
elements:
  - property_group:
      properties:
        ProjectName: other
"#,
    );

    let result = Project::load(&path, Vec::new());
    assert!(matches!(
        result,
        Err(RbuildError::Build(BuildError::Structural(StructuralError::ReservedProperty(_))))
    ));
}

#[test]
fn test_imported_elements_come_first() {
    let (dir, path) = create_test_project(
        r#"
imports: [shared/common.yml]
elements:
  - property_group:
      properties:
        Full: "$(Base)/app"
"#,
    );
    write_file(
        dir.path(),
        "shared/common.yml",
        r#"
elements:
  - property_group:
      properties:
        Base: /opt
"#,
    );

    let project = load(&path);
    assert_eq!(project.property("Full").as_deref(), Some("/opt/app"));
}
