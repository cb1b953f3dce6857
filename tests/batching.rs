//! Integration tests for task and target batching

mod common;

use common::{create_test_project, load, recording_session};
use rbuild::events::BuildEvent;

const CULTURE_ITEMS: &str = r#"
  - item_group:
      items:
        - type: Compile
          include: a.cs
          metadata:
            Culture: en
        - type: Compile
          include: b.cs
          metadata:
            Culture: fr
        - type: Compile
          include: c.cs
          metadata:
            Culture: en
"#;

fn project_with(target: &str) -> String {
    format!("elements:{}{}", CULTURE_ITEMS, target)
}

#[test]
fn test_task_runs_once_per_bucket() {
    let (_dir, path) = create_test_project(&project_with(
        r#"
  - target:
      name: Build
      tasks:
        - name: Message
          parameters:
            Text: "%(Culture): @(Compile)"
"#,
    ));

    let mut project = load(&path);
    let (mut session, sink) = recording_session();
    let summary = session.build(&mut project, &[]);

    assert!(summary.succeeded);
    assert_eq!(sink.messages(), ["en: a.cs;c.cs", "fr: b.cs"]);
}

#[test]
fn test_unbatched_list_is_visible_in_every_bucket() {
    let (_dir, path) = create_test_project(&project_with(
        r#"
  - item_group:
      items:
        - type: Reference
          include: "core.dll;util.dll"
  - target:
      name: Build
      tasks:
        - name: Message
          parameters:
            Text: "%(Compile.Culture) @(Reference)"
"#,
    ));

    let mut project = load(&path);
    let (mut session, sink) = recording_session();
    assert!(session.build(&mut project, &[]).succeeded);
    assert_eq!(
        sink.messages(),
        ["en core.dll;util.dll", "fr core.dll;util.dll"]
    );
}

#[test]
fn test_target_batches_on_outputs() {
    let (_dir, path) = create_test_project(&project_with(
        r#"
  - target:
      name: Build
      inputs: "@(Compile)"
      outputs: "%(Compile.Culture).out"
      tasks:
        - name: Message
          parameters:
            Text: "@(Compile)"
"#,
    ));

    let mut project = load(&path);
    let (mut session, sink) = recording_session();
    let summary = session.build(&mut project, &[]);

    assert!(summary.succeeded);
    assert_eq!(sink.messages(), ["a.cs;c.cs", "b.cs"]);
    let outputs: Vec<String> = summary
        .result("Build")
        .unwrap()
        .outputs
        .iter()
        .map(|item| item.item_spec())
        .collect();
    assert_eq!(outputs, ["en.out", "fr.out"]);
}

#[test]
fn test_body_runs_once_without_metadata_references() {
    let (_dir, path) = create_test_project(&project_with(
        r#"
  - target:
      name: Build
      inputs: "@(Compile)"
      tasks:
        - name: Message
          parameters:
            Text: "all @(Compile)"
        - name: Message
          parameters:
            Text: "done"
"#,
    ));

    let mut project = load(&path);
    let (mut session, sink) = recording_session();
    assert!(session.build(&mut project, &[]).succeeded);
    assert_eq!(sink.messages(), ["all a.cs;b.cs;c.cs", "done"]);
    let started = sink
        .events()
        .iter()
        .filter(|e| matches!(e, BuildEvent::TargetStarted { .. }))
        .count();
    assert_eq!(started, 1);
}

#[test]
fn test_task_condition_filters_buckets() {
    let (_dir, path) = create_test_project(&project_with(
        r#"
  - target:
      name: Build
      tasks:
        - name: Message
          condition: "'%(Culture)' == 'fr'"
          parameters:
            Text: "only @(Compile)"
"#,
    ));

    let mut project = load(&path);
    let (mut session, sink) = recording_session();
    assert!(session.build(&mut project, &[]).succeeded);
    assert_eq!(sink.messages(), ["only b.cs"]);
}

#[test]
fn test_unqualified_metadata_without_items_fails_build() {
    let (_dir, path) = create_test_project(
        r#"
elements:
  - target:
      name: Build
      tasks:
        - name: Message
          parameters:
            Text: "%(Culture)"
"#,
    );

    let mut project = load(&path);
    let (mut session, sink) = recording_session();
    let summary = session.build(&mut project, &[]);

    assert!(!summary.succeeded);
    assert_eq!(session.log.error_count(), 1);
    let error = sink
        .events()
        .into_iter()
        .find_map(|e| match e {
            BuildEvent::Error(diagnostic) => Some(diagnostic),
            _ => None,
        })
        .unwrap();
    assert_eq!(error.code.as_deref(), Some("RB1001"));
    assert!(error.message.contains("%(Item.Culture)"));
}
