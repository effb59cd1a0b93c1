use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use spindle_common::{
    ConditionPriority, Conversation, DialogueEntry, FalseConditionAction, Link, VariableDefinition,
    VariableKind,
};
use spindle_compiler::{compile_bundle, CompileOptions, CompileOutput};

fn compile(bundle: Value) -> CompileOutput {
    compile_bundle(&bundle.to_string(), &CompileOptions::default()).expect("bundle should decode")
}

fn unit(file: &str, nodes: Vec<Value>, strings: Value) -> Value {
    json!({ "file": file, "conversations": nodes, "strings": strings })
}

fn node(name: &str, children: Vec<Value>) -> Value {
    json!({ "kind": { "type": "node", "name": name }, "line": 1, "children": children })
}

fn greater_than(variable: &str, value: f64) -> Value {
    json!([
        { "Variable": variable },
        { "Number": value },
        { "Operator": { "kind": "GreaterThan", "arity": 2 } }
    ])
}

fn set_text(variable: &str, value: &str, line: u32) -> Value {
    json!({
        "kind": { "type": "set", "variable": variable },
        "line": line,
        "expression": [{ "Text": value }]
    })
}

fn line(line_id: &str, line: u32) -> Value {
    json!({ "kind": { "type": "line", "line_id": line_id }, "line": line })
}

fn conversation<'a>(output: &'a CompileOutput, title: &str) -> &'a Conversation {
    output
        .database
        .conversation_by_title(title)
        .unwrap_or_else(|| panic!("no conversation '{}'", title))
}

fn titled<'a>(conversation: &'a Conversation, title: &str) -> Vec<&'a DialogueEntry> {
    conversation
        .entries
        .iter()
        .filter(|e| e.title == title)
        .collect()
}

fn only<'a>(conversation: &'a Conversation, title: &str) -> &'a DialogueEntry {
    let found = titled(conversation, title);
    assert_eq!(found.len(), 1, "expected one '{}' entry", title);
    found[0]
}

fn links_between(conversation: &Conversation, from: u32, to: u32) -> Vec<&Link> {
    conversation
        .links()
        .filter(|l| l.origin_entry_id == from && l.destination_entry_id == to && !l.is_connector)
        .collect()
}

fn below_normal(conversation: &Conversation) -> Vec<&Link> {
    conversation
        .links()
        .filter(|l| l.priority == ConditionPriority::BelowNormal)
        .collect()
}

#[test]
fn if_else_with_sets() {
    let if_block = json!({
        "kind": { "type": "if" },
        "line": 2,
        "children": [
            {
                "kind": { "type": "if_clause", "clause": "If" },
                "line": 2,
                "conditions": greater_than("x", 0.0),
                "children": [set_text("y", "a", 3)]
            },
            {
                "kind": { "type": "if_clause", "clause": "Else" },
                "line": 4,
                "children": [set_text("y", "b", 5)]
            }
        ]
    });
    let output = compile(json!({ "units": [unit("a.yarn", vec![node("Start", vec![if_block])], json!({}))] }));
    assert!(!output.diagnostics.has_errors());

    let conv = conversation(&output, "Start");
    let start = only(conv, "If Block Start");
    let end = only(conv, "If Block End");
    let if_start = only(conv, "If Clause Start");
    let if_end = only(conv, "If Clause End");
    let else_start = only(conv, "Else Clause Start");
    let else_end = only(conv, "Else Clause End");
    let fallback = only(conv, "If Clause Fallback");

    assert!(start.is_group);
    assert_eq!(links_between(conv, 0, start.id).len(), 1);

    assert_eq!(if_start.conditions, "Variable['x'] > 0");
    assert_eq!(if_start.false_condition_action, FalseConditionAction::Block);
    assert_eq!(links_between(conv, start.id, if_start.id)[0].priority, ConditionPriority::Normal);

    let stores = titled(conv, "Store Variable");
    assert_eq!(stores.len(), 2);
    assert_eq!(stores[0].user_script, "Variable['y'] = 'a'");
    assert_eq!(stores[1].user_script, "Variable['y'] = 'b'");
    assert_eq!(links_between(conv, if_start.id, stores[0].id).len(), 1);
    assert_eq!(links_between(conv, stores[0].id, if_end.id).len(), 1);
    assert_eq!(links_between(conv, if_end.id, end.id).len(), 1);

    let fallbacks = below_normal(conv);
    assert_eq!(fallbacks.len(), 1);
    assert_eq!(fallbacks[0].origin_entry_id, start.id);
    assert_eq!(fallbacks[0].destination_entry_id, fallback.id);

    assert!(else_start.conditions.is_empty());
    assert_eq!(links_between(conv, fallback.id, else_start.id).len(), 1);
    assert_eq!(links_between(conv, else_start.id, stores[1].id).len(), 1);
    assert_eq!(links_between(conv, stores[1].id, else_end.id).len(), 1);
    assert_eq!(links_between(conv, else_end.id, end.id).len(), 1);

    assert_eq!(
        output.database.variables,
        vec![VariableDefinition::empty_text("y")]
    );
}

#[test]
fn declare_then_increment_registers_one_number() {
    let declare = json!({
        "kind": { "type": "declare", "variable": "count" },
        "line": 2,
        "expression": [{ "Number": 0 }]
    });
    let increment = json!({
        "kind": { "type": "set", "variable": "count" },
        "line": 9,
        "expression": [
            { "Variable": "count" },
            { "Number": 1 },
            { "Operator": { "kind": "Add", "arity": 2 } }
        ]
    });
    let output = compile(json!({ "units": [
        unit("a.yarn", vec![node("Start", vec![declare]), node("Later", vec![increment])], json!({}))
    ] }));

    assert_eq!(
        output.database.variables,
        vec![VariableDefinition::new("count", VariableKind::Number, json!(0))]
    );
    let store = only(conversation(&output, "Later"), "Store Variable");
    assert_eq!(store.user_script, "Variable['count'] = Variable['count'] + 1");
    assert!(output.diagnostics.diagnostics().is_empty());
}

#[test]
fn statements_after_jump_hang_off_placeholder() {
    let jump = json!({ "kind": { "type": "jump", "node": "Other" }, "line": 2 });
    let strings = json!({ "line:after": { "en": "Never said." } });
    let output = compile(json!({ "units": [
        unit("a.yarn", vec![node("Start", vec![jump, line("line:after", 3)]), node("Other", vec![])], strings)
    ] }));

    let conv = conversation(&output, "Start");
    let other = conversation(&output, "Other");
    let jump = only(conv, "Jump to Conversation");
    let placeholder = only(conv, "Unreachable Entry");
    let after = only(conv, "Line");

    let connectors: Vec<_> = conv.links().filter(|l| l.is_connector).collect();
    assert_eq!(connectors.len(), 1);
    assert_eq!(connectors[0].origin_entry_id, jump.id);
    assert_eq!(connectors[0].destination_conversation_id, other.id);
    assert_eq!(connectors[0].destination_entry_id, 0);

    assert_eq!(placeholder.conditions, "false");
    assert_eq!(placeholder.false_condition_action, FalseConditionAction::Block);
    assert_eq!(
        links_between(conv, jump.id, placeholder.id)[0].priority,
        ConditionPriority::BelowNormal
    );

    assert_eq!(links_between(conv, placeholder.id, after.id).len(), 1);
    assert!(links_between(conv, jump.id, after.id).is_empty());
    assert_eq!(after.dialogue_text["en"], "Never said.");
}

#[test]
fn guarded_clauses_without_else_fall_through_to_end() {
    let clause = |kind: &str, threshold: f64, line: u32| {
        json!({
            "kind": { "type": "if_clause", "clause": kind },
            "line": line,
            "conditions": greater_than("x", threshold),
            "children": [set_text("tier", kind, line + 1)]
        })
    };
    let if_block = json!({
        "kind": { "type": "if" },
        "line": 2,
        "children": [clause("If", 10.0, 2), clause("ElseIf", 5.0, 4), clause("ElseIf", 1.0, 6)]
    });
    let output = compile(json!({ "units": [unit("a.yarn", vec![node("Start", vec![if_block])], json!({}))] }));

    let conv = conversation(&output, "Start");
    assert_eq!(below_normal(conv).len(), 3);

    let end = only(conv, "If Block End");
    let fallbacks: Vec<_> = titled(conv, "If Clause Fallback")
        .into_iter()
        .chain(titled(conv, "ElseIf Clause Fallback"))
        .collect();
    assert_eq!(fallbacks.len(), 3);
    let last = fallbacks.iter().max_by_key(|e| e.id).map(|e| e.id).unwrap_or_default();
    assert_eq!(links_between(conv, last, end.id).len(), 1);
}

#[test]
fn option_list_bypass_only_when_every_option_is_guarded() {
    let option = |line_id: &str, line: u32, guarded: bool| {
        let mut option = json!({
            "kind": { "type": "option" },
            "line": line,
            "children": [{ "kind": { "type": "line", "line_id": line_id }, "line": line }]
        });
        if guarded {
            option["conditions"] = greater_than("gold", 0.0);
        }
        option
    };
    let options = |guard_second: bool| {
        json!({
            "kind": { "type": "options" },
            "line": 2,
            "children": [option("line:buy", 2, true), option("line:leave", 3, guard_second)]
        })
    };
    let strings = json!({
        "line:buy": { "en": "Buy" },
        "line:leave": { "en": "Leave" }
    });
    let output = compile(json!({ "units": [unit(
        "a.yarn",
        vec![node("Guarded", vec![options(true)]), node("Open", vec![options(false)])],
        strings
    )] }));

    let guarded = conversation(&output, "Guarded");
    let start = only(guarded, "Shortcut Option List Start");
    let end = only(guarded, "Shortcut Option List End");
    assert!(start.is_group);
    let bypass = below_normal(guarded);
    assert_eq!(bypass.len(), 1);
    assert_eq!((bypass[0].origin_entry_id, bypass[0].destination_entry_id), (start.id, end.id));

    let choices = titled(guarded, "Shortcut Option Start");
    assert_eq!(choices.len(), 2);
    for choice in &choices {
        assert_eq!(choice.conditions, "Variable['gold'] > 0");
        assert_eq!(choice.false_condition_action, FalseConditionAction::Block);
        assert_eq!(choice.actor_id, output.database.metadata.player_actor_id);
    }

    assert!(below_normal(conversation(&output, "Open")).is_empty());
}

#[test]
fn speaker_prefix_registers_actor_and_is_stripped() {
    let strings = json!({ "line:hi": { "en": "Mae: Hi there.", "fr": "Mae: Salut." } });
    let output = compile(json!({ "units": [unit("a.yarn", vec![node("Start", vec![line("line:hi", 2)])], strings)] }));

    let mae = output
        .database
        .actors
        .iter()
        .find(|a| a.name == "Mae")
        .expect("speaker registered");
    assert!(!mae.is_player);

    let entry = only(conversation(&output, "Start"), "Line");
    assert_eq!(entry.actor_id, mae.id);
    assert_eq!(entry.conversant_id, output.database.metadata.player_actor_id);
    assert_eq!(entry.dialogue_text["en"], "Hi there.");
    assert_eq!(entry.dialogue_text["fr"], "Salut.");
}

#[test]
fn speaker_is_read_from_another_locale_when_default_is_missing() {
    let strings = json!({ "line:hi": { "fr": "Mae: Salut." } });
    let output = compile(json!({ "units": [unit("a.yarn", vec![node("Start", vec![line("line:hi", 2)])], strings)] }));

    let mae = output
        .database
        .actors
        .iter()
        .find(|a| a.name == "Mae")
        .expect("speaker registered");
    let entry = only(conversation(&output, "Start"), "Line");
    assert_eq!(entry.actor_id, mae.id);
    assert_eq!(entry.dialogue_text["fr"], "Salut.");
}

#[test]
fn unsupported_jump_drops_only_its_node() {
    let jump = json!({ "kind": { "type": "jump", "node": "Nowhere" }, "line": 4 });
    let output = compile(json!({ "units": [
        unit("a.yarn", vec![node("Broken", vec![jump]), node("Fine", vec![])], json!({}))
    ] }));

    let titles: Vec<_> = output
        .database
        .conversations
        .iter()
        .map(|c| (c.id, c.title.as_str()))
        .collect();
    assert_eq!(titles, vec![(2, "Fine")]);

    let errors = output.diagnostics.diagnostics();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_error());
    assert_eq!(errors[0].conversation.as_deref(), Some("Broken"));
    assert_eq!(errors[0].span.as_ref().map(|s| s.line), Some(4));
}

#[test]
fn jumps_into_dropped_nodes_are_removed() {
    let to_nowhere = json!({ "kind": { "type": "jump", "node": "Nowhere" }, "line": 2 });
    let to_broken = json!({ "kind": { "type": "jump", "node": "Broken" }, "line": 2 });
    let to_bad = json!({ "kind": { "type": "jump", "node": "Bad" }, "line": 3 });
    let empty_set = json!({ "kind": { "type": "set", "variable": "x" }, "line": 2 });
    let output = compile(json!({ "units": [
        unit("a.yarn", vec![node("Broken", vec![to_nowhere]), node("Fine", vec![to_broken, to_bad])], json!({})),
        unit("bad.yarn", vec![node("Bad", vec![empty_set])], json!({}))
    ] }));

    let titles: Vec<_> = output
        .database
        .conversations
        .iter()
        .map(|c| c.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Fine"]);

    let fine = conversation(&output, "Fine");
    assert_eq!(fine.links().filter(|l| l.is_connector).count(), 0);
    assert_eq!(titled(fine, "Jump to Conversation").len(), 2);

    assert_eq!(output.diagnostics.error_count(), 2);
    let warnings: Vec<_> = output
        .diagnostics
        .diagnostics()
        .iter()
        .filter(|d| !d.is_error())
        .collect();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.conversation.as_deref() == Some("Fine")));
    assert!(warnings[0].message.contains("'Broken'"));
    assert!(warnings[1].message.contains("'Bad'"));
}

#[test]
fn malformed_expression_drops_the_whole_file() {
    let empty_set = json!({ "kind": { "type": "set", "variable": "x" }, "line": 3 });
    let output = compile(json!({ "units": [
        unit("bad.yarn", vec![node("Fine", vec![]), node("Bad", vec![empty_set])], json!({})),
        unit("good.yarn", vec![node("Other", vec![])], json!({}))
    ] }));

    let titles: Vec<_> = output
        .database
        .conversations
        .iter()
        .map(|c| c.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Other"]);
    assert_eq!(output.diagnostics.error_count(), 1);
    assert_eq!(
        output.diagnostics.diagnostics()[0].span.as_ref().map(|s| s.file.as_str()),
        Some("bad.yarn")
    );
}

#[test]
fn compiling_twice_gives_identical_output() {
    let if_block = json!({
        "kind": { "type": "if" },
        "line": 2,
        "children": [{
            "kind": { "type": "if_clause", "clause": "If" },
            "line": 2,
            "conditions": greater_than("x", 1.0),
            "children": [set_text("y", "a", 3)]
        }]
    });
    let bundle = json!({ "units": [unit("a.yarn", vec![node("Start", vec![if_block])], json!({}))] });

    let first = serde_json::to_string(&compile(bundle.clone()).database).unwrap();
    let second = serde_json::to_string(&compile(bundle).database).unwrap();
    assert_eq!(first, second);
}
