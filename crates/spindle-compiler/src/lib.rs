pub mod ast;
pub mod codegen;
pub mod error;
pub mod lines;
pub mod reader;
pub mod semantic;

use std::collections::{BTreeMap, BTreeSet};

use spindle_common::manifest::SpindleManifest;
use spindle_common::{Conversation, ConversationId, Diagnostic, DiagnosticBag, DialogueDatabase, Span};

pub use codegen::{lower_conversation, LoweringContext};
pub use error::{CompileError, ExprError};
pub use reader::{read_bundle, ReaderError, ScriptUnit};

/// Project-level settings for one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub default_locale: String,
    pub locales: Vec<String>,
    pub player_name: String,
    pub default_actor_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            locales: Vec::new(),
            player_name: "Player".to_string(),
            default_actor_name: "NPC".to_string(),
        }
    }
}

impl CompileOptions {
    pub fn from_manifest(manifest: &SpindleManifest) -> Self {
        Self {
            default_locale: manifest.project.default_locale.clone(),
            locales: manifest.all_locales(),
            player_name: manifest.actors.player.clone(),
            default_actor_name: manifest.actors.default_actor.clone(),
        }
    }
}

#[derive(Debug)]
pub struct CompileOutput {
    pub database: DialogueDatabase,
    pub diagnostics: DiagnosticBag,
}

/// Compile every unit into one dialogue database.
///
/// Registration runs over all units first, then every node gets its
/// conversation id, then each unit is lowered. A fatal error drops the
/// conversations of its unit; an unsupported construct drops only the
/// conversation it appears in. Both are reported as error diagnostics.
pub fn compile(units: &[ScriptUnit], options: &CompileOptions) -> CompileOutput {
    let mut database = DialogueDatabase::new(
        options.default_locale.clone(),
        options.locales.clone(),
        &options.player_name,
        &options.default_actor_name,
    );
    database.source_files = units.iter().map(|u| u.file.clone()).collect();

    let mut diagnostics = semantic::register(units, &mut database, &options.default_locale);
    let (ids, allocated) = allocate_conversations(units, &mut diagnostics);

    let mut conversations = Vec::new();
    for (unit, unit_ids) in units.iter().zip(&allocated) {
        let ctx = LoweringContext {
            actors: &database,
            conversations: &ids,
            lines: &unit.lines,
            default_locale: &options.default_locale,
        };
        conversations.extend(lower_unit(unit, unit_ids, &ctx, &mut diagnostics));
    }
    drop_dangling_jumps(&mut conversations, &ids, &mut diagnostics);
    database.conversations = conversations;

    CompileOutput {
        database,
        diagnostics,
    }
}

/// Remove connector links into conversations that were dropped during
/// lowering. Each removed jump gets a warning in the conversation it left.
fn drop_dangling_jumps(
    conversations: &mut [Conversation],
    ids: &BTreeMap<String, ConversationId>,
    diagnostics: &mut DiagnosticBag,
) {
    let present: BTreeSet<ConversationId> = conversations.iter().map(|c| c.id).collect();
    for conversation in conversations.iter_mut() {
        for entry in &mut conversation.entries {
            let mut dropped = Vec::new();
            entry.outgoing_links.retain(|link| {
                let keep = !link.is_connector || present.contains(&link.destination_conversation_id);
                if !keep {
                    dropped.push(link.destination_conversation_id);
                }
                keep
            });
            for target in dropped {
                let name = ids
                    .iter()
                    .find(|&(_, &id)| id == target)
                    .map_or("?", |(name, _)| name.as_str());
                tracing::warn!(
                    conversation = %conversation.title,
                    entry = entry.id,
                    node = name,
                    "removing jump into a dropped node"
                );
                diagnostics.report(
                    Diagnostic::warning(format!(
                        "jump to node '{}' removed: that node failed to compile",
                        name
                    ))
                    .with_conversation(conversation.title.as_str()),
                );
            }
        }
    }
}

/// Decode a reader bundle and compile it.
pub fn compile_bundle(json: &str, options: &CompileOptions) -> Result<CompileOutput, ReaderError> {
    let units = read_bundle(json)?;
    Ok(compile(&units, options))
}

/// Number every node 1.. in order of appearance. A repeated node name keeps
/// its first id and the later tree is left out.
fn allocate_conversations(
    units: &[ScriptUnit],
    diagnostics: &mut DiagnosticBag,
) -> (BTreeMap<String, ConversationId>, Vec<Vec<Option<ConversationId>>>) {
    let mut ids = BTreeMap::new();
    let mut next: ConversationId = 1;
    let allocated = units
        .iter()
        .map(|unit| {
            unit.trees
                .iter()
                .map(|tree| {
                    if ids.contains_key(tree.name()) {
                        diagnostics.report(
                            Diagnostic::error(format!("duplicate node '{}'", tree.name()))
                                .with_span(Span::new(&unit.file, tree.get(tree.root()).line))
                                .with_conversation(tree.name())
                                .with_suggestion("node names must be unique across the project"),
                        );
                        return None;
                    }
                    let id = next;
                    next += 1;
                    ids.insert(tree.name().to_string(), id);
                    Some(id)
                })
                .collect::<Vec<_>>()
        })
        .collect();
    (ids, allocated)
}

#[tracing::instrument(skip_all, fields(file = %unit.file))]
fn lower_unit(
    unit: &ScriptUnit,
    ids: &[Option<ConversationId>],
    ctx: &LoweringContext<'_>,
    diagnostics: &mut DiagnosticBag,
) -> Vec<Conversation> {
    let mut lowered = Vec::new();
    for (tree, id) in unit.trees.iter().zip(ids) {
        let Some(id) = *id else {
            continue;
        };
        match lower_conversation(tree, id, ctx) {
            Ok(conversation) => lowered.push(conversation),
            Err(err) if err.is_fatal() => {
                tracing::warn!(error = %err, "dropping every node of the file");
                diagnostics.report(err.to_diagnostic(&unit.file));
                return Vec::new();
            }
            Err(err) => {
                tracing::warn!(error = %err, "dropping node");
                diagnostics.report(err.to_diagnostic(&unit.file));
            }
        }
    }
    tracing::info!(conversations = lowered.len(), "lowered file");
    lowered
}
