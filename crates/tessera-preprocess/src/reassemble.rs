//! Putting processed snippets back and placing side-channel lines.
//!
//! Substitution happens in two steps around the normalizer cleanup. Code and
//! math output is visible to the cleanup, so block output that landed inside a
//! paragraph gets repaired. Template constructs, expressions and verbatim
//! output stay behind their tokens until [`restore`], so nothing inside them
//! is rewritten.

use memchr::memmem;
use tessera_html::token::TokenMatches;

use crate::context::{SideChannelLines, StructurePresence};
use crate::snippet::{SnippetKind, SnippetOptions, StructuralKind};
use crate::table::{Entry, PlaceholderTable, SNIPPET_TOKEN_PREFIX};

const HEAD_CLOSE: &str = "</svelte:head>";
const SCRIPT_CLOSE: &str = "</script";

/// Where script lines end up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScriptPlacement {
    /// Write lines into the script blocks of the output.
    #[default]
    Inline,
    /// Only make sure the script blocks exist; the host's script hook adds the lines.
    Deferred,
}

fn is_shielded(kind: SnippetKind) -> bool {
    matches!(
        kind,
        SnippetKind::Structural | SnippetKind::Mustache | SnippetKind::Verbatim
    )
}

/// What replaces a token during [`substitute`].
fn shown(entry: &Entry) -> Option<&str> {
    let processed = entry.processed.as_deref()?;
    Some(if is_shielded(entry.snippet.kind()) {
        &entry.token
    } else {
        processed
    })
}

/// Range of the `<p>...</p>` around the token at `start`, when the paragraph
/// holds nothing but tokens of snippets that ask for its removal.
fn block_paragraph(html: &str, start: usize, table: &PlaceholderTable) -> Option<(usize, usize)> {
    if !html[..start].ends_with("<p>") {
        return None;
    }
    let close = start + memmem::find(&html.as_bytes()[start..], b"</p>")?;
    let all_blocks = html[start..close].split_whitespace().all(|word| {
        table
            .get(word)
            .is_some_and(|e| e.snippet.unescape.remove_paragraph)
    });
    all_blocks.then_some((start - 3, close + 4))
}

/// Replace every token in `html` with its processed output, in one pass.
///
/// Shielded snippets keep their token until [`restore`]. A paragraph holding
/// only tokens of snippets that ask for it is unwrapped; when nothing is left
/// of it, its trailing newline goes too.
pub(crate) fn substitute(html: &str, table: &PlaceholderTable) -> String {
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    for range in TokenMatches::new(html, SNIPPET_TOKEN_PREFIX) {
        if range.start < copied {
            continue;
        }
        let Some(text) = table.get(&html[range.clone()]).and_then(shown) else {
            continue;
        };
        match block_paragraph(html, range.start, table) {
            Some((open, close)) => {
                out.push_str(&html[copied..open]);
                let inner = &html[open + 3..close - 4];
                let before = out.len();
                replace_tokens(&mut out, inner, table);
                copied = close;
                if out[before..].trim().is_empty() {
                    out.truncate(before);
                    if html[copied..].starts_with('\n') {
                        copied += 1;
                    }
                }
            }
            None => {
                out.push_str(&html[copied..range.start]);
                out.push_str(text);
                copied = range.end;
            }
        }
    }
    out.push_str(&html[copied..]);
    out
}

fn replace_tokens(out: &mut String, text: &str, table: &PlaceholderTable) {
    let mut copied = 0;
    for range in TokenMatches::new(text, SNIPPET_TOKEN_PREFIX) {
        if let Some(shown) = table.get(&text[range.clone()]).and_then(shown) {
            out.push_str(&text[copied..range.start]);
            out.push_str(shown);
            copied = range.end;
        }
    }
    out.push_str(&text[copied..]);
}

/// Put the output of shielded snippets back.
pub(crate) fn restore(html: &str, table: &PlaceholderTable) -> String {
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    for range in TokenMatches::new(html, SNIPPET_TOKEN_PREFIX) {
        if let Some((processed, _)) = table.processed(&html[range.clone()]) {
            out.push_str(&html[copied..range.start]);
            out.push_str(processed);
            copied = range.end;
        }
    }
    out.push_str(&html[copied..]);
    out
}

fn insert_lines(text: &mut String, at: usize, lines: &[String]) {
    let mut block = String::new();
    if !text[..at].ends_with('\n') {
        block.push('\n');
    }
    for line in lines {
        block.push_str(line);
        block.push('\n');
    }
    text.insert_str(at, &block);
}

fn block(open: &str, close: &str, lines: &[String]) -> String {
    let mut out = format!("{open}\n");
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(close);
    out.push('\n');
    out
}

/// Append `lines` inside the first block of `kind` written in the document.
///
/// Returns `false` when there is no such block to append to.
fn append_to_block(
    table: &mut PlaceholderTable,
    present: bool,
    kind: StructuralKind,
    close: &str,
    lines: &[String],
) -> bool {
    if !present {
        return false;
    }
    let target = SnippetOptions::Structural(kind);
    let Some(output) = table
        .find_mut(|snippet| snippet.options == target)
        .and_then(|entry| entry.processed.as_mut())
    else {
        return false;
    };
    let Some(at) = output.rfind(close) else {
        return false;
    };
    if !lines.is_empty() {
        insert_lines(output, at, lines);
    }
    true
}

/// Place head and script lines, returning the blocks to prepend to the output.
///
/// Lines go into the document's own head and script blocks, which are
/// top-level structural snippets; a `<script>` inside `<svelte:head>` is part
/// of the head snippet and never receives script lines. Missing blocks are
/// synthesized: an instance script always, a module script only when there
/// are module lines, a head block only when there are head lines.
pub(crate) fn place_lines(
    table: &mut PlaceholderTable,
    structure: StructurePresence,
    lines: &SideChannelLines,
    placement: ScriptPlacement,
) -> String {
    let inline = placement == ScriptPlacement::Inline;
    let mut head_block = String::new();
    let mut instance_block = String::new();
    let mut module_block = String::new();

    if !lines.head.is_empty()
        && !append_to_block(table, structure.head, StructuralKind::Head, HEAD_CLOSE, &lines.head)
    {
        head_block = block("<svelte:head>", HEAD_CLOSE, &lines.head);
    }

    let script: &[String] = if inline { &lines.script } else { &[] };
    let instance = StructuralKind::Script { module: false };
    if !append_to_block(table, structure.instance_script, instance, SCRIPT_CLOSE, script) {
        instance_block = block("<script>", "</script>", script);
    }

    if !lines.module.is_empty() {
        let module: &[String] = if inline { &lines.module } else { &[] };
        let kind = StructuralKind::Script { module: true };
        if !append_to_block(table, structure.module_script, kind, SCRIPT_CLOSE, module) {
            module_block = block(r#"<script context="module">"#, "</script>", module);
        }
    }

    format!("{module_block}{instance_block}{head_block}")
}
