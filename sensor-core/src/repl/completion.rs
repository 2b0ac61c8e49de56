//! Grammar-aware completion for the sensor REPL.
//!
//! Suggestions are computed from the buffer contents up to the cursor, using
//! the same catalog the parser walks.

use super::catalog::{self, Node, ValueSpec};
use super::grammar::{self, Command, GrammarErrorKind, ModeCommand, Token, TokenKind};
use heapless::Vec as HeaplessVec;

const MAX_SUGGESTIONS: usize = 16;

const ROOT_COMMANDS: &[&str] = &[
    "power", "identify", "mode", "set", "get", "stream", "config", "status", "help",
];
const POWER_ARGS: &[&str] = &["on", "off"];
const STREAM_ARGS: &[&str] = &["start", "stop"];
const MODE_SUBCOMMANDS: &[&str] = &["list", "set"];
const CONTROL_NAMES: &[&str] = &[
    "exposure",
    "analogue-gain",
    "digital-gain",
    "red-balance",
    "blue-balance",
    "test-pattern",
    "test-pattern-red",
    "test-pattern-green-red",
    "test-pattern-blue",
    "test-pattern-green-blue",
    "hflip",
    "vflip",
    "pixel-rate",
    "link-frequency",
    "exposure-shift",
];
const WRITABLE_CONTROLS: &[&str] = &[
    "exposure=",
    "analogue-gain=",
    "digital-gain=",
    "red-balance=",
    "blue-balance=",
    "test-pattern=",
    "test-pattern-red=",
    "test-pattern-green-red=",
    "test-pattern-blue=",
    "test-pattern-green-blue=",
    "hflip=",
    "vflip=",
];

/// Completion result returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionResult {
    /// Replacement to apply when only one candidate matches or when the
    /// candidates share a longer prefix than the one typed.
    pub replacement: Option<Replacement>,
    /// Candidates for the current cursor position; empty when nothing matches.
    pub options: HeaplessVec<&'static str, MAX_SUGGESTIONS>,
}

impl CompletionResult {
    const fn empty() -> Self {
        CompletionResult {
            replacement: None,
            options: HeaplessVec::new(),
        }
    }
}

/// Portion of the buffer to substitute with a completion string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub value: &'static str,
    pub append_space: bool,
}

/// Stateless completion engine mirroring the REPL grammar.
#[derive(Default)]
pub struct CompletionEngine;

impl CompletionEngine {
    pub const fn new() -> Self {
        Self
    }

    /// Computes completions for `buffer` at `cursor`.
    ///
    /// The cursor must sit on a UTF-8 boundary; callers restrict input to ASCII.
    pub fn complete(&self, buffer: &str, cursor: usize) -> CompletionResult {
        if cursor > buffer.len() || !buffer.is_char_boundary(cursor) {
            return CompletionResult::empty();
        }

        let upto_cursor = &buffer[..cursor];
        let prefix_start = token_start(upto_cursor);
        let prefix = &upto_cursor[prefix_start..];
        let leading = &upto_cursor[..prefix_start];

        let Ok(leading_tokens) = grammar::lex(leading) else {
            return CompletionResult::empty();
        };

        let context = determine_context(leading_tokens.as_slice());
        let mut matches: HeaplessVec<&'static str, MAX_SUGGESTIONS> = HeaplessVec::new();
        for candidate in candidates(context) {
            if context == CompletionContext::ModeSetKey
                && assigned(leading_tokens.as_slice(), candidate)
            {
                continue;
            }
            if starts_with_ignore_ascii_case(candidate, prefix) && !matches.contains(&candidate) {
                let _ = matches.push(candidate);
            }
        }

        if matches.is_empty() {
            return CompletionResult::empty();
        }

        let mut append_space = false;
        let replacement_value = if let [candidate] = matches.as_slice() {
            append_space = should_append_space(context, candidate);
            Some(*candidate)
        } else {
            let lcp = longest_common_prefix(matches.as_slice());
            let shared = common_prefix_len_ignore_case(prefix, lcp);
            if lcp.len() > shared { Some(lcp) } else { None }
        };

        let replacement = replacement_value.map(|value| Replacement {
            start: prefix_start,
            end: cursor,
            value,
            append_space,
        });

        CompletionResult {
            replacement,
            options: matches,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompletionContext {
    Root,
    PowerArg,
    StreamArg,
    ModeSub,
    ModeSetKey,
    SetControl,
    GetControl,
    ConfigKey,
    HelpTopic,
    None,
}

fn candidates(context: CompletionContext) -> HeaplessVec<&'static str, MAX_SUGGESTIONS> {
    let fixed: &[&'static str] = match context {
        CompletionContext::Root | CompletionContext::HelpTopic => ROOT_COMMANDS,
        CompletionContext::PowerArg => POWER_ARGS,
        CompletionContext::StreamArg => STREAM_ARGS,
        CompletionContext::ModeSub => MODE_SUBCOMMANDS,
        CompletionContext::SetControl => WRITABLE_CONTROLS,
        CompletionContext::GetControl => CONTROL_NAMES,
        CompletionContext::ModeSetKey => return assignment_suggestions("mode", Some("set")),
        CompletionContext::ConfigKey => return assignment_suggestions("config", None),
        CompletionContext::None => &[],
    };
    fixed.iter().copied().take(MAX_SUGGESTIONS).collect()
}

/// Walks the catalog to collect `key=value` suggestions for a command.
fn assignment_suggestions(
    command: &str,
    subcommand: Option<&str>,
) -> HeaplessVec<&'static str, MAX_SUGGESTIONS> {
    let mut out = HeaplessVec::new();
    let Some(spec) = catalog::find(command) else {
        return out;
    };

    let node = match (spec.grammar, subcommand) {
        (Node::Subcommands(branches), Some(name)) => branches
            .iter()
            .find(|branch| branch.name == name)
            .map(|branch| branch.grammar),
        (node, None) => Some(node),
        _ => None,
    };

    let choices: &[catalog::ChoiceBranch] = match node {
        Some(Node::Assignments(choices) | Node::OptionalChoice { choices, .. }) => *choices,
        _ => &[],
    };

    for choice in choices {
        if let ValueSpec::IntegerAssignment { suggestions } = choice.value {
            for suggestion in suggestions {
                if out.push(*suggestion).is_err() {
                    return out;
                }
            }
        }
    }
    out
}

/// True when `candidate`'s key already appears in the typed assignments.
fn assigned(tokens: &[Token<'_>], candidate: &str) -> bool {
    let key = candidate.split('=').next().unwrap_or(candidate);
    tokens
        .windows(2)
        .any(|pair| pair[1].kind == TokenKind::Equals && pair[0].lexeme.eq_ignore_ascii_case(key))
}

fn determine_context(tokens: &[Token<'_>]) -> CompletionContext {
    if tokens.is_empty() {
        return CompletionContext::Root;
    }

    if tokens.iter().any(|token| token.kind == TokenKind::Error) {
        return CompletionContext::None;
    }

    match grammar::parse_tokens_partial(tokens) {
        Ok((command, _)) => classify_success(tokens, &command),
        Err(err) => classify_error(tokens, &err.kind),
    }
}

fn classify_success(tokens: &[Token<'_>], command: &Command<'_>) -> CompletionContext {
    match command {
        Command::Power(_) if tokens.len() == 1 => CompletionContext::PowerArg,
        Command::Stream(_) if tokens.len() == 1 => CompletionContext::StreamArg,
        Command::Config(_) if tokens.len() == 1 => CompletionContext::ConfigKey,
        Command::Help(_) if tokens.len() == 1 => CompletionContext::HelpTopic,
        Command::Mode(ModeCommand::Set(_)) => CompletionContext::ModeSetKey,
        _ => infer_from_tokens(tokens),
    }
}

fn classify_error(tokens: &[Token<'_>], error: &GrammarErrorKind<'_>) -> CompletionContext {
    match error {
        GrammarErrorKind::UnexpectedEnd { expected } => match *expected {
            "list" => CompletionContext::ModeSub,
            "width" | "height" => CompletionContext::ModeSetKey,
            "control name" if first_token_is(tokens, "set") => CompletionContext::SetControl,
            "control name" if first_token_is(tokens, "get") => CompletionContext::GetControl,
            _ => infer_from_tokens(tokens),
        },
        _ => infer_from_tokens(tokens),
    }
}

fn infer_from_tokens(tokens: &[Token<'_>]) -> CompletionContext {
    match tokens {
        [] => CompletionContext::Root,
        [first] if first.lexeme.eq_ignore_ascii_case("power") => CompletionContext::PowerArg,
        [first] if first.lexeme.eq_ignore_ascii_case("stream") => CompletionContext::StreamArg,
        [first] if first.lexeme.eq_ignore_ascii_case("mode") => CompletionContext::ModeSub,
        [first] if first.lexeme.eq_ignore_ascii_case("set") => CompletionContext::SetControl,
        [first] if first.lexeme.eq_ignore_ascii_case("get") => CompletionContext::GetControl,
        [first] if first.lexeme.eq_ignore_ascii_case("config") => CompletionContext::ConfigKey,
        [first] if first.lexeme.eq_ignore_ascii_case("help") => CompletionContext::HelpTopic,
        [first, second, ..]
            if first.lexeme.eq_ignore_ascii_case("mode")
                && second.lexeme.eq_ignore_ascii_case("set") =>
        {
            CompletionContext::ModeSetKey
        }
        _ => CompletionContext::None,
    }
}

fn first_token_is(tokens: &[Token<'_>], expected: &str) -> bool {
    tokens
        .first()
        .is_some_and(|token| token.lexeme.eq_ignore_ascii_case(expected))
}

fn token_start(buffer: &str) -> usize {
    buffer
        .rfind([' ', '\t'])
        .map_or(0, |index| index + 1)
}

fn starts_with_ignore_ascii_case(candidate: &str, prefix: &str) -> bool {
    candidate
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn common_prefix_len_ignore_case(lhs: &str, rhs: &str) -> usize {
    lhs.as_bytes()
        .iter()
        .zip(rhs.as_bytes())
        .take_while(|(l, r)| l.eq_ignore_ascii_case(r))
        .count()
}

fn longest_common_prefix(candidates: &[&'static str]) -> &'static str {
    let Some((first, rest)) = candidates.split_first() else {
        return "";
    };
    let mut prefix = *first;
    for candidate in rest {
        let len = common_prefix_len_ignore_case(prefix, candidate);
        prefix = &prefix[..len];
        if prefix.is_empty() {
            break;
        }
    }
    prefix
}

/// Commands that take further arguments get a trailing space once completed.
fn should_append_space(context: CompletionContext, candidate: &'static str) -> bool {
    match context {
        CompletionContext::Root => {
            let Ok(tokens) = grammar::lex(candidate) else {
                return false;
            };
            !matches!(
                determine_context(tokens.as_slice()),
                CompletionContext::Root | CompletionContext::None
            )
        }
        CompletionContext::ModeSub => candidate == "set",
        _ => false,
    }
}
