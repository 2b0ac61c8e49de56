#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the sensor REPL.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over those tokens to build structured
//! command values. Both stay allocation free.

use super::catalog::{
    self, ChoiceBranch, ChoiceTag, CommandTag, DefaultChoice, Node, SubcommandBranch,
    SubcommandTag, ValueSpec,
};
use core::fmt;
use core::ops::Range;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use crate::controls::ControlId;

/// Maximum number of tokens produced per REPL line.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Token kinds of the sensor console.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Unsigned decimal literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Keyword or control name (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    #[token("=")]
    Equals,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Any character no other pattern accepts.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Lexed token; `span` indexes into the original line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// The line does not fit in the token buffer.
    TooManyTokens { processed: usize },
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    UnknownControl {
        span: Range<usize>,
        lexeme: &'a str,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "invalid integer literal at {span:?}")
            }
            GrammarErrorKind::UnknownControl { lexeme, .. } => {
                write!(f, "unknown control `{lexeme}`")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_integer(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidInteger {
                span: token.span.clone(),
            },
        }
    }

    fn unknown_control(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::UnknownControl {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// A parsed console command, borrowing from the input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Power(PowerCommand),
    Identify,
    Mode(ModeCommand),
    Set(SetCommand),
    Get(ControlId),
    Stream(StreamCommand),
    Config(ConfigCommand),
    Status,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerCommand {
    On,
    Off,
    Query,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamCommand {
    Start,
    Stop,
    Query,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeCommand {
    List,
    Set(ModeSetCommand),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeSetCommand {
    pub width: u32,
    pub height: u32,
    /// `None` selects the fastest class.
    pub fps: Option<u32>,
    pub hdr: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetCommand {
    pub control: ControlId,
    pub value: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigCommand {
    /// `None` reports the current configuration.
    pub qbc: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command().parse_next(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Splits `line` into at most [`MAX_TOKENS`] tokens.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(
            &mut buffer,
            Token {
                kind: record.token,
                lexeme,
                span,
            },
        )?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(
            &mut buffer,
            Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            },
        )?;
    }

    Ok(buffer)
}

fn push_token<'a>(buffer: &mut TokenBuffer<'a>, token: Token<'a>) -> Result<(), LexError> {
    buffer.push(token).map_err(|_| LexError::TooManyTokens {
        processed: MAX_TOKENS + 1,
    })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parses one console line into a [`Command`].
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let (command, mut rest) =
        parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let command_token = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        if let Some(spec) = catalog::find(command_token.lexeme) {
            let mut state = CommandState::new(spec.tag);
            parse_node(spec.grammar, input, &mut state)?;
            state.finish()
        } else {
            *input = snapshot;
            Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&command_token),
            )))
        }
    }
}

fn parse_node<'src>(
    node: &'static Node,
    input: &mut Input<'src, '_>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>> {
    match node {
        Node::End => Ok(()),
        Node::OptionalChoice { choices, default } => {
            parse_optional_choice(input, choices, *default, state)
        }
        Node::Subcommands(branches) => parse_subcommands(input, branches, state),
        Node::Assignments(choices) => parse_assignments(input, choices, state),
        Node::Control { assignment } => parse_control(input, *assignment, state),
        Node::Topic { next, .. } => {
            parse_topic(input, state)?;
            parse_node(next, input, state)
        }
    }
}

fn parse_optional_choice<'src>(
    input: &mut Input<'src, '_>,
    choices: &'static [ChoiceBranch],
    default: Option<DefaultChoice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            if let Some(branch) = find_choice(choices, token.lexeme) {
                *input = rest;
                parse_choice_branch(input, branch, state)
            } else {
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    choice_expected_label(choices),
                    Some(token),
                )))
            }
        }
        Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
            GrammarError::unexpected(choice_expected_label(choices), Some(token)),
        )),
        _ => match default {
            Some(default_choice) => {
                state.apply_choice(default_choice.tag, None)?;
                parse_node(default_choice.next, input, state)
            }
            None => Ok(()),
        },
    }
}

fn parse_choice_branch<'src>(
    input: &mut Input<'src, '_>,
    branch: &'static ChoiceBranch,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>> {
    let value = parse_value(input, branch.value)?;
    state.apply_choice(branch.tag, value)?;
    parse_node(branch.next, input, state)
}

fn parse_subcommands<'src>(
    input: &mut Input<'src, '_>,
    branches: &'static [SubcommandBranch],
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>> {
    let expected = branches.first().map_or("subcommand", |branch| branch.name);
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            if let Some(branch) = branches
                .iter()
                .find(|candidate| candidate.name.eq_ignore_ascii_case(token.lexeme))
            {
                *input = rest;
                state.set_subcommand(branch.tag);
                parse_node(branch.grammar, input, state)
            } else {
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    expected,
                    Some(token),
                )))
            }
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            expected,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(expected, None))),
    }
}

fn parse_assignments<'src>(
    input: &mut Input<'src, '_>,
    choices: &'static [ChoiceBranch],
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>> {
    loop {
        match input.split_first() {
            Some((token, rest)) if token.kind == TokenKind::Ident => {
                let Some(branch) = find_choice(choices, token.lexeme) else {
                    return Err(ErrMode::Backtrack(GrammarError::unexpected(
                        choice_expected_label(choices),
                        Some(token),
                    )));
                };
                *input = rest;
                parse_choice_branch(input, branch, state)?;
            }
            Some((token, _)) if token.kind != TokenKind::Eol => {
                return Err(ErrMode::Backtrack(GrammarError::unexpected(
                    choice_expected_label(choices),
                    Some(token),
                )));
            }
            _ => return Ok(()),
        }
    }
}

fn parse_control<'src>(
    input: &mut Input<'src, '_>,
    assignment: bool,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>> {
    let name = expect_kind(TokenKind::Ident, "control name").parse_next(input)?;
    let control = ControlId::from_name(name.lexeme)
        .ok_or_else(|| ErrMode::Cut(GrammarError::unknown_control(&name)))?;
    state.set_control(control);

    if assignment {
        let _ = expect_kind(TokenKind::Equals, "=").parse_next(input)?;
        let integer_token = expect_kind(TokenKind::Integer, "integer").parse_next(input)?;
        let value = parse_integer(&integer_token).map_err(ErrMode::Cut)?;
        state.set_value(value);
    }
    Ok(())
}

fn parse_topic<'src>(
    input: &mut Input<'src, '_>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>> {
    state.set_topic(None);

    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            state.set_topic(Some(token.lexeme));
            *input = rest;
            Ok(())
        }
        Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
            GrammarError::unexpected("identifier", Some(token)),
        )),
        _ => Ok(()),
    }
}

fn parse_value<'src>(
    input: &mut Input<'src, '_>,
    spec: ValueSpec,
) -> Result<Option<u32>, ErrMode<GrammarError<'src>>> {
    match spec {
        ValueSpec::None => Ok(None),
        ValueSpec::IntegerAssignment { .. } => {
            let _ = expect_kind(TokenKind::Equals, "=").parse_next(input)?;
            let integer_token = expect_kind(TokenKind::Integer, "integer").parse_next(input)?;
            let value = parse_integer(&integer_token).map_err(ErrMode::Cut)?;
            Ok(Some(value))
        }
    }
}

fn find_choice(choices: &'static [ChoiceBranch], lexeme: &str) -> Option<&'static ChoiceBranch> {
    choices
        .iter()
        .find(|choice| choice.keyword.eq_ignore_ascii_case(lexeme))
}

fn choice_expected_label(choices: &'static [ChoiceBranch]) -> &'static str {
    choices.first().map_or("keyword", |choice| choice.keyword)
}

enum CommandState<'a> {
    Power {
        action: Option<PowerCommand>,
    },
    Identify,
    Mode {
        subcommand: Option<SubcommandTag>,
        width: Option<u32>,
        height: Option<u32>,
        fps: Option<u32>,
        hdr: Option<u32>,
    },
    Set {
        control: Option<ControlId>,
        value: Option<u32>,
    },
    Get {
        control: Option<ControlId>,
    },
    Stream {
        action: Option<StreamCommand>,
    },
    Config {
        qbc: Option<u32>,
    },
    Status,
    Help {
        topic: Option<&'a str>,
    },
}

impl<'a> CommandState<'a> {
    fn new(tag: CommandTag) -> Self {
        match tag {
            CommandTag::Power => CommandState::Power { action: None },
            CommandTag::Identify => CommandState::Identify,
            CommandTag::Mode => CommandState::Mode {
                subcommand: None,
                width: None,
                height: None,
                fps: None,
                hdr: None,
            },
            CommandTag::Set => CommandState::Set {
                control: None,
                value: None,
            },
            CommandTag::Get => CommandState::Get { control: None },
            CommandTag::Stream => CommandState::Stream { action: None },
            CommandTag::Config => CommandState::Config { qbc: None },
            CommandTag::Status => CommandState::Status,
            CommandTag::Help => CommandState::Help { topic: None },
        }
    }

    fn apply_choice(
        &mut self,
        tag: ChoiceTag,
        value: Option<u32>,
    ) -> Result<(), ErrMode<GrammarError<'a>>> {
        match (self, tag) {
            (CommandState::Power { action }, ChoiceTag::PowerOn) => *action = Some(PowerCommand::On),
            (CommandState::Power { action }, ChoiceTag::PowerOff) => {
                *action = Some(PowerCommand::Off);
            }
            (CommandState::Power { action }, ChoiceTag::PowerQuery) => {
                *action = Some(PowerCommand::Query);
            }
            (CommandState::Stream { action }, ChoiceTag::StreamStart) => {
                *action = Some(StreamCommand::Start);
            }
            (CommandState::Stream { action }, ChoiceTag::StreamStop) => {
                *action = Some(StreamCommand::Stop);
            }
            (CommandState::Stream { action }, ChoiceTag::StreamQuery) => {
                *action = Some(StreamCommand::Query);
            }
            (CommandState::Mode { width, .. }, ChoiceTag::ModeWidth) => *width = value,
            (CommandState::Mode { height, .. }, ChoiceTag::ModeHeight) => *height = value,
            (CommandState::Mode { fps, .. }, ChoiceTag::ModeFps) => *fps = value,
            (CommandState::Mode { hdr, .. }, ChoiceTag::ModeHdr) => *hdr = value,
            (CommandState::Config { qbc }, ChoiceTag::ConfigQbc) => *qbc = value,
            _ => return Err(ErrMode::Backtrack(GrammarError::unexpected("choice", None))),
        }
        Ok(())
    }

    fn set_subcommand(&mut self, tag: SubcommandTag) {
        if let CommandState::Mode { subcommand, .. } = self {
            *subcommand = Some(tag);
        }
    }

    fn set_control(&mut self, id: ControlId) {
        match self {
            CommandState::Set { control, .. } | CommandState::Get { control } => {
                *control = Some(id);
            }
            _ => {}
        }
    }

    fn set_value(&mut self, raw: u32) {
        if let CommandState::Set { value, .. } = self {
            *value = Some(raw);
        }
    }

    fn set_topic(&mut self, topic: Option<&'a str>) {
        if let CommandState::Help { topic: slot } = self {
            *slot = topic;
        }
    }

    fn finish(self) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
        let missing = |expected| Err(ErrMode::Backtrack(GrammarError::unexpected(expected, None)));
        match self {
            CommandState::Power {
                action: Some(action),
            } => Ok(Command::Power(action)),
            CommandState::Stream {
                action: Some(action),
            } => Ok(Command::Stream(action)),
            CommandState::Power { action: None } => missing("power argument"),
            CommandState::Stream { action: None } => missing("stream argument"),
            CommandState::Identify => Ok(Command::Identify),
            CommandState::Mode {
                subcommand: Some(SubcommandTag::ModeList),
                ..
            } => Ok(Command::Mode(ModeCommand::List)),
            CommandState::Mode {
                subcommand: Some(SubcommandTag::ModeSet),
                width,
                height,
                fps,
                hdr,
            } => match (width, height) {
                (Some(width), Some(height)) => Ok(Command::Mode(ModeCommand::Set(
                    ModeSetCommand {
                        width,
                        height,
                        fps,
                        hdr,
                    },
                ))),
                (None, _) => missing("width"),
                (Some(_), None) => missing("height"),
            },
            CommandState::Mode {
                subcommand: None, ..
            } => missing("list"),
            CommandState::Set {
                control: Some(control),
                value: Some(value),
            } => Ok(Command::Set(SetCommand { control, value })),
            CommandState::Set { .. } => missing("control assignment"),
            CommandState::Get {
                control: Some(control),
            } => Ok(Command::Get(control)),
            CommandState::Get { control: None } => missing("control name"),
            CommandState::Config { qbc } => Ok(Command::Config(ConfigCommand { qbc })),
            CommandState::Status => Ok(Command::Status),
            CommandState::Help { topic } => Ok(Command::Help(HelpCommand { topic })),
        }
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_integer<'a>(token: &Token<'a>) -> Result<u32, GrammarError<'a>> {
    token
        .lexeme
        .parse::<u32>()
        .map_err(|_| GrammarError::invalid_integer(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_power_variants() {
        assert_eq!(parse_ok("power on"), Command::Power(PowerCommand::On));
        assert_eq!(parse_ok("power off"), Command::Power(PowerCommand::Off));
        assert_eq!(parse_ok("power"), Command::Power(PowerCommand::Query));
        assert_eq!(parse_ok("power\n"), Command::Power(PowerCommand::Query));
    }

    #[test]
    fn parses_mode_set_in_any_key_order() {
        match parse_ok("mode set fps=30 height=1296 width=2304") {
            Command::Mode(ModeCommand::Set(request)) => {
                assert_eq!(request.width, 2304);
                assert_eq!(request.height, 1296);
                assert_eq!(request.fps, Some(30));
                assert_eq!(request.hdr, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn mode_set_requires_dimensions() {
        match parse("mode set width=4608") {
            Err(ParseError::Grammar(err)) => assert_eq!(
                err.kind,
                GrammarErrorKind::UnexpectedEnd { expected: "height" }
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parses_mode_list() {
        assert_eq!(parse_ok("mode list"), Command::Mode(ModeCommand::List));
    }

    #[test]
    fn parses_control_assignment() {
        assert_eq!(
            parse_ok("set analogue-gain=480"),
            Command::Set(SetCommand {
                control: ControlId::AnalogueGain,
                value: 480,
            })
        );
        assert_eq!(parse_ok("get HFLIP"), Command::Get(ControlId::HorizontalFlip));
    }

    #[test]
    fn rejects_unknown_control() {
        match parse("set shutter=10") {
            Err(ParseError::Grammar(err)) => assert!(matches!(
                err.kind,
                GrammarErrorKind::UnknownControl {
                    lexeme: "shutter",
                    ..
                }
            )),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_oversized_integer() {
        match parse("set exposure=99999999999") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidInteger { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parses_config_and_stream() {
        assert_eq!(
            parse_ok("config qbc=4"),
            Command::Config(ConfigCommand { qbc: Some(4) })
        );
        assert_eq!(parse_ok("config"), Command::Config(ConfigCommand { qbc: None }));
        assert_eq!(parse_ok("stream start"), Command::Stream(StreamCommand::Start));
        assert_eq!(parse_ok("stream"), Command::Stream(StreamCommand::Query));
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(
            parse_ok("help mode"),
            Command::Help(HelpCommand {
                topic: Some("mode"),
            })
        );
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(matches!(
            parse("identify now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken {
                    expected: "end of command",
                    ..
                }
            }))
        ));
    }

    #[test]
    fn rejects_invalid_token() {
        match parse("power on$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn supports_case_insensitive_keywords() {
        assert_eq!(parse_ok("PoWeR On"), Command::Power(PowerCommand::On));
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("stream start$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }
}
