//! Sensor REPL grammar expressed as a static node tree.
//!
//! The parser and completion engine interpret the same structure, so
//! keywords, defaults and value layouts stay in sync.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Power,
    Identify,
    Mode,
    Set,
    Get,
    Stream,
    Config,
    Status,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubcommandTag {
    ModeList,
    ModeSet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTag {
    PowerOn,
    PowerOff,
    PowerQuery,
    StreamStart,
    StreamStop,
    StreamQuery,
    ModeWidth,
    ModeHeight,
    ModeFps,
    ModeHdr,
    ConfigQbc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpec {
    None,
    IntegerAssignment {
        suggestions: &'static [&'static str],
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelpTopics {
    None,
    Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub help: HelpTopics,
    pub summary: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    OptionalChoice {
        choices: &'static [ChoiceBranch],
        default: Option<DefaultChoice>,
    },
    Subcommands(&'static [SubcommandBranch]),
    /// Unordered `key=value` list, each key drawn from `choices`.
    Assignments(&'static [ChoiceBranch]),
    /// Control name, followed by `=value` when `assignment` is set.
    Control {
        assignment: bool,
    },
    Topic {
        topics: HelpTopics,
        next: &'static Node,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub keyword: &'static str,
    pub tag: ChoiceTag,
    pub value: ValueSpec,
    pub next: &'static Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultChoice {
    pub tag: ChoiceTag,
    pub next: &'static Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubcommandBranch {
    pub name: &'static str,
    pub tag: SubcommandTag,
    pub grammar: &'static Node,
}

const END: Node = Node::End;

const fn keyword(keyword: &'static str, tag: ChoiceTag) -> ChoiceBranch {
    ChoiceBranch {
        keyword,
        tag,
        value: ValueSpec::None,
        next: &END,
    }
}

const fn assignment(
    keyword: &'static str,
    tag: ChoiceTag,
    suggestions: &'static [&'static str],
) -> ChoiceBranch {
    ChoiceBranch {
        keyword,
        tag,
        value: ValueSpec::IntegerAssignment { suggestions },
        next: &END,
    }
}

const POWER_CHOICES: [ChoiceBranch; 2] = [
    keyword("on", ChoiceTag::PowerOn),
    keyword("off", ChoiceTag::PowerOff),
];

const POWER_GRAMMAR: Node = Node::OptionalChoice {
    choices: &POWER_CHOICES,
    default: Some(DefaultChoice {
        tag: ChoiceTag::PowerQuery,
        next: &END,
    }),
};

const STREAM_CHOICES: [ChoiceBranch; 2] = [
    keyword("start", ChoiceTag::StreamStart),
    keyword("stop", ChoiceTag::StreamStop),
];

const STREAM_GRAMMAR: Node = Node::OptionalChoice {
    choices: &STREAM_CHOICES,
    default: Some(DefaultChoice {
        tag: ChoiceTag::StreamQuery,
        next: &END,
    }),
};

const MODE_SET_CHOICES: [ChoiceBranch; 4] = [
    assignment("width", ChoiceTag::ModeWidth, &["width=4608", "width=2304", "width=1536"]),
    assignment("height", ChoiceTag::ModeHeight, &["height=2592", "height=1296", "height=864"]),
    assignment("fps", ChoiceTag::ModeFps, &["fps=10", "fps=30", "fps=60", "fps=120"]),
    assignment("hdr", ChoiceTag::ModeHdr, &["hdr=0", "hdr=1"]),
];

const MODE_SET_GRAMMAR: Node = Node::Assignments(&MODE_SET_CHOICES);

const MODE_SUBCOMMANDS: [SubcommandBranch; 2] = [
    SubcommandBranch {
        name: "list",
        tag: SubcommandTag::ModeList,
        grammar: &END,
    },
    SubcommandBranch {
        name: "set",
        tag: SubcommandTag::ModeSet,
        grammar: &MODE_SET_GRAMMAR,
    },
];

const MODE_GRAMMAR: Node = Node::Subcommands(&MODE_SUBCOMMANDS);

const SET_GRAMMAR: Node = Node::Control { assignment: true };

const GET_GRAMMAR: Node = Node::Control { assignment: false };

const CONFIG_CHOICES: [ChoiceBranch; 1] = [assignment(
    "qbc",
    ChoiceTag::ConfigQbc,
    &["qbc=0", "qbc=2", "qbc=3", "qbc=4", "qbc=5"],
)];

const CONFIG_GRAMMAR: Node = Node::OptionalChoice {
    choices: &CONFIG_CHOICES,
    default: None,
};

const HELP_GRAMMAR: Node = Node::Topic {
    topics: HelpTopics::Commands,
    next: &END,
};

const COMMANDS: [CommandSpec; 9] = [
    CommandSpec {
        name: "power",
        tag: CommandTag::Power,
        grammar: &POWER_GRAMMAR,
        help: HelpTopics::None,
        summary: "power [on|off]",
    },
    CommandSpec {
        name: "identify",
        tag: CommandTag::Identify,
        grammar: &END,
        help: HelpTopics::None,
        summary: "identify",
    },
    CommandSpec {
        name: "mode",
        tag: CommandTag::Mode,
        grammar: &MODE_GRAMMAR,
        help: HelpTopics::None,
        summary: "mode list | mode set width=<n> height=<n> [fps=<n>] [hdr=<0|1>]",
    },
    CommandSpec {
        name: "set",
        tag: CommandTag::Set,
        grammar: &SET_GRAMMAR,
        help: HelpTopics::None,
        summary: "set <control>=<value>",
    },
    CommandSpec {
        name: "get",
        tag: CommandTag::Get,
        grammar: &GET_GRAMMAR,
        help: HelpTopics::None,
        summary: "get <control>",
    },
    CommandSpec {
        name: "stream",
        tag: CommandTag::Stream,
        grammar: &STREAM_GRAMMAR,
        help: HelpTopics::None,
        summary: "stream [start|stop]",
    },
    CommandSpec {
        name: "config",
        tag: CommandTag::Config,
        grammar: &CONFIG_GRAMMAR,
        help: HelpTopics::None,
        summary: "config [qbc=<0|2..5>]",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        help: HelpTopics::None,
        summary: "status",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        help: HelpTopics::Commands,
        summary: "help [command]",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_is_found_by_name() {
        for spec in commands() {
            assert_eq!(find(spec.name).map(|found| found.tag), Some(spec.tag));
        }
        assert_eq!(find("STREAM").map(|spec| spec.tag), Some(CommandTag::Stream));
        assert!(find("reboot").is_none());
    }

    #[test]
    fn assignment_suggestions_carry_their_keyword() {
        for branch in MODE_SET_CHOICES.iter().chain(CONFIG_CHOICES.iter()) {
            let ValueSpec::IntegerAssignment { suggestions } = branch.value else {
                panic!("unexpected value spec for {}", branch.keyword);
            };
            for suggestion in suggestions {
                assert!(suggestion.starts_with(branch.keyword));
            }
        }
    }
}
