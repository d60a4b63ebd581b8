//! # Command Grammar
//!
//! Builds the tree of chat commands contributed by plugins and turns a chat line
//! into an [`Invocation`]. Argument parsing is delegated to `clap`; help and
//! error output never reach the process streams. Help text goes to an
//! [`OutputSink`] and ends the parse with [`ParseOutcome::Abort`], errors come
//! back as a [`ParseFailure`] carrying the message and a one-line usage.

use async_trait::async_trait;
use clap::error::ErrorKind;
use clap::{ArgMatches, Command};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::application::session::Session;
use crate::domain::error::GrammarError;
use crate::domain::types::MessageContext;

/// Receives help text produced while parsing.
pub trait OutputSink {
    fn emit(&mut self, text: &str);
}

impl OutputSink for Vec<String> {
    fn emit(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

/// Code run when a command node is invoked.
///
/// The returned text, if any, becomes the `result` of a forwarded command's
/// reply; room invocations ignore it.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn call(&self, session: &Session, invocation: &Invocation) -> anyhow::Result<Option<String>>;
}

/// A registered, immutable command node.
pub struct CommandNode {
    pub path: Vec<String>,
    /// Capability name of the plugin that registered the node.
    pub owner: String,
    handler: Arc<dyn CommandHandler>,
}

impl CommandNode {
    pub fn handler(&self) -> Arc<dyn CommandHandler> {
        self.handler.clone()
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("path", &self.path)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// A parsed command ready to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub node: Arc<CommandNode>,
    pub args: ArgMatches,
    pub context: MessageContext,
}

impl Invocation {
    /// Space separated command path, e.g. `volunteer whois`.
    pub fn command(&self) -> String {
        self.node.path.join(" ")
    }

    pub fn string(&self, id: &str) -> Option<String> {
        self.args.try_get_one::<String>(id).ok().flatten().cloned()
    }

    pub fn flag(&self, id: &str) -> bool {
        self.args
            .try_get_one::<bool>(id)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    }

    pub fn get<T>(&self, id: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.args.try_get_one::<T>(id).ok().flatten().cloned()
    }
}

/// Malformed command text: what went wrong and how the command is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub message: String,
    pub usage: String,
}

impl ParseFailure {
    fn from_clap(err: &clap::Error, fallback_usage: &str) -> Self {
        let rendered = err.render().to_string();
        let mut message = Vec::new();
        let mut usage = None;
        for line in rendered.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("Usage:") {
                usage = Some(format!("usage:{rest}"));
                break;
            }
            if line.is_empty() {
                continue;
            }
            message.push(line.strip_prefix("error:").unwrap_or(line).trim().to_string());
        }
        Self {
            message: message.join(" "),
            usage: usage.unwrap_or_else(|| fallback_usage.to_string()),
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.message, self.usage)
    }
}

/// Result of parsing one command line. Exactly one variant per line.
#[derive(Debug)]
pub enum ParseOutcome {
    Invocation(Invocation),
    /// Help was requested; its text has already been emitted.
    Abort,
    Failure(ParseFailure),
}

struct GrammarNode {
    name: String,
    spec: Command,
    entry: Option<Arc<CommandNode>>,
    children: Vec<GrammarNode>,
}

impl GrammarNode {
    fn group(name: &str) -> Self {
        Self {
            name: name.to_string(),
            spec: Command::new(name.to_string()),
            entry: None,
            children: Vec::new(),
        }
    }

    fn build(&self) -> Command {
        let mut command = self.spec.clone().name(self.name.clone());
        if !self.children.is_empty() {
            if self.entry.is_none() {
                command = command.subcommand_required(true);
            }
            command = command.subcommands(self.children.iter().map(GrammarNode::build));
        }
        command
    }

    fn collect(&self, into: &mut HashMap<Vec<String>, Arc<CommandNode>>) {
        if let Some(entry) = &self.entry {
            into.insert(entry.path.clone(), entry.clone());
        }
        for child in &self.children {
            child.collect(into);
        }
    }
}

/// Collects command registrations; sealed once into a [`CommandParser`].
pub struct CommandGrammar {
    prog: String,
    about: String,
    roots: Vec<GrammarNode>,
}

impl CommandGrammar {
    pub fn new(prog: impl Into<String>, about: impl Into<String>) -> Self {
        Self {
            prog: prog.into(),
            about: about.into(),
            roots: Vec::new(),
        }
    }

    /// Attaches a handler at `path`. Missing intermediate segments become
    /// groups that require a subcommand.
    pub fn register(
        &mut self,
        path: &[&str],
        spec: Command,
        owner: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), GrammarError> {
        let Some((last, parents)) = path.split_last() else {
            return Err(GrammarError::EmptyPath);
        };

        let mut level = &mut self.roots;
        for segment in parents {
            let index = match level.iter().position(|n| n.name == *segment) {
                Some(index) => index,
                None => {
                    level.push(GrammarNode::group(segment));
                    level.len() - 1
                }
            };
            level = &mut level[index].children;
        }

        let entry = Arc::new(CommandNode {
            path: path.iter().map(|s| s.to_string()).collect(),
            owner: owner.to_string(),
            handler,
        });

        match level.iter_mut().find(|n| n.name == *last) {
            Some(existing) if existing.entry.is_some() => Err(GrammarError::DuplicateCommand {
                path: path.join(" "),
            }),
            Some(existing) => {
                existing.spec = spec;
                existing.entry = Some(entry);
                Ok(())
            }
            None => {
                level.push(GrammarNode {
                    name: last.to_string(),
                    spec,
                    entry: Some(entry),
                    children: Vec::new(),
                });
                Ok(())
            }
        }
    }

    /// Seals the tree.
    pub fn build(self) -> CommandParser {
        let mut nodes = HashMap::new();
        for root in &self.roots {
            root.collect(&mut nodes);
        }
        let command = Command::new(self.prog)
            .about(self.about)
            .no_binary_name(true)
            .disable_version_flag(true)
            .subcommand_required(true)
            .subcommands(self.roots.iter().map(GrammarNode::build));
        CommandParser { command, nodes }
    }
}

/// The sealed command tree.
pub struct CommandParser {
    command: Command,
    nodes: HashMap<Vec<String>, Arc<CommandNode>>,
}

impl CommandParser {
    pub fn usage(&self) -> String {
        let usage = self.command.clone().render_usage().to_string();
        match usage.trim().strip_prefix("Usage:") {
            Some(rest) => format!("usage:{rest}"),
            None => usage.trim().to_string(),
        }
    }

    pub fn help(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    /// Registered command paths, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &Vec<String>> {
        self.nodes.keys()
    }

    /// Shell-style split of a raw chat line.
    pub fn tokenize(&self, line: &str) -> Result<Vec<String>, ParseFailure> {
        shlex::split(line).ok_or_else(|| ParseFailure {
            message: "unbalanced quotes in command".to_string(),
            usage: self.usage(),
        })
    }

    pub fn parse_line(
        &self,
        line: &str,
        context: MessageContext,
        sink: &mut dyn OutputSink,
    ) -> ParseOutcome {
        match self.tokenize(line) {
            Ok(tokens) => self.parse(&tokens, context, sink),
            Err(failure) => ParseOutcome::Failure(failure),
        }
    }

    pub fn parse(
        &self,
        tokens: &[String],
        context: MessageContext,
        sink: &mut dyn OutputSink,
    ) -> ParseOutcome {
        let matches = match self.command.clone().try_get_matches_from(tokens) {
            Ok(matches) => matches,
            Err(err) => {
                return match err.kind() {
                    ErrorKind::DisplayHelp
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                    | ErrorKind::DisplayVersion => {
                        sink.emit(err.render().to_string().trim_end());
                        ParseOutcome::Abort
                    }
                    _ => ParseOutcome::Failure(ParseFailure::from_clap(&err, &self.usage())),
                };
            }
        };

        let mut path = Vec::new();
        let mut current = &matches;
        while let Some((name, sub)) = current.subcommand() {
            path.push(name.to_string());
            current = sub;
        }

        match self.nodes.get(&path) {
            Some(node) => ParseOutcome::Invocation(Invocation {
                node: node.clone(),
                args: current.clone(),
                context,
            }),
            None => ParseOutcome::Failure(ParseFailure {
                message: format!("'{}' is not a complete command", path.join(" ")),
                usage: self.usage(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction};

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn call(&self, _session: &Session, _invocation: &Invocation) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    fn grammar() -> CommandGrammar {
        let mut grammar = CommandGrammar::new("storm:", "test bot");
        grammar
            .register(
                &["say"],
                Command::new("say")
                    .about("Say something")
                    .arg(Arg::new("voice").long("voice").default_value("fr-fr"))
                    .arg(Arg::new("text").required(true)),
                "say",
                Arc::new(Noop),
            )
            .unwrap();
        grammar
            .register(
                &["music"],
                Command::new("music")
                    .about("Play music")
                    .arg(Arg::new("remote").long("remote").action(ArgAction::SetTrue))
                    .arg(Arg::new("track")),
                "music",
                Arc::new(Noop),
            )
            .unwrap();
        grammar
            .register(
                &["volunteer", "whois"],
                Command::new("whois").arg(Arg::new("role").required(true)),
                "volunteer",
                Arc::new(Noop),
            )
            .unwrap();
        grammar
    }

    fn tokens(line: &str) -> Vec<String> {
        shlex::split(line).unwrap()
    }

    fn ctx() -> MessageContext {
        MessageContext::room("alice", "storm: test")
    }

    #[test]
    fn test_duplicate_path_fails() {
        let mut grammar = grammar();
        let err = grammar
            .register(&["say"], Command::new("say"), "other", Arc::new(Noop))
            .unwrap_err();
        assert_eq!(err, GrammarError::DuplicateCommand { path: "say".into() });

        let err = grammar
            .register(&["volunteer", "whois"], Command::new("whois"), "other", Arc::new(Noop))
            .unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateCommand { .. }));
    }

    #[test]
    fn test_empty_path_fails() {
        let mut grammar = grammar();
        assert_eq!(
            grammar.register(&[], Command::new("x"), "x", Arc::new(Noop)).unwrap_err(),
            GrammarError::EmptyPath
        );
    }

    #[test]
    fn test_each_command_registered_once() {
        let parser = grammar().build();
        let mut paths: Vec<String> = parser.paths().map(|p| p.join(" ")).collect();
        paths.sort();
        assert_eq!(paths, vec!["music", "say", "volunteer whois"]);
    }

    #[test]
    fn test_parse_typed_arguments() {
        let parser = grammar().build();
        let mut sink = Vec::new();
        match parser.parse(&tokens("say --voice en 'hello there'"), ctx(), &mut sink) {
            ParseOutcome::Invocation(invocation) => {
                assert_eq!(invocation.command(), "say");
                assert_eq!(invocation.string("voice").as_deref(), Some("en"));
                assert_eq!(invocation.string("text").as_deref(), Some("hello there"));
                assert_eq!(invocation.node.owner, "say");
                assert_eq!(invocation.context.sender, "alice");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn test_flags_and_optional_positionals() {
        let parser = grammar().build();
        let mut sink = Vec::new();
        match parser.parse(&tokens("music --remote"), ctx(), &mut sink) {
            ParseOutcome::Invocation(invocation) => {
                assert!(invocation.flag("remote"));
                assert_eq!(invocation.string("track"), None);
                assert!(!invocation.flag("missing"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_nested_command_resolves() {
        let parser = grammar().build();
        let mut sink = Vec::new();
        match parser.parse(&tokens("volunteer whois cook"), ctx(), &mut sink) {
            ParseOutcome::Invocation(invocation) => {
                assert_eq!(invocation.command(), "volunteer whois");
                assert_eq!(invocation.string("role").as_deref(), Some("cook"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_help_is_full_and_idempotent() {
        let parser = grammar().build();
        let mut first = Vec::new();
        let mut second = Vec::new();
        assert!(matches!(parser.parse(&tokens("help"), ctx(), &mut first), ParseOutcome::Abort));
        assert!(matches!(parser.parse(&tokens("help"), ctx(), &mut second), ParseOutcome::Abort));
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        for command in ["say", "music", "volunteer"] {
            assert!(first[0].contains(command), "help misses {command}: {}", first[0]);
        }
    }

    #[test]
    fn test_subcommand_help_flag_aborts() {
        let parser = grammar().build();
        let mut sink = Vec::new();
        assert!(matches!(parser.parse(&tokens("say --help"), ctx(), &mut sink), ParseOutcome::Abort));
        assert!(sink[0].contains("--voice"));
    }

    #[test]
    fn test_unknown_command_is_failure_with_usage() {
        let parser = grammar().build();
        let mut sink = Vec::new();
        match parser.parse(&tokens("dance"), ctx(), &mut sink) {
            ParseOutcome::Failure(failure) => {
                assert!(failure.message.contains("dance"), "{}", failure.message);
                assert!(failure.usage.starts_with("usage:"), "{}", failure.usage);
                assert_eq!(failure.usage.lines().count(), 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn test_missing_argument_is_failure() {
        let parser = grammar().build();
        let mut sink = Vec::new();
        match parser.parse(&tokens("say"), ctx(), &mut sink) {
            ParseOutcome::Failure(failure) => {
                assert!(failure.message.contains("<text>"), "{}", failure.message);
                assert!(failure.usage.contains("say"), "{}", failure.usage);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_empty_line_is_failure() {
        let parser = grammar().build();
        let mut sink = Vec::new();
        assert!(matches!(parser.parse(&[], ctx(), &mut sink), ParseOutcome::Failure(_)));
    }

    #[test]
    fn test_unbalanced_quotes() {
        let parser = grammar().build();
        let mut sink = Vec::new();
        match parser.parse_line("say 'oops", ctx(), &mut sink) {
            ParseOutcome::Failure(failure) => assert!(failure.message.contains("quotes")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
