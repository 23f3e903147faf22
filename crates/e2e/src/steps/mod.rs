//! Step execution engine
//!
//! Scenario steps are plain phrases. Each registered phrase may contain
//! `{string}`, `{int}` and `{float}` placeholders; a step's text is matched
//! against every phrase and the captured values are handed to the bound
//! handler together with the [`StepContext`].
//!
//! Handlers run strictly one after another. A handler receives the context
//! by `&mut` for the whole of its execution, so no two steps can touch the
//! session at the same time.

pub mod access;
pub mod deposit;
pub mod search;

use futures::future::BoxFuture;
use regex::Regex;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};
use crate::session::{Bootstrapper, Session};

pub type StepFuture<'a> = BoxFuture<'a, E2eResult<()>>;

/// A step handler: borrows the context for the duration of the step
pub type StepHandler = for<'a> fn(&'a mut StepContext, StepArgs) -> StepFuture<'a>;

/// A value captured from a step's text
#[derive(Debug, Clone, PartialEq)]
pub enum StepArg {
    Str(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for StepArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepArg::Str(s) => write!(f, "\"{s}\""),
            StepArg::Int(i) => write!(f, "{i}"),
            StepArg::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Positional arguments of one step invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepArgs(Vec<StepArg>);

impl StepArgs {
    pub fn new(args: Vec<StepArg>) -> Self {
        Self(args)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get(&self, index: usize) -> E2eResult<&StepArg> {
        self.0
            .get(index)
            .ok_or_else(|| E2eError::InvalidArgument(format!("missing step argument {index}")))
    }

    pub fn string(&self, index: usize) -> E2eResult<&str> {
        match self.get(index)? {
            StepArg::Str(s) => Ok(s),
            other => Err(E2eError::InvalidArgument(format!(
                "argument {index} is {other}, expected a string"
            ))),
        }
    }

    pub fn int(&self, index: usize) -> E2eResult<i64> {
        match self.get(index)? {
            StepArg::Int(i) => Ok(*i),
            other => Err(E2eError::InvalidArgument(format!(
                "argument {index} is {other}, expected an integer"
            ))),
        }
    }

    pub fn float(&self, index: usize) -> E2eResult<f64> {
        match self.get(index)? {
            StepArg::Float(x) => Ok(*x),
            StepArg::Int(i) => Ok(*i as f64),
            other => Err(E2eError::InvalidArgument(format!(
                "argument {index} is {other}, expected a number"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Str,
    Int,
    Float,
}

struct StepDefinition {
    phrase: String,
    pattern: Regex,
    params: Vec<ParamKind>,
    handler: StepHandler,
}

impl StepDefinition {
    fn compile(phrase: &str, handler: StepHandler) -> E2eResult<Self> {
        let placeholder = Regex::new(r"\{(string|int|float)\}")
            .map_err(|e| E2eError::InvalidArgument(e.to_string()))?;

        let mut source = String::from("^");
        let mut params = Vec::new();
        let mut last = 0;
        for caps in placeholder.captures_iter(phrase) {
            let Some(whole) = caps.get(0) else { continue };
            source.push_str(&regex::escape(&phrase[last..whole.start()]));
            let (group, kind) = match &caps[1] {
                "string" => (r#""([^"]*)""#, ParamKind::Str),
                "int" => (r"(-?\d+)", ParamKind::Int),
                _ => (r"(-?\d+(?:\.\d+)?)", ParamKind::Float),
            };
            source.push_str(group);
            params.push(kind);
            last = whole.end();
        }
        source.push_str(&regex::escape(&phrase[last..]));
        source.push('$');

        let pattern = Regex::new(&source)
            .map_err(|e| E2eError::InvalidArgument(format!("bad step phrase '{phrase}': {e}")))?;

        Ok(Self {
            phrase: phrase.to_string(),
            pattern,
            params,
            handler,
        })
    }

    fn matches(&self, text: &str) -> Option<E2eResult<StepArgs>> {
        let caps = self.pattern.captures(text)?;
        let parsed = self
            .params
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let raw = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
                match kind {
                    ParamKind::Str => Ok(StepArg::Str(raw.to_string())),
                    ParamKind::Int => raw.parse().map(StepArg::Int).map_err(|e| {
                        E2eError::InvalidArgument(format!("'{raw}' is not an integer: {e}"))
                    }),
                    ParamKind::Float => raw.parse().map(StepArg::Float).map_err(|e| {
                        E2eError::InvalidArgument(format!("'{raw}' is not a number: {e}"))
                    }),
                }
            })
            .collect::<E2eResult<Vec<_>>>()
            .map(StepArgs::new);
        Some(parsed)
    }
}

/// Phrase-to-handler bindings
#[derive(Default)]
pub struct StepRegistry {
    definitions: Vec<StepDefinition>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `phrase` to `handler`. Registering a phrase twice is an error.
    pub fn register(&mut self, phrase: &str, handler: StepHandler) -> E2eResult<()> {
        if self.definitions.iter().any(|d| d.phrase == phrase) {
            return Err(E2eError::DuplicateStep(phrase.to_string()));
        }
        self.definitions.push(StepDefinition::compile(phrase, handler)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.phrase.as_str())
    }

    /// Resolve step text to its handler and parsed arguments
    pub fn find(&self, text: &str) -> E2eResult<(StepHandler, StepArgs)> {
        let text = text.trim();
        let mut matched = self
            .definitions
            .iter()
            .filter_map(|d| d.matches(text).map(|args| (d, args)));

        let Some((definition, args)) = matched.next() else {
            return Err(E2eError::UnknownStep(text.to_string()));
        };
        if let Some((other, _)) = matched.next() {
            return Err(E2eError::UnknownStep(format!(
                "'{text}' is ambiguous: matches '{}' and '{}'",
                definition.phrase, other.phrase
            )));
        }

        debug!("Step '{}' bound to '{}'", text, definition.phrase);
        Ok((definition.handler, args?))
    }

    /// Run one step to completion against `ctx`
    pub async fn execute(&self, ctx: &mut StepContext, text: &str) -> E2eResult<()> {
        let (handler, args) = self.find(text)?;
        handler(ctx, args).await
    }
}

/// The registry with every built-in step bound
pub fn default_registry() -> E2eResult<StepRegistry> {
    let mut registry = StepRegistry::new();
    access::register(&mut registry)?;
    search::register(&mut registry)?;
    deposit::register(&mut registry)?;
    Ok(registry)
}

/// State threaded through every step of one scenario
pub struct StepContext {
    config: Arc<HarnessConfig>,
    bootstrapper: Arc<Bootstrapper>,
    session: Option<Session>,
}

impl StepContext {
    pub fn new(config: Arc<HarnessConfig>, bootstrapper: Arc<Bootstrapper>) -> Self {
        Self {
            config,
            bootstrapper,
            session: None,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The active session; steps before bootstrap fail with `Setup`.
    pub fn session(&mut self) -> E2eResult<&mut Session> {
        self.session.as_mut().ok_or_else(|| {
            E2eError::Setup("no browser session; the scenario must start with the wallet bootstrap step".to_string())
        })
    }

    /// Launch a fresh session on `network`, replacing any existing one.
    pub async fn bootstrap(&mut self, network: &str) -> E2eResult<()> {
        if let Some(previous) = self.session.take() {
            warn!("Replacing existing browser session");
            previous.teardown().await?;
        }
        let seed: Option<&SecretString> = self.config.seed.as_ref();
        let session = self.bootstrapper.launch(network, seed).await?;
        self.session = Some(session);
        Ok(())
    }

    /// Close the browser, if one was launched
    pub async fn teardown(&mut self) -> E2eResult<()> {
        match self.session.take() {
            Some(session) => session.teardown().await,
            None => Ok(()),
        }
    }

    /// Screenshot of the focused tab, when a session exists
    pub async fn screenshot(&self) -> Option<E2eResult<Vec<u8>>> {
        match &self.session {
            Some(session) => Some(session.screenshot().await),
            None => None,
        }
    }
}
