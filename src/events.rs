//! Priority-ordered event chains around a script kind
//!
//! Hosts register named event scripts with an integer priority; at freeze
//! time the chain is stably sorted and split at zero into a before run and
//! an after run. Containers parsed afterwards couple the main script with
//! the shared frozen chains.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use itertools::Itertools;

use crate::consts::*;
use crate::container::{ContainerEvents, EventGroup};
use crate::error::{CompileError, ConfigError};
use crate::global::ScriptGlobal;
use crate::parser::{ArgsDecl, OutsDecl, Parser};

struct PendingEvent {
    name: String,
    key: i64,
    source: String,
}

/// A script-kind declaration carrying zero or more flanking event scripts.
pub struct EventsParser<Out, Args> {
    parser: Parser<Out, Args>,
    pending: Vec<PendingEvent>,
    group: Option<Arc<EventGroup>>,
}

impl<Out: OutsDecl, Args: ArgsDecl> EventsParser<Out, Args> {
    /// Declare an events-typed script kind.
    pub fn new(
        global: &Arc<ScriptGlobal>,
        name: &str,
        output_names: &[&str],
        input_names: &[&str],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            parser: Parser::new(global, name, output_names, input_names)?,
            pending: Vec::new(),
            group: None,
        })
    }

    /// Register a named event script. Priorities are accepted in
    /// `[-100, 100]` and stored pre-scaled; registration order breaks ties
    /// through the stable freeze sort.
    pub fn add_event(&mut self, name: &str, priority: i64, source: &str) -> Result<(), ConfigError> {
        if self.group.is_some() {
            return Err(ConfigError::EventsFrozen(self.parser.name().to_string()));
        }

        if !(-EVENT_OFFSET_MAX..=EVENT_OFFSET_MAX).contains(&priority) {
            return Err(ConfigError::EventPriorityRange(priority));
        }

        self.pending.push(PendingEvent {
            name: name.to_string(),
            key: priority * EVENT_OFFSET_SCALE,
            source: source.to_string(),
        });

        Ok(())
    }

    /// Compile the registered events and split them into the before and
    /// after chains. Must run before any [`Self::parse`]; further
    /// registration is rejected afterwards.
    pub fn freeze(&mut self) -> Result<(), CompileError> {
        let pending = std::mem::take(&mut self.pending);

        let (before, after): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .sorted_by_key(|event| event.key)
            .partition(|event| event.key < 0);

        let mut group = EventGroup::default();
        for event in before {
            group.before.push(self.parser.parse(&event.name, &event.source)?);
        }
        for event in after {
            group.after.push(self.parser.parse(&event.name, &event.source)?);
        }

        tracing::debug!(
            parser = self.parser.name(),
            before = group.before.len(),
            after = group.after.len(),
            "event chains frozen"
        );

        self.group = Some(Arc::new(group));

        Ok(())
    }

    fn group(&self) -> Arc<EventGroup> {
        self.group
            .as_ref()
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::new(EventGroup::default()))
    }

    /// Compile a main script coupled with the frozen event chains.
    pub fn parse(&self, parent: &str, source: &str) -> Result<ContainerEvents, CompileError> {
        let main = self.parser.parse(parent, source)?;

        Ok(ContainerEvents::new(main, self.group()))
    }

    /// Compile with the default-script fallback, coupled with the frozen
    /// event chains.
    pub fn parse_or_default(&self, parent: &str, source: &str) -> ContainerEvents {
        ContainerEvents::new(self.parser.parse_or_default(parent, source), self.group())
    }

    /// The wrapped typed parser.
    pub fn parser(&self) -> &Parser<Out, Args> {
        &self.parser
    }
}

impl<Out, Args> Deref for EventsParser<Out, Args> {
    type Target = Parser<Out, Args>;

    fn deref(&self) -> &Parser<Out, Args> {
        &self.parser
    }
}

impl<Out, Args> DerefMut for EventsParser<Out, Args> {
    fn deref_mut(&mut self) -> &mut Parser<Out, Args> {
        &mut self.parser
    }
}
