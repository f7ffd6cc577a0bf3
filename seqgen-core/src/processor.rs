//! Message classifier and resolver
//!
//! Every message record goes through the same steps: resolve the names,
//! check the semantic rules, pick the caller's thread, find the caller's
//! activation on that thread's stack (answering every newer call on the way),
//! find or create the callee's activation, then emit the classified message
//! and either answer it at once or push its answer.
//!
//! The stack scan is what turns a flat list of lines into nested calls: a
//! line from `x` closes every pending call above the most recent activation
//! of `x`. `level` picks an older activation of `x` instead, and a caller
//! mnemonic picks one exact activation.

use crate::diagram::{Diagram, Outcome};
use crate::error::{GenerateError, SemanticRule, StructuralError};
use crate::lifeline::LifelineId;
use crate::message::{BroadcastPosition, Message, MessageId, MessageKind};
use crate::record::MessageRecord;
use crate::thread::{Answer, Thread, ThreadId, ThreadStatus};

/// Threads chosen for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ThreadPlan {
    /// Thread the caller runs on
    caller: ThreadId,
    /// The callee starts a fresh thread
    spawn: bool,
}

pub(crate) struct MessageProcessor<'a> {
    diagram: &'a mut Diagram,
    record: &'a MessageRecord,
    outcome: Outcome,
}

impl<'a> MessageProcessor<'a> {
    pub(crate) fn new(diagram: &'a mut Diagram, record: &'a MessageRecord) -> Self {
        Self {
            diagram,
            record,
            outcome: Outcome::default(),
        }
    }

    pub(crate) fn process(mut self) -> Result<Outcome, GenerateError> {
        let record = self.record;
        tracing::debug!(
            caller = %record.caller,
            callees = ?record.callees,
            text = %record.text,
            position = record.position,
            "processing message"
        );

        let caller_root = self.resolve_caller_name()?;
        let callee_roots = self.resolve_callee_names()?;
        self.check_semantics(caller_root, &callee_roots)?;
        let plan = self.resolve_threads(caller_root, &callee_roots)?;
        // Active objects and constructed thread owners spawn without `>`
        if record.answer.is_some() && plan.spawn {
            return Err(self.semantic(SemanticRule::AnswerOnSpawn));
        }

        if record.returning {
            self.send_return(caller_root, &callee_roots, plan)?;
            return Ok(self.outcome);
        }

        let caller = match caller_root {
            Some(root) => Some(self.find_caller(root, plan.caller)?),
            None => None,
        };

        if self.is_broadcast(&callee_roots) {
            self.send_broadcast(caller, &callee_roots, plan)?;
        } else {
            match callee_roots.first() {
                None => self.send_primitive(caller, plan)?,
                Some(&callee_root) => self.send_call(caller, callee_root, plan)?,
            }
        }
        Ok(self.outcome)
    }

    fn semantic(&self, rule: SemanticRule) -> GenerateError {
        GenerateError::semantic(rule, self.record.position)
    }

    fn name(&self, id: LifelineId) -> String {
        self.diagram.lifelines.get(id).name.clone()
    }

    fn is_broadcast(&self, callee_roots: &[LifelineId]) -> bool {
        self.record.broadcast || callee_roots.len() > 1
    }

    fn lookup(&self, name: &str) -> Result<LifelineId, GenerateError> {
        self.diagram
            .lifelines
            .root(name)
            .ok_or_else(|| GenerateError::NotFound {
                name: name.to_string(),
                position: self.record.position,
            })
    }

    fn resolve_caller_name(&self) -> Result<Option<LifelineId>, GenerateError> {
        if self.record.has_no_caller() {
            return Ok(None);
        }
        self.lookup(&self.record.caller).map(Some)
    }

    fn resolve_callee_names(&self) -> Result<Vec<LifelineId>, GenerateError> {
        self.record
            .callees
            .iter()
            .map(|name| self.lookup(name))
            .collect()
    }

    fn check_semantics(
        &self,
        caller_root: Option<LifelineId>,
        callee_roots: &[LifelineId],
    ) -> Result<(), GenerateError> {
        let record = self.record;
        let lifelines = &self.diagram.lifelines;

        match caller_root {
            None => {
                if !record.spawns || callee_roots.len() != 1 {
                    return Err(self.semantic(SemanticRule::NoCallerWithoutSpawn));
                }
            }
            Some(root) => {
                let caller = lifelines.get(root);
                if !caller.alive {
                    return Err(self.semantic(SemanticRule::NotAlive(caller.name.clone())));
                }
                if caller.always_active && callee_roots.contains(&root) {
                    return Err(self.semantic(SemanticRule::ActorSelfMessage(caller.name.clone())));
                }
                if record.answer.is_some() && caller.always_active {
                    return Err(
                        self.semantic(SemanticRule::AnswerToAlwaysActive(caller.name.clone()))
                    );
                }
            }
        }

        if record.answer.is_some() && record.spawns {
            return Err(self.semantic(SemanticRule::AnswerOnSpawn));
        }

        if self.is_broadcast(callee_roots) {
            if record.answer.is_some() {
                return Err(self.semantic(SemanticRule::AnswerOnBroadcast));
            }
            for (i, id) in callee_roots.iter().enumerate() {
                if Some(*id) == caller_root {
                    return Err(self.semantic(SemanticRule::BroadcastToCaller(self.name(*id))));
                }
                if callee_roots[..i].contains(id) {
                    return Err(
                        self.semantic(SemanticRule::BroadcastRepeatedCallee(self.name(*id)))
                    );
                }
            }
            if callee_roots.len() < 2 {
                return Err(self.semantic(SemanticRule::BroadcastTooFewCallees));
            }
        }

        for id in callee_roots {
            let callee = lifelines.get(*id);
            if record.answer.is_some() && callee.always_active {
                return Err(
                    self.semantic(SemanticRule::AnswerFromAlwaysActive(callee.name.clone()))
                );
            }
            if record.is_new {
                if callee.alive {
                    return Err(self.semantic(SemanticRule::AlreadyCreated(callee.name.clone())));
                }
            } else if !callee.alive {
                return Err(self.semantic(SemanticRule::NotAlive(callee.name.clone())));
            }
            if record.destroys && lifelines.is_active(*id) {
                return Err(self.semantic(SemanticRule::DestroyActive(callee.name.clone())));
            }
        }
        Ok(())
    }

    fn resolve_threads(
        &self,
        caller_root: Option<LifelineId>,
        callee_roots: &[LifelineId],
    ) -> Result<ThreadPlan, GenerateError> {
        let record = self.record;
        let broadcast = self.is_broadcast(callee_roots);

        if !self.diagram.config.multi_thread {
            if record.spawns || caller_root.is_none() {
                return Err(self.semantic(SemanticRule::MultiThreadOnly("spawning messages")));
            }
            if record.thread.is_some() {
                return Err(self.semantic(SemanticRule::MultiThreadOnly("thread numbers")));
            }
            if broadcast {
                return Err(self.semantic(SemanticRule::MultiThreadOnly("broadcasts")));
            }
            return Ok(ThreadPlan {
                caller: ThreadId::MAIN,
                spawn: false,
            });
        }

        // Only an ordinary call to a participant that can run on its own may spawn
        let spawnable = match callee_roots.first() {
            Some(id) if !broadcast && !record.destroys && !record.returning => {
                !self.diagram.lifelines.get(*id).always_active
            }
            _ => false,
        };
        let callee_spawns = spawnable
            && (record.spawns
                || (!record.returns_instantly && self.callee_runs_on_own_thread(callee_roots[0])));

        let Some(root) = caller_root else {
            return Ok(ThreadPlan {
                caller: ThreadId::ACTOR,
                spawn: spawnable,
            });
        };

        if self.diagram.lifelines.get(root).always_active {
            return Ok(ThreadPlan {
                caller: ThreadId::ACTOR,
                spawn: callee_spawns || (spawnable && !record.returns_instantly),
            });
        }

        let caller = if let Some(mnemonic) = &record.caller_mnemonic {
            let id = self.mnemonic_target(root, mnemonic)?;
            self.diagram.lifelines.get(id).thread
        } else if let Some(number) = record.thread {
            self.explicit_thread(number)?
        } else {
            self.active_thread(root)?
        };

        Ok(ThreadPlan {
            caller,
            spawn: callee_spawns,
        })
    }

    fn callee_runs_on_own_thread(&self, root: LifelineId) -> bool {
        let callee = self.diagram.lifelines.get(root);
        callee.active_object || (self.record.is_new && callee.has_thread)
    }

    fn explicit_thread(&self, number: u32) -> Result<ThreadId, GenerateError> {
        let id = i32::try_from(number)
            .map(ThreadId)
            .map_err(|_| self.semantic(SemanticRule::NoSuchThread(number)))?;
        match self.diagram.threads.get(id) {
            None => Err(self.semantic(SemanticRule::NoSuchThread(number))),
            Some(thread) if thread.is_dead() => Err(self.semantic(SemanticRule::ThreadDead(id.0))),
            Some(_) => Ok(id),
        }
    }

    /// The single thread `root` is active on
    fn active_thread(&self, root: LifelineId) -> Result<ThreadId, GenerateError> {
        let lifelines = &self.diagram.lifelines;
        let mut threads: Vec<ThreadId> = lifelines
            .attached(root)
            .into_iter()
            .map(|id| lifelines.get(id))
            .filter(|node| node.active)
            .map(|node| node.thread)
            .collect();
        threads.sort();
        threads.dedup();

        match threads.as_slice() {
            [thread] => Ok(*thread),
            [] => {
                let main_is_new = self
                    .diagram
                    .threads
                    .get(ThreadId::MAIN)
                    .is_some_and(|t| t.status == ThreadStatus::New);
                if main_is_new {
                    Ok(ThreadId::MAIN)
                } else {
                    Err(self.semantic(SemanticRule::NotActive(self.name(root))))
                }
            }
            _ => Err(self.semantic(SemanticRule::ThreadAmbiguous(self.name(root)))),
        }
    }

    fn mnemonic_target(&self, root: LifelineId, mnemonic: &str) -> Result<LifelineId, GenerateError> {
        let id = self
            .diagram
            .mnemonics
            .get(mnemonic)
            .copied()
            .ok_or_else(|| self.semantic(SemanticRule::UnknownMnemonic(mnemonic.to_string())))?;
        if self.diagram.lifelines.get(id).root != root {
            return Err(self.semantic(SemanticRule::MnemonicMismatch {
                mnemonic: mnemonic.to_string(),
                name: self.name(root),
            }));
        }
        Ok(id)
    }

    /// Find the activation of `root` that sends the message on `thread`,
    /// answering every newer pending call
    fn find_caller(&mut self, root: LifelineId, thread: ThreadId) -> Result<LifelineId, GenerateError> {
        if self.diagram.lifelines.get(root).always_active {
            if !self.diagram.config.multi_thread {
                // An actor line starts a new interaction on the only thread
                let closed = self.diagram.reset_thread(ThreadId::MAIN, self.record.position)?;
                self.outcome.implicit_returns.extend(closed);
            }
            return Ok(root);
        }

        let target = match &self.record.caller_mnemonic {
            Some(mnemonic) => Some(self.mnemonic_target(root, mnemonic)?),
            None => None,
        };
        let lifelines = &self.diagram.lifelines;
        let matches = |id: LifelineId| match target {
            Some(target) => id == target,
            None => lifelines.get(id).root == root,
        };

        let state = self
            .diagram
            .threads
            .get(thread)
            .ok_or(StructuralError::MissingThread(thread.0))?;
        if state.is_dead() {
            return Err(self.semantic(SemanticRule::ThreadDead(thread.0)));
        }

        if state.is_empty() && state.first_caller.is_none() {
            let id = self.diagram.activation_for(root, None, thread);
            let y = self.diagram.cursor;
            self.diagram.lifelines.set_active(id, true, y);
            if let Some(state) = self.diagram.threads.get_mut(thread) {
                state.start(id);
            }
            tracing::trace!(name = %self.name(root), thread = %thread, "first activation of thread");
            return Ok(id);
        }

        let level = self.record.level;
        let mut occurred = 0;
        let mut found = None;
        for (depth, answer) in state.pending().enumerate() {
            if matches(answer.callee) {
                if occurred == level {
                    found = Some((depth, answer.callee));
                    break;
                }
                occurred += 1;
            }
        }

        let (pops, caller) = match (found, state.first_caller) {
            (Some(hit), _) => hit,
            (None, Some(first)) if matches(first) && occurred == level => (state.len(), first),
            _ => return Err(self.semantic(SemanticRule::NotActive(self.name(root)))),
        };

        let closed = self.diagram.unwind(thread, pops, self.record.position)?;
        self.outcome.implicit_returns.extend(closed);
        Ok(caller)
    }

    /// Find or create the activation of `root` that receives the message
    fn find_callee(
        &mut self,
        root: LifelineId,
        thread: ThreadId,
        caller_position: Option<usize>,
    ) -> Result<LifelineId, GenerateError> {
        let id = self.diagram.activation_for(root, caller_position, thread);
        if let Some(mnemonic) = &self.record.callee_mnemonic {
            if self.diagram.mnemonics.contains_key(mnemonic) {
                return Err(self.semantic(SemanticRule::MnemonicInUse(mnemonic.clone())));
            }
            self.diagram.mnemonics.insert(mnemonic.clone(), id);
            self.diagram.lifelines.get_mut(id).mnemonic = Some(mnemonic.clone());
        }
        Ok(id)
    }

    fn message(
        &self,
        kind: MessageKind,
        caller: Option<LifelineId>,
        callee: Option<LifelineId>,
        thread: ThreadId,
        y: f64,
    ) -> Message {
        Message {
            id: MessageId(0),
            kind,
            caller,
            callee,
            thread,
            text: self.record.text.clone(),
            y,
            spawns: false,
            destroys: false,
            returns_instantly: self.record.returns_instantly,
            position: Some(self.record.position),
        }
    }

    fn send_call(
        &mut self,
        caller: Option<LifelineId>,
        callee_root: LifelineId,
        plan: ThreadPlan,
    ) -> Result<(), GenerateError> {
        let record = self.record;
        if record.destroys {
            return self.send_destroy(caller, callee_root, plan);
        }

        let caller_always_active = caller.is_some_and(|c| self.diagram.lifelines.get(c).always_active);
        let callee_always_active = self.diagram.lifelines.get(callee_root).always_active;
        let constructing = !self.diagram.lifelines.get(callee_root).alive;
        let caller_position = caller.map(|c| self.diagram.lifelines.get(c).position);

        let callee_thread = if plan.spawn {
            self.diagram.threads.spawn()?
        } else {
            plan.caller
        };
        let callee = self.find_callee(callee_root, callee_thread, caller_position)?;

        let kind = match caller {
            None => MessageKind::Spawn,
            Some(_) if constructing => MessageKind::Constructor,
            Some(c) if self.diagram.lifelines.get(c).root == callee_root => MessageKind::SelfCall,
            Some(_) => MessageKind::Forward,
        };

        let y = self.diagram.advance();
        if constructing {
            self.diagram.lifelines.bring_to_life(callee_root, y);
        }
        if !callee_always_active {
            self.diagram.lifelines.get_mut(callee).thread = callee_thread;
            self.diagram.lifelines.set_active(callee, true, y);
        }

        let mut message = self.message(kind, caller, Some(callee), callee_thread, y);
        message.spawns = plan.spawn;
        let id = self.diagram.push_message(message);
        self.outcome.messages.push(id);

        let starts_thread = !callee_always_active
            && (plan.spawn || (caller_always_active && !record.returns_instantly));
        if starts_thread {
            self.diagram
                .threads
                .get_mut(callee_thread)
                .ok_or(StructuralError::MissingThread(callee_thread.0))?
                .start(callee);
        }

        let implies_answer = !callee_always_active
            && !plan.spawn
            && (record.returns_instantly || !caller_always_active);
        if let (Some(caller), true) = (caller, implies_answer) {
            if !caller_always_active {
                self.diagram.lifelines.get_mut(caller).waiting = true;
            }
            let answer = Answer {
                call: id,
                caller,
                callee,
                thread: callee_thread,
                label: record.answer.clone(),
            };
            if record.returns_instantly {
                let returned = self.diagram.send_answer(answer, false, None)?;
                self.outcome.messages.push(returned);
            } else {
                self.diagram
                    .threads
                    .get_mut(callee_thread)
                    .ok_or(StructuralError::MissingThread(callee_thread.0))?
                    .push(answer);
            }
        }

        self.diagram.current_thread = callee_thread;
        Ok(())
    }

    fn send_destroy(
        &mut self,
        caller: Option<LifelineId>,
        callee_root: LifelineId,
        plan: ThreadPlan,
    ) -> Result<(), GenerateError> {
        let y = self.diagram.advance();
        let mut message = self.message(MessageKind::Forward, caller, Some(callee_root), plan.caller, y);
        message.destroys = true;
        let id = self.diagram.push_message(message);
        self.diagram.lifelines.terminate(callee_root, y, true);
        self.outcome.messages.push(id);
        self.diagram.current_thread = plan.caller;
        Ok(())
    }

    fn send_primitive(&mut self, caller: Option<LifelineId>, plan: ThreadPlan) -> Result<(), GenerateError> {
        let y = self.diagram.advance();
        let message = self.message(MessageKind::Primitive, caller, None, plan.caller, y);
        let id = self.diagram.push_message(message);
        self.outcome.messages.push(id);
        self.diagram.current_thread = plan.caller;

        if self.diagram.config.multi_thread && self.record.is_stop() && plan.caller != ThreadId::ACTOR {
            let closed = self.diagram.stop_thread(plan.caller)?;
            self.outcome.implicit_returns.extend(closed);
        }
        Ok(())
    }

    /// Fan-out: every receiver gets a signal that is over at once. A `new`
    /// broadcast constructs every receiver, a `destroy` broadcast ends them.
    fn send_broadcast(
        &mut self,
        caller: Option<LifelineId>,
        callee_roots: &[LifelineId],
        plan: ThreadPlan,
    ) -> Result<(), GenerateError> {
        let caller_position = caller.map(|c| self.diagram.lifelines.get(c).position);
        let thread = plan.caller;
        let destroys = self.record.destroys;
        let y = self.diagram.advance();

        let mut activations = Vec::with_capacity(callee_roots.len());
        for (i, root) in callee_roots.iter().enumerate() {
            let kind = MessageKind::Broadcast {
                position: BroadcastPosition::of(i, callee_roots.len()),
                receivers: callee_roots.to_vec(),
            };

            if destroys {
                let mut message = self.message(kind, caller, Some(*root), thread, y);
                message.destroys = true;
                let id = self.diagram.push_message(message);
                self.outcome.messages.push(id);
                self.diagram.lifelines.terminate(*root, y, true);
                continue;
            }

            if self.record.is_new {
                self.diagram.lifelines.bring_to_life(*root, y);
            }
            let callee = self.diagram.activation_for(*root, caller_position, thread);
            if !self.diagram.lifelines.get(callee).always_active {
                self.diagram.lifelines.get_mut(callee).thread = thread;
                self.diagram.lifelines.set_active(callee, true, y);
            }
            let message = self.message(kind, caller, Some(callee), thread, y);
            let id = self.diagram.push_message(message);
            self.outcome.messages.push(id);
            activations.push(callee);
        }

        if destroys {
            self.diagram.current_thread = thread;
            return Ok(());
        }

        let end = self.diagram.extend(self.diagram.config.row_height / 2.0);
        for callee in activations {
            self.diagram.release(callee, end)?;
        }
        self.diagram.current_thread = thread;
        Ok(())
    }

    /// Explicit return: must answer the most recent pending call
    fn send_return(
        &mut self,
        caller_root: Option<LifelineId>,
        callee_roots: &[LifelineId],
        plan: ThreadPlan,
    ) -> Result<(), GenerateError> {
        let (Some(root), [receiver]) = (caller_root, callee_roots) else {
            return Err(self.semantic(SemanticRule::ReturnWithoutCallee));
        };
        let target = match &self.record.caller_mnemonic {
            Some(mnemonic) => Some(self.mnemonic_target(root, mnemonic)?),
            None => None,
        };

        let lifelines = &self.diagram.lifelines;
        let matches = self
            .diagram
            .threads
            .get(plan.caller)
            .and_then(Thread::top)
            .is_some_and(|top| {
                let sender_matches = match target {
                    Some(target) => top.callee == target,
                    None => lifelines.get(top.callee).root == root,
                };
                sender_matches && lifelines.get(top.caller).root == *receiver
            });
        if !matches {
            return Err(self.semantic(SemanticRule::ReturnMismatch {
                caller: self.name(*receiver),
                callee: self.name(root),
            }));
        }

        let mut answer = self
            .diagram
            .threads
            .get_mut(plan.caller)
            .and_then(Thread::pop)
            .ok_or(StructuralError::MissingThread(plan.caller.0))?;
        if !self.record.text.is_empty() {
            answer.label = Some(self.record.text.clone());
        }
        let id = self
            .diagram
            .send_answer(answer, false, Some(self.record.position))?;
        self.outcome.messages.push(id);
        self.diagram.current_thread = plan.caller;
        Ok(())
    }
}

impl Diagram {
    /// Activation of `root` to use on `thread`: the root itself unless it is
    /// busy, in which case a nested activation is created
    pub(crate) fn activation_for(
        &mut self,
        root: LifelineId,
        caller_position: Option<usize>,
        thread: ThreadId,
    ) -> LifelineId {
        if self.lifelines.get(root).always_active {
            return root;
        }
        let id = if self.lifelines.is_active(root) {
            self.lifelines.add_activity(root, caller_position, thread)
        } else {
            root
        };
        self.lifelines.get_mut(id).thread = thread;
        id
    }

    /// Stop `id` at `y`, forget its mnemonic and detach it if nested
    pub(crate) fn release(&mut self, id: LifelineId, y: f64) -> Result<(), StructuralError> {
        if let Some(mnemonic) = self.lifelines.get(id).mnemonic.clone() {
            if self.mnemonics.get(&mnemonic) == Some(&id) {
                self.mnemonics.remove(&mnemonic);
            }
        }
        self.lifelines.finish(id, y);
        if !self.lifelines.get(id).is_root() {
            self.lifelines.dispose(id)?;
        }
        Ok(())
    }

    /// Draw the return arrow of `answer` and close the answering activation
    pub(crate) fn send_answer(
        &mut self,
        answer: Answer,
        implicit: bool,
        position: Option<usize>,
    ) -> Result<MessageId, StructuralError> {
        let y = self.advance();
        let id = self.push_message(Message {
            id: MessageId(0),
            kind: MessageKind::Answer {
                call: answer.call,
                implicit,
            },
            caller: Some(answer.callee),
            callee: Some(answer.caller),
            thread: answer.thread,
            text: answer.label.clone().unwrap_or_default(),
            y,
            spawns: false,
            destroys: false,
            returns_instantly: false,
            position,
        });
        self.release(answer.callee, y)?;
        self.lifelines.get_mut(answer.caller).waiting = false;
        tracing::debug!(
            call = answer.call.0,
            from = %self.lifelines.get(answer.callee).name,
            to = %self.lifelines.get(answer.caller).name,
            implicit,
            "answer"
        );
        Ok(id)
    }

    /// Answer the `count` most recent calls on `thread`
    pub(crate) fn unwind(
        &mut self,
        thread: ThreadId,
        count: usize,
        position: usize,
    ) -> Result<Vec<MessageId>, GenerateError> {
        let mut closed = Vec::with_capacity(count);
        for _ in 0..count {
            let state = self
                .threads
                .get_mut(thread)
                .ok_or(StructuralError::MissingThread(thread.0))?;
            if self.config.explicit_returns {
                let receiver = state
                    .top()
                    .map(|a| self.lifelines.get(a.caller).name.clone())
                    .unwrap_or_default();
                return Err(GenerateError::semantic(
                    SemanticRule::ExplicitAnswerRequired(receiver),
                    position,
                ));
            }
            let Some(answer) = state.pop() else {
                break;
            };
            closed.push(self.send_answer(answer, true, None)?);
        }
        Ok(closed)
    }

    /// Answer everything on `thread` and close its first activation
    fn drain(&mut self, thread: ThreadId, position: usize) -> Result<Vec<MessageId>, GenerateError> {
        let pending = self.threads.get(thread).map_or(0, Thread::len);
        let closed = self.unwind(thread, pending, position)?;
        let first = self
            .threads
            .get_mut(thread)
            .and_then(|t| t.first_caller.take());
        if let Some(first) = first {
            let y = self.cursor;
            self.release(first, y)?;
        }
        Ok(closed)
    }

    /// Close the thread so that a new interaction can start on it
    pub(crate) fn reset_thread(
        &mut self,
        thread: ThreadId,
        position: usize,
    ) -> Result<Vec<MessageId>, GenerateError> {
        let closed = self.drain(thread, position)?;
        if let Some(state) = self.threads.get_mut(thread) {
            state.status = ThreadStatus::New;
        }
        Ok(closed)
    }

    /// `stop`: finish the thread for good
    pub(crate) fn stop_thread(&mut self, thread: ThreadId) -> Result<Vec<MessageId>, GenerateError> {
        let position = self.messages.last().and_then(|m| m.position).unwrap_or(0);
        let closed = self.drain(thread, position)?;
        if let Some(state) = self.threads.get_mut(thread) {
            state.status = ThreadStatus::Dead;
        }
        tracing::trace!(thread = %thread, "thread stopped");
        Ok(closed)
    }

    /// End of input: answer everything, deactivate and terminate lifelines
    pub(crate) fn close_all(&mut self) -> Result<(), GenerateError> {
        for thread in self.threads.ids() {
            if self.config.explicit_returns {
                if let Some(top) = self.threads.get(thread).and_then(Thread::top) {
                    let position = self.messages[top.call.0].position.unwrap_or(0);
                    let receiver = self.lifelines.get(top.caller).name.clone();
                    return Err(GenerateError::semantic(
                        SemanticRule::ExplicitAnswerRequired(receiver),
                        position,
                    ));
                }
            }
            let pending = self.threads.get(thread).map_or(0, Thread::len);
            self.unwind(thread, pending, 0)?;
        }

        let end = self.advance();
        let mut active: Vec<(usize, LifelineId)> = self
            .lifelines
            .iter()
            .filter(|node| node.active && !node.always_active && !node.disposed)
            .map(|node| (node.depth, node.id))
            .collect();
        // Innermost first, so that every disposal finds its parent attached
        active.sort_by(|a, b| b.cmp(a));
        for (_, id) in active {
            self.release(id, end)?;
        }
        for thread in self.threads.ids() {
            if let Some(state) = self.threads.get_mut(thread) {
                state.first_caller = None;
                state.status = ThreadStatus::Dead;
            }
        }

        let roots: Vec<LifelineId> = self.lifelines.roots().map(|l| l.id).collect();
        for root in roots {
            let lifeline = self.lifelines.get(root);
            if lifeline.always_active {
                self.lifelines.close(root, end);
            } else if lifeline.alive {
                self.lifelines.terminate(root, end, false);
            }
        }
        Ok(())
    }
}
