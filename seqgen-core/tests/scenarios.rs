use pretty_assertions::assert_eq;
use seqgen_core::{
    generate, generate_with, read, BroadcastPosition, Config, Diagram, Drawable, GenerateError,
    GenerationFailure, LifelineId, Marker, MessageId, MessageKind, MessageRecord, ObjectRecord, Outcome, Record,
    ReserveSpace, SemanticRule, StructuralError, StructureHook,
};

fn run(source: &str, config: &Config) -> Result<Diagram, GenerationFailure> {
    generate(&read(source).unwrap(), config)
}

fn rule(result: Result<Diagram, GenerationFailure>) -> SemanticRule {
    match result.unwrap_err().error {
        GenerateError::Semantic { rule, .. } => rule,
        other => panic!("Expected a semantic error, got {:?}", other),
    }
}

/// Feed records one by one, keeping every outcome
fn step(source: &str, config: &Config) -> (Diagram, Vec<Outcome>) {
    let mut diagram = Diagram::new(config.clone());
    let mut outcomes = Vec::new();
    for record in read(source).unwrap() {
        match record {
            Record::Object(object) => {
                diagram.declare(&object).unwrap();
            }
            Record::EndOfObjects => diagram.end_declarations(),
            Record::Message(message) => outcomes.push(diagram.process(&message).unwrap()),
            Record::Marker { marker, position } => {
                diagram.place_marker(&marker, position, &mut ReserveSpace)
            }
        }
    }
    (diagram, outcomes)
}

fn name(diagram: &Diagram, id: Option<LifelineId>) -> &str {
    id.map(|id| diagram.lifeline(id).name.as_str()).unwrap_or("")
}

fn multi() -> Config {
    Config::default().with_multi_thread(true)
}

#[test]
fn scenario_a_call_gets_implicit_answer() {
    let diagram = run("a:A\nb:B\n\na:b.foo()\n", &Config::default()).unwrap();
    let messages = diagram.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind, MessageKind::Forward);
    assert_eq!(messages[0].text, "foo()");
    assert_eq!(
        messages[1].kind,
        MessageKind::Answer {
            call: MessageId(0),
            implicit: true
        }
    );
    assert_eq!(name(&diagram, messages[1].caller), "b");
    assert_eq!(name(&diagram, messages[1].callee), "a");
    assert!(messages[0].y < messages[1].y);

    for participant in ["a", "b"] {
        let lifeline = diagram.lifeline_by_name(participant).unwrap();
        assert!(!lifeline.active, "{} should end inactive", participant);
    }
}

#[test]
fn scenario_b_constructor_then_already_created() {
    let diagram = run("a:A\n/b:B\n\na:b.new()\n", &Config::default()).unwrap();
    assert_eq!(diagram.messages()[0].kind, MessageKind::Constructor);
    let b = diagram.lifeline_by_name("b").unwrap();
    assert_eq!(b.birth, Some(diagram.messages()[0].y));

    let (diagram, _) = step("a:A\n/b:B\n\na:b.new()\n", &Config::default());
    assert!(diagram.lifeline_by_name("b").unwrap().alive);

    let again = run("a:A\n/b:B\n\na:b.new()\na:b.new()\n", &Config::default());
    assert_eq!(rule(again), SemanticRule::AlreadyCreated("b".to_string()));
}

#[test]
fn scenario_c_active_object_runs_on_own_thread() {
    let (diagram, _) = step("a:A\nb:B[v]\nc:C\n\na:b.foo()\na:c.bar()\n", &multi());
    let messages = diagram.messages();
    let a = diagram.lifeline_by_name("a").unwrap();

    assert!(messages[0].spawns);
    assert_ne!(messages[0].thread, a.thread);
    assert_eq!(diagram.lifeline_by_name("b").unwrap().thread, messages[0].thread);

    // The second call needs no thread number: a is only active on its own thread
    assert_eq!(name(&diagram, messages[1].callee), "c");
    assert_eq!(messages[1].thread, a.thread);
    assert!(!messages[1].spawns);
}

#[test]
fn scenario_d_broadcast_fans_out() {
    let diagram = run("a:A\nb:B\nc:C\n\na:b,c.go()\n", &multi()).unwrap();
    let messages = diagram.messages();
    assert_eq!(messages.len(), 2);
    let positions: Vec<_> = messages
        .iter()
        .map(|m| match &m.kind {
            MessageKind::Broadcast { position, receivers } => {
                assert_eq!(receivers.len(), 2);
                *position
            }
            other => panic!("Expected broadcast, got {:?}", other),
        })
        .collect();
    assert_eq!(positions, vec![BroadcastPosition::First, BroadcastPosition::Last]);
    assert!(messages.iter().all(|m| m.text == "go()" && !m.spawns));
    assert_eq!(messages[0].y, messages[1].y);
    assert!(messages.iter().all(|m| !m.is_answer()));

    let from_actor = run("u:Actor\nb:B\nc:C\n\nu:b,c.go()\n", &multi()).unwrap();
    assert!(from_actor.messages().iter().all(|m| !m.spawns));
}

#[test]
fn broadcast_rules() {
    let objects = "a:A\nb:B\nc:C\n\n";
    let case = |line: &str, config: &Config| rule(run(&format!("{}{}\n", objects, line), config));

    assert_eq!(
        case("a:b,b.go", &multi()),
        SemanticRule::BroadcastRepeatedCallee("b".to_string())
    );
    assert_eq!(
        case("a:a,b.go", &multi()),
        SemanticRule::BroadcastToCaller("a".to_string())
    );
    assert_eq!(case("a:r=b,c.go", &multi()), SemanticRule::AnswerOnBroadcast);
    assert_eq!(
        case("a:b,c.go", &Config::default()),
        SemanticRule::MultiThreadOnly("broadcasts")
    );

    let mut records = read(objects).unwrap();
    records.push(Record::Message(MessageRecord::broadcast("a", &["b"], "go")));
    assert_eq!(
        rule(generate(&records, &multi())),
        SemanticRule::BroadcastTooFewCallees
    );
}

#[test]
fn broadcast_destroys_every_receiver() {
    let diagram = run("a:A\nb:B\nc:C\n\na:b,c.destroy()\n", &multi()).unwrap();
    let messages = diagram.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.destroys));
    for receiver in ["b", "c"] {
        let lifeline = diagram.lifeline_by_name(receiver).unwrap();
        assert!(lifeline.destroy_mark);
        assert_eq!(lifeline.death, Some(messages[0].y));
    }

    assert_eq!(
        rule(run("a:A\nb:B\nc:C\n\na:b,c.destroy()\na:b.x()\n", &multi())),
        SemanticRule::NotAlive("b".to_string())
    );
}

#[test]
fn broadcast_constructs_every_receiver() {
    let diagram = run("a:A\n/b:B\n/c:C\n\na:b,c.new()\na:b.x()\n", &multi()).unwrap();
    let messages = diagram.messages();
    for receiver in ["b", "c"] {
        assert_eq!(diagram.lifeline_by_name(receiver).unwrap().birth, Some(messages[0].y));
    }
    assert_eq!(messages[2].kind, MessageKind::Forward);
    assert_eq!(name(&diagram, messages[2].callee), "b");
}

#[test]
fn answer_rules() {
    assert_eq!(
        rule(run("u:Actor\nb:B\n\nu:r=b.x\n", &Config::default())),
        SemanticRule::AnswerToAlwaysActive("u".to_string())
    );
    assert_eq!(
        rule(run("a:A\np:P[p]\n\na:r=p.x\n", &Config::default())),
        SemanticRule::AnswerFromAlwaysActive("p".to_string())
    );
    assert_eq!(
        rule(run("a:A\nb:B\n\n$:>r=b.x\n", &multi())),
        SemanticRule::AnswerOnSpawn
    );
    // Spawning without `>`: active object callee, constructed thread owner
    assert_eq!(
        rule(run("a:A\nb:B[v]\n\na:r=b.foo()\n", &multi())),
        SemanticRule::AnswerOnSpawn
    );
    assert_eq!(
        rule(run("a:A\n/w:W[t]\n\na:r=w.new()\n", &multi())),
        SemanticRule::AnswerOnSpawn
    );
    assert_eq!(
        rule(run("a:A\nb:B\nc:C\n\na:b[m].x\nc[m]:a.y\n", &Config::default())),
        SemanticRule::MnemonicMismatch {
            mnemonic: "m".to_string(),
            name: "c".to_string()
        }
    );
    assert_eq!(
        rule(run("a:A\nb:B\n\na:b.x\nb:<<done\n", &Config::default())),
        SemanticRule::ReturnWithoutCallee
    );
}

#[test]
fn actor_instant_call_in_multi_thread_mode() {
    let source = "u:Actor\nb:B\n\nu:<b.ping()\n";
    let (diagram, outcomes) = step(source, &multi());
    assert_eq!(outcomes[0].messages.len(), 2);
    let answer = diagram.message(outcomes[0].messages[1]);
    assert_eq!(
        answer.kind,
        MessageKind::Answer {
            call: MessageId(0),
            implicit: false
        }
    );
    assert_eq!(name(&diagram, answer.callee), "u");
    assert!(!diagram.messages()[0].spawns);
    assert!(!diagram.lifeline_by_name("b").unwrap().active);

    assert!(run(source, &multi()).is_ok());
}

#[test]
fn answers_unwind_in_lifo_order() {
    let (diagram, outcomes) = step(
        "a:A\nb:B\nc:C\nd:D\ne:E\n\na:b.x\nb:c.y\nc:d.z\na:e.w\n",
        &Config::default(),
    );
    let closed = &outcomes[3].implicit_returns;
    let answered: Vec<_> = closed
        .iter()
        .map(|id| diagram.message(*id).answered_call())
        .collect();
    assert_eq!(
        answered,
        vec![Some(MessageId(2)), Some(MessageId(1)), Some(MessageId(0))]
    );
    assert!(closed.iter().all(|id| diagram.message(*id).is_implicit_answer()));
    let call = diagram.message(outcomes[3].messages[0]);
    assert_eq!(name(&diagram, call.callee), "e");
}

#[test]
fn level_selects_older_activation() {
    let source = "a:A\nb:B\nc:C\n\na:b.x\nb:a.y\n";

    // Level 0: the nested activation of a (called back by b) sends
    let (diagram, outcomes) = step(&format!("{}a:c.z\n", source), &Config::default());
    assert!(outcomes[2].implicit_returns.is_empty());
    let call = diagram.message(outcomes[2].messages[0]);
    let sender = diagram.lifeline(call.caller.unwrap());
    assert_eq!(sender.name, "a");
    assert!(!sender.is_root());

    // Level 1: skips that activation, which answers b, which answers a
    let (diagram, outcomes) = step(&format!("{}a^1:c.z\n", source), &Config::default());
    assert_eq!(outcomes[2].implicit_returns.len(), 2);
    let call = diagram.message(outcomes[2].messages[0]);
    assert!(diagram.lifeline(call.caller.unwrap()).is_root());

    let too_deep = run(&format!("{}a^2:c.z\n", source), &Config::default());
    assert_eq!(rule(too_deep), SemanticRule::NotActive("a".to_string()));
}

#[test]
fn caller_mnemonic_selects_exact_activation() {
    let objects = "a:A\nb:B\nc:C\n\n";
    let (diagram, outcomes) = step(
        &format!("{}a:b[m].x\nb:b.y\nb[m]:c.z\n", objects),
        &Config::default(),
    );
    assert_eq!(outcomes[2].implicit_returns.len(), 1);
    let call = diagram.message(outcomes[2].messages[0]);
    assert_eq!(call.caller, Some(LifelineId(1)));

    let (diagram, outcomes) = step(&format!("{}a:b.x\nb:b.y\nb:c.z\n", objects), &Config::default());
    assert!(outcomes[2].implicit_returns.is_empty());
    let call = diagram.message(outcomes[2].messages[0]);
    assert_ne!(call.caller, Some(LifelineId(1)));
    assert_eq!(diagram.messages()[1].kind, MessageKind::SelfCall);

    assert_eq!(
        rule(run(&format!("{}a:b.x\nb[q]:c.z\n", objects), &Config::default())),
        SemanticRule::UnknownMnemonic("q".to_string())
    );
    assert_eq!(
        rule(run(&format!("{}a:b[m].x\nb:c[m].y\n", objects), &Config::default())),
        SemanticRule::MnemonicInUse("m".to_string())
    );
}

#[test]
fn explicit_returns() {
    let config = Config::default().with_explicit_returns(true);
    let objects = "a:A\nb:B\nc:C\n\n";

    let diagram = run(&format!("{}a:b.x\nb:<<a.done\n", objects), &config).unwrap();
    let answer = &diagram.messages()[1];
    assert_eq!(
        answer.kind,
        MessageKind::Answer {
            call: MessageId(0),
            implicit: false
        }
    );
    assert_eq!(answer.text, "done");

    // Positions: objects take 13 bytes, the first message 6 more
    let failure = run(&format!("{}a:b.x\na:c.y\n", objects), &config).unwrap_err();
    assert_eq!(
        failure.error,
        GenerateError::Semantic {
            rule: SemanticRule::ExplicitAnswerRequired("a".to_string()),
            position: 19
        }
    );

    let failure = run(&format!("{}a:b.x\n", objects), &config).unwrap_err();
    assert_eq!(failure.error.position(), Some(13));

    assert_eq!(
        rule(run(&format!("{}a:b.x\na:<<b.no\n", objects), &config)),
        SemanticRule::ReturnMismatch {
            caller: "b".to_string(),
            callee: "a".to_string()
        }
    );
}

#[test]
fn stop_ends_thread() {
    let objects = "a:A\nb:B\nc:C\n\n";
    let (diagram, outcomes) = step(&format!("{}a:b.x\nb:stop\n", objects), &multi());
    assert_eq!(diagram.messages()[1].kind, MessageKind::Primitive);
    assert_eq!(outcomes[1].implicit_returns.len(), 1);
    assert!(!diagram.lifeline_by_name("a").unwrap().active);

    assert_eq!(
        rule(run(&format!("{}a:b.x\nb:stop\na:c.y\n", objects), &multi())),
        SemanticRule::NotActive("a".to_string())
    );
    assert_eq!(
        rule(run(&format!("{}a:b.x\nb:stop\na[0]:c.y\n", objects), &multi())),
        SemanticRule::ThreadDead(0)
    );
}

#[test]
fn thread_numbers_disambiguate() {
    let objects = "a:A\nb:B\nc:C\n\n";
    let spawns = "$:>b.run\n$:>b.go\n";

    assert_eq!(
        rule(run(&format!("{}{}b:c.x\n", objects, spawns), &multi())),
        SemanticRule::ThreadAmbiguous("b".to_string())
    );

    let diagram = run(&format!("{}{}b[2]:c.x\n", objects, spawns), &multi()).unwrap();
    let call = &diagram.messages()[2];
    assert_eq!(call.thread.0, 2);
    assert_eq!(name(&diagram, call.callee), "c");
    assert!(!diagram.lifeline(call.caller.unwrap()).is_root());
    assert_eq!(diagram.messages()[0].kind, MessageKind::Spawn);

    assert_eq!(
        rule(run(&format!("{}{}b[7]:c.x\n", objects, spawns), &multi())),
        SemanticRule::NoSuchThread(7)
    );
    assert_eq!(
        rule(run(&format!("{}$:>b.run\n", objects), &Config::default())),
        SemanticRule::MultiThreadOnly("spawning messages")
    );
    assert_eq!(
        rule(run(&format!("{}$:b.run\n", objects), &multi())),
        SemanticRule::NoCallerWithoutSpawn
    );
}

#[test]
fn constructing_object_with_thread_spawns() {
    let diagram = run("a:A\n/w:W[t]\n\na:w.new()\n", &multi()).unwrap();
    let call = &diagram.messages()[0];
    assert_eq!(call.kind, MessageKind::Constructor);
    assert!(call.spawns);
    assert_ne!(call.thread.0, 0);
}

#[test]
fn actor_line_starts_new_interaction() {
    let (diagram, outcomes) = step(
        "u:Actor\na:A\nb:B\nc:C\n\nu:a.x\na:b.y\nu:c.z\n",
        &Config::default(),
    );
    assert_eq!(outcomes[2].implicit_returns.len(), 1);
    assert!(!diagram.lifeline_by_name("a").unwrap().active);
    assert!(diagram.lifeline_by_name("c").unwrap().active);
    assert!(diagram.lifeline_by_name("u").unwrap().active);
    // Actor calls are not answered
    assert!(!diagram.messages()[0].is_answer() && !diagram.messages()[1].is_answer());

    assert_eq!(
        rule(run("u:Actor\n\nu:u.x\n", &Config::default())),
        SemanticRule::ActorSelfMessage("u".to_string())
    );
}

#[test]
fn destroy_ends_lifeline() {
    let diagram = run("a:A\nb:B\n\na:b.destroy()\n", &Config::default()).unwrap();
    assert!(diagram.messages()[0].destroys);
    let layout = diagram.layout().unwrap();
    let b = layout.lifeline("b").unwrap();
    assert!(b.destroy_mark);
    assert_eq!(b.bottom, diagram.messages()[0].y);

    assert_eq!(
        rule(run("a:A\nb:B\n\na:b.destroy()\na:b.x\n", &Config::default())),
        SemanticRule::NotAlive("b".to_string())
    );
    assert_eq!(
        rule(run("a:A\nb:B\n\na:b.x\nb:a.destroy\n", &Config::default())),
        SemanticRule::DestroyActive("a".to_string())
    );
}

#[test]
fn unknown_name_reports_position() {
    let failure = run("a:A\n\na:zz.x\n", &Config::default()).unwrap_err();
    assert_eq!(
        failure.error,
        GenerateError::NotFound {
            name: "zz".to_string(),
            position: 5
        }
    );
    assert!(failure.to_string().contains("zz"));
}

#[test]
fn failure_keeps_partial_diagram() {
    let failure = run("a:A\nb:B\n\na:b.x\nb:c.y\n", &Config::default()).unwrap_err();
    assert_eq!(failure.partial.messages().len(), 1);
    assert_eq!(failure.partial.lifelines().roots().count(), 2);
    assert!(!failure.partial.is_finished());
    assert_eq!(failure.partial.layout(), Err(StructuralError::NotFinished));
}

#[test]
fn declaration_rules() {
    assert_eq!(
        rule(run("a:A\na:B\n", &Config::default())),
        SemanticRule::DuplicateObject("a".to_string())
    );
    assert_eq!(
        rule(run("a:A\nb:B[v]\n", &Config::default())),
        SemanticRule::MultiThreadOnly("active objects")
    );

    let mut diagram = Diagram::new(Config::default());
    diagram.declare(&ObjectRecord::new("a", "A")).unwrap();
    diagram.end_declarations();
    assert_eq!(
        diagram.declare(&ObjectRecord::new("b", "B").at(40)),
        Err(GenerateError::Semantic {
            rule: SemanticRule::ObjectAfterMessages,
            position: 40
        })
    );
}

#[test]
fn finished_diagram_rejects_messages() {
    let mut diagram = run("a:A\nb:B\n\na:b.x\n", &Config::default()).unwrap();
    let records = read("a:A\nb:B\n\na:b.y\n").unwrap();
    let Some(Record::Message(message)) = records.last() else {
        panic!("Expected a message record");
    };
    assert_eq!(
        diagram.process(message),
        Err(GenerateError::Structural(StructuralError::AlreadyFinished))
    );
}

#[test]
fn source_map_links_records_and_drawables() {
    let diagram = run("a:A\nb:B\n\na:b.x\n", &Config::default()).unwrap();
    let map = diagram.source_map();
    assert_eq!(map.drawable_at(0), Some(Drawable::Lifeline(LifelineId(0))));
    assert_eq!(map.drawable_at(4), Some(Drawable::Lifeline(LifelineId(1))));
    assert_eq!(map.drawable_at(9), Some(Drawable::Message(MessageId(0))));
    assert_eq!(map.position_of(Drawable::Message(MessageId(0))), Some(9));
    // Implicit answers come from no line
    assert_eq!(map.position_of(Drawable::Message(MessageId(1))), None);
    assert_eq!(map.drawable_near(12), Some((9, Drawable::Message(MessageId(0)))));
}

struct Tall {
    seen: Vec<Marker>,
}

impl StructureHook for Tall {
    fn place(&mut self, marker: &Marker, _y: f64, _config: &Config) -> f64 {
        self.seen.push(marker.clone());
        50.0
    }
}

#[test]
fn markers_reserve_vertical_space() {
    let source = "a:A\nb:B\n\na:b.x\n[c loop]\na:b.y\n";
    let config = Config::default();

    let diagram = run(source, &config).unwrap();
    let marker = &diagram.markers()[0];
    assert_eq!(marker.y, diagram.messages()[0].y);
    assert_eq!(marker.height, config.marker_height);
    assert_eq!(diagram.messages()[1].y, marker.y + marker.height + config.row_height);

    let mut hook = Tall { seen: Vec::new() };
    let diagram = generate_with(&read(source).unwrap(), &config, &mut hook).unwrap();
    assert_eq!(
        hook.seen,
        vec![Marker::FragmentStart {
            label: "loop".to_string()
        }]
    );
    let marker = &diagram.markers()[0];
    assert_eq!(diagram.messages()[1].y, marker.y + 50.0 + config.row_height);
    assert_eq!(
        diagram.source_map().drawable_at(marker.position),
        Some(Drawable::Marker(0))
    );
}

#[test]
fn self_call_nests_on_the_right() {
    let diagram = run("a:A\nb:B\n\na:b.x\nb:b.y\n", &Config::default()).unwrap();
    let call = &diagram.messages()[1];
    assert_eq!(call.kind, MessageKind::SelfCall);
    let nested = diagram.lifeline(call.callee.unwrap());
    assert_eq!(nested.depth, 1);
    assert!(nested.disposed);

    let layout = diagram.layout().unwrap();
    let b = layout.lifeline("b").unwrap();
    assert!(b.boxes.iter().any(|bx| bx.axis == b.axis + diagram.config().sub_width));
}
