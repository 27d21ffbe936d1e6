use super::*;
use ql_core::{
    ContentKind, EmptyEncounterTable, Enemy, EventParameters, NodeId, QlValue, QuestContext,
    QuestDocument, StaticEncounterTable, StepResult, Tag, TriggerKind,
};
use ql_parser::parse_quest_document;

fn quest(xml: &str) -> QuestDocument {
    parse_quest_document(xml).expect("quest should parse")
}

fn node(document: &QuestDocument, id: &str) -> NodeId {
    find_by_id(document, document.root(), id).expect("id should exist")
}

fn first_child(document: &QuestDocument, tag: Tag) -> NodeId {
    iterate_children(document, document.root(), |child_tag, child| {
        (child_tag == tag).then_some(child)
    })
    .expect("child should exist")
}

const BRANCHING: &str = r#"
<quest title="Branching">
  <roleplay id="start" title="Decision [d20]">
    <p>{{weaponsDrawn = false}}</p>
    <p>{{gold = 10}}</p>
    <p>You have {{gold}} gold.</p>
    <instruction>Roll a <b>d20</b> [d20]</instruction>
    <choice text="Sneak" if="gold &gt; 100"><trigger>goto castle</trigger></choice>
    <choice text="Draw [sword]">
      <roleplay id="drawn"><p>{{weaponsDrawn = true}}</p><p>Steel!</p></roleplay>
    </choice>
    <choice text="Leave with {{gold}} gold"><trigger>goto castle</trigger></choice>
  </roleplay>
  <roleplay id="middle"><p>The corridor.</p></roleplay>
  <combat id="fight" icon="skull">
    <e>Skeleton Swordsman</e>
    <e if="noise &gt; 0">Undead Viking</e>
    <event on="win" xp="true" loot="false" heal="3">
      <roleplay id="won"><p>Victory!</p></roleplay>
    </event>
    <event on="lose"><trigger>end</trigger></event>
  </combat>
  <roleplay id="castle">
    <p>The inner castle.</p>
    <choice text="Deeper">
      <roleplay><p>Nested</p></roleplay>
    </choice>
  </roleplay>
  <roleplay id="last"><p>Finale</p></roleplay>
  <trigger>end</trigger>
</quest>"#;

#[test]
fn roleplay_renders_content_and_enabled_choices() {
    let document = quest(BRANCHING);
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let start = node(&document, "start");

    let step = interpreter
        .load_roleplay_node(start, &QuestContext::new())
        .expect("roleplay should load");

    assert_eq!(step.title.as_deref(), Some("Decision [d20]"));
    let texts = step
        .content
        .iter()
        .map(|item| (item.kind, item.text.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        texts,
        vec![
            (ContentKind::Text, "You have 10 gold."),
            (
                ContentKind::Instruction,
                r#"Roll a <b>d20</b> <img class="inline_icon" src="images/d20_small.svg">"#
            ),
        ]
    );

    assert_eq!(step.choices.len(), 2);
    assert_eq!(step.choices[0].idx, 0);
    assert_eq!(
        step.choices[0].text,
        r#"Draw <img class="inline_icon" src="images/sword_small.svg">"#
    );
    assert_eq!(step.choices[1].idx, 1);
    assert_eq!(step.choices[1].text, "Leave with 10 gold");

    assert_eq!(step.context.get("gold"), Some(&QlValue::Number(10.0)));
    assert_eq!(step.context.get("weaponsDrawn"), Some(&QlValue::Bool(false)));
}

#[test]
fn roleplay_leaves_incoming_context_untouched() {
    let document = quest(BRANCHING);
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let incoming = QuestContext::new().with("gold", 500i64);

    let step = interpreter
        .load_roleplay_node(node(&document, "start"), &incoming)
        .expect("roleplay should load");

    assert_eq!(incoming.get("gold"), Some(&QlValue::Number(500.0)));
    assert_eq!(step.context.get("gold"), Some(&QlValue::Number(10.0)));
    assert_eq!(step.choices.len(), 2);
}

#[test]
fn handle_choice_numbers_only_enabled_choices() {
    let document = quest(BRANCHING);
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let start = node(&document, "start");
    let poor = QuestContext::new().with("gold", 10i64);
    let rich = QuestContext::new().with("gold", 1000i64);

    let drawn = interpreter
        .handle_choice(start, 0, &poor)
        .expect("choice should resolve");
    assert_eq!(drawn, Some(node(&document, "drawn")));

    let leave = interpreter
        .handle_choice(start, 1, &poor)
        .expect("choice should resolve");
    assert_eq!(leave, Some(node(&document, "castle")));

    let sneak = interpreter
        .handle_choice(start, 0, &rich)
        .expect("choice should resolve");
    assert_eq!(sneak, Some(node(&document, "castle")));
    let drawn_when_rich = interpreter
        .handle_choice(start, 1, &rich)
        .expect("choice should resolve");
    assert_eq!(drawn_when_rich, Some(node(&document, "drawn")));
}

#[test]
fn handle_choice_falls_through_to_next_enabled_sibling() {
    let document = quest(BRANCHING);
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);

    let next = interpreter
        .handle_choice(node(&document, "middle"), 0, &QuestContext::new())
        .expect("next should resolve");
    assert_eq!(next, Some(node(&document, "fight")));

    let last = interpreter
        .handle_choice(node(&document, "last"), 0, &QuestContext::new())
        .expect("next should resolve");
    let trigger = last.expect("trigger should follow");
    assert_eq!(document.tag(trigger), Tag::Trigger);
}

#[test]
fn handle_choice_returns_none_when_parent_holds_end_trigger() {
    let document = quest(
        r#"<quest><roleplay id="r"><p>Bye</p><trigger>end</trigger></roleplay><roleplay/></quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let next = interpreter
        .handle_choice(node(&document, "r"), 0, &QuestContext::new())
        .expect("choice should resolve");
    assert_eq!(next, None);

    let step = interpreter
        .load_roleplay_node(node(&document, "r"), &QuestContext::new())
        .expect("roleplay should load");
    assert_eq!(step.content.len(), 1);
    assert_eq!(step.content[0].text, "Bye");
    assert_eq!(step.choices.len(), 1);
    assert_eq!(step.choices[0].text, "End");
}

#[test]
fn synthetic_choice_is_end_before_terminal_trigger() {
    let document = quest(BRANCHING);
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);

    let last = interpreter
        .load_roleplay_node(node(&document, "last"), &QuestContext::new())
        .expect("roleplay should load");
    assert_eq!(last.choices.len(), 1);
    assert_eq!(last.choices[0].text, "End");
    assert_eq!(last.choices[0].idx, 0);

    let middle = interpreter
        .load_roleplay_node(node(&document, "middle"), &QuestContext::new())
        .expect("roleplay should load");
    assert_eq!(middle.choices.len(), 1);
    assert_eq!(middle.choices[0].text, "Next");
}

#[test]
fn roleplay_rejects_events_and_textless_choices() {
    let document = quest(
        r#"<quest>
  <roleplay id="evented"><event on="win"><trigger>end</trigger></event></roleplay>
  <roleplay id="textless"><choice><trigger>end</trigger></choice></roleplay>
  <roleplay id="blank"><choice text="  "><trigger>end</trigger></choice></roleplay>
  <roleplay id="nested"><combat/></roleplay>
</quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let context = QuestContext::new();

    let evented = interpreter
        .load_roleplay_node(node(&document, "evented"), &context)
        .expect_err("event inside roleplay should fail");
    assert_eq!(evented.code, "ROLEPLAY_EVENT_CHILD");
    assert!(evented.span.is_some());

    for id in ["textless", "blank"] {
        let error = interpreter
            .load_roleplay_node(node(&document, id), &context)
            .expect_err("choice without text should fail");
        assert_eq!(error.code, "CHOICE_TEXT_MISSING");
    }

    let nested = interpreter
        .load_roleplay_node(node(&document, "nested"), &context)
        .expect_err("combat inside roleplay should fail");
    assert_eq!(nested.code, "ROLEPLAY_CHILD_INVALID");
}

#[test]
fn combat_resolves_enemies_through_encounter_table() {
    let document = quest(BRANCHING);
    let table = StaticEncounterTable::bundled();
    let interpreter = QuestInterpreter::new(&document, &table);
    let fight = node(&document, "fight");

    let quiet = interpreter
        .load_combat_node(fight, &QuestContext::new().with("noise", 0i64))
        .expect("combat should load");
    assert_eq!(quiet.icon.as_deref(), Some("skull"));
    assert_eq!(
        quiet.enemies,
        vec![Enemy {
            name: "Skeleton Swordsman".to_string(),
            tier: 1,
            class: Some("Undead".to_string()),
        }]
    );

    let loud = interpreter
        .load_combat_node(fight, &QuestContext::new().with("noise", 2i64))
        .expect("combat should load");
    assert_eq!(loud.enemies.len(), 2);
    assert_eq!(loud.enemies[1].name, "Undead Viking");
    assert_eq!(loud.enemies[1].tier, 2);
}

#[test]
fn combat_enemy_line_uses_context_variable_and_unknown_defaults_to_tier_one() {
    let document = quest(
        r#"<quest><combat id="c">
  <e>{{enemy}}</e>
  <e>{{missing}}</e>
  <event on="win"><trigger>end</trigger></event>
  <event on="lose"><trigger>end</trigger></event>
</combat></quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let step = interpreter
        .load_combat_node(
            node(&document, "c"),
            &QuestContext::new().with("enemy", "Zombie Hand"),
        )
        .expect("combat should load");

    assert_eq!(
        step.enemies,
        vec![
            Enemy {
                name: "Zombie Hand".to_string(),
                tier: 1,
                class: None,
            },
            Enemy {
                name: "{{missing}}".to_string(),
                tier: 1,
                class: None,
            },
        ]
    );
}

#[test]
fn combat_returns_context_from_before_its_own_updates() {
    let document = quest(
        r#"<quest><combat id="c">
  <p>{{boss = "lich"}}</p>
  <e>{{boss}}</e>
  <event on="win"><trigger>end</trigger></event>
  <event on="lose"><trigger>end</trigger></event>
</combat></quest>"#,
    );
    let table = StaticEncounterTable::bundled();
    let interpreter = QuestInterpreter::new(&document, &table);
    let incoming = QuestContext::new().with("gold", 3i64);

    let step = interpreter
        .load_combat_node(node(&document, "c"), &incoming)
        .expect("combat should load");
    assert_eq!(step.enemies[0].name, "Lich");
    assert_eq!(step.enemies[0].tier, 4);
    assert_eq!(step.context, incoming);
    assert!(!step.context.contains("boss"));
}

#[test]
fn combat_validation_fails_fast() {
    let document = quest(
        r#"<quest>
  <combat id="no-win"><e>Wolf</e><event on="lose"><trigger>end</trigger></event></combat>
  <combat id="no-lose"><e>Wolf</e><event on="win"><trigger>end</trigger></event></combat>
  <combat id="hidden-win"><e>Wolf</e>
    <event on="win" if="noise &gt; 5"><trigger>end</trigger></event>
    <event on="lose"><trigger>end</trigger></event>
  </combat>
  <combat id="no-enemies">
    <e if="false">Wolf</e>
    <event on="win"><trigger>end</trigger></event>
    <event on="lose"><trigger>end</trigger></event>
  </combat>
  <combat id="stray"><e>Wolf</e><choice text="Run"/></combat>
</quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let context = QuestContext::new().with("noise", 0i64);

    let cases = [
        ("no-win", "COMBAT_MISSING_WIN_EVENT"),
        ("no-lose", "COMBAT_MISSING_LOSE_EVENT"),
        ("hidden-win", "COMBAT_MISSING_WIN_EVENT"),
        ("no-enemies", "COMBAT_NO_ENEMIES"),
        ("stray", "COMBAT_CHILD_INVALID"),
    ];
    for (id, code) in cases {
        let error = interpreter
            .load_combat_node(node(&document, id), &context)
            .expect_err("invalid combat should fail");
        assert_eq!(error.code, code, "combat {}", id);
    }
}

#[test]
fn handle_event_descends_into_matching_event() {
    let document = quest(BRANCHING);
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let fight = node(&document, "fight");

    let won = interpreter
        .handle_event(fight, "win", &QuestContext::new())
        .expect("win should resolve");
    assert_eq!(won, Some(node(&document, "won")));

    let lost = interpreter
        .handle_event(fight, "lose", &QuestContext::new())
        .expect("lose should resolve")
        .expect("lose leads to the end trigger");
    assert_eq!(document.tag(lost), Tag::Trigger);
    let trigger = interpreter
        .load_trigger_node(lost)
        .expect("trigger should load");
    assert_eq!(trigger.kind, TriggerKind::End);

    let missing = interpreter
        .handle_event(fight, "flee", &QuestContext::new())
        .expect_err("unknown event should fail");
    assert_eq!(missing.code, "EVENT_NOT_FOUND");
}

#[test]
fn event_parameters_are_typed_and_absent_ones_omitted() {
    let document = quest(BRANCHING);
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let fight = node(&document, "fight");

    let win = interpreter
        .get_event_parameters(fight, "win", &QuestContext::new())
        .expect("win params should load");
    assert_eq!(
        win,
        EventParameters {
            xp: Some(true),
            loot: Some(false),
            heal: Some(3),
        }
    );

    let lose = interpreter
        .get_event_parameters(fight, "lose", &QuestContext::new())
        .expect("lose params should load");
    assert_eq!(lose, EventParameters::default());
}

#[test]
fn event_parameters_reject_non_integer_heal() {
    let document = quest(
        r#"<quest><combat id="c"><e>Wolf</e>
  <event on="win" heal="lots"><trigger>end</trigger></event>
  <event on="lose"><trigger>end</trigger></event>
</combat></quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let error = interpreter
        .get_event_parameters(node(&document, "c"), "win", &QuestContext::new())
        .expect_err("bad heal should fail");
    assert_eq!(error.code, "EVENT_HEAL_INVALID");
}

#[test]
fn get_event_skips_disabled_events() {
    let document = quest(
        r#"<quest><combat id="c"><e>Wolf</e>
  <event on="win" if="noise == 0" id="silent"><roleplay/></event>
  <event on="win" if="noise &gt; 0" id="noisy"><roleplay/></event>
  <event on="lose"><trigger>end</trigger></event>
</combat></quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let combat = node(&document, "c");

    let quiet = interpreter
        .get_event(combat, "win", &QuestContext::new().with("noise", 0i64))
        .expect("event should resolve");
    assert_eq!(quiet, node(&document, "silent"));
    let loud = interpreter
        .get_event(combat, "win", &QuestContext::new().with("noise", 3i64))
        .expect("event should resolve");
    assert_eq!(loud, node(&document, "noisy"));
}

#[test]
fn goto_resolves_independent_of_nesting_depth() {
    let document = quest(
        r#"<quest>
  <roleplay id="target"><p>Top</p></roleplay>
  <combat><e>Wolf</e>
    <event on="win">
      <roleplay>
        <choice text="Back"><roleplay><p>x</p></roleplay><trigger id="deep">goto target</trigger></choice>
      </roleplay>
    </event>
    <event on="lose"><trigger>goto  later</trigger></event>
  </combat>
  <roleplay><choice text="x"><roleplay id="later"/></choice></roleplay>
</quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);

    let deep = interpreter
        .load_trigger_node(node(&document, "deep"))
        .expect("goto should resolve");
    assert_eq!(deep.kind, TriggerKind::Goto);
    assert_eq!(deep.target, node(&document, "target"));

    let combat = first_child(&document, Tag::Combat);
    let lost = interpreter
        .handle_event(combat, "lose", &QuestContext::new())
        .expect("lose should resolve");
    assert_eq!(lost, Some(node(&document, "later")));
}

#[test]
fn invalid_triggers_are_document_errors() {
    let document = quest(
        r#"<quest>
  <trigger id="missing">goto missingId</trigger>
  <trigger id="bad">jump somewhere</trigger>
</quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);

    let missing = interpreter
        .load_trigger_node(node(&document, "missing"))
        .expect_err("missing target should fail");
    assert_eq!(missing.code, "TRIGGER_GOTO_TARGET_MISSING");

    let bad = interpreter
        .load_trigger_node(node(&document, "bad"))
        .expect_err("unknown trigger should fail");
    assert_eq!(bad.code, "TRIGGER_INVALID");
}

#[test]
fn container_requires_a_card() {
    let document = quest(
        r#"<quest><roleplay id="r">
  <choice text="Empty"><p>Nothing follows</p></choice>
  <choice text="Nested"><choice text="inner"/><roleplay/></choice>
  <choice text="Hidden"><roleplay if="false"/><combat if="false"/></choice>
</roleplay></quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let roleplay = node(&document, "r");
    let context = QuestContext::new();

    let empty = interpreter
        .handle_choice(roleplay, 0, &context)
        .expect_err("choice without card should fail");
    assert_eq!(empty.code, "CONTAINER_NO_CARD");

    let nested = interpreter
        .handle_choice(roleplay, 1, &context)
        .expect_err("nested choice should fail");
    assert_eq!(nested.code, "CONTAINER_NESTED_BRANCH");

    let hidden = interpreter
        .handle_choice(roleplay, 2, &context)
        .expect_err("hidden cards should fail");
    assert_eq!(hidden.code, "CONTAINER_NO_CARD");
}

#[test]
fn load_step_dispatches_on_tag() {
    let document = quest(BRANCHING);
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let context = QuestContext::new();

    assert!(matches!(
        interpreter.load_step(node(&document, "start"), &context),
        Ok(StepResult::Roleplay(_))
    ));
    assert!(matches!(
        interpreter.load_step(node(&document, "fight"), &context),
        Ok(StepResult::Combat(_))
    ));

    let choice = document.children(node(&document, "castle"))[1];
    let error = interpreter
        .load_step(choice, &context)
        .expect_err("choice is not a card");
    assert_eq!(error.code, "STEP_UNEXPECTED_NODE");
}

#[test]
fn roleplay_rejects_goto_trigger_children() {
    let document = quest(
        r#"<quest>
  <roleplay id="r"><p>Hi</p><trigger>goto far</trigger></roleplay>
  <roleplay id="near"/>
  <roleplay id="far"/>
  <roleplay id="gated"><p>Hi</p><trigger if="false">goto far</trigger></roleplay>
</quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);

    let error = interpreter
        .load_roleplay_node(node(&document, "r"), &QuestContext::new())
        .expect_err("goto inside roleplay should fail");
    assert_eq!(error.code, "ROLEPLAY_CHILD_INVALID");
    assert!(error.span.is_some());

    let gated = interpreter
        .load_roleplay_node(node(&document, "gated"), &QuestContext::new())
        .expect("disabled trigger is skipped");
    assert_eq!(gated.content.len(), 1);
}

#[test]
fn end_trigger_text_is_case_sensitive() {
    let document = quest(
        r#"<quest>
  <roleplay id="r"><p>Bye</p></roleplay>
  <trigger id="shout">END</trigger>
  <trigger id="plain"> end </trigger>
</quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);

    let error = interpreter
        .load_trigger_node(node(&document, "shout"))
        .expect_err("END is not a trigger");
    assert_eq!(error.code, "TRIGGER_INVALID");

    let plain = interpreter
        .load_trigger_node(node(&document, "plain"))
        .expect("trimmed end is a trigger");
    assert_eq!(plain.kind, TriggerKind::End);

    let step = interpreter
        .load_roleplay_node(node(&document, "r"), &QuestContext::new())
        .expect("roleplay should load");
    assert_eq!(step.choices[0].text, "Next");
}

#[test]
fn combat_rejects_state_paragraphs_after_the_state_block() {
    let document = quest(
        r#"<quest>
  <combat id="late"><e>Wolf</e><p>{{noise = 3}}</p>
    <event on="win"><trigger>end</trigger></event>
    <event on="lose"><trigger>end</trigger></event>
  </combat>
  <combat id="early"><p>{{noise = 3}}</p><e>Wolf</e><e if="noise &gt; 2">Bandit</e>
    <event on="win"><trigger>end</trigger></event>
    <event on="lose"><trigger>end</trigger></event>
  </combat>
</quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);

    let error = interpreter
        .load_combat_node(node(&document, "late"), &QuestContext::new())
        .expect_err("late state paragraph should fail");
    assert_eq!(error.code, "COMBAT_CHILD_INVALID");

    let early = interpreter
        .load_combat_node(node(&document, "early"), &QuestContext::new())
        .expect("leading state block is fine");
    assert_eq!(early.enemies.len(), 2);
}

#[test]
fn empty_event_attributes_count_as_absent() {
    let document = quest(
        r#"<quest><combat id="c"><e>Wolf</e>
  <event on="win" heal="" xp=" " loot="true"><trigger>end</trigger></event>
  <event on="lose"><trigger>end</trigger></event>
</combat></quest>"#,
    );
    let interpreter = QuestInterpreter::new(&document, &EmptyEncounterTable);
    let params = interpreter
        .get_event_parameters(node(&document, "c"), "win", &QuestContext::new())
        .expect("empty attributes should be ignored");
    assert_eq!(
        params,
        EventParameters {
            xp: None,
            loot: Some(true),
            heal: None,
        }
    );
}
